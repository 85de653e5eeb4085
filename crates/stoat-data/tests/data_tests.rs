// Tests for stoat-data: CSV matrix loading

use std::fs;
use std::path::PathBuf;

use stoat_data::CsvLoader;

fn write_temp(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("stoat-data-{}-{}", std::process::id(), name));
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_comma_matrix() {
    let path = write_temp("basic.csv", "1,2,3\n4,5,6\n");
    let data = CsvLoader::default().load(&path).unwrap();
    fs::remove_file(&path).ok();

    assert_eq!(data.shape(), [1, 2, 3]);
    assert_eq!(data.values(true), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
}

#[test]
fn test_load_custom_delimiter() {
    let path = write_temp("semi.csv", "1;2\n3;4\n");
    let data = CsvLoader::new(';').load(&path).unwrap();
    fs::remove_file(&path).ok();

    assert_eq!(data.shape(), [1, 2, 2]);
    assert_eq!(data.values(true), vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_short_rows_leave_zeros() {
    let path = write_temp("ragged.csv", "1,2,3\n4\n");
    let data = CsvLoader::default().load(&path).unwrap();
    fs::remove_file(&path).ok();

    assert_eq!(data.shape(), [1, 2, 3]);
    assert_eq!(data.at(0, 1, 0), 4.0);
    assert_eq!(data.at(0, 1, 1), 0.0);
    assert_eq!(data.at(0, 1, 2), 0.0);
}

#[test]
fn test_bad_cells_are_zero_not_fatal() {
    let path = write_temp("bad.csv", "1,x,3\n");
    let data = CsvLoader::default().load(&path).unwrap();
    fs::remove_file(&path).ok();

    assert_eq!(data.values(true), vec![1.0, 0.0, 3.0]);
}

#[test]
fn test_blank_line_ends_matrix() {
    let path = write_temp("blank.csv", "1,2\n\n9,9\n");
    let data = CsvLoader::default().load(&path).unwrap();
    fs::remove_file(&path).ok();

    assert_eq!(data.shape(), [1, 1, 2]);
}

#[test]
fn test_missing_file_is_error() {
    let missing = std::env::temp_dir().join("stoat-data-definitely-missing.csv");
    assert!(CsvLoader::default().load(&missing).is_err());
}

#[test]
fn test_empty_file_is_error() {
    let path = write_temp("empty.csv", "");
    let result = CsvLoader::default().load(&path);
    fs::remove_file(&path).ok();
    assert!(result.is_err());
}
