// CsvLoader — read a delimited text matrix into a tensor
//
// Two passes over the file: the first scans dimensions (row count, widest
// row), the second fills the matrix. Short rows leave trailing zeros; a
// blank line ends the matrix. I/O and parse failures are logged and
// returned as errors; they never abort the process.

use std::fs;
use std::path::Path;

use stoat_core::{Error, Result, Tensor};

/// Loads a delimited numeric matrix file as a `(1, rows, cols)` tensor.
pub struct CsvLoader {
    delimiter: char,
}

impl CsvLoader {
    pub fn new(delimiter: char) -> Self {
        CsvLoader { delimiter }
    }

    /// Load `path` into a single-channel tensor, one matrix row per tensor
    /// row. Unparseable cells are logged and left at zero.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Tensor> {
        let path = path.as_ref();
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(err) => {
                log::error!("failed to open csv file {:?}: {}", path, err);
                return Err(Error::Io(err));
            }
        };

        let (rows, cols) = self.matrix_size(&text);
        if rows == 0 || cols == 0 {
            log::error!("csv file {:?} holds no data", path);
            return Err(Error::msg(format!("csv file {:?} holds no data", path)));
        }

        let mut data = Tensor::new(1, rows, cols);
        for (row, line) in text.lines().enumerate() {
            if line.is_empty() {
                break;
            }
            for (col, token) in line.split(self.delimiter).enumerate() {
                if col >= cols {
                    return Err(Error::msg(format!(
                        "csv file {:?}: row {} has more than {} columns",
                        path,
                        row + 1,
                        cols
                    )));
                }
                match token.trim().parse::<f32>() {
                    Ok(value) => *data.at_mut(0, row, col) = value,
                    Err(err) => {
                        log::error!(
                            "csv file {:?}: bad value {:?} at row {} col {}: {}",
                            path,
                            token,
                            row + 1,
                            col + 1,
                            err
                        );
                    }
                }
            }
        }
        Ok(data)
    }

    /// First pass: count rows up to the first blank line and the widest
    /// column count.
    fn matrix_size(&self, text: &str) -> (usize, usize) {
        let mut rows = 0;
        let mut cols = 0;
        for line in text.lines() {
            if line.is_empty() {
                break;
            }
            cols = cols.max(line.split(self.delimiter).count());
            rows += 1;
        }
        (rows, cols)
    }
}

impl Default for CsvLoader {
    fn default() -> Self {
        CsvLoader::new(',')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_size_scan() {
        let loader = CsvLoader::default();
        assert_eq!(loader.matrix_size("1,2,3\n4,5,6\n"), (2, 3));
        assert_eq!(loader.matrix_size("1,2\n3,4,5\n"), (2, 3));
        assert_eq!(loader.matrix_size(""), (0, 0));
        // a blank line ends the matrix
        assert_eq!(loader.matrix_size("1,2\n\n3,4\n"), (1, 2));
    }
}
