//! # stoat-data
//!
//! Data loading utilities for the stoat inference runtime.
//!
//! This crate provides:
//! - [`CsvLoader`] — a delimiter-configurable text-matrix reader producing
//!   a `(1, rows, cols)` tensor, used by tests and example code to feed
//!   input batches

pub mod csv;

pub use csv::CsvLoader;
