//! # stoat-core
//!
//! Tensor data model and core types for the stoat inference runtime.
//!
//! This crate provides:
//! - [`Tensor`] — a 3-D f32 array with a channel-major logical view over
//!   column-major physical storage
//! - [`DType`] — element type tags for operands and weight blobs
//! - [`Error`] / [`Result`] — the single error type shared by the workspace
//! - [`util`] — elementwise helpers and the clone-before-mutate utilities

pub mod dtype;
pub mod error;
pub mod tensor;
pub mod util;

pub use dtype::DType;
pub use error::{Error, Result};
pub use tensor::Tensor;
