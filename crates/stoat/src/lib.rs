//! # stoat
//!
//! Inference-only execution engine for pre-trained neural-network graphs.
//!
//! A model is loaded from a serialized graph description plus a weight
//! blob, built into a [`RuntimeGraph`], and executed batch by batch:
//!
//! ```ignore
//! let mut graph = RuntimeGraph::new("model.graph", "model.weights");
//! graph.init()?;
//! graph.build(&LayerRegistry::with_builtin_layers(), "input", "output")?;
//! let outputs = graph.forward(inputs, false)?;
//! ```
//!
//! This crate provides:
//! - [`runtime`] — the typed value model (operands, parameters, attributes)
//!   and the readiness-scheduled [`RuntimeGraph`]
//! - [`layer`] — the [`Layer`] trait, the [`LayerRegistry`], and the
//!   built-in compute kernels (conv, pooling, linear, activations, flatten,
//!   expression)
//! - [`expr`] — tokenizer, parser, and post-order flattening for the
//!   elementwise expression language
//! - [`ir`] — the serialized graph format and its loader

pub mod expr;
pub mod ir;
pub mod layer;
pub mod runtime;

pub use layer::{Layer, LayerRegistry};
pub use runtime::{GraphState, RuntimeGraph};
