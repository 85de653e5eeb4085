// Layer — compute kernels attached to graph nodes
//
// A Layer is stateless with respect to the graph: it is constructed once
// from a node's params and attrs, and `forward` is then a pure function of
// the input tensors. Output slots are preallocated by the graph; a layer
// either fills them in place (copy-on-write through Arc::make_mut) or
// replaces the slot with a freshly allocated tensor.

use std::sync::Arc;

use stoat_core::{Error, Result, Tensor};

mod activation;
mod conv;
mod expression;
mod flatten;
mod linear;
mod pooling;
mod registry;

pub use activation::{ReluLayer, SigmoidLayer};
pub use conv::ConvLayer;
pub use expression::ExpressionLayer;
pub use flatten::FlattenLayer;
pub use linear::LinearLayer;
pub use pooling::{AdaptiveAveragePoolingLayer, MaxPoolingLayer};
pub use registry::{LayerBuilder, LayerRegistry};

/// A compute kernel bound to one graph node.
///
/// `inputs` is the node's input operands flattened in positional order
/// (each operand contributes `batch` tensors); `outputs` is the output
/// operand's batch, one slot per input batch element.
pub trait Layer {
    /// Human-readable layer name, used in log and error messages.
    fn name(&self) -> &str;

    /// Run the kernel over one batch.
    fn forward(&self, inputs: &[Arc<Tensor>], outputs: &mut [Arc<Tensor>]) -> Result<()>;
}

/// Check the one-operand layer contract: a non-empty input batch with one
/// output slot per input tensor.
pub(crate) fn check_batch(
    inputs: &[Arc<Tensor>],
    outputs: &[Arc<Tensor>],
    op: &'static str,
) -> Result<()> {
    if inputs.is_empty() {
        return Err(Error::EmptyTensor { op });
    }
    if inputs.len() != outputs.len() {
        return Err(Error::msg(format!(
            "{}: input batch of {} does not match output batch of {}",
            op,
            inputs.len(),
            outputs.len()
        )));
    }
    Ok(())
}
