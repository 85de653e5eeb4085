// Tensor utilities — free helpers shared by kernels and tests
//
// Elementwise arithmetic allocates a fresh tensor so callers never alias the
// operands; the expression evaluator relies on this when it combines operand
// batches that may be shared across graph edges.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::tensor::Tensor;

/// Elementwise sum of two same-shape tensors into a new tensor.
pub fn element_add(lhs: &Tensor, rhs: &Tensor) -> Result<Tensor> {
    check_same_shape(lhs, rhs, "element_add")?;
    let mut out = lhs.clone();
    for i in 0..lhs.size() {
        *out.index_mut(i) = lhs.index(i) + rhs.index(i);
    }
    Ok(out)
}

/// Elementwise product of two same-shape tensors into a new tensor.
pub fn element_multiply(lhs: &Tensor, rhs: &Tensor) -> Result<Tensor> {
    check_same_shape(lhs, rhs, "element_multiply")?;
    let mut out = lhs.clone();
    for i in 0..lhs.size() {
        *out.index_mut(i) = lhs.index(i) * rhs.index(i);
    }
    Ok(out)
}

/// Whether two tensors agree in shape and elementwise within `threshold`.
pub fn is_same(lhs: &Tensor, rhs: &Tensor, threshold: f32) -> bool {
    if lhs.is_empty() || rhs.is_empty() {
        return lhs.is_empty() && rhs.is_empty();
    }
    if lhs.shape() != rhs.shape() {
        return false;
    }
    lhs.raw_data()
        .iter()
        .zip(rhs.raw_data())
        .all(|(a, b)| (a - b).abs() <= threshold)
}

/// Deep-copy a shared tensor so the caller may mutate it freely.
/// This is the clone-before-mutate discipline of fan-out edges.
pub fn clone_tensor(tensor: &Arc<Tensor>) -> Tensor {
    tensor.as_ref().clone()
}

fn check_same_shape(lhs: &Tensor, rhs: &Tensor, op: &'static str) -> Result<()> {
    if lhs.is_empty() || rhs.is_empty() {
        return Err(Error::EmptyTensor { op });
    }
    if lhs.shape() != rhs.shape() {
        return Err(Error::ShapeMismatch {
            expected: lhs.shape().to_vec(),
            got: rhs.shape().to_vec(),
        });
    }
    Ok(())
}
