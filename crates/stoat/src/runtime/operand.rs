// RuntimeOperand — a named tensor slot on a graph edge
//
// One operand carries one batch of tensors: `datas` holds one Arc<Tensor>
// per batch element. The producing node and every consuming node reference
// the SAME tensor instances; propagation clones the Arc, never the buffer.

use std::sync::Arc;

use stoat_core::{DType, Tensor};

/// A named, typed logical tensor slot shared between a producer and its
/// consumers. The declared `shape` (batch dim first) is used to validate or
/// allocate the per-batch tensor storage.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOperand {
    /// Operand name as declared in the model IR.
    pub name: String,
    /// Declared shape, batch size first: 2, 3, or 4 dims.
    pub shape: Vec<usize>,
    /// Declared element type.
    pub dtype: DType,
    /// One tensor per batch element; empty until the graph is built.
    pub datas: Vec<Arc<Tensor>>,
}

impl RuntimeOperand {
    /// Batch size declared for this operand (first shape dim), 0 if the
    /// shape is empty.
    pub fn batch_size(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }
}
