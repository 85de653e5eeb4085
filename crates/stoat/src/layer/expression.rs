// Expression — fused elementwise computation over several input operands
//
// The layer's inputs are all operand batches concatenated: operand `@i`
// occupies `inputs[i * batch .. (i + 1) * batch]` where `batch` is the
// output slot count. Evaluation walks the parsed post-order list with a
// stack of batches; one batch must remain at the end.

use std::sync::Arc;

use stoat_core::util::{element_add, element_multiply};
use stoat_core::{bail, Error, Result, Tensor};

use crate::expr::{ExprStep, ExpressionParser};
use crate::layer::Layer;
use crate::runtime::RuntimeOperator;

pub struct ExpressionLayer {
    expression: String,
    steps: Vec<ExprStep>,
}

impl ExpressionLayer {
    pub fn build(op: &RuntimeOperator) -> Result<Box<dyn Layer>> {
        let expression = op.param("expr")?.as_str()?.to_string();
        let steps = ExpressionParser::new(&expression).generate()?;
        Ok(Box::new(ExpressionLayer { expression, steps }))
    }

    /// The source expression, for diagnostics.
    pub fn expression(&self) -> &str {
        &self.expression
    }
}

impl Layer for ExpressionLayer {
    fn name(&self) -> &str {
        "Expression"
    }

    fn forward(&self, inputs: &[Arc<Tensor>], outputs: &mut [Arc<Tensor>]) -> Result<()> {
        if inputs.is_empty() || outputs.is_empty() {
            return Err(Error::EmptyTensor {
                op: "expression forward",
            });
        }
        let batch = outputs.len();
        if inputs.len() % batch != 0 {
            bail!(
                "expression forward: {} input tensors do not divide into batches of {}",
                inputs.len(),
                batch
            );
        }
        let operand_count = inputs.len() / batch;

        let mut stack: Vec<Vec<Arc<Tensor>>> = Vec::new();
        for step in &self.steps {
            match step {
                ExprStep::Ref(i) => {
                    if *i >= operand_count {
                        bail!(
                            "expression '{}' references operand @{} but only {} are wired",
                            self.expression,
                            i,
                            operand_count
                        );
                    }
                    stack.push(inputs[i * batch..(i + 1) * batch].to_vec());
                }
                ExprStep::Add | ExprStep::Mul => {
                    let rhs = stack.pop().ok_or_else(|| {
                        Error::msg(format!("expression '{}' underflows its stack", self.expression))
                    })?;
                    let lhs = stack.pop().ok_or_else(|| {
                        Error::msg(format!("expression '{}' underflows its stack", self.expression))
                    })?;
                    let mut result = Vec::with_capacity(batch);
                    for (a, b) in lhs.iter().zip(rhs.iter()) {
                        let combined = match step {
                            ExprStep::Add => element_add(a, b)?,
                            _ => element_multiply(a, b)?,
                        };
                        result.push(Arc::new(combined));
                    }
                    stack.push(result);
                }
            }
        }

        let result = match stack.pop() {
            Some(batch) if stack.is_empty() => batch,
            _ => bail!(
                "expression '{}' left {} batches on the stack, expected 1",
                self.expression,
                stack.len() + 1
            ),
        };
        for (slot, tensor) in outputs.iter_mut().zip(result) {
            *slot = tensor;
        }
        Ok(())
    }
}
