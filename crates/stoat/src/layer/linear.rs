// Linear — fully connected layer
//
// Inputs arrive as (1, feature_dims, in_features); usually feature_dims is
// 1 because a flatten precedes this layer. The weight matrix is stored
// row-major as (out_features, in_features), so the computation is
// `x @ W^T + b`, one output row per feature row.

use std::sync::Arc;

use stoat_core::{bail, Result, Tensor};

use crate::layer::{check_batch, Layer};
use crate::runtime::RuntimeOperator;

pub struct LinearLayer {
    /// Weight values, row-major (out_features, in_features).
    weight: Vec<f32>,
    /// One value per output feature; empty when the layer has no bias.
    bias: Vec<f32>,
    in_features: usize,
    out_features: usize,
}

impl LinearLayer {
    pub fn build(op: &RuntimeOperator) -> Result<Box<dyn Layer>> {
        let has_bias = op.param("bias")?.as_bool()?;

        let weight_attr = op.attribute("weight")?;
        if weight_attr.shape.len() != 2 {
            bail!(
                "operator '{}': linear weight must be 2-D, got {:?}",
                op.name,
                weight_attr.shape
            );
        }
        let out_features = weight_attr.shape[0];
        let in_features = weight_attr.shape[1];
        let weight = weight_attr.decode_f32()?;
        if weight.len() != out_features * in_features {
            bail!(
                "operator '{}': weight has {} values, expected {}",
                op.name,
                weight.len(),
                out_features * in_features
            );
        }

        let bias = if has_bias {
            let bias = op.attribute("bias")?.decode_f32()?;
            if bias.len() != out_features {
                bail!(
                    "operator '{}': bias has {} values, expected {}",
                    op.name,
                    bias.len(),
                    out_features
                );
            }
            bias
        } else {
            Vec::new()
        };

        Ok(Box::new(LinearLayer {
            weight,
            bias,
            in_features,
            out_features,
        }))
    }
}

impl Layer for LinearLayer {
    fn name(&self) -> &str {
        "Linear"
    }

    fn forward(&self, inputs: &[Arc<Tensor>], outputs: &mut [Arc<Tensor>]) -> Result<()> {
        check_batch(inputs, outputs, "linear forward")?;

        for (input, slot) in inputs.iter().zip(outputs.iter_mut()) {
            let [input_c, feature_dims, in_features] = input.shape();
            if input_c != 1 {
                bail!("linear forward: input must have one channel, got {}", input_c);
            }
            if in_features != self.in_features {
                bail!(
                    "linear forward: input has {} features, weight expects {}",
                    in_features,
                    self.in_features
                );
            }

            let mut output = Tensor::new(1, feature_dims, self.out_features);
            for d in 0..feature_dims {
                for j in 0..self.out_features {
                    let row = &self.weight[j * self.in_features..(j + 1) * self.in_features];
                    let mut acc = self.bias.get(j).copied().unwrap_or(0.0);
                    for (i, w) in row.iter().enumerate() {
                        acc += input.at(0, d, i) * w;
                    }
                    *output.at_mut(0, d, j) = acc;
                }
            }
            *slot = Arc::new(output);
        }
        Ok(())
    }
}
