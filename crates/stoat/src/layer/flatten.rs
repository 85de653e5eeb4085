// Flatten — reshape a span of dimensions into one
//
// Dims are counted over the full NCHW shape (batch included), matching the
// convention of the exporting framework; negative dims count from the end.
// The two supported spans are (1,3), the full per-element flatten, and
// (2,3), the per-channel flatten. The reshape keeps logical row-major
// element order.

use std::sync::Arc;

use stoat_core::util::clone_tensor;
use stoat_core::{bail, Result, Tensor};

use crate::layer::{check_batch, Layer};
use crate::runtime::RuntimeOperator;

pub struct FlattenLayer {
    start_dim: i32,
    end_dim: i32,
}

impl FlattenLayer {
    pub fn build(op: &RuntimeOperator) -> Result<Box<dyn Layer>> {
        let start_dim = op.param("start_dim")?.as_int()?;
        let end_dim = op.param("end_dim")?.as_int()?;
        Ok(Box::new(FlattenLayer { start_dim, end_dim }))
    }
}

impl Layer for FlattenLayer {
    fn name(&self) -> &str {
        "Flatten"
    }

    fn forward(&self, inputs: &[Arc<Tensor>], outputs: &mut [Arc<Tensor>]) -> Result<()> {
        check_batch(inputs, outputs, "flatten forward")?;

        let total_dims = 4; // NCHW
        let start_dim = if self.start_dim < 0 {
            self.start_dim + total_dims
        } else {
            self.start_dim
        };
        let end_dim = if self.end_dim < 0 {
            self.end_dim + total_dims
        } else {
            self.end_dim
        };

        for (input, slot) in inputs.iter().zip(outputs.iter_mut()) {
            let [channels, rows, cols] = input.shape();
            let mut out = clone_tensor(input);
            match (start_dim, end_dim) {
                (1, 3) => out.reshape(&[channels * rows * cols], true)?,
                (2, 3) => out.reshape(&[channels, rows * cols], true)?,
                _ => bail!(
                    "flatten forward: unsupported dim range ({}, {})",
                    self.start_dim,
                    self.end_dim
                ),
            }
            *slot = Arc::new(out);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input_2x2x2() -> Arc<Tensor> {
        let vals: Vec<f32> = (1..=8).map(|v| v as f32).collect();
        let mut t = Tensor::new(2, 2, 2);
        t.fill_with(&vals, true).unwrap();
        Arc::new(t)
    }

    #[test]
    fn test_full_flatten() {
        let layer = FlattenLayer {
            start_dim: 1,
            end_dim: 3,
        };
        let inputs = vec![input_2x2x2()];
        let mut outputs = vec![Arc::new(Tensor::new(1, 1, 8))];
        layer.forward(&inputs, &mut outputs).unwrap();
        assert_eq!(outputs[0].raw_shape(), &[8]);
        assert_eq!(
            outputs[0].values(true),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]
        );
    }

    #[test]
    fn test_per_channel_flatten() {
        let layer = FlattenLayer {
            start_dim: 2,
            end_dim: 3,
        };
        let inputs = vec![input_2x2x2()];
        let mut outputs = vec![Arc::new(Tensor::new(1, 2, 4))];
        layer.forward(&inputs, &mut outputs).unwrap();
        assert_eq!(outputs[0].raw_shape(), &[2, 4]);
    }

    #[test]
    fn test_negative_dims_count_from_end() {
        let layer = FlattenLayer {
            start_dim: 1,
            end_dim: -1,
        };
        let inputs = vec![input_2x2x2()];
        let mut outputs = vec![Arc::new(Tensor::new(1, 1, 8))];
        layer.forward(&inputs, &mut outputs).unwrap();
        assert_eq!(outputs[0].raw_shape(), &[8]);
    }

    #[test]
    fn test_unsupported_range_is_error() {
        let layer = FlattenLayer {
            start_dim: 0,
            end_dim: 3,
        };
        let inputs = vec![input_2x2x2()];
        let mut outputs = vec![Arc::new(Tensor::new(1, 1, 8))];
        assert!(layer.forward(&inputs, &mut outputs).is_err());
    }
}
