// Pooling layers — max pooling and adaptive average pooling
//
// Max pooling pads with the most negative float so padding never wins a
// window maximum. Adaptive average pooling derives its window from the
// target output size, with window == stride, and ignores any input
// remainder past the last full window.

use std::sync::Arc;

use stoat_core::util::clone_tensor;
use stoat_core::{bail, Result, Tensor};

use crate::layer::conv::pair_param;
use crate::layer::{check_batch, Layer};
use crate::runtime::RuntimeOperator;

/// Strided window maximum over each channel plane.
pub struct MaxPoolingLayer {
    kernel_size: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
}

impl MaxPoolingLayer {
    pub fn build(op: &RuntimeOperator) -> Result<Box<dyn Layer>> {
        let kernel_size = pair_param(op, "kernel_size")?;
        let stride = pair_param(op, "stride")?;
        let padding = pair_param(op, "padding")?;
        if kernel_size.0 == 0 || kernel_size.1 == 0 {
            bail!("operator '{}': kernel size must be positive", op.name);
        }
        if stride.0 == 0 || stride.1 == 0 {
            bail!("operator '{}': stride must be positive", op.name);
        }
        Ok(Box::new(MaxPoolingLayer {
            kernel_size,
            stride,
            padding,
        }))
    }
}

impl Layer for MaxPoolingLayer {
    fn name(&self) -> &str {
        "MaxPooling"
    }

    fn forward(&self, inputs: &[Arc<Tensor>], outputs: &mut [Arc<Tensor>]) -> Result<()> {
        check_batch(inputs, outputs, "max pooling forward")?;
        let (kernel_h, kernel_w) = self.kernel_size;
        let (stride_h, stride_w) = self.stride;
        let (padding_h, padding_w) = self.padding;

        for (input, slot) in inputs.iter().zip(outputs.iter_mut()) {
            let mut input_data = clone_tensor(input);
            if padding_h != 0 || padding_w != 0 {
                input_data.padding(&[padding_w, padding_w, padding_h, padding_h], f32::MIN)?;
            }

            let [input_c, input_h, input_w] = input_data.shape();
            if input_h < kernel_h || input_w < kernel_w {
                bail!(
                    "max pooling forward: input {}x{} is smaller than the {}x{} window",
                    input_h,
                    input_w,
                    kernel_h,
                    kernel_w
                );
            }
            let output_h = (input_h - kernel_h) / stride_h + 1;
            let output_w = (input_w - kernel_w) / stride_w + 1;

            let mut output = Tensor::new(input_c, output_h, output_w);
            for c in 0..input_c {
                for r in (0..=input_h - kernel_h).step_by(stride_h) {
                    for w in (0..=input_w - kernel_w).step_by(stride_w) {
                        let mut max = f32::MIN;
                        for kr in 0..kernel_h {
                            for kw in 0..kernel_w {
                                max = max.max(input_data.at(c, r + kr, w + kw));
                            }
                        }
                        *output.at_mut(c, r / stride_h, w / stride_w) = max;
                    }
                }
            }
            *slot = Arc::new(output);
        }
        Ok(())
    }
}

/// Window average with the window size derived from a target output size.
pub struct AdaptiveAveragePoolingLayer {
    output_h: usize,
    output_w: usize,
}

impl AdaptiveAveragePoolingLayer {
    pub fn build(op: &RuntimeOperator) -> Result<Box<dyn Layer>> {
        let (output_h, output_w) = pair_param(op, "output_size")?;
        if output_h == 0 || output_w == 0 {
            bail!("operator '{}': output size must be positive", op.name);
        }
        Ok(Box::new(AdaptiveAveragePoolingLayer { output_h, output_w }))
    }
}

impl Layer for AdaptiveAveragePoolingLayer {
    fn name(&self) -> &str {
        "AdaptiveAveragePooling"
    }

    fn forward(&self, inputs: &[Arc<Tensor>], outputs: &mut [Arc<Tensor>]) -> Result<()> {
        check_batch(inputs, outputs, "adaptive average pooling forward")?;

        for (input, slot) in inputs.iter().zip(outputs.iter_mut()) {
            let [input_c, input_h, input_w] = input.shape();
            if input_h < self.output_h || input_w < self.output_w {
                bail!(
                    "adaptive average pooling forward: input {}x{} is smaller than the {}x{} target",
                    input_h,
                    input_w,
                    self.output_h,
                    self.output_w
                );
            }
            // Window equals stride: no overlap, trailing remainder ignored.
            let pooling_h = input_h / self.output_h;
            let pooling_w = input_w / self.output_w;
            let window = (pooling_h * pooling_w) as f32;

            let mut output = Tensor::new(input_c, self.output_h, self.output_w);
            for c in 0..input_c {
                for out_r in 0..self.output_h {
                    for out_w in 0..self.output_w {
                        let mut sum = 0.0;
                        for kr in 0..pooling_h {
                            for kw in 0..pooling_w {
                                sum += input.at(c, out_r * pooling_h + kr, out_w * pooling_w + kw);
                            }
                        }
                        *output.at_mut(c, out_r, out_w) = sum / window;
                    }
                }
            }
            *slot = Arc::new(output);
        }
        Ok(())
    }
}
