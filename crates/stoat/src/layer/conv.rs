// Convolution — grouped 2-D convolution via im2col
//
// Each forward pass clones the batch element, zero-pads it if the layer has
// padding, unrolls the input windows of one channel group into the columns
// of an im2col matrix, flattens that group's kernels into rows, and takes
// row-by-column dot products. One kernel row yields one output channel
// plane; window positions walk columns first, rows inner, so the products
// land in the output plane's column-major order without a reshape.

use std::sync::Arc;

use stoat_core::util::clone_tensor;
use stoat_core::{bail, Result, Tensor};

use crate::layer::{check_batch, Layer};
use crate::runtime::RuntimeOperator;

/// Grouped im2col convolution over `(C, H, W)` inputs.
pub struct ConvLayer {
    /// One kernel per output channel, shaped `(in_channels / groups, Kh, Kw)`.
    kernels: Vec<Tensor>,
    /// One scalar per output channel; empty when the layer has no bias.
    bias: Vec<f32>,
    stride: (usize, usize),
    padding: (usize, usize),
    groups: usize,
}

/// Read a two-element int-array parameter as a `(h, w)` pair.
pub(crate) fn pair_param(op: &RuntimeOperator, name: &str) -> Result<(usize, usize)> {
    let values = op.param(name)?.as_int_array()?;
    if values.len() != 2 || values.iter().any(|&v| v < 0) {
        bail!("operator '{}': parameter '{}' must be two non-negative ints", op.name, name);
    }
    Ok((values[0] as usize, values[1] as usize))
}

impl ConvLayer {
    pub fn build(op: &RuntimeOperator) -> Result<Box<dyn Layer>> {
        let in_channels = op.param("in_channels")?.as_int()? as usize;
        let out_channels = op.param("out_channels")?.as_int()? as usize;
        let (kernel_h, kernel_w) = pair_param(op, "kernel_size")?;
        let stride = pair_param(op, "stride")?;
        let padding = pair_param(op, "padding")?;
        let groups = op.param("groups")?.as_int()? as usize;
        let has_bias = op.param("bias")?.as_bool()?;

        if stride.0 == 0 || stride.1 == 0 {
            bail!("operator '{}': stride must be positive", op.name);
        }
        if kernel_h == 0 || kernel_w == 0 {
            bail!("operator '{}': kernel size must be positive", op.name);
        }
        if groups == 0 || in_channels % groups != 0 || out_channels % groups != 0 {
            bail!(
                "operator '{}': groups {} must divide in_channels {} and out_channels {}",
                op.name,
                groups,
                in_channels,
                out_channels
            );
        }

        let kernel_c = in_channels / groups;
        let per_kernel = kernel_c * kernel_h * kernel_w;
        let weight = op.attribute("weight")?.decode_f32()?;
        if weight.len() != out_channels * per_kernel {
            bail!(
                "operator '{}': weight has {} values, expected {}",
                op.name,
                weight.len(),
                out_channels * per_kernel
            );
        }

        // The blob is row-major (out_c, kernel_c, Kh, Kw); each slice of
        // per_kernel values row-major-fills one kernel tensor.
        let mut kernels = Vec::with_capacity(out_channels);
        for k in 0..out_channels {
            let mut kernel = Tensor::new(kernel_c, kernel_h, kernel_w);
            kernel.fill_with(&weight[k * per_kernel..(k + 1) * per_kernel], true)?;
            kernels.push(kernel);
        }

        let bias = if has_bias {
            let bias = op.attribute("bias")?.decode_f32()?;
            if bias.len() != out_channels {
                bail!(
                    "operator '{}': bias has {} values, expected {}",
                    op.name,
                    bias.len(),
                    out_channels
                );
            }
            bias
        } else {
            Vec::new()
        };

        Ok(Box::new(ConvLayer {
            kernels,
            bias,
            stride,
            padding,
            groups,
        }))
    }
}

impl Layer for ConvLayer {
    fn name(&self) -> &str {
        "Conv"
    }

    fn forward(&self, inputs: &[Arc<Tensor>], outputs: &mut [Arc<Tensor>]) -> Result<()> {
        check_batch(inputs, outputs, "conv forward")?;
        let (stride_h, stride_w) = self.stride;
        let (padding_h, padding_w) = self.padding;

        for (input, slot) in inputs.iter().zip(outputs.iter_mut()) {
            // Clone before mutating: the input tensor is shared with the
            // producer and possibly other consumers.
            let mut input_data = clone_tensor(input);
            if padding_h != 0 || padding_w != 0 {
                input_data.padding(&[padding_w, padding_w, padding_h, padding_h], 0.0)?;
            }

            let [input_c, input_h, input_w] = input_data.shape();
            let output_c = self.kernels.len();
            let [kernel_c, kernel_h, kernel_w] = self.kernels[0].shape();

            if input_c != kernel_c * self.groups {
                bail!(
                    "conv forward: input has {} channels, kernels expect {} x {} groups",
                    input_c,
                    kernel_c,
                    self.groups
                );
            }
            if input_h < kernel_h || input_w < kernel_w {
                bail!(
                    "conv forward: input {}x{} is smaller than the {}x{} kernel",
                    input_h,
                    input_w,
                    kernel_h,
                    kernel_w
                );
            }

            let output_h = (input_h - kernel_h) / stride_h + 1;
            let output_w = (input_w - kernel_w) / stride_w + 1;
            let output_size = output_h * output_w;
            let kernel_plane = kernel_h * kernel_w;
            let kernel_len = kernel_plane * kernel_c;
            let kernels_per_group = output_c / self.groups;

            let mut output = Tensor::new(output_c, output_h, output_w);
            // im2col matrix, column-major: one window per column.
            let mut input_matrix = vec![0.0f32; kernel_len * output_size];
            let mut kernel_row = vec![0.0f32; kernel_len];

            for g in 0..self.groups {
                for ic in 0..kernel_c {
                    let channel = input_data.channel(g * kernel_c + ic);
                    let mut cur_col = 0;
                    let mut jcol = 0;
                    while jcol + kernel_w <= input_w {
                        let mut irow = 0;
                        while irow + kernel_h <= input_h {
                            let dst = cur_col * kernel_len + ic * kernel_plane;
                            // Each kernel column is contiguous in the
                            // column-major channel plane.
                            for x in 0..kernel_w {
                                let src = (jcol + x) * input_h + irow;
                                input_matrix[dst + x * kernel_h..dst + (x + 1) * kernel_h]
                                    .copy_from_slice(&channel[src..src + kernel_h]);
                            }
                            cur_col += 1;
                            irow += stride_h;
                        }
                        jcol += stride_w;
                    }
                }

                for k in 0..kernels_per_group {
                    let oc = g * kernels_per_group + k;
                    let kernel = &self.kernels[oc];
                    for ic in 0..kernel_c {
                        kernel_row[ic * kernel_plane..(ic + 1) * kernel_plane]
                            .copy_from_slice(kernel.channel(ic));
                    }
                    let bias = self.bias.get(oc).copied().unwrap_or(0.0);

                    let out_plane = output.channel_mut(oc);
                    for pos in 0..output_size {
                        let column = &input_matrix[pos * kernel_len..(pos + 1) * kernel_len];
                        let mut acc = bias;
                        for (a, b) in kernel_row.iter().zip(column) {
                            acc += a * b;
                        }
                        out_plane[pos] = acc;
                    }
                }
            }

            *slot = Arc::new(output);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv_with_kernels(kernels: Vec<Tensor>, bias: Vec<f32>, stride: (usize, usize), padding: (usize, usize), groups: usize) -> ConvLayer {
        ConvLayer {
            kernels,
            bias,
            stride,
            padding,
            groups,
        }
    }

    fn input_4x4() -> Arc<Tensor> {
        let vals: Vec<f32> = (1..=16).map(|v| v as f32).collect();
        let mut t = Tensor::new(1, 4, 4);
        t.fill_with(&vals, true).unwrap();
        Arc::new(t)
    }

    #[test]
    fn test_single_kernel_correlation() {
        // Kernel rows (1,1,1), (2,2,2), (3,3,3): every output cell is
        // row0_sum + 2*row1_sum + 3*row2_sum over the window.
        let mut kernel = Tensor::new(1, 3, 3);
        kernel
            .fill_with(&[1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0], true)
            .unwrap();
        let layer = conv_with_kernels(vec![kernel], Vec::new(), (1, 1), (0, 0), 1);

        let inputs = vec![input_4x4()];
        let mut outputs = vec![Arc::new(Tensor::new(1, 2, 2))];
        layer.forward(&inputs, &mut outputs).unwrap();

        let out = &outputs[0];
        assert_eq!(out.shape(), [1, 2, 2]);
        assert_eq!(out.values(true), vec![132.0, 150.0, 204.0, 222.0]);
    }

    #[test]
    fn test_stride_truncates_output() {
        let mut kernel = Tensor::new(1, 2, 2);
        kernel.fill_with(&[1.0; 4], true).unwrap();
        let layer = conv_with_kernels(vec![kernel], Vec::new(), (2, 2), (0, 0), 1);

        let inputs = vec![input_4x4()];
        let mut outputs = vec![Arc::new(Tensor::new(1, 2, 2))];
        layer.forward(&inputs, &mut outputs).unwrap();

        // window sums of the four non-overlapping 2x2 blocks
        assert_eq!(outputs[0].values(true), vec![14.0, 22.0, 46.0, 54.0]);
    }

    #[test]
    fn test_bias_added_per_output_channel() {
        let mut kernel = Tensor::new(1, 2, 2);
        kernel.fill_with(&[1.0; 4], true).unwrap();
        let layer = conv_with_kernels(vec![kernel], vec![0.5], (2, 2), (0, 0), 1);

        let inputs = vec![input_4x4()];
        let mut outputs = vec![Arc::new(Tensor::new(1, 2, 2))];
        layer.forward(&inputs, &mut outputs).unwrap();
        assert_eq!(outputs[0].values(true), vec![14.5, 22.5, 46.5, 54.5]);
    }

    #[test]
    fn test_grouped_channels_stay_separate() {
        // Two groups, identity 1x1 kernels: channel 0 scaled by 2, channel
        // 1 scaled by 3, no cross-channel mixing.
        let mut k0 = Tensor::new(1, 1, 1);
        k0.fill(2.0);
        let mut k1 = Tensor::new(1, 1, 1);
        k1.fill(3.0);
        let layer = conv_with_kernels(vec![k0, k1], Vec::new(), (1, 1), (0, 0), 2);

        let mut input = Tensor::new(2, 2, 2);
        input
            .fill_with(&[1.0, 2.0, 3.0, 4.0, 10.0, 20.0, 30.0, 40.0], true)
            .unwrap();
        let inputs = vec![Arc::new(input)];
        let mut outputs = vec![Arc::new(Tensor::new(2, 2, 2))];
        layer.forward(&inputs, &mut outputs).unwrap();

        assert_eq!(
            outputs[0].values(true),
            vec![2.0, 4.0, 6.0, 8.0, 30.0, 60.0, 90.0, 120.0]
        );
    }

    #[test]
    fn test_padding_extends_input() {
        // 1x1 input, 3x3 ones kernel, padding 1: the only window sums the
        // single real element.
        let mut kernel = Tensor::new(1, 3, 3);
        kernel.fill(1.0);
        let layer = conv_with_kernels(vec![kernel], Vec::new(), (1, 1), (1, 1), 1);

        let mut input = Tensor::new(1, 1, 1);
        input.fill(7.0);
        let inputs = vec![Arc::new(input.clone())];
        let mut outputs = vec![Arc::new(Tensor::new(1, 1, 1))];
        layer.forward(&inputs, &mut outputs).unwrap();
        assert_eq!(outputs[0].values(true), vec![7.0]);
        // caller's tensor was cloned, not padded in place
        assert_eq!(inputs[0].shape(), [1, 1, 1]);
    }

    #[test]
    fn test_input_smaller_than_kernel_is_error() {
        let mut kernel = Tensor::new(1, 3, 3);
        kernel.fill(1.0);
        let layer = conv_with_kernels(vec![kernel], Vec::new(), (1, 1), (0, 0), 1);

        let inputs = vec![Arc::new(Tensor::new(1, 2, 2))];
        let mut outputs = vec![Arc::new(Tensor::new(1, 1, 1))];
        assert!(layer.forward(&inputs, &mut outputs).is_err());
    }
}
