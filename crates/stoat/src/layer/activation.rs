// Activation layers — elementwise nonlinearities
//
// Both kernels read their input and write a fresh tensor into the output
// slot, leaving the shared input untouched.

use std::sync::Arc;

use stoat_core::util::clone_tensor;
use stoat_core::{Error, Result, Tensor};

use crate::layer::{check_batch, Layer};
use crate::runtime::RuntimeOperator;

/// `max(x, 0)`, elementwise.
pub struct ReluLayer;

impl ReluLayer {
    pub fn build(_op: &RuntimeOperator) -> Result<Box<dyn Layer>> {
        Ok(Box::new(ReluLayer))
    }
}

impl Layer for ReluLayer {
    fn name(&self) -> &str {
        "ReLU"
    }

    fn forward(&self, inputs: &[Arc<Tensor>], outputs: &mut [Arc<Tensor>]) -> Result<()> {
        check_batch(inputs, outputs, "relu forward")?;
        for (input, slot) in inputs.iter().zip(outputs.iter_mut()) {
            if input.is_empty() {
                return Err(Error::EmptyTensor { op: "relu forward" });
            }
            let mut out = clone_tensor(input);
            out.transform(|v| if v > 0.0 { v } else { 0.0 });
            *slot = Arc::new(out);
        }
        Ok(())
    }
}

/// `1 / (1 + e^-x)`, elementwise.
pub struct SigmoidLayer;

impl SigmoidLayer {
    pub fn build(_op: &RuntimeOperator) -> Result<Box<dyn Layer>> {
        Ok(Box::new(SigmoidLayer))
    }
}

impl Layer for SigmoidLayer {
    fn name(&self) -> &str {
        "Sigmoid"
    }

    fn forward(&self, inputs: &[Arc<Tensor>], outputs: &mut [Arc<Tensor>]) -> Result<()> {
        check_batch(inputs, outputs, "sigmoid forward")?;
        for (input, slot) in inputs.iter().zip(outputs.iter_mut()) {
            if input.is_empty() {
                return Err(Error::EmptyTensor { op: "sigmoid forward" });
            }
            let mut out = clone_tensor(input);
            out.transform(|v| 1.0 / (1.0 + (-v).exp()));
            *slot = Arc::new(out);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_of(vals: &[f32]) -> Vec<Arc<Tensor>> {
        let mut t = Tensor::new(1, 1, vals.len());
        t.fill_with(vals, true).unwrap();
        vec![Arc::new(t)]
    }

    #[test]
    fn test_relu_thresholds_at_zero() {
        let inputs = batch_of(&[-1.0, -2.0, 3.0]);
        let mut outputs = vec![Arc::new(Tensor::new(1, 1, 3))];
        ReluLayer.forward(&inputs, &mut outputs).unwrap();
        assert_eq!(outputs[0].values(true), vec![0.0, 0.0, 3.0]);
        // input is untouched
        assert_eq!(inputs[0].values(true), vec![-1.0, -2.0, 3.0]);
    }

    #[test]
    fn test_sigmoid_values() {
        let inputs = batch_of(&[0.0, 100.0, -100.0]);
        let mut outputs = vec![Arc::new(Tensor::new(1, 1, 3))];
        SigmoidLayer.forward(&inputs, &mut outputs).unwrap();
        let got = outputs[0].values(true);
        assert!((got[0] - 0.5).abs() < 1e-6);
        assert!((got[1] - 1.0).abs() < 1e-6);
        assert!(got[2].abs() < 1e-6);
    }

    #[test]
    fn test_empty_batch_is_error() {
        let mut outputs = Vec::new();
        assert!(ReluLayer.forward(&[], &mut outputs).is_err());
    }
}
