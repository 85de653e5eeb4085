// RuntimeAttribute — serialized trained weights
//
// An attribute is an immutable byte buffer with declared element type and
// shape, exactly as it sits in the weights file. Keeping bytes instead of
// decoded values makes loading cheap; layers decode on demand, and the
// decode is type-checked against the declared tag.

use stoat_core::{DType, Error, Result};

/// An immutable trained weight blob with declared shape and element type.
#[derive(Debug, Clone, Default)]
pub struct RuntimeAttribute {
    /// Raw little-endian bytes of the weight tensor.
    pub data: Vec<u8>,
    /// Declared shape of the weight tensor, outermost dim first.
    pub shape: Vec<usize>,
    /// Declared element type.
    pub dtype: DType,
}

impl RuntimeAttribute {
    /// Decode the buffer as a vector of f32.
    ///
    /// Fails if the declared type disagrees or the buffer size is not a
    /// multiple of the element size.
    pub fn decode_f32(&self) -> Result<Vec<f32>> {
        if self.data.is_empty() {
            return Err(Error::msg("attribute weight data is empty"));
        }
        if self.dtype != DType::F32 {
            return Err(Error::DTypeMismatch {
                expected: DType::F32,
                got: self.dtype,
            });
        }
        let elem_size = DType::F32.size_in_bytes();
        if self.data.len() % elem_size != 0 {
            return Err(Error::AttributeSize {
                len: self.data.len(),
                elem_size,
            });
        }
        Ok(self
            .data
            .chunks_exact(elem_size)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    /// Number of declared elements (product of the shape).
    pub fn elem_count(&self) -> usize {
        self.shape.iter().product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_decode_f32() {
        let attr = RuntimeAttribute {
            data: f32_bytes(&[1.0, -2.5, 0.0]),
            shape: vec![3],
            dtype: DType::F32,
        };
        assert_eq!(attr.decode_f32().unwrap(), vec![1.0, -2.5, 0.0]);
        assert_eq!(attr.elem_count(), 3);
    }

    #[test]
    fn test_decode_rejects_wrong_dtype() {
        let attr = RuntimeAttribute {
            data: f32_bytes(&[1.0]),
            shape: vec![1],
            dtype: DType::I32,
        };
        assert!(matches!(
            attr.decode_f32(),
            Err(Error::DTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_buffer() {
        let attr = RuntimeAttribute {
            data: vec![0u8; 6],
            shape: vec![2],
            dtype: DType::F32,
        };
        assert!(matches!(attr.decode_f32(), Err(Error::AttributeSize { .. })));
    }
}
