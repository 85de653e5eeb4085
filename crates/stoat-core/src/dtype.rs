use std::fmt;

// DType — element type tags for operands and serialized weight blobs
//
// The runtime computes in f32 only, but model files declare an element type
// for every operand and attribute. The tags are kept so that decoding a
// weight blob can be type-checked instead of blindly reinterpreted.

/// Element type tag carried by operands and attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DType {
    /// Unknown or undeclared type. Never valid for computation.
    #[default]
    Unknown,
    F32,
    F64,
    I32,
    I64,
    U8,
}

impl DType {
    /// Size of one element in bytes. Unknown has no size and returns 0.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::Unknown => 0,
            DType::F32 | DType::I32 => 4,
            DType::F64 | DType::I64 => 8,
            DType::U8 => 1,
        }
    }

    /// Parse the tag names used in serialized graph descriptions.
    pub fn from_str_tag(tag: &str) -> Option<DType> {
        match tag {
            "f32" => Some(DType::F32),
            "f64" => Some(DType::F64),
            "i32" => Some(DType::I32),
            "i64" => Some(DType::I64),
            "u8" => Some(DType::U8),
            "unknown" => Some(DType::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Unknown => "unknown",
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::U8 => "u8",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elem_sizes() {
        assert_eq!(DType::F32.size_in_bytes(), 4);
        assert_eq!(DType::F64.size_in_bytes(), 8);
        assert_eq!(DType::U8.size_in_bytes(), 1);
        assert_eq!(DType::Unknown.size_in_bytes(), 0);
    }

    #[test]
    fn test_tag_roundtrip() {
        assert_eq!(DType::from_str_tag("f32"), Some(DType::F32));
        assert_eq!(DType::from_str_tag("i64"), Some(DType::I64));
        assert_eq!(DType::from_str_tag("float"), None);
        assert_eq!(format!("{}", DType::F32), "f32");
    }
}
