// RuntimeParameter — typed operator configuration values
//
// One parameter configures one aspect of an operator (stride, kernel size,
// bias flag, the expression string of an elementwise node). The set of
// shapes a parameter can take is closed, so it is a plain enum matched
// exhaustively at the point of use; a wrong-variant access is an ordinary
// error, not a failed downcast.

use stoat_core::{Error, Result};

/// A typed operator configuration value (not a trained weight).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RuntimeParameter {
    /// Declared but untyped; never valid to read.
    #[default]
    Unknown,
    Bool(bool),
    Int(i32),
    Float(f32),
    String(String),
    IntArray(Vec<i32>),
    FloatArray(Vec<f32>),
    StringArray(Vec<String>),
}

impl RuntimeParameter {
    /// The variant name, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeParameter::Unknown => "unknown",
            RuntimeParameter::Bool(_) => "bool",
            RuntimeParameter::Int(_) => "int",
            RuntimeParameter::Float(_) => "float",
            RuntimeParameter::String(_) => "string",
            RuntimeParameter::IntArray(_) => "int array",
            RuntimeParameter::FloatArray(_) => "float array",
            RuntimeParameter::StringArray(_) => "string array",
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            RuntimeParameter::Bool(v) => Ok(*v),
            other => Err(type_error("bool", other)),
        }
    }

    pub fn as_int(&self) -> Result<i32> {
        match self {
            RuntimeParameter::Int(v) => Ok(*v),
            other => Err(type_error("int", other)),
        }
    }

    pub fn as_float(&self) -> Result<f32> {
        match self {
            RuntimeParameter::Float(v) => Ok(*v),
            other => Err(type_error("float", other)),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            RuntimeParameter::String(v) => Ok(v),
            other => Err(type_error("string", other)),
        }
    }

    pub fn as_int_array(&self) -> Result<&[i32]> {
        match self {
            RuntimeParameter::IntArray(v) => Ok(v),
            other => Err(type_error("int array", other)),
        }
    }

    pub fn as_float_array(&self) -> Result<&[f32]> {
        match self {
            RuntimeParameter::FloatArray(v) => Ok(v),
            other => Err(type_error("float array", other)),
        }
    }

    pub fn as_str_array(&self) -> Result<&[String]> {
        match self {
            RuntimeParameter::StringArray(v) => Ok(v),
            other => Err(type_error("string array", other)),
        }
    }
}

fn type_error(expected: &'static str, got: &RuntimeParameter) -> Error {
    Error::ParameterType {
        expected,
        got: got.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_access() {
        let p = RuntimeParameter::IntArray(vec![3, 3]);
        assert_eq!(p.as_int_array().unwrap(), &[3, 3]);
        assert!(p.as_int().is_err());
        assert!(RuntimeParameter::Bool(true).as_bool().unwrap());
    }

    #[test]
    fn test_unknown_never_reads() {
        let p = RuntimeParameter::Unknown;
        assert!(p.as_bool().is_err());
        assert!(p.as_str().is_err());
    }
}
