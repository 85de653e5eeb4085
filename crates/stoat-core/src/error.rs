use crate::dtype::DType;

/// All errors that can occur within stoat.
///
/// This enum captures every failure mode: shape and dtype mismatches,
/// out-of-bounds access, malformed models, registry misuse, expression
/// syntax errors, and scheduler deadlocks. Using a single error type across
/// the workspace simplifies error propagation.
///
/// The taxonomy follows the runtime's contract model: structural violations
/// (a malformed model or a programming error) surface as errors the caller
/// is expected to abort on; they are never retried internally.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Shape mismatch between a declared shape and an actual one.
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// Element count mismatch when filling or reshaping a tensor.
    #[error("element count mismatch: expected {expected} elements, got {got}")]
    ElementCountMismatch { expected: usize, got: usize },

    /// An operation touched an empty (zero-sized) tensor.
    #[error("empty tensor in {op}")]
    EmptyTensor { op: &'static str },

    /// DType mismatch, e.g. decoding an f32 weight blob declared as i32.
    #[error("dtype mismatch: expected {expected}, got {got}")]
    DTypeMismatch { expected: DType, got: DType },

    /// A weight blob whose byte length is not a multiple of the element size.
    #[error("attribute of {len} bytes is not a multiple of the {elem_size}-byte element size")]
    AttributeSize { len: usize, elem_size: usize },

    /// An operator configuration value is missing from the node.
    #[error("operator '{op}' has no parameter '{name}'")]
    MissingParameter { op: String, name: String },

    /// An operator configuration value has the wrong variant.
    #[error("parameter type mismatch: expected {expected}, got {got}")]
    ParameterType {
        expected: &'static str,
        got: &'static str,
    },

    /// A trained weight blob is missing from the node.
    #[error("operator '{op}' has no attribute '{name}'")]
    MissingAttribute { op: String, name: String },

    /// A layer type was registered twice in the same registry.
    #[error("layer type '{type_name}' has already been registered")]
    DuplicateLayer { type_name: String },

    /// No creator is registered for this operator type.
    #[error("can not find the layer type '{type_name}'")]
    UnknownLayer { type_name: String },

    /// A node name did not resolve to a graph node.
    #[error("operator '{name}' not found in graph")]
    NodeNotFound { name: String },

    /// The scheduler drained its queue with a node still waiting on inputs.
    #[error("operator '{name}' is not ready and the work queue is empty (malformed graph)")]
    Deadlock { name: String },

    /// Syntax error in an elementwise expression.
    #[error("invalid expression at position {pos}: {reason}")]
    ExprParse { pos: usize, reason: String },

    /// Underlying I/O failure while loading a model or data file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }
}

/// Convenience Result type used throughout stoat.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}
