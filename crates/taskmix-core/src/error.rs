use crate::dtype::DType;
use crate::shape::Shape;

/// All errors that can occur within taskmix.
///
/// Dataset composition and item access share one error type, so a failure
/// deep inside a decorator chain surfaces unchanged at the data-loading call
/// site. None of these are retried; callers treat them as fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A dataset without a reportable length was used where one is required.
    #[error("dataset `{dataset}` does not report a size")]
    NotSized { dataset: String },

    /// A transform's size precondition was violated.
    #[error("{op} ({requested}) is incompatible with dataset `{dataset}` of size {actual}")]
    SizeMismatch {
        op: &'static str,
        dataset: String,
        requested: usize,
        actual: usize,
    },

    /// The combined length of concatenated datasets does not fit in `usize`.
    #[error("combined length overflows usize when appending dataset `{dataset}`")]
    LengthOverflow { dataset: String },

    /// Item access outside the reported length.
    #[error("index {index} is out of bounds for dataset of size {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A retrieved item (or field) is not of the expected kind.
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    /// A field configured for one-hot expansion is absent (or not usable).
    #[error("field `{field}` must be defined{}", reason_suffix(.reason))]
    MissingField {
        field: String,
        reason: Option<String>,
    },

    /// Unrecognised sampling policy tag.
    #[error("unsupported sampling policy `{0}`")]
    UnsupportedSamplingPolicy(String),

    /// No tasks configured.
    #[error("no tasks found in the dataset config")]
    EmptyTaskList,

    /// No constructor registered for a dataset format.
    #[error("unknown dataset format `{format}` (registered: {known:?})")]
    UnknownFormat { format: String, known: Vec<String> },

    /// A configuration value is semantically invalid.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Shape mismatch between two tensors.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: Shape, got: Shape },

    /// Operation requires a specific rank.
    #[error("rank mismatch: expected rank {expected}, got {got}")]
    RankMismatch { expected: usize, got: usize },

    /// DType mismatch.
    #[error("dtype mismatch: expected {expected}, got {got}")]
    DTypeMismatch { expected: DType, got: DType },

    /// Dimension index out of range for the tensor's rank.
    #[error("dimension out of range: dim {dim} for tensor with {rank} dimensions")]
    DimOutOfRange { dim: usize, rank: usize },

    /// Tried to read a scalar from a tensor with more than one element.
    #[error("not a scalar: tensor has shape {shape}")]
    NotAScalar { shape: Shape },

    /// Element count mismatch when creating a tensor from a vec.
    #[error("element count mismatch: shape {shape} requires {expected} elements, got {got}")]
    ElementCountMismatch {
        shape: Shape,
        expected: usize,
        got: usize,
    },

    /// Cannot reshape because element counts differ.
    #[error(
        "cannot reshape: source has {src} elements, target shape {dst_shape} has {dst} elements"
    )]
    ReshapeElementMismatch {
        src: usize,
        dst: usize,
        dst_shape: Shape,
    },

    /// Config (de)serialization failure.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(r) => format!(" ({r})"),
        None => String::new(),
    }
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }

    /// A configured field is absent.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Error::MissingField {
            field: field.into(),
            reason: None,
        }
    }

    /// A configured field exists but cannot be used as required.
    pub fn unusable_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MissingField {
            field: field.into(),
            reason: Some(reason.into()),
        }
    }

    /// Something was not of the expected kind.
    pub fn type_mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }
}

/// Convenience Result type used throughout taskmix.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_message() {
        let e = Error::missing_field("energy");
        assert_eq!(e.to_string(), "field `energy` must be defined");
        let e = Error::unusable_field("forces", "must be a tensor");
        assert_eq!(
            e.to_string(),
            "field `forces` must be defined (must be a tensor)"
        );
    }

    #[test]
    fn size_mismatch_message() {
        let e = Error::SizeMismatch {
            op: "expand",
            dataset: "toy".into(),
            requested: 3,
            actual: 5,
        };
        assert_eq!(
            e.to_string(),
            "expand (3) is incompatible with dataset `toy` of size 5"
        );
    }

    #[test]
    fn bail_returns_msg() {
        fn fails() -> Result<()> {
            crate::bail!("bad value {}", 7);
        }
        assert!(matches!(fails(), Err(Error::Msg(m)) if m == "bad value 7"));
    }
}
