use std::fmt;

use serde::{Deserialize, Serialize};

// DType: element types carried by sample tensors
//
//   Bool -> masks (task presence)
//   I64  -> indices and labels (task_idx, atomic numbers)
//   F64  -> physical targets (energies, forces)

/// Enum of all supported element data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Bool,
    I64,
    F64,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::Bool => "bool",
            DType::I64 => "i64",
            DType::F64 => "f64",
        };
        write!(f, "{}", s)
    }
}

// WithDType: Trait that connects Rust element types to the DType enum
//
// Lets tensor constructors and readback be written once:
//
//   Tensor::from_vec(vec![1.0, 2.0], 2)?      // F64
//   tensor.to_vec::<i64>()?                   // I64 or DTypeMismatch

/// Trait implemented by Rust types that can be stored in a tensor.
pub trait WithDType: Copy + Send + Sync + PartialEq + fmt::Debug + 'static {
    /// The corresponding DType enum variant.
    const DTYPE: DType;

    /// The zero value, used for the non-owning slots of one-hot expansions.
    fn zero() -> Self;

    /// Wrap a vec into type-tagged storage.
    fn into_storage(data: Vec<Self>) -> crate::tensor::Storage;

    /// Borrow storage as a typed slice, if the dtype matches.
    fn slice(storage: &crate::tensor::Storage) -> Option<&[Self]>;
}

impl WithDType for bool {
    const DTYPE: DType = DType::Bool;
    fn zero() -> Self {
        false
    }
    fn into_storage(data: Vec<Self>) -> crate::tensor::Storage {
        crate::tensor::Storage::Bool(data)
    }
    fn slice(storage: &crate::tensor::Storage) -> Option<&[Self]> {
        match storage {
            crate::tensor::Storage::Bool(v) => Some(v),
            _ => None,
        }
    }
}

impl WithDType for i64 {
    const DTYPE: DType = DType::I64;
    fn zero() -> Self {
        0
    }
    fn into_storage(data: Vec<Self>) -> crate::tensor::Storage {
        crate::tensor::Storage::I64(data)
    }
    fn slice(storage: &crate::tensor::Storage) -> Option<&[Self]> {
        match storage {
            crate::tensor::Storage::I64(v) => Some(v),
            _ => None,
        }
    }
}

impl WithDType for f64 {
    const DTYPE: DType = DType::F64;
    fn zero() -> Self {
        0.0
    }
    fn into_storage(data: Vec<Self>) -> crate::tensor::Storage {
        crate::tensor::Storage::F64(data)
    }
    fn slice(storage: &crate::tensor::Storage) -> Option<&[Self]> {
        match storage {
            crate::tensor::Storage::F64(v) => Some(v),
            _ => None,
        }
    }
}
