//! # taskmix-core
//!
//! Core types shared by the taskmix crates.
//!
//! This crate provides:
//! - [`Error`] / [`Result`]: the single error type for composition and item access
//! - [`Shape`]: shape and row-major strides
//! - [`DType`]: element types (bool, i64, f64)
//! - [`Tensor`]: small immutable dense tensor used for sample fields

pub mod dtype;
pub mod error;
pub mod shape;
pub mod tensor;

pub use dtype::{DType, WithDType};
pub use error::{Error, Result};
pub use shape::Shape;
pub use tensor::{Storage, Tensor};
