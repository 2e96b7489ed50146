// Tensor: dense, CPU-resident, immutable n-dimensional array
//
// Sample fields are small (a handful of scalars, per-node vectors). The
// tensor is row-major storage behind an `Arc` plus a shape, with
// only the operations the dataset layer needs.
//
// Storage is shared on clone. Every operation returns a new tensor, so a
// tensor obtained from a dataset can never be mutated through another handle.
// `deep_copy` detaches a tensor from the storage it shares.

use std::sync::Arc;

use crate::dtype::{DType, WithDType};
use crate::error::{Error, Result};
use crate::shape::Shape;

/// Type-tagged contiguous element buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    Bool(Vec<bool>),
    I64(Vec<i64>),
    F64(Vec<f64>),
}

impl Storage {
    pub fn dtype(&self) -> DType {
        match self {
            Storage::Bool(_) => DType::Bool,
            Storage::I64(_) => DType::I64,
            Storage::F64(_) => DType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Storage::Bool(v) => v.len(),
            Storage::I64(v) => v.len(),
            Storage::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// New storage holding `self[idx[0]], self[idx[1]], ...`.
    fn gather(&self, idx: &[usize]) -> Storage {
        match self {
            Storage::Bool(v) => Storage::Bool(idx.iter().map(|&i| v[i]).collect()),
            Storage::I64(v) => Storage::I64(idx.iter().map(|&i| v[i]).collect()),
            Storage::F64(v) => Storage::F64(idx.iter().map(|&i| v[i]).collect()),
        }
    }
}

/// An immutable n-dimensional array with cheap clones.
#[derive(Debug, Clone)]
pub struct Tensor {
    storage: Arc<Storage>,
    shape: Shape,
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && *self.storage == *other.storage
    }
}

impl Tensor {
    // Constructors

    /// Create a tensor from a flat row-major vec and a shape.
    pub fn from_vec<T: WithDType>(data: Vec<T>, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        if data.len() != shape.elem_count() {
            return Err(Error::ElementCountMismatch {
                expected: shape.elem_count(),
                got: data.len(),
                shape,
            });
        }
        Ok(Tensor {
            storage: Arc::new(T::into_storage(data)),
            shape,
        })
    }

    /// 1-D tensor copied from a slice.
    pub fn from_slice<T: WithDType>(data: &[T]) -> Self {
        Tensor {
            storage: Arc::new(T::into_storage(data.to_vec())),
            shape: Shape::from(data.len()),
        }
    }

    /// 0-D tensor holding a single value.
    pub fn scalar<T: WithDType>(value: T) -> Self {
        Tensor {
            storage: Arc::new(T::into_storage(vec![value])),
            shape: Shape::from(()),
        }
    }

    /// Boolean one-hot vector of length `num_classes` with `true` at `index`.
    pub fn one_hot(index: usize, num_classes: usize) -> Result<Self> {
        if index >= num_classes {
            return Err(Error::IndexOutOfRange {
                index,
                len: num_classes,
            });
        }
        let data: Vec<bool> = (0..num_classes).map(|i| i == index).collect();
        Tensor::from_vec(data, num_classes)
    }

    // Accessors

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn elem_count(&self) -> usize {
        self.shape.elem_count()
    }

    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Whether two tensors share the same underlying buffer.
    pub fn shares_storage(&self, other: &Tensor) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// A copy of this tensor backed by freshly allocated storage.
    pub fn deep_copy(&self) -> Self {
        Tensor {
            storage: Arc::new((*self.storage).clone()),
            shape: self.shape.clone(),
        }
    }

    // Shape manipulation

    /// View the same elements under a new shape.
    pub fn reshape(&self, new_shape: impl Into<Shape>) -> Result<Self> {
        let new_shape = new_shape.into();
        if new_shape.elem_count() != self.elem_count() {
            return Err(Error::ReshapeElementMismatch {
                src: self.elem_count(),
                dst: new_shape.elem_count(),
                dst_shape: new_shape,
            });
        }
        Ok(Tensor {
            storage: Arc::clone(&self.storage),
            shape: new_shape,
        })
    }

    /// Collapse to 1-D (`view(-1)`).
    pub fn flatten(&self) -> Self {
        Tensor {
            storage: Arc::clone(&self.storage),
            shape: Shape::from(self.elem_count()),
        }
    }

    /// Insert a size-1 dimension at `dim` (`0..=rank`).
    pub fn unsqueeze(&self, dim: usize) -> Result<Self> {
        if dim > self.rank() {
            return Err(Error::DimOutOfRange {
                dim,
                rank: self.rank(),
            });
        }
        let mut dims = self.dims().to_vec();
        dims.insert(dim, 1);
        self.reshape(dims)
    }

    /// Permute the dimensions of this tensor.
    ///
    /// permute(&[2, 0, 1]) on [A, B, C] → [C, A, B]
    ///
    /// Materializes a contiguous copy.
    pub fn permute(&self, dims: &[usize]) -> Result<Self> {
        let rank = self.rank();
        if dims.len() != rank {
            return Err(Error::RankMismatch {
                expected: rank,
                got: dims.len(),
            });
        }
        let mut seen = vec![false; rank];
        for &d in dims {
            if d >= rank {
                return Err(Error::DimOutOfRange { dim: d, rank });
            }
            if seen[d] {
                crate::bail!("permute: duplicate dimension {}", d);
            }
            seen[d] = true;
        }

        let old_dims = self.dims();
        let old_strides = self.shape.stride_contiguous();
        let new_dims: Vec<usize> = dims.iter().map(|&d| old_dims[d]).collect();
        let src_strides: Vec<usize> = dims.iter().map(|&d| old_strides[d]).collect();

        let n = self.elem_count();
        let mut index = Vec::with_capacity(n);
        let mut counter = vec![0usize; rank];
        for _ in 0..n {
            index.push(
                counter
                    .iter()
                    .zip(&src_strides)
                    .map(|(c, s)| c * s)
                    .sum::<usize>(),
            );
            for ax in (0..rank).rev() {
                counter[ax] += 1;
                if counter[ax] < new_dims[ax] {
                    break;
                }
                counter[ax] = 0;
            }
        }

        Ok(Tensor {
            storage: Arc::new(self.storage.gather(&index)),
            shape: Shape::new(new_dims),
        })
    }

    /// Move dimension `src` to position `dst`, keeping the relative order of
    /// the others.
    pub fn move_dim(&self, src: usize, dst: usize) -> Result<Self> {
        let rank = self.rank();
        for d in [src, dst] {
            if d >= rank {
                return Err(Error::DimOutOfRange { dim: d, rank });
            }
        }
        if src == dst {
            return Ok(self.clone());
        }
        let mut order: Vec<usize> = (0..rank).filter(|&d| d != src).collect();
        order.insert(dst, src);
        self.permute(&order)
    }

    // Element-wise

    /// Convert to another dtype. Floats truncate when cast to integers;
    /// anything non-zero becomes `true`.
    pub fn to_dtype(&self, dtype: DType) -> Self {
        if dtype == self.dtype() {
            return self.clone();
        }
        let storage = match (&*self.storage, dtype) {
            (Storage::Bool(v), DType::I64) => Storage::I64(v.iter().map(|&b| b as i64).collect()),
            (Storage::Bool(v), DType::F64) => {
                Storage::F64(v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect())
            }
            (Storage::I64(v), DType::Bool) => Storage::Bool(v.iter().map(|&x| x != 0).collect()),
            (Storage::I64(v), DType::F64) => Storage::F64(v.iter().map(|&x| x as f64).collect()),
            (Storage::F64(v), DType::Bool) => {
                Storage::Bool(v.iter().map(|&x| x != 0.0).collect())
            }
            (Storage::F64(v), DType::I64) => Storage::I64(v.iter().map(|&x| x as i64).collect()),
            (s, _) => s.clone(),
        };
        Tensor {
            storage: Arc::new(storage),
            shape: self.shape.clone(),
        }
    }

    /// Append a trailing dimension of size `mask.len()` and fill it with this
    /// tensor's values where `mask` is true, zero elsewhere.
    ///
    /// `[n, d] ⊗ mask[t] → [n, d, t]`. The dtype of `self` is preserved.
    pub fn mask_outer(&self, mask: &Tensor) -> Result<Self> {
        if mask.rank() != 1 {
            return Err(Error::RankMismatch {
                expected: 1,
                got: mask.rank(),
            });
        }
        let m = match &*mask.storage {
            Storage::Bool(m) => m,
            other => {
                return Err(Error::DTypeMismatch {
                    expected: DType::Bool,
                    got: other.dtype(),
                })
            }
        };
        let storage = match &*self.storage {
            Storage::Bool(v) => Storage::Bool(outer(v, m)),
            Storage::I64(v) => Storage::I64(outer(v, m)),
            Storage::F64(v) => Storage::F64(outer(v, m)),
        };
        Ok(Tensor {
            storage: Arc::new(storage),
            shape: self.shape.with_trailing(m.len()),
        })
    }

    // Readback

    /// Copy the elements out as a flat vec.
    pub fn to_vec<T: WithDType>(&self) -> Result<Vec<T>> {
        T::slice(&self.storage)
            .map(|s| s.to_vec())
            .ok_or(Error::DTypeMismatch {
                expected: T::DTYPE,
                got: self.dtype(),
            })
    }

    /// Read the single element of a one-element tensor (any rank).
    pub fn to_scalar<T: WithDType>(&self) -> Result<T> {
        if self.elem_count() != 1 {
            return Err(Error::NotAScalar {
                shape: self.shape.clone(),
            });
        }
        let s = T::slice(&self.storage).ok_or(Error::DTypeMismatch {
            expected: T::DTYPE,
            got: self.dtype(),
        })?;
        Ok(s[0])
    }
}

fn outer<T: WithDType>(values: &[T], mask: &[bool]) -> Vec<T> {
    let mut out = Vec::with_capacity(values.len() * mask.len());
    for &v in values {
        out.extend(mask.iter().map(|&on| if on { v } else { T::zero() }));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vec_checks_element_count() {
        assert!(Tensor::from_vec(vec![1.0, 2.0, 3.0], (2, 2)).is_err());
        let t = Tensor::from_vec(vec![1i64, 2, 3, 4], (2, 2)).unwrap();
        assert_eq!(t.dims(), &[2, 2]);
        assert_eq!(t.dtype(), DType::I64);
    }

    #[test]
    fn one_hot_has_single_true() {
        let t = Tensor::one_hot(2, 4).unwrap();
        assert_eq!(t.to_vec::<bool>().unwrap(), vec![false, false, true, false]);
        assert!(matches!(
            Tensor::one_hot(4, 4),
            Err(Error::IndexOutOfRange { index: 4, len: 4 })
        ));
    }

    #[test]
    fn reshape_shares_storage() {
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], (2, 3)).unwrap();
        let r = t.reshape((3, 2)).unwrap();
        assert!(r.shares_storage(&t));
        assert!(t.reshape(4).is_err());
        assert!(!t.deep_copy().shares_storage(&t));
        assert_eq!(t.deep_copy(), t);
    }

    #[test]
    fn permute_transposes() {
        let t = Tensor::from_vec(vec![1i64, 2, 3, 4, 5, 6], (2, 3)).unwrap();
        let p = t.permute(&[1, 0]).unwrap();
        assert_eq!(p.dims(), &[3, 2]);
        assert_eq!(p.to_vec::<i64>().unwrap(), vec![1, 4, 2, 5, 3, 6]);
        assert!(matches!(
            t.permute(&[0, 0]),
            Err(Error::Msg(m)) if m == "permute: duplicate dimension 0"
        ));
        assert!(t.permute(&[0]).is_err());
    }

    #[test]
    fn move_last_dim_to_second() {
        // [2, 3, 2] -> move dim 2 to 1 -> [2, 2, 3]
        let data: Vec<i64> = (0..12).collect();
        let t = Tensor::from_vec(data, (2, 3, 2)).unwrap();
        let m = t.move_dim(2, 1).unwrap();
        assert_eq!(m.dims(), &[2, 2, 3]);
        assert_eq!(
            m.to_vec::<i64>().unwrap(),
            vec![0, 2, 4, 1, 3, 5, 6, 8, 10, 7, 9, 11]
        );
    }

    #[test]
    fn mask_outer_keeps_dtype() {
        let mask = Tensor::one_hot(1, 3).unwrap();
        let v = Tensor::from_slice(&[2.5, -1.0]);
        let o = v.mask_outer(&mask).unwrap();
        assert_eq!(o.dims(), &[2, 3]);
        assert_eq!(
            o.to_vec::<f64>().unwrap(),
            vec![0.0, 2.5, 0.0, 0.0, -1.0, 0.0]
        );

        let ints = Tensor::from_slice(&[7i64]);
        assert_eq!(
            ints.mask_outer(&mask).unwrap().to_vec::<i64>().unwrap(),
            vec![0, 7, 0]
        );
        assert!(v.mask_outer(&v).is_err());
    }

    #[test]
    fn dtype_casts() {
        let t = Tensor::from_slice(&[0i64, 3]);
        assert_eq!(t.to_dtype(DType::F64).to_vec::<f64>().unwrap(), vec![0.0, 3.0]);
        assert_eq!(
            t.to_dtype(DType::Bool).to_vec::<bool>().unwrap(),
            vec![false, true]
        );
        assert!(t.to_vec::<f64>().is_err());
    }

    #[test]
    fn scalar_readback() {
        assert_eq!(Tensor::scalar(4i64).to_scalar::<i64>().unwrap(), 4);
        let v = Tensor::from_slice(&[1.0, 2.0]);
        assert!(matches!(v.to_scalar::<f64>(), Err(Error::NotAScalar { .. })));
        assert_eq!(
            Tensor::from_vec(vec![9.0], (1, 1))
                .unwrap()
                .to_scalar::<f64>()
                .unwrap(),
            9.0
        );
    }
}
