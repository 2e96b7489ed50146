// Dataset trait: unified interface for any data source

use std::collections::BTreeMap;
use std::sync::Arc;

use taskmix_core::{Error, Result, Tensor};

/// Per-item auxiliary data (e.g. node count per graph), one entry per item.
///
/// Used for size-aware batching and filtering without loading full items.
pub type Metadata = Arc<[usize]>;

/// A single named field of a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Tensor(Tensor),
}

impl Value {
    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Tensor(_) => "tensor",
        }
    }

    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Value::Tensor(t) => Some(t),
            _ => None,
        }
    }
}

impl From<Tensor> for Value {
    fn from(t: Tensor) -> Self {
        Value::Tensor(t)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

/// A graph-like sample: named fields, passed through opaquely except for the
/// ones a transform explicitly reads or writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// The named field as a tensor, or `MissingField` if absent or not a tensor.
    pub fn tensor(&self, name: &str) -> Result<&Tensor> {
        match self.fields.get(name) {
            Some(Value::Tensor(t)) => Ok(t),
            Some(other) => Err(Error::unusable_field(
                name,
                format!("must be a tensor, got {}", other.kind()),
            )),
            None => Err(Error::missing_field(name)),
        }
    }

    /// Field names in sorted order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// A copy whose tensors own fresh storage, sharing nothing with `self`.
    pub fn deep_copy(&self) -> Self {
        let fields = self
            .fields
            .iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::Tensor(t) => Value::Tensor(t.deep_copy()),
                    other => other.clone(),
                };
                (k.clone(), v)
            })
            .collect();
        Record { fields }
    }
}

/// What a dataset yields for one index.
///
/// Most datasets produce records; raw tensor datasets exist too, and code
/// that needs named fields asks for a record explicitly via
/// [`Sample::into_record`].
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Record(Record),
    Tensor(Tensor),
}

impl Sample {
    pub fn kind(&self) -> &'static str {
        match self {
            Sample::Record(_) => "record",
            Sample::Tensor(_) => "tensor",
        }
    }

    /// The record inside, or `TypeMismatch`.
    pub fn into_record(self) -> Result<Record> {
        match self {
            Sample::Record(r) => Ok(r),
            other => Err(Error::type_mismatch("record", other.kind())),
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Sample::Record(r) => Some(r),
            _ => None,
        }
    }

    /// See [`Record::deep_copy`].
    pub fn deep_copy(&self) -> Self {
        match self {
            Sample::Record(r) => Sample::Record(r.deep_copy()),
            Sample::Tensor(t) => Sample::Tensor(t.deep_copy()),
        }
    }
}

impl From<Record> for Sample {
    fn from(r: Record) -> Self {
        Sample::Record(r)
    }
}

impl From<Tensor> for Sample {
    fn from(t: Tensor) -> Self {
        Sample::Tensor(t)
    }
}

/// A dataset is an indexed collection of samples.
///
/// Implementations must be `Send + Sync`: item access is called concurrently
/// by data-loading workers. Size and metadata are optional capabilities;
/// decorators forward whatever the wrapped dataset reports.
pub trait Dataset: Send + Sync {
    /// Retrieve the sample at position `index`.
    fn get(&self, index: usize) -> Result<Sample>;

    /// Number of samples, if this dataset knows it.
    fn size(&self) -> Option<usize>;

    /// Number of samples, or `NotSized`.
    fn len(&self) -> Result<usize> {
        self.size().ok_or_else(|| Error::NotSized {
            dataset: self.name().to_string(),
        })
    }

    /// Whether the dataset is known to be empty.
    fn is_empty(&self) -> bool {
        self.size() == Some(0)
    }

    /// Per-item metadata sequence, if this dataset provides one.
    fn metadata(&self) -> Option<Metadata> {
        None
    }

    /// Optional human-readable name.
    fn name(&self) -> &str {
        "dataset"
    }
}

impl<D: Dataset + ?Sized> Dataset for Box<D> {
    fn get(&self, index: usize) -> Result<Sample> {
        (**self).get(index)
    }
    fn size(&self) -> Option<usize> {
        (**self).size()
    }
    fn metadata(&self) -> Option<Metadata> {
        (**self).metadata()
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<D: Dataset + ?Sized> Dataset for &D {
    fn get(&self, index: usize) -> Result<Sample> {
        (**self).get(index)
    }
    fn size(&self) -> Option<usize> {
        (**self).size()
    }
    fn metadata(&self) -> Option<Metadata> {
        (**self).metadata()
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<D: Dataset + ?Sized> Dataset for Arc<D> {
    fn get(&self, index: usize) -> Result<Sample> {
        (**self).get(index)
    }
    fn size(&self) -> Option<usize> {
        (**self).size()
    }
    fn metadata(&self) -> Option<Metadata> {
        (**self).metadata()
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Bounds check shared by every sized dataset.
pub(crate) fn check_index(index: usize, len: usize) -> Result<()> {
    if index >= len {
        return Err(Error::IndexOutOfRange { index, len });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_tensor_accessor() {
        let r = Record::new()
            .with("forces", Tensor::from_slice(&[1.0, 2.0]))
            .with("energy", 3.0)
            .with("sid", "abc");
        assert!(r.tensor("forces").is_ok());
        assert!(matches!(
            r.tensor("energy"),
            Err(Error::MissingField { reason: Some(_), .. })
        ));
        assert!(matches!(
            r.tensor("nope"),
            Err(Error::MissingField { reason: None, .. })
        ));
        assert_eq!(r.fields().collect::<Vec<_>>(), vec!["energy", "forces", "sid"]);
    }

    #[test]
    fn deep_copy_detaches_tensors() {
        let t = Tensor::from_slice(&[1i64, 2]);
        let r = Record::new().with("x", t.clone());
        let copy = r.deep_copy();
        assert_eq!(copy, r);
        let copied = copy.tensor("x").unwrap();
        assert!(!copied.shares_storage(&t));
        assert!(r.clone().tensor("x").unwrap().shares_storage(&t));
    }

    #[test]
    fn into_record_type_mismatch() {
        let s = Sample::Tensor(Tensor::scalar(1.0));
        assert!(matches!(s.into_record(), Err(Error::TypeMismatch { .. })));
        let s = Sample::Record(Record::new());
        assert!(s.into_record().is_ok());
    }
}
