// Transform: lazy per-item and index-remapping dataset decorators
//
// Each decorator is a `Proxy` around the wrapped dataset:
//   - `apply_transform` maps every item through a `Transform`
//   - `expand`          grows the reported length, wrapping indices modulo the
//                       original size
//   - `first_n`         truncates to a prefix
//   - `sample_n`        picks `n` distinct indices with a seeded RNG
//
// None of them copy the wrapped storage. Derived metadata is remapped with
// the same index rule and memoized on first access.

use std::sync::OnceLock;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::dataset::{check_index, Dataset, Metadata, Sample};
use crate::proxy::{Intercept, Proxy};
use taskmix_core::{Error, Result};

/// A transform applied to each sample on access.
///
/// Implemented for any `Fn(Sample) -> Result<Sample>`. No output is cached:
/// every access re-runs the transform on a freshly fetched item.
pub trait Transform: Send + Sync {
    /// Apply the transform to a sample, returning the modified sample.
    fn apply(&self, sample: Sample) -> Result<Sample>;
}

impl<F> Transform for F
where
    F: Fn(Sample) -> Result<Sample> + Send + Sync,
{
    fn apply(&self, sample: Sample) -> Result<Sample> {
        self(sample)
    }
}

/// Chain multiple transforms.
pub struct Compose {
    transforms: Vec<Box<dyn Transform>>,
}

impl Compose {
    pub fn new(transforms: Vec<Box<dyn Transform>>) -> Self {
        Self { transforms }
    }
}

impl Transform for Compose {
    fn apply(&self, mut sample: Sample) -> Result<Sample> {
        for t in &self.transforms {
            sample = t.apply(sample)?;
        }
        Ok(sample)
    }
}

// apply_transform

/// Interceptor behind [`apply_transform`].
pub struct MapItems<T> {
    transform: T,
    copy_item: bool,
}

impl<T> MapItems<T> {
    pub fn transform(&self) -> &T {
        &self.transform
    }
}

impl<D: Dataset, T: Transform> Intercept<D> for MapItems<T> {
    fn get(&self, inner: &D, index: usize) -> Result<Sample> {
        let mut sample = inner.get(index)?;
        if self.copy_item {
            sample = sample.deep_copy();
        }
        self.transform.apply(sample)
    }
}

pub type TransformedDataset<D, T> = Proxy<D, MapItems<T>>;

/// Wrap `dataset` so every item is passed through `transform`.
///
/// With `copy_item`, the item is deep-copied first so the transform never
/// sees storage shared with the wrapped dataset. Length and metadata pass
/// through unchanged.
pub fn apply_transform<D: Dataset, T: Transform>(
    dataset: D,
    transform: T,
    copy_item: bool,
) -> TransformedDataset<D, T> {
    Proxy::new(
        dataset,
        MapItems {
            transform,
            copy_item,
        },
    )
}

// expand

/// Interceptor behind [`expand`].
pub struct Expand {
    n: usize,
    original_size: usize,
    metadata: OnceLock<Option<Metadata>>,
}

impl Expand {
    pub fn original_size(&self) -> usize {
        self.original_size
    }
}

impl<D: Dataset> Intercept<D> for Expand {
    fn get(&self, inner: &D, index: usize) -> Result<Sample> {
        check_index(index, self.n)?;
        inner.get(index % self.original_size)
    }

    fn size(&self, _inner: &D) -> Option<usize> {
        Some(self.n)
    }

    fn metadata(&self, inner: &D) -> Option<Metadata> {
        self.metadata
            .get_or_init(|| {
                let metadata = inner.metadata()?;
                if metadata.is_empty() && self.n > 0 {
                    warn!("Cannot expand empty metadata of {} to {}.", inner.name(), self.n);
                    return None;
                }
                let expanded: Metadata = (0..self.n).map(|i| metadata[i % metadata.len()]).collect();
                debug!(
                    "Expanded the metadata for {} ({} => {}).",
                    inner.name(),
                    metadata.len(),
                    expanded.len()
                );
                Some(expanded)
            })
            .clone()
    }
}

pub type ExpandedDataset<D> = Proxy<D, Expand>;

/// Report length `n`, mapping index `i` to `i % len(dataset)`.
///
/// Fails with `NotSized` if the dataset has no size and `SizeMismatch` if
/// `n` is smaller than it (or the dataset is empty and `n > 0`).
pub fn expand<D: Dataset>(dataset: D, n: usize) -> Result<ExpandedDataset<D>> {
    let original_size = dataset.len()?;
    if original_size > n || (original_size == 0 && n > 0) {
        return Err(Error::SizeMismatch {
            op: "expand",
            dataset: dataset.name().to_string(),
            requested: n,
            actual: original_size,
        });
    }
    info!(
        "Expanded dataset {} from {} to {} samples.",
        dataset.name(),
        original_size,
        n
    );
    Ok(Proxy::new(
        dataset,
        Expand {
            n,
            original_size,
            metadata: OnceLock::new(),
        },
    ))
}

// first_n

/// Interceptor behind [`first_n`].
pub struct FirstN {
    n: usize,
    metadata: OnceLock<Option<Metadata>>,
}

impl<D: Dataset> Intercept<D> for FirstN {
    fn get(&self, inner: &D, index: usize) -> Result<Sample> {
        check_index(index, self.n)?;
        inner.get(index)
    }

    fn size(&self, _inner: &D) -> Option<usize> {
        Some(self.n)
    }

    fn metadata(&self, inner: &D) -> Option<Metadata> {
        self.metadata
            .get_or_init(|| {
                let metadata = inner.metadata()?;
                if metadata.len() < self.n {
                    warn!(
                        "Metadata of {} has {} entries, fewer than the first {}.",
                        inner.name(),
                        metadata.len(),
                        self.n
                    );
                    return None;
                }
                let first: Metadata = metadata[..self.n].into();
                debug!(
                    "Retrieved the first {} metadata entries for {} ({} => {}).",
                    self.n,
                    inner.name(),
                    metadata.len(),
                    first.len()
                );
                Some(first)
            })
            .clone()
    }
}

pub type FirstNDataset<D> = Proxy<D, FirstN>;

/// Truncate to the first `n` items. Requires `n <= len(dataset)`.
pub fn first_n<D: Dataset>(dataset: D, n: usize) -> Result<FirstNDataset<D>> {
    let size = dataset.len()?;
    if size < n {
        return Err(Error::SizeMismatch {
            op: "first_n",
            dataset: dataset.name().to_string(),
            requested: n,
            actual: size,
        });
    }
    Ok(Proxy::new(
        dataset,
        FirstN {
            n,
            metadata: OnceLock::new(),
        },
    ))
}

// sample_n

/// Interceptor behind [`sample_n`].
pub struct SampleN {
    indices: Vec<usize>,
    metadata: OnceLock<Option<Metadata>>,
}

impl SampleN {
    /// Source indices, in logical order.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

impl<D: Dataset> Intercept<D> for SampleN {
    fn get(&self, inner: &D, index: usize) -> Result<Sample> {
        check_index(index, self.indices.len())?;
        inner.get(self.indices[index])
    }

    fn size(&self, _inner: &D) -> Option<usize> {
        Some(self.indices.len())
    }

    fn metadata(&self, inner: &D) -> Option<Metadata> {
        self.metadata
            .get_or_init(|| {
                let metadata = inner.metadata()?;
                let mut sampled = Vec::with_capacity(self.indices.len());
                for &i in &self.indices {
                    match metadata.get(i) {
                        Some(&m) => sampled.push(m),
                        None => {
                            warn!(
                                "Metadata of {} has {} entries but sampled index {} is beyond it.",
                                inner.name(),
                                metadata.len(),
                                i
                            );
                            return None;
                        }
                    }
                }
                debug!(
                    "Retrieved the sampled {} metadata entries for {} ({} => {}).",
                    self.indices.len(),
                    inner.name(),
                    metadata.len(),
                    sampled.len()
                );
                Some(sampled.into())
            })
            .clone()
    }
}

pub type SampledDataset<D> = Proxy<D, SampleN>;

/// Keep `n` distinct items chosen uniformly with a `seed`ed RNG.
///
/// The index set is drawn once, here; the same seed over a dataset of the
/// same size always selects the same indices in the same order.
pub fn sample_n<D: Dataset>(dataset: D, n: usize, seed: u64) -> Result<SampledDataset<D>> {
    let size = dataset.len()?;
    if size < n {
        return Err(Error::SizeMismatch {
            op: "sample_n",
            dataset: dataset.name().to_string(),
            requested: n,
            actual: size,
        });
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let indices = rand::seq::index::sample(&mut rng, size, n).into_vec();
    Ok(Proxy::new(
        dataset,
        SampleN {
            indices,
            metadata: OnceLock::new(),
        },
    ))
}
