// Dataset Combinators: in-memory datasets and concatenation

use std::ops::Range;
use std::sync::OnceLock;

use tracing::debug;

use crate::dataset::{check_index, Dataset, Metadata, Sample};
use taskmix_core::{Error, Result};

// VecDataset: in-memory dataset from samples

/// A simple in-memory dataset backed by a `Vec<Sample>`.
///
/// Useful for building datasets programmatically and as the terminal dataset
/// behind registry constructors in tests.
pub struct VecDataset {
    samples: Vec<Sample>,
    metadata: Option<Metadata>,
    dataset_name: String,
}

impl VecDataset {
    pub fn new(samples: Vec<Sample>, name: &str) -> Self {
        Self {
            samples,
            metadata: None,
            dataset_name: name.to_string(),
        }
    }

    /// Attach a per-item metadata sequence.
    ///
    /// # Panics
    /// Panics if `metadata` does not have one entry per sample.
    pub fn with_metadata(mut self, metadata: Vec<usize>) -> Self {
        assert_eq!(
            metadata.len(),
            self.samples.len(),
            "VecDataset: metadata length must match sample count"
        );
        self.metadata = Some(metadata.into());
        self
    }
}

impl Dataset for VecDataset {
    fn get(&self, index: usize) -> Result<Sample> {
        check_index(index, self.samples.len())?;
        Ok(self.samples[index].clone())
    }

    fn size(&self) -> Option<usize> {
        Some(self.samples.len())
    }

    fn metadata(&self) -> Option<Metadata> {
        self.metadata.clone()
    }

    fn name(&self) -> &str {
        &self.dataset_name
    }
}

// ConcatDataset: concatenate multiple datasets

/// Concatenate datasets end-to-end.
///
/// Global index ranges are contiguous per member, in member order. Metadata
/// is the concatenation of the members' metadata, built on first access; it
/// is only available if every member provides it.
pub struct ConcatDataset {
    datasets: Vec<Box<dyn Dataset>>,
    cumulative_sizes: Vec<usize>,
    metadata: OnceLock<Option<Metadata>>,
}

impl ConcatDataset {
    /// Create a concatenation of the given datasets. Every member must report
    /// a size.
    pub fn new(datasets: Vec<Box<dyn Dataset>>) -> Result<Self> {
        let mut cumulative_sizes = Vec::with_capacity(datasets.len());
        let mut total: usize = 0;
        for ds in &datasets {
            total = total
                .checked_add(ds.len()?)
                .ok_or_else(|| Error::LengthOverflow {
                    dataset: ds.name().to_string(),
                })?;
            cumulative_sizes.push(total);
        }

        Ok(Self {
            datasets,
            cumulative_sizes,
            metadata: OnceLock::new(),
        })
    }

    /// Number of member datasets.
    pub fn num_datasets(&self) -> usize {
        self.datasets.len()
    }

    /// Member datasets in order.
    pub fn datasets(&self) -> &[Box<dyn Dataset>] {
        &self.datasets
    }

    /// Global index range owned by each member.
    pub fn ranges(&self) -> Vec<Range<usize>> {
        let mut start = 0;
        self.cumulative_sizes
            .iter()
            .map(|&end| {
                let r = start..end;
                start = end;
                r
            })
            .collect()
    }

    fn total(&self) -> usize {
        self.cumulative_sizes.last().copied().unwrap_or(0)
    }

    /// Locate which dataset and local index a global index maps to.
    pub fn locate(&self, index: usize) -> Result<(usize, usize)> {
        check_index(index, self.total())?;
        let ds_idx = self.cumulative_sizes.partition_point(|&cum| cum <= index);
        let offset = if ds_idx == 0 {
            0
        } else {
            self.cumulative_sizes[ds_idx - 1]
        };
        Ok((ds_idx, index - offset))
    }
}

impl Dataset for ConcatDataset {
    fn get(&self, index: usize) -> Result<Sample> {
        let (ds_idx, local_idx) = self.locate(index)?;
        self.datasets[ds_idx].get(local_idx)
    }

    fn size(&self) -> Option<usize> {
        Some(self.total())
    }

    fn metadata(&self) -> Option<Metadata> {
        self.metadata
            .get_or_init(|| {
                let mut all = Vec::with_capacity(self.total());
                for ds in &self.datasets {
                    all.extend_from_slice(&ds.metadata()?);
                }
                debug!(
                    "Concatenated metadata of {} datasets ({} entries).",
                    self.datasets.len(),
                    all.len()
                );
                Some(all.into())
            })
            .clone()
    }

    fn name(&self) -> &str {
        "concat"
    }
}

impl std::fmt::Debug for ConcatDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcatDataset")
            .field("members", &self.datasets.iter().map(|d| d.name()).collect::<Vec<_>>())
            .field("ranges", &self.ranges())
            .finish()
    }
}
