//! # taskmix-data
//!
//! Multi-task dataset composition for taskmix.
//!
//! This crate provides:
//! - [`Dataset`] trait: indexed samples with optional size and metadata
//! - [`Proxy`] / [`Intercept`]: zero-copy dataset decorators
//! - [`apply_transform`], [`expand`], [`first_n`], [`sample_n`]: lazy transforms
//! - [`tag_task`]: per-task `task_idx` / `task_mask` / one-hot targets
//! - [`create_datasets`]: build, tag, resample and concatenate all tasks
//! - [`DataLoader`]: batching with optional parallel fetching
//   - ConcatDataset keeps per-task index ranges contiguous, in task order
//   - DatasetRegistry is passed in explicitly; there is no global registry

pub mod combinators;
pub mod compose;
pub mod config;
pub mod dataset;
pub mod loader;
pub mod proxy;
pub mod registry;
pub mod task;
pub mod transform;

pub use combinators::{ConcatDataset, VecDataset};
pub use compose::{
    combine_datasets, create_datasets, expanded_sizes, sampling_ratios, ComposedDatasets,
};
pub use config::{
    DatasetConfig, OneHotTargetsConfig, SamplingConfig, SplitDatasetConfig, TaskDatasetConfig,
};
pub use dataset::{Dataset, Metadata, Record, Sample, Value};
pub use loader::{DataLoader, DataLoaderConfig};
pub use proxy::{Intercept, Passthrough, Proxy};
pub use registry::{DatasetConstructor, DatasetRegistry};
pub use task::{tag_task, TaggedDataset, TaskTagger};
pub use transform::{
    apply_transform, expand, first_n, sample_n, Compose, ExpandedDataset, FirstNDataset,
    SampledDataset, Transform, TransformedDataset,
};

pub use taskmix_core::{Error, Result};
