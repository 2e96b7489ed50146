// DatasetRegistry: format string → dataset constructor
//
// Passed explicitly into the composer; there is no global registry.

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::config::SplitDatasetConfig;
use crate::dataset::Dataset;
use taskmix_core::{Error, Result};

/// Builds a dataset from its split config.
pub type DatasetConstructor =
    Box<dyn Fn(&SplitDatasetConfig) -> Result<Box<dyn Dataset>> + Send + Sync>;

/// Maps dataset format identifiers to constructors.
#[derive(Default)]
pub struct DatasetRegistry {
    constructors: BTreeMap<String, DatasetConstructor>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `constructor` under `format`, replacing any previous one.
    pub fn register<F>(&mut self, format: impl Into<String>, constructor: F)
    where
        F: Fn(&SplitDatasetConfig) -> Result<Box<dyn Dataset>> + Send + Sync + 'static,
    {
        let format = format.into();
        if self.constructors.contains_key(&format) {
            warn!("Replacing dataset constructor for format {}.", format);
        }
        self.constructors.insert(format, Box::new(constructor));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<F>(mut self, format: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&SplitDatasetConfig) -> Result<Box<dyn Dataset>> + Send + Sync + 'static,
    {
        self.register(format, constructor);
        self
    }

    pub fn contains(&self, format: &str) -> bool {
        self.constructors.contains_key(format)
    }

    /// Registered formats, sorted.
    pub fn formats(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// The constructor for `format`, or `UnknownFormat`.
    pub fn get(&self, format: &str) -> Result<&DatasetConstructor> {
        self.constructors
            .get(format)
            .ok_or_else(|| Error::UnknownFormat {
                format: format.to_string(),
                known: self.constructors.keys().cloned().collect(),
            })
    }

    /// Look up `config.format` and construct the dataset.
    pub fn build(&self, config: &SplitDatasetConfig) -> Result<Box<dyn Dataset>> {
        let constructor = self.get(&config.format)?;
        constructor(config)
    }
}

impl fmt::Debug for DatasetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetRegistry")
            .field("formats", &self.formats())
            .finish()
    }
}
