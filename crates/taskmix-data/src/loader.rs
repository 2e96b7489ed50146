// DataLoader: index shuffling, batching and parallel sample fetching
//
// Batches are returned as `Vec<Sample>`; collating them into model inputs is
// the consumer's business. With `num_workers > 0` each batch is fetched on a
// dedicated rayon pool, so every decorator's item path runs concurrently.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{thread_rng, SeedableRng};
use rayon::prelude::*;

use crate::dataset::{Dataset, Sample};
use taskmix_core::{Error, Result};

/// Configuration for the DataLoader.
#[derive(Debug, Clone)]
pub struct DataLoaderConfig {
    /// Number of samples per batch.
    pub batch_size: usize,
    /// Whether to shuffle indices each epoch.
    pub shuffle: bool,
    /// Whether to drop the last incomplete batch.
    pub drop_last: bool,
    /// Number of parallel workers for sample fetching (0 = sequential).
    pub num_workers: usize,
    /// Optional random seed for reproducible shuffling.
    pub seed: Option<u64>,
}

impl Default for DataLoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            shuffle: true,
            drop_last: false,
            num_workers: 0,
            seed: None,
        }
    }
}

impl DataLoaderConfig {
    pub fn batch_size(mut self, bs: usize) -> Self {
        self.batch_size = bs;
        self
    }

    pub fn shuffle(mut self, s: bool) -> Self {
        self.shuffle = s;
        self
    }

    pub fn drop_last(mut self, d: bool) -> Self {
        self.drop_last = d;
        self
    }

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn seed(mut self, s: u64) -> Self {
        self.seed = Some(s);
        self
    }
}

/// Iterates a sized dataset in batches of samples.
pub struct DataLoader<'a> {
    dataset: &'a dyn Dataset,
    config: DataLoaderConfig,
    indices: Vec<usize>,
    epoch: u64,
    pool: Option<rayon::ThreadPool>,
}

impl<'a> DataLoader<'a> {
    /// Create a new DataLoader over a dataset. The dataset must be sized.
    pub fn new(dataset: &'a dyn Dataset, config: DataLoaderConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be positive".into()));
        }
        let indices: Vec<usize> = (0..dataset.len()?).collect();
        let pool = if config.num_workers > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.num_workers)
                .build()
                .map_err(|e| Error::msg(format!("failed to start fetch workers: {e}")))?;
            Some(pool)
        } else {
            None
        };
        Ok(Self {
            dataset,
            config,
            indices,
            epoch: 0,
            pool,
        })
    }

    /// The number of batches per epoch.
    pub fn num_batches(&self) -> usize {
        if self.config.drop_last {
            self.indices.len() / self.config.batch_size
        } else {
            self.indices.len().div_ceil(self.config.batch_size)
        }
    }

    /// Total number of samples.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Index order for the current epoch.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Reshuffle indices (called at the start of each epoch).
    ///
    /// A seeded loader derives each epoch's order from `seed + epoch`, so
    /// epochs differ but a rerun reproduces them.
    pub fn reshuffle(&mut self) {
        if self.config.shuffle {
            self.indices.sort_unstable();
            match self.config.seed {
                Some(seed) => {
                    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(self.epoch));
                    self.indices.shuffle(&mut rng);
                }
                None => {
                    let mut rng = thread_rng();
                    self.indices.shuffle(&mut rng);
                }
            }
        }
        self.epoch += 1;
    }

    /// Fetch the samples at `indices`, in order. The first failure aborts the
    /// whole fetch.
    pub fn fetch(&self, indices: &[usize]) -> Result<Vec<Sample>> {
        match &self.pool {
            Some(pool) if indices.len() > 1 => pool.install(|| {
                indices
                    .par_iter()
                    .map(|&i| self.dataset.get(i))
                    .collect::<Result<Vec<_>>>()
            }),
            _ => indices.iter().map(|&i| self.dataset.get(i)).collect(),
        }
    }

    /// Produce all batches for one epoch.
    pub fn epoch_batches(&mut self) -> Result<Vec<Vec<Sample>>> {
        self.iter_batches().collect()
    }

    /// Iterate over batches one at a time (lower memory than `epoch_batches`).
    pub fn iter_batches(&mut self) -> BatchIterator<'_, 'a> {
        self.reshuffle();
        BatchIterator {
            loader: self,
            batch_idx: 0,
        }
    }
}

/// Iterator that yields one batch at a time.
pub struct BatchIterator<'l, 'a> {
    loader: &'l DataLoader<'a>,
    batch_idx: usize,
}

impl Iterator for BatchIterator<'_, '_> {
    type Item = Result<Vec<Sample>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.batch_idx >= self.loader.num_batches() {
            return None;
        }
        let bs = self.loader.config.batch_size;
        let n = self.loader.indices.len();
        let start = self.batch_idx * bs;
        let end = (start + bs).min(n);
        self.batch_idx += 1;

        Some(self.loader.fetch(&self.loader.indices[start..end]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinators::VecDataset;
    use taskmix_core::Tensor;

    fn tiny(n: usize) -> VecDataset {
        let samples = (0..n)
            .map(|i| Sample::Tensor(Tensor::scalar(i as i64)))
            .collect();
        VecDataset::new(samples, "tiny")
    }

    fn values(batch: &[Sample]) -> Vec<i64> {
        batch
            .iter()
            .map(|s| match s {
                Sample::Tensor(t) => t.to_scalar::<i64>().unwrap(),
                Sample::Record(_) => panic!("expected tensor sample"),
            })
            .collect()
    }

    #[test]
    fn sequential_batches_in_order() {
        let ds = tiny(7);
        let mut loader = DataLoader::new(&ds, DataLoaderConfig::default().batch_size(3).shuffle(false)).unwrap();
        assert_eq!(loader.num_batches(), 3);
        let batches = loader.epoch_batches().unwrap();
        assert_eq!(values(&batches[0]), vec![0, 1, 2]);
        assert_eq!(values(&batches[2]), vec![6]);
    }

    #[test]
    fn drop_last() {
        let ds = tiny(7);
        let mut loader = DataLoader::new(
            &ds,
            DataLoaderConfig::default().batch_size(3).shuffle(false).drop_last(true),
        )
        .unwrap();
        assert_eq!(loader.epoch_batches().unwrap().len(), 2);
    }

    #[test]
    fn parallel_matches_sequential() {
        let ds = tiny(40);
        let config = DataLoaderConfig::default().batch_size(8).seed(3);
        let mut seq = DataLoader::new(&ds, config.clone()).unwrap();
        let mut par = DataLoader::new(&ds, config.num_workers(4)).unwrap();
        assert_eq!(seq.epoch_batches().unwrap(), par.epoch_batches().unwrap());
    }

    #[test]
    fn seeded_shuffle_is_a_permutation() {
        let ds = tiny(20);
        let mut loader = DataLoader::new(&ds, DataLoaderConfig::default().batch_size(20).seed(11)).unwrap();
        let mut first = values(&loader.epoch_batches().unwrap()[0]);
        first.sort_unstable();
        assert_eq!(first, (0..20).collect::<Vec<i64>>());
    }

    #[test]
    fn errors_abort_the_fetch() {
        let ds = tiny(3);
        let loader = DataLoader::new(&ds, DataLoaderConfig::default().num_workers(2)).unwrap();
        assert!(loader.fetch(&[0, 5, 1]).is_err());
        assert!(DataLoader::new(&ds, DataLoaderConfig::default().batch_size(0)).is_err());
    }
}
