// Multi-task composition
//
// create_datasets:
//   1. build every (task, split) dataset through the registry
//   2. tag each with its task index and one-hot targets
//   3. train: resample per the sampling policy, then concatenate
//      val/test: concatenate as-is
//
// Resampling, for train sizes s_i and normalized ratios r_i:
//   target = Σs / Σr
//   f_i    = target * r_i / s_i
//   f_i    = f_i / min(f)
//   n_i    = ceil(s_i * (f_i / min(f)))
// The second division is by the already-rescaled minimum, i.e. exactly 1.0,
// so it never changes the counts. The smallest-factor task is never expanded.

use tracing::info;

use crate::combinators::ConcatDataset;
use crate::config::{DatasetConfig, OneHotTargetsConfig, SamplingConfig, SplitDatasetConfig};
use crate::dataset::Dataset;
use crate::registry::DatasetRegistry;
use crate::task::tag_task;
use crate::transform::expand;
use taskmix_core::{Error, Result};

/// The composed train/val/test datasets. A split is `None` when no task
/// configured it.
#[derive(Debug, Default)]
pub struct ComposedDatasets {
    pub train: Option<ConcatDataset>,
    pub val: Option<ConcatDataset>,
    pub test: Option<ConcatDataset>,
}

/// Normalized per-task ratios for the given sampling policy.
pub fn sampling_ratios(sizes: &[usize], sampling: &SamplingConfig) -> Result<Vec<f64>> {
    sampling.validate()?;
    let ratios: Vec<f64> = match *sampling {
        SamplingConfig::FullyBalanced => vec![1.0; sizes.len()],
        SamplingConfig::Temperature { temperature } => {
            let total = sizes.iter().sum::<usize>() as f64;
            sizes
                .iter()
                .map(|&size| (size as f64 / total).powf(1.0 / temperature))
                .collect()
        }
    };
    let sum: f64 = ratios.iter().sum();
    Ok(ratios.iter().map(|r| r / sum).collect())
}

/// Per-task sample counts after expansion. Sizes must be non-zero.
///
/// Fails with `InvalidConfig` naming the task when a ratio underflows to
/// zero or a count does not fit in `usize`, which a very low temperature
/// can cause.
pub fn expanded_sizes(sizes: &[usize], ratios: &[f64]) -> Result<Vec<usize>> {
    let total = sizes.iter().sum::<usize>() as f64;
    let target_size = total / ratios.iter().sum::<f64>();

    let factors: Vec<f64> = sizes
        .iter()
        .zip(ratios)
        .map(|(&size, &ratio)| target_size * ratio / size as f64)
        .collect();
    for (task_idx, &f) in factors.iter().enumerate() {
        if !(f.is_finite() && f > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "sampling ratio of task {task_idx} is {:e}; the temperature is too low to resample it",
                ratios[task_idx]
            )));
        }
    }
    let factors: Vec<f64> = {
        let min = min_of(&factors);
        factors.iter().map(|f| f / min).collect()
    };

    let min = min_of(&factors);
    sizes
        .iter()
        .zip(&factors)
        .enumerate()
        .map(|(task_idx, (&size, &f))| {
            let n = (size as f64 * (f / min)).ceil();
            if !n.is_finite() || n >= usize::MAX as f64 {
                return Err(Error::InvalidConfig(format!(
                    "resampled size of task {task_idx} ({n:e}) does not fit in usize"
                )));
            }
            Ok(n as usize)
        })
        .collect()
}

fn min_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

/// Expand each dataset to its resampled size and concatenate them in order.
pub fn combine_datasets(
    sampling: &SamplingConfig,
    datasets: Vec<Box<dyn Dataset>>,
) -> Result<ConcatDataset> {
    let mut sizes = Vec::with_capacity(datasets.len());
    for dataset in &datasets {
        let size = dataset.len()?;
        if size == 0 {
            return Err(Error::SizeMismatch {
                op: "resample",
                dataset: dataset.name().to_string(),
                requested: 0,
                actual: 0,
            });
        }
        sizes.push(size);
    }

    let ratios = sampling_ratios(&sizes, sampling)?;
    info!("Using ratios={:?} for sampling={:?}.", ratios, sampling);

    let targets = expanded_sizes(&sizes, &ratios)?;
    let expanded = datasets
        .into_iter()
        .zip(targets)
        .map(|(dataset, n)| expand(dataset, n).map(|d| Box::new(d) as Box<dyn Dataset>))
        .collect::<Result<Vec<_>>>()?;

    let num_datasets = expanded.len();
    let combined = ConcatDataset::new(expanded)?;
    info!(
        "Combined {} datasets into {}.",
        num_datasets,
        combined.size().unwrap_or(0)
    );
    Ok(combined)
}

fn create_split_dataset(
    registry: &DatasetRegistry,
    config: &SplitDatasetConfig,
    task_idx: usize,
    total_num_tasks: usize,
    one_hot_targets: &OneHotTargetsConfig,
) -> Result<Box<dyn Dataset>> {
    let dataset = registry.build(config)?;
    let tagged = tag_task(dataset, task_idx, total_num_tasks, one_hot_targets)?;
    Ok(Box::new(tagged))
}

fn concat_or_none(datasets: Vec<Box<dyn Dataset>>) -> Result<Option<ConcatDataset>> {
    if datasets.is_empty() {
        return Ok(None);
    }
    ConcatDataset::new(datasets).map(Some)
}

/// Build the combined train/val/test datasets for all configured tasks.
pub fn create_datasets(
    config: &DatasetConfig,
    registry: &DatasetRegistry,
) -> Result<ComposedDatasets> {
    let total_num_tasks = config.datasets.len();
    if total_num_tasks == 0 {
        return Err(Error::EmptyTaskList);
    }
    config.sampling.validate()?;

    let mut train = Vec::new();
    let mut val = Vec::new();
    let mut test = Vec::new();
    for (task_idx, task) in config.datasets.iter().enumerate() {
        for (split, out) in [
            (&task.train, &mut train),
            (&task.val, &mut val),
            (&task.test, &mut test),
        ] {
            if let Some(split) = split {
                out.push(create_split_dataset(
                    registry,
                    split,
                    task_idx,
                    total_num_tasks,
                    &config.one_hot_targets,
                )?);
            }
        }
    }
    info!(
        "Built {} train, {} val and {} test datasets for {} tasks.",
        train.len(),
        val.len(),
        test.len(),
        total_num_tasks
    );

    let train = if train.is_empty() {
        None
    } else {
        Some(combine_datasets(&config.sampling, train)?)
    };

    Ok(ComposedDatasets {
        train,
        val: concat_or_none(val)?,
        test: concat_or_none(test)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-12, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn balanced_ratios_are_equal() {
        let r = sampling_ratios(&[10, 100, 7], &SamplingConfig::FullyBalanced).unwrap();
        assert_close(&r, &[1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]);
    }

    #[test]
    fn temperature_one_is_proportional() {
        let r = sampling_ratios(&[10, 100], &SamplingConfig::temperature(1.0).unwrap()).unwrap();
        assert_close(&r, &[10.0 / 110.0, 100.0 / 110.0]);
    }

    #[test]
    fn worked_balanced_example() {
        let ratios = sampling_ratios(&[10, 100], &SamplingConfig::FullyBalanced).unwrap();
        assert_eq!(expanded_sizes(&[10, 100], &ratios).unwrap(), vec![100, 100]);
    }

    #[test]
    fn temperature_expansion_counts() {
        let counts = |t: f64| {
            let sampling = SamplingConfig::temperature(t).unwrap();
            let ratios = sampling_ratios(&[10, 100], &sampling).unwrap();
            expanded_sizes(&[10, 100], &ratios).unwrap()
        };
        assert_eq!(counts(1.0), vec![10, 100]);
        assert_eq!(counts(2.0), vec![32, 100]);
        assert_eq!(counts(5.0), vec![64, 100]);
        assert_eq!(counts(10.0), vec![80, 100]);
    }

    #[test]
    fn smallest_factor_task_is_not_expanded() {
        let ratios = sampling_ratios(&[3, 50, 9], &SamplingConfig::FullyBalanced).unwrap();
        let counts = expanded_sizes(&[3, 50, 9], &ratios).unwrap();
        assert_eq!(counts[1], 50);
        assert!(counts.iter().zip([3, 50, 9]).all(|(&n, s)| n >= s));
    }

    #[test]
    fn low_temperature_counts_that_overflow_fail() {
        let sampling = SamplingConfig::temperature(0.1).unwrap();
        let ratios = sampling_ratios(&[1, 100], &sampling).unwrap();
        match expanded_sizes(&[1, 100], &ratios) {
            Err(Error::InvalidConfig(msg)) => assert!(msg.contains("task 1"), "{msg}"),
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn underflowing_ratio_fails() {
        let sampling = SamplingConfig::temperature(0.001).unwrap();
        let ratios = sampling_ratios(&[1, 100], &sampling).unwrap();
        assert_eq!(ratios[0], 0.0);
        match expanded_sizes(&[1, 100], &ratios) {
            Err(Error::InvalidConfig(msg)) => assert!(msg.contains("task 0"), "{msg}"),
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn invalid_temperature_is_rejected() {
        let sampling = SamplingConfig::Temperature { temperature: -1.0 };
        assert!(matches!(
            sampling_ratios(&[1, 2], &sampling),
            Err(Error::InvalidConfig(_))
        ));
    }
}
