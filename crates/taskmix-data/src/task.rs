// Task tagging: stamp every sample with its task identity
//
// For a dataset belonging to task `t` of `T`:
//   task_idx          = t                         (i64 scalar)
//   task_mask         = one_hot(t, T)             ([1, T] bool)
//   <graph>_onehot    = value * one_hot(t, T)     ([1, T])
//   <node>_onehot     = value[..., None] * one_hot
//                       ([n, T] for [n]; [n, T, ...] for [n, ...])

use taskmix_core::{DType, Error, Result, Tensor};

use crate::config::OneHotTargetsConfig;
use crate::dataset::{Dataset, Record, Sample, Value};
use crate::transform::{apply_transform, Transform, TransformedDataset};

/// Transform that tags samples with a fixed task.
///
/// Holds no per-access state; the one-hot vector is built once.
#[derive(Debug, Clone)]
pub struct TaskTagger {
    task_idx: usize,
    total_num_tasks: usize,
    one_hot_targets: OneHotTargetsConfig,
    onehot: Tensor,
}

impl TaskTagger {
    pub fn new(
        task_idx: usize,
        total_num_tasks: usize,
        one_hot_targets: OneHotTargetsConfig,
    ) -> Result<Self> {
        let onehot = Tensor::one_hot(task_idx, total_num_tasks)?;
        Ok(Self {
            task_idx,
            total_num_tasks,
            one_hot_targets,
            onehot,
        })
    }

    pub fn task_idx(&self) -> usize {
        self.task_idx
    }

    pub fn total_num_tasks(&self) -> usize {
        self.total_num_tasks
    }

    /// Write the task fields into `record`.
    pub fn tag(&self, record: &mut Record) -> Result<()> {
        record.insert("task_idx", Tensor::scalar(self.task_idx as i64));
        record.insert("task_mask", self.onehot.unsqueeze(0)?);

        for key in &self.one_hot_targets.graph_level {
            let value = self.graph_onehot(record, key)?;
            record.insert(format!("{key}_onehot"), value);
        }
        for key in &self.one_hot_targets.node_level {
            let value = self.node_onehot(record, key)?;
            record.insert(format!("{key}_onehot"), value);
        }
        Ok(())
    }

    fn graph_onehot(&self, record: &Record, key: &str) -> Result<Tensor> {
        let value = match record.get(key) {
            Some(Value::Tensor(t)) => t.clone(),
            Some(Value::Float(v)) => Tensor::scalar(*v),
            Some(Value::Int(v)) => Tensor::scalar(*v).to_dtype(DType::F64),
            Some(other) => return Err(Error::type_mismatch("numeric field", other.kind())),
            None => return Err(Error::missing_field(key)),
        };
        let flat = value.flatten();
        if flat.elem_count() != 1 {
            return Err(Error::NotAScalar {
                shape: value.shape().clone(),
            });
        }
        flat.mask_outer(&self.onehot)
    }

    fn node_onehot(&self, record: &Record, key: &str) -> Result<Tensor> {
        let value = record.tensor(key)?;
        if value.rank() == 0 {
            return Err(Error::RankMismatch {
                expected: 1,
                got: 0,
            });
        }
        let expanded = value.mask_outer(&self.onehot)?;
        if expanded.rank() > 2 {
            // task axis right after the node axis
            return expanded.move_dim(expanded.rank() - 1, 1);
        }
        Ok(expanded)
    }
}

impl Transform for TaskTagger {
    fn apply(&self, sample: Sample) -> Result<Sample> {
        let mut record = sample.into_record()?;
        self.tag(&mut record)?;
        Ok(Sample::Record(record))
    }
}

pub type TaggedDataset<D> = TransformedDataset<D, TaskTagger>;

/// Wrap `dataset` so every sample it yields is tagged with `task_idx`.
///
/// Fails if `task_idx >= total_num_tasks`. Item access fails with
/// `TypeMismatch` for non-record samples and `MissingField` when a configured
/// field is absent.
pub fn tag_task<D: Dataset>(
    dataset: D,
    task_idx: usize,
    total_num_tasks: usize,
    one_hot_targets: &OneHotTargetsConfig,
) -> Result<TaggedDataset<D>> {
    let tagger = TaskTagger::new(task_idx, total_num_tasks, one_hot_targets.clone())?;
    Ok(apply_transform(dataset, tagger, false))
}
