// Configuration for multi-task dataset composition
//
// Plain structs with builder setters, deserializable from JSON:
//
// {
//   "datasets": [
//     { "train": { "format": "lmdb", "src": "/data/s2ef/train" },
//       "val":   { "format": "lmdb", "src": "/data/s2ef/val" } },
//     { "train": { "format": "lmdb", "src": "/data/oc22/train" } }
//   ],
//   "sampling": { "type": "temperature", "temperature": 2.0 },
//   "one_hot_targets": { "graph_level": ["energy"], "node_level": ["forces"] }
// }

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use taskmix_core::{Error, Result};

/// How a single split (train, val or test) of one task is built.
///
/// `format` selects the registry constructor. Every other key is passed to
/// it untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitDatasetConfig {
    pub format: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl SplitDatasetConfig {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            params: Map::new(),
        }
    }

    /// Builder-style parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn get_param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// The full construction mapping, `format` included.
    pub fn to_params(&self) -> Value {
        let mut map = self.params.clone();
        map.insert("format".to_string(), Value::String(self.format.clone()));
        Value::Object(map)
    }
}

/// The splits configured for one task. The task's index is its position in
/// [`DatasetConfig::datasets`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskDatasetConfig {
    pub train: Option<SplitDatasetConfig>,
    pub val: Option<SplitDatasetConfig>,
    pub test: Option<SplitDatasetConfig>,
}

impl TaskDatasetConfig {
    pub fn train(mut self, split: SplitDatasetConfig) -> Self {
        self.train = Some(split);
        self
    }
    pub fn val(mut self, split: SplitDatasetConfig) -> Self {
        self.val = Some(split);
        self
    }
    pub fn test(mut self, split: SplitDatasetConfig) -> Self {
        self.test = Some(split);
        self
    }
}

/// Sample fields rewritten into per-task one-hot expanded `<field>_onehot`
/// tensors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneHotTargetsConfig {
    /// Scalar (per-graph) fields, e.g. `energy`.
    pub graph_level: Vec<String>,
    /// Per-node fields, e.g. `forces`.
    pub node_level: Vec<String>,
}

impl OneHotTargetsConfig {
    pub fn graph_level<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.graph_level = keys.into_iter().map(Into::into).collect();
        self
    }
    pub fn node_level<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.node_level = keys.into_iter().map(Into::into).collect();
        self
    }
}

/// Policy for balancing tasks in the combined train dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSamplingConfig", into = "RawSamplingConfig")]
pub enum SamplingConfig {
    /// Every task gets the same share.
    FullyBalanced,
    /// Task `i` gets a share proportional to `(size_i / total)^(1/T)`.
    /// `T = 1` keeps natural proportions; larger `T` flattens toward balance.
    Temperature { temperature: f64 },
}

impl Default for SamplingConfig {
    fn default() -> Self {
        SamplingConfig::Temperature { temperature: 1.0 }
    }
}

impl SamplingConfig {
    /// Temperature sampling; `temperature` must be positive and finite.
    pub fn temperature(temperature: f64) -> Result<Self> {
        let config = SamplingConfig::Temperature { temperature };
        config.validate()?;
        Ok(config)
    }

    /// Build from a policy tag (`fully_balanced` or `temperature`).
    pub fn from_tag(tag: &str, temperature: Option<f64>) -> Result<Self> {
        match tag {
            "fully_balanced" | "balanced" => Ok(SamplingConfig::FullyBalanced),
            "temperature" => Self::temperature(temperature.ok_or_else(|| {
                Error::InvalidConfig("temperature sampling requires `temperature`".into())
            })?),
            other => Err(Error::UnsupportedSamplingPolicy(other.to_string())),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            SamplingConfig::FullyBalanced => "fully_balanced",
            SamplingConfig::Temperature { .. } => "temperature",
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let SamplingConfig::Temperature { temperature } = *self {
            if !(temperature.is_finite() && temperature > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "temperature must be positive and finite, got {temperature}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawSamplingConfig {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

impl TryFrom<RawSamplingConfig> for SamplingConfig {
    type Error = Error;

    fn try_from(raw: RawSamplingConfig) -> Result<Self> {
        SamplingConfig::from_tag(&raw.kind, raw.temperature)
    }
}

impl From<SamplingConfig> for RawSamplingConfig {
    fn from(config: SamplingConfig) -> Self {
        let temperature = match config {
            SamplingConfig::FullyBalanced => None,
            SamplingConfig::Temperature { temperature } => Some(temperature),
        };
        RawSamplingConfig {
            kind: config.tag().to_string(),
            temperature,
        }
    }
}

/// Everything [`create_datasets`](crate::compose::create_datasets) needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// One entry per task; the position is the task index.
    pub datasets: Vec<TaskDatasetConfig>,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub one_hot_targets: OneHotTargetsConfig,
}

impl DatasetConfig {
    pub fn new(datasets: Vec<TaskDatasetConfig>) -> Self {
        Self {
            datasets,
            ..Self::default()
        }
    }

    pub fn sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn one_hot_targets(mut self, targets: OneHotTargetsConfig) -> Self {
        self.one_hot_targets = targets;
        self
    }

    /// Parse from JSON. Sampling policy problems surface as
    /// `UnsupportedSamplingPolicy` / `InvalidConfig` rather than a generic
    /// JSON error.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        if let Some(sampling) = value.get("sampling") {
            let raw: RawSamplingConfig = serde_json::from_value(sampling.clone())?;
            SamplingConfig::try_from(raw)?;
        }
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let config = DatasetConfig::from_json(
            r#"{
                "datasets": [
                    { "train": { "format": "mem", "src": "a", "size": 10 },
                      "val": { "format": "mem", "src": "a_val" } },
                    { "test": { "format": "mem", "src": "b" } }
                ],
                "sampling": { "type": "temperature", "temperature": 2.0 },
                "one_hot_targets": { "graph_level": ["energy"], "node_level": ["forces"] }
            }"#,
        )
        .unwrap();
        assert_eq!(config.datasets.len(), 2);
        let train = config.datasets[0].train.as_ref().unwrap();
        assert_eq!(train.format, "mem");
        assert_eq!(train.get_param("size"), Some(&Value::from(10)));
        assert!(config.datasets[1].train.is_none());
        assert_eq!(
            config.sampling,
            SamplingConfig::Temperature { temperature: 2.0 }
        );
        assert_eq!(config.one_hot_targets.node_level, vec!["forces"]);
    }

    #[test]
    fn defaults_when_omitted() {
        let config = DatasetConfig::from_json(r#"{ "datasets": [{}] }"#).unwrap();
        assert_eq!(config.sampling, SamplingConfig::default());
        assert!(config.one_hot_targets.graph_level.is_empty());
        assert_eq!(config.datasets[0], TaskDatasetConfig::default());
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let err = DatasetConfig::from_json(r#"{ "datasets": [], "sampling": { "type": "round_robin" } }"#)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedSamplingPolicy(p) if p == "round_robin"));
        assert!(matches!(
            SamplingConfig::from_tag("uniform", None),
            Err(Error::UnsupportedSamplingPolicy(_))
        ));
    }

    #[test]
    fn bad_temperature_is_rejected() {
        assert!(matches!(
            SamplingConfig::temperature(0.0),
            Err(Error::InvalidConfig(_))
        ));
        assert!(SamplingConfig::temperature(f64::INFINITY).is_err());
        assert!(matches!(
            SamplingConfig::from_tag("temperature", None),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn sampling_round_trips_through_json() {
        let json = serde_json::to_value(SamplingConfig::FullyBalanced).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "fully_balanced" }));
        let back: SamplingConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, SamplingConfig::FullyBalanced);
    }

    #[test]
    fn split_params_include_format() {
        let split = SplitDatasetConfig::new("mem").param("src", "x");
        assert_eq!(
            split.to_params(),
            serde_json::json!({ "format": "mem", "src": "x" })
        );
    }
}
