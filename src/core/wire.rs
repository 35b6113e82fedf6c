//! Inbound payload shapes.
//!
//! Everything here is deliberately lenient: fields may be missing, `null`, or
//! numbers encoded as floats. Interpretation happens in `normalize`.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Per-model metrics, as carried by push events and the live metrics endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsPayload {
    #[serde(default, deserialize_with = "lenient::object")]
    pub val_losses: Map<String, Value>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub weights: Map<String, Value>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub lr_multipliers: Map<String, Value>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub current_epoch: Option<u32>,
    /// Older trainers send `epoch` instead of `current_epoch`.
    #[serde(default, deserialize_with = "lenient::count")]
    pub epoch: Option<u32>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub total_epochs: Option<u32>,
    #[serde(default)]
    pub auto_stop_info: Option<Value>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub progress_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub validation_accuracy: Option<f64>,
}

impl MetricsPayload {
    /// No model carried at all.
    pub fn has_models(&self) -> bool {
        !self.weights.is_empty() || !self.val_losses.is_empty()
    }

    /// Carries nothing a snapshot could be built from.
    pub fn is_empty(&self) -> bool {
        !self.has_models()
            && self.lr_multipliers.is_empty()
            && self.current_epoch.is_none()
            && self.epoch.is_none()
            && self.total_epochs.is_none()
            && self.auto_stop_info.is_none()
            && self.progress_percent.is_none()
            && self.validation_accuracy.is_none()
    }
}

/// General training status (the secondary pull endpoint).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    #[serde(default, deserialize_with = "lenient::text")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient::count")]
    pub current_epoch: Option<u32>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub total_epochs: Option<u32>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub progress: Option<f64>,
    #[serde(default, deserialize_with = "lenient::array")]
    pub base_models: Vec<Value>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub loss: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub accuracy: Option<f64>,
}

impl StatusPayload {
    pub fn is_training(&self) -> bool {
        self.status == "training"
    }

    /// Participating model names, in order. Accepts plain strings or objects
    /// with a `name` field.
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.base_models.iter().filter_map(|m| match m {
            Value::String(s) => Some(s.as_str()),
            Value::Object(o) => o.get("name").and_then(Value::as_str),
            _ => None,
        })
    }
}

/// A push channel message, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
    InitialState(MetricsPayload),
    EpochEnd(MetricsPayload),
    TrainingComplete(MetricsPayload),
    Error(ServerError),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ServerError {
    pub fn text(&self) -> &str {
        self.message
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or("training process reported an error")
    }
}

mod lenient {
    use super::*;

    pub(super) fn object<'de, D>(d: D) -> Result<Map<String, Value>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(d)? {
            Some(Value::Object(map)) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    pub(super) fn array<'de, D>(d: D) -> Result<Vec<Value>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(d)? {
            Some(Value::Array(items)) => Ok(items),
            _ => Ok(Vec::new()),
        }
    }

    pub(super) fn text<'de, D>(d: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(d)? {
            Some(Value::String(s)) => Ok(s),
            _ => Ok(String::new()),
        }
    }

    pub(super) fn count<'de, D>(d: D) -> Result<Option<u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(float(d)?.map(|n| n.clamp(0.0, u32::MAX as f64) as u32))
    }

    pub(super) fn float<'de, D>(d: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Value>::deserialize(d)?
            .as_ref()
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite()))
    }
}
