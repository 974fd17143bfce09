use serde::Deserialize;
use serde_json::{Map, Value};

use crate::TransportError;

/// One pushed progress message: `{"update": {"status", "message", ...}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub status: String,
    pub message: String,
    pub progress: Option<f64>,
    pub iteration: Option<u64>,
    pub max_iter: Option<u64>,
    /// Result token, from `update.result` or the envelope's `result`.
    pub result: Option<String>,
    /// Job id echoed by the backend, if any.
    pub job_id: Option<String>,
    /// Unrecognised `update` fields.
    pub extra: Map<String, Value>,
}

#[derive(Deserialize)]
struct Envelope {
    update: UpdateBody,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    job_id: Option<String>,
}

#[derive(Deserialize)]
struct UpdateBody {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    iteration: Option<u64>,
    #[serde(default)]
    max_iter: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl ProgressEvent {
    /// Decode one SSE `data` payload. Anything but the expected shape is a stream error.
    pub fn from_json(data: &str) -> Result<Self, TransportError> {
        let envelope: Envelope = serde_json::from_str(data)
            .map_err(|err| TransportError::stream(format!("malformed progress event: {err}")))?;
        let Envelope {
            update,
            result: outer_result,
            job_id,
        } = envelope;

        let result = update
            .result
            .as_ref()
            .and_then(token_from_value)
            .or_else(|| outer_result.as_ref().and_then(token_from_value));

        Ok(Self {
            status: update.status,
            message: update.message,
            progress: update.progress,
            iteration: update.iteration,
            max_iter: update.max_iter,
            result,
            job_id,
            extra: update.extra,
        })
    }
}

fn token_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(token) if !token.is_empty() => Some(token.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
