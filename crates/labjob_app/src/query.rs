use std::collections::BTreeMap;

use labjob_core::JobRequest;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("parameter {0:?} is not of the form key=value")]
    MalformedParam(String),
    #[error("parameter {0:?} would overwrite a form field")]
    ReservedParam(String),
    #[error("query cannot be encoded as JSON: {0}")]
    Payload(String),
}

/// Form state of the normalisation dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormaliseQuery {
    pub app: String,
    pub target_mass: f64,
    pub temp_deck: String,
    pub vol_scale: f64,
    /// Extra fields merged into the payload as-is.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for NormaliseQuery {
    fn default() -> Self {
        Self {
            app: "Normalise".to_string(),
            target_mass: 50.0,
            temp_deck: "Temperature Module".to_string(),
            vol_scale: 0.5,
            extra: BTreeMap::new(),
        }
    }
}

const FORM_FIELDS: [&str; 4] = ["app", "target_mass", "temp_deck", "vol_scale"];

impl NormaliseQuery {
    pub fn with_param(mut self, raw: &str) -> Result<Self, QueryError> {
        let (key, value) = parse_param(raw)?;
        if FORM_FIELDS.contains(&key.as_str()) {
            return Err(QueryError::ReservedParam(key));
        }
        self.extra.insert(key, value);
        Ok(self)
    }

    pub fn title(&self) -> String {
        format!("{} dashboard", self.app)
    }

    pub fn to_request(&self) -> Result<JobRequest, QueryError> {
        // serde_json would quietly encode NaN and infinities as null.
        for (field, value) in [("target_mass", self.target_mass), ("vol_scale", self.vol_scale)] {
            if !value.is_finite() {
                return Err(QueryError::Payload(format!("{field} must be a finite number")));
            }
        }
        let payload =
            serde_json::to_value(self).map_err(|err| QueryError::Payload(err.to_string()))?;
        Ok(JobRequest {
            title: self.title(),
            payload,
        })
    }
}

/// Split `key=value`; the value is read as JSON when it parses (numbers,
/// booleans, quoted strings), otherwise kept as a plain string.
pub fn parse_param(raw: &str) -> Result<(String, Value), QueryError> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(QueryError::MalformedParam(raw.to_string()));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(QueryError::MalformedParam(raw.to_string()));
    }
    let value = value.trim();
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
