/// Status carried by a pushed progress message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Any non-terminal status (`waiting`, `submitting`, `running`, ...).
    /// Holds the raw label as sent by the backend.
    InProgress(String),
    Cancelled,
    Error,
    Finished,
}

impl Status {
    /// Classify a backend status label. Unknown labels count as in-progress.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cancelled" => Status::Cancelled,
            "error" => Status::Error,
            "finished" => Status::Finished,
            _ => Status::InProgress(raw.trim().to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::InProgress(_))
    }
}

/// A decoded `{"update": {...}}` message, reduced to what the coordinator needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub status: Status,
    pub message: String,
    /// Percent complete, when the backend reports it.
    pub progress: Option<f64>,
    pub iteration: Option<u64>,
    pub max_iter: Option<u64>,
    /// Result token; only meaningful with `Status::Finished`.
    pub result: Option<String>,
}

impl ProgressUpdate {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            progress: None,
            iteration: None,
            max_iter: None,
            result: None,
        }
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }
}
