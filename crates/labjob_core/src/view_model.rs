use crate::{JobId, JobState, ResultToken};

/// Read-only snapshot handed to presenters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobView {
    pub state: JobState,
    pub job_id: Option<JobId>,
    pub title: Option<String>,
    pub message: String,
    pub progress: Option<f64>,
    pub iteration: Option<u64>,
    pub max_iter: Option<u64>,
    /// Only set when the job finished with a result.
    pub result_token: Option<ResultToken>,
    /// `/result/{token}`, alongside `result_token`.
    pub result_path: Option<String>,
    /// Whether a cancel button should be active.
    pub cancel_enabled: bool,
    pub dirty: bool,
}
