use crate::{Attempt, JobId};

/// Side effects requested by [`crate::update`]; executed by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Show the progress dialog.
    OpenProgress { title: String },
    /// Dismiss the progress dialog.
    CloseProgress,
    /// Show a terminal error to the user.
    ShowError { message: String },
    /// POST the payload; the completion must carry `attempt` back.
    SubmitJob {
        attempt: Attempt,
        payload: serde_json::Value,
    },
    /// Ask the backend to cancel `job_id`.
    CancelJob { job_id: JobId },
    /// Subscribe to the progress stream of `job_id`.
    OpenStream { job_id: JobId },
    /// Release the progress stream of `job_id`. Emitted once per opened stream.
    CloseStream { job_id: JobId },
    /// Deliver `Msg::CancelGraceElapsed` for `job_id` after the grace period.
    ScheduleCancelGrace { job_id: JobId },
}
