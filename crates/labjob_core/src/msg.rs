use crate::{Attempt, JobId, ProgressUpdate};

/// A job submission as assembled by the query builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    /// Progress dialog title, e.g. `"Normalise dashboard"`.
    pub title: String,
    /// Request body; opaque to the coordinator.
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User asked to submit a new job.
    SubmitRequested(JobRequest),
    /// User pressed cancel on the progress dialog.
    CancelRequested,
    /// Caller wants a clean slate.
    ResetRequested,
    /// Backend accepted submission `attempt`.
    SubmitAccepted { attempt: Attempt, job_id: JobId },
    /// Submission `attempt` failed (HTTP error or unreachable backend).
    SubmitRejected { attempt: Attempt, message: String },
    /// Backend acknowledged the cancel request.
    CancelAccepted { job_id: JobId },
    /// Cancel request failed; the job keeps running.
    CancelRejected { job_id: JobId, message: String },
    /// Grace period after an acknowledged cancel has run out.
    CancelGraceElapsed { job_id: JobId },
    /// One pushed progress message.
    StreamUpdate {
        job_id: JobId,
        update: ProgressUpdate,
    },
    /// The progress stream dropped or delivered garbage.
    StreamFailed { job_id: JobId, message: String },
}
