use std::fmt;

use labjob_logging::job_error;

use crate::view_model::JobView;

/// Sequence number of a submission; used to drop completions of superseded submits.
pub type Attempt = u64;

pub(crate) const WAITING_MESSAGE: &str = "Waiting...";
pub(crate) const SUBMITTING_MESSAGE: &str = "Submitting...";
pub(crate) const CANCELLING_MESSAGE: &str = "Cancelling...";
pub(crate) const ERROR_MESSAGE: &str = "Error";

/// Backend-assigned job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Token naming a finished job's downloadable result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultToken(String);

impl ResultToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Relative retrieval path, `/result/{token}`.
    pub fn result_path(&self) -> String {
        format!("/result/{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    Idle,
    Submitting,
    Active,
    Cancelled,
    Errored,
    Finished,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Cancelled | JobState::Errored | JobState::Finished
        )
    }

    /// Legal-transition table of the job lifecycle.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (_, Idle) => true,
            (Idle | Submitting, Submitting) => true,
            (Cancelled | Errored | Finished, Submitting) => true,
            (Submitting, Active | Errored) => true,
            (Active, Active | Cancelled | Errored | Finished) => true,
            _ => false,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            JobState::Idle => "Idle",
            JobState::Submitting => "Submitting",
            JobState::Active => "Active",
            JobState::Cancelled => "Cancelled",
            JobState::Errored => "Errored",
            JobState::Finished => "Finished",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum CancelPhase {
    #[default]
    None,
    Requested,
    Acknowledged,
}

/// The single job tracked by a coordinator.
///
/// Fields are private; `update` mutates them through the `pub(crate)` helpers
/// below, and `state` itself only changes through [`CoordinatorState::transition`].
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorState {
    state: JobState,
    job_id: Option<JobId>,
    title: Option<String>,
    message: String,
    progress: Option<f64>,
    iteration: Option<u64>,
    max_iter: Option<u64>,
    result: Option<ResultToken>,
    attempt: Attempt,
    stream_open: bool,
    progress_open: bool,
    cancel: CancelPhase,
    dirty: bool,
}

impl Default for CoordinatorState {
    fn default() -> Self {
        Self {
            state: JobState::Idle,
            job_id: None,
            title: None,
            message: WAITING_MESSAGE.to_string(),
            progress: None,
            iteration: None,
            max_iter: None,
            result: None,
            attempt: 0,
            stream_open: false,
            progress_open: false,
            cancel: CancelPhase::None,
            dirty: false,
        }
    }
}

impl CoordinatorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn job_id(&self) -> Option<&JobId> {
        self.job_id.as_ref()
    }

    pub fn attempt(&self) -> Attempt {
        self.attempt
    }

    /// Only readable once the job has finished.
    pub fn result_token(&self) -> Option<&ResultToken> {
        match self.state {
            JobState::Finished => self.result.as_ref(),
            _ => None,
        }
    }

    pub fn result_path(&self) -> Option<String> {
        self.result_token().map(ResultToken::result_path)
    }

    pub fn is_stream_open(&self) -> bool {
        self.stream_open
    }

    pub fn is_progress_open(&self) -> bool {
        self.progress_open
    }

    pub fn view(&self) -> JobView {
        JobView {
            state: self.state,
            job_id: self.job_id.clone(),
            title: self.title.clone(),
            message: self.message.clone(),
            progress: self.progress,
            iteration: self.iteration,
            max_iter: self.max_iter,
            result_token: self.result_token().cloned(),
            result_path: self.result_path(),
            cancel_enabled: self.cancel_enabled(),
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call, and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn cancel_enabled(&self) -> bool {
        self.state == JobState::Active && self.cancel == CancelPhase::None
    }

    pub(crate) fn cancel_phase(&self) -> CancelPhase {
        self.cancel
    }

    /// True when `job_id` names the job whose stream is still live.
    pub(crate) fn is_live(&self, job_id: &JobId) -> bool {
        self.state == JobState::Active && self.job_id.as_ref() == Some(job_id)
    }

    /// The only writer of `state`. Refuses moves outside the lifecycle table.
    pub(crate) fn transition(&mut self, next: JobState) -> bool {
        if !self.state.can_transition_to(next) {
            job_error!("illegal job transition {} -> {}", self.state, next);
            return false;
        }
        self.state = next;
        self.dirty = true;
        true
    }

    /// Forget the previous job and start submission attempt `attempt + 1`.
    pub(crate) fn begin_submission(&mut self, title: String) -> Attempt {
        self.attempt += 1;
        self.job_id = None;
        self.result = None;
        self.progress = None;
        self.iteration = None;
        self.max_iter = None;
        self.cancel = CancelPhase::None;
        self.title = Some(title);
        self.message = SUBMITTING_MESSAGE.to_string();
        self.attempt
    }

    /// Bump the attempt counter so in-flight submissions become stale.
    pub(crate) fn clear(&mut self) {
        self.attempt += 1;
        self.job_id = None;
        self.title = None;
        self.result = None;
        self.progress = None;
        self.iteration = None;
        self.max_iter = None;
        self.cancel = CancelPhase::None;
        self.message = WAITING_MESSAGE.to_string();
        self.dirty = true;
    }

    pub(crate) fn attach_job(&mut self, job_id: JobId) {
        self.job_id = Some(job_id);
        self.stream_open = true;
    }

    pub(crate) fn set_cancel_phase(&mut self, phase: CancelPhase) {
        self.cancel = phase;
        if phase == CancelPhase::Acknowledged {
            self.message = CANCELLING_MESSAGE.to_string();
        }
        self.dirty = true;
    }

    pub(crate) fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
        self.dirty = true;
    }

    pub(crate) fn set_progress(
        &mut self,
        progress: Option<f64>,
        iteration: Option<u64>,
        max_iter: Option<u64>,
    ) {
        // Keep the last known figures when an update omits them.
        self.progress = progress.or(self.progress);
        self.iteration = iteration.or(self.iteration);
        self.max_iter = max_iter.or(self.max_iter);
        self.dirty = true;
    }

    pub(crate) fn set_result(&mut self, token: Option<String>) {
        self.result = token.map(ResultToken::new);
    }

    /// Marks the stream closed; returns the job whose stream was open, if any.
    pub(crate) fn take_stream(&mut self) -> Option<JobId> {
        if !self.stream_open {
            return None;
        }
        self.stream_open = false;
        self.job_id.clone()
    }

    pub(crate) fn mark_progress_open(&mut self) -> bool {
        !std::mem::replace(&mut self.progress_open, true)
    }

    pub(crate) fn take_progress(&mut self) -> bool {
        std::mem::take(&mut self.progress_open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_only_leave_through_submit_or_reset() {
        for terminal in [JobState::Cancelled, JobState::Errored, JobState::Finished] {
            assert!(terminal.is_terminal());
            assert!(terminal.can_transition_to(JobState::Submitting));
            assert!(terminal.can_transition_to(JobState::Idle));
            assert!(!terminal.can_transition_to(JobState::Active));
            assert!(!terminal.can_transition_to(JobState::Finished));
        }
    }

    #[test]
    fn active_cannot_be_resubmitted() {
        assert!(!JobState::Active.can_transition_to(JobState::Submitting));
        assert!(!JobState::Idle.can_transition_to(JobState::Active));
    }

    #[test]
    fn illegal_transition_leaves_state_untouched() {
        let mut state = CoordinatorState::new();
        assert!(!state.transition(JobState::Finished));
        assert_eq!(state.state(), JobState::Idle);
        assert!(!state.consume_dirty());
    }

    #[test]
    fn result_token_hidden_until_finished() {
        let mut state = CoordinatorState::new();
        state.set_result(Some("r1".to_string()));
        assert_eq!(state.result_token(), None);
    }
}
