use labjob_logging::{job_debug, job_info, job_warn};

use crate::state::{CancelPhase, ERROR_MESSAGE};
use crate::{
    Attempt, CoordinatorState, Effect, JobId, JobRequest, JobState, Msg, ProgressUpdate, Status,
};

const SERVER_ERROR_FALLBACK: &str = "The job reported an error";

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: CoordinatorState, msg: Msg) -> (CoordinatorState, Vec<Effect>) {
    let effects = match msg {
        Msg::SubmitRequested(request) => submit(&mut state, request),
        Msg::CancelRequested => cancel(&mut state),
        Msg::ResetRequested => reset(&mut state),
        Msg::SubmitAccepted { attempt, job_id } => submit_accepted(&mut state, attempt, job_id),
        Msg::SubmitRejected { attempt, message } => {
            if !is_current_submission(&state, attempt) {
                job_debug!("ignoring failure of superseded submission #{}", attempt);
                return (state, Vec::new());
            }
            job_warn!("submission #{} failed: {}", attempt, message);
            fail(&mut state, message)
        }
        Msg::CancelAccepted { job_id } => cancel_accepted(&mut state, job_id),
        Msg::CancelRejected { job_id, message } => {
            if !state.is_live(&job_id) {
                job_debug!("dropping cancel failure for finished job {}", job_id);
                return (state, Vec::new());
            }
            job_warn!("cancel of job {} failed: {}", job_id, message);
            // Cancellation did not take effect; the job keeps running.
            state.set_cancel_phase(CancelPhase::None);
            vec![Effect::ShowError { message }]
        }
        Msg::CancelGraceElapsed { job_id } => {
            if state.is_live(&job_id) && state.cancel_phase() == CancelPhase::Acknowledged {
                job_info!("job {} sent no terminal event after cancel; closing", job_id);
                terminate(&mut state, JobState::Cancelled, "Cancelled")
            } else {
                Vec::new()
            }
        }
        Msg::StreamUpdate { job_id, update } => stream_update(&mut state, job_id, update),
        Msg::StreamFailed { job_id, message } => {
            if !state.is_live(&job_id) || !state.is_stream_open() {
                job_debug!("ignoring stream failure for superseded job {}", job_id);
                return (state, Vec::new());
            }
            job_warn!("progress stream for job {} failed: {}", job_id, message);
            fail(&mut state, message)
        }
    };

    (state, effects)
}

fn submit(state: &mut CoordinatorState, request: JobRequest) -> Vec<Effect> {
    if !state.state().can_transition_to(JobState::Submitting) {
        job_warn!(
            "submit ignored: job {} is still {}",
            state
                .job_id()
                .map(JobId::as_str)
                .unwrap_or("<none>"),
            state.state()
        );
        return Vec::new();
    }

    let mut effects = Vec::with_capacity(2);
    let attempt = state.begin_submission(request.title.clone());
    state.transition(JobState::Submitting);
    job_info!("submitting job #{} ({})", attempt, request.title);

    if state.mark_progress_open() {
        effects.push(Effect::OpenProgress {
            title: request.title,
        });
    }
    effects.push(Effect::SubmitJob {
        attempt,
        payload: request.payload,
    });
    effects
}

fn submit_accepted(state: &mut CoordinatorState, attempt: Attempt, job_id: JobId) -> Vec<Effect> {
    if !is_current_submission(state, attempt) {
        job_warn!(
            "backend accepted superseded submission #{} as job {}; ignoring",
            attempt,
            job_id
        );
        return Vec::new();
    }
    if !state.transition(JobState::Active) {
        return Vec::new();
    }
    job_info!("submission #{} accepted as job {}", attempt, job_id);
    state.attach_job(job_id.clone());
    vec![Effect::OpenStream { job_id }]
}

fn cancel(state: &mut CoordinatorState) -> Vec<Effect> {
    let Some(job_id) = state.job_id().cloned() else {
        job_warn!("cancel ignored: no job has been assigned yet");
        return Vec::new();
    };
    if state.state() != JobState::Active {
        job_debug!("cancel ignored: job {} is {}", job_id, state.state());
        return Vec::new();
    }
    if state.cancel_phase() != CancelPhase::None {
        job_debug!("cancel of job {} already in flight", job_id);
        return Vec::new();
    }
    job_info!("requesting cancellation of job {}", job_id);
    state.set_cancel_phase(CancelPhase::Requested);
    vec![Effect::CancelJob { job_id }]
}

fn cancel_accepted(state: &mut CoordinatorState, job_id: JobId) -> Vec<Effect> {
    if !state.is_live(&job_id) {
        job_debug!("cancel acknowledged for job {} after it ended", job_id);
        return Vec::new();
    }
    job_info!("cancel of job {} acknowledged; awaiting final event", job_id);
    state.set_cancel_phase(CancelPhase::Acknowledged);
    let mut effects = Vec::with_capacity(2);
    if state.take_progress() {
        effects.push(Effect::CloseProgress);
    }
    // The stream stays open so a `finished` already in flight still wins.
    effects.push(Effect::ScheduleCancelGrace { job_id });
    effects
}

fn stream_update(state: &mut CoordinatorState, job_id: JobId, update: ProgressUpdate) -> Vec<Effect> {
    if !state.is_live(&job_id) || !state.is_stream_open() {
        job_debug!(
            "ignoring superseded {:?} event for job {}",
            update.status,
            job_id
        );
        return Vec::new();
    }

    let ProgressUpdate {
        status,
        message,
        progress,
        iteration,
        max_iter,
        result,
    } = update;
    state.set_progress(progress, iteration, max_iter);

    match status {
        Status::InProgress(_) => {
            state.set_message(message);
            Vec::new()
        }
        Status::Finished => {
            if result.is_none() {
                job_warn!("job {} finished without a result token", job_id);
            }
            state.set_result(result);
            terminate(state, JobState::Finished, message)
        }
        Status::Cancelled => terminate(state, JobState::Cancelled, message),
        Status::Error => {
            let shown = if message.trim().is_empty() {
                SERVER_ERROR_FALLBACK.to_string()
            } else {
                message.clone()
            };
            let mut effects = terminate(state, JobState::Errored, message);
            effects.push(Effect::ShowError { message: shown });
            effects
        }
    }
}

/// Local failure of the current job: mark it errored and tell the user.
fn fail(state: &mut CoordinatorState, message: String) -> Vec<Effect> {
    let mut effects = terminate(state, JobState::Errored, ERROR_MESSAGE);
    if state.state() == JobState::Errored {
        effects.push(Effect::ShowError { message });
    }
    effects
}

/// Move into a terminal state, releasing the stream and the progress dialog.
fn terminate(
    state: &mut CoordinatorState,
    next: JobState,
    message: impl Into<String>,
) -> Vec<Effect> {
    if !state.transition(next) {
        return Vec::new();
    }
    state.set_message(message);
    job_info!(
        "job {} is {}",
        state.job_id().map(JobId::as_str).unwrap_or("<unassigned>"),
        next
    );
    release(state)
}

fn reset(state: &mut CoordinatorState) -> Vec<Effect> {
    let effects = release(state);
    state.clear();
    state.transition(JobState::Idle);
    effects
}

fn release(state: &mut CoordinatorState) -> Vec<Effect> {
    let mut effects = Vec::with_capacity(2);
    if let Some(job_id) = state.take_stream() {
        effects.push(Effect::CloseStream { job_id });
    }
    if state.take_progress() {
        effects.push(Effect::CloseProgress);
    }
    effects
}

fn is_current_submission(state: &CoordinatorState, attempt: Attempt) -> bool {
    state.state() == JobState::Submitting && state.attempt() == attempt
}
