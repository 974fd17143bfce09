use std::sync::Once;

use labjob_core::{
    update, CoordinatorState, Effect, JobId, JobRequest, JobState, Msg, ProgressUpdate, Status,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(labjob_logging::initialize_for_tests);
}

fn active_job() -> CoordinatorState {
    let (state, _) = update(
        CoordinatorState::new(),
        Msg::SubmitRequested(JobRequest {
            title: "Normalise dashboard".to_string(),
            payload: json!({"app": "Normalise", "target_mass": 50.0}),
        }),
    );
    let (state, _) = update(
        state,
        Msg::SubmitAccepted {
            attempt: 1,
            job_id: JobId::from("abc123"),
        },
    );
    state
}

fn job() -> JobId {
    JobId::from("abc123")
}

fn push(state: CoordinatorState, update_msg: ProgressUpdate) -> (CoordinatorState, Vec<Effect>) {
    update(
        state,
        Msg::StreamUpdate {
            job_id: job(),
            update: update_msg,
        },
    )
}

#[test]
fn cancel_requests_backend_cancellation_once() {
    init_logging();
    let (state, effects) = update(active_job(), Msg::CancelRequested);

    assert_eq!(effects, vec![Effect::CancelJob { job_id: job() }]);
    assert_eq!(state.state(), JobState::Active);
    assert!(!state.view().cancel_enabled);

    let (_state, effects) = update(state, Msg::CancelRequested);
    assert!(effects.is_empty());
}

#[test]
fn cancel_without_identifier_is_ignored() {
    init_logging();
    let (state, effects) = update(CoordinatorState::new(), Msg::CancelRequested);
    assert!(effects.is_empty());
    assert_eq!(state.state(), JobState::Idle);

    let (state, _) = update(
        state,
        Msg::SubmitRequested(JobRequest {
            title: "t".to_string(),
            payload: json!({}),
        }),
    );
    let (state, effects) = update(state, Msg::CancelRequested);
    assert!(effects.is_empty());
    assert_eq!(state.state(), JobState::Submitting);
}

#[test]
fn acknowledged_cancel_then_cancelled_event_settles_quietly() {
    init_logging();
    let (state, _) = update(active_job(), Msg::CancelRequested);
    let (state, effects) = update(state, Msg::CancelAccepted { job_id: job() });

    assert_eq!(
        effects,
        vec![
            Effect::CloseProgress,
            Effect::ScheduleCancelGrace { job_id: job() },
        ]
    );
    // Still listening for the backend's verdict.
    assert_eq!(state.state(), JobState::Active);
    assert!(state.is_stream_open());
    assert_eq!(state.message(), "Cancelling...");

    let (state, effects) = push(state, ProgressUpdate::new(Status::Cancelled, "Cancelled"));
    assert_eq!(state.state(), JobState::Cancelled);
    assert!(!state.is_stream_open());
    assert_eq!(effects, vec![Effect::CloseStream { job_id: job() }]);
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::ShowError { .. })));
}

#[test]
fn failed_cancel_keeps_job_active_and_shows_error() {
    init_logging();
    let (state, _) = update(active_job(), Msg::CancelRequested);
    let (state, effects) = update(
        state,
        Msg::CancelRejected {
            job_id: job(),
            message: "network down".to_string(),
        },
    );

    assert_eq!(state.state(), JobState::Active);
    assert!(state.is_stream_open());
    assert!(state.is_progress_open());
    assert!(state.view().cancel_enabled);
    assert_eq!(
        effects,
        vec![Effect::ShowError {
            message: "network down".to_string()
        }]
    );
}

#[test]
fn finished_event_wins_over_acknowledged_cancel() {
    init_logging();
    let (state, _) = update(active_job(), Msg::CancelRequested);
    let (state, _) = update(state, Msg::CancelAccepted { job_id: job() });
    let (state, effects) = push(
        state,
        ProgressUpdate::new(Status::Finished, "Done").with_result("r1"),
    );

    assert_eq!(state.state(), JobState::Finished);
    assert_eq!(state.result_path().as_deref(), Some("/result/r1"));
    assert_eq!(effects, vec![Effect::CloseStream { job_id: job() }]);

    // The grace timer firing afterwards changes nothing.
    let settled = state.clone();
    let (state, effects) = update(state, Msg::CancelGraceElapsed { job_id: job() });
    assert!(effects.is_empty());
    assert_eq!(state, settled);
}

#[test]
fn finished_event_before_cancel_response_is_kept() {
    init_logging();
    let (state, _) = update(active_job(), Msg::CancelRequested);
    let (state, _) = push(
        state,
        ProgressUpdate::new(Status::Finished, "Done").with_result("r1"),
    );
    let settled = state.clone();

    let (state, effects) = update(state, Msg::CancelAccepted { job_id: job() });
    assert!(effects.is_empty());
    assert_eq!(state, settled);

    let (state, effects) = update(
        state,
        Msg::CancelRejected {
            job_id: job(),
            message: "already done".to_string(),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.state(), JobState::Finished);
}

#[test]
fn grace_period_without_final_event_cancels_locally() {
    init_logging();
    let (state, _) = update(active_job(), Msg::CancelRequested);
    let (state, _) = update(state, Msg::CancelAccepted { job_id: job() });
    let (state, effects) = update(state, Msg::CancelGraceElapsed { job_id: job() });

    assert_eq!(state.state(), JobState::Cancelled);
    assert_eq!(state.message(), "Cancelled");
    assert_eq!(effects, vec![Effect::CloseStream { job_id: job() }]);

    // A late `cancelled` push is superseded.
    let (state, effects) = push(state, ProgressUpdate::new(Status::Cancelled, "Cancelled"));
    assert!(effects.is_empty());
    assert_eq!(state.state(), JobState::Cancelled);
}

#[test]
fn grace_elapsed_without_acknowledged_cancel_is_ignored() {
    init_logging();
    let state = active_job();
    let before = state.clone();
    let (state, effects) = update(state, Msg::CancelGraceElapsed { job_id: job() });
    assert!(effects.is_empty());
    assert_eq!(state, before);
}
