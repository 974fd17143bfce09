use std::sync::Arc;
use std::time::Duration;

use labjob_core::{update, CoordinatorState, Effect, JobRequest, JobState, JobView, Msg};
use labjob_logging::{job_debug, job_info};
use labjob_transport::JobTransport;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::effects::EffectRunner;
use crate::presenter::{ErrorPresenter, ProgressPresenter};

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub cancel_grace: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            cancel_grace: Duration::from_secs(5),
        }
    }
}

/// Owns the job state and is its only mutator. Messages from the user and
/// from IO tasks are applied one at a time, in arrival order.
pub struct Coordinator {
    state: CoordinatorState,
    inbox: mpsc::UnboundedReceiver<Msg>,
    effects: EffectRunner,
    progress: Box<dyn ProgressPresenter>,
    errors: Box<dyn ErrorPresenter>,
    view_tx: watch::Sender<JobView>,
    shutdown: CancellationToken,
}

impl Coordinator {
    pub fn new(
        transport: Arc<dyn JobTransport>,
        progress: Box<dyn ProgressPresenter>,
        errors: Box<dyn ErrorPresenter>,
        settings: CoordinatorSettings,
    ) -> (Self, CoordinatorHandle) {
        let (msg_tx, inbox) = mpsc::unbounded_channel();
        let state = CoordinatorState::new();
        let (view_tx, view_rx) = watch::channel(state.view());
        let shutdown = CancellationToken::new();

        let coordinator = Self {
            state,
            inbox,
            effects: EffectRunner::new(transport, msg_tx.clone(), settings.cancel_grace),
            progress,
            errors,
            view_tx,
            shutdown: shutdown.clone(),
        };
        let handle = CoordinatorHandle {
            msg_tx,
            view_rx,
            shutdown,
        };
        (coordinator, handle)
    }

    /// Processes messages until [`CoordinatorHandle::shutdown`] is called.
    pub async fn run(mut self) {
        loop {
            let msg = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                msg = self.inbox.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };
            self.dispatch(msg);
        }
        self.effects.shutdown();
        if self.state.is_progress_open() {
            self.progress.close();
        }
        job_debug!("coordinator stopped in state {}", self.state.state());
    }

    fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (next, effects) = update(state, msg);
        self.state = next;

        for effect in effects {
            self.apply(effect);
        }

        // Snapshot before clearing so the published view carries `dirty`.
        let view = self.state.view();
        if self.state.consume_dirty() {
            if self.state.is_progress_open() {
                self.progress.render(&view);
            }
            self.view_tx.send_replace(view);
        }
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::OpenProgress { title } => self.progress.open(&title),
            Effect::CloseProgress => self.progress.close(),
            Effect::ShowError { message } => self.errors.show(&message),
            Effect::SubmitJob { attempt, payload } => self.effects.submit(attempt, payload),
            Effect::CancelJob { job_id } => {
                job_info!("requesting cancel of job {}", job_id);
                self.effects.cancel(job_id);
            }
            Effect::OpenStream { job_id } => self.effects.open_stream(job_id),
            Effect::CloseStream { job_id } => self.effects.close_stream(&job_id),
            Effect::ScheduleCancelGrace { job_id } => self.effects.schedule_cancel_grace(job_id),
        }
    }
}

/// Cloneable front door to a running [`Coordinator`].
#[derive(Clone)]
pub struct CoordinatorHandle {
    msg_tx: mpsc::UnboundedSender<Msg>,
    view_rx: watch::Receiver<JobView>,
    shutdown: CancellationToken,
}

impl CoordinatorHandle {
    pub fn submit(&self, request: JobRequest) {
        self.send(Msg::SubmitRequested(request));
    }

    pub fn cancel(&self) {
        self.send(Msg::CancelRequested);
    }

    pub fn reset(&self) {
        self.send(Msg::ResetRequested);
    }

    /// Latest published view.
    pub fn view(&self) -> JobView {
        self.view_rx.borrow().clone()
    }

    pub fn current_state(&self) -> JobState {
        self.view_rx.borrow().state
    }

    pub fn current_message(&self) -> String {
        self.view_rx.borrow().message.clone()
    }

    /// Waits until a published view satisfies `pred`. Returns `None` once the
    /// coordinator has stopped.
    pub async fn wait_for(&self, mut pred: impl FnMut(&JobView) -> bool) -> Option<JobView> {
        let mut view_rx = self.view_rx.clone();
        // Bound to a local: the `Ref` borrows `view_rx` and must drop first.
        let view = match view_rx.wait_for(|view| pred(view)).await {
            Ok(view) => Some(view.clone()),
            Err(_) => None,
        };
        view
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn send(&self, msg: Msg) {
        if self.msg_tx.send(msg).is_err() {
            job_debug!("coordinator is gone; message dropped");
        }
    }
}
