use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use labjob_core::{Attempt, JobId, Msg, ProgressUpdate, Status};
use labjob_logging::{job_debug, job_info, job_warn};
use labjob_transport::{EventStream, JobTransport, ProgressEvent};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const STREAM_ENDED_EARLY: &str = "progress stream closed before the job completed";

/// Runs the IO effects of the coordinator on tokio tasks and reports the
/// outcome back to the inbox as messages.
pub(crate) struct EffectRunner {
    transport: Arc<dyn JobTransport>,
    msg_tx: mpsc::UnboundedSender<Msg>,
    cancel_grace: Duration,
    streams: HashMap<JobId, CancellationToken>,
}

impl EffectRunner {
    pub(crate) fn new(
        transport: Arc<dyn JobTransport>,
        msg_tx: mpsc::UnboundedSender<Msg>,
        cancel_grace: Duration,
    ) -> Self {
        Self {
            transport,
            msg_tx,
            cancel_grace,
            streams: HashMap::new(),
        }
    }

    pub(crate) fn submit(&self, attempt: Attempt, payload: serde_json::Value) {
        let transport = Arc::clone(&self.transport);
        let msg_tx = self.msg_tx.clone();
        tokio::spawn(async move {
            let msg = match transport.submit_job(&payload).await {
                Ok(job_id) => {
                    job_info!("submission #{} accepted as job {}", attempt, job_id);
                    Msg::SubmitAccepted {
                        attempt,
                        job_id: JobId::new(job_id),
                    }
                }
                Err(err) => Msg::SubmitRejected {
                    attempt,
                    message: err.message,
                },
            };
            let _ = msg_tx.send(msg);
        });
    }

    pub(crate) fn cancel(&self, job_id: JobId) {
        let transport = Arc::clone(&self.transport);
        let msg_tx = self.msg_tx.clone();
        tokio::spawn(async move {
            let msg = match transport.cancel_job(job_id.as_str()).await {
                Ok(()) => Msg::CancelAccepted { job_id },
                Err(err) => Msg::CancelRejected {
                    job_id,
                    message: err.message,
                },
            };
            let _ = msg_tx.send(msg);
        });
    }

    pub(crate) fn open_stream(&mut self, job_id: JobId) {
        let token = CancellationToken::new();
        if let Some(previous) = self.streams.insert(job_id.clone(), token.clone()) {
            previous.cancel();
        }
        let transport = Arc::clone(&self.transport);
        let msg_tx = self.msg_tx.clone();
        tokio::spawn(async move {
            let opened = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                opened = transport.open_event_stream(job_id.as_str()) => opened,
            };
            match opened {
                Ok(stream) => follow_stream(job_id, stream, token, msg_tx).await,
                Err(err) => {
                    let _ = msg_tx.send(Msg::StreamFailed {
                        job_id,
                        message: err.message,
                    });
                }
            }
        });
    }

    pub(crate) fn close_stream(&mut self, job_id: &JobId) {
        match self.streams.remove(job_id) {
            Some(token) => token.cancel(),
            None => job_debug!("no open stream for job {}", job_id),
        }
    }

    pub(crate) fn schedule_cancel_grace(&self, job_id: JobId) {
        let msg_tx = self.msg_tx.clone();
        let grace = self.cancel_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let _ = msg_tx.send(Msg::CancelGraceElapsed { job_id });
        });
    }

    /// Cancels every stream still being followed.
    pub(crate) fn shutdown(&mut self) {
        for (_, token) in self.streams.drain() {
            token.cancel();
        }
    }
}

async fn follow_stream(
    job_id: JobId,
    mut stream: EventStream,
    token: CancellationToken,
    msg_tx: mpsc::UnboundedSender<Msg>,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => {
                stream.close();
                return;
            }
            next = stream.next() => next,
        };
        let msg = match next {
            Some(Ok(event)) => Msg::StreamUpdate {
                job_id: job_id.clone(),
                update: map_event(event),
            },
            Some(Err(err)) => {
                job_warn!("dropping progress stream for job {}: {}", job_id, err);
                stream.close();
                let _ = msg_tx.send(Msg::StreamFailed {
                    job_id,
                    message: err.message,
                });
                return;
            }
            None => {
                let _ = msg_tx.send(Msg::StreamFailed {
                    job_id,
                    message: STREAM_ENDED_EARLY.to_string(),
                });
                return;
            }
        };
        if msg_tx.send(msg).is_err() {
            stream.close();
            return;
        }
    }
}

fn map_event(event: ProgressEvent) -> ProgressUpdate {
    ProgressUpdate {
        status: Status::parse(&event.status),
        message: event.message,
        progress: event.progress,
        iteration: event.iteration,
        max_iter: event.max_iter,
        result: event.result,
    }
}
