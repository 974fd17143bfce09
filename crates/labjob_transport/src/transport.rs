use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};
use labjob_logging::{job_debug, job_trace, job_warn};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use crate::{ProgressEvent, SseDecoder, TransportError, TransportErrorKind};

#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Backend root; `/submit`, `/cancel/{id}`, `/progress/{id}` and
    /// `/result/{token}` are resolved below it.
    pub base_url: Url,
    pub connect_timeout: Duration,
    /// Applies to submit and cancel; the progress stream has no overall timeout.
    pub request_timeout: Duration,
}

impl TransportSettings {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Live subscription to one job's progress stream.
///
/// Delivers events in server order until the server ends the stream, an error
/// occurs, or [`EventStream::close`] is called.
pub struct EventStream {
    job_id: String,
    inner: Option<BoxStream<'static, Result<ProgressEvent, TransportError>>>,
}

impl EventStream {
    pub fn new(
        job_id: impl Into<String>,
        events: impl Stream<Item = Result<ProgressEvent, TransportError>> + Send + 'static,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            inner: Some(events.boxed()),
        }
    }

    /// Next event; `None` once the stream has ended or been closed.
    pub async fn next(&mut self) -> Option<Result<ProgressEvent, TransportError>> {
        match self.inner.as_mut() {
            Some(events) => events.next().await,
            None => None,
        }
    }

    /// Drops the underlying connection. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.inner.take().is_some() {
            job_debug!("closed progress stream for job {}", self.job_id);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

#[async_trait::async_trait]
pub trait JobTransport: Send + Sync {
    /// `POST /submit`; returns the backend-assigned job id.
    async fn submit_job(&self, payload: &serde_json::Value) -> Result<String, TransportError>;

    /// `GET /cancel/{job_id}`.
    async fn cancel_job(&self, job_id: &str) -> Result<(), TransportError>;

    /// Subscribe to `/progress/{job_id}`.
    async fn open_event_stream(&self, job_id: &str) -> Result<EventStream, TransportError>;

    /// Where the finished job's result can be fetched.
    fn result_url(&self, result_token: &str) -> String;
}

#[derive(Deserialize)]
struct SubmitResponse {
    job_id: String,
}

#[derive(Deserialize)]
struct FailureBody {
    message: String,
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    settings: TransportSettings,
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(settings: TransportSettings) -> Result<Self, TransportError> {
        if settings.base_url.cannot_be_a_base() {
            return Err(TransportError::new(
                TransportErrorKind::Setup,
                format!("base url {} cannot have paths", settings.base_url),
            ));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| TransportError::new(TransportErrorKind::Setup, err.to_string()))?;
        Ok(Self { settings, client })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.settings.base_url.clone();
        // `new` rejected cannot-be-a-base URLs, so this always succeeds.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait::async_trait]
impl JobTransport for ReqwestTransport {
    async fn submit_job(&self, payload: &serde_json::Value) -> Result<String, TransportError> {
        let body = serde_json::to_vec(payload)
            .map_err(|err| TransportError::submission(err.to_string()))?;
        let response = self
            .client
            .post(self.endpoint(&["submit"]))
            .timeout(self.settings.request_timeout)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|err| TransportError::submission(err.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| TransportError::submission(err.to_string()))?;
        if !status.is_success() {
            return Err(TransportError::submission(failure_message(status, &bytes)));
        }

        let accepted: SubmitResponse = serde_json::from_slice(&bytes).map_err(|err| {
            TransportError::submission(format!("malformed submit response: {err}"))
        })?;
        Ok(accepted.job_id)
    }

    async fn cancel_job(&self, job_id: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .get(self.endpoint(&["cancel", job_id]))
            .timeout(self.settings.request_timeout)
            .send()
            .await
            .map_err(|err| TransportError::cancellation(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let bytes = response.bytes().await.unwrap_or_default();
        Err(TransportError::cancellation(failure_message(status, &bytes)))
    }

    async fn open_event_stream(&self, job_id: &str) -> Result<EventStream, TransportError> {
        let response = self
            .client
            .get(self.endpoint(&["progress", job_id]))
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|err| TransportError::stream(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let bytes = response.bytes().await.unwrap_or_default();
            return Err(TransportError::stream(failure_message(status, &bytes)));
        }

        let body = response.bytes_stream().boxed();
        Ok(EventStream::new(job_id, decode_events(body)))
    }

    fn result_url(&self, result_token: &str) -> String {
        self.endpoint(&["result", result_token]).to_string()
    }
}

/// Prefer the backend's `{"message": ...}`; fall back to the status line.
fn failure_message(status: StatusCode, body: &[u8]) -> String {
    match serde_json::from_slice::<FailureBody>(body) {
        Ok(failure) if !failure.message.trim().is_empty() => failure.message,
        _ => status.to_string(),
    }
}

struct DecodeState {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    done: bool,
}

fn decode_events(
    body: BoxStream<'static, reqwest::Result<Bytes>>,
) -> impl Stream<Item = Result<ProgressEvent, TransportError>> + Send + 'static {
    let state = DecodeState {
        body,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };
    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(data) = state.pending.pop_front() {
                job_trace!("progress event: {}", data);
                return Some((ProgressEvent::from_json(&data), state));
            }
            if state.done {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => state.pending.extend(state.decoder.push(&chunk)),
                Some(Err(err)) => {
                    job_warn!("progress stream read failed: {}", err);
                    state.done = true;
                    return Some((Err(TransportError::stream(err.to_string())), state));
                }
                None => {
                    if state.decoder.has_pending() {
                        job_debug!("progress stream ended inside an event; dropping it");
                    }
                    state.done = true;
                }
            }
        }
    })
}
