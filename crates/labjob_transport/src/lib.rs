//! Labjob transport: HTTP submit/cancel calls and the SSE progress stream.
mod event;
mod sse;
mod transport;
mod types;

pub use event::ProgressEvent;
pub use reqwest::Url;
pub use sse::SseDecoder;
pub use transport::{EventStream, JobTransport, ReqwestTransport, TransportSettings};
pub use types::{TransportError, TransportErrorKind};
