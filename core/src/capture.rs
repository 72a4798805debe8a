//! One-shot capture of a single inbound request.
//!
//! # Design
//! `CaptureHandler` wraps any `FnMut(&RequestEvent) -> R` and keeps the one
//! value it produces. The caller's browser only ever sees a fixed success
//! page; the captured value stays with the process that started the server.
//!
//! The server lifetime is an explicit state machine so that "nothing arrived"
//! and "we were interrupted" are terminal states of their own, never an
//! empty value mistaken for a real one:
//!
//! ```text
//! Idle ──listening()──▶ Listening ──handle()──▶ Captured(R)
//!                           │
//!                           ├──timed_out()──▶ TimedOut
//!                           └──aborted()────▶ Aborted
//! ```

use std::convert::Infallible;

use crate::handler::Handler;
use crate::http::{Headers, RequestEvent, ResponseBody, ResponseEvent};
use crate::types::RequestRecord;

pub const DEFAULT_SUCCESS_MESSAGE: &str = "Go back to terminal.";

/// Lifecycle of a single-capture server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureState<R> {
    Idle,
    Listening,
    Captured(R),
    TimedOut,
    Aborted,
}

/// Why no captured value is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// The wait ended without any request reaching the handler.
    #[error("no request was captured")]
    NoResult,

    /// The wait was interrupted by the user.
    #[error("server stopped by user")]
    Aborted,
}

/// Handler that captures the first request it sees.
pub struct CaptureHandler<F, R> {
    inner: F,
    success_message: String,
    state: CaptureState<R>,
}

impl<F, R> CaptureHandler<F, R>
where
    F: FnMut(&RequestEvent) -> R,
{
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            success_message: DEFAULT_SUCCESS_MESSAGE.to_string(),
            state: CaptureState::Idle,
        }
    }

    pub fn with_success_message(self, message: impl Into<String>) -> Self {
        Self {
            success_message: message.into(),
            ..self
        }
    }

    pub fn state(&self) -> &CaptureState<R> {
        &self.state
    }

    /// The server is bound and waiting.
    pub fn listening(&mut self) {
        if matches!(self.state, CaptureState::Idle) {
            self.state = CaptureState::Listening;
        }
    }

    /// The wait elapsed with no request.
    pub fn timed_out(&mut self) {
        if matches!(self.state, CaptureState::Idle | CaptureState::Listening) {
            self.state = CaptureState::TimedOut;
        }
    }

    /// The user interrupted the wait.
    pub fn aborted(&mut self) {
        if matches!(self.state, CaptureState::Idle | CaptureState::Listening) {
            self.state = CaptureState::Aborted;
        }
    }

    /// Take the captured value.
    pub fn into_result(self) -> Result<R, CaptureError> {
        match self.state {
            CaptureState::Captured(value) => Ok(value),
            CaptureState::Aborted => Err(CaptureError::Aborted),
            CaptureState::Idle | CaptureState::Listening | CaptureState::TimedOut => {
                Err(CaptureError::NoResult)
            }
        }
    }

    fn success_page(&self) -> String {
        format!(
            "<html><body><h1>Success</h1><p>{}</p></body></html>",
            self.success_message
        )
    }
}

fn record_request(request: &RequestEvent) -> RequestRecord {
    RequestRecord::from(request)
}

/// Handler that captures the request itself as a `RequestRecord`.
pub fn capture_request() -> CaptureHandler<fn(&RequestEvent) -> RequestRecord, RequestRecord> {
    let inner: fn(&RequestEvent) -> RequestRecord = record_request;
    CaptureHandler::new(inner)
}

impl<F, R> Handler for CaptureHandler<F, R>
where
    F: FnMut(&RequestEvent) -> R,
{
    type Error = Infallible;

    fn handle(&mut self, request: &RequestEvent) -> Result<ResponseEvent, Infallible> {
        if matches!(self.state, CaptureState::Captured(_)) {
            tracing::warn!(url = %request.url, "Request arrived after capture, ignoring");
        } else {
            let value = (self.inner)(request);
            self.state = CaptureState::Captured(value);
            tracing::debug!(url = %request.url, "Captured request");
        }
        Ok(ResponseEvent::new(
            200,
            Headers::new(),
            ResponseBody::once(self.success_page()),
        ))
    }
}
