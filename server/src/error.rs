//! Error types for the transport adapter and serving loop.
//!
//! # Design
//! A handler's own error is boxed into `ServerError::Handler` and returned to
//! whoever drove the exchange. Nothing in this crate turns an error into an
//! HTTP response: a failed exchange ends with the connection closed.

use std::error::Error;

use devserve_core::http::UnknownMethod;
use devserve_core::CaptureError;

/// Errors raised while serving.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listening socket could not be bound.
    #[error("cannot bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// The serving runtime could not be created.
    #[error("cannot start runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// Accepting an inbound connection failed.
    #[error("cannot accept connection: {0}")]
    Accept(#[source] std::io::Error),

    /// The HTTP exchange failed at the protocol or socket level.
    #[error("connection error: {0}")]
    Connection(#[from] hyper::Error),

    /// The interrupt handler could not be installed.
    #[error("cannot listen for interrupts: {0}")]
    Signal(#[source] std::io::Error),

    /// The request used a method outside the supported set.
    #[error(transparent)]
    UnsupportedMethod(#[from] UnknownMethod),

    /// A handler produced a status code with no standard reason phrase.
    #[error("no reason phrase for status code {0}")]
    UnknownStatus(u16),

    /// A handler produced a header that cannot be written.
    #[error("invalid response header {0:?}")]
    InvalidHeader(String),

    /// The handler itself failed.
    #[error("handler failed: {0}")]
    Handler(#[source] Box<dyn Error + Send + Sync>),

    /// A single-capture wait ended without a value.
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

impl ServerError {
    /// True when a single-capture wait was interrupted by the user.
    pub fn is_aborted(&self) -> bool {
        matches!(self, ServerError::Capture(CaptureError::Aborted))
    }
}
