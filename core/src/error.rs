//! Error types for handler construction and proxy forwarding.
//!
//! # Design
//! Configuration problems surface when a handler is built and are fatal to
//! the caller. Proxy failures are returned from `handle` untouched: there is
//! no retry and no synthesized error response.

use std::path::PathBuf;

/// Errors raised while loading or validating predetermined responses.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The response mapping file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The response mapping is not valid JSON of the expected shape.
    #[error("malformed response mapping: {0}")]
    Parse(#[from] serde_json::Error),

    /// A mapping key is not of the form `METHOD:/path`.
    #[error("invalid response key {0:?}: expected METHOD:/path")]
    InvalidKey(String),

    /// A mapping key names a method outside the supported set.
    #[error("invalid response key {key:?}: {source}")]
    InvalidMethod {
        key: String,
        #[source]
        source: crate::http::UnknownMethod,
    },
}

/// Errors returned by `ProxyRecorder::handle`.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The outbound request could not be assembled from the inbound one.
    #[error("cannot build upstream request: {0}")]
    Request(#[from] ureq::http::Error),

    /// Connection, TLS, timeout or body read failure against the upstream.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] ureq::Error),

    /// The transcript entry could not be serialized.
    #[error("cannot encode transcript entry: {0}")]
    Encode(#[from] serde_json::Error),

    /// The transcript file could not be opened or written.
    #[error("cannot append to transcript {path}: {source}")]
    Transcript {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
