//! Request/response abstraction and handler strategies for a local
//! development HTTP endpoint.
//!
//! # Overview
//! The transport adapter (in the `devserve` crate) turns each inbound
//! exchange into a `RequestEvent`, hands it to a `Handler`, and writes the
//! returned `ResponseEvent` back out. This crate holds everything on the
//! handler side of that seam and performs no server I/O itself.
//!
//! # Design
//! - `Handler` is a single-method trait; each mode is one concrete type:
//!   `MockHandler`, `ProxyRecorder`, `CaptureHandler`.
//! - Events carry raw bytes for one exchange; records (`RequestRecord`,
//!   `ResponseRecord`) are the serializable copies handlers keep.
//! - `hygiene::clean_headers` strips hop-by-hop headers before anything
//!   leaves the process.

pub mod capture;
pub mod error;
pub mod handler;
pub mod http;
pub mod hygiene;
pub mod mock;
pub mod proxy;
pub mod types;

pub use capture::{capture_request, CaptureError, CaptureHandler, CaptureState};
pub use error::{ConfigError, ProxyError};
pub use handler::Handler;
pub use http::{Headers, HttpMethod, QueryParams, RequestEvent, ResponseBody, ResponseEvent};
pub use hygiene::clean_headers;
pub use mock::{load_responses, MockHandler};
pub use proxy::ProxyRecorder;
pub use types::{
    PredeterminedResponse, RequestRecord, ResponseMapping, ResponseRecord, TranscriptEntry,
};
