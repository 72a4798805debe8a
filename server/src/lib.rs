//! Local development HTTP endpoint: serve a `Handler` over real sockets.
//!
//! # Overview
//! `adapter` converts between hyper requests/responses and the
//! `RequestEvent`/`ResponseEvent` pair from `devserve_core`. `server` owns
//! the listening socket and drives one exchange at a time through a handler.
//! The `devserve` binary wires the three handler modes to a command line.
//!
//! # Design
//! - Single-threaded and blocking from the caller's point of view: a private
//!   current-thread runtime runs hyper underneath.
//! - Handler failures are never turned into HTTP responses. The connection
//!   is closed and the error is returned (or logged by `serve_forever`).

pub mod adapter;
pub mod cli;
pub mod error;
pub mod server;

pub use adapter::{build_request_event, build_response, handle_one, reason_phrase, OutgoingBody};
pub use error::ServerError;
pub use server::{read_body, serve_forever, serve_single, Outcome, Server};
