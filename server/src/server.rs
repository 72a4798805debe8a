//! Blocking single-connection HTTP server driving a `Handler`.
//!
//! # Design
//! The public API is synchronous. Each `Server` owns a private
//! current-thread tokio runtime and serves one connection at a time with
//! keep-alive disabled, so exactly one exchange is in flight and the handler
//! needs no synchronization.
//!
//! When a handler fails, the error is parked beside the connection and the
//! service reports an abort to hyper. The client sees the connection close
//! with no response; the caller gets the original error back.

use std::cell::{Cell, RefCell};
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use devserve_core::{CaptureHandler, Handler, RequestEvent};
use http::{Request, Response};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use tracing::Instrument;
use uuid::Uuid;

use crate::adapter::{handle_one, OutgoingBody};
use crate::error::ServerError;

/// How one polling cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A connection was accepted and served.
    Handled,
    /// The timeout elapsed with no connection.
    TimedOut,
    /// The user pressed Ctrl-C.
    Interrupted,
}

/// Marker returned to hyper when the exchange must end without a response.
#[derive(Debug, thiserror::Error)]
#[error("exchange aborted")]
struct Aborted;

struct Exchange<'h, H> {
    handler: RefCell<&'h mut H>,
    failure: Cell<Option<ServerError>>,
}

impl<H: Handler> Exchange<'_, H> {
    async fn dispatch(&self, request: Request<Incoming>) -> Result<Response<OutgoingBody>, Aborted> {
        let (parts, body) = request.into_parts();
        let result = match body.collect().await {
            Ok(collected) => {
                let mut handler = self.handler.borrow_mut();
                handle_one(&mut **handler, Request::from_parts(parts, collected.to_bytes()))
            }
            Err(err) => Err(ServerError::Connection(err)),
        };
        result.map_err(|err| {
            self.failure.set(Some(err));
            Aborted
        })
    }
}

async fn serve_connection<H: Handler>(stream: TcpStream, handler: &mut H) -> Result<(), ServerError> {
    let exchange = Exchange {
        handler: RefCell::new(handler),
        failure: Cell::new(None),
    };
    let exchange = &exchange;
    let service = service_fn(move |request: Request<Incoming>| exchange.dispatch(request));
    let served = http1::Builder::new()
        .keep_alive(false)
        .serve_connection(TokioIo::new(stream), service)
        .await;
    if let Some(err) = exchange.failure.take() {
        return Err(err);
    }
    served.map_err(ServerError::Connection)
}

async fn next_exchange<H: Handler>(
    listener: &TcpListener,
    handler: &mut H,
    timeout: Option<Duration>,
) -> Result<Outcome, ServerError> {
    let accepted = match timeout {
        Some(limit) => match tokio::time::timeout(limit, listener.accept()).await {
            Ok(accepted) => accepted,
            Err(_) => return Ok(Outcome::TimedOut),
        },
        None => listener.accept().await,
    };
    let (stream, peer) = accepted.map_err(ServerError::Accept)?;

    let span = tracing::info_span!("request", request_id = %Uuid::new_v4(), %peer);
    serve_connection(stream, handler).instrument(span).await?;
    Ok(Outcome::Handled)
}

/// A bound listener plus the handler it serves.
pub struct Server<H> {
    handler: H,
    listener: TcpListener,
    local_addr: SocketAddr,
    timeout: Option<Duration>,
    runtime: Runtime,
}

impl<H: Handler> Server<H> {
    /// Bind `host:port`. Port 0 picks a free port; see `local_addr`.
    pub fn bind(handler: H, host: &str, port: u16) -> Result<Self, ServerError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ServerError::Runtime)?;
        let bind_err = |source| ServerError::Bind {
            addr: format!("{host}:{port}"),
            source,
        };
        let listener = runtime
            .block_on(TcpListener::bind((host, port)))
            .map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;
        tracing::debug!(%local_addr, "Listener bound");
        Ok(Self {
            handler,
            listener,
            local_addr,
            timeout: None,
            runtime,
        })
    }

    /// Bound how long a single polling cycle waits for a connection.
    pub fn with_timeout(self, timeout: Option<Duration>) -> Self {
        Self { timeout, ..self }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Wait for one connection and serve it.
    pub fn handle_request(&mut self) -> Result<Outcome, ServerError> {
        let Self {
            handler,
            listener,
            timeout,
            runtime,
            ..
        } = self;
        runtime.block_on(async {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal.map(|()| Outcome::Interrupted).map_err(ServerError::Signal)
                }
                outcome = next_exchange(listener, handler, *timeout) => outcome,
            }
        })
    }

    /// Serve until Ctrl-C. Failed exchanges are logged and serving continues.
    pub fn serve_forever(&mut self) -> Result<(), ServerError> {
        tracing::info!("Running on {}", self.url());
        let Self {
            handler,
            listener,
            timeout,
            runtime,
            ..
        } = self;
        runtime.block_on(async {
            let interrupted = tokio::signal::ctrl_c();
            tokio::pin!(interrupted);
            loop {
                tokio::select! {
                    signal = &mut interrupted => {
                        tracing::info!("Shutting down server");
                        return signal.map_err(ServerError::Signal);
                    }
                    outcome = next_exchange(listener, handler, *timeout) => match outcome {
                        Ok(Outcome::TimedOut) => tracing::trace!("No connection within timeout"),
                        Ok(_) => {}
                        Err(err) => tracing::error!(error = %err, "Request failed"),
                    },
                }
            }
        })
    }
}

impl<F, R> Server<CaptureHandler<F, R>>
where
    F: FnMut(&RequestEvent) -> R,
{
    /// Serve exactly one polling cycle and return the captured value.
    pub fn capture(mut self) -> Result<R, ServerError> {
        tracing::info!("Waiting for callback on {}", self.url());
        self.handler.listening();
        match self.handle_request()? {
            Outcome::Handled => {}
            Outcome::TimedOut => self.handler.timed_out(),
            Outcome::Interrupted => self.handler.aborted(),
        }
        Ok(self.handler.into_result()?)
    }
}

/// Bind and serve `handler` until Ctrl-C.
pub fn serve_forever<H: Handler>(
    handler: H,
    host: &str,
    port: u16,
    timeout: Option<Duration>,
) -> Result<(), ServerError> {
    Server::bind(handler, host, port)?
        .with_timeout(timeout)
        .serve_forever()
}

/// Bind, capture one request through `inner`, and return its result.
pub fn serve_single<F, R>(
    inner: F,
    host: &str,
    port: u16,
    timeout: Option<Duration>,
) -> Result<R, ServerError>
where
    F: FnMut(&RequestEvent) -> R,
{
    Server::bind(CaptureHandler::new(inner), host, port)?
        .with_timeout(timeout)
        .capture()
}

/// Read the full body of a response produced by this crate.
pub async fn read_body(response: Response<OutgoingBody>) -> Bytes {
    match response.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(never) => match never {},
    }
}
