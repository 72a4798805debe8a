//! The contract between the transport adapter and the handler strategies.

use crate::http::{RequestEvent, ResponseEvent};

/// Turns one structured request into one structured response.
///
/// Called from the single serving thread, one exchange at a time. An error
/// is handed back to the adapter as-is; the adapter never answers on the
/// handler's behalf.
pub trait Handler {
    type Error: std::error::Error + Send + Sync + 'static;

    fn handle(&mut self, request: &RequestEvent) -> Result<ResponseEvent, Self::Error>;
}

impl<F, E> Handler for F
where
    F: FnMut(&RequestEvent) -> Result<ResponseEvent, E>,
    E: std::error::Error + Send + Sync + 'static,
{
    type Error = E;

    fn handle(&mut self, request: &RequestEvent) -> Result<ResponseEvent, E> {
        self(request)
    }
}
