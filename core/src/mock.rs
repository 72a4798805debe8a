//! Canned responses plus passive recording of everything else.
//!
//! # Design
//! Every `MockHandler` owns its own response table: the built-in entries are
//! created per instance, so two handlers never share a map. Requests that
//! match no entry are copied into an in-memory log that `GET /_requests`
//! exposes as JSON.

use std::path::Path;

use crate::error::ConfigError;
use crate::handler::Handler;
use crate::http::{HttpMethod, RequestEvent, ResponseBody, ResponseEvent};
use crate::types::{PredeterminedResponse, RequestRecord, ResponseMapping};

/// Route that returns the recorded request log.
pub const REQUESTS_KEY: &str = "GET:/_requests";

/// Route answered with `pong` by every mock handler.
pub const PING_KEY: &str = "GET:/_ping";

fn builtin_responses() -> ResponseMapping {
    let mut mapping = ResponseMapping::new();
    mapping.insert(PING_KEY.to_string(), PredeterminedResponse::new(200, "pong"));
    mapping
}

/// Read a response mapping from a JSON file.
pub fn load_responses(path: &Path) -> Result<ResponseMapping, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}

fn validate_key(key: &str) -> Result<(), ConfigError> {
    let (method, path) = key
        .split_once(':')
        .ok_or_else(|| ConfigError::InvalidKey(key.to_string()))?;
    method
        .parse::<HttpMethod>()
        .map_err(|source| ConfigError::InvalidMethod {
            key: key.to_string(),
            source,
        })?;
    if !path.starts_with('/') {
        return Err(ConfigError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Mock-mode handler.
#[derive(Debug, Clone)]
pub struct MockHandler {
    responses: ResponseMapping,
    requests: Vec<RequestRecord>,
}

impl MockHandler {
    /// Build a handler from user-supplied responses.
    ///
    /// Built-in routes take precedence over user entries with the same key.
    pub fn new(responses: ResponseMapping) -> Result<Self, ConfigError> {
        for key in responses.keys() {
            validate_key(key)?;
        }
        let mut merged = responses;
        merged.extend(builtin_responses());
        tracing::debug!(routes = merged.len(), "Mock responses loaded");
        Ok(Self {
            responses: merged,
            requests: Vec::new(),
        })
    }

    /// Recorded requests, oldest first.
    pub fn requests(&self) -> &[RequestRecord] {
        &self.requests
    }

    pub fn responses(&self) -> &ResponseMapping {
        &self.responses
    }

    fn request_log(&mut self, request: &RequestEvent) -> Result<ResponseEvent, serde_json::Error> {
        let mut snapshot = if request.params.is_set("clear") {
            std::mem::take(&mut self.requests)
        } else {
            self.requests.clone()
        };
        if request.params.is_set("last") && snapshot.len() > 1 {
            snapshot.drain(..snapshot.len() - 1);
        }
        Ok(ResponseEvent::json(serde_json::to_vec(&snapshot)?))
    }
}

impl Default for MockHandler {
    fn default() -> Self {
        Self {
            responses: builtin_responses(),
            requests: Vec::new(),
        }
    }
}

impl Handler for MockHandler {
    type Error = serde_json::Error;

    fn handle(&mut self, request: &RequestEvent) -> Result<ResponseEvent, Self::Error> {
        let key = request.route_key();
        if key == REQUESTS_KEY {
            return self.request_log(request);
        }
        if let Some(canned) = self.responses.get(&key) {
            return Ok(ResponseEvent::new(
                canned.status_code,
                canned.headers.clone(),
                ResponseBody::once(canned.body.clone()),
            ));
        }

        let record = RequestRecord::from(request);
        let body = serde_json::to_vec(&record)?;
        tracing::debug!(key = %key, logged = self.requests.len() + 1, "Recorded request");
        self.requests.push(record);
        Ok(ResponseEvent::json(body))
    }
}
