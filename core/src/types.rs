//! Serializable records derived from the event types.
//!
//! # Design
//! Events carry raw bytes and live for one exchange. Records are the copies
//! handlers keep around (the mock request log, the proxy transcript), so body
//! and content are stored as text, decoded lossily.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::http::{Headers, HttpMethod, QueryParams, RequestEvent};

/// Persisted form of a `RequestEvent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub url: String,
    pub method: HttpMethod,
    pub headers: Headers,
    pub params: QueryParams,
    pub content: String,
}

impl From<&RequestEvent> for RequestRecord {
    fn from(event: &RequestEvent) -> Self {
        Self {
            url: event.url.clone(),
            method: event.method,
            headers: event.headers.clone(),
            params: event.params.clone(),
            content: String::from_utf8_lossy(&event.content).into_owned(),
        }
    }
}

/// Persisted form of an upstream response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub status_code: u16,
    pub headers: Headers,
    pub body: String,
}

/// One line of the proxy transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub base_url: String,
    pub request: RequestRecord,
    pub response: ResponseRecord,
}

/// A canned response returned verbatim for a `METHOD:/path` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredeterminedResponse {
    pub status_code: u16,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: String,
}

impl PredeterminedResponse {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            headers: Headers::new(),
            body: body.into(),
        }
    }
}

/// Predetermined responses keyed by `"METHOD:/path"`.
pub type ResponseMapping = BTreeMap<String, PredeterminedResponse>;
