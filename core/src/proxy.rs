//! Transparent forwarding with a newline-delimited JSON transcript.
//!
//! # Design
//! Each call is one blocking round trip through a `ureq` agent, followed by
//! one transcript append. The transcript file is opened, written and closed
//! per call, so several recorders (or an external `tail -f`) can share it.
//!
//! Certificate verification is disabled on the outbound agent. This is a
//! development tool pointed at origins the developer already trusts; do not
//! aim it at anything else.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use ureq::tls::TlsConfig;
use ureq::Agent;

use crate::error::ProxyError;
use crate::handler::Handler;
use crate::http::{Headers, RequestEvent, ResponseBody, ResponseEvent};
use crate::hygiene::clean_headers;
use crate::types::{RequestRecord, ResponseRecord, TranscriptEntry};

pub const DEFAULT_OUTPUT: &str = "/dev/stdout";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Proxy-recording handler.
pub struct ProxyRecorder {
    base_url: String,
    output: PathBuf,
    timeout: Duration,
    json_indent: Option<usize>,
    agent: Agent,
}

impl std::fmt::Debug for ProxyRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyRecorder")
            .field("base_url", &self.base_url)
            .field("output", &self.output)
            .field("timeout", &self.timeout)
            .field("json_indent", &self.json_indent)
            .finish_non_exhaustive()
    }
}

impl ProxyRecorder {
    pub fn new(base_url: &str) -> Self {
        Self::build(base_url, PathBuf::from(DEFAULT_OUTPUT), DEFAULT_TIMEOUT, None)
    }

    pub fn with_output(self, output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            ..self
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self::build(&self.base_url, self.output, timeout, self.json_indent)
    }

    /// Pretty-print transcript entries with `indent` spaces per level.
    pub fn with_json_indent(self, indent: Option<usize>) -> Self {
        Self {
            json_indent: indent,
            ..self
        }
    }

    fn build(base_url: &str, output: PathBuf, timeout: Duration, json_indent: Option<usize>) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .tls_config(TlsConfig::builder().disable_verification(true).build())
            .build()
            .new_agent();
        Self {
            base_url: base_url.to_string(),
            output,
            timeout,
            json_indent,
            agent,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Upstream URL for `request`: base URL, path, then the re-encoded query.
    pub fn upstream_url(&self, request: &RequestEvent) -> String {
        let base = self.base_url.trim_end_matches('/');
        let query = request.params.to_query_string();
        if query.is_empty() {
            format!("{base}{}", request.url)
        } else {
            format!("{base}{}?{query}", request.url)
        }
    }

    fn forward(&self, request: &RequestEvent) -> Result<ResponseRecord, ProxyError> {
        let url = self.upstream_url(request);
        let mut builder = ureq::http::Request::builder()
            .method(request.method.as_str())
            .uri(url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let outbound = builder.body(request.content.to_vec())?;

        tracing::debug!(method = %request.method, url = %url, "Forwarding request");
        let mut response = self.agent.run(outbound)?;

        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }
        let body = response.body_mut().read_to_vec()?;

        Ok(ResponseRecord {
            status_code: response.status().as_u16(),
            headers: clean_headers(&headers),
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }

    fn encode(&self, entry: &TranscriptEntry) -> Result<Vec<u8>, serde_json::Error> {
        let mut buf = Vec::new();
        match self.json_indent {
            Some(width) => {
                let indent = " ".repeat(width);
                let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
                let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
                entry.serialize(&mut serializer)?;
            }
            None => serde_json::to_writer(&mut buf, entry)?,
        }
        buf.push(b'\n');
        Ok(buf)
    }

    /// Append one transcript line to the output file.
    pub fn record(&self, request: RequestRecord, response: ResponseRecord) -> Result<(), ProxyError> {
        let entry = TranscriptEntry {
            base_url: self.base_url.clone(),
            request,
            response,
        };
        let line = self.encode(&entry)?;
        let transcript_err = |source| ProxyError::Transcript {
            path: self.output.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.output)
            .map_err(transcript_err)?;
        file.write_all(&line).map_err(transcript_err)?;
        file.flush().map_err(transcript_err)
    }
}

impl Handler for ProxyRecorder {
    type Error = ProxyError;

    fn handle(&mut self, request: &RequestEvent) -> Result<ResponseEvent, ProxyError> {
        let request_record = RequestRecord::from(request);
        let response_record = self.forward(request)?;
        let status_code = response_record.status_code;
        let body = response_record.body.clone().into_bytes();
        // The body was re-encoded, so the upstream length no longer applies.
        let mut headers = response_record.headers.clone();
        headers.retain(|name, _| !name.eq_ignore_ascii_case("content-length"));

        self.record(request_record, response_record)?;
        tracing::debug!(status = status_code, output = %self.output.display(), "Recorded exchange");

        Ok(ResponseEvent::new(status_code, headers, ResponseBody::once(body)))
    }
}
