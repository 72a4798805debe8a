//! Conversion between hyper exchanges and handler events.
//!
//! # Design
//! These functions are synchronous and take an already-buffered body, so a
//! whole exchange can be driven in tests without a socket. The server module
//! only adds the accept loop and body collection on top.

use std::convert::Infallible;

use bytes::Bytes;
use devserve_core::{
    clean_headers, Handler, Headers, HttpMethod, QueryParams, RequestEvent, ResponseBody,
    ResponseEvent,
};
use http::header::{CONTENT_LENGTH, HOST};
use http::request::Parts;
use http::{HeaderMap, HeaderName, HeaderValue, Request, Response, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use hyper::ext::ReasonPhrase;

use crate::error::ServerError;

/// Body type written back to the client.
pub type OutgoingBody = UnsyncBoxBody<Bytes, Infallible>;

/// Declared body length, or 0 when absent or malformed.
fn content_length(headers: &HeaderMap) -> usize {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}

/// Build the handler-facing event for one inbound request.
///
/// Header names come out upper-cased (`X-CLIENT`). `Host` is dropped and `Content-Length`
/// is consumed: exactly that many bytes of `body` become the content.
pub fn build_request_event(parts: &Parts, body: Bytes) -> Result<RequestEvent, ServerError> {
    let method: HttpMethod = parts.method.as_str().parse()?;

    let mut headers = Headers::new();
    for (name, value) in &parts.headers {
        if name == HOST || name == CONTENT_LENGTH {
            continue;
        }
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        headers
            .entry(name.as_str().to_ascii_uppercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    let length = content_length(&parts.headers).min(body.len());
    Ok(RequestEvent {
        url: parts.uri.path().to_string(),
        method,
        headers,
        params: QueryParams::from_query(parts.uri.query().unwrap_or("")),
        content: body.slice(..length),
    })
}

/// Standard reason phrase for `status_code`.
///
/// Phrases come from the `http` crate's table of registered status codes.
/// A code missing from that table is `UnknownStatus`, even if it is a valid
/// three-digit code.
pub fn reason_phrase(status_code: u16) -> Result<(StatusCode, &'static str), ServerError> {
    let status =
        StatusCode::from_u16(status_code).map_err(|_| ServerError::UnknownStatus(status_code))?;
    let phrase = status
        .canonical_reason()
        .ok_or(ServerError::UnknownStatus(status_code))?;
    Ok((status, phrase))
}

fn stream_body(body: ResponseBody) -> OutgoingBody {
    let frames = futures_util::stream::iter(body.map(|chunk| Ok(Frame::data(chunk))));
    StreamBody::new(frames).boxed_unsync()
}

/// Turn a handler's response into the response written to the client.
///
/// Hop-by-hop headers are removed here, right before the response leaves
/// the process. The body chunks are streamed in order.
pub fn build_response(event: ResponseEvent) -> Result<Response<OutgoingBody>, ServerError> {
    let (status, phrase) = reason_phrase(event.status_code)?;

    let mut headers = HeaderMap::new();
    for (name, value) in clean_headers(&event.headers) {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ServerError::InvalidHeader(name.clone()))?;
        let header_value =
            HeaderValue::from_str(&value).map_err(|_| ServerError::InvalidHeader(name))?;
        headers.append(header_name, header_value);
    }

    let mut response = Response::new(stream_body(event.body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
        .extensions_mut()
        .insert(ReasonPhrase::from_static(phrase.as_bytes()));
    Ok(response)
}

/// Run one buffered request through `handler`.
///
/// A handler error is returned as `ServerError::Handler`; no response is
/// produced for it.
pub fn handle_one<H: Handler>(
    handler: &mut H,
    request: Request<Bytes>,
) -> Result<Response<OutgoingBody>, ServerError> {
    let (parts, body) = request.into_parts();
    let event = build_request_event(&parts, body)?;
    let response = handler
        .handle(&event)
        .map_err(|err| ServerError::Handler(Box::new(err)))?;
    tracing::info!(
        method = %event.method,
        path = %event.url,
        status = response.status_code,
        "Request handled"
    );
    build_response(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    #[test]
    fn event_takes_path_and_query() {
        let parts = parts(
            Request::builder()
                .method("GET")
                .uri("/search/items?a=1&a=2&b=3")
                .body(())
                .unwrap(),
        );
        let event = build_request_event(&parts, Bytes::new()).unwrap();
        assert_eq!(event.url, "/search/items");
        assert_eq!(event.method, HttpMethod::Get);
        assert_eq!(event.params.get("a").unwrap(), ["1", "2"]);
        assert_eq!(event.params.get("b").unwrap(), ["3"]);
    }

    #[test]
    fn event_drops_host_and_content_length() {
        let parts = parts(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header("Host", "localhost:3000")
                .header("Content-Length", "5")
                .header("Content-Type", "text/plain")
                .header("X-Trace", "abc")
                .body(())
                .unwrap(),
        );
        let event = build_request_event(&parts, Bytes::from_static(b"hello")).unwrap();
        assert!(!event.headers.contains_key("HOST"));
        assert!(!event.headers.contains_key("CONTENT-LENGTH"));
        assert_eq!(event.headers["CONTENT-TYPE"], "text/plain");
        assert_eq!(event.headers["X-TRACE"], "abc");
        assert_eq!(event.headers.len(), 2);
        assert_eq!(event.content, Bytes::from_static(b"hello"));
    }

    #[test]
    fn event_preserves_hop_by_hop_request_headers() {
        let parts = parts(
            Request::builder()
                .uri("/")
                .header("Connection", "keep-alive")
                .body(())
                .unwrap(),
        );
        let event = build_request_event(&parts, Bytes::new()).unwrap();
        assert_eq!(event.headers["CONNECTION"], "keep-alive");
    }

    #[test]
    fn event_joins_repeated_headers() {
        let parts = parts(
            Request::builder()
                .uri("/")
                .header("Accept", "text/html")
                .header("Accept", "application/json")
                .body(())
                .unwrap(),
        );
        let event = build_request_event(&parts, Bytes::new()).unwrap();
        assert_eq!(event.headers["ACCEPT"], "text/html, application/json");
    }

    #[test]
    fn missing_content_length_reads_nothing() {
        let parts = parts(Request::builder().method("POST").uri("/").body(()).unwrap());
        let event = build_request_event(&parts, Bytes::from_static(b"ignored")).unwrap();
        assert!(event.content.is_empty());
    }

    #[test]
    fn malformed_content_length_reads_nothing() {
        let parts = parts(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("Content-Length", "many")
                .body(())
                .unwrap(),
        );
        let event = build_request_event(&parts, Bytes::from_static(b"ignored")).unwrap();
        assert!(event.content.is_empty());
    }

    #[test]
    fn content_length_limits_body() {
        let parts = parts(
            Request::builder()
                .method("PUT")
                .uri("/")
                .header("Content-Length", "3")
                .body(())
                .unwrap(),
        );
        let event = build_request_event(&parts, Bytes::from_static(b"abcdef")).unwrap();
        assert_eq!(event.content, Bytes::from_static(b"abc"));
    }

    #[test]
    fn unsupported_method_is_rejected() {
        let parts = parts(Request::builder().method("CONNECT").uri("/").body(()).unwrap());
        let err = build_request_event(&parts, Bytes::new()).unwrap_err();
        assert!(matches!(err, ServerError::UnsupportedMethod(_)));
    }

    #[test]
    fn reason_phrases_are_standard() {
        let cases = [
            (200, "OK"),
            (201, "Created"),
            (202, "Accepted"),
            (204, "No Content"),
            (301, "Moved Permanently"),
            (302, "Found"),
            (304, "Not Modified"),
            (307, "Temporary Redirect"),
            (400, "Bad Request"),
            (401, "Unauthorized"),
            (403, "Forbidden"),
            (404, "Not Found"),
            (405, "Method Not Allowed"),
            (409, "Conflict"),
            (418, "I'm a teapot"),
            (422, "Unprocessable Entity"),
            (429, "Too Many Requests"),
            (500, "Internal Server Error"),
            (502, "Bad Gateway"),
            (503, "Service Unavailable"),
            (504, "Gateway Timeout"),
        ];
        for (code, phrase) in cases {
            let (status, resolved) = reason_phrase(code).unwrap();
            assert_eq!(status.as_u16(), code);
            assert_eq!(resolved, phrase);
        }
    }

    #[test]
    fn unknown_status_is_an_error() {
        assert!(matches!(reason_phrase(299), Err(ServerError::UnknownStatus(299))));
        assert!(matches!(reason_phrase(1000), Err(ServerError::UnknownStatus(1000))));
    }

    #[test]
    fn response_strips_hop_by_hop_headers() {
        let mut headers = Headers::new();
        headers.insert("Transfer-Encoding".to_string(), "chunked".to_string());
        headers.insert("Connection".to_string(), "close".to_string());
        headers.insert("X-Kept".to_string(), "yes".to_string());
        let response = build_response(ResponseEvent::new(200, headers, ResponseBody::empty())).unwrap();
        assert!(response.headers().get("transfer-encoding").is_none());
        assert!(response.headers().get("connection").is_none());
        assert_eq!(response.headers()["x-kept"], "yes");
    }

    #[test]
    fn response_carries_reason_phrase() {
        let response =
            build_response(ResponseEvent::new(404, Headers::new(), ResponseBody::empty())).unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let phrase = response.extensions().get::<ReasonPhrase>().unwrap();
        assert_eq!(phrase.as_bytes(), b"Not Found");
    }

    #[test]
    fn invalid_header_name_is_an_error() {
        let mut headers = Headers::new();
        headers.insert("bad header".to_string(), "x".to_string());
        let err = build_response(ResponseEvent::new(200, headers, ResponseBody::empty())).unwrap_err();
        assert!(matches!(err, ServerError::InvalidHeader(name) if name == "bad header"));
    }
}
