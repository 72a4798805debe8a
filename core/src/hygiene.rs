//! Hop-by-hop header filtering.
//!
//! Headers that only describe the connection they arrived on must not be
//! relayed. The list follows RFC 2616 section 13.5.1, plus `Content-Encoding`:
//! bodies are re-emitted decoded, so the upstream encoding no longer applies.

use crate::http::Headers;

const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
    "content-encoding",
];

/// True when `name` (any case) is a hop-by-hop header.
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP
        .iter()
        .any(|hop| hop.eq_ignore_ascii_case(name))
}

/// Copy `headers` without any hop-by-hop entry.
pub fn clean_headers(headers: &Headers) -> Headers {
    headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn strips_every_hop_by_hop_name_in_any_case() {
        let input = headers(&[
            ("Connection", "close"),
            ("KEEP-ALIVE", "timeout=5"),
            ("proxy-authenticate", "Basic"),
            ("Proxy-Authorization", "Basic abc"),
            ("te", "trailers"),
            ("Trailers", "Expires"),
            ("Transfer-Encoding", "chunked"),
            ("uPgRaDe", "websocket"),
            ("Content-Encoding", "gzip"),
        ]);
        assert!(clean_headers(&input).is_empty());
    }

    #[test]
    fn keeps_end_to_end_headers_unchanged() {
        let input = headers(&[
            ("Content-Type", "text/plain"),
            ("X-Request-Id", "abc"),
            ("Transfer-Encoding", "chunked"),
        ]);
        let cleaned = clean_headers(&input);
        assert_eq!(
            cleaned,
            headers(&[("Content-Type", "text/plain"), ("X-Request-Id", "abc")])
        );
    }

    #[test]
    fn does_not_match_on_prefix() {
        assert!(!is_hop_by_hop("Connection-Id"));
        assert!(!is_hop_by_hop("tea"));
        assert!(is_hop_by_hop("TE"));
    }

    #[test]
    fn cleaning_twice_is_a_no_op() {
        let input = headers(&[("Upgrade", "h2c"), ("Accept", "*/*")]);
        let once = clean_headers(&input);
        assert_eq!(clean_headers(&once), once);
    }
}
