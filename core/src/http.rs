//! Transport-neutral request and response events.
//!
//! # Design
//! The transport adapter turns every inbound exchange into a `RequestEvent`
//! and turns the handler's `ResponseEvent` back into bytes on the wire.
//! Handlers only ever see these types, so a strategy never knows which
//! transport is driving it.
//!
//! A `ResponseEvent` body is a single-pass sequence of chunks rather than a
//! buffer: the adapter consumes it exactly once, in order.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Header name to value mapping.
pub type Headers = BTreeMap<String, String>;

/// HTTP method of an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Trace,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a method string is not one of the supported verbs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP method: {0}")]
pub struct UnknownMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            "TRACE" => Ok(HttpMethod::Trace),
            other => Err(UnknownMethod(other.to_string())),
        }
    }
}

/// Query parameters as an ordered multi-map.
///
/// Keys keep the position of their first occurrence and repeated keys
/// accumulate values, so `a=1&b=3&a=2` yields `{a: [1, 2], b: [3]}`.
/// Serializes as a JSON object of string arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, Vec<String>)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an `application/x-www-form-urlencoded` query string.
    ///
    /// Pairs with a blank value are dropped.
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::new();
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            params.push(name.into_owned(), value.into_owned());
        }
        params
    }

    /// Encode back into a query string, repeating multi-valued keys.
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (name, values) in &self.0 {
            for value in values {
                serializer.append_pair(name, value);
            }
        }
        serializer.finish()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.0.iter_mut().find(|(key, _)| *key == name) {
            Some((_, values)) => values.push(value.into()),
            None => self.0.push((name, vec![value.into()])),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, values)| values.as_slice())
    }

    /// True when `name` carries at least one value.
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some_and(|values| !values.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for QueryParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, values) in &self.0 {
            map.serialize_entry(name, values)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for QueryParams {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ParamsVisitor;

        impl<'de> Visitor<'de> for ParamsVisitor {
            type Value = QueryParams;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of parameter names to value lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut params = QueryParams::new();
                while let Some((name, values)) = access.next_entry::<String, Vec<String>>()? {
                    for value in values {
                        params.push(name.clone(), value);
                    }
                }
                Ok(params)
            }
        }

        deserializer.deserialize_map(ParamsVisitor)
    }
}

/// An inbound HTTP request described as plain data.
///
/// Built once per exchange by the transport adapter and lent to the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEvent {
    pub url: String,
    pub method: HttpMethod,
    pub headers: Headers,
    pub params: QueryParams,
    pub content: Bytes,
}

impl RequestEvent {
    /// Key used for exact method+path lookups, e.g. `GET:/_ping`.
    pub fn route_key(&self) -> String {
        format!("{}:{}", self.method, self.url)
    }
}

/// Response body as a finite, single-pass sequence of byte chunks.
pub struct ResponseBody(Box<dyn Iterator<Item = Bytes> + Send>);

impl ResponseBody {
    pub fn empty() -> Self {
        Self(Box::new(std::iter::empty()))
    }

    pub fn once(chunk: impl Into<Bytes>) -> Self {
        Self(Box::new(std::iter::once(chunk.into())))
    }

    pub fn from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Bytes>,
        I::IntoIter: Send + 'static,
    {
        Self(Box::new(chunks.into_iter()))
    }

    /// Drain every chunk into one buffer.
    pub fn concat(self) -> Vec<u8> {
        self.fold(Vec::new(), |mut buf, chunk| {
            buf.extend_from_slice(&chunk);
            buf
        })
    }
}

impl Iterator for ResponseBody {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        self.0.next()
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResponseBody(..)")
    }
}

/// A handler's answer, consumed exactly once by the transport adapter.
#[derive(Debug)]
pub struct ResponseEvent {
    pub status_code: u16,
    pub headers: Headers,
    pub body: ResponseBody,
}

impl ResponseEvent {
    pub fn new(status_code: u16, headers: Headers, body: ResponseBody) -> Self {
        Self {
            status_code,
            headers,
            body,
        }
    }

    /// A 200 response with a JSON body.
    pub fn json(body: Vec<u8>) -> Self {
        let mut headers = Headers::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self::new(200, headers, ResponseBody::once(body))
    }
}
