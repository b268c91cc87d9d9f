//! HTTP/1.1 types and URL decoding.
//!
//! This module provides the primitives the host layer needs:
//! [`Method`], [`StatusCode`], [`Headers`], [`Request`] and [`Response`],
//! plus the decoders that turn query strings and urlencoded bodies into
//! [`Parameters`].

use std::fmt;

use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::context::Parameters;

pub mod headers;
pub mod request;
pub mod response;

pub use headers::Headers;
pub use request::{Request, RequestError};
pub use response::Response;

/// The response statuses the framework produces.
///
/// # Examples
///
/// ```
/// use fasttrack::http::StatusCode;
///
/// let status = StatusCode::NotFound;
/// assert_eq!(status.as_u16(), 404);
/// assert_eq!(status.canonical_reason(), "Not Found");
/// assert_eq!(status.to_string(), "404 Not Found");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatusCode {
    Ok = 200,
    BadRequest = 400,
    NotFound = 404,
    PayloadTooLarge = 413,
    InternalServerError = 500,
}

impl StatusCode {
    /// Returns the numeric status code as a `u16`.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the canonical reason phrase for this status code.
    pub fn canonical_reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::BadRequest => "Bad Request",
            Self::NotFound => "Not Found",
            Self::PayloadTooLarge => "Payload Too Large",
            Self::InternalServerError => "Internal Server Error",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

/// An HTTP request method.
///
/// Route method filters compare against [`Method::as_str`], so extension
/// methods work the same way as standard ones.
///
/// # Examples
///
/// ```
/// use fasttrack::http::Method;
///
/// let method: Method = "POST".parse().unwrap();
/// assert_eq!(method, Method::Post);
/// assert_eq!("PURGE".parse::<Method>().unwrap().as_str(), "PURGE");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    /// A non-standard extension method.
    Custom(String),
}

impl Method {
    /// Returns the method name as sent on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch => "PATCH",
            Self::Custom(s) => s.as_str(),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            "PATCH" => Self::Patch,
            other => Self::Custom(other.to_owned()),
        })
    }
}

/// Decode `%XX` escapes. Invalid escapes are kept literally and invalid
/// UTF-8 is replaced. `+` is left alone; see [`parse_query`] for form
/// decoding.
///
/// # Examples
///
/// ```
/// use fasttrack::http::percent_decode;
///
/// assert_eq!(percent_decode("caf%C3%A9%20au%20lait"), "café au lait");
/// assert_eq!(percent_decode("a+b%2"), "a+b%2");
/// ```
pub fn percent_decode(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}

/// Decode an `application/x-www-form-urlencoded` string (a query string or a
/// form body).
///
/// Bracketed keys build nested values: `a[b]=1` yields an object and `a[]=1`
/// appends to an array. A later plain key overwrites an earlier one.
///
/// # Examples
///
/// ```
/// use fasttrack::http::parse_query;
/// use serde_json::json;
///
/// let params = parse_query("q=rust+lang&tags[]=a&tags[]=b&filter[year]=2024");
/// assert_eq!(params.get("q"), Some("rust lang"));
/// assert_eq!(params.value("tags"), Some(&json!(["a", "b"])));
/// assert_eq!(params.value("filter"), Some(&json!({ "year": "2024" })));
/// ```
pub fn parse_query(input: impl AsRef<[u8]>) -> Parameters {
    let mut params = Parameters::new();
    for (key, value) in form_urlencoded::parse(input.as_ref()) {
        if key.is_empty() {
            continue;
        }

        if let Some((root, segments)) = split_key(&key) {
            let slot = params.as_map_mut().entry(root.to_owned()).or_insert(Value::Null);
            assign(slot, &segments, value.into_owned());
            continue;
        }
        params.insert(key.into_owned(), value.into_owned());
    }
    params
}

// `a[b][]` -> ("a", [Some("b"), None]). `None` when the key has no brackets
// or they are unbalanced.
fn split_key(key: &str) -> Option<(&str, Vec<Option<&str>>)> {
    let open = key.find('[')?;
    let (root, mut rest) = key.split_at(open);
    if root.is_empty() {
        return None;
    }

    let mut segments = Vec::new();
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        let segment = &inner[..close];
        segments.push((!segment.is_empty()).then_some(segment));
        rest = &inner[close + 1..];
    }
    Some((root, segments))
}

fn assign(slot: &mut Value, segments: &[Option<&str>], value: String) {
    let Some((segment, rest)) = segments.split_first() else {
        *slot = Value::String(value);
        return;
    };

    match segment {
        None => {
            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }
            if let Value::Array(items) = slot {
                items.push(Value::Null);
                if let Some(last) = items.last_mut() {
                    assign(last, rest, value);
                }
            }
        }
        Some(key) => {
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(fields) = slot {
                let child = fields.entry((*key).to_owned()).or_insert(Value::Null);
                assign(child, rest, value);
            }
        }
    }
}
