//! HTTP/1.1 request parsing using the [`httparse`] crate.

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Method, parse_query};
use crate::context::Parameters;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid Content-Length header: {value}")]
    InvalidContentLength { value: String },

    #[error("declared body of {length} bytes does not fit in memory")]
    BodyTooLarge { length: usize },
}

/// A parsed HTTP/1.1 request.
///
/// # Examples
///
/// ```
/// use fasttrack::http::Request;
///
/// let raw = b"GET /articles/rust?page=2&tag[]=web HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.path(), "/articles/rust");
/// assert_eq!(request.target(), "/articles/rust?page=2&tag[]=web");
/// assert_eq!(request.query_params().get("page"), Some("2"));
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    target: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    body: Bytes,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Parse a request from the start of `buf`.
    ///
    /// Returns the request and the byte offset at which its body begins. The
    /// body holds at most `Content-Length` bytes of what `buf` already
    /// contains, so callers wait for `offset + content_length()` bytes before
    /// parsing.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`] if the headers have not fully arrived.
    /// - [`RequestError::Parse`] if the data is malformed.
    /// - [`RequestError::MissingField`] if method, target or version is absent.
    /// - [`RequestError::InvalidContentLength`] if `Content-Length` is not a number.
    /// - [`RequestError::BodyTooLarge`] if the declared body would overflow the
    ///   end offset.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let Ok(method) = raw_req
            .method
            .ok_or(RequestError::MissingField { field: "method" })?
            .parse::<Method>();
        let target = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?
            .to_owned();
        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        let content_length = match header_map.get("content-length") {
            Some(value) => value
                .trim()
                .parse::<usize>()
                .map_err(|_| RequestError::InvalidContentLength { value: value.to_owned() })?,
            None => 0,
        };
        let body_end = body_offset
            .checked_add(content_length)
            .ok_or(RequestError::BodyTooLarge { length: content_length })?
            .min(buf.len());
        let body = Bytes::copy_from_slice(&buf[body_offset..body_end]);

        Ok((
            Self {
                method,
                target,
                version,
                headers: header_map,
                body,
            },
            body_offset,
        ))
    }

    /// Returns the request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request target as sent: path plus query string.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The path without the query string.
    pub fn path(&self) -> &str {
        self.target.split_once('?').map_or(&self.target, |(path, _)| path)
    }

    /// The raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, query)| query)
    }

    /// Decoded query string parameters.
    pub fn query_params(&self) -> Parameters {
        self.query_string().map(parse_query).unwrap_or_default()
    }

    /// Decoded form fields, when the body is `application/x-www-form-urlencoded`.
    pub fn form_params(&self) -> Option<Parameters> {
        let content_type = self.headers.get("content-type")?;
        let mime = content_type.split(';').next().unwrap_or_default().trim();
        if !mime.eq_ignore_ascii_case(FORM_CONTENT_TYPE) {
            return None;
        }
        Some(parse_query(&self.body))
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the body, at most `Content-Length` bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns `true` if the connection should be kept alive after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive. HTTP/1.0 defaults to close unless
    /// `Connection: keep-alive` is explicitly set.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }

    /// Returns the value of the `Content-Length` header parsed as a `usize`, if present.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.trim().parse().ok()
    }
}
