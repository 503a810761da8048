use http::Method;
use may_minihttp::Request;
use smallvec::SmallVec;
use std::io::Read;
use std::str::FromStr;
use tracing::debug;

use crate::error::ServeError;
use crate::ids::{RequestId, REQUEST_ID_HEADER};

/// Inline capacity for request headers.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage; names are lowercased.
pub type HeaderVec = SmallVec<[(String, String); MAX_INLINE_HEADERS]>;

/// Request as seen by middleware.
///
/// `path` is relative to the mount point of the middleware being invoked;
/// `original_path` is the full decoded path. Both exclude the query string.
#[derive(Debug, Clone)]
pub struct DevRequest {
    pub method: Method,
    pub path: String,
    pub original_path: String,
    /// Raw request target including the query string
    pub url: String,
    /// Decoded query pairs in request order
    pub query: Vec<(String, String)>,
    pub headers: HeaderVec,
    pub body: Vec<u8>,
    pub request_id: RequestId,
}

impl DevRequest {
    /// Build a request from a request target such as `/a/b.html?x=1`.
    pub fn new(method: Method, url: &str) -> Self {
        let (raw_path, query_str) = url.split_once('?').unwrap_or((url, ""));
        let path = decode_path(raw_path);
        Self {
            method,
            original_path: path.clone(),
            path,
            url: url.to_string(),
            query: parse_query(query_str),
            headers: HeaderVec::new(),
            body: Vec::new(),
            request_id: RequestId::new(),
        }
    }

    /// Add a header (name is lowercased).
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Last value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .rfind(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }
}

/// Percent-decode a path, keeping the raw text if it is not valid UTF-8.
pub fn decode_path(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    }
}

/// Parse a query string into ordered, decoded pairs.
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Parse a request method token.
///
/// Extension methods such as `PROPFIND` are kept as they are, so the
/// `nonReadRequests` middleware still sees them as non-read requests.
pub fn parse_method(raw: &str) -> Result<Method, ServeError> {
    Method::from_str(raw).map_err(|_| ServeError::InvalidMethod {
        method: raw.to_string(),
    })
}

/// Extract a [`DevRequest`] from a `may_minihttp::Request`.
///
/// Fails only for a method token that is not valid HTTP.
pub fn parse_request(req: Request) -> Result<DevRequest, ServeError> {
    let method = parse_method(req.method())?;
    let url = req.path().to_string();

    let headers: HeaderVec = req
        .headers()
        .iter()
        .map(|h| {
            (
                h.name.to_ascii_lowercase(),
                String::from_utf8_lossy(h.value).to_string(),
            )
        })
        .collect();

    let mut body = Vec::new();
    if let Err(err) = req.body().read_to_end(&mut body) {
        debug!(error = %err, "Failed to read request body");
        body.clear();
    }

    let request_id = RequestId::from_header_or_new(
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(REQUEST_ID_HEADER))
            .map(|(_, v)| v.as_str()),
    );

    let mut parsed = DevRequest::new(method, &url);
    parsed.headers = headers;
    parsed.body = body;
    parsed.request_id = request_id;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_splits_and_decodes() {
        let req = DevRequest::new(Method::GET, "/a%20b/index.html?x=1&csp=p1%3Aro&x=2");
        assert_eq!(req.path, "/a b/index.html");
        assert_eq!(req.original_path, req.path);
        assert_eq!(req.query_param("x"), Some("2"));
        assert_eq!(req.query_param("csp"), Some("p1:ro"));
        assert_eq!(req.query.len(), 3);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = DevRequest::new(Method::GET, "/").with_header("If-None-Match", "\"x\"");
        assert_eq!(req.header("if-none-match"), Some("\"x\""));
        assert_eq!(req.header("IF-NONE-MATCH"), Some("\"x\""));
        assert_eq!(req.header("etag"), None);
    }

    #[test]
    fn test_parse_method_keeps_extension_methods() {
        assert_eq!(parse_method("GET").unwrap(), Method::GET);
        let propfind = parse_method("PROPFIND").unwrap();
        assert_eq!(propfind.as_str(), "PROPFIND");
        assert_ne!(propfind, Method::GET);
    }

    #[test]
    fn test_parse_method_rejects_invalid_tokens() {
        for raw in ["", "GE T", "GET\u{7f}"] {
            let err = parse_method(raw).unwrap_err();
            assert!(matches!(&err, ServeError::InvalidMethod { method } if method == raw));
        }
        assert_eq!(
            parse_method("GE T").unwrap_err().to_string(),
            "Invalid HTTP method \"GE T\""
        );
    }
}
