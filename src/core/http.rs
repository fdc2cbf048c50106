//! Abstract HTTP request/response handles.
//!
//! The engine never touches a socket: the front-end hands it a fully parsed
//! [`HttpRequest`] and takes back an [`HttpResponse`] once the pipeline is
//! done. Both are plain owned structs so filters can read and mutate them
//! without caring which server implementation sits in front.

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};

/// An inbound request as seen by the filter pipeline.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpRequest {
    /// Build a bodiless request for the given method and URI.
    ///
    /// Panics on an unparseable URI; intended for hosts and tests that
    /// construct requests from trusted strings.
    pub fn new(method: Method, uri: &str) -> Self {
        Self {
            method,
            uri: uri.parse().expect("invalid request URI"),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// The request path, without the query string.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// First value of a query-string parameter, percent-decoded.
    pub fn param(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// First value of a request header, if it is valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// The response handle the pipeline writes into.
///
/// Starts out as an empty 200; filters populate the context's response fields
/// and the pipeline materializes them here at the end of the request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Append a header, dropping pairs that are not valid HTTP header syntax.
    pub fn append_header(&mut self, name: &str, value: &str) {
        let name = match http::header::HeaderName::from_bytes(name.as_bytes()) {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!(header = name, "dropping response header with invalid name");
                return;
            }
        };
        match http::header::HeaderValue::from_str(value) {
            Ok(v) => {
                self.headers.append(name, v);
            }
            Err(_) => {
                tracing::warn!(header = %name, "dropping response header with invalid value");
            }
        }
    }

    /// First value of a response header, if it is valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Response body interpreted as UTF-8 (lossy).
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_parsing() {
        let req = HttpRequest::new(Method::GET, "/error?v=2.0&output=json&callback=cb");
        assert_eq!(req.param("v").as_deref(), Some("2.0"));
        assert_eq!(req.param("output").as_deref(), Some("json"));
        assert_eq!(req.param("callback").as_deref(), Some("cb"));
        assert_eq!(req.param("missing"), None);
    }

    #[test]
    fn test_param_percent_decoding() {
        let req = HttpRequest::new(Method::GET, "/x?msg=hello%20world");
        assert_eq!(req.param("msg").as_deref(), Some("hello world"));
    }

    #[test]
    fn test_path_strips_query() {
        let req = HttpRequest::new(Method::GET, "/api/users?page=2");
        assert_eq!(req.path(), "/api/users");
    }

    #[test]
    fn test_append_header_rejects_garbage() {
        let mut resp = HttpResponse::new();
        resp.append_header("X-Ok", "1");
        resp.append_header("bad header name", "1");
        assert_eq!(resp.header("X-Ok"), Some("1"));
        assert_eq!(resp.headers.len(), 1);
    }
}
