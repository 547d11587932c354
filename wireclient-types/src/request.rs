//! The `Request` type and the header-injection rules applied when it's
//! constructed.

use crate::bytestream::{Body, BytesBody};
use crate::extensions::RequestExtensions;
use crate::headers::Headers;
use crate::url::Url;
use bytes::Bytes;

/// An outbound request: method, target URL, caller-ordered headers, a
/// lazy body, and extensions (timeouts, tracing, target override).
pub struct Request {
    pub method: Bytes,
    pub url: Url,
    pub headers: Headers,
    pub body: Body,
    pub extensions: RequestExtensions,
    /// Known length of `body`, used to decide between `Content-Length`
    /// and `Transfer-Encoding: chunked` injection. `None` means the body
    /// is of unknown size and chunked framing is used.
    content_length: Option<u64>,
}

impl Request {
    /// Build a request with a literal byte body (and therefore a known
    /// `Content-Length`), applying the `Host`/`Content-Length` injection
    /// rules.
    #[must_use]
    pub fn new(method: impl Into<Bytes>, url: Url, headers: Headers, body: Bytes) -> Self {
        let content_length = Some(body.len() as u64);
        let mut req = Self {
            method: method.into(),
            url,
            headers,
            body: Box::new(BytesBody::new(body)),
            extensions: RequestExtensions::default(),
            content_length,
        };
        req.inject_default_headers();
        req
    }

    /// Build a request whose body is of unknown size (will be framed with
    /// `Transfer-Encoding: chunked` if non-empty).
    #[must_use]
    pub fn with_streaming_body(method: impl Into<Bytes>, url: Url, headers: Headers, body: Body) -> Self {
        let mut req = Self {
            method: method.into(),
            url,
            headers,
            body,
            extensions: RequestExtensions::default(),
            content_length: None,
        };
        req.inject_default_headers();
        req
    }

    fn inject_default_headers(&mut self) {
        let host_value = self.url.host_header_value();
        self.headers.push_if_absent("Host", host_value);

        let has_body = self.content_length.map(|n| n > 0).unwrap_or(true) && !self.method_implies_no_body();
        if has_body
            && !self.headers.contains("Content-Length")
            && !self.headers.contains("Transfer-Encoding")
        {
            match self.content_length {
                Some(len) => self.headers.push("Content-Length", len.to_string()),
                None => self.headers.push("Transfer-Encoding", "chunked"),
            }
        }
    }

    fn method_implies_no_body(&self) -> bool {
        // A literal empty body with a known zero length never needs
        // framing headers at all.
        self.content_length == Some(0)
    }

    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_header_is_injected_when_absent() {
        let url = Url::parse("http://example.com/").unwrap();
        let req = Request::new("GET", url, Headers::new(), Bytes::new());
        assert_eq!(req.headers.get("Host"), Some(b"example.com".as_ref()));
    }

    #[test]
    fn host_header_is_not_overridden() {
        let url = Url::parse("http://example.com/").unwrap();
        let mut headers = Headers::new();
        headers.push("Host", "override.example");
        let req = Request::new("GET", url, headers, Bytes::new());
        assert_eq!(req.headers.get("Host"), Some(b"override.example".as_ref()));
    }

    #[test]
    fn content_length_injected_for_nonempty_body() {
        let url = Url::parse("http://example.com/").unwrap();
        let req = Request::new("POST", url, Headers::new(), Bytes::from_static(b"hello"));
        assert_eq!(req.headers.get("Content-Length"), Some(b"5".as_ref()));
        assert!(!req.headers.contains("Transfer-Encoding"));
    }

    #[test]
    fn empty_body_injects_no_framing_header() {
        let url = Url::parse("http://example.com/").unwrap();
        let req = Request::new("GET", url, Headers::new(), Bytes::new());
        assert!(!req.headers.contains("Content-Length"));
        assert!(!req.headers.contains("Transfer-Encoding"));
    }

    #[test]
    fn streaming_body_uses_chunked_encoding() {
        let url = Url::parse("http://example.com/").unwrap();
        let req = Request::with_streaming_body(
            "POST",
            url,
            Headers::new(),
            Box::new(BytesBody::new(Bytes::from_static(b"x"))),
        );
        assert_eq!(req.headers.get("Transfer-Encoding"), Some(b"chunked".as_ref()));
    }

    #[test]
    fn explicit_content_length_is_not_overridden() {
        let url = Url::parse("http://example.com/").unwrap();
        let mut headers = Headers::new();
        headers.push("Content-Length", "999");
        let req = Request::new("POST", url, headers, Bytes::from_static(b"hello"));
        assert_eq!(req.headers.get("Content-Length"), Some(b"999".as_ref()));
    }
}
