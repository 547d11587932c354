//! The `Response` type.

use crate::bytestream::Body;
use crate::extensions::ResponseExtensions;
use crate::headers::Headers;

/// An inbound response: status, caller-ordered headers, a lazy body, and
/// protocol-specific extensions.
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: Body,
    pub extensions: ResponseExtensions,
}

impl Response {
    #[must_use]
    pub fn new(status: u16, headers: Headers, body: Body, extensions: ResponseExtensions) -> Self {
        Self { status, headers, body, extensions }
    }

    /// Informational responses (1xx, including 103 Early Hints) are never
    /// the final response an engine hands back to a caller.
    #[must_use]
    pub fn is_informational(status: u16) -> bool {
        (100..200).contains(&status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn informational_range_is_1xx() {
        assert!(Response::is_informational(100));
        assert!(Response::is_informational(103));
        assert!(Response::is_informational(199));
        assert!(!Response::is_informational(200));
        assert!(!Response::is_informational(99));
    }
}
