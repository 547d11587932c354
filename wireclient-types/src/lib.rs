//! The immutable data model: `Url`/`Origin`, `Request`/`Response`,
//! `Headers`, and the lazy `ByteStream` body abstraction.

pub mod bytestream;
pub mod extensions;
pub mod headers;
pub mod request;
pub mod response;
pub mod url;

pub use bytestream::{Body, ByteStream, BytesBody};
pub use extensions::{HttpVersion, RequestExtensions, ResponseExtensions, TraceCallback, TraceFn, TraceStage};
pub use headers::{Header, Headers};
pub use request::Request;
pub use response::Response;
pub use url::{Origin, Url, UrlParseError};
