//! Request decoding and response encoding on top of `tokio_util::codec`.
//!
//! - [`RequestDecoder`] turns socket bytes into a request header followed by payload chunks
//!   and an EOF marker, using the `Content-Length` header to find the end of the body.
//! - [`ResponseEncoder`] writes a response head followed by exactly `Content-Length` bytes.
//!
//! ```no_run
//! use upload_http::codec::RequestDecoder;
//! use tokio_util::codec::Decoder;
//! use bytes::BytesMut;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::from(&b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n"[..]);
//! let header = decoder.decode(&mut buffer);
//! ```

mod body;
mod header;
mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
