//! Asynchronous HTTP/1.1 plumbing for the upload server
//!
//! This crate provides the connection layer the upload server sits on: it decodes request
//! headers, streams request bodies to the handler as they arrive off the socket, and encodes
//! responses with a known length. The handler never sees the whole body at once, which is
//! what lets uploads of any size be written to disk with a bounded amount of memory.
//!
//! # Example
//!
//! ```no_run
//! use http::{Request, Response, StatusCode};
//! use http_body_util::{BodyExt, Full};
//! use bytes::Bytes;
//! use std::error::Error;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tracing::{error, info, warn};
//! use upload_http::connection::HttpConnection;
//! use upload_http::handler::make_handler;
//! use upload_http::protocol::body::ReqBody;
//!
//! #[tokio::main]
//! async fn main() {
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     let handler = Arc::new(make_handler(echo_size));
//!
//!     loop {
//!         let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let handler = handler.clone();
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             if let Err(e) = HttpConnection::new(reader, writer).process(handler).await {
//!                 error!(cause = %e, "connection shutdown with error");
//!             }
//!         });
//!     }
//! }
//!
//! async fn echo_size(request: Request<ReqBody>) -> Result<Response<Full<Bytes>>, Box<dyn Error + Send + Sync>> {
//!     let body = request.into_body().collect().await?.to_bytes();
//!     info!(size = body.len(), "received body");
//!     Ok(Response::builder().status(StatusCode::OK).body(Full::from(format!("{}\n", body.len())))?)
//! }
//! ```
//!
//! # Architecture
//!
//! - [`connection`]: per-connection request loop
//! - [`protocol`]: request header, payload and error types
//! - [`codec`]: request decoding and response encoding
//! - [`handler`]: the trait the application implements
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only
//! - Request bodies must be delimited by `Content-Length`; `Transfer-Encoding` is rejected
//! - Response bodies must report an exact size
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
