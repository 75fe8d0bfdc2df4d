//! Connection handling: the per-connection request loop in [`HttpConnection`].

mod http_connection;

pub use http_connection::HttpConnection;
