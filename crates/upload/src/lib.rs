//! A small HTTP server that receives browser file uploads.
//!
//! `GET /` serves a page with a file picker. Each selected file is posted to `POST /upload`
//! as a single-part `multipart/form-data` body, which is parsed while it streams in and
//! written to `<directory>/<basename of the filename>`. Nothing is buffered beyond one line
//! of the body.
//!
//! ```no_run
//! use upload_server::config::UploadConfig;
//! use upload_server::server::UploadServer;
//!
//! # async fn run() -> Result<(), upload_server::error::ServerError> {
//! let server = UploadServer::bind(UploadConfig::new("/srv/uploads").with_port(8080)).await?;
//! server.serve().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod multipart;
pub mod page;
pub mod server;
pub mod sink;
