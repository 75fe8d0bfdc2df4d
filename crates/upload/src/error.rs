use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use http::StatusCode;
use thiserror::Error;

use crate::multipart::ReaderState;

/// Everything that can go wrong while receiving one upload.
///
/// Each variant maps to exactly one status code, see [`UploadError::status_code`].
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("invalid content type, expect multipart/form-data with a boundary")]
    MalformedContentType,

    #[error("invalid boundary")]
    InvalidBoundary,

    #[error("no filename found")]
    MissingFilename,

    #[error("invalid filename {filename:?}")]
    InvalidFilename { filename: String },

    #[error("missing content-length header")]
    MissingContentLength,

    #[error("request body ended before the closing boundary, {remaining} bytes of content-length left")]
    TruncatedBody { remaining: u64 },

    #[error("failed to read request body: {source}")]
    BodyRead {
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("multipart reader can't continue in state {state:?}")]
    InvalidState { state: ReaderState },
}

impl UploadError {
    pub fn invalid_filename<S: ToString>(filename: S) -> Self {
        Self::InvalidFilename { filename: filename.to_string() }
    }

    pub fn filesystem<P: AsRef<Path>>(path: P, source: io::Error) -> Self {
        Self::Filesystem { path: path.as_ref().to_path_buf(), source }
    }

    /// `400` for requests the client got wrong, `500` for everything else.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedContentType | Self::InvalidBoundary | Self::MissingFilename | Self::InvalidFilename { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::MissingContentLength
            | Self::TruncatedBody { .. }
            | Self::BodyRead { .. }
            | Self::Filesystem { .. }
            | Self::InvalidState { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Failures that stop the server from starting.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to prepare upload directory {}: {source}", .path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}
