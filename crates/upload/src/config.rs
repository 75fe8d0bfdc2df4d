use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::Level;

use crate::error::ServerError;

pub const DEFAULT_PORT: u16 = 8000;

/// Command line and environment configuration of the server.
#[derive(Parser, Debug, Clone)]
#[command(name = "upload-server", version, about = "Receive browser file uploads into a directory")]
pub struct UploadConfig {
    #[arg(
        short = 'd',
        long,
        env = "UPLOAD_DIRECTORY",
        default_value = ".",
        help = "Directory to save uploaded files, created if it doesn't exist"
    )]
    pub directory: PathBuf,

    #[arg(short = 'b', long, env = "UPLOAD_BIND", default_value = "0.0.0.0", help = "Address to listen on")]
    pub bind: IpAddr,

    #[arg(value_name = "PORT", default_value_t = DEFAULT_PORT, help = "Port number")]
    pub port: u16,

    #[arg(long, env = "UPLOAD_LOG_LEVEL", default_value = "info", help = "Maximum log level")]
    pub log_level: Level,
}

impl UploadConfig {
    /// Defaults for everything but the directory.
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self { directory: directory.into(), bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: DEFAULT_PORT, log_level: Level::INFO }
    }

    #[must_use]
    pub fn with_bind(mut self, bind: IpAddr) -> Self {
        self.bind = bind;
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Creates the upload directory when missing and makes its path absolute.
    pub async fn prepare(mut self) -> Result<Self, ServerError> {
        let directory_error = |path: &Path, source| ServerError::Directory { path: path.to_path_buf(), source };

        tokio::fs::create_dir_all(&self.directory).await.map_err(|e| directory_error(&self.directory, e))?;
        self.directory = tokio::fs::canonicalize(&self.directory).await.map_err(|e| directory_error(&self.directory, e))?;
        Ok(self)
    }
}
