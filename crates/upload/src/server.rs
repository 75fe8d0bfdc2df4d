use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use upload_http::connection::HttpConnection;

use crate::config::UploadConfig;
use crate::error::ServerError;
use crate::handler::UploadHandler;

/// A bound listener plus the handler every accepted connection is served with.
#[derive(Debug)]
pub struct UploadServer {
    listener: TcpListener,
    handler: Arc<UploadHandler>,
}

impl UploadServer {
    /// Prepares the upload directory and binds the listening socket.
    pub async fn bind(config: UploadConfig) -> Result<Self, ServerError> {
        let config = config.prepare().await?;

        let addr = config.socket_addr();
        let listener = TcpListener::bind(addr).await.map_err(|source| ServerError::Bind { addr, source })?;

        info!(address = %addr, directory = %config.directory().display(), "upload server listening");

        Ok(Self { listener, handler: Arc::new(UploadHandler::new(Arc::new(config))) })
    }

    /// The address actually bound, useful when the configured port was `0`.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections forever, each one served on its own task.
    pub async fn serve(self) {
        loop {
            let (tcp_stream, remote_addr) = match self.listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let handler = Arc::clone(&self.handler);

            tokio::spawn(async move {
                debug!(remote = %remote_addr, "accepted connection");
                let (reader, writer) = tcp_stream.into_split();
                let connection = HttpConnection::new(reader, writer);
                match connection.process(handler).await {
                    Ok(()) => {
                        debug!(remote = %remote_addr, "finished process, connection shutdown");
                    }
                    Err(e) => {
                        error!(remote = %remote_addr, cause = %e, "service has error, connection shutdown");
                    }
                }
            });
        }
    }
}
