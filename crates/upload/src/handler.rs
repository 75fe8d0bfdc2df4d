use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::{BodyDataStream, Full};
use mime::Mime;
use tokio_util::io::StreamReader;
use tracing::{error, info, warn};
use upload_http::handler::Handler;
use upload_http::protocol::RequestHeader;
use upload_http::protocol::body::ReqBody;

use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::multipart::{Boundary, MultipartReader};
use crate::page::upload_page;
use crate::sink::{StoredFile, store};

pub const UPLOAD_PATH: &str = "/upload";

/// Serves the upload page on `GET /` and stores uploads sent to `POST /upload`.
///
/// Every failure is answered with a response, the handler itself never errors.
#[derive(Debug, Clone)]
pub struct UploadHandler {
    config: Arc<UploadConfig>,
}

impl UploadHandler {
    pub fn new(config: Arc<UploadConfig>) -> Self {
        Self { config }
    }

    async fn upload(&self, req: Request<ReqBody>) -> Response<Full<Bytes>> {
        match self.receive(req).await {
            Ok(stored) => {
                info!(path = %stored.path.display(), size = stored.size, "upload successful");
                text_response(StatusCode::OK, "Upload successful")
            }
            Err(e) => {
                let status = e.status_code();
                if status.is_server_error() {
                    error!(cause = %e, "upload failed");
                } else {
                    warn!(cause = %e, "upload rejected");
                }
                text_response(status, e.to_string())
            }
        }
    }

    /// Parses the multipart body of `req` and writes its file part into the upload directory.
    pub async fn receive(&self, req: Request<ReqBody>) -> Result<StoredFile, UploadError> {
        let (parts, body) = req.into_parts();
        let header = RequestHeader::from(parts);

        let content_length = header.content_length().ok_or(UploadError::MissingContentLength)?;
        let boundary = Boundary::from_content_type(header.content_type())?;

        let source = StreamReader::new(BodyDataStream::new(body));
        let mut reader = MultipartReader::new(source, boundary, content_length);

        let part = reader.read_part_header().await?;
        store(self.config.directory(), &mut reader, &part).await
    }
}

impl Handler for UploadHandler {
    type RespBody = Full<Bytes>;
    type Error = Infallible;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error> {
        let response = match (req.method(), req.uri().path()) {
            (&Method::GET, "/") => page_response(),
            (&Method::POST, UPLOAD_PATH) => self.upload(req).await,
            (method, path) => {
                info!(%method, path, "no route");
                text_response(StatusCode::NOT_FOUND, "Not Found")
            }
        };
        Ok(response)
    }
}

fn page_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(upload_page()));
    response.headers_mut().insert(CONTENT_TYPE, header_value(&mime::TEXT_HTML_UTF_8));
    response
}

fn text_response<B: Into<Bytes>>(status: StatusCode, body: B) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, header_value(&mime::TEXT_PLAIN_UTF_8));
    response
}

fn header_value(mime: &Mime) -> HeaderValue {
    HeaderValue::from_str(mime.as_ref()).unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use tempfile::TempDir;

    fn handler(dir: &TempDir) -> UploadHandler {
        UploadHandler::new(Arc::new(UploadConfig::new(dir.path())))
    }

    async fn body_text(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn serve_page() {
        let dir = TempDir::new().unwrap();
        let request = Request::get("/").body(ReqBody::empty()).unwrap();

        let response = handler(&dir).call(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(body_text(response).await, crate::page::UPLOAD_PAGE);
    }

    #[tokio::test]
    async fn unknown_routes() {
        let dir = TempDir::new().unwrap();
        let handler = handler(&dir);

        for (method, path) in [(Method::GET, "/upload"), (Method::POST, "/"), (Method::PUT, "/upload"), (Method::GET, "/index.html")] {
            let request = Request::builder().method(method).uri(path).body(ReqBody::empty()).unwrap();
            let response = handler.call(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn upload_without_content_length() {
        let dir = TempDir::new().unwrap();
        let request = Request::post(UPLOAD_PATH)
            .header(CONTENT_TYPE, "multipart/form-data; boundary=XYZ")
            .body(ReqBody::empty())
            .unwrap();

        let response = handler(&dir).call(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, UploadError::MissingContentLength.to_string());
    }

    #[tokio::test]
    async fn upload_without_boundary() {
        let dir = TempDir::new().unwrap();
        let request = Request::post(UPLOAD_PATH)
            .header(CONTENT_TYPE, "text/plain")
            .header(http::header::CONTENT_LENGTH, "5")
            .body(ReqBody::empty())
            .unwrap();

        let response = handler(&dir).call(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
