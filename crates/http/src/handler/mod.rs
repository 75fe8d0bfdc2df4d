//! The request handler contract between a connection and the application.

use std::error::Error;
use std::future::Future;

use http::{Request, Response};
use http_body::Body;

use crate::protocol::body::ReqBody;

/// Turns one request into one response.
///
/// The returned future must be `Send` because every connection runs on its own tokio task.
/// An `Err` is answered with an empty `500 Internal Server Error`; handlers that want to
/// describe their failures build the error response themselves.
#[trait_variant::make(Send)]
pub trait Handler: Sync {
    type RespBody: Body;
    type Error: Into<Box<dyn Error + Send + Sync>>;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error>;
}

/// A [`Handler`] backed by an async function, see [`make_handler`].
#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

impl<RespBody, Err, F, Fut> Handler for HandlerFn<F>
where
    RespBody: Body,
    F: Fn(Request<ReqBody>) -> Fut + Send + Sync,
    Err: Into<Box<dyn Error + Send + Sync>>,
    Fut: Future<Output = Result<Response<RespBody>, Err>> + Send,
{
    type RespBody = RespBody;
    type Error = Err;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error> {
        (self.f)(req).await
    }
}

pub fn make_handler<F, RespBody, Err, Ret>(f: F) -> HandlerFn<F>
where
    RespBody: Body,
    Err: Into<Box<dyn Error + Send + Sync>>,
    Ret: Future<Output = Result<Response<RespBody>, Err>>,
    F: Fn(Request<ReqBody>) -> Ret + Send + Sync,
{
    HandlerFn { f }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};
    use std::convert::Infallible;
    use std::sync::Arc;

    async fn path_len(req: Request<ReqBody>) -> Result<Response<Full<Bytes>>, Infallible> {
        Ok(Response::new(Full::from(req.uri().path().len().to_string())))
    }

    fn assert_spawnable<H: Handler + Send + Sync + 'static>(_handler: &H) {}

    #[tokio::test]
    async fn handler_fn_runs_on_another_task() {
        let handler = Arc::new(make_handler(path_len));
        assert_spawnable(&*handler);

        let request = Request::get("/upload").body(ReqBody::empty()).unwrap();
        let response = tokio::spawn(async move { handler.call(request).await }).await.unwrap().unwrap();

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from_static(b"7"));
    }
}
