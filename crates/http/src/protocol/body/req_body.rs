use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;

use futures::channel::{mpsc, oneshot};
use futures::{FutureExt, SinkExt, Stream, StreamExt};

use http_body::{Body, Frame, SizeHint};
use tracing::{debug, info, warn};

use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};

type PayloadResult = Result<PayloadItem, ParseError>;

/// The request body seen by handlers.
///
/// Frames are pulled from the connection one at a time, see the [module docs](super).
#[derive(Debug)]
pub struct ReqBody {
    signal: mpsc::Sender<oneshot::Sender<PayloadResult>>,
    receiving: Option<oneshot::Receiver<PayloadResult>>,
    remaining: u64,
    finished: bool,
}

impl ReqBody {
    /// Creates the handler side and the connection side of one request body.
    pub fn body_channel<S>(payload_stream: &mut S, payload_size: PayloadSize) -> (ReqBody, ReqBodySender<'_, S>)
    where
        S: Stream + Unpin,
    {
        let (signal, receiver) = mpsc::channel(1);

        let req_body = ReqBody { signal, receiving: None, remaining: payload_size.len(), finished: payload_size.is_empty() };

        let state = if payload_size.is_empty() { SenderState::Eof } else { SenderState::Streaming };
        let body_sender = ReqBodySender { payload_stream, receiver, state };

        (req_body, body_sender)
    }

    /// A body without bytes that isn't tied to any connection.
    pub fn empty() -> Self {
        let (signal, _receiver) = mpsc::channel(1);
        ReqBody { signal, receiving: None, remaining: 0, finished: true }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum SenderState {
    Streaming,
    Eof,
    Failed,
}

/// Connection side of a [`ReqBody`]: answers frame requests from the decoded payload stream.
#[derive(Debug)]
pub struct ReqBodySender<'conn, S>
where
    S: Stream + Unpin,
{
    payload_stream: &'conn mut S,
    receiver: mpsc::Receiver<oneshot::Sender<PayloadResult>>,
    state: SenderState,
}

impl<S> ReqBodySender<'_, S>
where
    S: Stream<Item = Result<Message<(RequestHeader, PayloadSize)>, ParseError>> + Unpin,
{
    /// Serves frame requests until the body ends, fails, or the [`ReqBody`] is dropped.
    ///
    /// Errors are handed to the [`ReqBody`] rather than returned, the handler decides what
    /// they mean for the response.
    pub async fn send_body(&mut self) {
        while self.state == SenderState::Streaming {
            let Some(sender) = self.receiver.next().await else {
                // the handler dropped its body, what is left gets skipped
                return;
            };

            let item = self.next_item().await;
            match &item {
                Ok(PayloadItem::Eof) => self.state = SenderState::Eof,
                Ok(PayloadItem::Chunk(_)) => {}
                Err(e) => {
                    warn!(cause = %e, "failed to read request body");
                    self.state = SenderState::Failed;
                }
            }

            if sender.send(item).is_err() {
                debug!("request body receiver gone before the frame arrived");
            }
        }
    }

    /// Drains the rest of the body so the connection is ready for the next request.
    pub async fn skip_body(&mut self) {
        if self.state != SenderState::Streaming {
            return;
        }

        let mut size: usize = 0;
        loop {
            match self.next_item().await {
                Ok(PayloadItem::Chunk(bytes)) => size += bytes.len(),
                Ok(PayloadItem::Eof) => {
                    self.state = SenderState::Eof;
                    break;
                }
                Err(e) => {
                    warn!(cause = %e, "failed to skip request body");
                    self.state = SenderState::Failed;
                    break;
                }
            }
        }

        if size > 0 {
            info!(size = size, "skip request body");
        }
    }

    /// Whether the body could not be read to its end.
    pub fn is_failed(&self) -> bool {
        self.state == SenderState::Failed
    }

    async fn next_item(&mut self) -> PayloadResult {
        match self.payload_stream.next().await {
            Some(Ok(Message::Payload(payload_item))) => Ok(payload_item),
            Some(Ok(Message::Header(_))) => Err(ParseError::invalid_body("received header from receive body phase")),
            Some(Err(e)) => Err(e),
            None => Err(ParseError::IncompleteBody),
        }
    }
}

impl Body for ReqBody {
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        if self.finished {
            return Poll::Ready(None);
        }

        loop {
            if let Some(oneshot_receiver) = &mut self.receiving {
                let received = ready!(oneshot_receiver.poll_unpin(cx));
                self.receiving = None;

                return match received {
                    Ok(Ok(PayloadItem::Chunk(bytes))) => {
                        self.remaining = self.remaining.saturating_sub(bytes.len() as u64);
                        Poll::Ready(Some(Ok(Frame::data(bytes))))
                    }
                    Ok(Ok(PayloadItem::Eof)) => {
                        self.finished = true;
                        Poll::Ready(None)
                    }
                    Ok(Err(e)) => {
                        self.finished = true;
                        Poll::Ready(Some(Err(e)))
                    }
                    Err(_canceled) => {
                        self.finished = true;
                        Poll::Ready(Some(Err(ParseError::invalid_body("request body canceled"))))
                    }
                };
            }

            if let Err(e) = ready!(self.signal.poll_ready_unpin(cx)) {
                self.finished = true;
                return Poll::Ready(Some(Err(ParseError::invalid_body(e))));
            }

            let (tx, rx) = oneshot::channel();
            if let Err(e) = self.signal.start_send(tx) {
                self.finished = true;
                return Poll::Ready(Some(Err(ParseError::invalid_body(e))));
            }
            self.receiving = Some(rx);
        }
    }

    fn is_end_stream(&self) -> bool {
        self.finished
    }

    fn size_hint(&self) -> SizeHint {
        if self.finished { SizeHint::with_exact(0) } else { SizeHint::with_exact(self.remaining) }
    }
}
