//! Streaming request bodies.
//!
//! The connection owns the decoded payload stream, the handler owns a [`ReqBody`]. Each time
//! the handler polls for a frame, [`ReqBody`] sends a oneshot sender over an mpsc channel and
//! [`ReqBodySender`], running next to the handler on the connection task, answers it with the
//! next decoded payload item. Only one chunk is in flight at a time, so a slow consumer (say,
//! a disk write) pushes back on the socket instead of growing a buffer.
//!
//! Whatever the handler leaves unread is drained by [`ReqBodySender::skip_body`] so the next
//! request on a keep-alive connection starts at a message boundary.

mod req_body;

pub use req_body::ReqBody;
pub use req_body::ReqBodySender;
