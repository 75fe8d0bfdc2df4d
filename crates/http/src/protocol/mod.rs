//! Protocol types shared by the codecs, the connection and the handler.
//!
//! - [`Message`], [`PayloadItem`], [`PayloadSize`]: heads and payload pieces
//! - [`RequestHeader`], [`ResponseHead`]: message heads
//! - [`body::ReqBody`]: the streaming request body handed to handlers
//! - [`HttpError`], [`ParseError`], [`SendError`]: error types

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;
pub use request::content_length;

mod response;
pub use response::ResponseHead;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
