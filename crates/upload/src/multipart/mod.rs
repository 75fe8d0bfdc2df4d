//! Single-part `multipart/form-data` parsing.
//!
//! [`Boundary`] pulls the delimiter token out of the request's `Content-Type`, and
//! [`MultipartReader`] walks the body once: delimiter line, part headers, then payload chunks
//! until the closing delimiter. Only the first part is ever read.

mod boundary;
mod reader;

pub use boundary::Boundary;
pub use reader::MultipartReader;
pub use reader::PartHeader;
pub use reader::ReaderState;
