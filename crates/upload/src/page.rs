//! The upload page served at `/`.

use bytes::Bytes;

/// A file picker that posts every selected file to `/upload` on its own, showing progress and
/// the server's answer per file.
pub const UPLOAD_PAGE: &str = include_str!("../static/index.html");

pub fn upload_page() -> Bytes {
    Bytes::from_static(UPLOAD_PAGE.as_bytes())
}
