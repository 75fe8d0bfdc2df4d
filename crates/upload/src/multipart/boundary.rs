use bytes::Bytes;
use http::HeaderValue;
use memchr::memmem;

use crate::error::UploadError;

const BOUNDARY_PARAM: &[u8] = b"boundary=";

/// The multipart delimiter token declared in `Content-Type`.
///
/// The token is kept exactly as it appears after `boundary=`, quotes and any following
/// parameters included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary {
    token: Bytes,
}

impl Boundary {
    /// Extracts the boundary from a `Content-Type` header value.
    ///
    /// ```
    /// use http::HeaderValue;
    /// use upload_server::multipart::Boundary;
    ///
    /// let content_type = HeaderValue::from_static("multipart/form-data; boundary=XYZ");
    /// let boundary = Boundary::from_content_type(Some(&content_type)).unwrap();
    /// assert_eq!(boundary.as_bytes(), b"XYZ");
    /// ```
    pub fn from_content_type(content_type: Option<&HeaderValue>) -> Result<Self, UploadError> {
        let content_type = content_type.ok_or(UploadError::MalformedContentType)?;
        Self::parse(content_type.as_bytes())
    }

    /// Extracts the boundary from raw `Content-Type` bytes.
    pub fn parse(content_type: &[u8]) -> Result<Self, UploadError> {
        let start = memmem::find(content_type, BOUNDARY_PARAM).ok_or(UploadError::MalformedContentType)? + BOUNDARY_PARAM.len();

        let token = &content_type[start..];
        if token.is_empty() {
            return Err(UploadError::MalformedContentType);
        }

        Ok(Self { token: Bytes::copy_from_slice(token) })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.token
    }

    /// Whether `line` contains the token anywhere, which is how delimiter lines are told
    /// apart from payload lines.
    pub fn is_in(&self, line: &[u8]) -> bool {
        memmem::find(line, &self.token).is_some()
    }
}
