use std::io;

use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, Take};
use tracing::{debug, trace};

use crate::error::UploadError;
use crate::multipart::Boundary;

// `(?-u)` lets `.` match any byte, the filename is only checked for UTF-8 afterwards
static FILENAME: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?-u)filename="(.+?)""#).expect("filename pattern is valid"));

/// Longest piece of a line read at once. Longer lines are handed out in several pieces.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Where a [`MultipartReader`] is in its single pass over the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    AwaitHeaders,
    BoundaryChecked,
    HeaderParsed,
    PayloadStreaming,
    Complete,
    Failed,
}

/// The headers of the one part this server accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartHeader {
    filename: String,
}

impl PartHeader {
    /// The filename exactly as the client sent it, not yet reduced to a basename.
    pub fn filename(&self) -> &str {
        &self.filename
    }
}

/// Streams the payload of a single-part `multipart/form-data` body.
///
/// The body is read line by line, never more than `content_length` bytes and never more than
/// [`MAX_LINE_LEN`] bytes of one line at a time. A line containing the boundary token ends the
/// payload. Each payload line is held back until the next line has been read, so the `\r\n`
/// that precedes the closing delimiter can be cut from the last line before it is handed out.
#[derive(Debug)]
pub struct MultipartReader<R> {
    source: Take<R>,
    boundary: Boundary,
    remaining: u64,
    lookahead: Option<Vec<u8>>,
    state: ReaderState,
}

impl<R> MultipartReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(source: R, boundary: Boundary, content_length: u64) -> Self {
        Self {
            source: source.take(content_length),
            boundary,
            remaining: content_length,
            lookahead: None,
            state: ReaderState::AwaitHeaders,
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Bytes of the declared content length not read yet.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Reads the opening delimiter and the part headers, up to and including the blank line
    /// that separates them from the payload.
    pub async fn read_part_header(&mut self) -> Result<PartHeader, UploadError> {
        if self.state != ReaderState::AwaitHeaders {
            return Err(UploadError::InvalidState { state: self.state });
        }

        let result = self.do_read_part_header().await;
        if result.is_err() {
            self.state = ReaderState::Failed;
        }
        result
    }

    async fn do_read_part_header(&mut self) -> Result<PartHeader, UploadError> {
        let line = self.read_line().await?;
        if !self.boundary.is_in(&line) {
            return Err(UploadError::InvalidBoundary);
        }
        self.state = ReaderState::BoundaryChecked;

        let line = self.read_line().await?;
        let filename = parse_filename(&line)?;
        debug!(filename = %filename, "parsed part header");

        // the part's Content-Type line, then the blank line before the payload
        for _ in 0..2 {
            let line = self.read_line().await?;
            if line.is_empty() {
                return Err(self.truncated());
            }
            trace!(len = line.len(), "skip part header line");
        }

        self.state = ReaderState::HeaderParsed;
        Ok(PartHeader { filename })
    }

    /// Returns the next piece of payload, or `None` once the closing delimiter was seen.
    ///
    /// Pieces are payload lines in order. Concatenated they equal the bytes between the part
    /// headers and the closing delimiter, minus the `\r\n` right before that delimiter.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, UploadError> {
        match self.state {
            ReaderState::HeaderParsed | ReaderState::PayloadStreaming => {}
            ReaderState::Complete => return Ok(None),
            state => return Err(UploadError::InvalidState { state }),
        }

        let result = self.do_next_chunk().await;
        if result.is_err() {
            self.state = ReaderState::Failed;
            self.lookahead = None;
        }
        result
    }

    async fn do_next_chunk(&mut self) -> Result<Option<Bytes>, UploadError> {
        let mut current = match self.lookahead.take() {
            Some(line) => line,
            None => {
                let line = self.read_line().await?;
                if line.is_empty() {
                    return Err(self.truncated());
                }
                self.state = ReaderState::PayloadStreaming;
                line
            }
        };

        let next = self.read_line().await?;
        if next.is_empty() {
            return Err(self.truncated());
        }

        // `next` only starts a line when `current` ended one
        if current.ends_with(b"\n") && self.boundary.is_in(&next) {
            self.state = ReaderState::Complete;
            current.truncate(current.len().saturating_sub(2));
            if current.is_empty() {
                return Ok(None);
            }
            return Ok(Some(Bytes::from(current)));
        }

        self.lookahead = Some(next);
        Ok(Some(Bytes::from(current)))
    }

    /// Reads up to and including the next `\n`, or [`MAX_LINE_LEN`] bytes of the line. An
    /// empty line means the content length is used up or the stream ended.
    async fn read_line(&mut self) -> Result<Vec<u8>, UploadError> {
        let mut line = Vec::new();
        self.read_until_newline(&mut line, MAX_LINE_LEN - 1).await?;

        // a piece never ends between `\r` and `\n`
        if line.ends_with(b"\r") {
            self.read_until_newline(&mut line, 1).await?;
        }
        Ok(line)
    }

    async fn read_until_newline(&mut self, line: &mut Vec<u8>, limit: usize) -> Result<(), UploadError> {
        let result = (&mut self.source).take(limit as u64).read_until(b'\n', line).await;
        match result {
            Ok(n) => {
                self.remaining = self.remaining.saturating_sub(n as u64);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(self.truncated()),
            Err(e) => Err(UploadError::BodyRead { source: e }),
        }
    }

    fn truncated(&self) -> UploadError {
        UploadError::TruncatedBody { remaining: self.remaining }
    }
}

fn parse_filename(line: &[u8]) -> Result<String, UploadError> {
    let captures = FILENAME.captures(line).ok_or(UploadError::MissingFilename)?;
    let raw = captures.get(1).ok_or(UploadError::MissingFilename)?.as_bytes();

    match std::str::from_utf8(raw) {
        Ok(filename) => Ok(filename.to_string()),
        Err(_) => Err(UploadError::invalid_filename(String::from_utf8_lossy(raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    const CONTENT_TYPE: &[u8] = b"multipart/form-data; boundary=XYZ";

    fn new_reader(body: &[u8]) -> MultipartReader<&[u8]> {
        MultipartReader::new(body, Boundary::parse(CONTENT_TYPE).unwrap(), body.len() as u64)
    }

    fn body_with(payload: &[u8]) -> Vec<u8> {
        let mut body = b"--XYZ\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\nContent-Type: text/plain\r\n\r\n".to_vec();
        body.extend_from_slice(payload);
        body.extend_from_slice(b"\r\n--XYZ--\r\n");
        body
    }

    async fn drain<R: AsyncBufRead + Unpin>(reader: &mut MultipartReader<R>) -> Result<Vec<u8>, UploadError> {
        let mut payload = Vec::new();
        while let Some(chunk) = reader.next_chunk().await? {
            payload.extend_from_slice(&chunk);
        }
        Ok(payload)
    }

    #[tokio::test]
    async fn single_line_payload() {
        let body = body_with(b"HELLO");
        let mut reader = new_reader(&body);

        let header = reader.read_part_header().await.unwrap();
        assert_eq!(header.filename(), "a.txt");
        assert_eq!(reader.state(), ReaderState::HeaderParsed);

        assert_eq!(reader.next_chunk().await.unwrap(), Some(Bytes::from_static(b"HELLO")));
        assert_eq!(reader.state(), ReaderState::Complete);
        assert_eq!(reader.next_chunk().await.unwrap(), None);

        assert_eq!(reader.remaining(), 0);
    }

    #[tokio::test]
    async fn multi_line_payload() {
        let body = body_with(b"line one\r\nline two\nline three");
        let mut reader = new_reader(&body);

        reader.read_part_header().await.unwrap();
        assert_eq!(reader.next_chunk().await.unwrap(), Some(Bytes::from_static(b"line one\r\n")));
        assert_eq!(reader.state(), ReaderState::PayloadStreaming);
        assert_eq!(reader.next_chunk().await.unwrap(), Some(Bytes::from_static(b"line two\n")));
        assert_eq!(reader.next_chunk().await.unwrap(), Some(Bytes::from_static(b"line three")));
        assert_eq!(reader.next_chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn payload_crlf_is_kept() {
        let payload = b"\r\n\r\nfirst\r\n\r\n--not the delimiter\r\n";
        let body = body_with(payload);
        let mut reader = new_reader(&body);

        reader.read_part_header().await.unwrap();
        assert_eq!(drain(&mut reader).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn empty_payload() {
        let body = body_with(b"");
        let mut reader = new_reader(&body);

        reader.read_part_header().await.unwrap();
        assert_eq!(reader.next_chunk().await.unwrap(), None);
        assert_eq!(reader.state(), ReaderState::Complete);
    }

    #[tokio::test]
    async fn binary_payload_through_small_buffer() {
        let payload: Vec<u8> = (0..10_000u32).map(|i| ((i * 31 + 7) % 251) as u8).collect();
        let body = body_with(&payload);

        let source = BufReader::with_capacity(3, body.as_slice());
        let mut reader = MultipartReader::new(source, Boundary::parse(CONTENT_TYPE).unwrap(), body.len() as u64);

        let header = reader.read_part_header().await.unwrap();
        assert_eq!(header.filename(), "a.txt");
        assert_eq!(drain(&mut reader).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn read_stops_at_content_length() {
        let body = body_with(b"HELLO");
        let mut with_trailing = body.clone();
        with_trailing.extend_from_slice(b"GET / HTTP/1.1\r\n\r\n");

        let mut reader = MultipartReader::new(with_trailing.as_slice(), Boundary::parse(CONTENT_TYPE).unwrap(), body.len() as u64);
        reader.read_part_header().await.unwrap();
        assert_eq!(drain(&mut reader).await.unwrap(), b"HELLO");
    }

    #[tokio::test]
    async fn filename_with_directories_is_returned_raw() {
        let body = b"--XYZ\r\nContent-Disposition: form-data; name=\"file\"; filename=\"../../etc/passwd\"\r\nContent-Type: text/plain\r\n\r\nroot\r\n--XYZ--\r\n";
        let mut reader = new_reader(body);

        assert_eq!(reader.read_part_header().await.unwrap().filename(), "../../etc/passwd");
    }

    #[tokio::test]
    async fn wrong_first_line() {
        let body = b"--ABC\r\nContent-Disposition: form-data; filename=\"a.txt\"\r\n\r\n\r\nHELLO\r\n--ABC--\r\n";
        let mut reader = new_reader(body);

        assert!(matches!(reader.read_part_header().await, Err(UploadError::InvalidBoundary)));
        assert_eq!(reader.state(), ReaderState::Failed);
    }

    #[tokio::test]
    async fn empty_body() {
        let mut reader = new_reader(b"");
        assert!(matches!(reader.read_part_header().await, Err(UploadError::InvalidBoundary)));
    }

    #[tokio::test]
    async fn missing_filename() {
        let body = b"--XYZ\r\nContent-Disposition: form-data; name=\"file\"\r\nContent-Type: text/plain\r\n\r\nHELLO\r\n--XYZ--\r\n";
        let mut reader = new_reader(body);

        assert!(matches!(reader.read_part_header().await, Err(UploadError::MissingFilename)));
        assert_eq!(reader.state(), ReaderState::Failed);

        let mut reader = new_reader(b"--XYZ\r\nContent-Disposition: form-data; filename=\"\"\r\n\r\n\r\n--XYZ--\r\n");
        assert!(matches!(reader.read_part_header().await, Err(UploadError::MissingFilename)));
    }

    #[tokio::test]
    async fn filename_not_utf8() {
        let body = b"--XYZ\r\nContent-Disposition: form-data; filename=\"\xff\xfe.txt\"\r\n\r\n\r\nHELLO\r\n--XYZ--\r\n";
        let mut reader = new_reader(body);

        assert!(matches!(reader.read_part_header().await, Err(UploadError::InvalidFilename { .. })));
    }

    #[tokio::test]
    async fn truncated_in_part_headers() {
        let mut reader = new_reader(b"--XYZ\r\nContent-Disposition: form-data; filename=\"a.txt\"\r\n");
        assert!(matches!(reader.read_part_header().await, Err(UploadError::TruncatedBody { remaining: 0 })));
    }

    #[tokio::test]
    async fn truncated_in_payload() {
        let mut body = body_with(b"HELLO\r\nWORLD");
        let declared = body.len() as u64;
        body.truncate(body.len() - b"\r\n--XYZ--\r\n".len());

        let mut reader = MultipartReader::new(body.as_slice(), Boundary::parse(CONTENT_TYPE).unwrap(), declared);
        reader.read_part_header().await.unwrap();

        assert_eq!(reader.next_chunk().await.unwrap(), Some(Bytes::from_static(b"HELLO\r\n")));
        let e = reader.next_chunk().await.unwrap_err();
        assert!(matches!(e, UploadError::TruncatedBody { remaining: 11 }));
        assert_eq!(reader.state(), ReaderState::Failed);

        assert!(matches!(reader.next_chunk().await, Err(UploadError::InvalidState { state: ReaderState::Failed })));
    }

    #[tokio::test]
    async fn content_length_ends_inside_payload() {
        let body = body_with(b"HELLO\r\nWORLD");
        let declared = body.len() as u64 - 15;

        let mut source = body.as_slice();
        {
            let mut reader = MultipartReader::new(&mut source, Boundary::parse(CONTENT_TYPE).unwrap(), declared);
            reader.read_part_header().await.unwrap();

            assert_eq!(reader.next_chunk().await.unwrap(), Some(Bytes::from_static(b"HELLO\r\n")));
            assert!(matches!(reader.next_chunk().await, Err(UploadError::TruncatedBody { remaining: 0 })));
            assert_eq!(reader.state(), ReaderState::Failed);
        }

        // nothing past the declared length was consumed
        assert_eq!(source, b"ORLD\r\n--XYZ--\r\n");
    }

    #[tokio::test]
    async fn long_line_in_pieces() {
        let payload = vec![b'x'; 200 * 1024];
        let body = body_with(&payload);
        let mut reader = new_reader(&body);
        reader.read_part_header().await.unwrap();

        let mut received = Vec::new();
        while let Some(chunk) = reader.next_chunk().await.unwrap() {
            assert!(chunk.len() <= MAX_LINE_LEN, "chunk of {} bytes", chunk.len());
            received.extend_from_slice(&chunk);
        }
        assert_eq!(received, payload);
    }

    #[tokio::test]
    async fn long_line_ending_at_piece_limit() {
        let mut payload = vec![b'y'; MAX_LINE_LEN - 2];
        payload.extend_from_slice(b"\r\ntail");
        let body = body_with(&payload);

        for capacity in [3, 8 * 1024] {
            let source = BufReader::with_capacity(capacity, body.as_slice());
            let mut reader = MultipartReader::new(source, Boundary::parse(CONTENT_TYPE).unwrap(), body.len() as u64);
            reader.read_part_header().await.unwrap();

            let first = reader.next_chunk().await.unwrap().unwrap();
            assert_eq!(first.len(), MAX_LINE_LEN);
            assert!(first.ends_with(b"\r\n"));
            assert_eq!(reader.next_chunk().await.unwrap(), Some(Bytes::from_static(b"tail")));
            assert_eq!(reader.next_chunk().await.unwrap(), None);
        }

        let closing = body_with(&vec![b'z'; MAX_LINE_LEN - 2]);
        let mut reader = new_reader(&closing);
        reader.read_part_header().await.unwrap();
        assert_eq!(drain(&mut reader).await.unwrap(), vec![b'z'; MAX_LINE_LEN - 2]);
    }

    #[tokio::test]
    async fn unexpected_eof_is_truncation() {
        struct Eof;

        impl tokio::io::AsyncRead for Eof {
            fn poll_read(
                self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
                _buf: &mut tokio::io::ReadBuf<'_>,
            ) -> std::task::Poll<io::Result<()>> {
                std::task::Poll::Ready(Err(io::ErrorKind::UnexpectedEof.into()))
            }
        }

        let source = BufReader::new(Eof);
        let mut reader = MultipartReader::new(source, Boundary::parse(CONTENT_TYPE).unwrap(), 100);
        assert!(matches!(reader.read_part_header().await, Err(UploadError::TruncatedBody { remaining: 100 })));
    }

    #[tokio::test]
    async fn calls_out_of_order() {
        let body = body_with(b"HELLO");
        let mut reader = new_reader(&body);

        assert!(matches!(reader.next_chunk().await, Err(UploadError::InvalidState { state: ReaderState::AwaitHeaders })));

        reader.read_part_header().await.unwrap();
        assert!(matches!(reader.read_part_header().await, Err(UploadError::InvalidState { state: ReaderState::HeaderParsed })));
    }
}
