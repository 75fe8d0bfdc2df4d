//! Writing an upload to the target directory.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

use crate::error::UploadError;
use crate::multipart::{MultipartReader, PartHeader};

/// Reduces a client supplied filename to its last path component.
///
/// Both `/` and `\` count as separators. Returns `None` when nothing usable is left, which is
/// the case for an empty name, `.` and `..`.
///
/// ```
/// use upload_server::sink::sanitize_filename;
///
/// assert_eq!(sanitize_filename("../../etc/passwd"), Some("passwd"));
/// assert_eq!(sanitize_filename(r"C:\Users\me\report.pdf"), Some("report.pdf"));
/// assert_eq!(sanitize_filename("dir/"), None);
/// ```
pub fn sanitize_filename(raw: &str) -> Option<&str> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    match name {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

/// A file that has been written completely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: PathBuf,
    pub size: u64,
}

/// An upload target opened for writing.
///
/// The file is created, or truncated when it already exists, as soon as the sink is. Dropping
/// a sink without [`finish`](UploadSink::finish) or [`abort`](UploadSink::abort) may lose
/// buffered bytes.
#[derive(Debug)]
pub struct UploadSink {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl UploadSink {
    pub async fn create(root: &Path, filename: &str) -> Result<Self, UploadError> {
        let name = sanitize_filename(filename).ok_or_else(|| UploadError::invalid_filename(filename))?;
        let path = root.join(name);

        let file = File::create(&path).await.map_err(|e| UploadError::filesystem(&path, e))?;
        debug!(path = %path.display(), "created upload file");

        Ok(Self { path, writer: BufWriter::new(file), written: 0 })
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), UploadError> {
        self.writer.write_all(chunk).await.map_err(|e| UploadError::filesystem(&self.path, e))?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    pub async fn finish(mut self) -> Result<StoredFile, UploadError> {
        self.writer.flush().await.map_err(|e| UploadError::filesystem(&self.path, e))?;
        Ok(StoredFile { path: self.path, size: self.written })
    }

    /// Flushes what was received so far and leaves the partial file in place.
    pub async fn abort(mut self) {
        if let Err(e) = self.writer.flush().await {
            warn!(path = %self.path.display(), cause = %e, "failed to flush partial upload");
        }
        warn!(path = %self.path.display(), written = self.written, "upload aborted, partial file kept");
    }
}

/// Copies the payload of an already parsed part into `root`.
///
/// The file is only created here, so a request rejected while reading the part headers never
/// touches the directory.
pub async fn store<R>(root: &Path, reader: &mut MultipartReader<R>, header: &PartHeader) -> Result<StoredFile, UploadError>
where
    R: AsyncBufRead + Unpin,
{
    let mut sink = UploadSink::create(root, header.filename()).await?;

    loop {
        let chunk = match reader.next_chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => return sink.finish().await,
            Err(e) => {
                sink.abort().await;
                return Err(e);
            }
        };

        if let Err(e) = sink.write_chunk(&chunk).await {
            sink.abort().await;
            return Err(e);
        }
    }
}
