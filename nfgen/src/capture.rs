//! Capture file of emitted PDUs.
//!
//! Each PDU that reached the socket is appended verbatim, without framing. A
//! capture can be split back into PDUs by reading each header's record count.

use std::{
    io,
    path::{Path, PathBuf},
};

use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
};

/// Errors produced by [`CaptureFile`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The capture file could not be opened or written
    #[error("Capture file {path:?} failed: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: Box<io::Error>,
    },
}

#[derive(Debug)]
/// Append-only sink for emitted PDUs
pub struct CaptureFile {
    path: PathBuf,
    file: File,
}

impl CaptureFile {
    /// Create the file at `path`, truncating anything already there.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be created.
    pub async fn create(path: &Path) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(path)
            .await
            .map_err(|source| Error::Io {
                path: path.to_path_buf(),
                source: Box::new(source),
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Append one PDU and flush it through to the file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the write or flush fails.
    pub async fn write(&mut self, pdu: &[u8]) -> Result<(), Error> {
        let result = match self.file.write_all(pdu).await {
            Ok(()) => self.file.flush().await,
            Err(err) => Err(err),
        };
        result.map_err(|source| Error::Io {
            path: self.path.clone(),
            source: Box::new(source),
        })
    }

    /// Location of the capture
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_in_order_and_truncates() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("capture.bin");
        std::fs::write(&path, b"stale contents from an earlier run").expect("seed file");

        let mut capture = CaptureFile::create(&path).await.expect("create capture");
        assert_eq!(capture.path(), path.as_path());
        capture.write(&[0, 5, 0, 1]).await.expect("first write");
        capture.write(&[0, 5, 0, 2]).await.expect("second write");

        let contents = std::fs::read(&path).expect("read capture");
        assert_eq!(contents, vec![0, 5, 0, 1, 0, 5, 0, 2]);
    }

    #[tokio::test]
    async fn missing_directory_reported_with_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("absent").join("capture.bin");
        match CaptureFile::create(&path).await {
            Err(Error::Io { path: reported, .. }) => assert_eq!(reported, path),
            Ok(_) => panic!("capture created in a missing directory"),
        }
    }
}
