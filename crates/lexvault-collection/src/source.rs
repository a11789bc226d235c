//! Uploaded source files and archive expansion.

use std::fmt;
use std::io::{Cursor, Read};
use std::pin::Pin;

use bytes::Bytes;
use lexvault_core::{Error, Result};
use lexvault_storage::path;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::TRACING_TARGET_SOURCE;

const ARCHIVE_EXTENSION: &str = ".zip";
const ARCHIVE_METADATA_DIR: &str = "__MACOSX/";

/// A named byte stream handed over by an upload.
pub struct SourceFile {
    name: String,
    reader: Pin<Box<dyn AsyncRead + Send>>,
}

impl SourceFile {
    /// Wraps a streamed upload named `name`.
    pub fn new(name: impl Into<String>, reader: impl AsyncRead + Send + 'static) -> Self {
        Self {
            name: name.into(),
            reader: Box::pin(reader),
        }
    }

    /// Wraps an in-memory upload.
    pub fn from_bytes(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self::new(name, Cursor::new(content.into()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the file is an archive whose entries are staged instead.
    pub fn is_archive(&self) -> bool {
        self.name.to_ascii_lowercase().ends_with(ARCHIVE_EXTENSION)
    }

    /// Drains the reader into `(file name, content)` pairs ready to stage.
    ///
    /// Archives are flattened one level: every entry is staged under the
    /// last component of its path. Two entries flattening to the same name
    /// are rejected with [`InvalidInput`](lexvault_core::ErrorKind::InvalidInput).
    pub(crate) async fn expand(mut self) -> Result<Vec<(String, Bytes)>> {
        let mut buffer = Vec::new();
        self.reader.read_to_end(&mut buffer).await?;

        if !self.is_archive() {
            let name = path::sanitize_file_name(&self.name)?;
            return Ok(vec![(name, Bytes::from(buffer))]);
        }

        let entries = tokio::task::spawn_blocking(move || expand_zip(&buffer))
            .await
            .map_err(|err| {
                Error::io()
                    .with_message("archive expansion task failed")
                    .with_source(err)
            })??;

        tracing::debug!(
            target: TRACING_TARGET_SOURCE,
            archive = %self.name,
            entries = entries.len(),
            "Archive expanded"
        );
        Ok(entries)
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn archive_error(err: zip::result::ZipError) -> Error {
    Error::invalid_input()
        .with_message("malformed zip archive")
        .with_source(err)
}

fn expand_zip(bytes: &[u8]) -> Result<Vec<(String, Bytes)>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(archive_error)?;
    let mut entries = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(archive_error)?;
        if entry.is_dir() || entry.name().starts_with(ARCHIVE_METADATA_DIR) {
            continue;
        }

        let name = path::sanitize_file_name(entry.name())?;
        if entries.iter().any(|(staged, _)| *staged == name) {
            return Err(Error::invalid_input()
                .with_message(format!("archive holds more than one entry named '{name}'")));
        }
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        entries.push((name, Bytes::from(content)));
    }

    Ok(entries)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use lexvault_core::ErrorKind;
    use zip::write::SimpleFileOptions;

    use super::*;

    pub(crate) fn zip_of(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[tokio::test]
    async fn plain_file_is_staged_verbatim() {
        let file = SourceFile::from_bytes("uploads/Order 12.pdf", &b"%PDF"[..]);
        assert!(!file.is_archive());

        let staged = file.expand().await.unwrap();
        assert_eq!(staged, vec![("Order 12.pdf".to_string(), Bytes::from_static(b"%PDF"))]);
    }

    #[tokio::test]
    async fn archive_entries_are_flattened() {
        let archive = zip_of(&[
            ("acts/ipc.txt", b"ipc"),
            ("crpc.txt", b"crpc"),
            ("__MACOSX/._crpc.txt", b"junk"),
        ]);
        let file = SourceFile::from_bytes("Bundle.ZIP", archive);
        assert!(file.is_archive());

        let staged = file.expand().await.unwrap();
        assert_eq!(
            staged,
            vec![
                ("ipc.txt".to_string(), Bytes::from_static(b"ipc")),
                ("crpc.txt".to_string(), Bytes::from_static(b"crpc")),
            ]
        );
    }

    #[tokio::test]
    async fn clashing_entry_names_are_rejected() {
        let archive = zip_of(&[("a/x.txt", b"first"), ("b/x.txt", b"second"), ("y.txt", b"y")]);
        let err = SourceFile::from_bytes("bundle.zip", archive).expand().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn corrupt_archive_is_rejected() {
        let file = SourceFile::from_bytes("broken.zip", &b"not a zip"[..]);
        let err = file.expand().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
