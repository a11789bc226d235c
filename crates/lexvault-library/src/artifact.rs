//! Typed addressing of the blobs stored for a document.

use lexvault_core::{Error, Result};
use lexvault_storage::path;

use crate::metadata::DocumentFormat;

pub(crate) const METADATA_FILE: &str = "metadata.json";
pub(crate) const SECTIONS_FILE: &str = "sections.json";
pub(crate) const PIPELINE_DIR: &str = "__pipeline__";
pub(crate) const SUPPORT_DIR: &str = "__support__";
pub(crate) const TASK_DIR: &str = "__task__";

/// State file kept per pipeline.
pub const PIPELINE_STATE_FILE: &str = "state.json";

/// Supporting file whose public URL doubles as the document thumbnail.
pub const THUMBNAIL_FILE: &str = "thumbnail.png";

/// A role a stored blob plays for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact<'a> {
    /// Primary content; `None` (or `Default`) uses the format in metadata.
    Content { format: Option<DocumentFormat> },
    /// `metadata.json`.
    Metadata,
    /// `sections.json`.
    Sections,
    /// A file owned by a named pipeline.
    Pipeline { pipeline: &'a str, file: &'a str },
    /// A supporting file such as a thumbnail.
    Supporting { file: &'a str },
    /// A file exchanged with a named task.
    Task { task: &'a str, file: &'a str },
}

impl<'a> Artifact<'a> {
    /// Content in the format recorded in metadata.
    pub fn content() -> Self {
        Self::Content { format: None }
    }

    /// Content in a specific rendition.
    pub fn content_as(format: DocumentFormat) -> Self {
        Self::Content {
            format: Some(format),
        }
    }

    /// File `file` in the state folder of pipeline `pipeline`.
    pub fn pipeline(pipeline: &'a str, file: &'a str) -> Self {
        Self::Pipeline { pipeline, file }
    }

    /// Supporting file `file` (thumbnail, extracted text, ...).
    pub fn supporting(file: &'a str) -> Self {
        Self::Supporting { file }
    }

    /// File `file` exchanged with the task manager handling `task`.
    pub fn task(task: &'a str, file: &'a str) -> Self {
        Self::Task { task, file }
    }

    /// The explicitly requested content format, if resolving needs no metadata.
    pub fn explicit_format(&self) -> Option<DocumentFormat> {
        match self {
            Self::Content { format } => format.filter(|format| *format != DocumentFormat::Default),
            _ => None,
        }
    }

    /// Whether resolving this artifact needs the format stored in metadata.
    pub fn needs_recorded_format(&self) -> bool {
        matches!(self, Self::Content { .. }) && self.explicit_format().is_none()
    }

    /// Resolves the path relative to the library root.
    ///
    /// `recorded_format` is only consulted for content without an explicit
    /// format. Pipeline and task artifacts without a name fail with
    /// [`InvalidAddressing`](lexvault_core::ErrorKind::InvalidAddressing).
    pub fn resolve(&self, doc_id: &str, recorded_format: DocumentFormat) -> Result<String> {
        path::validate_segment(doc_id)?;

        let relative = match *self {
            Self::Content { .. } => {
                let format = self.explicit_format().unwrap_or(recorded_format);
                format!("{doc_id}.{}", format.extension())
            }
            Self::Metadata => METADATA_FILE.to_string(),
            Self::Sections => SECTIONS_FILE.to_string(),
            Self::Pipeline { pipeline, file } => {
                let pipeline = required("pipeline", pipeline, file)?;
                nested(&[PIPELINE_DIR, pipeline], file)?
            }
            Self::Supporting { file } => nested(&[SUPPORT_DIR], file)?,
            Self::Task { task, file } => {
                let task = required("task", task, file)?;
                nested(&[TASK_DIR, task], file)?
            }
        };

        Ok(path::join(doc_id, &relative))
    }
}

fn required<'n>(what: &str, name: &'n str, file: &str) -> Result<&'n str> {
    if name.trim().is_empty() {
        return Err(Error::invalid_addressing()
            .with_message(format!("{what} name must be provided for {what} file '{file}'")));
    }
    path::validate_segment(name)?;
    Ok(name)
}

fn nested(dirs: &[&str], file: &str) -> Result<String> {
    if file.is_empty() {
        return Err(Error::invalid_addressing().with_message("file name must be provided"));
    }
    path::validate_relative(file)?;
    Ok(dirs.iter().fold(String::new(), |acc, dir| path::join(&acc, dir)) + "/" + file)
}
