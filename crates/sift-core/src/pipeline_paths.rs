//! Landing-zone path layout for the conditioning pipeline.
//!
//! All objects the pipeline touches live under one filesystem namespace with
//! two directories: `{filesystem}/{raw}/` for newly arrived files and
//! `{filesystem}/{conditioned}/` for published output. A conditioned object
//! keeps the raw file's name, so the mapping between the two is always
//! recoverable from the path alone.
//!
//! Path construction validates every segment up front. File names arrive from
//! an external trigger and are treated as untrusted input: separators,
//! traversal segments, and control characters are rejected before any storage
//! call is made.

use crate::error::{Error, Result};

/// The raw/conditioned landing layout under a filesystem namespace.
#[derive(Debug, Clone)]
pub struct PipelinePaths {
    filesystem: String,
    raw_dir: String,
    conditioned_dir: String,
}

impl PipelinePaths {
    /// Creates a layout from the filesystem namespace and its two directories.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if any segment is empty, contains path
    /// separators or control characters, or is a traversal segment. The raw
    /// and conditioned directories must differ, otherwise publish would
    /// collide with the file it is conditioning.
    pub fn new(
        filesystem: impl Into<String>,
        raw_dir: impl Into<String>,
        conditioned_dir: impl Into<String>,
    ) -> Result<Self> {
        let filesystem = filesystem.into();
        let raw_dir = raw_dir.into();
        let conditioned_dir = conditioned_dir.into();

        validate_segment(&filesystem, "filesystem")?;
        validate_segment(&raw_dir, "raw directory")?;
        validate_segment(&conditioned_dir, "conditioned directory")?;
        if raw_dir == conditioned_dir {
            return Err(Error::InvalidInput(
                "raw and conditioned directories must differ".to_string(),
            ));
        }

        Ok(Self {
            filesystem,
            raw_dir,
            conditioned_dir,
        })
    }

    /// The filesystem namespace all paths live under.
    #[must_use]
    pub fn filesystem(&self) -> &str {
        &self.filesystem
    }

    /// Object path of a raw file with the given name.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `name` is not a plain file name.
    pub fn raw(&self, name: &str) -> Result<String> {
        validate_segment(name, "file name")?;
        Ok(format!("{}/{}/{name}", self.filesystem, self.raw_dir))
    }

    /// Object path of the conditioned counterpart of the given name.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `name` is not a plain file name.
    pub fn conditioned(&self, name: &str) -> Result<String> {
        validate_segment(name, "file name")?;
        Ok(format!("{}/{}/{name}", self.filesystem, self.conditioned_dir))
    }
}

fn validate_segment(segment: &str, field: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(Error::InvalidInput(format!("{field} cannot be empty")));
    }
    if segment.contains('/') || segment.contains('\\') {
        return Err(Error::InvalidInput(format!(
            "{field} cannot contain path separators: {segment}"
        )));
    }
    if segment == "." || segment == ".." {
        return Err(Error::InvalidInput(format!(
            "{field} cannot be a traversal segment: {segment}"
        )));
    }
    if segment.contains('\n') || segment.contains('\r') || segment.contains('\0') {
        return Err(Error::InvalidInput(format!(
            "{field} cannot contain control characters"
        )));
    }
    Ok(())
}
