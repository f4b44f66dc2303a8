use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), OutputError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| OutputError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(OutputError::OutputDir(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| OutputError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// A rendered document on its way to `target`.
///
/// Bytes go to a temp file next to the target. [`OutputFile::commit`]
/// renames it into place; dropping an uncommitted file deletes it, so a
/// failed render never leaves a partial document behind.
pub struct OutputFile {
    target: PathBuf,
    writer: BufWriter<NamedTempFile>,
}

impl OutputFile {
    pub fn create(target: &Path) -> Result<Self, OutputError> {
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        ensure_output_dir(dir)?;
        let tmp = tempfile::Builder::new()
            .prefix(".digester-")
            .suffix(".partial")
            .tempfile_in(dir)?;
        Ok(Self {
            target: target.to_path_buf(),
            writer: BufWriter::new(tmp),
        })
    }

    pub fn writer(&mut self) -> &mut (dyn Write + Send) {
        &mut self.writer
    }

    pub fn commit(self) -> Result<PathBuf, OutputError> {
        let tmp = self
            .writer
            .into_inner()
            .map_err(|err| OutputError::Io(err.into_error()))?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.target)
            .map_err(|err| OutputError::Io(err.error))?;
        Ok(self.target)
    }
}
