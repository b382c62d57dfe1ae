// src/storage.rs

use eyre::{eyre, Result, WrapErr};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Destination for archived PDFs and extracted attachments.
pub trait ArtifactWriter {
    /// Write an attachment under its own filename, returning where it landed.
    fn write_attachment(&mut self, filename: &str, payload: &[u8]) -> Result<PathBuf>;

    /// Write a rendered conversation as `{stem}.pdf`.
    fn write_pdf(&mut self, stem: &str, pdf: &[u8]) -> Result<PathBuf>;
}

/// Writes artifacts into one flat output directory; same names overwrite.
#[derive(Debug, Clone)]
pub struct FsWriter {
    output_dir: PathBuf,
}

impl FsWriter {
    pub fn new(output_dir: &Path) -> Result<Self> {
        fs::create_dir_all(output_dir)
            .wrap_err_with(|| format!("Failed to create output directory {}", output_dir.display()))?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.output_dir.join(name);
        fs::write(&path, bytes).wrap_err_with(|| format!("Failed to write {}", path.display()))?;
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }
}

impl ArtifactWriter for FsWriter {
    fn write_attachment(&mut self, filename: &str, payload: &[u8]) -> Result<PathBuf> {
        // only the final component, so "../x" cannot leave the output directory
        let name = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| eyre!("Attachment has no usable filename: {:?}", filename))?;
        self.write(name, payload)
    }

    fn write_pdf(&mut self, stem: &str, pdf: &[u8]) -> Result<PathBuf> {
        self.write(&format!("{}.pdf", stem), pdf)
    }
}
