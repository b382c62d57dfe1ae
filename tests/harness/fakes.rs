// tests/harness/fakes.rs
//
// Stand-ins for the PDF renderer and the artifact writer.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use eyre::{eyre, Result};
use imap_archive::render::{RenderError, Renderer};
use imap_archive::storage::{ArtifactWriter, FsWriter};

/// Any body containing this marker fails to render.
pub const RENDER_FAIL_MARKER: &str = "<!-- render-fail -->";

/// "Renders" by prefixing a PDF magic line to the HTML, so tests can read back what was rendered.
#[derive(Clone, Default)]
pub struct FakeRenderer {
    rendered: Arc<RwLock<Vec<String>>>,
    /// Fail every render, as when the renderer is missing or broken.
    outage: bool,
}

impl FakeRenderer {
    pub fn new(rendered: Arc<RwLock<Vec<String>>>, outage: bool) -> Self {
        Self { rendered, outage }
    }
}

impl Renderer for FakeRenderer {
    fn render(&self, html: &str) -> Result<Vec<u8>, RenderError> {
        if self.outage {
            return Err(RenderError::EmptyOutput);
        }
        if html.contains(RENDER_FAIL_MARKER) {
            return Err(RenderError::Failed {
                status: "exit status: 1".to_string(),
                stderr: "Exit with code 1 due to network error: HostNotFoundError".to_string(),
            });
        }
        self.rendered.write().unwrap().push(html.to_string());
        Ok(format!("%PDF-fake\n{}", html).into_bytes())
    }
}

/// `FsWriter` that refuses to write one chosen attachment name, or any PDF.
pub struct FlakyWriter {
    inner: FsWriter,
    fail_on: Option<String>,
    fail_pdf: bool,
}

impl FlakyWriter {
    pub fn new(dir: &Path, fail_on: Option<String>, fail_pdf: bool) -> Self {
        Self {
            inner: FsWriter::new(dir).unwrap(),
            fail_on,
            fail_pdf,
        }
    }
}

impl ArtifactWriter for FlakyWriter {
    fn write_attachment(&mut self, filename: &str, payload: &[u8]) -> Result<PathBuf> {
        if self.fail_on.as_deref() == Some(filename) {
            return Err(eyre!("No space left on device (os error 28)"));
        }
        self.inner.write_attachment(filename, payload)
    }

    fn write_pdf(&mut self, stem: &str, pdf: &[u8]) -> Result<PathBuf> {
        if self.fail_pdf {
            return Err(eyre!("Read-only file system (os error 30): {}.pdf", stem));
        }
        self.inner.write_pdf(stem, pdf)
    }
}
