// src/render.rs

use log::{debug, warn};
use std::io::Write;
use std::process::{Command, Stdio};
use thiserror::Error;

use crate::cfg::config::RendererConfig;

/// Why a message body could not be turned into a PDF.
/// Always recoverable: the pipeline logs it and moves on to the next message.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to launch renderer '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("renderer I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("renderer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("renderer produced no PDF output")]
    EmptyOutput,
}

pub trait Renderer {
    fn render(&self, html: &str) -> Result<Vec<u8>, RenderError>;
}

/// Renders by piping HTML through `wkhtmltopdf - -`.
#[derive(Debug, Clone)]
pub struct WkHtmlToPdf {
    command: String,
    args: Vec<String>,
}

impl WkHtmlToPdf {
    pub fn new(command: &str, args: &[String]) -> Self {
        Self {
            command: command.to_string(),
            args: args.to_vec(),
        }
    }

    pub fn from_config(cfg: &RendererConfig) -> Self {
        Self::new(&cfg.command, &cfg.args)
    }
}

impl Renderer for WkHtmlToPdf {
    fn render(&self, html: &str) -> Result<Vec<u8>, RenderError> {
        debug!("Rendering {} bytes of HTML with {} {:?}", html.len(), self.command, self.args);

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RenderError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        // feed stdin from a separate thread so a full stdout pipe cannot deadlock us
        let stdin = child.stdin.take();
        let input = html.as_bytes().to_vec();
        let writer = std::thread::spawn(move || {
            if let Some(mut stdin) = stdin {
                // the renderer may exit without reading everything; its status says why
                let _ = stdin.write_all(&input);
            }
        });

        let output = child.wait_with_output()?;
        let _ = writer.join();

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let is_pdf = output.stdout.starts_with(b"%PDF");

        if output.status.success() && is_pdf {
            return Ok(output.stdout);
        }
        if is_pdf {
            // wkhtmltopdf exits non-zero when an external resource fails to load,
            // but the document it wrote is still complete
            warn!("Renderer exited with {} but produced a PDF: {}", output.status, stderr);
            return Ok(output.stdout);
        }
        if !output.status.success() {
            return Err(RenderError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }
        Err(RenderError::EmptyOutput)
    }
}
