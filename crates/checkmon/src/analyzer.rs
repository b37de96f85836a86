//! AI-assisted content analysis via an external CLI.
//!
//! Checks receive an optional [`Analyzer`] handle; probes that need to
//! interpret fetched content (a PDF, a status page, a screenshot) hand
//! it to the CLI together with a prompt and get the answer back as text.

use common::{Error, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle to the analysis CLI.
pub struct Analyzer {
    cli_path: PathBuf,
}

impl Analyzer {
    /// Use the default CLI binary name, resolved through PATH.
    pub fn new() -> Self {
        Self::with_cli_path("claude")
    }

    /// Use an explicit CLI binary path.
    pub fn with_cli_path(path: impl Into<PathBuf>) -> Self {
        Self {
            cli_path: path.into(),
        }
    }

    /// Analyze arbitrary content.
    ///
    /// Text content is folded into the prompt; binary content (PDF,
    /// image) is written to a temporary file whose path is handed to
    /// the CLI.
    pub async fn analyze(
        &self,
        cancel: &CancellationToken,
        prompt: &str,
        content: &[u8],
    ) -> Result<String> {
        if is_binary(content) {
            let mut file = tempfile::Builder::new()
                .prefix("checkmon-analysis-")
                .suffix(detect_extension(content))
                .tempfile()?;
            file.write_all(content)?;
            file.flush()?;
            return self.run_cli(cancel, prompt, Some(file.path())).await;
        }

        let full_prompt = format!("{}\n\n{}", String::from_utf8_lossy(content), prompt);
        self.run_cli(cancel, &full_prompt, None).await
    }

    /// Analyze text content.
    pub async fn analyze_text(
        &self,
        cancel: &CancellationToken,
        prompt: &str,
        text: &str,
    ) -> Result<String> {
        let full_prompt = format!("{text}\n\n{prompt}");
        self.run_cli(cancel, &full_prompt, None).await
    }

    /// Analyze a file already on disk.
    pub async fn analyze_file(
        &self,
        cancel: &CancellationToken,
        prompt: &str,
        path: &Path,
    ) -> Result<String> {
        self.run_cli(cancel, prompt, Some(path)).await
    }

    async fn run_cli(
        &self,
        cancel: &CancellationToken,
        prompt: &str,
        file: Option<&Path>,
    ) -> Result<String> {
        let mut cmd = Command::new(&self.cli_path);
        cmd.arg("-p").arg(prompt);
        if let Some(path) = file {
            cmd.arg(path);
        }
        cmd.kill_on_drop(true);

        debug!(cli = %self.cli_path.display(), "invoking analysis CLI");

        let output = tokio::select! {
            output = cmd.output() => output?,
            _ = cancel.cancelled() => return Err(Error::check("analysis cancelled")),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::check(format!(
                "analysis CLI exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether content looks binary rather than text.
fn is_binary(content: &[u8]) -> bool {
    if content.len() < 4 {
        return false;
    }

    if content.starts_with(b"%PDF")
        || content.starts_with(&[0x89, 0x50, 0x4E, 0x47])
        || content.starts_with(&[0xFF, 0xD8, 0xFF])
        || content.starts_with(b"GIF87a")
        || content.starts_with(b"GIF89a")
    {
        return true;
    }

    if content.len() >= 12 && &content[0..4] == b"RIFF" && &content[8..12] == b"WEBP" {
        return true;
    }

    // NUL bytes near the start are a strong binary signal.
    content.iter().take(512).any(|b| *b == 0)
}

/// File extension matching the content's signature.
fn detect_extension(content: &[u8]) -> &'static str {
    if content.len() < 4 {
        return ".bin";
    }

    if content.starts_with(b"%PDF") {
        ".pdf"
    } else if content.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        ".png"
    } else if content.starts_with(&[0xFF, 0xD8, 0xFF]) {
        ".jpg"
    } else if content.starts_with(b"GIF87a") || content.starts_with(b"GIF89a") {
        ".gif"
    } else if content.len() >= 12 && &content[0..4] == b"RIFF" && &content[8..12] == b"WEBP" {
        ".webp"
    } else {
        ".bin"
    }
}
