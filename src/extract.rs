//! Uploaded-file content extraction
//!
//! Turns attached files into UTF-8 text for the prompt assembler. Rich
//! formats (word-processor documents, PDFs, images) require parsers that
//! live outside this gateway; attaching one fails that file with
//! `ExtractionFailed` while plain-text kinds pass through.

use crate::error::{ChatgateError, Result};
use async_trait::async_trait;
use std::path::Path;

/// Extensions read directly as UTF-8 text.
const TEXT_KINDS: &[&str] = &["txt", "md", "markdown", "log", "csv", "json", "yaml", "yml"];

/// Extensions recognized but not extractable without an external parser.
const RICH_KINDS: &[&str] = &["doc", "docx", "pdf", "jpg", "jpeg", "png"];

/// Content extractor collaborator contract
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Extract a file's content as UTF-8 text
    ///
    /// # Errors
    ///
    /// Returns `ChatgateError::ExtractionFailed` if the file cannot be
    /// read or its format is unsupported
    async fn extract(&self, path: &Path) -> Result<String>;
}

/// Filesystem-backed extractor for plain-text attachments
#[derive(Debug, Default, Clone)]
pub struct FileExtractor;

#[async_trait]
impl ContentExtractor for FileExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        let display = path.display();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if RICH_KINDS.contains(&ext.as_str()) {
            return Err(ChatgateError::ExtractionFailed(format!(
                "unsupported format .{}: {}",
                ext, display
            ))
            .into());
        }

        if !ext.is_empty() && !TEXT_KINDS.contains(&ext.as_str()) {
            return Err(ChatgateError::ExtractionFailed(format!(
                "unrecognized format .{}: {}",
                ext, display
            ))
            .into());
        }

        tokio::fs::read_to_string(path).await.map_err(|e| {
            ChatgateError::ExtractionFailed(format!("cannot read {}: {}", display, e)).into()
        })
    }
}
