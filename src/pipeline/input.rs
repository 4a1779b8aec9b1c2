//! Input validation and PDF download.
//!
//! The URL is checked for a `.pdf` suffix before anything touches the
//! network; the download itself sits behind [`PdfFetcher`] so the
//! orchestrator can be driven without a live HTTP server.

use crate::error::PaperNotesError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

/// Suffixes accepted as a PDF document URL.
const PDF_SUFFIXES: &[&str] = &[".pdf"];

/// Check that `url` names a PDF document.
///
/// The query string and fragment are ignored, and the comparison is
/// case-insensitive (`paper.PDF?download=1` is accepted).
pub fn check_pdf_url(url: &str) -> Result<(), PaperNotesError> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let lower = path.to_ascii_lowercase();
    if PDF_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
        Ok(())
    } else {
        Err(PaperNotesError::UnsupportedInput {
            input: url.to_string(),
        })
    }
}

/// Source of raw PDF bytes.
#[async_trait]
pub trait PdfFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PaperNotesError>;
}

/// Downloads PDFs over HTTP(S) with `reqwest`.
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, PaperNotesError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PaperNotesError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }
}

#[async_trait]
impl PdfFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PaperNotesError> {
        info!("Downloading PDF from: {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                format!("timed out after {}s", self.timeout_secs)
            } else {
                e.to_string()
            };
            PaperNotesError::DownloadFailed {
                url: url.to_string(),
                reason,
            }
        })?;

        if !response.status().is_success() {
            return Err(PaperNotesError::DownloadFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PaperNotesError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        check_pdf_magic(&bytes)?;
        debug!("Downloaded {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }
}

/// Reject buffers that do not start with the `%PDF` header.
pub fn check_pdf_magic(bytes: &[u8]) -> Result<(), PaperNotesError> {
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let head: Vec<u8> = bytes.iter().take(4).copied().collect();
        return Err(PaperNotesError::InvalidFormat {
            detail: format!("missing %PDF header, first bytes: {head:?}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_pdf_urls() {
        assert!(check_pdf_url("https://example.org/paper.pdf").is_ok());
        assert!(check_pdf_url("https://arxiv.org/pdf/1706.03762v7.PDF").is_ok());
        assert!(check_pdf_url("https://example.org/paper.pdf?download=1").is_ok());
        assert!(check_pdf_url("https://example.org/paper.pdf#page=2").is_ok());
    }

    #[test]
    fn rejects_other_urls() {
        for url in [
            "https://arxiv.org/abs/1706.03762",
            "https://example.org/paper.pdf.html",
            "",
        ] {
            assert!(
                matches!(
                    check_pdf_url(url),
                    Err(PaperNotesError::UnsupportedInput { .. })
                ),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn pdf_magic() {
        assert!(check_pdf_magic(b"%PDF-1.7\n").is_ok());
        assert!(matches!(
            check_pdf_magic(b"<html>"),
            Err(PaperNotesError::InvalidFormat { .. })
        ));
        assert!(check_pdf_magic(b"").is_err());
    }
}
