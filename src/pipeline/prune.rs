//! Page pruning: delete unwanted pages from a PDF byte buffer.
//!
//! ## Index shift
//!
//! Page numbers are 1-based and refer to the *original* document. Deleting
//! a page shifts every later page down by one, so the k-th deletion (counted
//! from 0, in ascending page order) lands on 0-based index `(page - 1) - k`.
//! [`plan_removals`] sorts and de-duplicates the request first, which makes
//! the result independent of the order the caller listed the pages in.
//!
//! Every index is validated against the page count before the first page is
//! removed, and the pruned bytes are only returned once the whole plan has
//! been applied to an in-memory copy. A failure never yields partial output.

use crate::error::PaperNotesError;
use crate::pipeline::input::check_pdf_magic;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Turn 1-based original page numbers into the sequence of 0-based indices
/// to delete, one after the other, from the shrinking document.
///
/// # Errors
/// [`PaperNotesError::OutOfRange`] if any page is 0 or greater than
/// `total_pages`.
pub fn plan_removals(pages: &[usize], total_pages: usize) -> Result<Vec<usize>, PaperNotesError> {
    let mut sorted = pages.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    if let Some(&bad) = sorted.iter().find(|&&p| p == 0 || p > total_pages) {
        return Err(PaperNotesError::OutOfRange {
            page: bad,
            total: total_pages,
        });
    }

    Ok(sorted
        .iter()
        .enumerate()
        .map(|(removed, &page)| (page - 1) - removed)
        .collect())
}

/// Removes pages from a PDF.
#[async_trait]
pub trait PagePruner: Send + Sync {
    /// Return a copy of `pdf` without the given 1-based pages.
    ///
    /// An empty `pages` list returns the input unchanged.
    async fn prune(&self, pdf: &[u8], pages: &[usize]) -> Result<Vec<u8>, PaperNotesError>;
}

/// [`PagePruner`] backed by pdfium.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumPruner;

#[async_trait]
impl PagePruner for PdfiumPruner {
    async fn prune(&self, pdf: &[u8], pages: &[usize]) -> Result<Vec<u8>, PaperNotesError> {
        prune_pages(pdf, pages).await
    }
}

/// Delete `pages` (1-based, original numbering) from `pdf`.
///
/// Runs on the blocking pool; pdfium is synchronous.
pub async fn prune_pages(pdf: &[u8], pages: &[usize]) -> Result<Vec<u8>, PaperNotesError> {
    if pages.is_empty() {
        return Ok(pdf.to_vec());
    }
    check_pdf_magic(pdf)?;

    let bytes = pdf.to_vec();
    let pages = pages.to_vec();
    tokio::task::spawn_blocking(move || prune_blocking(&bytes, &pages))
        .await
        .map_err(|e| PaperNotesError::Internal(format!("Prune task panicked: {e}")))?
}

/// Bind to the pdfium shared library, downloading it on first use.
pub fn bind_pdfium() -> Result<Pdfium, PaperNotesError> {
    pdfium_auto::bind_pdfium_silent()
        .map_err(|e| PaperNotesError::Internal(format!("Failed to bind pdfium: {e}")))
}

fn prune_blocking(pdf: &[u8], pages: &[usize]) -> Result<Vec<u8>, PaperNotesError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(pdf, None)
        .map_err(|e| PaperNotesError::InvalidFormat {
            detail: format!("{e:?}"),
        })?;

    let total_pages = document.pages().len() as usize;
    let plan = plan_removals(pages, total_pages)?;
    info!(
        "Removing {} of {} pages: {:?}",
        plan.len(),
        total_pages,
        pages
    );

    for index in plan {
        let page = document
            .pages()
            .get(index as u16)
            .map_err(|e| PaperNotesError::InvalidFormat {
                detail: format!("page index {index}: {e:?}"),
            })?;
        page.delete().map_err(|e| PaperNotesError::InvalidFormat {
            detail: format!("delete page index {index}: {e:?}"),
        })?;
        debug!("Deleted page at index {}", index);
    }

    document
        .save_to_bytes()
        .map_err(|e| PaperNotesError::InvalidFormat {
            detail: format!("save: {e:?}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascending_pages_shift_down() {
        // Deleting 2 then 4 from [1,2,3,4,5]: index 1, then index 2 of [1,3,4,5].
        assert_eq!(plan_removals(&[2, 4], 5).unwrap(), vec![1, 2]);
    }

    #[test]
    fn order_of_request_does_not_matter() {
        assert_eq!(
            plan_removals(&[4, 2], 5).unwrap(),
            plan_removals(&[2, 4], 5).unwrap()
        );
        assert_eq!(plan_removals(&[5, 1, 3], 5).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn duplicates_are_removed_once() {
        assert_eq!(plan_removals(&[3, 3, 1], 4).unwrap(), vec![0, 1]);
    }

    #[test]
    fn every_page_can_be_removed() {
        assert_eq!(plan_removals(&[1, 2, 3], 3).unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn page_past_end_is_out_of_range() {
        let err = plan_removals(&[2, 6], 5).unwrap_err();
        assert!(matches!(
            err,
            PaperNotesError::OutOfRange { page: 6, total: 5 }
        ));
    }

    #[test]
    fn page_zero_is_out_of_range() {
        assert!(matches!(
            plan_removals(&[0], 5),
            Err(PaperNotesError::OutOfRange { page: 0, .. })
        ));
    }

    #[test]
    fn empty_request_is_identity_without_parsing() {
        // Not a PDF at all: an empty request must not even look at the bytes.
        let input = b"definitely not a pdf".to_vec();
        let out = tokio_test::block_on(prune_pages(&input, &[])).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn garbage_is_invalid_format() {
        let err = tokio_test::block_on(prune_pages(b"<html></html>", &[1])).unwrap_err();
        assert!(matches!(err, PaperNotesError::InvalidFormat { .. }));
    }
}
