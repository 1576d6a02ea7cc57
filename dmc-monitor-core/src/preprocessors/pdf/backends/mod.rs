//! PDF Backend trait
//!
//! Defines the interface that all PDF extraction backends must implement.
//! All backends produce the same positioned XHTML intermediate format.

use anyhow::Result;

/// Backend trait for PDF extraction
///
/// All backends must produce the same XHTML format with:
/// - `<div class="page" data-page="N">` per page, in page order
/// - `<span class="t" data-bbox="x,y,w,h" data-line="L" data-segment="S">` per text run,
///   coordinates in points with a top-left origin
/// - Document metadata in `<meta>` tags (optional)
///
/// This allows the XHTML parser to be shared across all backends.
pub trait PdfBackend: Send + Sync {
    /// Extract PDF bytes to positioned XHTML
    fn extract_to_xhtml(&self, pdf_bytes: &[u8]) -> Result<String>;

    /// Backend identifier for logging/debugging
    fn name(&self) -> &str;

    /// Check if backend is healthy/ready
    fn is_healthy(&self) -> bool;
}

pub mod text_layout;

pub use text_layout::TextLayoutBackend;
