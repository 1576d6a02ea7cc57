//! Document Preprocessors
//!
//! Converts downloaded report documents into positioned page text that the
//! document locator and table extractors work on.
//!
//! ## Architecture
//!
//! ```text
//! PDF bytes
//!     ↓
//! [PdfBackend]            (pdf-extract text layout)
//!     ↓
//! Positioned XHTML        (pages → spans with data-bbox)
//!     ↓
//! [xhtml_parser]
//!     ↓
//! PreprocessorOutput      (Vec<PageLayout>)
//! ```
//!
//! HTML reports skip this layer; the locator reads their tables directly.

pub mod traits;
pub mod pdf;

// Re-export main types
pub use traits::Preprocessor;
pub use pdf::{PdfBackend, PdfBackendImpl, PdfPreprocessor, TextLayoutBackend};
