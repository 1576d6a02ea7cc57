//! PDF Preprocessor
//!
//! Main preprocessor for PDF reports. Uses pluggable backends to extract
//! PDF content to positioned XHTML, then parses into PreprocessorOutput.

pub mod backends;
pub mod xhtml_parser;

use crate::preprocessors::traits::Preprocessor;
use crate::types::*;
use anyhow::Result;

pub use backends::{PdfBackend, TextLayoutBackend};

/// Backend enum for runtime backend selection
pub enum PdfBackendImpl {
    TextLayout(TextLayoutBackend),
}

impl PdfBackend for PdfBackendImpl {
    fn extract_to_xhtml(&self, pdf_bytes: &[u8]) -> Result<String> {
        match self {
            PdfBackendImpl::TextLayout(backend) => backend.extract_to_xhtml(pdf_bytes),
        }
    }

    fn name(&self) -> &str {
        match self {
            PdfBackendImpl::TextLayout(backend) => backend.name(),
        }
    }

    fn is_healthy(&self) -> bool {
        match self {
            PdfBackendImpl::TextLayout(backend) => backend.is_healthy(),
        }
    }
}

/// PDF Preprocessor with pluggable backend
///
/// Processes PDF documents through two stages:
/// 1. Backend extraction: PDF bytes → positioned XHTML
/// 2. XHTML parsing: positioned XHTML → PreprocessorOutput
pub struct PdfPreprocessor {
    backend: PdfBackendImpl,
}

impl PdfPreprocessor {
    /// Create PdfPreprocessor with the pdf-extract text layout backend
    pub fn new_text_layout() -> Self {
        Self::new_with_backend(PdfBackendImpl::TextLayout(TextLayoutBackend::new()))
    }

    pub fn new_with_backend(backend: PdfBackendImpl) -> Self {
        Self { backend }
    }

    /// Get the backend name for logging
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Check if the backend is healthy
    pub fn is_healthy(&self) -> bool {
        self.backend.is_healthy()
    }
}

impl Default for PdfPreprocessor {
    fn default() -> Self {
        Self::new_text_layout()
    }
}

impl Preprocessor for PdfPreprocessor {
    /// Step 1: Extract PDF to XHTML via backend
    fn parse_pdf_to_markup_language(&self, pdf_bytes: &[u8]) -> Result<String> {
        self.backend.extract_to_xhtml(pdf_bytes)
    }

    /// Step 2: Parse XHTML to PreprocessorOutput
    fn parse_markup_to_preprocessor_output(&self, markup: &str) -> Result<PreprocessorOutput> {
        xhtml_parser::parse_xhtml(markup)
    }

    fn name(&self) -> &str {
        "PdfPreprocessor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_step_uses_shared_parser() {
        let preprocessor = PdfPreprocessor::new_text_layout();
        assert_eq!(preprocessor.backend_name(), "text-layout");
        assert!(preprocessor.is_healthy());

        let output = preprocessor
            .parse_markup_to_preprocessor_output(
                r#"<div class="page" data-page="3"><span class="t" data-bbox="0,0,10,10" data-line="0" data-segment="0">Level 1</span></div>"#,
            )
            .unwrap();
        assert_eq!(output.pages[0].page, 3);
        assert_eq!(output.pages[0].spans[0].text, "Level 1");
    }
}
