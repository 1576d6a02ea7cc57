// Preprocessor abstraction for document processing
//
// This module defines the boundary between document decoding (PDF -> positioned
// text) and table work (positioned text -> rows). Everything after this point is
// format-agnostic and works on PageLayouts.

use crate::types::*;
use anyhow::{Context, Result};
use std::path::Path;

/// Preprocessor trait - converts documents to positioned page text
///
/// The preprocessing happens in two clear steps:
/// 1. Document -> Markup Language (PDF -> positioned XHTML)
/// 2. Markup Language -> PreprocessorOutput (pages of text spans)
///
/// Splitting the steps lets tests and `--dump-stages` inject or capture the
/// markup without a real PDF.
pub trait Preprocessor: Send + Sync {
    /// Step 1: Convert document bytes to markup
    fn parse_pdf_to_markup_language(&self, pdf_bytes: &[u8]) -> Result<String>;

    /// Step 2: Convert markup to structured output
    fn parse_markup_to_preprocessor_output(&self, markup: &str) -> Result<PreprocessorOutput>;

    /// Full document processing (combines both steps)
    fn process(&self, pdf_bytes: &[u8]) -> Result<PreprocessorOutput> {
        let markup = self.parse_pdf_to_markup_language(pdf_bytes)?;
        self.parse_markup_to_preprocessor_output(&markup)
    }

    /// Reads file and processes the bytes
    fn process_file(&self, input: &Path) -> Result<PreprocessorOutput> {
        let pdf_bytes =
            std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
        self.process(&pdf_bytes)
    }

    /// Get preprocessor name for debugging/logging
    fn name(&self) -> &str;
}
