//! Text-layout PDF backend
//!
//! Uses pdf-extract's per-page plain text, which preserves the horizontal
//! spacing of table rows, and lays it out on a fixed character grid: column
//! offset becomes x, line index becomes y. Runs of two or more spaces split a
//! line into separate spans so that table cells stay apart.

use super::PdfBackend;
use anyhow::{anyhow, Result};

/// Width of one grid column in points
pub const CHAR_WIDTH: f32 = 5.0;
/// Distance between grid lines in points
pub const LINE_HEIGHT: f32 = 12.0;
/// Height of a span box in points
pub const GLYPH_HEIGHT: f32 = 10.0;

#[derive(Debug, Default, Clone)]
pub struct TextLayoutBackend;

impl TextLayoutBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PdfBackend for TextLayoutBackend {
    fn extract_to_xhtml(&self, pdf_bytes: &[u8]) -> Result<String> {
        let pages = pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
            .map_err(|e| anyhow!("PDF text extraction failed: {}", e))?;
        tracing::debug!(pages = pages.len(), "pdf-extract returned page text");
        Ok(pages_to_xhtml(&pages))
    }

    fn name(&self) -> &str {
        "text-layout"
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

/// Render plain page texts as positioned XHTML
pub fn pages_to_xhtml(pages: &[String]) -> String {
    let mut xhtml = String::from("<html xmlns=\"http://www.w3.org/1999/xhtml\">\n<head>\n");
    xhtml.push_str(&format!(
        "<meta name=\"xmpTPg:NPages\" content=\"{}\"/>\n",
        pages.len()
    ));
    xhtml.push_str("</head>\n<body>\n");

    for (index, page_text) in pages.iter().enumerate() {
        xhtml.push_str(&format!("<div class=\"page\" data-page=\"{}\">\n", index + 1));
        let mut line_number = 0u32;
        for line in page_text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let y = line_number as f32 * LINE_HEIGHT;
            for (segment, (column, text)) in split_segments(line).into_iter().enumerate() {
                let x = column as f32 * CHAR_WIDTH;
                let width = text.chars().count() as f32 * CHAR_WIDTH;
                xhtml.push_str(&format!(
                    "<span class=\"t\" data-bbox=\"{x:.1},{y:.1},{width:.1},{GLYPH_HEIGHT:.1}\" data-line=\"{line_number}\" data-segment=\"{segment}\">{}</span>\n",
                    escape_text(&text)
                ));
            }
            line_number += 1;
        }
        xhtml.push_str("</div>\n");
    }

    xhtml.push_str("</body>\n</html>\n");
    xhtml
}

/// Split a line at runs of 2+ whitespace chars, returning (char column, text)
fn split_segments(line: &str) -> Vec<(usize, String)> {
    let chars: Vec<char> = line.chars().map(|c| if c == '\t' { ' ' } else { c }).collect();
    let mut segments = Vec::new();
    let mut start: Option<usize> = None;
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == ' ' {
            let run_end = chars[i..].iter().take_while(|c| **c == ' ').count() + i;
            if run_end - i >= 2 || run_end == chars.len() {
                if let Some(s) = start.take() {
                    segments.push((s, chars[s..i].iter().collect()));
                }
            }
            i = run_end;
            continue;
        }
        if start.is_none() {
            start = Some(i);
        }
        i += 1;
    }
    if let Some(s) = start {
        segments.push((s, chars[s..].iter().collect()));
    }

    segments
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
