//! Positioned XHTML Parser
//!
//! Parses the positioned XHTML intermediate format produced by PDF backends
//! into PreprocessorOutput. This parser is shared across all PDF backends.
//!
//! The format includes:
//! - Page divs with data-page attributes
//! - Spans with data-bbox, data-line, data-segment attributes
//! - Document metadata in <meta> tags

use crate::types::*;
use anyhow::Result;
use regex::Regex;
use std::sync::LazyLock;

// Pre-compiled regexes for XHTML parsing performance
static PAGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<div class="page"([^>]*)>(.*?)</div>"#).unwrap());

static PAGE_NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"data-page="(\d+)""#).unwrap());

static SPAN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<span[^>]*data-bbox="([^"]*)"[^>]*data-line="([^"]*)"[^>]*>([^<]*)</span>"#)
        .unwrap()
});

static META_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta\s+name="([^"]*)"[^>]*content="([^"]*)"[^>]*/?>"#).unwrap()
});

/// Parse positioned XHTML into PreprocessorOutput
pub fn parse_xhtml(xhtml: &str) -> Result<PreprocessorOutput> {
    let mut metadata = extract_metadata(xhtml);
    let pages = extract_pages(xhtml);

    if metadata.page_count == 0 {
        metadata.page_count = pages.len() as u32;
    }

    tracing::debug!(
        pages = pages.len(),
        spans = pages.iter().map(|p| p.spans.len()).sum::<usize>(),
        "parsed positioned XHTML"
    );

    Ok(PreprocessorOutput { pages, metadata })
}

/// Extract pages and their spans, sorted top to bottom then left to right
fn extract_pages(xhtml: &str) -> Vec<PageLayout> {
    let mut pages = Vec::new();

    for (page_index, page_cap) in PAGE_REGEX.captures_iter(xhtml).enumerate() {
        let page_number = page_cap
            .get(1)
            .and_then(|attrs| PAGE_NUMBER_REGEX.captures(attrs.as_str()))
            .and_then(|cap| cap[1].parse::<u32>().ok())
            .unwrap_or(page_index as u32 + 1);

        let mut spans = Vec::new();
        if let Some(page_content) = page_cap.get(2) {
            for cap in SPAN_REGEX.captures_iter(page_content.as_str()) {
                let text = unescape(cap[3].trim());
                if text.is_empty() {
                    continue;
                }
                let Some(bounding_box) = parse_bbox(&cap[1]) else {
                    continue;
                };
                spans.push(TextSpan {
                    text,
                    page: page_number,
                    bounding_box,
                    line_number: cap[2].parse::<u32>().unwrap_or(0),
                });
            }
        }

        // Sort page elements by spatial position: Y first (top to bottom), then X (left to right)
        spans.sort_by(|a, b| {
            a.bounding_box
                .y
                .total_cmp(&b.bounding_box.y)
                .then_with(|| a.bounding_box.x.total_cmp(&b.bounding_box.x))
        });

        pages.push(PageLayout {
            page: page_number,
            spans,
        });
    }

    pages
}

/// Parse bounding box: "x,y,width,height"
fn parse_bbox(raw: &str) -> Option<BoundingBox> {
    let parts: Vec<f32> = raw
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [x, y, width, height] => Some(BoundingBox {
            x: *x,
            y: *y,
            width: *width,
            height: *height,
        }),
        _ => None,
    }
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Extract metadata from <meta> tags
fn extract_metadata(xhtml: &str) -> DocumentMetadata {
    let mut metadata = DocumentMetadata::default();

    for cap in META_REGEX.captures_iter(xhtml) {
        let content = unescape(&cap[2]);
        match &cap[1] {
            "dc:title" => metadata.title = Some(content),
            "pdf:producer" => metadata.producer = Some(content),
            "dcterms:created" => metadata.created = Some(content),
            "xmpTPg:NPages" => {
                if let Ok(pages) = content.parse::<u32>() {
                    metadata.page_count = pages;
                }
            }
            _ => {}
        }
    }

    metadata
}
