//! Document locator: finds the region holding the data table, driven by the
//! report type's `RegionPolicy`.

use crate::dates;
use crate::error::PipelineError;
use crate::policy::{RegionPolicy, ReportPolicy};
use crate::preprocessors::Preprocessor;
use crate::types::*;
use chrono::NaiveDateTime;
use scraper::{Html, Selector};
use std::sync::LazyLock;

static TABLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").unwrap());

/// A located region plus whatever the document said about its own date
#[derive(Debug, Clone)]
pub struct LocatedDocument {
    pub region: LocatedRegion,
    /// Publication time recovered from the document text, if any
    pub published: Option<NaiveDateTime>,
    /// Intermediate markup, kept for stage dumps
    pub markup: Option<String>,
}

pub struct DocumentLocator<'a> {
    preprocessor: &'a dyn Preprocessor,
}

impl<'a> DocumentLocator<'a> {
    pub fn new(preprocessor: &'a dyn Preprocessor) -> Self {
        Self { preprocessor }
    }

    pub fn locate(
        &self,
        report: &Report,
        policy: &ReportPolicy,
    ) -> Result<LocatedDocument, PipelineError> {
        match &report.content {
            ReportContent::Pdf(bytes) => self.locate_in_pdf(bytes, policy),
            ReportContent::Html(html) => locate_in_html(html, policy),
        }
    }

    fn locate_in_pdf(
        &self,
        bytes: &[u8],
        policy: &ReportPolicy,
    ) -> Result<LocatedDocument, PipelineError> {
        // Undecodable documents are extraction failures, not a changed layout
        let markup = self
            .preprocessor
            .parse_pdf_to_markup_language(bytes)
            .map_err(|e| PipelineError::ExtractionFailed {
                reason: format!("could not read PDF: {e:#}"),
                raw_region: byte_summary(bytes),
            })?;
        let output = self
            .preprocessor
            .parse_markup_to_preprocessor_output(&markup)
            .map_err(|e| PipelineError::ExtractionFailed {
                reason: format!("could not parse page layout: {e:#}"),
                raw_region: markup.chars().take(RAW_EXCERPT_CHARS).collect(),
            })?;

        let mut document = locate_in_pages(&output, policy)?;
        document.markup = Some(markup);
        Ok(document)
    }
}

const RAW_EXCERPT_CHARS: usize = 512;

/// Size and leading bytes of a document that could not be decoded
fn byte_summary(bytes: &[u8]) -> String {
    let head = &bytes[..bytes.len().min(32)];
    format!(
        "{} bytes, starting {:?}",
        bytes.len(),
        String::from_utf8_lossy(head)
    )
}

/// Apply the region policy to already-decoded pages
pub fn locate_in_pages(
    output: &PreprocessorOutput,
    policy: &ReportPolicy,
) -> Result<LocatedDocument, PipelineError> {
    let report_type = policy.report_type;
    let mismatch = |detail: String| PipelineError::LayoutMismatch {
        report_type,
        detail,
    };
    let page_count = output.page_count();
    let anchors = policy.region.anchors();

    let (pages, description): (Vec<PageLayout>, String) = match &policy.region {
        RegionPolicy::SingleTable { .. } => {
            let page = output
                .pages
                .iter()
                .find(|p| p.contains_any(anchors))
                .ok_or_else(|| {
                    mismatch(format!(
                        "no page mentions any of {:?} ({} pages)",
                        anchors, page_count
                    ))
                })?;
            (vec![page.clone()], format!("page {}", page.page))
        }
        RegionPolicy::PageRange { first, last, .. } => {
            if *first > page_count {
                return Err(mismatch(format!(
                    "expected table on pages {first}-{last} but document has {page_count} pages"
                )));
            }
            let pages: Vec<PageLayout> = output
                .pages
                .iter()
                .filter(|p| p.page >= *first && p.page <= *last)
                .cloned()
                .collect();
            if !pages.iter().any(|p| p.contains_any(anchors)) {
                return Err(mismatch(format!(
                    "pages {first}-{last} do not mention any of {anchors:?}"
                )));
            }
            let end = (*last).min(page_count);
            (pages, format!("pages {first}-{end}"))
        }
        RegionPolicy::Page { page, .. } => {
            let layout = output.page(*page).ok_or_else(|| {
                mismatch(format!(
                    "expected table on page {page} but document has {page_count} pages"
                ))
            })?;
            if !layout.contains_any(anchors) {
                return Err(mismatch(format!(
                    "page {page} does not mention any of {anchors:?}"
                )));
            }
            (vec![layout.clone()], format!("page {page}"))
        }
    };

    let raw_text = pages
        .iter()
        .map(PageLayout::text)
        .collect::<Vec<_>>()
        .join("\n\n");

    // Report dates sit in the header of the first page
    let published = output
        .pages
        .first()
        .and_then(|p| dates::find_report_datetime(&p.text()))
        .or_else(|| dates::find_report_datetime(&raw_text));

    tracing::debug!(%report_type, %description, "located table region");

    Ok(LocatedDocument {
        region: LocatedRegion {
            report_type,
            source: RegionSource::Pdf { pages },
            raw_text,
            description,
        },
        published,
        markup: None,
    })
}

/// First `<table>` of an HTML report whose text contains an anchor
pub fn locate_in_html(html: &str, policy: &ReportPolicy) -> Result<LocatedDocument, PipelineError> {
    let report_type = policy.report_type;
    let anchors = policy.region.anchors();

    if !matches!(policy.region, RegionPolicy::SingleTable { .. }) {
        return Err(PipelineError::LayoutMismatch {
            report_type,
            detail: "expected a paged PDF document but received HTML".to_string(),
        });
    }

    let document = Html::parse_document(html);
    let lowered: Vec<String> = anchors.iter().map(|a| a.to_lowercase()).collect();

    let (index, table) = document
        .select(&TABLE_SELECTOR)
        .enumerate()
        .find(|(_, table)| {
            let text = table.text().collect::<Vec<_>>().join(" ").to_lowercase();
            lowered.iter().any(|a| text.contains(a))
        })
        .ok_or_else(|| PipelineError::LayoutMismatch {
            report_type,
            detail: format!("no table mentions any of {anchors:?}"),
        })?;

    let raw_text = table
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let page_text = document
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ");

    Ok(LocatedDocument {
        region: LocatedRegion {
            report_type,
            source: RegionSource::Html {
                table_html: table.html(),
            },
            raw_text,
            description: format!("table {}", index + 1),
        },
        published: dates::find_report_datetime(&page_text),
        markup: None,
    })
}
