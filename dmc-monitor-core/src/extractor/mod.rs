//! Table extraction: located region → raw rows keyed by header label.
//!
//! Extractors are interchangeable behind `TableExtractor`. The positional
//! `LayoutExtractor` is the default; `ModelExtractor` delegates to a hosted
//! language model and is usable on its own or as a fallback.

pub mod html_table;
pub mod layout;
pub mod model;

use crate::error::PipelineError;
use crate::policy::TableLayout;
use crate::types::*;
use regex::Regex;
use std::sync::LazyLock;

pub use layout::{LayoutExtractor, LayoutOptions};
pub use model::ModelExtractor;

static FOOTNOTE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\s*(?:\*+|†|‡|\[\d{1,2}\]|\([a-z\d]\)|[¹²³⁴⁵⁶⁷⁸⁹⁰]+))+$").unwrap()
});

static SERIAL_PREFIX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}[.)]?\s+").unwrap());

const DASHES: [&str; 5] = ["-", "–", "—", "--", "−"];

pub trait TableExtractor {
    fn extract(&self, region: &LocatedRegion, layout: &TableLayout)
        -> Result<RawTable, PipelineError>;

    fn name(&self) -> &str;
}

/// Extractor enum for runtime selection
pub enum ExtractorImpl {
    Layout(LayoutExtractor),
    Model(ModelExtractor),
}

impl TableExtractor for ExtractorImpl {
    fn extract(
        &self,
        region: &LocatedRegion,
        layout: &TableLayout,
    ) -> Result<RawTable, PipelineError> {
        match self {
            ExtractorImpl::Layout(extractor) => extractor.extract(region, layout),
            ExtractorImpl::Model(extractor) => extractor.extract(region, layout),
        }
    }

    fn name(&self) -> &str {
        match self {
            ExtractorImpl::Layout(extractor) => extractor.name(),
            ExtractorImpl::Model(extractor) => extractor.name(),
        }
    }
}

/// Collapse whitespace and strip trailing footnote markers (`*`, `†`, `[2]`, `(a)`, `¹`)
pub fn clean_cell(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    FOOTNOTE_REGEX.replace(&collapsed, "").trim().to_string()
}

/// Row labels sometimes carry the serial-number column glued on ("3 Kandy")
pub fn strip_serial_prefix(label: &str) -> String {
    SERIAL_PREFIX_REGEX.replace(label, "").to_string()
}

pub fn is_dash(text: &str) -> bool {
    DASHES.contains(&text.trim())
}

/// Number, possibly with thousands separators, or a dash placeholder
pub fn is_numeric_text(text: &str) -> bool {
    let text = clean_cell(text);
    if is_dash(&text) {
        return true;
    }
    let stripped: String = text.chars().filter(|c| *c != ',').collect();
    !stripped.is_empty() && stripped.parse::<f64>().is_ok()
}

/// Header labels of one table instance and which of them matter
#[derive(Debug, Clone)]
pub(crate) struct ResolvedHeader {
    pub labels: Vec<String>,
    pub label_index: usize,
    pub numeric: Vec<bool>,
}

impl ResolvedHeader {
    /// Resolve raw labels against the layout; `None` when no label column is present
    pub fn resolve(labels: Vec<String>, layout: &TableLayout) -> Option<Self> {
        let kinds: Vec<_> = labels
            .iter()
            .map(|label| layout.resolve(label).map(|c| c.kind))
            .collect();
        let label_index = kinds
            .iter()
            .position(|k| *k == Some(crate::policy::ColumnKind::Label))?;
        let numeric = kinds
            .iter()
            .map(|k| k.map(|k| k.is_numeric()).unwrap_or(false))
            .collect();
        Some(Self {
            labels,
            label_index,
            numeric,
        })
    }

    /// Columns that resolved to a value column of the layout
    pub fn resolved_value_columns(&self, layout: &TableLayout) -> usize {
        self.labels
            .iter()
            .enumerate()
            .filter(|(i, label)| {
                *i != self.label_index
                    && layout
                        .resolve(label)
                        .map(|c| c.kind != crate::policy::ColumnKind::Label)
                        .unwrap_or(false)
            })
            .count()
    }
}

/// Accumulates cell rows into `RawRow`s, joining continuation lines and
/// dropping header/total rows
pub(crate) struct RowAssembler<'a> {
    layout: &'a TableLayout,
    columns: Vec<String>,
    rows: Vec<RawRow>,
    /// Label of the label column for each assembled row
    row_label_columns: Vec<String>,
}

impl<'a> RowAssembler<'a> {
    pub fn new(layout: &'a TableLayout) -> Self {
        Self {
            layout,
            columns: Vec::new(),
            rows: Vec::new(),
            row_label_columns: Vec::new(),
        }
    }

    pub fn has_rows(&self) -> bool {
        !self.rows.is_empty()
    }

    /// Add one line of cells laid out per `header`. `allow_label_wrap` lets a
    /// label-only line extend the previous row's label ("Nuwara" / "Eliya").
    pub fn push(&mut self, header: &ResolvedHeader, cells: Vec<String>, allow_label_wrap: bool) {
        for label in &header.labels {
            if !self.columns.contains(label) {
                self.columns.push(label.clone());
            }
        }

        let cells: Vec<String> = cells.iter().map(|c| clean_cell(c)).collect();
        if cells.iter().all(|c| c.is_empty()) {
            return;
        }
        let label = cells
            .get(header.label_index)
            .map(|l| strip_serial_prefix(l))
            .unwrap_or_default();

        let only_label = cells
            .iter()
            .enumerate()
            .all(|(i, c)| i == header.label_index || c.is_empty());

        if label.is_empty() || (allow_label_wrap && only_label && self.layout.has_numeric_columns()) {
            self.continue_last(header, &cells, &label);
            return;
        }

        let mut row = RawRow::new();
        for (i, text) in cells.into_iter().enumerate() {
            let Some(column) = header.labels.get(i) else {
                continue;
            };
            let text = if i == header.label_index { label.clone() } else { text };
            row.insert(column.clone(), text);
        }
        self.rows.push(row);
        self.row_label_columns
            .push(header.labels[header.label_index].clone());
    }

    fn continue_last(&mut self, header: &ResolvedHeader, cells: &[String], label: &str) {
        let Some(last) = self.rows.last_mut() else {
            return;
        };
        for (i, text) in cells.iter().enumerate() {
            let text = if i == header.label_index { label } else { text.as_str() };
            if text.is_empty() {
                continue;
            }
            let Some(column) = header.labels.get(i) else {
                continue;
            };
            let cell = last.entry(column.clone()).or_default();
            if !cell.is_empty() {
                cell.push(' ');
            }
            cell.push_str(text);
        }
    }

    /// Finished table with header, total and footer rows removed
    pub fn finish(self, numeric_columns: &[String]) -> RawTable {
        let layout = self.layout;
        let rows = self
            .rows
            .into_iter()
            .zip(self.row_label_columns)
            .filter(|(row, label_column)| {
                let label = row.get(label_column).map(String::as_str).unwrap_or("");
                if layout.is_stop_label(label) || layout.is_footer_line(label) {
                    tracing::debug!(label, "dropping non-data row");
                    return false;
                }
                // A repeated header row has text in every numeric column
                let numeric: Vec<&String> = numeric_columns
                    .iter()
                    .filter_map(|c| row.get(c))
                    .filter(|v| !v.is_empty())
                    .collect();
                let header_like = !numeric.is_empty()
                    && numeric.len() == numeric_columns.len()
                    && numeric.iter().all(|v| !is_numeric_text(v));
                !header_like
            })
            .map(|(row, _)| row)
            .collect();

        RawTable {
            columns: self.columns,
            rows,
        }
    }
}

pub(crate) fn extraction_failed(region: &LocatedRegion, reason: impl Into<String>) -> PipelineError {
    PipelineError::ExtractionFailed {
        reason: reason.into(),
        raw_region: region.raw_text.clone(),
    }
}
