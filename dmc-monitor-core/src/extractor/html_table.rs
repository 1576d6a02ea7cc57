//! `<table>` extraction for HTML reports. Row and column spans are expanded
//! into a dense grid first, so a two-row header such as
//! `Houses Damaged` over `Fully | Partially` yields one label per leaf column.

use super::{clean_cell, ResolvedHeader, RowAssembler};
use crate::policy::{ColumnKind, TableLayout};
use crate::types::RawTable;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static ROW_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());

const MAX_HEADER_ROWS: usize = 4;
/// Guard against absurd span attributes
const MAX_SPAN: usize = 64;

#[derive(Debug, Clone)]
struct GridCell {
    text: String,
    is_header: bool,
}

#[derive(Debug, Clone)]
struct PendingCell {
    cell: GridCell,
    rows_left: usize,
}

fn span_attr(element: &ElementRef, name: &str) -> usize {
    element
        .value()
        .attr(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, MAX_SPAN)
}

/// Copy cells spanning down from earlier rows into the current position
fn take_pending(cells: &mut Vec<GridCell>, pending: &mut [Option<PendingCell>]) {
    while let Some(Some(p)) = pending.get_mut(cells.len()) {
        cells.push(p.cell.clone());
        p.rows_left -= 1;
        if p.rows_left == 0 {
            pending[cells.len() - 1] = None;
        }
    }
}

/// Expand the table into rows of equal logical columns
fn table_grid(table_html: &str) -> Vec<Vec<GridCell>> {
    let fragment = Html::parse_fragment(table_html);
    let mut pending: Vec<Option<PendingCell>> = Vec::new();
    let mut grid = Vec::new();

    for row in fragment.select(&ROW_SELECTOR) {
        let mut cells: Vec<GridCell> = Vec::new();

        let elements = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|e| matches!(e.value().name(), "td" | "th"));

        for element in elements {
            take_pending(&mut cells, &mut pending);

            let cell = GridCell {
                text: clean_cell(&element.text().collect::<Vec<_>>().join(" ")),
                is_header: element.value().name() == "th",
            };
            let rowspan = span_attr(&element, "rowspan");
            for _ in 0..span_attr(&element, "colspan") {
                if rowspan > 1 {
                    let column = cells.len();
                    if pending.len() <= column {
                        pending.resize(column + 1, None);
                    }
                    pending[column] = Some(PendingCell {
                        cell: cell.clone(),
                        rows_left: rowspan - 1,
                    });
                }
                cells.push(cell.clone());
            }
        }
        take_pending(&mut cells, &mut pending);

        if !cells.is_empty() {
            grid.push(cells);
        }
    }

    grid
}

fn resolved_count(row: &[GridCell], layout: &TableLayout) -> (usize, bool) {
    let mut count = 0;
    let mut has_label = false;
    for cell in row.iter().filter(|c| !c.text.is_empty()) {
        if let Some(column) = layout.resolve(&cell.text) {
            count += 1;
            has_label |= column.kind == ColumnKind::Label;
        }
    }
    (count, has_label)
}

fn is_header_row(row: &[GridCell], layout: &TableLayout) -> bool {
    let non_empty = row.iter().filter(|c| !c.text.is_empty()).count();
    let (resolved, _) = resolved_count(row, layout);
    row.iter().all(|c| c.is_header) || (non_empty > 0 && resolved * 2 >= non_empty)
}

/// Join the header parts above each column, skipping parts repeated by spans
fn column_labels(header_rows: &[Vec<GridCell>], width: usize) -> Vec<String> {
    (0..width)
        .map(|column| {
            let mut parts: Vec<&str> = Vec::new();
            for row in header_rows {
                if let Some(cell) = row.get(column) {
                    if !cell.text.is_empty() && parts.last() != Some(&cell.text.as_str()) {
                        parts.push(&cell.text);
                    }
                }
            }
            parts.join(" ")
        })
        .collect()
}

pub fn extract_html_table(table_html: &str, layout: &TableLayout) -> Result<RawTable, String> {
    let grid = table_grid(table_html);

    let start = grid
        .iter()
        .position(|row| {
            let (resolved, has_label) = resolved_count(row, layout);
            has_label || resolved >= 2
        })
        .ok_or_else(|| "no header row naming the expected columns".to_string())?;

    let mut end = start + 1;
    while end < grid.len() && end - start < MAX_HEADER_ROWS && is_header_row(&grid[end], layout) {
        end += 1;
    }

    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    let labels = column_labels(&grid[start..end], width);
    let header = ResolvedHeader::resolve(labels, layout)
        .ok_or_else(|| "header row has no district or station column".to_string())?;

    let wanted = layout.value_columns().count().min(2);
    if header.resolved_value_columns(layout) < wanted {
        return Err(format!(
            "header {:?} names fewer than {wanted} known columns",
            header.labels
        ));
    }

    let numeric_labels: Vec<String> = header
        .labels
        .iter()
        .zip(&header.numeric)
        .filter(|(_, numeric)| **numeric)
        .map(|(label, _)| label.clone())
        .collect();

    let mut assembler = RowAssembler::new(layout);
    for row in &grid[end..] {
        let line = row.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join(" ");
        if layout.is_footer_line(&line) {
            break;
        }
        let cells = row.iter().map(|c| c.text.clone()).collect();
        assembler.push(&header, cells, false);
    }

    let table = assembler.finish(&numeric_labels);
    if table.rows.is_empty() {
        return Err("table has a header but no data rows".to_string());
    }
    Ok(table)
}
