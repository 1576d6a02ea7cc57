//! Positional table extraction from PDF page layouts.
//!
//! 1. Spans are grouped into lines by vertical center.
//! 2. The header band is the run of lines starting at the first line that
//!    names the label column, up to the first data line.
//! 3. Header lines merge top-down: a cell spanning several cells on the line
//!    below becomes their common prefix ("Houses Damaged" over "Fully" and
//!    "Partially"), a cell over exactly one cell continues it.
//! 4. Data spans go to the column whose center-to-center boundaries enclose them.
//!
//! Pages without their own header reuse the previous page's columns. When no
//! header is found at all, numeric tables fall back to token shapes: a label
//! followed by exactly one number per numeric column.

use super::{extraction_failed, is_numeric_text, strip_serial_prefix, clean_cell};
use super::{ResolvedHeader, RowAssembler, TableExtractor};
use crate::config::ExtractionConfig;
use crate::error::PipelineError;
use crate::policy::{ColumnKind, TableLayout};
use crate::types::*;

#[derive(Debug, Clone)]
pub struct LayoutOptions {
    pub row_tolerance: f32,
    pub word_gap_ratio: f32,
    pub max_header_lines: usize,
    /// Label-only lines further than this many line heights below the previous
    /// row start a new row instead of continuing it
    pub max_wrap_gap: f32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            row_tolerance: 0.5,
            word_gap_ratio: 0.45,
            max_header_lines: 4,
            max_wrap_gap: 1.6,
        }
    }
}

impl From<&ExtractionConfig> for LayoutOptions {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            row_tolerance: config.row_tolerance,
            word_gap_ratio: config.word_gap_ratio,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
struct Line {
    y: f32,
    height: f32,
    spans: Vec<TextSpan>,
}

impl Line {
    fn text(&self) -> String {
        self.spans
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
struct Fragment {
    text: String,
    x0: f32,
    x1: f32,
}

#[derive(Debug, Clone)]
struct HeaderColumn {
    label: String,
    x0: f32,
    x1: f32,
}

impl HeaderColumn {
    fn center(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }
}

/// Column geometry of one table instance
#[derive(Debug, Clone)]
struct ColumnGrid {
    header: ResolvedHeader,
    /// Right edge of every column but the last
    boundaries: Vec<f32>,
}

impl ColumnGrid {
    fn column_for(&self, x: f32) -> usize {
        self.boundaries.iter().take_while(|b| x >= **b).count()
    }

    fn cells(&self, line: &Line) -> Vec<String> {
        let mut cells = vec![String::new(); self.header.labels.len()];
        for span in &line.spans {
            let cell = &mut cells[self.column_for(span.bounding_box.center_x())];
            if !cell.is_empty() {
                cell.push(' ');
            }
            cell.push_str(&span.text);
        }
        cells
    }
}

pub struct LayoutExtractor {
    options: LayoutOptions,
}

impl LayoutExtractor {
    pub fn new(options: LayoutOptions) -> Self {
        Self { options }
    }

    fn group_lines(&self, spans: &[TextSpan]) -> Vec<Line> {
        let mut sorted: Vec<&TextSpan> = spans.iter().collect();
        sorted.sort_by(|a, b| {
            a.bounding_box
                .center_y()
                .total_cmp(&b.bounding_box.center_y())
                .then_with(|| a.bounding_box.x.total_cmp(&b.bounding_box.x))
        });

        let mut lines: Vec<Line> = Vec::new();
        for span in sorted {
            let center = span.bounding_box.center_y();
            let height = span.bounding_box.height.max(1.0);
            match lines.last_mut() {
                Some(line)
                    if (center - line.y).abs()
                        <= self.options.row_tolerance * height.max(line.height) =>
                {
                    line.spans.push(span.clone());
                }
                _ => lines.push(Line {
                    y: center,
                    height,
                    spans: vec![span.clone()],
                }),
            }
        }

        for line in &mut lines {
            line.spans
                .sort_by(|a, b| a.bounding_box.x.total_cmp(&b.bounding_box.x));
        }
        lines
    }

    /// Merge horizontally adjacent spans into phrases
    fn fragments(&self, line: &Line) -> Vec<Fragment> {
        let mut fragments: Vec<Fragment> = Vec::new();
        let max_gap = self.options.word_gap_ratio * line.height;
        for span in &line.spans {
            let bbox = span.bounding_box;
            match fragments.last_mut() {
                Some(last) if bbox.x - last.x1 <= max_gap => {
                    last.text.push(' ');
                    last.text.push_str(&span.text);
                    last.x1 = last.x1.max(bbox.right());
                }
                _ => fragments.push(Fragment {
                    text: span.text.clone(),
                    x0: bbox.x,
                    x1: bbox.right(),
                }),
            }
        }
        fragments
    }

    fn is_header_like(&self, fragments: &[Fragment], layout: &TableLayout) -> bool {
        let resolved = fragments
            .iter()
            .filter(|f| layout.resolve(&f.text).is_some())
            .count();
        !fragments.is_empty() && resolved * 2 >= fragments.len()
    }

    fn is_header_start(&self, fragments: &[Fragment], layout: &TableLayout) -> bool {
        let mut resolved = 0;
        for fragment in fragments {
            match layout.resolve(&fragment.text).map(|c| c.kind) {
                Some(ColumnKind::Label) => return true,
                Some(_) => resolved += 1,
                None => {}
            }
        }
        resolved >= 2
    }

    fn is_data_line(&self, line: &Line, layout: &TableLayout) -> bool {
        if self.is_header_like(&self.fragments(line), layout) {
            return false;
        }
        !layout.has_numeric_columns() || line.spans.iter().any(|s| is_numeric_text(&s.text))
    }

    /// Merge header lines top-down into leaf columns
    fn merge_header(&self, lines: &[Line]) -> Vec<HeaderColumn> {
        let mut columns: Vec<HeaderColumn> = Vec::new();

        for line in lines {
            let fragments = self.fragments(line);
            let mut used = vec![false; fragments.len()];
            let mut next = Vec::new();

            for column in &columns {
                let below: Vec<usize> = fragments
                    .iter()
                    .enumerate()
                    .filter(|(_, f)| f.x0 < column.x1 && column.x0 < f.x1)
                    .map(|(i, _)| i)
                    .collect();

                match below.as_slice() {
                    [] => next.push(column.clone()),
                    [only] => {
                        let fragment = &fragments[*only];
                        used[*only] = true;
                        next.push(HeaderColumn {
                            label: format!("{} {}", column.label, fragment.text),
                            x0: column.x0.min(fragment.x0),
                            x1: column.x1.max(fragment.x1),
                        });
                    }
                    many => {
                        for &i in many {
                            used[i] = true;
                            next.push(HeaderColumn {
                                label: format!("{} {}", column.label, fragments[i].text),
                                x0: fragments[i].x0,
                                x1: fragments[i].x1,
                            });
                        }
                    }
                }
            }

            for (fragment, used) in fragments.into_iter().zip(used) {
                if !used {
                    next.push(HeaderColumn {
                        label: fragment.text,
                        x0: fragment.x0,
                        x1: fragment.x1,
                    });
                }
            }

            next.sort_by(|a, b| a.x0.total_cmp(&b.x0));
            columns = next;
        }

        columns
    }

    /// Find the header band in `lines`; returns the grid and the index of the
    /// first line after the band
    fn detect_header(&self, lines: &[Line], layout: &TableLayout) -> Option<(ColumnGrid, usize)> {
        let start = lines
            .iter()
            .position(|line| self.is_header_start(&self.fragments(line), layout))?;

        let mut end = start + 1;
        while end < lines.len()
            && end - start < self.options.max_header_lines
            && !self.is_data_line(&lines[end], layout)
            && !layout.is_footer_line(&lines[end].text())
        {
            end += 1;
        }

        let columns = self.merge_header(&lines[start..end]);
        let labels: Vec<String> = columns.iter().map(|c| clean_cell(&c.label)).collect();
        let header = ResolvedHeader::resolve(labels, layout)?;

        let wanted = layout.value_columns().count().min(2);
        if header.resolved_value_columns(layout) < wanted {
            tracing::debug!(
                labels = ?header.labels,
                "header band resolves too few columns, ignoring"
            );
            return None;
        }

        let boundaries = columns
            .windows(2)
            .map(|pair| (pair[0].center() + pair[1].center()) / 2.0)
            .collect();

        Some((ColumnGrid { header, boundaries }, end))
    }

    fn extract_pages(
        &self,
        pages: &[PageLayout],
        layout: &TableLayout,
    ) -> Option<RawTable> {
        let mut assembler = RowAssembler::new(layout);
        let mut grid: Option<ColumnGrid> = None;
        let mut numeric_labels: Vec<String> = Vec::new();

        for page in pages {
            let lines = self.group_lines(&page.spans);
            let first_data = match self.detect_header(&lines, layout) {
                Some((page_grid, end)) => {
                    for (label, numeric) in page_grid.header.labels.iter().zip(&page_grid.header.numeric) {
                        if *numeric && !numeric_labels.contains(label) {
                            numeric_labels.push(label.clone());
                        }
                    }
                    grid = Some(page_grid);
                    end
                }
                // Continuation page: skip running headers down to the first data line
                None if grid.is_some() => match lines
                    .iter()
                    .position(|line| self.is_data_line(line, layout))
                {
                    Some(index) => index,
                    None => continue,
                },
                None => continue,
            };
            let Some(grid) = grid.as_ref() else {
                continue;
            };

            let mut previous: Option<&Line> = None;
            for line in &lines[first_data..] {
                if layout.is_footer_line(&line.text()) {
                    break;
                }
                let wrap_ok = previous
                    .map(|p| line.y - p.y <= self.options.max_wrap_gap * line.height.max(p.height))
                    .unwrap_or(false);
                assembler.push(&grid.header, grid.cells(line), wrap_ok);
                previous = Some(line);
            }
        }

        grid.is_some().then(|| assembler.finish(&numeric_labels))
    }

    /// Label followed by exactly one number per numeric column, in layout order
    fn extract_token_shapes(&self, pages: &[PageLayout], layout: &TableLayout) -> RawTable {
        let Some(label_column) = layout.label_column() else {
            return RawTable::default();
        };
        let numeric: Vec<&str> = layout
            .value_columns()
            .filter(|c| c.kind.is_numeric())
            .map(|c| c.label.as_str())
            .collect();

        let mut labels = vec![label_column.label.clone()];
        labels.extend(numeric.iter().map(|s| s.to_string()));
        let header = ResolvedHeader {
            label_index: 0,
            numeric: labels.iter().map(|l| *l != label_column.label).collect(),
            labels,
        };

        let mut assembler = RowAssembler::new(layout);
        for page in pages {
            for line in self.group_lines(&page.spans) {
                let tokens: Vec<String> = line
                    .text()
                    .split_whitespace()
                    .map(clean_cell)
                    .filter(|t| !t.is_empty())
                    .collect();
                let value_count = tokens
                    .iter()
                    .rev()
                    .take_while(|t| is_numeric_text(t))
                    .count();
                if value_count != numeric.len() {
                    continue;
                }
                let split = tokens.len() - value_count;
                let label = strip_serial_prefix(&tokens[..split].join(" "));
                if !label.chars().any(char::is_alphabetic) {
                    continue;
                }
                let mut cells = vec![label];
                cells.extend(tokens[split..].iter().cloned());
                assembler.push(&header, cells, false);
            }
        }

        let numeric_labels: Vec<String> = numeric.iter().map(|s| s.to_string()).collect();
        assembler.finish(&numeric_labels)
    }

    fn extract_pdf(
        &self,
        region: &LocatedRegion,
        pages: &[PageLayout],
        layout: &TableLayout,
    ) -> Result<RawTable, PipelineError> {
        let table = match self.extract_pages(pages, layout) {
            Some(table) => table,
            None if layout.has_numeric_columns() => {
                tracing::info!(
                    region = %region.description,
                    "no header band found, falling back to token-shape rows"
                );
                self.extract_token_shapes(pages, layout)
            }
            None => {
                return Err(extraction_failed(
                    region,
                    format!("no header row naming the expected columns in {}", region.description),
                ))
            }
        };

        if table.rows.is_empty() {
            return Err(extraction_failed(
                region,
                format!("no data rows found in {}", region.description),
            ));
        }
        Ok(table)
    }
}

impl Default for LayoutExtractor {
    fn default() -> Self {
        Self::new(LayoutOptions::default())
    }
}

impl TableExtractor for LayoutExtractor {
    fn extract(
        &self,
        region: &LocatedRegion,
        layout: &TableLayout,
    ) -> Result<RawTable, PipelineError> {
        match &region.source {
            RegionSource::Pdf { pages } => self.extract_pdf(region, pages, layout),
            RegionSource::Html { table_html } => {
                super::html_table::extract_html_table(table_html, layout)
                    .map_err(|reason| extraction_failed(region, reason))
            }
        }
    }

    fn name(&self) -> &str {
        "layout"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyTable;

    fn span(text: &str, x: f32, y: f32, width: f32) -> TextSpan {
        TextSpan {
            text: text.to_string(),
            page: 1,
            bounding_box: BoundingBox { x, y, width, height: 10.0 },
            line_number: 0,
        }
    }

    fn region(report_type: ReportType, pages: Vec<PageLayout>) -> LocatedRegion {
        let raw_text = pages.iter().map(PageLayout::text).collect::<Vec<_>>().join("\n");
        LocatedRegion {
            report_type,
            source: RegionSource::Pdf { pages },
            raw_text,
            description: "page 1".to_string(),
        }
    }

    fn layout(report_type: ReportType) -> TableLayout {
        PolicyTable::new().get(report_type).unwrap().layout.clone()
    }

    #[test]
    fn merged_header_cells_combine_with_sub_headers() {
        let spans = vec![
            span("District", 20.0, 100.0, 40.0),
            span("Affected", 100.0, 100.0, 40.0),
            span("Deaths", 160.0, 100.0, 30.0),
            span("Houses Damaged", 220.0, 100.0, 90.0),
            span("Fully", 220.0, 112.0, 30.0),
            span("Partially", 270.0, 112.0, 40.0),
            span("Colombo", 20.0, 130.0, 35.0),
            span("1,250", 110.0, 130.0, 25.0),
            span("2", 170.0, 130.0, 5.0),
            span("10", 225.0, 130.0, 10.0),
            span("25", 280.0, 130.0, 10.0),
            span("Gampaha*", 20.0, 142.0, 40.0),
            span("-", 115.0, 142.0, 5.0),
            span("0", 170.0, 142.0, 5.0),
            span("3", 225.0, 142.0, 5.0),
            span("7", 280.0, 142.0, 5.0),
            span("Total", 20.0, 154.0, 25.0),
            span("1,250", 110.0, 154.0, 25.0),
            span("2", 170.0, 154.0, 5.0),
            span("13", 225.0, 154.0, 10.0),
            span("32", 280.0, 154.0, 10.0),
        ];
        let region = region(ReportType::Situation, vec![PageLayout { page: 1, spans }]);

        let table = LayoutExtractor::default()
            .extract(&region, &layout(ReportType::Situation))
            .unwrap();

        assert_eq!(
            table.columns,
            vec!["District", "Affected", "Deaths", "Houses Damaged Fully", "Houses Damaged Partially"]
        );
        assert_eq!(table.rows.len(), 2);
        let colombo = &table.rows[0];
        assert_eq!(colombo["District"], "Colombo");
        assert_eq!(colombo["Affected"], "1,250");
        assert_eq!(colombo["Houses Damaged Fully"], "10");
        assert_eq!(colombo["Houses Damaged Partially"], "25");
        let gampaha = &table.rows[1];
        assert_eq!(gampaha["District"], "Gampaha");
        assert_eq!(gampaha["Affected"], "-");
    }

    #[test]
    fn wrapped_labels_and_list_cells_continue_previous_row() {
        let spans = vec![
            span("District", 20.0, 50.0, 40.0),
            span("Level 1 (Yellow)", 120.0, 50.0, 80.0),
            span("Level 2 (Amber)", 240.0, 50.0, 80.0),
            span("Level 3 (Red)", 360.0, 50.0, 70.0),
            span("Badulla", 20.0, 70.0, 35.0),
            span("Ella, Haliela,", 120.0, 70.0, 70.0),
            span("Passara", 240.0, 70.0, 35.0),
            span("-", 360.0, 70.0, 5.0),
            span("Bandarawela", 120.0, 82.0, 60.0),
            span("Nuwara Eliya", 20.0, 100.0, 60.0),
            span("Walapane", 120.0, 100.0, 45.0),
            span("-", 240.0, 100.0, 5.0),
            span("Hanguranketha", 360.0, 100.0, 70.0),
        ];
        let region = region(ReportType::Landslide, vec![PageLayout { page: 3, spans }]);

        let table = LayoutExtractor::default()
            .extract(&region, &layout(ReportType::Landslide))
            .unwrap();

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0]["District"], "Badulla");
        assert_eq!(table.rows[0]["Level 1 (Yellow)"], "Ella, Haliela, Bandarawela");
        assert_eq!(table.rows[1]["District"], "Nuwara Eliya");
        assert_eq!(table.rows[1]["Level 3 (Red)"], "Hanguranketha");
    }

    #[test]
    fn continuation_page_reuses_previous_columns() {
        let page3 = PageLayout {
            page: 3,
            spans: vec![
                span("District", 20.0, 50.0, 40.0),
                span("Level 1 (Yellow)", 120.0, 50.0, 80.0),
                span("Level 2 (Amber)", 240.0, 50.0, 80.0),
                span("Level 3 (Red)", 360.0, 50.0, 70.0),
                span("Kandy", 20.0, 70.0, 30.0),
                span("Doluwa", 120.0, 70.0, 35.0),
            ],
        };
        let page4 = PageLayout {
            page: 4,
            spans: vec![
                span("Matale", 20.0, 40.0, 30.0),
                span("Rattota", 360.0, 40.0, 35.0),
            ],
        };
        let region = region(ReportType::Landslide, vec![page3, page4]);

        let table = LayoutExtractor::default()
            .extract(&region, &layout(ReportType::Landslide))
            .unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1]["District"], "Matale");
        assert_eq!(table.rows[1]["Level 3 (Red)"], "Rattota");
    }

    #[test]
    fn headerless_numeric_rows_fall_back_to_token_shapes() {
        let spans = vec![
            span("Situation Report on 2025.12.07 at 1200 hrs", 20.0, 10.0, 200.0),
            span("1 Colombo 420 1,650 2 0 12 40 3 110 380", 20.0, 40.0, 300.0),
            span("2 Kandy 10 35 0 1 0 4 0 0 0", 20.0, 52.0, 300.0),
            span("3 Galle 10 35", 20.0, 64.0, 300.0),
        ];
        let region = region(ReportType::Situation, vec![PageLayout { page: 1, spans }]);

        let table = LayoutExtractor::default()
            .extract(&region, &layout(ReportType::Situation))
            .unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0]["District"], "Colombo");
        assert_eq!(table.rows[0]["Affected"], "1,650");
        assert_eq!(table.rows[0]["Displaced"], "380");
        assert_eq!(table.rows[1]["Missing"], "1");
    }

    #[test]
    fn empty_region_fails_with_raw_text() {
        let spans = vec![span("This page intentionally left blank", 20.0, 10.0, 200.0)];
        let region = region(ReportType::Landslide, vec![PageLayout { page: 3, spans }]);

        let err = LayoutExtractor::default()
            .extract(&region, &layout(ReportType::Landslide))
            .unwrap_err();
        assert_eq!(err.raw_region(), Some("This page intentionally left blank"));
    }
}
