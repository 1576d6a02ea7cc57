use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The schema version stamped on every persisted snapshot.
/// Bump this when the snapshot shape changes in a non-additive way.
pub const SCHEMA_VERSION: &str = "1.0.0";

// ===== REPORTS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Situation,
    Landslide,
    RiverFlood,
    Weather,
}

impl ReportType {
    pub const ALL: [ReportType; 4] = [
        ReportType::Situation,
        ReportType::Landslide,
        ReportType::RiverFlood,
        ReportType::Weather,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Situation => "situation",
            ReportType::Landslide => "landslide",
            ReportType::RiverFlood => "river_flood",
            ReportType::Weather => "weather",
        }
    }

    /// Human-readable name as the DMC site titles these reports
    pub fn display_name(&self) -> &'static str {
        match self {
            ReportType::Situation => "Situation Report",
            ReportType::Landslide => "Landslide Early Warning",
            ReportType::RiverFlood => "Water Level & Rainfall",
            ReportType::Weather => "Weather Report",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "situation" | "sitrep" => Ok(ReportType::Situation),
            "landslide" => Ok(ReportType::Landslide),
            "river_flood" | "river" | "flood" => Ok(ReportType::RiverFlood),
            "weather" => Ok(ReportType::Weather),
            other => Err(format!(
                "unknown report type '{other}' (expected situation, landslide, river_flood or weather)"
            )),
        }
    }
}

/// Raw document body as downloaded
#[derive(Debug, Clone)]
pub enum ReportContent {
    Pdf(Vec<u8>),
    Html(String),
}

impl ReportContent {
    /// Sniff the body: PDF magic wins, anything else is treated as HTML text
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        if is_pdf_magic(&bytes) {
            ReportContent::Pdf(bytes)
        } else {
            ReportContent::Html(String::from_utf8_lossy(&bytes).into_owned())
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ReportContent::Pdf(bytes) => bytes,
            ReportContent::Html(text) => text.as_bytes(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ReportContent::Pdf(_) => "pdf",
            ReportContent::Html(_) => "html",
        }
    }
}

/// Check if bytes start with the PDF magic number (after optional BOM/whitespace)
pub fn is_pdf_magic(bytes: &[u8]) -> bool {
    let head = bytes
        .iter()
        .skip_while(|&&b| b == 0xEF || b == 0xBB || b == 0xBF || b.is_ascii_whitespace())
        .take(4)
        .copied()
        .collect::<Vec<_>>();

    head.starts_with(b"%PDF")
}

/// One published document instance, created per refresh and dropped after extraction
#[derive(Debug, Clone)]
pub struct Report {
    pub report_type: ReportType,
    pub title: String,
    /// Publication timestamp from the listing page, if it carried one
    pub published: Option<NaiveDateTime>,
    pub source_url: String,
    pub content: ReportContent,
    /// SHA-256 of the downloaded bytes
    pub digest: String,
}

// ===== LOCATED REGIONS =====
// Output of the document locator, input of the extractors.

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }
}

/// A run of text with its position on a page (top-left origin, points)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
    pub page: u32,
    pub bounding_box: BoundingBox,
    pub line_number: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    /// Page number (1-indexed)
    pub page: u32,
    pub spans: Vec<TextSpan>,
}

impl PageLayout {
    /// Plain text of the page: spans grouped by line number, lines top to bottom
    pub fn text(&self) -> String {
        let mut lines: BTreeMap<u32, Vec<&TextSpan>> = BTreeMap::new();
        for span in &self.spans {
            lines.entry(span.line_number).or_default().push(span);
        }

        lines
            .into_values()
            .map(|mut spans| {
                spans.sort_by(|a, b| a.bounding_box.x.total_cmp(&b.bounding_box.x));
                spans
                    .iter()
                    .map(|s| s.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn contains_any(&self, anchors: &[String]) -> bool {
        let text = self.text().to_lowercase();
        anchors.iter().any(|a| text.contains(&a.to_lowercase()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub producer: Option<String>,
    pub created: Option<String>,
    pub page_count: u32,
}

/// Positioned text of a whole document, as produced by a preprocessor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreprocessorOutput {
    pub pages: Vec<PageLayout>,
    pub metadata: DocumentMetadata,
}

impl PreprocessorOutput {
    pub fn page(&self, number: u32) -> Option<&PageLayout> {
        self.pages.iter().find(|p| p.page == number)
    }

    pub fn page_count(&self) -> u32 {
        self.metadata.page_count.max(self.pages.len() as u32)
    }
}

#[derive(Debug, Clone)]
pub enum RegionSource {
    /// Page range of a PDF, with positioned text
    Pdf { pages: Vec<PageLayout> },
    /// A single `<table>` element of an HTML report
    Html { table_html: String },
}

#[derive(Debug, Clone)]
pub struct LocatedRegion {
    pub report_type: ReportType,
    pub source: RegionSource,
    /// Plain-text rendition of the region, attached to extraction failures
    pub raw_text: String,
    /// e.g. "pages 3-5" or "table 1"
    pub description: String,
}

/// One extracted row: column label → raw cell text
pub type RawRow = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    /// Column labels in left-to-right order
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

// ===== SNAPSHOTS =====

/// District (or gauging station) name after canonicalization
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "status", content = "name", rename_all = "snake_case")]
pub enum DistrictName {
    Canonical(String),
    Unresolved(String),
}

impl DistrictName {
    pub fn key(&self) -> &str {
        match self {
            DistrictName::Canonical(name) | DistrictName::Unresolved(name) => name,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, DistrictName::Canonical(_))
    }
}

impl fmt::Display for DistrictName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistrictName::Canonical(name) => f.write_str(name),
            DistrictName::Unresolved(name) => write!(f, "{name} (unresolved)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MetricValue {
    Count(i64),
    Measure(f64),
    Category(String),
    List(Vec<String>),
    Unknown,
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Count(n) => Some(*n as f64),
            MetricValue::Measure(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, MetricValue::Unknown)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Count(n) => write!(f, "{n}"),
            MetricValue::Measure(v) => write!(f, "{v}"),
            MetricValue::Category(s) => f.write_str(s),
            MetricValue::List(items) => f.write_str(&items.join(", ")),
            MetricValue::Unknown => f.write_str("unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictRecord {
    pub district: DistrictName,
    /// Metric key → value. A map so new metrics stay forward-compatible.
    pub metrics: BTreeMap<String, MetricValue>,
}

impl DistrictRecord {
    pub fn metric(&self, key: &str) -> Option<&MetricValue> {
        self.metrics.get(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnapshotKey {
    pub report_type: ReportType,
    pub published: NaiveDateTime,
}

impl SnapshotKey {
    pub fn new(report_type: ReportType, published: NaiveDateTime) -> Self {
        Self {
            report_type,
            published,
        }
    }

    /// Key for a report whose publication time is unknown (midnight)
    pub fn on_date(report_type: ReportType, date: NaiveDate) -> Self {
        Self::new(report_type, date.and_hms_opt(0, 0, 0).unwrap_or_default())
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}",
            self.report_type,
            self.published.format("%Y-%m-%d %H:%M")
        )
    }
}

/// All district records of one report on one date. Never mutated after creation;
/// a later snapshot supersedes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    schema_version: String,
    key: SnapshotKey,
    source_url: String,
    source_digest: String,
    records: Vec<DistrictRecord>,
}

impl Snapshot {
    pub fn new(
        key: SnapshotKey,
        source_url: impl Into<String>,
        source_digest: impl Into<String>,
        mut records: Vec<DistrictRecord>,
    ) -> Self {
        records.sort_by(|a, b| a.district.cmp(&b.district));
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            key,
            source_url: source_url.into(),
            source_digest: source_digest.into(),
            records,
        }
    }

    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    pub fn key(&self) -> SnapshotKey {
        self.key
    }

    pub fn report_type(&self) -> ReportType {
        self.key.report_type
    }

    pub fn published(&self) -> NaiveDateTime {
        self.key.published
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn source_digest(&self) -> &str {
        &self.source_digest
    }

    pub fn records(&self) -> &[DistrictRecord] {
        &self.records
    }

    pub fn record(&self, district: &str) -> Option<&DistrictRecord> {
        self.records.iter().find(|r| r.district.key() == district)
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &DistrictRecord> {
        self.records.iter().filter(|r| !r.district.is_resolved())
    }
}

// ===== WARNINGS =====

/// Pipeline stage, used to name where a failure or warning came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Before any stage runs: policies and source settings
    Config,
    Fetch,
    Locate,
    Extract,
    Normalize,
    Diff,
    Store,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Fetch => "fetch",
            Stage::Locate => "locate",
            Stage::Extract => "extract",
            Stage::Normalize => "normalize",
            Stage::Diff => "diff",
            Stage::Store => "store",
        };
        f.write_str(name)
    }
}

/// Non-fatal, row-level problem surfaced alongside a successful refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub stage: Stage,
    /// 0-indexed raw row, when the warning concerns one
    pub row: Option<usize>,
    pub message: String,
}

impl Warning {
    pub fn row(stage: Stage, row: usize, message: impl Into<String>) -> Self {
        Self {
            stage,
            row: Some(row),
            message: message.into(),
        }
    }

    pub fn general(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            row: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(f, "[{}] row {}: {}", self.stage, row, self.message),
            None => write!(f, "[{}] {}", self.stage, self.message),
        }
    }
}
