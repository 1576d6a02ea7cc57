//! Per-report-type policy table.
//!
//! Everything that differs between report types lives here as data: which
//! listing links to follow, where the table sits in the document, what its
//! columns are called, how each column is typed and which gazetteer resolves
//! its row labels. Pipeline stages look policies up; they never branch on
//! `ReportType` themselves.

use crate::types::{DistrictRecord, MetricValue, ReportType, Snapshot};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// The row label (district or gauging station)
    Label,
    Count,
    Measure,
    Category,
    /// Comma-separated names, e.g. divisional secretariats under a warning level
    List,
}

impl ColumnKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnKind::Count | ColumnKind::Measure)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Metric key in snapshots
    pub key: String,
    /// Canonical header label, used when rendering rows back out
    pub label: String,
    /// Alternative header spellings seen across report versions
    #[serde(default)]
    pub aliases: Vec<String>,
    pub kind: ColumnKind,
    /// When two header columns resolve here (readings taken at different
    /// times), the later one fills `key` and the earlier one fills this key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earlier_key: Option<String>,
}

impl ColumnSpec {
    fn new(key: &str, label: &str, aliases: &[&str], kind: ColumnKind) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            kind,
            earlier_key: None,
        }
    }

    fn with_earlier_key(mut self, key: &str) -> Self {
        self.earlier_key = Some(key.to_string());
        self
    }

    /// Length of the longest alias found as a whole-word run inside `label`
    pub fn match_score(&self, label: &str) -> Option<usize> {
        let label_tokens = tokenize(label);
        std::iter::once(&self.label)
            .chain(self.aliases.iter())
            .filter_map(|alias| {
                let alias_tokens = tokenize(alias);
                contains_run(&label_tokens, &alias_tokens)
                    .then(|| alias_tokens.iter().map(|t| t.len()).sum::<usize>())
            })
            .max()
    }
}

/// Lowercase alphanumeric words of a header label
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn contains_run(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableLayout {
    pub columns: Vec<ColumnSpec>,
    /// Row labels that mark header, total or footer rows rather than data
    #[serde(default)]
    pub stop_labels: Vec<String>,
    /// Lines starting with one of these end the table
    #[serde(default)]
    pub footer_markers: Vec<String>,
}

impl TableLayout {
    pub fn label_column(&self) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.kind == ColumnKind::Label)
    }

    pub fn value_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|c| c.kind != ColumnKind::Label)
    }

    pub fn has_numeric_columns(&self) -> bool {
        self.columns.iter().any(|c| c.kind.is_numeric())
    }

    /// Resolve a raw header label to a column; the longest alias match wins
    pub fn resolve(&self, raw_label: &str) -> Option<&ColumnSpec> {
        let mut best: Option<(&ColumnSpec, usize)> = None;
        for column in &self.columns {
            if let Some(score) = column.match_score(raw_label) {
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((column, score));
                }
            }
        }
        best.map(|(column, _)| column)
    }

    pub fn column(&self, key: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.key == key)
    }

    pub fn is_stop_label(&self, text: &str) -> bool {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return false;
        }
        self.stop_labels.iter().any(|stop| tokenize(stop) == tokens)
            || tokens.first().map(|t| t == "total").unwrap_or(false)
    }

    pub fn is_footer_line(&self, text: &str) -> bool {
        let lower = text.trim().to_lowercase();
        self.footer_markers
            .iter()
            .any(|marker| lower.starts_with(&marker.to_lowercase()))
    }
}

/// Where the table lives inside a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegionPolicy {
    /// The first table (or page) containing one of the anchors
    SingleTable { anchors: Vec<String> },
    /// A fixed page range (1-indexed, inclusive); the table may span pages
    PageRange {
        first: u32,
        last: u32,
        anchors: Vec<String>,
    },
    /// Exactly one page
    Page { page: u32, anchors: Vec<String> },
}

impl RegionPolicy {
    pub fn anchors(&self) -> &[String] {
        match self {
            RegionPolicy::SingleTable { anchors }
            | RegionPolicy::PageRange { anchors, .. }
            | RegionPolicy::Page { anchors, .. } => anchors,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GazetteerKind {
    Districts,
    GaugingStations,
}

/// Metrics computed from other metrics after a row is normalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DerivedMetric {
    /// Category named after the highest level whose list is non-empty
    HighestListLevel {
        key: String,
        /// (list metric key, category label), lowest level first
        levels: Vec<(String, String)>,
        none_label: String,
    },
}

/// A whole-snapshot count shown next to the summed count columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Tally {
    /// Number of records
    Records { key: String },
    /// Number of distinct values of a category metric
    Distinct { key: String, metric: String },
    /// Records whose category metric is one of `values`, ignoring case
    Matching {
        key: String,
        metric: String,
        values: Vec<String>,
    },
}

fn category<'r>(record: &'r DistrictRecord, metric: &str) -> Option<&'r str> {
    match record.metric(metric) {
        Some(MetricValue::Category(value)) => Some(value.as_str()),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPolicy {
    pub report_type: ReportType,
    /// A listing link qualifies when its text or href contains one of these
    pub listing_keywords: Vec<String>,
    pub region: RegionPolicy,
    pub layout: TableLayout,
    pub gazetteer: GazetteerKind,
    #[serde(default)]
    pub derived: Vec<DerivedMetric>,
    #[serde(default)]
    pub tallies: Vec<Tally>,
}

impl ReportPolicy {
    /// Report totals: each count column summed over the records that know
    /// it, plus the policy's tallies. Measures such as water levels are
    /// per-record readings and are never summed.
    pub fn totals(&self, snapshot: &Snapshot) -> BTreeMap<String, i64> {
        let mut totals = BTreeMap::new();
        let records = snapshot.records();

        for column in self.layout.value_columns().filter(|c| c.kind == ColumnKind::Count) {
            let counts: Vec<i64> = records
                .iter()
                .filter_map(|r| match r.metric(&column.key) {
                    Some(MetricValue::Count(n)) => Some(*n),
                    _ => None,
                })
                .collect();
            if !counts.is_empty() {
                let sum = counts.iter().fold(0i64, |acc, n| acc.saturating_add(*n));
                totals.insert(column.key.clone(), sum);
            }
        }

        for tally in &self.tallies {
            let (key, count) = match tally {
                Tally::Records { key } => (key, records.len()),
                Tally::Distinct { key, metric } => {
                    let distinct: BTreeSet<String> = records
                        .iter()
                        .filter_map(|r| category(r, metric))
                        .map(str::to_lowercase)
                        .collect();
                    (key, distinct.len())
                }
                Tally::Matching {
                    key,
                    metric,
                    values,
                } => {
                    let matching = records
                        .iter()
                        .filter_map(|r| category(r, metric))
                        .filter(|c| values.iter().any(|v| v.eq_ignore_ascii_case(c)))
                        .count();
                    (key, matching)
                }
            };
            totals.insert(key.clone(), count as i64);
        }

        totals
    }

    pub fn matches_listing_link(&self, text: &str, href: &str) -> bool {
        let text = text.to_lowercase();
        let href = href.to_lowercase();
        self.listing_keywords.iter().any(|keyword| {
            let keyword = keyword.to_lowercase();
            text.contains(&keyword) || href.contains(&keyword.replace(' ', "_"))
        })
    }
}

/// Built-in policies for every report type, optionally overridden from YAML
#[derive(Debug, Clone)]
pub struct PolicyTable {
    policies: HashMap<ReportType, ReportPolicy>,
}

impl PolicyTable {
    pub fn new() -> Self {
        let mut policies = HashMap::new();
        for policy in [
            situation_policy(),
            landslide_policy(),
            river_flood_policy(),
            weather_policy(),
        ] {
            policies.insert(policy.report_type, policy);
        }
        Self { policies }
    }

    pub fn get(&self, report_type: ReportType) -> Option<&ReportPolicy> {
        self.policies.get(&report_type)
    }

    pub fn insert(&mut self, policy: ReportPolicy) {
        self.policies.insert(policy.report_type, policy);
    }

    pub fn load_policy_from_file(&mut self, path: &str) -> Result<()> {
        let content =
            fs::read_to_string(path).with_context(|| format!("reading policy file {path}"))?;
        let policy: ReportPolicy = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing policy file {path}"))?;
        self.insert(policy);
        Ok(())
    }

    /// Policies in `ReportType::ALL` order
    pub fn iter(&self) -> impl Iterator<Item = &ReportPolicy> {
        ReportType::ALL
            .iter()
            .filter_map(move |report_type| self.policies.get(report_type))
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::new()
    }
}

fn stop_labels() -> Vec<String> {
    ["total", "grand total", "district", "districts", "no", "sl no", "s no"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn footer_markers() -> Vec<String> {
    ["prepared by", "source:", "note:", "director", "*", "disaster management centre"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn district_column() -> ColumnSpec {
    ColumnSpec::new(
        "district",
        "District",
        &["districts", "district name", "name of district"],
        ColumnKind::Label,
    )
}

fn situation_policy() -> ReportPolicy {
    use ColumnKind::*;
    ReportPolicy {
        report_type: ReportType::Situation,
        listing_keywords: vec!["situation".to_string(), "sitrep".to_string()],
        region: RegionPolicy::SingleTable {
            anchors: vec!["District".to_string(), "Affected".to_string()],
        },
        layout: TableLayout {
            columns: vec![
                district_column(),
                ColumnSpec::new(
                    "families_affected",
                    "Families Affected",
                    &["affected families", "no of families affected", "families"],
                    Count,
                ),
                ColumnSpec::new(
                    "affected",
                    "Affected",
                    &["people affected", "persons affected", "affected people", "affected persons", "people"],
                    Count,
                ),
                ColumnSpec::new("deaths", "Deaths", &["death", "dead", "deaths reported"], Count),
                ColumnSpec::new("missing", "Missing", &["missing persons", "missing people"], Count),
                ColumnSpec::new(
                    "houses_fully_damaged",
                    "Houses Fully Damaged",
                    &["fully damaged", "houses damaged fully", "fully", "fully damaged houses"],
                    Count,
                ),
                ColumnSpec::new(
                    "houses_partially_damaged",
                    "Houses Partially Damaged",
                    &["partially damaged", "houses damaged partially", "partially", "partly damaged"],
                    Count,
                ),
                ColumnSpec::new(
                    "safety_centers",
                    "Safety Centers",
                    &["safety centres", "no of safety centers", "safe locations", "welfare centers"],
                    Count,
                ),
                ColumnSpec::new(
                    "families_displaced",
                    "Families Displaced",
                    &["displaced families", "families in safety centers", "families in safety centres"],
                    Count,
                ),
                ColumnSpec::new(
                    "displaced",
                    "Displaced",
                    &["people displaced", "persons displaced", "displaced people", "people in safety centers", "people in safety centres"],
                    Count,
                ),
            ],
            stop_labels: stop_labels(),
            footer_markers: footer_markers(),
        },
        gazetteer: GazetteerKind::Districts,
        derived: Vec::new(),
        tallies: vec![Tally::Records {
            key: "districts_reported".to_string(),
        }],
    }
}

fn landslide_policy() -> ReportPolicy {
    use ColumnKind::*;
    ReportPolicy {
        report_type: ReportType::Landslide,
        listing_keywords: vec![
            "landslide".to_string(),
            "ew_report".to_string(),
            "early warning".to_string(),
        ],
        region: RegionPolicy::PageRange {
            first: 3,
            last: 5,
            anchors: vec!["Level 1".to_string(), "Yellow".to_string(), "District".to_string()],
        },
        layout: TableLayout {
            columns: vec![
                district_column(),
                ColumnSpec::new("level_1_divisions", "Level 1 (Yellow)", &["level 1", "yellow", "level i"], List),
                ColumnSpec::new("level_2_divisions", "Level 2 (Amber)", &["level 2", "amber", "level ii"], List),
                ColumnSpec::new("level_3_divisions", "Level 3 (Red)", &["level 3", "red", "level iii"], List),
            ],
            stop_labels: stop_labels(),
            footer_markers: footer_markers(),
        },
        gazetteer: GazetteerKind::Districts,
        derived: vec![DerivedMetric::HighestListLevel {
            key: "alert_level".to_string(),
            levels: vec![
                ("level_1_divisions".to_string(), "yellow".to_string()),
                ("level_2_divisions".to_string(), "amber".to_string()),
                ("level_3_divisions".to_string(), "red".to_string()),
            ],
            none_label: "none".to_string(),
        }],
        tallies: ["yellow", "amber", "red"]
            .iter()
            .map(|level| Tally::Matching {
                key: format!("districts_{level}"),
                metric: "alert_level".to_string(),
                values: vec![level.to_string()],
            })
            .collect(),
    }
}

fn river_flood_policy() -> ReportPolicy {
    use ColumnKind::*;
    ReportPolicy {
        report_type: ReportType::RiverFlood,
        listing_keywords: vec!["water".to_string(), "rainfall".to_string(), "flood".to_string()],
        region: RegionPolicy::Page {
            page: 2,
            anchors: vec!["Gauging Station".to_string(), "Water Level".to_string()],
        },
        layout: TableLayout {
            columns: vec![
                ColumnSpec::new("station", "Gauging Station", &["station", "gauging stations", "hydrometric station"], Label),
                ColumnSpec::new("river_basin", "River Basin", &["basin"], Category),
                ColumnSpec::new("tributary", "Tributary", &["tributory", "river", "tributary river"], Category),
                ColumnSpec::new("unit", "Unit", &["units"], Category),
                ColumnSpec::new("alert_level_m", "Alert Level", &["alert"], Measure),
                ColumnSpec::new("minor_flood_level_m", "Minor Flood Level", &["minor flood", "minor"], Measure),
                ColumnSpec::new("major_flood_level_m", "Major Flood Level", &["major flood", "major"], Measure),
                ColumnSpec::new(
                    "water_level_previous",
                    "Previous Water Level",
                    &["previous water level", "earlier water level"],
                    Measure,
                ),
                ColumnSpec::new(
                    "water_level",
                    "Water Level",
                    &["current water level", "water level at", "present water level"],
                    Measure,
                )
                .with_earlier_key("water_level_previous"),
                ColumnSpec::new("remarks", "Remarks", &["status", "flood status"], Category),
                ColumnSpec::new("trend", "Trend", &["rising falling", "water level trend"], Category),
                ColumnSpec::new(
                    "rainfall_mm",
                    "Rainfall (mm)",
                    &["rainfall", "6 hour rainfall", "rainfall mm", "24 hr rainfall"],
                    Measure,
                ),
            ],
            stop_labels: vec!["station".to_string(), "gauging station".to_string(), "total".to_string()],
            footer_markers: footer_markers(),
        },
        gazetteer: GazetteerKind::GaugingStations,
        derived: Vec::new(),
        tallies: vec![
            Tally::Records {
                key: "total_stations".to_string(),
            },
            Tally::Distinct {
                key: "total_basins".to_string(),
                metric: "river_basin".to_string(),
            },
            station_tally("stations_with_alert", "remarks", "alert"),
            station_tally("stations_normal", "remarks", "normal"),
            station_tally("stations_rising", "trend", "rising"),
            station_tally("stations_falling", "trend", "falling"),
        ],
    }
}

fn station_tally(key: &str, metric: &str, value: &str) -> Tally {
    Tally::Matching {
        key: key.to_string(),
        metric: metric.to_string(),
        values: vec![value.to_string()],
    }
}

fn weather_policy() -> ReportPolicy {
    use ColumnKind::*;
    ReportPolicy {
        report_type: ReportType::Weather,
        listing_keywords: vec!["weather".to_string(), "forecast".to_string()],
        region: RegionPolicy::Page {
            page: 3,
            anchors: vec!["District".to_string(), "Rainfall".to_string()],
        },
        layout: TableLayout {
            columns: vec![
                district_column(),
                ColumnSpec::new(
                    "rainfall_mm",
                    "Rainfall (mm)",
                    &["rainfall", "expected rainfall", "rainfall mm"],
                    Measure,
                ),
                ColumnSpec::new("forecast", "Forecast", &["weather", "condition", "remarks"], Category),
            ],
            stop_labels: stop_labels(),
            footer_markers: footer_markers(),
        },
        gazetteer: GazetteerKind::Districts,
        derived: Vec::new(),
        tallies: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DistrictName, SnapshotKey};
    use chrono::NaiveDate;

    fn situation_layout() -> TableLayout {
        PolicyTable::new()
            .get(ReportType::Situation)
            .unwrap()
            .layout
            .clone()
    }

    #[test]
    fn every_report_type_has_a_policy() {
        let table = PolicyTable::new();
        for report_type in ReportType::ALL {
            let policy = table.get(report_type).unwrap();
            assert_eq!(policy.report_type, report_type);
            assert!(policy.layout.label_column().is_some());
        }
    }

    #[test]
    fn longest_alias_wins() {
        let layout = situation_layout();
        assert_eq!(layout.resolve("Families affected").unwrap().key, "families_affected");
        assert_eq!(layout.resolve("Affected").unwrap().key, "affected");
        assert_eq!(layout.resolve("No. of People Affected").unwrap().key, "affected");
        assert_eq!(layout.resolve("Houses Damaged Fully").unwrap().key, "houses_fully_damaged");
        assert_eq!(
            layout.resolve("People in Safety Centers").unwrap().key,
            "displaced"
        );
        assert_eq!(layout.resolve("Safety Centres").unwrap().key, "safety_centers");
    }

    #[test]
    fn aliases_match_whole_words_only() {
        let landslide = PolicyTable::new()
            .get(ReportType::Landslide)
            .unwrap()
            .layout
            .clone();
        // "red" must not match inside "covered"
        assert!(landslide.resolve("Areas covered").is_none());
        assert_eq!(landslide.resolve("Level 3 (Red)").unwrap().key, "level_3_divisions");
        assert_eq!(landslide.resolve("Level 1 Yellow").unwrap().key, "level_1_divisions");
    }

    #[test]
    fn stop_labels_and_footers() {
        let layout = situation_layout();
        assert!(layout.is_stop_label("TOTAL"));
        assert!(layout.is_stop_label("Total (as at 12.00)"));
        assert!(layout.is_stop_label("District"));
        assert!(!layout.is_stop_label("Colombo"));
        assert!(layout.is_footer_line("Prepared by: Emergency Operation Centre"));
        assert!(!layout.is_footer_line("Kandy 10 20"));
    }

    #[test]
    fn listing_keywords_match_text_or_href() {
        let table = PolicyTable::new();
        let landslide = table.get(ReportType::Landslide).unwrap();
        assert!(landslide.matches_listing_link("Early Warning 2025-01-15", "/x.pdf"));
        assert!(landslide.matches_listing_link("", "/images/early_warning_0115.pdf"));
        assert!(!landslide.matches_listing_link("Situation Report", "/sitrep.pdf"));
    }

    fn snapshot(report_type: ReportType, records: Vec<(&str, Vec<(&str, MetricValue)>)>) -> Snapshot {
        Snapshot::new(
            SnapshotKey::on_date(report_type, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()),
            "https://dmc.test/report.pdf",
            "digest",
            records
                .into_iter()
                .map(|(name, metrics)| DistrictRecord {
                    district: DistrictName::Canonical(name.to_string()),
                    metrics: metrics.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
                })
                .collect(),
        )
    }

    #[test]
    fn situation_totals_sum_counts_and_skip_unknowns() {
        use MetricValue::*;
        let policy = PolicyTable::new().get(ReportType::Situation).unwrap().clone();
        let snapshot = snapshot(
            ReportType::Situation,
            vec![
                ("Colombo", vec![("affected", Count(150)), ("deaths", Count(2))]),
                ("Kandy", vec![("affected", Count(20)), ("deaths", Unknown)]),
                ("Galle", vec![("affected", Unknown), ("deaths", Unknown)]),
            ],
        );

        let totals = policy.totals(&snapshot);
        assert_eq!(totals["affected"], 170);
        assert_eq!(totals["deaths"], 2);
        assert_eq!(totals["districts_reported"], 3);
        assert!(!totals.contains_key("missing"));
    }

    #[test]
    fn river_totals_tally_stations_instead_of_summing_levels() {
        use MetricValue::*;
        let policy = PolicyTable::new().get(ReportType::RiverFlood).unwrap().clone();
        let snapshot = snapshot(
            ReportType::RiverFlood,
            vec![
                (
                    "Hanwella",
                    vec![
                        ("river_basin", Category("Kelani Ganga".into())),
                        ("remarks", Category("Alert".into())),
                        ("trend", Category("Rising".into())),
                        ("alert_level_m", Measure(7.0)),
                        ("water_level", Measure(7.5)),
                    ],
                ),
                (
                    "Glencourse",
                    vec![
                        ("river_basin", Category("Kelani Ganga".into())),
                        ("remarks", Category("Normal".into())),
                        ("trend", Category("Falling".into())),
                        ("water_level", Measure(3.2)),
                    ],
                ),
                (
                    "Putupaula",
                    vec![
                        ("river_basin", Category("Kalu Ganga".into())),
                        ("remarks", Category("Normal".into())),
                        ("trend", Unknown),
                    ],
                ),
            ],
        );

        let expected: BTreeMap<String, i64> = [
            ("stations_falling", 1),
            ("stations_normal", 2),
            ("stations_rising", 1),
            ("stations_with_alert", 1),
            ("total_basins", 2),
            ("total_stations", 3),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        assert_eq!(policy.totals(&snapshot), expected);
    }

    #[test]
    fn timed_water_level_headers_share_one_column() {
        let river = PolicyTable::new().get(ReportType::RiverFlood).unwrap().layout.clone();
        let column = river.resolve("Water Level at 0600hrs").unwrap();
        assert_eq!(column.key, "water_level");
        assert_eq!(column.earlier_key.as_deref(), Some("water_level_previous"));
        assert_eq!(river.resolve("Water Level at 0900hrs").unwrap().key, "water_level");
        assert_eq!(river.resolve("Previous Water Level").unwrap().key, "water_level_previous");
    }

    #[test]
    fn policy_round_trips_through_yaml() {
        let policy = PolicyTable::new().get(ReportType::Landslide).unwrap().clone();
        let yaml = serde_yaml::to_string(&policy).unwrap();
        let parsed: ReportPolicy = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, policy);
    }
}
