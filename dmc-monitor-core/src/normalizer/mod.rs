//! Normalizer: raw rows → `Snapshot`.
//!
//! Never fails on a bad row. Rows without a name are skipped, names outside
//! the gazetteer become `Unresolved`, unreadable values become `Unknown`, and
//! each of these is reported as a `Warning`.

pub mod gazetteer;
pub mod values;

use crate::config::ExtractionConfig;
use crate::dates;
use crate::policy::{ColumnKind, ColumnSpec, DerivedMetric, ReportPolicy, TableLayout};
use crate::types::*;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

pub use gazetteer::{Gazetteer, Place};

#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizerOptions {
    /// Read dash cells as zero instead of unknown
    pub dash_as_zero: bool,
}

impl From<&ExtractionConfig> for NormalizerOptions {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            dash_as_zero: config.dash_as_zero,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedSnapshot {
    pub snapshot: Snapshot,
    pub warnings: Vec<Warning>,
}

pub struct Normalizer<'a> {
    policy: &'a ReportPolicy,
    gazetteer: &'static Gazetteer,
    options: NormalizerOptions,
}

impl<'a> Normalizer<'a> {
    pub fn new(policy: &'a ReportPolicy, options: NormalizerOptions) -> Self {
        Self {
            policy,
            gazetteer: Gazetteer::for_kind(policy.gazetteer),
            options,
        }
    }

    /// Normalize an extracted table, using its left-to-right column order
    /// to tell repeated readings apart
    pub fn normalize_table(
        &self,
        table: &RawTable,
        key: SnapshotKey,
        source_url: &str,
        source_digest: &str,
    ) -> NormalizedSnapshot {
        self.normalize_ordered(&table.rows, &table.columns, key, source_url, source_digest)
    }

    pub fn normalize(
        &self,
        rows: &[RawRow],
        key: SnapshotKey,
        source_url: &str,
        source_digest: &str,
    ) -> NormalizedSnapshot {
        self.normalize_ordered(rows, &[], key, source_url, source_digest)
    }

    fn normalize_ordered(
        &self,
        rows: &[RawRow],
        column_order: &[String],
        key: SnapshotKey,
        source_url: &str,
        source_digest: &str,
    ) -> NormalizedSnapshot {
        let layout = &self.policy.layout;
        let mut warnings = Vec::new();
        let mut records: BTreeMap<DistrictName, BTreeMap<String, MetricValue>> = BTreeMap::new();
        let mut resolved_labels: HashMap<&str, Option<&ColumnSpec>> = HashMap::new();

        for (index, row) in rows.iter().enumerate() {
            let mut candidates: HashMap<&str, Vec<(&str, &str)>> = HashMap::new();
            for (label, text) in row {
                let column = *resolved_labels
                    .entry(label.as_str())
                    .or_insert_with(|| layout.resolve(label));
                match column {
                    Some(column) => candidates
                        .entry(column.key.as_str())
                        .or_default()
                        .push((label.as_str(), text.as_str())),
                    None => debug!(label = %label, "ignoring column with no known metric"),
                }
            }
            let cells = route_cells(layout, candidates, column_order);

            let label = layout
                .label_column()
                .and_then(|c| cells.get(c.key.as_str()))
                .map(|l| crate::extractor::clean_cell(l))
                .unwrap_or_default();
            if label.is_empty() {
                warnings.push(Warning::row(Stage::Normalize, index, "row has no name, skipped"));
                continue;
            }
            if layout.is_stop_label(&label) {
                continue;
            }

            let district = match self.gazetteer.resolve(&label) {
                Some(place) => DistrictName::Canonical(place.name.to_string()),
                None => {
                    warnings.push(Warning::row(
                        Stage::Normalize,
                        index,
                        format!("'{label}' is not a known name, kept as unresolved"),
                    ));
                    DistrictName::Unresolved(label)
                }
            };

            let mut metrics = BTreeMap::new();
            for column in layout.value_columns() {
                let text = cells.get(column.key.as_str()).copied();
                let value = match self.parse_value(column, text) {
                    Ok(value) => value,
                    Err(reason) => {
                        warnings.push(Warning::row(
                            Stage::Normalize,
                            index,
                            format!("{}: {reason}, recorded as unknown", column.key),
                        ));
                        MetricValue::Unknown
                    }
                };
                metrics.insert(column.key.clone(), value);
            }

            match records.get_mut(&district) {
                Some(existing) => {
                    for conflict in merge_metrics(existing, metrics) {
                        warnings.push(Warning::row(
                            Stage::Normalize,
                            index,
                            format!("duplicate row for {district}: kept the first {conflict} value"),
                        ));
                    }
                }
                None => {
                    records.insert(district, metrics);
                }
            }
        }

        let records = records
            .into_iter()
            .map(|(district, mut metrics)| {
                for derived in &self.policy.derived {
                    let (key, value) = derive(derived, &metrics);
                    metrics.insert(key, value);
                }
                DistrictRecord { district, metrics }
            })
            .collect();

        NormalizedSnapshot {
            snapshot: Snapshot::new(key, source_url, source_digest, records),
            warnings,
        }
    }

    fn parse_value(&self, column: &ColumnSpec, text: Option<&str>) -> Result<MetricValue, String> {
        let Some(text) = text else {
            return Ok(MetricValue::Unknown);
        };
        let dash_as_zero = self.options.dash_as_zero;
        match column.kind {
            ColumnKind::Count => values::parse_count(text, dash_as_zero),
            ColumnKind::Measure => values::parse_measure(text, dash_as_zero),
            ColumnKind::Category => Ok(values::parse_category(text)),
            ColumnKind::List => Ok(values::parse_list(text)),
            ColumnKind::Label => Ok(MetricValue::Category(text.to_string())),
        }
    }
}

/// Put labels that resolved to the same column in reading order: by the
/// time of day in the label when every label has one, otherwise by table
/// column position. The sort is stable, so unknown positions keep row order.
fn order_labels(found: &mut [(&str, &str)], column_order: &[String]) {
    let all_timed = found.iter().all(|(label, _)| dates::find_time(label).is_some());
    found.sort_by_key(|(label, _)| {
        let time = if all_timed { dates::find_time(label) } else { None };
        let position = column_order
            .iter()
            .position(|c| c == label)
            .unwrap_or(usize::MAX);
        (time, position)
    });
}

/// One cell text per metric key. A column with an `earlier_key` takes its
/// latest reading and hands the one before to `earlier_key`; any other
/// column takes its first non-empty cell.
fn route_cells<'r>(
    layout: &'r TableLayout,
    mut candidates: HashMap<&str, Vec<(&'r str, &'r str)>>,
    column_order: &[String],
) -> HashMap<&'r str, &'r str> {
    let mut cells = HashMap::new();
    let mut routed = Vec::new();

    for column in &layout.columns {
        let Some(mut found) = candidates.remove(column.key.as_str()) else {
            continue;
        };
        order_labels(&mut found, column_order);
        match (&column.earlier_key, found.as_slice()) {
            (Some(earlier_key), [.., (_, before), (_, latest)]) => {
                if found.len() > 2 {
                    debug!(column = %column.key, readings = found.len(), "keeping the last two readings");
                }
                cells.insert(column.key.as_str(), *latest);
                routed.push((earlier_key.as_str(), *before));
            }
            _ => {
                let text = found
                    .iter()
                    .map(|(_, text)| *text)
                    .find(|text| !text.trim().is_empty())
                    .unwrap_or(found[0].1);
                cells.insert(column.key.as_str(), text);
            }
        }
    }

    // A header naming the earlier reading outright wins over a routed one
    for (key, text) in routed {
        cells.entry(key).or_insert(text);
    }
    cells
}

/// Fold a duplicate row into `existing`; returns the metrics that disagreed
fn merge_metrics(
    existing: &mut BTreeMap<String, MetricValue>,
    incoming: BTreeMap<String, MetricValue>,
) -> Vec<String> {
    let mut conflicts = Vec::new();
    for (key, value) in incoming {
        match (existing.get_mut(&key), value) {
            (Some(MetricValue::List(items)), MetricValue::List(more)) => {
                for item in more {
                    if !items.contains(&item) {
                        items.push(item);
                    }
                }
            }
            (Some(current), value) if current.is_unknown() => *current = value,
            (Some(current), value) => {
                if !value.is_unknown() && *current != value {
                    conflicts.push(key);
                }
            }
            (None, value) => {
                existing.insert(key, value);
            }
        }
    }
    conflicts
}

fn derive(derived: &DerivedMetric, metrics: &BTreeMap<String, MetricValue>) -> (String, MetricValue) {
    match derived {
        DerivedMetric::HighestListLevel {
            key,
            levels,
            none_label,
        } => {
            let mut any_unknown = false;
            let mut highest = None;
            for (list_key, label) in levels {
                match metrics.get(list_key) {
                    Some(MetricValue::List(items)) if !items.is_empty() => highest = Some(label),
                    Some(MetricValue::List(_)) => {}
                    _ => any_unknown = true,
                }
            }
            let value = match highest {
                Some(label) => MetricValue::Category(label.clone()),
                None if any_unknown => MetricValue::Unknown,
                None => MetricValue::Category(none_label.clone()),
            };
            (key.clone(), value)
        }
    }
}

impl Snapshot {
    /// Render records back into raw rows under canonical column labels.
    /// Unknown values are left out, derived metrics are not rendered.
    pub fn to_raw_rows(&self, layout: &TableLayout) -> Vec<RawRow> {
        let Some(label_column) = layout.label_column() else {
            return Vec::new();
        };
        self.records()
            .iter()
            .map(|record| {
                let mut row = RawRow::new();
                row.insert(label_column.label.clone(), record.district.key().to_string());
                for column in layout.value_columns() {
                    let text = match record.metric(&column.key) {
                        None | Some(MetricValue::Unknown) => continue,
                        Some(MetricValue::List(items)) => items.join(", "),
                        Some(value) => value.to_string(),
                    };
                    row.insert(column.label.clone(), text);
                }
                row
            })
            .collect()
    }
}
