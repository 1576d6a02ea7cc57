//! Snapshot differ. Pure and deterministic: output order follows the sorted
//! district keys and metric keys of the inputs.

use crate::error::PipelineError;
use crate::types::*;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Delta {
    Count(i64),
    Measure(f64),
    Categorical { changed: bool },
    Unknown,
}

impl Delta {
    pub fn is_zero(&self) -> bool {
        match self {
            Delta::Count(n) => *n == 0,
            Delta::Measure(v) => *v == 0.0,
            Delta::Categorical { changed } => !changed,
            Delta::Unknown => false,
        }
    }

    fn between(previous: &MetricValue, current: &MetricValue) -> Self {
        use MetricValue::*;
        match (previous, current) {
            (Unknown, _) | (_, Unknown) => Delta::Unknown,
            (Count(p), Count(c)) => Delta::Count(c - p),
            (p, c) => match (p.as_f64(), c.as_f64()) {
                (Some(p), Some(c)) => Delta::Measure(c - p),
                _ => Delta::Categorical { changed: p != c },
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DistrictStatus {
    Present,
    New,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistrictChange {
    pub district: DistrictName,
    pub status: DistrictStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffResult {
    pub district: DistrictName,
    pub metric: String,
    pub previous: MetricValue,
    pub current: MetricValue,
    pub delta: Delta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffReport {
    pub report_type: ReportType,
    pub current: SnapshotKey,
    pub previous: Option<SnapshotKey>,
    /// No earlier snapshot existed; every district is `New` and `results` is empty
    pub no_baseline: bool,
    pub districts: Vec<DistrictChange>,
    pub results: Vec<DiffResult>,
}

impl DiffReport {
    /// Results whose delta is non-zero (unknown deltas included)
    pub fn changed(&self) -> impl Iterator<Item = &DiffResult> {
        self.results.iter().filter(|r| !r.delta.is_zero())
    }

    pub fn with_status(&self, status: DistrictStatus) -> impl Iterator<Item = &DistrictName> {
        self.districts
            .iter()
            .filter(move |d| d.status == status)
            .map(|d| &d.district)
    }
}

pub fn diff(current: &Snapshot, previous: Option<&Snapshot>) -> Result<DiffReport, PipelineError> {
    let Some(previous) = previous else {
        return Ok(DiffReport {
            report_type: current.report_type(),
            current: current.key(),
            previous: None,
            no_baseline: true,
            districts: current
                .records()
                .iter()
                .map(|r| DistrictChange {
                    district: r.district.clone(),
                    status: DistrictStatus::New,
                })
                .collect(),
            results: Vec::new(),
        });
    };

    if current.report_type() != previous.report_type() {
        return Err(PipelineError::ReportTypeMismatch {
            current: current.report_type(),
            previous: previous.report_type(),
        });
    }

    let names: BTreeSet<&DistrictName> = current
        .records()
        .iter()
        .chain(previous.records())
        .map(|r| &r.district)
        .collect();

    let mut districts = Vec::new();
    let mut results = Vec::new();
    for name in names {
        let now = current.records().iter().find(|r| &r.district == name);
        let before = previous.records().iter().find(|r| &r.district == name);
        let status = match (before, now) {
            (Some(before), Some(now)) => {
                let metrics: BTreeSet<&String> =
                    now.metrics.keys().chain(before.metrics.keys()).collect();
                for metric in metrics {
                    let previous_value = before.metric(metric).cloned().unwrap_or(MetricValue::Unknown);
                    let current_value = now.metric(metric).cloned().unwrap_or(MetricValue::Unknown);
                    results.push(DiffResult {
                        district: name.clone(),
                        metric: metric.clone(),
                        delta: Delta::between(&previous_value, &current_value),
                        previous: previous_value,
                        current: current_value,
                    });
                }
                DistrictStatus::Present
            }
            (None, Some(_)) => DistrictStatus::New,
            _ => DistrictStatus::Removed,
        };
        districts.push(DistrictChange {
            district: name.clone(),
            status,
        });
    }

    Ok(DiffReport {
        report_type: current.report_type(),
        current: current.key(),
        previous: Some(previous.key()),
        no_baseline: false,
        districts,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn snapshot(report_type: ReportType, day: u32, records: Vec<(&str, Vec<(&str, MetricValue)>)>) -> Snapshot {
        Snapshot::new(
            SnapshotKey::on_date(report_type, NaiveDate::from_ymd_opt(2024, 1, day).unwrap()),
            "https://example.org/report.pdf",
            "digest",
            records
                .into_iter()
                .map(|(name, metrics)| DistrictRecord {
                    district: DistrictName::Canonical(name.to_string()),
                    metrics: metrics
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v))
                        .collect::<BTreeMap<_, _>>(),
                })
                .collect(),
        )
    }

    #[test]
    fn colombo_affected_grows_by_fifty() {
        let previous = snapshot(ReportType::Situation, 1, vec![("Colombo", vec![("affected", MetricValue::Count(100))])]);
        let current = snapshot(ReportType::Situation, 2, vec![("Colombo", vec![("affected", MetricValue::Count(150))])]);

        let report = diff(&current, Some(&previous)).unwrap();
        assert_eq!(
            report.results,
            vec![DiffResult {
                district: DistrictName::Canonical("Colombo".into()),
                metric: "affected".into(),
                previous: MetricValue::Count(100),
                current: MetricValue::Count(150),
                delta: Delta::Count(50),
            }]
        );
        assert!(!report.no_baseline);
    }

    #[test]
    fn self_diff_is_all_zero() {
        let s = snapshot(
            ReportType::RiverFlood,
            1,
            vec![
                ("Hanwella", vec![("water_level", MetricValue::Measure(4.2)), ("trend", MetricValue::Category("Rising".into()))]),
                ("Glencourse", vec![("water_level", MetricValue::Measure(2.0))]),
            ],
        );
        let report = diff(&s, Some(&s)).unwrap();
        assert!(report.results.iter().all(|r| r.delta.is_zero()));
        assert_eq!(report.changed().count(), 0);
        assert!(report.districts.iter().all(|d| d.status == DistrictStatus::Present));
    }

    #[test]
    fn no_baseline_marks_everything_new() {
        let s = snapshot(ReportType::Situation, 1, vec![("Colombo", vec![]), ("Kandy", vec![])]);
        let report = diff(&s, None).unwrap();
        assert!(report.no_baseline);
        assert!(report.results.is_empty());
        assert_eq!(report.with_status(DistrictStatus::New).count(), 2);
    }

    #[test]
    fn unknown_sides_and_membership_changes() {
        let previous = snapshot(
            ReportType::Situation,
            1,
            vec![("Colombo", vec![("deaths", MetricValue::Unknown)]), ("Galle", vec![])],
        );
        let current = snapshot(
            ReportType::Situation,
            2,
            vec![("Colombo", vec![("deaths", MetricValue::Count(3))]), ("Matara", vec![])],
        );
        let report = diff(&current, Some(&previous)).unwrap();
        assert_eq!(report.results[0].delta, Delta::Unknown);

        let statuses: Vec<_> = report
            .districts
            .iter()
            .map(|d| (d.district.key(), d.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("Colombo", DistrictStatus::Present),
                ("Galle", DistrictStatus::Removed),
                ("Matara", DistrictStatus::New),
            ]
        );
    }

    #[test]
    fn categorical_and_mixed_numeric_deltas() {
        assert_eq!(
            Delta::between(&MetricValue::Category("none".into()), &MetricValue::Category("red".into())),
            Delta::Categorical { changed: true }
        );
        assert_eq!(
            Delta::between(&MetricValue::Count(2), &MetricValue::Measure(2.5)),
            Delta::Measure(0.5)
        );
    }

    #[test]
    fn different_report_types_do_not_diff() {
        let a = snapshot(ReportType::Situation, 1, vec![]);
        let b = snapshot(ReportType::Weather, 1, vec![]);
        let err = diff(&a, Some(&b)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ReportTypeMismatch { current: ReportType::Situation, previous: ReportType::Weather }
        ));
    }
}
