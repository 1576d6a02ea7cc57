//! Output formats for snapshots: the stored JSON form, GeoJSON for maps, and
//! a flat row list for spreadsheets and quick inspection.

pub mod geojson;

use crate::policy::ReportPolicy;
use crate::types::*;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

pub use geojson::to_feature_collection;

/// One metric of one district
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatRow {
    pub district: String,
    pub resolved: bool,
    pub metric: String,
    /// Display form of the value; `unknown` when the report left it out
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct FlatSnapshot {
    pub format: String,
    pub report_type: ReportType,
    pub published: chrono::NaiveDateTime,
    pub rows: Vec<FlatRow>,
}

impl Snapshot {
    pub fn to_flat_format(&self) -> FlatSnapshot {
        let rows = self
            .records()
            .iter()
            .flat_map(|record| {
                record.metrics.iter().map(move |(metric, value)| FlatRow {
                    district: record.district.key().to_string(),
                    resolved: record.district.is_resolved(),
                    metric: metric.clone(),
                    value: value.to_string(),
                })
            })
            .collect();

        FlatSnapshot {
            format: "flat".to_string(),
            report_type: self.report_type(),
            published: self.published(),
            rows,
        }
    }

    /// Write the snapshot as `snapshot` (default), `geojson` or `flat` JSON
    pub fn save_with_format(
        &self,
        path: impl AsRef<Path>,
        format: &str,
        policy: &ReportPolicy,
    ) -> Result<()> {
        let path = path.as_ref();
        let json = match format {
            "geojson" => serde_json::to_string_pretty(&to_feature_collection(self, policy))?,
            "flat" => serde_json::to_string_pretty(&self.to_flat_format())?,
            _ => serde_json::to_string_pretty(self)?,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}
