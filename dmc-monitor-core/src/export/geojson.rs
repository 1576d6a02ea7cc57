//! GeoJSON rendition of a snapshot for map layers.
//!
//! One Point feature per resolved record whose gazetteer entry carries
//! coordinates. Records that cannot be placed are listed in the collection's
//! metadata instead of being dropped silently.

use crate::normalizer::Gazetteer;
use crate::policy::ReportPolicy;
use crate::types::{MetricValue, Snapshot};
use serde_json::{json, Map, Value};

/// Plain JSON value for a metric; unknown becomes `null`
pub fn property_value(value: &MetricValue) -> Value {
    match value {
        MetricValue::Count(n) => json!(n),
        MetricValue::Measure(v) => json!(v),
        MetricValue::Category(s) => json!(s),
        MetricValue::List(items) => json!(items),
        MetricValue::Unknown => Value::Null,
    }
}

pub fn to_feature_collection(snapshot: &Snapshot, policy: &ReportPolicy) -> Value {
    let gazetteer = Gazetteer::for_kind(policy.gazetteer);
    let mut features = Vec::new();
    let mut unplaced = Vec::new();

    for record in snapshot.records() {
        let coordinates = record
            .district
            .is_resolved()
            .then(|| gazetteer.place(record.district.key()))
            .flatten()
            .and_then(|place| place.coordinates.map(|c| (place, c)));

        let Some((place, (lat, lon))) = coordinates else {
            unplaced.push(record.district.key().to_string());
            continue;
        };

        let mut properties = Map::new();
        properties.insert("district".to_string(), json!(place.name));
        properties.insert("area".to_string(), json!(place.area));
        for (key, value) in &record.metrics {
            properties.insert(key.clone(), property_value(value));
        }

        features.push(json!({
            "type": "Feature",
            // GeoJSON positions are [longitude, latitude]
            "geometry": { "type": "Point", "coordinates": [lon, lat] },
            "properties": properties,
        }));
    }

    json!({
        "type": "FeatureCollection",
        "metadata": {
            "report_type": snapshot.report_type(),
            "published": snapshot.published(),
            "source_url": snapshot.source_url(),
            "schema_version": snapshot.schema_version(),
            "unplaced": unplaced,
        },
        "totals": policy.totals(snapshot),
        "features": features,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyTable;
    use crate::types::*;
    use chrono::NaiveDate;

    fn record(name: DistrictName, affected: MetricValue) -> DistrictRecord {
        DistrictRecord {
            district: name,
            metrics: [
                ("affected".to_string(), affected),
                ("deaths".to_string(), MetricValue::Unknown),
            ]
            .into(),
        }
    }

    fn snapshot(report_type: ReportType, records: Vec<DistrictRecord>) -> Snapshot {
        Snapshot::new(
            SnapshotKey::on_date(report_type, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()),
            "https://dmc.test/report.pdf",
            "digest",
            records,
        )
    }

    #[test]
    fn resolved_districts_become_points() {
        let snapshot = snapshot(
            ReportType::Situation,
            vec![
                record(DistrictName::Canonical("Colombo".into()), MetricValue::Count(150)),
                record(DistrictName::Canonical("Kandy".into()), MetricValue::Count(20)),
                record(DistrictName::Unresolved("Colombo North".into()), MetricValue::Count(5)),
            ],
        );
        let policy = PolicyTable::new().get(ReportType::Situation).unwrap().clone();
        let collection = to_feature_collection(&snapshot, &policy);

        let features = collection["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);

        let colombo = &features[0];
        assert_eq!(colombo["geometry"]["coordinates"], json!([79.8612, 6.9271]));
        assert_eq!(colombo["properties"]["district"], "Colombo");
        assert_eq!(colombo["properties"]["area"], "Western");
        assert_eq!(colombo["properties"]["affected"], 150);
        assert!(colombo["properties"]["deaths"].is_null());

        assert_eq!(collection["metadata"]["unplaced"], json!(["Colombo North"]));
        assert_eq!(collection["totals"]["affected"], 175);
        assert_eq!(collection["totals"]["districts_reported"], 3);
    }

    #[test]
    fn stations_without_coordinates_are_unplaced() {
        let snapshot = snapshot(
            ReportType::RiverFlood,
            vec![record(
                DistrictName::Canonical("Hanwella".into()),
                MetricValue::Measure(4.2),
            )],
        );
        let policy = PolicyTable::new().get(ReportType::RiverFlood).unwrap().clone();
        let collection = to_feature_collection(&snapshot, &policy);
        assert!(collection["features"].as_array().unwrap().is_empty());
        assert_eq!(collection["metadata"]["unplaced"], json!(["Hanwella"]));
        assert_eq!(collection["totals"]["total_stations"], 1);
        assert!(collection["totals"].get("affected").is_none());
    }

    #[test]
    fn lists_and_categories_keep_their_shape() {
        assert_eq!(
            property_value(&MetricValue::List(vec!["Ella".into(), "Passara".into()])),
            json!(["Ella", "Passara"])
        );
        assert_eq!(property_value(&MetricValue::Category("red".into())), json!("red"));
        assert_eq!(property_value(&MetricValue::Measure(2.5)), json!(2.5));
    }
}
