use crate::config::{ExtractorKind, MonitorConfig};
use crate::dates;
use crate::differ::{diff, DiffReport};
use crate::error::{PipelineError, RefreshError};
use crate::extractor::{ExtractorImpl, LayoutExtractor, LayoutOptions, ModelExtractor, TableExtractor};
use crate::fetcher::{Fetcher, HttpClient, ListingEntry, UreqClient};
use crate::locator::DocumentLocator;
use crate::normalizer::{Normalizer, NormalizerOptions};
use crate::policy::{PolicyTable, ReportPolicy};
use crate::preprocessors::{PdfPreprocessor, Preprocessor};
use crate::storage::{content_digest, SnapshotStore};
use crate::types::*;
use chrono::{Local, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, info_span, warn};
use uuid::Uuid;

/// Captured intermediate outputs from each pipeline stage
/// Used for testing and diagnostics: each stage boundary can be dumped and compared
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStages {
    /// Absent when the document came from a local file
    pub listing_entry: Option<ListingEntry>,
    /// Positioned XHTML for PDF reports
    pub markup: Option<String>,
    pub region_description: String,
    pub region_text: String,
    /// Name of the extractor that produced `raw_table`
    pub extractor: String,
    pub raw_table: RawTable,
    pub snapshot: Snapshot,
    pub warnings: Vec<Warning>,
}

/// Result of one successful refresh
#[derive(Debug, Clone, Serialize)]
pub struct RefreshOutcome {
    pub run_id: Uuid,
    pub snapshot: Snapshot,
    pub diff: DiffReport,
    pub warnings: Vec<Warning>,
    /// False when a snapshot with the same key was already stored
    pub appended: bool,
}

/// Simple profiler that collects timings for pipeline steps
pub struct StepProfiler {
    enabled: bool,
    timings: Vec<(String, Duration)>,
}

impl StepProfiler {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            timings: Vec::new(),
        }
    }

    pub fn time_step<F, R>(&mut self, step_name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if !self.enabled {
            return f();
        }

        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();

        self.timings.push((step_name.to_string(), elapsed));
        println!("⏱️  {}: {:.0}ms", step_name, elapsed.as_millis());

        result
    }

    pub fn timings(&self) -> &[(String, Duration)] {
        &self.timings
    }

    pub fn print_summary(&self) {
        if !self.enabled || self.timings.is_empty() {
            return;
        }

        println!("\n📊 Performance Summary:");
        let total: Duration = self.timings.iter().map(|(_, d)| *d).sum();

        for (step, duration) in &self.timings {
            let percentage = if total.is_zero() {
                0.0
            } else {
                (duration.as_secs_f64() / total.as_secs_f64()) * 100.0
            };
            println!(
                "   {:.<35} {:.0}ms ({:.1}%)",
                step,
                duration.as_millis(),
                percentage
            );
        }
        println!("   {:.<35} {:.0}ms", "Total", total.as_millis());
    }
}

/// The refresh pipeline: fetch → locate → extract → normalize → diff → store
pub struct Monitor {
    fetcher: Fetcher,
    preprocessor: Box<dyn Preprocessor>,
    extractor: ExtractorImpl,
    fallback: Option<ModelExtractor>,
    policies: PolicyTable,
    normalizer_options: NormalizerOptions,
    profiling: bool,
}

impl Monitor {
    /// Create a Monitor with full dependency injection
    pub fn new_with_dependencies(
        client: Box<dyn HttpClient>,
        preprocessor: Box<dyn Preprocessor>,
        config: &MonitorConfig,
    ) -> Result<Self, PipelineError> {
        let extraction = &config.extraction;
        let model_config = || {
            extraction.model.clone().ok_or_else(|| {
                PipelineError::Config(
                    "the model extractor needs an `extraction.model` section".to_string(),
                )
            })
        };

        let extractor = match extraction.extractor {
            ExtractorKind::Layout => {
                ExtractorImpl::Layout(LayoutExtractor::new(LayoutOptions::from(extraction)))
            }
            ExtractorKind::Model => ExtractorImpl::Model(ModelExtractor::new(model_config()?)),
        };
        let fallback = match extraction.extractor {
            ExtractorKind::Layout if extraction.model_fallback => {
                Some(ModelExtractor::new(model_config()?))
            }
            _ => None,
        };

        Ok(Self {
            fetcher: Fetcher::new(client, config.source.clone()),
            preprocessor,
            extractor,
            fallback,
            policies: config.policy_table(),
            normalizer_options: NormalizerOptions::from(extraction),
            profiling: false,
        })
    }

    /// Convenience constructor for CLI usage: live HTTP client and the
    /// pdf-extract backend
    pub fn from_config(config: &MonitorConfig) -> Result<Self, PipelineError> {
        Self::new_with_dependencies(
            Box::new(UreqClient::new(&config.source)),
            Box::new(PdfPreprocessor::default()),
            config,
        )
    }

    pub fn with_profiling(mut self, enabled: bool) -> Self {
        self.profiling = enabled;
        self
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    pub fn policy(&self, report_type: ReportType) -> Result<&ReportPolicy, PipelineError> {
        self.policies.get(report_type).ok_or_else(|| {
            PipelineError::Config(format!("no policy configured for {report_type} reports"))
        })
    }

    /// Fetch the newest report of `report_type`, diff it against the newest
    /// stored snapshot published before it and append it to the store
    pub fn refresh(
        &self,
        report_type: ReportType,
        store: &mut dyn SnapshotStore,
    ) -> Result<RefreshOutcome, RefreshError> {
        self.refresh_capture_stages(report_type, store)
            .map(|(outcome, _)| outcome)
    }

    /// `refresh`, also returning every intermediate for inspection
    pub fn refresh_capture_stages(
        &self,
        report_type: ReportType,
        store: &mut dyn SnapshotStore,
    ) -> Result<(RefreshOutcome, PipelineStages), RefreshError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("refresh", report_type = %report_type, run_id = %run_id);
        let _guard = span.enter();

        let mut profiler = StepProfiler::new(self.profiling);
        let result = self.run_refresh(run_id, report_type, store, &mut profiler);
        profiler.print_summary();

        result.map_err(|err| {
            warn!(stage = %err.stage(), "refresh failed: {}", err);
            RefreshError::new(report_type, err)
        })
    }

    fn run_refresh(
        &self,
        run_id: Uuid,
        report_type: ReportType,
        store: &mut dyn SnapshotStore,
        profiler: &mut StepProfiler,
    ) -> Result<(RefreshOutcome, PipelineStages), PipelineError> {
        let policy = self.policy(report_type)?;

        let entry = profiler.time_step("Fetch listing", || self.fetcher.latest_entry(policy))?;
        info!(title = %entry.title, url = %entry.href, "latest report on listing");
        let report =
            profiler.time_step("Download report", || self.fetcher.download(policy, &entry))?;

        let mut stages = self.process_report(&report, profiler)?;
        stages.listing_entry = Some(entry);

        // Store is read once and written at most once, after every other stage
        let history = profiler
            .time_step("Load snapshot history", || store.history(report_type))
            .map_err(PipelineError::store)?;

        let snapshot = stages.snapshot.clone();
        let stored = history.iter().find(|s| s.key() == snapshot.key());
        let already_stored = stored.is_some();
        match stored {
            Some(stored) if stored != &snapshot => {
                let message = format!(
                    "a different snapshot for {} is already stored; keeping the stored copy",
                    snapshot.key()
                );
                warn!("{}", message);
                stages.warnings.push(Warning::general(Stage::Store, message));
            }
            Some(_) => info!(key = %snapshot.key(), "snapshot already stored"),
            None => {}
        }

        // Baseline is the newest snapshot published strictly before this one,
        // so a re-run or an out-of-order refresh never diffs a report against itself
        let previous = history
            .iter()
            .rev()
            .find(|s| s.published() < snapshot.published());

        let diff_report =
            profiler.time_step("Diff against previous", || diff(&snapshot, previous))?;

        if !already_stored {
            profiler
                .time_step("Append snapshot", || store.append(snapshot.clone()))
                .map_err(PipelineError::store)?;
        }

        info!(
            records = snapshot.records().len(),
            changed = diff_report.changed().count(),
            warnings = stages.warnings.len(),
            appended = !already_stored,
            "refresh complete"
        );

        let outcome = RefreshOutcome {
            run_id,
            snapshot,
            diff: diff_report,
            warnings: stages.warnings.clone(),
            appended: !already_stored,
        };
        Ok((outcome, stages))
    }

    /// Run locate → extract → normalize on a local document, without the
    /// listing page or the store
    pub fn extract_document(
        &self,
        report_type: ReportType,
        bytes: Vec<u8>,
        source_name: &str,
    ) -> Result<PipelineStages, PipelineError> {
        let file_name = source_name.rsplit(['/', '\\']).next().unwrap_or(source_name);
        let report = Report {
            report_type,
            title: file_name.to_string(),
            published: dates::datetime_from_filename(file_name),
            source_url: source_name.to_string(),
            digest: content_digest(&bytes),
            content: ReportContent::from_bytes(bytes),
        };

        let mut profiler = StepProfiler::new(self.profiling);
        let result = self.process_report(&report, &mut profiler);
        profiler.print_summary();
        result
    }

    /// Locate, extract and normalize one downloaded report
    pub fn process_report(
        &self,
        report: &Report,
        profiler: &mut StepProfiler,
    ) -> Result<PipelineStages, PipelineError> {
        let policy = self.policy(report.report_type)?;
        let mut warnings = Vec::new();

        let located = profiler.time_step("Locate table region", || {
            DocumentLocator::new(self.preprocessor.as_ref()).locate(report, policy)
        })?;
        info!(region = %located.region.description, "located table region");

        let (raw_table, extractor) = profiler.time_step("Extract table", || {
            self.extract_with_fallback(&located.region, policy, &mut warnings)
        })?;
        info!(
            extractor = %extractor,
            rows = raw_table.rows.len(),
            columns = raw_table.columns.len(),
            "extracted table"
        );

        let published = resolve_published(report.published, located.published, &mut warnings);
        let key = SnapshotKey::new(report.report_type, published);

        let normalized = profiler.time_step("Normalize rows", || {
            Normalizer::new(policy, self.normalizer_options).normalize_table(
                &raw_table,
                key,
                &report.source_url,
                &report.digest,
            )
        });
        warnings.extend(normalized.warnings);

        let snapshot = normalized.snapshot;
        if snapshot.records().is_empty() {
            warnings.push(Warning::general(
                Stage::Normalize,
                "no district rows survived normalization",
            ));
        }

        Ok(PipelineStages {
            listing_entry: None,
            markup: located.markup,
            region_description: located.region.description,
            region_text: located.region.raw_text,
            extractor,
            raw_table,
            snapshot,
            warnings,
        })
    }

    fn extract_with_fallback(
        &self,
        region: &LocatedRegion,
        policy: &ReportPolicy,
        warnings: &mut Vec<Warning>,
    ) -> Result<(RawTable, String), PipelineError> {
        match self.extractor.extract(region, &policy.layout) {
            Ok(table) => Ok((table, self.extractor.name().to_string())),
            Err(err @ PipelineError::ExtractionFailed { .. }) => {
                let Some(fallback) = &self.fallback else {
                    return Err(err);
                };
                warn!(
                    "{} extractor failed ({}), retrying with {}",
                    self.extractor.name(),
                    err,
                    fallback.name()
                );
                warnings.push(Warning::general(
                    Stage::Extract,
                    format!(
                        "{} extractor failed ({}); rows came from the {} extractor",
                        self.extractor.name(),
                        err,
                        fallback.name()
                    ),
                ));
                let table = fallback.extract(region, &policy.layout)?;
                Ok((table, fallback.name().to_string()))
            }
            Err(err) => Err(err),
        }
    }
}

/// Publication time for the snapshot key.
///
/// The listing date is authoritative; the document's own header supplies the
/// time of day when it agrees on the date. Without either, the report is
/// filed under today at midnight.
fn resolve_published(
    listing: Option<NaiveDateTime>,
    document: Option<NaiveDateTime>,
    warnings: &mut Vec<Warning>,
) -> NaiveDateTime {
    match (listing, document) {
        (Some(listed), Some(stated)) if listed.date() == stated.date() => {
            if stated.time() != NaiveTime::MIN || listed.time() == NaiveTime::MIN {
                stated
            } else {
                listed
            }
        }
        (Some(listed), Some(stated)) => {
            warnings.push(Warning::general(
                Stage::Locate,
                format!(
                    "document states {} but the listing says {}; using the listing date",
                    stated.date(),
                    listed.date()
                ),
            ));
            listed
        }
        (Some(listed), None) => listed,
        (None, Some(stated)) => stated,
        (None, None) => {
            let today = Local::now().date_naive().and_time(NaiveTime::MIN);
            warnings.push(Warning::general(
                Stage::Locate,
                format!("no publication date found; filed under {}", today.date()),
            ));
            today
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::differ::{Delta, DistrictStatus};
    use crate::fetcher::StaticHttpClient;
    use crate::storage::InMemorySnapshotStore;
    use chrono::NaiveDate;

    const LISTING_URL: &str = "https://dmc.test/sitreps";
    const REPORT_URL: &str = "https://dmc.test/reports/Situation_Report_2024_01_02.html";

    const LISTING: &str = r#"<table>
      <tr><td>1</td><td>Situation Report</td><td>2024-01-02</td><td>0900 hrs</td>
      <td><a href="/reports/Situation_Report_2024_01_02.html">Download</a></td></tr>
    </table>"#;

    const REPORT: &str = r#"<html><body>
      <p>Situation Report on 2024.01.02 at 0900 hrs</p>
      <table>
        <tr><th>District</th><th>Families Affected</th><th>Affected</th><th>Deaths</th></tr>
        <tr><td>Colombo</td><td>40</td><td>150</td><td>-</td></tr>
        <tr><td>Rathnapura</td><td>10</td><td>35</td><td>1</td></tr>
        <tr><td>Total</td><td>50</td><td>185</td><td>1</td></tr>
      </table></body></html>"#;

    /// PDF path is never exercised here; HTML reports skip the preprocessor
    struct NoPdf;

    impl Preprocessor for NoPdf {
        fn parse_pdf_to_markup_language(&self, _pdf_bytes: &[u8]) -> anyhow::Result<String> {
            Err(anyhow::anyhow!("no PDF support in this test"))
        }

        fn parse_markup_to_preprocessor_output(
            &self,
            _markup: &str,
        ) -> anyhow::Result<PreprocessorOutput> {
            Err(anyhow::anyhow!("no PDF support in this test"))
        }

        fn name(&self) -> &str {
            "no-pdf"
        }
    }

    fn config() -> MonitorConfig {
        let mut config = MonitorConfig::default();
        config.source.base_url = "https://dmc.test".to_string();
        config
            .source
            .listing_urls
            .insert(ReportType::Situation, LISTING_URL.to_string());
        config
    }

    fn monitor(client: StaticHttpClient) -> Monitor {
        Monitor::new_with_dependencies(Box::new(client), Box::new(NoPdf), &config()).unwrap()
    }

    fn site() -> StaticHttpClient {
        StaticHttpClient::new()
            .with_page(LISTING_URL, LISTING)
            .with_page(REPORT_URL, REPORT)
    }

    fn colombo(snapshot: &Snapshot) -> &DistrictRecord {
        snapshot.record("Colombo").unwrap()
    }

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn first_refresh_has_no_baseline_and_appends() {
        let monitor = monitor(site());
        let mut store = InMemorySnapshotStore::new();

        let outcome = monitor.refresh(ReportType::Situation, &mut store).unwrap();
        assert!(outcome.appended);
        assert!(outcome.diff.no_baseline);
        assert_eq!(outcome.diff.with_status(DistrictStatus::New).count(), 2);
        assert_eq!(outcome.snapshot.published(), at(2, 9));
        assert_eq!(
            colombo(&outcome.snapshot).metric("affected"),
            Some(&MetricValue::Count(150))
        );
        assert_eq!(
            colombo(&outcome.snapshot).metric("deaths"),
            Some(&MetricValue::Unknown)
        );
        assert_eq!(store.append_count(), 1);
    }

    #[test]
    fn refresh_diffs_against_latest_stored_snapshot() {
        let monitor = monitor(site());
        let previous = Snapshot::new(
            SnapshotKey::new(ReportType::Situation, at(1, 18)),
            "https://dmc.test/reports/old.html",
            "old",
            vec![DistrictRecord {
                district: DistrictName::Canonical("Colombo".into()),
                metrics: [("affected".to_string(), MetricValue::Count(100))].into(),
            }],
        );
        let mut store = InMemorySnapshotStore::new().with_snapshot(previous);

        let outcome = monitor.refresh(ReportType::Situation, &mut store).unwrap();
        let affected = outcome
            .diff
            .results
            .iter()
            .find(|r| r.district.key() == "Colombo" && r.metric == "affected")
            .unwrap();
        assert_eq!(affected.delta, Delta::Count(50));
        assert_eq!(
            outcome.diff.with_status(DistrictStatus::New).collect::<Vec<_>>(),
            vec![&DistrictName::Canonical("Ratnapura".into())]
        );
        assert_eq!(store.len(), 2);
    }

    fn colombo_snapshot(published: NaiveDateTime, affected: i64) -> Snapshot {
        Snapshot::new(
            SnapshotKey::new(ReportType::Situation, published),
            "https://dmc.test/reports/other.html",
            "other",
            vec![DistrictRecord {
                district: DistrictName::Canonical("Colombo".into()),
                metrics: [("affected".to_string(), MetricValue::Count(affected))].into(),
            }],
        )
    }

    fn affected_delta(outcome: &RefreshOutcome) -> Delta {
        outcome
            .diff
            .results
            .iter()
            .find(|r| r.district.key() == "Colombo" && r.metric == "affected")
            .map(|r| r.delta.clone())
            .unwrap()
    }

    #[test]
    fn repeated_refresh_does_not_append_twice() {
        let monitor = monitor(site());
        let mut store = InMemorySnapshotStore::new();

        monitor.refresh(ReportType::Situation, &mut store).unwrap();
        let second = monitor.refresh(ReportType::Situation, &mut store).unwrap();

        assert!(!second.appended);
        assert_eq!(store.append_count(), 1);
        // The stored copy of the same report is never its own baseline
        assert!(second.diff.no_baseline);
        assert_eq!(second.diff.previous, None);
    }

    #[test]
    fn repeated_refresh_keeps_diffing_against_the_day_before() {
        let monitor = monitor(site());
        let mut store = InMemorySnapshotStore::new().with_snapshot(colombo_snapshot(at(1, 18), 100));

        let first = monitor.refresh(ReportType::Situation, &mut store).unwrap();
        let second = monitor.refresh(ReportType::Situation, &mut store).unwrap();

        assert!(first.appended);
        assert!(!second.appended);
        for outcome in [&first, &second] {
            assert_eq!(
                outcome.diff.previous,
                Some(SnapshotKey::new(ReportType::Situation, at(1, 18)))
            );
            assert_eq!(affected_delta(outcome), Delta::Count(50));
        }
    }

    #[test]
    fn older_report_diffs_against_what_preceded_it() {
        let monitor = monitor(site());
        let mut store = InMemorySnapshotStore::new()
            .with_snapshot(colombo_snapshot(at(1, 18), 120))
            .with_snapshot(colombo_snapshot(at(3, 9), 400));

        let outcome = monitor.refresh(ReportType::Situation, &mut store).unwrap();

        assert!(outcome.appended);
        assert_eq!(
            outcome.diff.previous,
            Some(SnapshotKey::new(ReportType::Situation, at(1, 18)))
        );
        assert_eq!(affected_delta(&outcome), Delta::Count(30));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn failed_fetch_leaves_store_untouched() {
        let monitor = monitor(StaticHttpClient::new().with_status(LISTING_URL, 503));
        let mut store = InMemorySnapshotStore::new();

        let err = monitor.refresh(ReportType::Situation, &mut store).unwrap_err();
        assert_eq!(err.stage, Stage::Fetch);
        assert!(matches!(err.source, PipelineError::SourceUnavailable { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn missing_report_table_fails_at_locate() {
        let client = StaticHttpClient::new()
            .with_page(LISTING_URL, LISTING)
            .with_page(REPORT_URL, "<html><body><p>Report withdrawn</p></body></html>");
        let mut store = InMemorySnapshotStore::new();

        let err = monitor(client)
            .refresh(ReportType::Situation, &mut store)
            .unwrap_err();
        assert_eq!(err.stage, Stage::Locate);
        assert!(store.is_empty());
    }

    #[test]
    fn captured_stages_carry_intermediates() {
        let monitor = monitor(site());
        let mut store = InMemorySnapshotStore::new();

        let (outcome, stages) = monitor
            .refresh_capture_stages(ReportType::Situation, &mut store)
            .unwrap();
        assert_eq!(stages.listing_entry.as_ref().unwrap().href, REPORT_URL);
        assert_eq!(stages.extractor, "layout");
        assert_eq!(stages.raw_table.rows.len(), 2);
        assert!(stages.region_text.contains("Rathnapura"));
        assert_eq!(stages.snapshot, outcome.snapshot);
    }

    #[test]
    fn local_documents_skip_listing_and_store() {
        let monitor = monitor(StaticHttpClient::new());
        let stages = monitor
            .extract_document(
                ReportType::Situation,
                REPORT.as_bytes().to_vec(),
                "downloads/Situation_Report_on_2024.01.02_at_0900hrs.html",
            )
            .unwrap();
        assert!(stages.listing_entry.is_none());
        assert_eq!(stages.snapshot.published(), at(2, 9));
        assert_eq!(stages.snapshot.records().len(), 2);
    }

    #[test]
    fn model_extractor_requires_model_section() {
        let mut config = config();
        config.extraction.extractor = ExtractorKind::Model;
        let result =
            Monitor::new_with_dependencies(Box::new(StaticHttpClient::new()), Box::new(NoPdf), &config);
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn publication_date_prefers_listing_and_borrows_document_time() {
        let mut warnings = Vec::new();
        let midnight = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_time(NaiveTime::MIN);

        assert_eq!(resolve_published(Some(midnight), Some(at(2, 18)), &mut warnings), at(2, 18));
        assert_eq!(resolve_published(Some(at(2, 9)), Some(midnight), &mut warnings), at(2, 9));
        assert!(warnings.is_empty());

        assert_eq!(resolve_published(Some(at(2, 9)), Some(at(1, 18)), &mut warnings), at(2, 9));
        assert_eq!(warnings.len(), 1);

        let today = resolve_published(None, None, &mut warnings);
        assert_eq!(today.time(), NaiveTime::MIN);
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn profiler_records_only_when_enabled() {
        let mut off = StepProfiler::new(false);
        assert_eq!(off.time_step("step", || 2 + 2), 4);
        assert!(off.timings().is_empty());

        let mut on = StepProfiler::new(true);
        on.time_step("step", || ());
        assert_eq!(on.timings().len(), 1);
    }
}
