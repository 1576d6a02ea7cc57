//! Fetcher: finds the newest report of a type on the DMC listing page and
//! downloads it.

pub mod http;
pub mod listing;

use crate::config::SourceConfig;
use crate::error::PipelineError;
use crate::policy::ReportPolicy;
use crate::storage::content_digest;
use crate::types::{Report, ReportContent};
use std::time::Duration;
use tracing::{info, warn};

pub use http::{HttpClient, StaticHttpClient, UreqClient};
pub use listing::ListingEntry;

pub struct Fetcher {
    client: Box<dyn HttpClient>,
    source: SourceConfig,
}

impl Fetcher {
    pub fn new(client: Box<dyn HttpClient>, source: SourceConfig) -> Self {
        Self { client, source }
    }

    pub fn source(&self) -> &SourceConfig {
        &self.source
    }

    /// Run `request`, retrying `SourceUnavailable` up to `max_attempts` with
    /// exponential backoff
    fn with_retry<T>(
        &self,
        url: &str,
        request: impl Fn() -> Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        let attempts = self.source.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match request() {
                Err(err @ PipelineError::SourceUnavailable { .. }) if attempt < attempts => {
                    let backoff = backoff_delay(self.source.backoff_ms, attempt);
                    warn!(
                        "{} (attempt {}/{}), backing off {:.1}s",
                        err,
                        attempt,
                        attempts,
                        backoff.as_secs_f64()
                    );
                    std::thread::sleep(backoff);
                    attempt += 1;
                }
                result => {
                    if attempt > 1 {
                        info!(url, attempt, "request finished after retry");
                    }
                    return result;
                }
            }
        }
    }

    /// Newest qualifying entry on the listing page for `policy`'s report type
    pub fn latest_entry(&self, policy: &ReportPolicy) -> Result<ListingEntry, PipelineError> {
        let report_type = policy.report_type;
        let listing_url = self.source.listing_url(report_type).ok_or_else(|| {
            PipelineError::Config(format!("no listing URL configured for {report_type} reports"))
        })?;

        let html = self.with_retry(listing_url, || self.client.get_text(listing_url))?;
        let entries = listing::parse_listing(&html, &self.source.base_url, policy);
        info!(
            listing_url,
            entries = entries.len(),
            "parsed {} listing",
            report_type
        );

        listing::latest_entry(&entries)
            .cloned()
            .ok_or(PipelineError::NoReportsFound { report_type })
    }

    /// Download the document behind a listing entry
    pub fn download(
        &self,
        policy: &ReportPolicy,
        entry: &ListingEntry,
    ) -> Result<Report, PipelineError> {
        let bytes = self.with_retry(&entry.href, || self.client.get_bytes(&entry.href))?;
        let digest = content_digest(&bytes);
        let content = ReportContent::from_bytes(bytes);
        info!(
            url = %entry.href,
            kind = content.kind(),
            bytes = content.as_bytes().len(),
            "downloaded report"
        );

        Ok(Report {
            report_type: policy.report_type,
            title: entry.title.clone(),
            published: entry.published,
            source_url: entry.href.clone(),
            content,
            digest,
        })
    }

    /// Latest published report of `policy`'s type
    pub fn fetch_latest(&self, policy: &ReportPolicy) -> Result<Report, PipelineError> {
        let entry = self.latest_entry(policy)?;
        self.download(policy, &entry)
    }
}

/// Wait before retry number `attempt` (1-based): `base_ms` doubled per attempt,
/// pinned at `u64::MAX` milliseconds rather than wrapping
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(factor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyTable;
    use crate::types::ReportType;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    const LISTING_URL: &str = "https://dmc.test/listing";

    fn source(max_attempts: u32) -> SourceConfig {
        SourceConfig {
            base_url: "https://dmc.test".to_string(),
            listing_urls: BTreeMap::from([(ReportType::Situation, LISTING_URL.to_string())]),
            max_attempts,
            backoff_ms: 1,
            ..SourceConfig::default()
        }
    }

    fn sitrep_policy() -> ReportPolicy {
        PolicyTable::new().get(ReportType::Situation).unwrap().clone()
    }

    #[test]
    fn downloads_latest_report() {
        let client = StaticHttpClient::new()
            .with_page(
                LISTING_URL,
                r#"<a href="/r/Situation_Report_on_2024.01.02_at_1200hrs.pdf">Situation Report</a>"#,
            )
            .with_page(
                "https://dmc.test/r/Situation_Report_on_2024.01.02_at_1200hrs.pdf",
                "%PDF-1.5 fake",
            );
        let fetcher = Fetcher::new(Box::new(client), source(1));

        let report = fetcher.fetch_latest(&sitrep_policy()).unwrap();
        assert_eq!(report.report_type, ReportType::Situation);
        assert_eq!(report.content.kind(), "pdf");
        assert_eq!(report.digest, content_digest(b"%PDF-1.5 fake"));
        assert!(report.published.is_some());
    }

    #[test]
    fn empty_listing_is_no_reports_found() {
        let client = StaticHttpClient::new().with_page(LISTING_URL, "<html><body>No reports</body></html>");
        let fetcher = Fetcher::new(Box::new(client), source(1));

        let err = fetcher.fetch_latest(&sitrep_policy()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::NoReportsFound { report_type: ReportType::Situation }
        ));
    }

    #[test]
    fn unreachable_listing_is_source_unavailable() {
        let client = StaticHttpClient::new().with_status(LISTING_URL, 503);
        let fetcher = Fetcher::new(Box::new(client), source(1));

        match fetcher.fetch_latest(&sitrep_policy()).unwrap_err() {
            PipelineError::SourceUnavailable { url, reason } => {
                assert_eq!(url, LISTING_URL);
                assert_eq!(reason, "HTTP 503");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn retries_only_when_configured() {
        let client = Arc::new(StaticHttpClient::new().with_status(LISTING_URL, 503));
        let fetcher = Fetcher::new(Box::new(Arc::clone(&client)), source(3));
        assert!(fetcher.fetch_latest(&sitrep_policy()).is_err());
        assert_eq!(client.requests().len(), 3);

        let policy = PolicyTable::new().get(ReportType::Weather).unwrap().clone();
        let err = fetcher.fetch_latest(&policy).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        assert_eq!(backoff_delay(500, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(500, 3), Duration::from_millis(2000));
        assert_eq!(backoff_delay(500, 64), Duration::from_millis(u64::MAX));
        assert_eq!(backoff_delay(u64::MAX, 2), Duration::from_millis(u64::MAX));
        assert_eq!(backoff_delay(0, 200), Duration::ZERO);
    }
}
