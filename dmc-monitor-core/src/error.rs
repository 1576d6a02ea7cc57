use crate::types::{ReportType, Stage};
use thiserror::Error;

/// Errors that abort a refresh. Row-level problems are `Warning`s instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source unavailable ({url}): {reason}")]
    SourceUnavailable { url: String, reason: String },

    #[error("no {report_type} report found on the listing page")]
    NoReportsFound { report_type: ReportType },

    #[error("layout mismatch for {report_type} report: {detail}")]
    LayoutMismatch {
        report_type: ReportType,
        detail: String,
    },

    /// `raw_region` carries the located text so the failure can be inspected offline
    #[error("table extraction failed: {reason}")]
    ExtractionFailed { reason: String, raw_region: String },

    #[error("cannot diff a {current} snapshot against a {previous} snapshot")]
    ReportTypeMismatch {
        current: ReportType,
        previous: ReportType,
    },

    #[error("snapshot store error: {0}")]
    Store(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::SourceUnavailable { .. } | PipelineError::NoReportsFound { .. } => {
                Stage::Fetch
            }
            PipelineError::LayoutMismatch { .. } => Stage::Locate,
            PipelineError::ExtractionFailed { .. } => Stage::Extract,
            PipelineError::ReportTypeMismatch { .. } => Stage::Diff,
            PipelineError::Store(_) => Stage::Store,
            PipelineError::Config(_) => Stage::Config,
        }
    }

    /// Transient failures worth retrying on the next scheduled run
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::SourceUnavailable { .. } | PipelineError::NoReportsFound { .. }
        )
    }

    pub fn raw_region(&self) -> Option<&str> {
        match self {
            PipelineError::ExtractionFailed { raw_region, .. } => Some(raw_region),
            _ => None,
        }
    }

    pub(crate) fn store(err: anyhow::Error) -> Self {
        PipelineError::Store(format!("{err:#}"))
    }
}

/// A failed refresh: which report, which stage, and why
#[derive(Debug, Error)]
#[error("refresh of {report_type} report failed at {stage} stage: {source}")]
pub struct RefreshError {
    pub report_type: ReportType,
    pub stage: Stage,
    #[source]
    pub source: PipelineError,
}

impl RefreshError {
    pub fn new(report_type: ReportType, source: PipelineError) -> Self {
        Self {
            report_type,
            stage: source.stage(),
            source,
        }
    }
}
