// DMC Monitor Core Library
//
// Fetches Disaster Management Centre reports, locates the data table for each
// report type, extracts and normalizes per-district rows into dated snapshots,
// and diffs each new snapshot against the last stored one.

pub mod types;
pub mod error;
pub mod dates;
pub mod config;
pub mod policy;
pub mod fetcher;
pub mod preprocessors;
pub mod locator;
pub mod extractor;
pub mod normalizer;
pub mod differ;
pub mod storage;
pub mod processor;
pub mod export;

// Re-export main types and functions for easy use
pub use types::*;
pub use error::{PipelineError, RefreshError};
pub use config::MonitorConfig;
pub use policy::{PolicyTable, ReportPolicy};
pub use fetcher::{Fetcher, HttpClient, StaticHttpClient, UreqClient};
pub use preprocessors::{PdfPreprocessor, Preprocessor};
pub use locator::DocumentLocator;
pub use extractor::{ExtractorImpl, TableExtractor};
pub use normalizer::{Gazetteer, Normalizer};
pub use differ::{diff, DiffReport, DiffResult, Delta};
pub use storage::{FileSnapshotStore, InMemorySnapshotStore, SnapshotStore};
pub use processor::{Monitor, PipelineStages, RefreshOutcome};
