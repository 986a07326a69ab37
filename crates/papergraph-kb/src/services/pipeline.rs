//! Loads a directory of batch files, one atomic batch per file.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, warn, Instrument};

use crate::data::{errors::CoreError, trace_context::TraceContext};
use crate::services::batch_reader::{discover_batch_files, read_batch_file};
use crate::services::loader::{BatchReport, GraphLoader, UpsertReport};

/// A file that was not loaded, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Totals for one load run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub files_loaded: usize,
    pub skipped_files: Vec<SkippedFile>,
    pub nodes: UpsertReport,
    pub relationships: UpsertReport,
    pub label_conflicts: usize,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl RunSummary {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            elapsed: Duration::ZERO,
            files_loaded: 0,
            skipped_files: Vec::new(),
            nodes: UpsertReport::default(),
            relationships: UpsertReport::default(),
            label_conflicts: 0,
        }
    }

    fn add(&mut self, report: &BatchReport) {
        self.files_loaded += 1;
        add_counts(&mut self.nodes, &report.nodes);
        add_counts(&mut self.relationships, &report.relationships);
        self.label_conflicts += report.label_conflicts;
    }
}

fn add_counts(total: &mut UpsertReport, report: &UpsertReport) {
    total.processed += report.processed;
    total.skipped += report.skipped;
    total.unmatched += report.unmatched;
}

/// Drives a [`GraphLoader`] over batch files.
pub struct LoadPipeline {
    loader: GraphLoader,
}

impl LoadPipeline {
    pub fn new(loader: GraphLoader) -> Self {
        Self { loader }
    }

    /// Loads every batch file under `path` (or `path` itself when it is a file).
    ///
    /// Unreadable or malformed files in a directory are skipped; when `path` names
    /// the file itself, it is an error. A store failure that survives the retry
    /// policy stops the run; files loaded before it stay committed.
    pub async fn run_path(&self, path: &Path) -> Result<RunSummary, CoreError> {
        let root_ctx = TraceContext::new_root();
        let started = Instant::now();
        let mut summary = RunSummary::new(Utc::now());

        let files = discover_batch_files(path).await?;
        let single_file = files.len() == 1 && files[0].as_path() == path;

        // Fail before touching any file when the store is unreachable
        self.loader.store().ping().await?;
        info!(
            trace_id = %root_ctx.trace_id,
            "Loading {} batch files from {}",
            files.len(),
            path.display()
        );

        for file in &files {
            let ctx = root_ctx.new_child();
            let span = info_span!("batch_file", file = %file.display(), trace_id = %ctx.trace_id);

            let batch = match read_batch_file(file).instrument(span.clone()).await {
                Ok(batch) => batch,
                Err(source) if single_file => {
                    error!("Cannot load {}: {}", file.display(), source);
                    return Err(CoreError::BatchFile { path: file.clone(), source });
                },
                Err(reason) => {
                    warn!("Skipping {}: {}", file.display(), reason);
                    summary
                        .skipped_files
                        .push(SkippedFile { path: file.clone(), reason: reason.to_string() });
                    continue;
                },
            };

            match self.loader.load_batch(&ctx, &batch).instrument(span).await {
                Ok(report) => {
                    info!(
                        "Loaded {}: {} nodes, {} relationships ({} skipped records, {} unmatched)",
                        file.display(),
                        report.nodes.processed,
                        report.relationships.processed,
                        report.nodes.skipped + report.relationships.skipped,
                        report.relationships.unmatched
                    );
                    summary.add(&report);
                },
                Err(e) => {
                    error!(
                        "Aborting run at {} after {} loaded files: {}",
                        file.display(),
                        summary.files_loaded,
                        e
                    );
                    return Err(CoreError::ingestion_error_with_context(
                        format!("Failed to load {}", file.display()),
                        Some(&ctx),
                        Some(e),
                    ));
                },
            }
        }

        summary.elapsed = started.elapsed();
        info!(
            files_loaded = summary.files_loaded,
            files_skipped = summary.skipped_files.len(),
            nodes = summary.nodes.processed,
            relationships = summary.relationships.processed,
            unmatched = summary.relationships.unmatched,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Load run finished"
        );

        Ok(summary)
    }
}
