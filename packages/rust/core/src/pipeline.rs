//! End-to-end harvest: catalog → detail extraction → execution → JSON files.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use queryharvest_crawler::{CatalogLister, DetailExtractor, HttpClient};
use queryharvest_shared::{ExecutionResult, ExecutionStatus, HarvestError, PipelineConfig, Result};
use queryharvest_sparql::QueryExecutor;
use queryharvest_storage::ExampleWriter;

/// Where an entry went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extraction,
    Execution,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extraction => f.write_str("extraction"),
            Self::Execution => f.write_str("execution"),
        }
    }
}

/// What happened to one catalog entry.
#[derive(Debug, Clone)]
pub enum EntryOutcome {
    /// Example written; `execution` is the attached outcome.
    Written {
        id: String,
        path: PathBuf,
        execution: ExecutionResult,
    },
    /// Nothing written for this entry.
    ExtractionFailed { id: String, cause: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFailure {
    pub id: String,
    pub stage: Stage,
    pub cause: String,
}

/// Result of a harvest run.
#[derive(Debug, Clone)]
pub struct HarvestSummary {
    /// Unique catalog entries processed.
    pub total: usize,
    /// Examples written to disk.
    pub written: usize,
    pub extraction_failures: usize,
    /// Written examples whose execution failed.
    pub execution_failures: usize,
    /// Every per-entry failure in catalog order.
    pub failures: Vec<EntryFailure>,
    pub elapsed: Duration,
}

impl HarvestSummary {
    pub fn from_outcomes(outcomes: &[EntryOutcome], elapsed: Duration) -> Self {
        let mut summary = Self {
            total: outcomes.len(),
            written: 0,
            extraction_failures: 0,
            execution_failures: 0,
            failures: Vec::new(),
            elapsed,
        };

        for outcome in outcomes {
            match outcome {
                EntryOutcome::Written { id, execution, .. } => {
                    summary.written += 1;
                    if execution.status == ExecutionStatus::Failed {
                        summary.execution_failures += 1;
                        summary.failures.push(EntryFailure {
                            id: id.clone(),
                            stage: Stage::Execution,
                            cause: execution.error.clone().unwrap_or_default(),
                        });
                    }
                }
                EntryOutcome::ExtractionFailed { id, cause } => {
                    summary.extraction_failures += 1;
                    summary.failures.push(EntryFailure {
                        id: id.clone(),
                        stage: Stage::Extraction,
                        cause: cause.clone(),
                    });
                }
            }
        }

        summary
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each entry has been handled.
    fn entry_done(&self, outcome: &EntryOutcome, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, summary: &HarvestSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn entry_done(&self, _outcome: &EntryOutcome, _current: usize, _total: usize) {}
    fn done(&self, _summary: &HarvestSummary) {}
}

/// Run the full harvest.
///
/// Fatal: output directory setup, catalog listing and file writes. Anything
/// that goes wrong with a single entry's detail document is recorded in the
/// summary and the run moves on.
#[instrument(skip_all, fields(catalog = %config.catalog_url, out = %config.output_dir.display()))]
pub async fn run_harvest<E: QueryExecutor>(
    config: &PipelineConfig,
    executor: &E,
    progress: &dyn ProgressReporter,
) -> Result<HarvestSummary> {
    let start = Instant::now();

    let mut writer = ExampleWriter::create(&config.output_dir)?;
    let mut client = HttpClient::new(config)?;

    progress.phase("Listing catalog");
    let entries = CatalogLister::new(config).list(&mut client).await?;
    info!(entries = entries.len(), execute = config.execute, "starting harvest");

    progress.phase("Harvesting examples");
    let extractor = DetailExtractor::new(config.timestamps);
    let total = entries.len();
    let mut outcomes = Vec::with_capacity(total);

    for (i, entry) in entries.iter().enumerate() {
        let outcome = match extractor.extract(&mut client, entry).await {
            Ok(mut example) => {
                let execution = if config.execute {
                    client
                        .throttled(executor.execute(&example.sparql, Some(&entry.id)))
                        .await
                } else {
                    ExecutionResult::skipped()
                };
                example.execution = Some(execution.clone());

                let path = writer.write(&example)?;
                EntryOutcome::Written {
                    id: entry.id.clone(),
                    path,
                    execution,
                }
            }
            Err(e @ (HarvestError::Extraction { .. } | HarvestError::Network { .. })) => {
                warn!(id = %entry.id, error = %e, "skipping entry");
                EntryOutcome::ExtractionFailed {
                    id: entry.id.clone(),
                    cause: e.cause(),
                }
            }
            Err(e) => return Err(e),
        };

        progress.entry_done(&outcome, i + 1, total);
        outcomes.push(outcome);
    }

    let summary = HarvestSummary::from_outcomes(&outcomes, start.elapsed());
    progress.done(&summary);

    info!(
        total = summary.total,
        written = summary.written,
        extraction_failures = summary.extraction_failures,
        execution_failures = summary.execution_failures,
        elapsed_ms = summary.elapsed.as_millis(),
        "harvest complete"
    );

    Ok(summary)
}
