//! One end-to-end run: load, dedupe, stage, dispatch

use std::path::PathBuf;
use std::sync::Arc;

use eyre::{Context, Result};
use rand::seq::IndexedRandom;
use tokio::time::Instant;
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use crate::artifact::{ArtifactSink, JsonFileSink};
use crate::config::Config;
use crate::domain::{Candidate, exclude_seen, unique_candidates};
use crate::lookup::{DryRunHandler, ExecutorTotals, LookupExecutor, LookupTransport, PersonApiClient};
use crate::scheduler::{DispatchSummary, Dispatcher, EligibilityQueue, ItemHandler, StagedItem, plan, stage};
use crate::source::{append_history, hour_floor, read_candidates, read_history};

/// Inputs for a run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub input: PathBuf,
    pub history: Option<PathBuf>,
    pub sample: Option<usize>,
    pub dry_run: bool,
}

/// Candidates ready for staging, with counts of what was filtered out
#[derive(Debug, Default)]
pub struct Prepared {
    pub candidates: Vec<Candidate>,
    pub loaded: usize,
    pub rejected: usize,
    pub duplicates: usize,
    pub already_processed: usize,
}

/// Result of a completed run
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub staged: usize,
    pub dispatch: DispatchSummary,
    /// Lookup outcomes; `None` for dry runs
    pub totals: Option<ExecutorTotals>,
}

/// Load candidates and drop duplicates and already-processed items
pub fn prepare(opts: &RunOptions) -> Result<Prepared> {
    debug!(?opts, "prepare: called");
    let report = read_candidates(&opts.input).context("Failed to load work items")?;
    let loaded = report.candidates.len();

    let unique = unique_candidates(report.candidates);
    let duplicates = loaded - unique.len();

    let mut candidates = match &opts.history {
        Some(path) => {
            let history = read_history(path).context("Failed to load history")?;
            exclude_seen(unique, &history, Candidate::key)
        }
        None => unique,
    };
    let already_processed = loaded - duplicates - candidates.len();

    if let Some(n) = opts.sample
        && n < candidates.len()
    {
        debug!(n, "prepare: sampling candidates");
        candidates = candidates.choose_multiple(&mut rand::rng(), n).cloned().collect();
    }

    info!(
        loaded,
        rejected = report.rejected,
        duplicates,
        already_processed,
        remaining = candidates.len(),
        "Prepared work items"
    );

    Ok(Prepared {
        candidates,
        loaded,
        rejected: report.rejected,
        duplicates,
        already_processed,
    })
}

/// Staged schedule for a set of candidates, without dispatching
pub fn schedule(config: &Config, prepared: &Prepared) -> Result<Vec<StagedItem>> {
    config.validate()?;
    Ok(plan(prepared.candidates.clone(), &config.rate_limit))
}

/// Run against the real API and artifact directory (or log-only for dry runs)
pub async fn execute(config: &Config, prepared: Prepared, opts: &RunOptions) -> Result<RunReport> {
    debug!(dry_run = opts.dry_run, "execute: called");
    config.validate()?;

    if opts.dry_run {
        let queue = Arc::new(EligibilityQueue::new());
        return run_on_queue(config, prepared, opts, queue, Arc::new(DryRunHandler::new()), |_| None).await;
    }

    let transport: Arc<dyn LookupTransport> =
        Arc::new(PersonApiClient::from_config(&config.lookup).context("Failed to create lookup client")?);
    let sink: Arc<dyn ArtifactSink> =
        Arc::new(JsonFileSink::open(&config.output.out_dir).context("Failed to open output directory")?);
    execute_with(config, prepared, opts, transport, sink).await
}

/// Run with an explicit transport and sink
pub async fn execute_with(
    config: &Config,
    prepared: Prepared,
    opts: &RunOptions,
    transport: Arc<dyn LookupTransport>,
    sink: Arc<dyn ArtifactSink>,
) -> Result<RunReport> {
    debug!("execute_with: called");
    config.validate()?;
    let queue = Arc::new(EligibilityQueue::new());
    let executor = Arc::new(LookupExecutor::new(transport, sink, Arc::clone(&queue), &config.scheduler));
    run_on_queue(config, prepared, opts, queue, executor, |e| Some(e.totals())).await
}

async fn run_on_queue<H: ItemHandler>(
    config: &Config,
    prepared: Prepared,
    opts: &RunOptions,
    queue: Arc<EligibilityQueue>,
    handler: Arc<H>,
    totals: impl Fn(&H) -> Option<ExecutorTotals>,
) -> Result<RunReport> {
    let run_id = Uuid::now_v7();
    let span = info_span!("run", %run_id);

    async move {
        let window = hour_floor(chrono::Local::now().naive_local());
        info!(%window, items = prepared.candidates.len(), "Begin | process work items");

        let planned = plan(prepared.candidates.clone(), &config.rate_limit);
        let staged = stage(&queue, planned, Instant::now()).await;

        if let Some(path) = &opts.history
            && !opts.dry_run
        {
            append_history(path, &prepared.candidates).context("Failed to update history")?;
        }

        let dispatcher = Dispatcher::new(config.scheduler.clone(), Arc::clone(&queue), Arc::clone(&handler));
        let dispatch = dispatcher.run().await?;

        info!(%window, dispatched = dispatch.dispatched, "End | process work items");
        Ok::<_, eyre::Report>(RunReport {
            run_id,
            staged,
            dispatch,
            totals: totals(&handler),
        })
    }
    .instrument(span)
    .await
}
