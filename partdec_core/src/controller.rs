//! Top-level run loop: builds a plan, wires up cancellation, the source
//! pool, the dispatcher, and progress reporting, then waits for every part
//! to finish or for the run to be aborted. The interrupt handler is
//! installed once up front; every fetch is joined before a final
//! aggregate error (if any) is reported.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::DownloadConfig;
use crate::error::PartdecError;
use crate::governor::{Governor, MAX_CONCURRENT_FETCH};
use crate::plan::{self, DownloadPlan};
use crate::pool::SourcePool;
use crate::progress::{ProgressEvent, ProgressNotifier, ProgressObserver};

/// Ring size for the source pool, independent of part count (spec's
/// governor sizing: a handful of live connections serve however many
/// parts the plan has).
const SOURCE_POOL_CAPACITY: usize = 64;

pub struct RunOutcome {
    pub plan: DownloadPlan,
}

/// Runs a full download: plans, fetches every part concurrently under the
/// governor, and reports aggregate success/failure. `observers` receive
/// live progress; the caller decides what they render (terminal bars,
/// logs, nothing).
pub async fn run(
    cfg: DownloadConfig,
    observers: Vec<Box<dyn ProgressObserver>>,
) -> Result<RunOutcome, PartdecError> {
    let client = build_client(&cfg)?;

    let plan = plan::build_plan(&cfg, client.clone()).await?;
    log::info!(
        "planned {} part(s) for {:?} ({} bytes)",
        plan.parts.len(),
        plan.name,
        plan.data_size
    );

    let governor = Arc::new(Governor::new(cfg.max_concurrent.max(1).min(MAX_CONCURRENT_FETCH)));
    governor.install_interrupt_handler();

    let headers = cfg.io_mode.header_map()?;
    let factory = plan::source_factory(plan.source_kind, cfg.uri.clone(), client, headers, cfg.io_mode.timeout);
    let pool = Arc::new(SourcePool::new(SOURCE_POOL_CAPACITY, factory));

    let (progress_tx, progress_rx) = mpsc::channel::<Result<ProgressEvent, String>>(256);

    let mut notifier = ProgressNotifier::new();
    for observer in observers {
        notifier.add_observer(observer);
    }
    let notifier_task = tokio::spawn(notifier.run(progress_rx));

    let mut tasks = crate::dispatcher::dispatch(&plan, pool, governor.clone(), cfg.io_mode.retry, progress_tx.clone()).await;
    drop(progress_tx);

    let mut joined: Option<PartdecError> = None;
    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                if e.is_terminal() {
                    governor.cancel();
                }
                joined = Some(PartdecError::join(joined, e));
            }
            Err(join_err) => {
                joined = Some(PartdecError::join(joined, PartdecError::Abort(join_err.to_string())));
            }
        }
    }

    let _ = notifier_task.await;

    match joined {
        Some(e) => Err(e),
        None => Ok(RunOutcome { plan }),
    }
}

/// Builds the shared client with no whole-request timeout: `IOMode.timeout`
/// is a per-response-header deadline applied around each individual
/// `.send()` call in `source::http` instead, so a large part on a slow
/// link isn't aborted mid-transfer once its response has started.
fn build_client(cfg: &DownloadConfig) -> Result<reqwest::Client, PartdecError> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(if cfg.io_mode.no_conn_reuse { 0 } else { 8 })
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(PartdecError::Network)
}
