//! Walks a plan's parts in order, skipping ones that don't need work, and
//! spawns a worker task per remaining part under the governor's semaphore.
//! Parts can already be `Completed`/`Broken` from a prior run, so this is
//! a per-part walk rather than a flat worker-count loop.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::error::PartdecError;
use crate::governor::Governor;
use crate::part::PartState;
use crate::plan::DownloadPlan;
use crate::pool::SourcePool;
use crate::progress::ProgressEvent;
use crate::worker;

/// Spawns one worker per part that still needs fetching, returning the
/// `JoinSet` the controller awaits. Parts already `Completed` are skipped
/// entirely (and reported once so progress totals add up); `Broken` parts
/// are skipped too — clearing a `Broken` part is a `--reset` decision made
/// at plan time, not something the dispatcher retries on its own.
pub async fn dispatch(
    plan: &DownloadPlan,
    pool: Arc<SourcePool>,
    governor: Arc<Governor>,
    max_retries: u32,
    progress_tx: mpsc::Sender<Result<ProgressEvent, String>>,
) -> JoinSet<Result<(), PartdecError>> {
    let mut tasks = JoinSet::new();

    for part in &plan.parts {
        match part.state() {
            PartState::Completed => {
                let _ = progress_tx
                    .send(Ok(ProgressEvent {
                        part_index: part.index,
                        bytes_delta: part.range.len().max(0) as u64,
                        total_bytes: if part.range.len() < 0 { None } else { Some(part.range.len() as u64) },
                        state: PartState::Completed.to_string(),
                    }))
                    .await;
                continue;
            }
            PartState::Broken => {
                log::warn!("part {} is broken; rerun with --reset-broken to retry it", part.index);
                let _ = progress_tx
                    .send(Ok(ProgressEvent {
                        part_index: part.index,
                        bytes_delta: 0,
                        total_bytes: if part.range.len() < 0 { None } else { Some(part.range.len() as u64) },
                        state: PartState::Broken.to_string(),
                    }))
                    .await;
                continue;
            }
            _ => {}
        }

        let part = part.clone();
        let semaphore = governor.semaphore();
        let cancel = governor.cancel_token();
        let pool = pool.clone();
        let tx = progress_tx.clone();

        tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(p) => p,
                Err(_) => return Err(PartdecError::Cancel),
            };

            if cancel.is_cancelled() {
                return Err(PartdecError::Cancel);
            }

            // A pool pull failure (exhaustion) is joined as an abort and
            // terminates dispatch immediately rather than surfacing as an
            // ordinary per-part error.
            let source = match pool.acquire().await {
                Ok(source) => source,
                Err(e) => return Err(PartdecError::Abort(e.to_string())),
            };
            worker::run_part(part, source, max_retries, cancel, tx).await
        });
    }

    tasks
}
