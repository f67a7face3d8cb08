//! Per-part fetch loop: exponential-backoff retry, streaming write with
//! byte capping, driven by a `Source` trait object rather than a bare
//! `reqwest::Client`. Cancellation races the copy loop against the
//! governor's token via `tokio::select!` so a stuck read unblocks as soon
//! as the run is cancelled.

use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::PartdecError;
use crate::part::{FilePart, PartState};
use crate::progress::ProgressEvent;
use crate::source::Source;

const MAX_BACKOFF_SECS: u64 = 32;
const CHUNK_SIZE: usize = 64 * 1024;

/// Drives a single part to completion or a terminal failure, retrying
/// transient errors with capped exponential backoff
/// (`2^min(attempt, 5)` seconds, capped at 32s).
pub async fn run_part(
    part: Arc<FilePart>,
    source: Arc<dyn Source>,
    max_retries: u32,
    cancel: CancellationToken,
    progress_tx: mpsc::Sender<Result<ProgressEvent, String>>,
) -> Result<(), PartdecError> {
    part.open_for_fetch().await?;

    let mut attempt = 0u32;
    loop {
        if cancel.is_cancelled() {
            part.close().await;
            return Err(PartdecError::Cancel);
        }

        match fetch_once(&part, &source, &cancel, &progress_tx).await {
            Ok(()) => {
                part.set_state(PartState::Completed);
                part.close().await;
                source.close().await;
                return Ok(());
            }
            Err(FetchOutcome::Cancelled) => {
                part.close().await;
                return Err(PartdecError::Cancel);
            }
            Err(FetchOutcome::Failed(e)) => {
                if attempt + 1 >= max_retries {
                    part.set_state(PartState::Broken);
                    part.close().await;
                    source.close().await;
                    return Err(PartdecError::MaxRetryExceeded(format!(
                        "part {}: {e}",
                        part.index
                    )));
                }

                let delay_secs = 1u64 << attempt.min(5);
                let delay = std::time::Duration::from_secs(delay_secs.min(MAX_BACKOFF_SECS));
                log::warn!("part {} failed (attempt {attempt}): {e}; retrying in {delay_secs}s", part.index);

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        part.close().await;
                        return Err(PartdecError::Cancel);
                    }
                }

                attempt += 1;
            }
        }
    }
}

enum FetchOutcome {
    Cancelled,
    Failed(PartdecError),
}

async fn fetch_once(
    part: &Arc<FilePart>,
    source: &Arc<dyn Source>,
    cancel: &CancellationToken,
    progress_tx: &mpsc::Sender<Result<ProgressEvent, String>>,
) -> Result<(), FetchOutcome> {
    let offset_into_range = part.offset().await;
    let mut range = part.range;
    range.offset = offset_into_range;

    if range.end != crate::range::UNKNOWN_SIZE && range.offset >= range.len() {
        // Already complete (can happen if a Completed part slipped through
        // dispatch); nothing left to fetch.
        return Ok(());
    }

    let mut reader = source
        .data_cast(range)
        .await
        .map_err(FetchOutcome::Failed)?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let total_bytes = if range.len() == crate::range::UNKNOWN_SIZE { None } else { Some(range.len() as u64) };

    loop {
        let copy_fut = reader.read(&mut buf);
        let n = tokio::select! {
            res = copy_fut => res.map_err(|e| FetchOutcome::Failed(PartdecError::Disk(e)))?,
            _ = cancel.cancelled() => return Err(FetchOutcome::Cancelled),
        };

        if n == 0 {
            break;
        }

        part.write_at_offset(&buf[..n]).await.map_err(|e| FetchOutcome::Failed(PartdecError::Disk(e)))?;

        let _ = progress_tx
            .send(Ok(ProgressEvent {
                part_index: part.index,
                bytes_delta: n as u64,
                total_bytes,
                state: PartState::Resume.to_string(),
            }))
            .await;
    }

    Ok(())
}
