//! Concurrency governor: bounds how many workers fetch at once and carries
//! the cooperative-cancellation signal. A `tokio::Semaphore` provides the
//! bounded-concurrency gate, a `tokio_util::CancellationToken` the
//! broadcast "stop" signal (fired by Ctrl-C/SIGTERM or the first terminal
//! error), and `tokio::task::JoinSet` tracks in-flight workers while also
//! collecting each one's result.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Default ceiling on simultaneously in-flight fetches, independent of how
/// many parts a plan contains.
pub const MAX_CONCURRENT_FETCH: usize = 32;

pub struct Governor {
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl Governor {
    pub fn new(max_concurrent: usize) -> Self {
        Governor {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            cancel: CancellationToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn semaphore(&self) -> Arc<Semaphore> {
        self.semaphore.clone()
    }

    /// Installs the interrupt handler: a Ctrl-C or, on unix, a SIGTERM
    /// cancels the shared token exactly once. Spawned as an owned task so
    /// the caller doesn't need to hold a join handle for it.
    pub fn install_interrupt_handler(&self) {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        cancel.cancel();
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
            cancel.cancel();
        });
    }
}

/// Thin wrapper so callers spawn worker tasks onto a shared `JoinSet`
/// without importing it directly; keeps the worker module focused on
/// per-part logic instead of task bookkeeping.
pub type WorkerSet<T> = JoinSet<T>;
