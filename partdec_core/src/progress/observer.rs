use async_trait::async_trait;

use super::snapshot::ProgressSnapshot;

/// Anything that wants to observe download progress.
///
/// The `ProgressNotifier` calls these after aggregating raw `ProgressEvent`s
/// into a `ProgressSnapshot`.
///
/// - `on_progress` fires for every event (per-chunk granularity).
/// - `on_error` fires for any worker-level warning (e.g. a part left
///   `Broken` from a prior run); it does not end the stream.
/// - `on_complete` fires once, when the channel closes.
#[async_trait]
pub trait ProgressObserver: Send + Sync + 'static {
    async fn on_progress(&self, snapshot: &ProgressSnapshot);

    async fn on_complete(&self, snapshot: &ProgressSnapshot);

    async fn on_error(&self, error: &str);
}
