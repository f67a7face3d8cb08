pub mod notifier;
pub mod observer;
pub mod snapshot;

pub use notifier::ProgressNotifier;
pub use observer::ProgressObserver;
pub use snapshot::{format_bytes, PartSnapshot, ProgressSnapshot};

/// Raw progress tick a worker sends after each successful chunk write.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub part_index: usize,
    pub bytes_delta: u64,
    pub total_bytes: Option<u64>,
    pub state: String,
}
