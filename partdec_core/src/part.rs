//! On-disk part state and the `FilePart` handle each worker drives.
//!
//! Built around `tokio::fs::File` and a split lock: a cheap
//! `std::sync::Mutex<PartState>` for readers (the progress notifier polls
//! this from a different task than the worker that owns the file), and a
//! `tokio::sync::Mutex<PartInner>` guarding the actual file handle and
//! write offset, since only the one worker assigned to a part ever touches
//! it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncSeekExt;
use tokio::sync::Mutex as AsyncMutex;

use crate::range::{ByteRange, UNKNOWN_SIZE};

/// Lifecycle state of a single part file, derived purely from its on-disk
/// size against the planned byte range. No I/O happens inside `classify` —
/// callers stat the file first and pass the result in, which keeps the
/// rule itself unit-testable without a filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartState {
    /// No part file exists yet (or stat failed because it is absent).
    New,
    /// Partially downloaded; safe to resume from the end of the file.
    Resume,
    /// Fully downloaded; the on-disk size matches the planned range.
    Completed,
    /// On-disk size exceeds what the range allows — corrupt or leftover
    /// from an incompatible planning run.
    Broken,
    /// Range end is unknown (single streaming part) — can't classify by
    /// size alone; treated as resumable by convention.
    Unknown,
}

impl std::fmt::Display for PartState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PartState::New => "new",
            PartState::Resume => "resume",
            PartState::Completed => "completed",
            PartState::Broken => "broken",
            PartState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Classifies a part purely from sizes. `on_disk_size` is `None` when the
/// part file does not exist. Mirrors `SetInitState`'s branching, generalized
/// to the `Option`-based "stat failed" signal instead of Go's zero-value.
pub fn classify(on_disk_size: Option<i64>, range: &ByteRange) -> PartState {
    let Some(size) = on_disk_size else {
        return PartState::New;
    };

    if range.end == UNKNOWN_SIZE {
        return if size == 0 { PartState::New } else { PartState::Unknown };
    }

    let planned_len = range.len();

    if size == 0 {
        PartState::New
    } else if size == planned_len {
        PartState::Completed
    } else if size < planned_len {
        PartState::Resume
    } else {
        PartState::Broken
    }
}

/// Reset policy: whether to discard existing bytes for a part currently in
/// a given state before a run starts (spec's `--reset` flag family).
#[derive(Debug, Clone, Copy, Default)]
pub struct ResetPolicy {
    pub resume: bool,
    pub completed: bool,
    pub broken: bool,
}

impl ResetPolicy {
    pub fn should_reset(&self, state: PartState) -> bool {
        match state {
            // Unknown can't be reconciled with existing bytes on disk —
            // there's no planned end to compare against — so it is always
            // truncated regardless of what the caller asked for.
            PartState::Unknown => true,
            PartState::Resume => self.resume,
            PartState::Completed => self.completed,
            PartState::Broken => self.broken,
            PartState::New => false,
        }
    }
}

struct PartInner {
    handle: Option<File>,
    /// Current write offset relative to the part's own range start.
    offset: i64,
    is_open: bool,
}

/// A single part: a target file on disk plus the byte range it is
/// responsible for fetching from its source.
pub struct FilePart {
    pub index: usize,
    pub path: PathBuf,
    pub range: ByteRange,
    state: StdMutex<PartState>,
    inner: AsyncMutex<PartInner>,
    /// Set when the reset pass decided this part's existing bytes should be
    /// discarded; consumed (and cleared) the first time the part is opened.
    truncate_on_open: AtomicBool,
}

impl FilePart {
    pub fn new(index: usize, path: PathBuf, range: ByteRange, state: PartState) -> Self {
        FilePart {
            index,
            path,
            range,
            state: StdMutex::new(state),
            inner: AsyncMutex::new(PartInner { handle: None, offset: 0, is_open: false }),
            truncate_on_open: AtomicBool::new(false),
        }
    }

    pub fn mark_truncate_on_open(&self) {
        self.truncate_on_open.store(true, Ordering::SeqCst);
    }

    /// Opens the part for writing, truncating first if the reset pass
    /// marked it dirty. This is the entry point workers should use instead
    /// of calling `open` directly, since it folds in that one-shot intent.
    pub async fn open_for_fetch(&self) -> std::io::Result<()> {
        let truncate = self.truncate_on_open.swap(false, Ordering::SeqCst);
        self.open(truncate).await
    }

    pub fn state(&self) -> PartState {
        *self.state.lock().expect("part state mutex poisoned")
    }

    pub fn set_state(&self, state: PartState) {
        *self.state.lock().expect("part state mutex poisoned") = state;
    }

    /// Opens (creating if needed) the part file for append-from-offset
    /// writes, truncating first if `truncate` is set (used by the reset
    /// pass). Seeks to the end of the file and records the resulting
    /// offset for progress reporting.
    pub async fn open(&self, truncate: bool) -> std::io::Result<()> {
        let mut inner = self.inner.lock().await;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(truncate)
            .open(&self.path)
            .await?;

        let offset = file.seek(std::io::SeekFrom::End(0)).await? as i64;

        inner.offset = offset;
        inner.is_open = true;
        inner.handle = Some(file);
        Ok(())
    }

    pub async fn is_open(&self) -> bool {
        self.inner.lock().await.is_open
    }

    pub async fn offset(&self) -> i64 {
        self.inner.lock().await.offset
    }

    /// Appends `buf` to the part file and advances the recorded offset.
    /// Only the worker holding this part's slot should call this.
    pub async fn write_at_offset(&self, buf: &[u8]) -> std::io::Result<()> {
        use tokio::io::AsyncWriteExt;

        let mut inner = self.inner.lock().await;
        let file = inner
            .handle
            .as_mut()
            .expect("write_at_offset called on a part that was never opened");
        file.write_all(buf).await?;
        inner.offset += buf.len() as i64;
        Ok(())
    }

    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        inner.handle = None;
        inner.is_open = false;
    }
}

/// Stateful filename-collision resolver, one per plan: the first use of a
/// stem is bare, every repeat gets a zero-padded `_NN` suffix appended.
pub struct PartNameIndexer {
    seen: std::collections::HashMap<String, usize>,
}

impl PartNameIndexer {
    pub fn new() -> Self {
        PartNameIndexer { seen: std::collections::HashMap::new() }
    }

    /// Returns the part-file name for part `index` of a download named
    /// `base_name`, disambiguating against any name already handed out by
    /// this indexer instance.
    pub fn next(&mut self, base_name: &str, part_index: usize, part_count: usize) -> String {
        let stem = if part_count == 1 {
            base_name.to_string()
        } else {
            format!("{base_name}.part{:0width$}", part_index, width = digits(part_count))
        };

        let count = self.seen.entry(stem.clone()).or_insert(0);
        let name = if *count == 0 { stem.clone() } else { format!("{stem}_{:02}", *count) };
        *count += 1;
        name
    }
}

fn digits(n: usize) -> usize {
    n.to_string().len()
}

/// Distributes `count` parts round-robin across `dirs`, producing one
/// destination path per part. With a single directory this degenerates to
/// "everything goes there"; with several, parts interleave so a partial
/// run doesn't concentrate all I/O on one disk.
pub fn distribute_dirs(dirs: &[PathBuf], count: usize) -> Vec<PathBuf> {
    if dirs.is_empty() {
        return vec![PathBuf::from("."); count];
    }
    (0..count).map(|i| dirs[i % dirs.len()].clone()).collect()
}

pub fn join_part_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: i64, end: i64) -> ByteRange {
        ByteRange { start, end, offset: 0, is_full_range: false }
    }

    #[test]
    fn classify_missing_file_is_new() {
        assert_eq!(classify(None, &range(0, 99)), PartState::New);
    }

    #[test]
    fn classify_zero_length_is_new() {
        assert_eq!(classify(Some(0), &range(0, 99)), PartState::New);
    }

    #[test]
    fn classify_partial_is_resume() {
        assert_eq!(classify(Some(50), &range(0, 99)), PartState::Resume);
    }

    #[test]
    fn classify_exact_match_is_completed() {
        assert_eq!(classify(Some(100), &range(0, 99)), PartState::Completed);
    }

    #[test]
    fn classify_oversized_is_broken() {
        assert_eq!(classify(Some(200), &range(0, 99)), PartState::Broken);
    }

    #[test]
    fn classify_unknown_end_nonzero_is_unknown() {
        assert_eq!(classify(Some(10), &range(1, UNKNOWN_SIZE)), PartState::Unknown);
    }

    #[test]
    fn classify_unknown_end_zero_is_new() {
        assert_eq!(classify(Some(0), &range(1, UNKNOWN_SIZE)), PartState::New);
    }

    #[test]
    fn reset_policy_defaults_to_never_reset() {
        let policy = ResetPolicy::default();
        assert!(!policy.should_reset(PartState::Resume));
        assert!(!policy.should_reset(PartState::Completed));
        assert!(!policy.should_reset(PartState::Broken));
    }

    #[test]
    fn reset_policy_honors_flags_per_state() {
        let policy = ResetPolicy { resume: true, completed: false, broken: true };
        assert!(policy.should_reset(PartState::Resume));
        assert!(!policy.should_reset(PartState::Completed));
        assert!(policy.should_reset(PartState::Broken));
        assert!(!policy.should_reset(PartState::New));
    }

    #[test]
    fn reset_policy_always_truncates_unknown_regardless_of_flags() {
        assert!(ResetPolicy::default().should_reset(PartState::Unknown));
        assert!(ResetPolicy { resume: false, completed: false, broken: false }.should_reset(PartState::Unknown));
        assert!(ResetPolicy { resume: true, completed: true, broken: true }.should_reset(PartState::Unknown));
    }

    #[test]
    fn name_indexer_disambiguates_repeats() {
        let mut idx = PartNameIndexer::new();
        assert_eq!(idx.next("movie", 0, 1), "movie");
        assert_eq!(idx.next("movie", 0, 1), "movie_01");
        assert_eq!(idx.next("movie", 0, 1), "movie_02");
    }

    #[test]
    fn name_indexer_suffixes_part_index_for_multi_part() {
        let mut idx = PartNameIndexer::new();
        assert_eq!(idx.next("movie", 0, 10), "movie.part00");
        assert_eq!(idx.next("movie", 9, 10), "movie.part09");
    }

    #[test]
    fn distribute_dirs_round_robins() {
        let dirs = vec![PathBuf::from("a"), PathBuf::from("b")];
        let placed = distribute_dirs(&dirs, 5);
        assert_eq!(
            placed,
            vec![
                PathBuf::from("a"),
                PathBuf::from("b"),
                PathBuf::from("a"),
                PathBuf::from("b"),
                PathBuf::from("a"),
            ]
        );
    }

    #[test]
    fn distribute_dirs_empty_falls_back_to_cwd() {
        let placed = distribute_dirs(&[], 3);
        assert!(placed.iter().all(|p| p == &PathBuf::from(".")));
    }
}
