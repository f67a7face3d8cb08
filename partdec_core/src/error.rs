//! Error taxonomy for the download engine.
//!
//! Mirrors the shape of `rdm_core::types::types::DownloadError` (a flat
//! `thiserror` enum with `#[from]` wiring for the transport and disk
//! boundary errors) but carries the full kind set the controller needs to
//! tell cooperative cancellation apart from unrecoverable aborts, and to
//! join several per-part failures into one composite error without
//! flattening them into a single string.

#[derive(Debug, thiserror::Error)]
pub enum PartdecError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("disk error: {0}")]
    Disk(#[from] std::io::Error),

    /// Cooperative cancellation: process interrupt or normal shutdown.
    #[error("cancelled")]
    Cancel,

    /// Unrecoverable mid-run condition, e.g. the source pool is exhausted.
    #[error("aborted: {0}")]
    Abort(String),

    #[error("part count {part_count} exceeds data size {data_size}")]
    PartExceed { part_count: i64, data_size: i64 },

    #[error("part count {0} exceeds the soft limit of {1} (use --force to override)")]
    PartLimit(usize, usize),

    #[error("not a file or a URL: {0}")]
    FileOrURL(String),

    #[error("unknown source type")]
    UnknownType,

    #[error("source pool exhausted")]
    Exhaust,

    /// A request's header/response-start deadline (`IOMode.timeout`)
    /// elapsed before the server replied. Retried like any other
    /// transient transport error — it never bounds body streaming.
    #[error("request timed out")]
    Timeout,

    #[error("parse error: {0}")]
    Parse(String),

    #[error("argument error: {0}")]
    Args(String),

    /// Informational: a probe request was redirected. Never surfaced as a
    /// terminal error — recorded here only so callers that want to log or
    /// test for it can match on the kind.
    #[error("redirected to: {0}")]
    Redirect(String),

    /// Sentinel used by the CLI layer to short-circuit to a `--version`/
    /// `--help` exit without treating it as a failure.
    #[error("version")]
    Version,

    #[error("max retries exceeded: {0}")]
    MaxRetryExceeded(String),

    /// A set of causes joined together, most-recent-first. Flattened on
    /// construction so nesting never grows — joining is semantic (a set of
    /// causes), not textual concatenation.
    #[error("{}", join_display(.0))]
    Joined(Vec<PartdecError>),
}

fn join_display(causes: &[PartdecError]) -> String {
    causes
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl PartdecError {
    /// Terminal-kind membership: these short-circuit aggregation and fire
    /// cancellation.
    pub fn is_terminal(&self) -> bool {
        match self {
            PartdecError::Cancel | PartdecError::Abort(_) => true,
            PartdecError::Joined(causes) => causes.iter().any(PartdecError::is_terminal),
            _ => false,
        }
    }

    /// Fold a new cause into an existing optional error, flattening nested
    /// `Joined` values and skipping exact-text duplicates.
    pub fn join(existing: Option<PartdecError>, cause: PartdecError) -> PartdecError {
        let mut causes = match existing {
            Some(PartdecError::Joined(causes)) => causes,
            Some(other) => vec![other],
            None => Vec::new(),
        };

        match cause {
            PartdecError::Joined(more) => causes.extend(more),
            other => causes.push(other),
        }

        dedup_by_display(&mut causes);

        if causes.len() == 1 {
            causes.pop().unwrap()
        } else {
            PartdecError::Joined(causes)
        }
    }
}

fn dedup_by_display(causes: &mut Vec<PartdecError>) {
    let mut seen = std::collections::HashSet::new();
    causes.retain(|e| seen.insert(e.to_string()));
}

/// Join a stream of optional errors (as produced by the error channel — a
/// `None` entry is a successful completion) into one aggregate result.
/// Returns `Ok(())` if every entry was `None`.
pub fn aggregate(results: impl IntoIterator<Item = Option<PartdecError>>) -> Result<(), PartdecError> {
    let mut joined: Option<PartdecError> = None;
    for r in results {
        if let Some(e) = r {
            joined = Some(PartdecError::join(joined, e));
        }
    }
    match joined {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
