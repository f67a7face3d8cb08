//! Download configuration, assembled by the CLI layer and consumed by
//! `plan::build_plan`/`controller::run`: transport knobs, the reset
//! policy, and the directory fan-out options.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::PartdecError;
use crate::part::ResetPolicy;

/// Low-level per-request transport knobs: retry budget, timeout, extra
/// headers, and connection reuse.
#[derive(Debug, Clone)]
pub struct IOMode {
    pub retry: u32,
    /// Per-response-header deadline: how long to wait for a `.send()` to
    /// come back with a response. Never bounds the body stream that
    /// follows, so a slow-but-steady transfer isn't cut off mid-part.
    pub timeout: Duration,
    pub user_headers: Vec<(String, String)>,
    pub no_conn_reuse: bool,
}

impl Default for IOMode {
    fn default() -> Self {
        IOMode {
            retry: 5,
            timeout: Duration::from_secs(30),
            user_headers: Vec::new(),
            no_conn_reuse: false,
        }
    }
}

impl IOMode {
    pub fn header_map(&self) -> Result<HeaderMap, PartdecError> {
        let mut map = HeaderMap::new();
        for (k, v) in &self.user_headers {
            let name = HeaderName::from_bytes(k.as_bytes())
                .map_err(|e| PartdecError::Args(format!("invalid header name {k:?}: {e}")))?;
            let value = HeaderValue::from_str(v)
                .map_err(|e| PartdecError::Args(format!("invalid header value for {k:?}: {e}")))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub uri: String,
    /// Output directory when only one `dst_dirs` entry is given, or the
    /// base each relative name is joined against.
    pub base_path: PathBuf,
    /// One or more destination directories; parts fan out round-robin
    /// across them (spec's directory-distribution behavior).
    pub dst_dirs: Vec<PathBuf>,
    pub part_count: usize,
    pub part_size: Option<i64>,
    pub reset: ResetPolicy,
    /// Disables the soft `PART_LIMIT` ceiling.
    pub force: bool,
    pub max_concurrent: usize,
    pub io_mode: IOMode,
}

impl DownloadConfig {
    pub fn dirs_or_base(&self) -> Vec<PathBuf> {
        if self.dst_dirs.is_empty() {
            vec![self.base_path.clone()]
        } else {
            self.dst_dirs.clone()
        }
    }
}
