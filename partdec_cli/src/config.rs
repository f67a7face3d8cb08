use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use partdec_core::part::ResetPolicy;
use partdec_core::{config::IOMode, DownloadConfig, PartdecError};

use crate::size::parse_size;

/// A partitioned, resumable downloader.
#[derive(Parser, Debug)]
#[command(name = "partdec", version, about = "Partitioned, resumable downloads over HTTP or local files")]
pub struct Args {
    /// URL or local file path to fetch.
    pub uri: String,

    /// Base output path: a directory (derived filename is appended) or a
    /// full file path (used verbatim) when it doesn't end in a separator.
    #[arg(short = 'b', long = "base", default_value = ".")]
    pub base: PathBuf,

    /// Extra destination directory; repeat to fan parts out round-robin
    /// across several directories.
    #[arg(short = 'd', long = "dir")]
    pub dirs: Vec<PathBuf>,

    /// Number of parts to split the download into.
    #[arg(short = 'p', long = "part", default_value_t = 1)]
    pub part_count: usize,

    /// Fixed size per part (e.g. "10MiB"); overrides --part when set.
    #[arg(short = 's', long = "size")]
    pub part_size: Option<String>,

    /// States to reset before fetching: 1=Resume, 2=Completed, 3=Broken.
    /// May be repeated or given as a comma-separated list.
    #[arg(short = 'z', long = "reset", value_delimiter = ',')]
    pub reset: Vec<u8>,

    /// Skip the soft part-count ceiling (128 parts).
    #[arg(short = 'f', long = "force")]
    pub force: bool,

    /// Maximum simultaneous in-flight fetches.
    #[arg(long = "concurrency", default_value_t = 8)]
    pub max_concurrent: usize,

    /// Per-part retry budget before it is left Broken.
    #[arg(short = 'r', long = "retry", default_value_t = 5)]
    pub retry: u32,

    /// Per-response-header timeout, in seconds.
    #[arg(short = 't', long = "timeout", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Extra request header, "Name: value"; may be repeated.
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Disable HTTP connection pooling (one connection per request).
    #[arg(short = 'x', long = "no-connection-reuse")]
    pub no_conn_reuse: bool,

    /// Suppress the terminal progress display.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl Args {
    pub fn into_download_config(self) -> Result<DownloadConfig, PartdecError> {
        let part_size = self.part_size.as_deref().map(parse_size).transpose()?;

        let mut user_headers = Vec::with_capacity(self.headers.len());
        for raw in &self.headers {
            let (name, value) = raw
                .split_once(':')
                .ok_or_else(|| PartdecError::Args(format!("malformed header {raw:?}, expected \"Name: value\"")))?;
            user_headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        let mut reset = ResetPolicy::default();
        for code in &self.reset {
            match code {
                1 => reset.resume = true,
                2 => reset.completed = true,
                3 => reset.broken = true,
                other => return Err(PartdecError::Args(format!("invalid --reset code {other}, expected 1, 2, or 3"))),
            }
        }

        if self.part_count == 0 {
            return Err(PartdecError::Args("--part must be at least 1".to_string()));
        }

        Ok(DownloadConfig {
            uri: self.uri,
            base_path: self.base,
            dst_dirs: self.dirs,
            part_count: self.part_count,
            part_size,
            reset,
            force: self.force,
            max_concurrent: self.max_concurrent.max(1),
            io_mode: IOMode {
                retry: self.retry,
                timeout: Duration::from_secs(self.timeout_secs),
                user_headers,
                no_conn_reuse: self.no_conn_reuse,
            },
        })
    }
}
