//! Turns a `DownloadConfig` plus a source probe into a concrete
//! `DownloadPlan`: the set of `FilePart`s a controller run will drive.
//! Combines sniffing the source kind, probing it for size/resumability,
//! validating the requested partitioning, building parts, classifying
//! their on-disk state, and applying the reset policy.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::header::HeaderMap;

use crate::config::DownloadConfig;
use crate::error::PartdecError;
use crate::part::{classify, distribute_dirs, FilePart, PartNameIndexer};
use crate::range::{self, UNKNOWN_SIZE};
use crate::source::{self, FileSource, HttpSource, Source};

pub struct DownloadPlan {
    pub name: String,
    pub data_size: i64,
    pub resumable: bool,
    pub source_kind: SourceKind,
    pub parts: Vec<Arc<FilePart>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Http,
    File,
}

/// Classifies `uri`: an `http(s)://` scheme is a network source, anything
/// else is checked against the filesystem, and anything that is neither
/// is a user-input error.
pub async fn sniff(uri: &str) -> Result<SourceKind, PartdecError> {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        return Ok(SourceKind::Http);
    }
    if tokio::fs::metadata(uri).await.is_ok() {
        return Ok(SourceKind::File);
    }
    Err(PartdecError::FileOrURL(uri.to_string()))
}

pub async fn build_plan(cfg: &DownloadConfig, client: reqwest::Client) -> Result<DownloadPlan, PartdecError> {
    let kind = sniff(&cfg.uri).await?;

    let (data_size, resumable, derived_name) = match kind {
        SourceKind::Http => {
            let headers = cfg.io_mode.header_map()?;
            let probe = source::probe(&client, &cfg.uri, &headers, cfg.io_mode.timeout).await?;
            if probe.redirected {
                log::info!("redirected to {}", probe.final_url);
            }
            let name = probe.filename.unwrap_or_else(|| "unknown.partdec".to_string());
            (probe.size, probe.resumable, name)
        }
        SourceKind::File => {
            let meta = tokio::fs::metadata(&cfg.uri).await?;
            let name = PathBuf::from(&cfg.uri)
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown.partdec".to_string());
            (meta.len() as i64, true, name)
        }
    };

    let part_count = if data_size == UNKNOWN_SIZE || data_size == 0 { 1 } else { cfg.part_count };

    range::validate(data_size, part_count, cfg.part_size, cfg.force)?;

    if part_count > 1 && !resumable {
        log::warn!("source does not support byte ranges; falling back to a single part");
    }
    let effective_part_count = if resumable { part_count } else { 1 };

    let ranges = range::plan_ranges(data_size, effective_part_count, cfg.part_size);

    let total = ranges.len();
    let dirs = cfg.dirs_or_base();
    let placed_dirs = distribute_dirs(&dirs, total);

    let mut indexer = PartNameIndexer::new();
    let mut parts = Vec::with_capacity(total);

    for (i, range) in ranges.into_iter().enumerate() {
        let file_name = indexer.next(&derived_name, i, total);
        let path = placed_dirs[i].join(&file_name);

        let on_disk = match tokio::fs::metadata(&path).await {
            Ok(meta) => Some(meta.len() as i64),
            Err(_) => None,
        };
        let mut state = classify(on_disk, &range);
        let needs_reset = cfg.reset.should_reset(state);
        if needs_reset {
            state = crate::part::PartState::New;
        }

        let part = Arc::new(FilePart::new(i, path, range, state));
        if needs_reset {
            part.mark_truncate_on_open();
        }
        parts.push(part);
    }

    Ok(DownloadPlan { name: derived_name, data_size, resumable, source_kind: kind, parts })
}

/// Builds the `Source` factory the `SourcePool` will call to open fresh
/// connections/handles against this plan's target.
pub fn source_factory(
    kind: SourceKind,
    uri: String,
    client: reqwest::Client,
    headers: HeaderMap,
    timeout: std::time::Duration,
) -> impl Fn() -> Arc<dyn Source> + Send + Sync + 'static {
    move || -> Arc<dyn Source> {
        match kind {
            SourceKind::Http => HttpSource::new(client.clone(), uri.clone(), headers.clone(), timeout),
            SourceKind::File => FileSource::new(PathBuf::from(uri.clone())),
        }
    }
}
