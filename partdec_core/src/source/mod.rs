//! Data sources a worker can pull a byte range from.
//!
//! A single trait covers both network sources and plain-file sources so
//! the same pool/worker machinery drives either one without a type switch
//! at every call site.

mod file;
mod http;

pub use file::FileSource;
pub use http::{probe, HttpSource, ProbeResult};

use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::PartdecError;
use crate::range::ByteRange;

pub type BoxReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// A reusable handle to wherever the bytes for a download come from.
/// `SourcePool` keeps a small ring of these alive and round-robins workers
/// across them so a handful of connections (or file descriptors) serve an
/// arbitrarily large part count.
#[async_trait]
pub trait Source: Send + Sync {
    /// Opens a reader over `range` (start/end inclusive, `end == UNKNOWN_SIZE`
    /// meaning "to completion").
    async fn data_cast(&self, range: ByteRange) -> Result<BoxReader, PartdecError>;

    /// Releases any held connection/handle, returning the source to the
    /// "not open" state so the pool can recycle the slot.
    async fn close(&self);

    async fn is_open(&self) -> bool;
}
