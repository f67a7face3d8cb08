//! Plain-file `Source`: a local file can be "fetched" in byte ranges the
//! same way a remote one is, which lets the rest of the pipeline stay
//! source-agnostic.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::PartdecError;
use crate::range::{ByteRange, UNKNOWN_SIZE};

use super::{BoxReader, Source};

pub struct FileSource {
    path: PathBuf,
    open: AtomicBool,
}

impl FileSource {
    pub fn new(path: PathBuf) -> Arc<Self> {
        Arc::new(FileSource { path, open: AtomicBool::new(false) })
    }
}

#[async_trait]
impl Source for FileSource {
    async fn data_cast(&self, range: ByteRange) -> Result<BoxReader, PartdecError> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        let start = range.effective_start();
        file.seek(std::io::SeekFrom::Start(start as u64)).await?;

        self.open.store(true, Ordering::SeqCst);

        if range.end == UNKNOWN_SIZE {
            Ok(Box::pin(file))
        } else {
            let len = (range.end - start + 1).max(0) as u64;
            Ok(Box::pin(file.take(len)))
        }
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    async fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
