//! Round-robin pool of reusable `Source` handles.
//!
//! Workers vastly outnumber live connections/file-handles under
//! `MAX_CONCURRENT_FETCH`; rather than open one source per part, the
//! dispatcher hands each worker a slot from this fixed-size ring, cycling
//! past slots that are still in use. The same bounded-pool structure
//! serves both HTTP and file sources.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::PartdecError;
use crate::source::Source;

pub struct SourcePool {
    slots: Mutex<Vec<Option<Arc<dyn Source>>>>,
    cursor: AtomicUsize,
    capacity: usize,
    factory: Box<dyn Fn() -> Arc<dyn Source> + Send + Sync>,
}

impl SourcePool {
    pub fn new(capacity: usize, factory: impl Fn() -> Arc<dyn Source> + Send + Sync + 'static) -> Self {
        SourcePool {
            slots: Mutex::new((0..capacity).map(|_| None).collect()),
            cursor: AtomicUsize::new(0),
            capacity,
            factory: Box::new(factory),
        }
    }

    /// Finds a free or closed slot, opening a fresh source into it if
    /// needed, and returns a clone of the `Arc`. Returns
    /// `PartdecError::Exhaust` if every slot is currently held open by
    /// another worker after one full pass of the ring.
    pub async fn acquire(&self) -> Result<Arc<dyn Source>, PartdecError> {
        let mut slots = self.slots.lock().await;
        let len = slots.len();

        for _ in 0..=len {
            let i = self.cursor.fetch_add(1, Ordering::SeqCst) % len;

            match &slots[i] {
                Some(source) if source.is_open().await => continue,
                Some(source) => return Ok(source.clone()),
                None => {
                    let source = (self.factory)();
                    slots[i] = Some(source.clone());
                    return Ok(source);
                }
            }
        }

        Err(PartdecError::Exhaust)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;

    struct FakeSource {
        open: AtomicBool,
    }

    impl FakeSource {
        fn mark_open(&self) {
            self.open.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Source for FakeSource {
        async fn data_cast(&self, _range: crate::range::ByteRange) -> Result<crate::source::BoxReader, PartdecError> {
            unimplemented!()
        }

        async fn close(&self) {
            self.open.store(false, Ordering::SeqCst);
        }

        async fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }
    }

    fn fake() -> Arc<dyn Source> {
        Arc::new(FakeSource { open: AtomicBool::new(false) })
    }

    #[tokio::test]
    async fn acquire_reuses_closed_slots() {
        let pool = SourcePool::new(2, fake);
        let a = pool.acquire().await.unwrap();
        a.close().await;
        let b = pool.acquire().await.unwrap();
        // with capacity 2 and a closed after use, the ring should hand a
        // free/closed slot back without error
        assert!(!b.is_open().await);
    }

    #[tokio::test]
    async fn acquire_exhausts_when_all_slots_open() {
        let created: Arc<std::sync::Mutex<Vec<Arc<FakeSource>>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let created_for_factory = created.clone();
        let pool = SourcePool::new(1, move || {
            let source = Arc::new(FakeSource { open: AtomicBool::new(false) });
            created_for_factory.lock().unwrap().push(source.clone());
            source as Arc<dyn Source>
        });

        let _a = pool.acquire().await.unwrap();
        // simulate the one slot being held open by a worker mid-fetch
        created.lock().unwrap()[0].mark_open();

        let err = pool.acquire().await;
        assert!(err.is_err());
    }
}
