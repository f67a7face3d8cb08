use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::mpsc;

use super::observer::ProgressObserver;
use super::snapshot::{PartSnapshot, ProgressSnapshot};
use super::ProgressEvent;

/// EMA smoothing factor. 0.3 = responsive but stable.
const EMA_ALPHA: f64 = 0.3;

struct PartProgress {
    part_index: usize,
    bytes_downloaded: u64,
    total_bytes: u64,
    speed: f64,
    last_update: Instant,
    state: String,
}

/// Consumes `Result<ProgressEvent, String>` off the worker-facing channel,
/// aggregates it into `ProgressSnapshot`s, and fans out to every registered
/// observer. Each snapshot carries a `state` string per part so observers
/// can render completed/broken parts distinctly from ones still in flight.
pub struct ProgressNotifier {
    observers: Vec<Box<dyn ProgressObserver>>,
    parts: HashMap<usize, PartProgress>,
    part_order: Vec<usize>,
    start_time: Instant,
}

impl ProgressNotifier {
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
            parts: HashMap::new(),
            part_order: Vec::new(),
            start_time: Instant::now(),
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) {
        self.observers.push(observer);
    }

    pub async fn run(mut self, mut progress_rx: mpsc::Receiver<Result<ProgressEvent, String>>) {
        while let Some(msg) = progress_rx.recv().await {
            match msg {
                Ok(ev) => {
                    let snapshot = self.handle_event(ev);
                    for observer in &self.observers {
                        observer.on_progress(&snapshot).await;
                    }
                }
                Err(error) => {
                    for observer in &self.observers {
                        observer.on_error(&error).await;
                    }
                }
            }
        }
        self.finish().await;
    }

    fn handle_event(&mut self, ev: ProgressEvent) -> ProgressSnapshot {
        let now = Instant::now();

        if !self.parts.contains_key(&ev.part_index) {
            let total = ev.total_bytes.unwrap_or(0);
            self.part_order.push(ev.part_index);
            self.parts.insert(
                ev.part_index,
                PartProgress {
                    part_index: ev.part_index,
                    bytes_downloaded: 0,
                    total_bytes: total,
                    speed: 0.0,
                    last_update: now,
                    state: ev.state.clone(),
                },
            );
        }

        {
            let part = self.parts.get_mut(&ev.part_index).unwrap();
            part.bytes_downloaded += ev.bytes_delta;
            part.state = ev.state;

            if part.total_bytes == 0 {
                if let Some(tb) = ev.total_bytes {
                    part.total_bytes = tb;
                }
            }

            let elapsed = now.duration_since(part.last_update).as_secs_f64();
            if elapsed > 0.0 {
                let instant_speed = ev.bytes_delta as f64 / elapsed;
                part.speed = EMA_ALPHA * instant_speed + (1.0 - EMA_ALPHA) * part.speed;
                part.last_update = now;
            }
        }

        self.build_snapshot()
    }

    fn build_snapshot(&self) -> ProgressSnapshot {
        let total_bytes: u64 = self.parts.values().map(|p| p.total_bytes).sum();
        let total_downloaded: u64 = self.parts.values().map(|p| p.bytes_downloaded).sum();
        let combined_speed: f64 = self.parts.values().map(|p| p.speed).sum();
        let remaining = total_bytes.saturating_sub(total_downloaded);
        let eta = if combined_speed > 0.0 { remaining as f64 / combined_speed } else { 0.0 };

        let part_snapshots: Vec<PartSnapshot> = self
            .part_order
            .iter()
            .filter_map(|id| self.parts.get(id))
            .map(|p| {
                let rem = p.total_bytes.saturating_sub(p.bytes_downloaded);
                let part_eta = if p.speed > 0.0 { rem as f64 / p.speed } else { 0.0 };
                PartSnapshot {
                    part_index: p.part_index,
                    bytes_downloaded: p.bytes_downloaded,
                    total_bytes: p.total_bytes,
                    speed: p.speed,
                    eta_secs: part_eta,
                    state: p.state.clone(),
                }
            })
            .collect();

        ProgressSnapshot {
            parts: part_snapshots,
            total_bytes_downloaded: total_downloaded,
            total_bytes,
            speed: combined_speed,
            eta_secs: eta,
            done: false,
        }
    }

    async fn finish(self) {
        let elapsed = self.start_time.elapsed();
        let total_downloaded: u64 = self.parts.values().map(|p| p.bytes_downloaded).sum();
        let avg_speed = if elapsed.as_secs_f64() > 0.0 { total_downloaded as f64 / elapsed.as_secs_f64() } else { 0.0 };

        let mut final_snapshot = self.build_snapshot();
        final_snapshot.done = true;
        final_snapshot.speed = avg_speed;
        final_snapshot.eta_secs = 0.0;

        for observer in &self.observers {
            observer.on_complete(&final_snapshot).await;
        }
    }
}
