use async_trait::async_trait;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Mutex;

use partdec_core::progress::{format_bytes, ProgressObserver, ProgressSnapshot};

/// Renders download progress as indicatif terminal bars: one bar per part,
/// plus an aggregate total bar, all under a shared `MultiProgress`.
pub struct TerminalProgressObserver {
    multi: MultiProgress,
    bars: Mutex<HashMap<usize, ProgressBar>>,
    total_bar: Mutex<Option<ProgressBar>>,
}

impl TerminalProgressObserver {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
            total_bar: Mutex::new(None),
        }
    }

    fn ensure_bars(&self, snapshot: &ProgressSnapshot) {
        let mut bars = self.bars.lock().unwrap();
        let mut total_bar = self.total_bar.lock().unwrap();

        for part in &snapshot.parts {
            if !bars.contains_key(&part.part_index) {
                let style = ProgressStyle::with_template(
                    "[{bar:30.cyan/blue}] {bytes}/{total_bytes} ({binary_bytes_per_sec}) ETA {eta} — {msg}",
                )
                .unwrap()
                .progress_chars("=>-");

                let pb = self.multi.add(ProgressBar::new(part.total_bytes.max(1)));
                pb.set_style(style);
                pb.set_message(format!("part {}", part.part_index));
                bars.insert(part.part_index, pb);
            }
        }

        if total_bar.is_none() && snapshot.total_bytes > 0 {
            let style = ProgressStyle::with_template(
                "Total [{bar:30.green/white}] {bytes}/{total_bytes} ({binary_bytes_per_sec}) ETA {eta}",
            )
            .unwrap()
            .progress_chars("=>-");

            let pb = self.multi.add(ProgressBar::new(snapshot.total_bytes.max(1)));
            pb.set_style(style);
            *total_bar = Some(pb);
        }
    }

    fn update_bars(&self, snapshot: &ProgressSnapshot) {
        let bars = self.bars.lock().unwrap();
        let total_bar = self.total_bar.lock().unwrap();

        for part in &snapshot.parts {
            if let Some(pb) = bars.get(&part.part_index) {
                pb.set_length(part.total_bytes.max(1));
                pb.set_position(part.bytes_downloaded);
            }
        }

        if let Some(pb) = total_bar.as_ref() {
            pb.set_length(snapshot.total_bytes.max(1));
            pb.set_position(snapshot.total_bytes_downloaded);
        }
    }

    fn finish_bars(&self, snapshot: &ProgressSnapshot) {
        let bars = self.bars.lock().unwrap();
        let total_bar = self.total_bar.lock().unwrap();

        for part in &snapshot.parts {
            if let Some(pb) = bars.get(&part.part_index) {
                pb.finish_with_message(format!("part {} {}", part.part_index, part.state));
            }
        }

        if let Some(pb) = total_bar.as_ref() {
            let speed = format_bytes(snapshot.speed as u64);
            let total = format_bytes(snapshot.total_bytes_downloaded);
            pb.finish_with_message(format!("complete — {} at {}/s", total, speed));
        }
    }
}

#[async_trait]
impl ProgressObserver for TerminalProgressObserver {
    async fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self.ensure_bars(snapshot);
        self.update_bars(snapshot);
    }

    async fn on_complete(&self, snapshot: &ProgressSnapshot) {
        self.ensure_bars(snapshot);
        self.finish_bars(snapshot);
    }

    async fn on_error(&self, error: &str) {
        // Informational (e.g. a part left Broken from a prior run) — printed
        // above the bars rather than abandoning them, since other parts may
        // still be fetching.
        self.multi.suspend(|| eprintln!("partdec: {error}"));
    }
}
