//! Core engine for a partitioned, resumable downloader: plans byte ranges
//! across one or more parts, fetches them concurrently through a bounded
//! pool of reusable sources, and reports progress as it goes. The CLI
//! crate is a thin shell around `controller::run`.

pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod governor;
pub mod part;
pub mod plan;
pub mod pool;
pub mod progress;
pub mod range;
pub mod source;
pub mod worker;

pub use config::{DownloadConfig, IOMode};
pub use controller::{run, RunOutcome};
pub use error::PartdecError;
pub use part::{PartState, ResetPolicy};
pub use plan::DownloadPlan;
