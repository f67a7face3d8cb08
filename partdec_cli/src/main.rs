use std::time::Instant;

use clap::Parser;

mod config;
mod size;
mod terminal_observer;

use config::Args;
use terminal_observer::TerminalProgressObserver;

#[tokio::main]
async fn main() {
    env_logger::init();

    let args = Args::parse();
    let uri = args.uri.clone();
    let quiet = args.quiet;

    let cfg = match args.into_download_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("partdec: {e}");
            std::process::exit(2);
        }
    };

    println!("fetching {uri}");
    let start = Instant::now();

    let observers: Vec<Box<dyn partdec_core::progress::ProgressObserver>> = if quiet {
        Vec::new()
    } else {
        vec![Box::new(TerminalProgressObserver::new())]
    };

    match partdec_core::run(cfg, observers).await {
        Ok(outcome) => {
            let elapsed = start.elapsed();
            println!(
                "done: {} part(s) for {:?} in {:.2}s",
                outcome.plan.parts.len(),
                outcome.plan.name,
                elapsed.as_secs_f64()
            );
        }
        Err(e) => {
            eprintln!("partdec: {e}");
            std::process::exit(1);
        }
    }
}
