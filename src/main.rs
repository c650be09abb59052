use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use keylight::{AppConfig, EngineCommand, EngineUpdate, Scheduler, Status, spawn_engine};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: keylight <file.mid> [config.ron]";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let midi_path = PathBuf::from(args.next().ok_or(USAGE)?);
    let config = match args.next() {
        Some(path) => AppConfig::load(&PathBuf::from(path))?,
        None => AppConfig::default(),
    };

    let scheduler = Arc::new(Scheduler::from_config(&config));
    let engine = spawn_engine(scheduler.clone());

    for command in [EngineCommand::Load(midi_path), EngineCommand::Play] {
        if let Some(EngineUpdate::Error { message, .. }) = engine.request(command) {
            error!("{}", message);
            return Err(message.into());
        }
    }

    loop {
        std::thread::sleep(Duration::from_millis(500));
        let status = scheduler.status();
        info!(
            "{:?} {:>8.1} / {:.1} ms ({:.0}%)",
            status.status,
            status.current_time_ms,
            status.total_duration_ms,
            status.progress_percentage
        );

        match status.status {
            Status::Finished => break,
            Status::Error(message) => return Err(message.into()),
            _ => {}
        }
    }

    info!("{}", scheduler.status().to_ron()?);
    Ok(())
}
