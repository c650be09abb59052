use crate::timing::{PlaybackStatus, Scheduler, SchedulerError};
use crossbeam::channel::{Receiver, Sender};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub enum EngineCommand {
    Load(PathBuf),
    Play,
    Pause,
    Stop,
    Seek { position_ms: f64 },
    Status,
}

#[derive(Debug, Clone)]
pub enum EngineUpdate {
    Done,
    Status(PlaybackStatus),
    Error { message: String, kind: ErrorKind },
}

/// Coarse failure class, for callers that map errors to their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoFileLoaded,
    Conflict,
    ParseFailed,
    RenderFailed,
    Internal,
}

impl From<&SchedulerError> for ErrorKind {
    fn from(err: &SchedulerError) -> Self {
        match err {
            SchedulerError::NoFileLoaded => ErrorKind::NoFileLoaded,
            SchedulerError::AlreadyActive
            | SchedulerError::AlreadyIdle
            | SchedulerError::NotPlaying => ErrorKind::Conflict,
            SchedulerError::ParseFailed(_) => ErrorKind::ParseFailed,
            SchedulerError::RenderFailed(_) => ErrorKind::RenderFailed,
            SchedulerError::WorkerSpawn(_) => ErrorKind::Internal,
        }
    }
}

/// Channels to a running engine. Every command gets exactly one update back,
/// in order. Dropping the handle shuts the engine down.
pub struct EngineHandle {
    pub command_tx: Sender<EngineCommand>,
    pub update_rx: Receiver<EngineUpdate>,
}

impl EngineHandle {
    /// Sends `command` and waits for its reply. `None` once the engine is gone.
    pub fn request(&self, command: EngineCommand) -> Option<EngineUpdate> {
        self.command_tx.send(command).ok()?;
        self.update_rx.recv().ok()
    }
}

pub fn spawn_engine(scheduler: Arc<Scheduler>) -> EngineHandle {
    let (command_tx, command_rx) = crossbeam::channel::unbounded();
    let (update_tx, update_rx) = crossbeam::channel::unbounded();

    std::thread::spawn(move || {
        engine_thread(scheduler, command_rx, update_tx);
    });

    EngineHandle {
        command_tx,
        update_rx,
    }
}

fn engine_thread(
    scheduler: Arc<Scheduler>,
    command_rx: Receiver<EngineCommand>,
    update_tx: Sender<EngineUpdate>,
) {
    while let Ok(command) = command_rx.recv() {
        debug!("Engine command: {:?}", command);

        let result = match command {
            EngineCommand::Load(path) => scheduler.load(&path).map(|_| None),
            EngineCommand::Play => scheduler.play().map(|_| None),
            EngineCommand::Pause => scheduler.pause().map(|_| None),
            EngineCommand::Stop => scheduler.stop().map(|_| None),
            EngineCommand::Seek { position_ms } => scheduler.seek(position_ms).map(|_| None),
            EngineCommand::Status => Ok(Some(scheduler.status())),
        };

        let update = match result {
            Ok(Some(status)) => EngineUpdate::Status(status),
            Ok(None) => EngineUpdate::Done,
            Err(e) => {
                warn!("Engine command failed: {}", e);
                EngineUpdate::Error {
                    message: e.to_string(),
                    kind: ErrorKind::from(&e),
                }
            }
        };

        if update_tx.send(update).is_err() {
            break;
        }
    }

    debug!("Engine thread exiting");
}
