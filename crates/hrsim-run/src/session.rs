//! Background loading and the playback it feeds.
//!
//! A `Session` owns one worker thread. Loads are sent to it over a bounded
//! channel and come back tagged with a generation number; only the
//! generation the session is waiting for is applied.

use crate::playback::Playback;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use hrsim_lib::{
    io::Table, load_path, load_table, CancelToken, Config, Dataset, IngestMode, PipelineError,
};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("a load is already in progress")]
    LoadInFlight,
    #[error("the loader thread is not running")]
    WorkerGone,
}

#[derive(Debug, Clone)]
pub enum LoadSource {
    Path(PathBuf),
    Table(Table),
}

#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub source: LoadSource,
    pub mode: IngestMode,
    pub fs_hint: Option<f64>,
}

enum LoadCommand {
    Load {
        generation: u64,
        request: LoadRequest,
        config: Config,
        cancel: CancelToken,
    },
    Shutdown,
}

enum LoadUpdate {
    Ready {
        generation: u64,
        dataset: Arc<Dataset>,
    },
    Failed {
        generation: u64,
        error: PipelineError,
    },
}

impl LoadUpdate {
    fn generation(&self) -> u64 {
        match self {
            LoadUpdate::Ready { generation, .. } | LoadUpdate::Failed { generation, .. } => {
                *generation
            }
        }
    }
}

/// Outcome of a load, as seen by the owner of the session.
#[derive(Debug)]
pub enum SessionEvent {
    Loaded(Arc<Dataset>),
    Failed(PipelineError),
}

pub struct Session {
    config: Config,
    command_tx: Sender<LoadCommand>,
    update_rx: Receiver<LoadUpdate>,
    worker: Option<JoinHandle<()>>,
    generation: u64,
    pending: Option<(u64, CancelToken)>,
    dataset: Option<Arc<Dataset>>,
    playback: Option<Playback>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        let (command_tx, command_rx) = bounded(8);
        let (update_tx, update_rx) = bounded(8);
        let worker = std::thread::spawn(move || LoadWorker::new(command_rx, update_tx).run());
        Self {
            config,
            command_tx,
            update_rx,
            worker: Some(worker),
            generation: 0,
            pending: None,
            dataset: None,
            playback: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Applies to loads submitted afterwards.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    pub fn submit_path(
        &mut self,
        path: impl Into<PathBuf>,
        mode: IngestMode,
        fs_hint: Option<f64>,
    ) -> Result<u64, SessionError> {
        self.submit(LoadRequest {
            source: LoadSource::Path(path.into()),
            mode,
            fs_hint,
        })
    }

    pub fn submit_table(
        &mut self,
        table: Table,
        mode: IngestMode,
        fs_hint: Option<f64>,
    ) -> Result<u64, SessionError> {
        self.submit(LoadRequest {
            source: LoadSource::Table(table),
            mode,
            fs_hint,
        })
    }

    /// Queue a load. Running playback is paused while it is in flight.
    pub fn submit(&mut self, request: LoadRequest) -> Result<u64, SessionError> {
        if self.pending.is_some() {
            return Err(SessionError::LoadInFlight);
        }
        self.drain_stale();
        let generation = self.generation + 1;
        let cancel = CancelToken::new();
        self.command_tx
            .send(LoadCommand::Load {
                generation,
                request,
                config: self.config.clone(),
                cancel: cancel.clone(),
            })
            .map_err(|_| SessionError::WorkerGone)?;
        self.generation = generation;
        self.pending = Some((generation, cancel));
        if let Some(playback) = self.playback.as_mut() {
            playback.pause();
        }
        debug!("submitted load generation {generation}");
        Ok(generation)
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Abandon the load in flight. Returns false when there was none.
    pub fn cancel_load(&mut self) -> bool {
        match self.pending.take() {
            Some((generation, cancel)) => {
                cancel.cancel();
                info!("cancelled load generation {generation}");
                self.drain_stale();
                true
            }
            None => false,
        }
    }

    /// Discard finished results nobody is waiting for. Only valid with no
    /// load pending.
    fn drain_stale(&mut self) {
        while let Ok(update) = self.update_rx.try_recv() {
            debug!("dropping result of stale load generation {}", update.generation());
        }
    }

    /// Apply whatever the worker has finished, without blocking.
    pub fn poll(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(update) = self.update_rx.try_recv() {
            if let Some(event) = self.apply(update) {
                events.push(event);
            }
        }
        events
    }

    /// Block until the pending load finishes or `timeout` passes.
    pub fn wait(&mut self, timeout: Duration) -> Option<SessionEvent> {
        let deadline = Instant::now() + timeout;
        while self.pending.is_some() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.update_rx.recv_timeout(remaining) {
                Ok(update) => {
                    if let Some(event) = self.apply(update) {
                        return Some(event);
                    }
                }
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("loader thread exited with a load pending");
                    self.pending = None;
                    return None;
                }
            }
        }
        None
    }

    fn apply(&mut self, update: LoadUpdate) -> Option<SessionEvent> {
        let generation = update.generation();
        if self.pending.as_ref().map(|(g, _)| *g) != Some(generation) {
            debug!("dropping result of stale load generation {generation}");
            return None;
        }
        self.pending = None;
        match update {
            LoadUpdate::Ready { dataset, .. } => {
                self.playback = Some(Playback::new(Arc::clone(&dataset), &self.config));
                self.dataset = Some(Arc::clone(&dataset));
                Some(SessionEvent::Loaded(dataset))
            }
            LoadUpdate::Failed { error, .. } => {
                warn!("load generation {generation} failed: {error}");
                Some(SessionEvent::Failed(error))
            }
        }
    }

    pub fn dataset(&self) -> Option<&Arc<Dataset>> {
        self.dataset.as_ref()
    }

    pub fn playback(&self) -> Option<&Playback> {
        self.playback.as_ref()
    }

    pub fn playback_mut(&mut self) -> Option<&mut Playback> {
        self.playback.as_mut()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel_load();
        match self.command_tx.try_send(LoadCommand::Shutdown) {
            Ok(()) => {
                if let Some(handle) = self.worker.take() {
                    let _ = handle.join();
                }
            }
            // The worker exits on its own once the command channel closes.
            Err(TrySendError::Full(_)) => warn!("loader queue full, detaching worker"),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

struct LoadWorker {
    command_rx: Receiver<LoadCommand>,
    update_tx: Sender<LoadUpdate>,
}

impl LoadWorker {
    fn new(command_rx: Receiver<LoadCommand>, update_tx: Sender<LoadUpdate>) -> Self {
        Self {
            command_rx,
            update_tx,
        }
    }

    fn run(self) {
        while let Ok(command) = self.command_rx.recv() {
            match command {
                LoadCommand::Load {
                    generation,
                    request,
                    config,
                    cancel,
                } => {
                    if cancel.is_cancelled() {
                        debug!("skipping cancelled load generation {generation}");
                        continue;
                    }
                    let update = match Self::load(&request, &config, &cancel) {
                        Ok(dataset) => LoadUpdate::Ready {
                            generation,
                            dataset: Arc::new(dataset),
                        },
                        Err(error) => LoadUpdate::Failed { generation, error },
                    };
                    if cancel.is_cancelled() {
                        debug!("discarding cancelled load generation {generation}");
                        continue;
                    }
                    if self.update_tx.send(update).is_err() {
                        break;
                    }
                }
                LoadCommand::Shutdown => break,
            }
        }
    }

    fn load(
        request: &LoadRequest,
        config: &Config,
        cancel: &CancelToken,
    ) -> Result<Dataset, PipelineError> {
        match &request.source {
            LoadSource::Path(path) => {
                load_path(path, request.mode, request.fs_hint, config, cancel)
            }
            LoadSource::Table(table) => {
                load_table(table, request.mode, request.fs_hint, config, cancel)
            }
        }
    }
}
