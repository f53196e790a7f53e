use std::{fmt, path::PathBuf, sync::Arc};

use hashbrown::HashMap;
use log::{debug, info, warn};
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    task::JoinHandle,
};

use crate::{
    engine::traits::{EngineError, Generation, LoadGeneration},
    op::{HistoryEntry, OpValue, OperationKind},
    render::RenderError,
    session::{
        image::{EditError, EditOutcome, ImageSession, UndoOutcome},
        registry::SessionRegistry,
    },
    types::{PixelFormat, SessionId},
};

use super::events::EditorEvent;

#[derive(Debug)]
pub enum RuntimeError {
    Edit(EditError),
    Render(RenderError),
    Engine(EngineError),
    UnknownSession(SessionId),
    /// The session already has `session_queue_bound` jobs waiting.
    QueueFull(SessionId),
    Worker(String),
    ChannelClosed,
}

impl From<EditError> for RuntimeError {
    fn from(value: EditError) -> Self {
        Self::Edit(value)
    }
}

impl From<RenderError> for RuntimeError {
    fn from(value: RenderError) -> Self {
        Self::Render(value)
    }
}

impl From<EngineError> for RuntimeError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Edit(err) => write!(f, "{err}"),
            Self::Render(err) => write!(f, "{err}"),
            Self::Engine(err) => write!(f, "{err}"),
            Self::UnknownSession(id) => write!(f, "no open session {id}"),
            Self::QueueFull(id) => write!(f, "session {id} has too many pending edits"),
            Self::Worker(msg) => write!(f, "worker failed: {msg}"),
            Self::ChannelClosed => write!(f, "editor runtime is gone"),
        }
    }
}

impl std::error::Error for RuntimeError {}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub command_queue_bound: usize,
    pub session_queue_bound: usize,
    pub event_capacity: usize,
    pub surface_format: PixelFormat,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_queue_bound: 256,
            session_queue_bound: 64,
            event_capacity: 1024,
            surface_format: PixelFormat::default(),
        }
    }
}

type Job<G> = Box<dyn FnOnce(&ImageSession<G>) + Send + 'static>;

/// Completion of a queued job. Dropping it does not cancel the job.
pub struct EditTicket<T> {
    session: SessionId,
    rx: oneshot::Receiver<T>,
}

impl<T> EditTicket<T> {
    pub fn session(&self) -> SessionId {
        self.session
    }
}

impl<T> EditTicket<Result<T, EditError>> {
    /// Waits until the job has run on its session worker.
    pub async fn outcome(self) -> Result<T, RuntimeError> {
        self.rx
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?
            .map_err(RuntimeError::from)
    }
}

impl EditTicket<Vec<HistoryEntry>> {
    pub async fn entries(self) -> Result<Vec<HistoryEntry>, RuntimeError> {
        self.rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }
}

pub struct EditorHandle<G: Generation> {
    cmd_tx: mpsc::Sender<Command<G>>,
    events_tx: broadcast::Sender<EditorEvent>,
}

impl<G: Generation> Clone for EditorHandle<G> {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

enum Command<G: Generation> {
    Open {
        path: PathBuf,
        generation: G,
        resp: oneshot::Sender<Result<SessionId, RuntimeError>>,
    },
    Close {
        id: SessionId,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    Activate {
        id: SessionId,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    Active {
        resp: oneshot::Sender<Option<SessionId>>,
    },
    Session {
        id: SessionId,
        resp: oneshot::Sender<Option<Arc<ImageSession<G>>>>,
    },
    Submit {
        id: SessionId,
        job: Job<G>,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

struct SessionWorker<G: Generation> {
    jobs: mpsc::Sender<Job<G>>,
    task: JoinHandle<()>,
}

/// Starts the command loop. Must be called from inside a tokio runtime.
pub fn spawn_editor<G: Generation>(config: RuntimeConfig) -> EditorHandle<G> {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command<G>>(config.command_queue_bound);
    let (events_tx, _) = broadcast::channel::<EditorEvent>(config.event_capacity);

    let events_tx_loop = events_tx.clone();

    tokio::spawn(async move {
        let mut registry = SessionRegistry::<G>::new(config.surface_format);
        let mut workers = HashMap::<SessionId, SessionWorker<G>>::new();

        while let Some(cmd) = cmd_rx.recv().await {
            let done =
                handle_command(cmd, &mut registry, &mut workers, &events_tx_loop, &config).await;
            if done {
                break;
            }
        }

        drain_workers(&mut workers).await;
        debug!("editor loop stopped with {} sessions open", registry.len());
    });

    EditorHandle { cmd_tx, events_tx }
}

impl<G: Generation> EditorHandle<G> {
    pub fn subscribe(&self) -> broadcast::Receiver<EditorEvent> {
        self.events_tx.subscribe()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command<G>,
    ) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Opens `path` with an already loaded generation. Reopening a path that
    /// is already open resets its session instead.
    pub async fn open(
        &self,
        path: impl Into<PathBuf>,
        generation: G,
    ) -> Result<SessionId, RuntimeError> {
        let path = path.into();
        self.request(|resp| Command::Open {
            path,
            generation,
            resp,
        })
        .await?
    }

    /// Loads `path` on a blocking worker, then opens it. Load failures are
    /// also reported as [`EditorEvent::Status`].
    pub async fn open_file(&self, path: impl Into<PathBuf>) -> Result<SessionId, RuntimeError>
    where
        G: LoadGeneration,
    {
        let path = path.into();
        let load_path = path.clone();
        let loaded = tokio::task::spawn_blocking(move || G::load(&load_path))
            .await
            .map_err(|err| RuntimeError::Worker(err.to_string()))?;

        match loaded {
            Ok(generation) => self.open(path, generation).await,
            Err(err) => {
                warn!("loading {} failed: {err}", path.display());
                let _ = self.events_tx.send(EditorEvent::Status {
                    message: format!("could not open {}: {err}", path.display()),
                });
                Err(err.into())
            }
        }
    }

    pub async fn close(&self, id: SessionId) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Close { id, resp }).await?
    }

    pub async fn activate(&self, id: SessionId) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Activate { id, resp }).await?
    }

    pub async fn active(&self) -> Result<Option<SessionId>, RuntimeError> {
        self.request(|resp| Command::Active { resp }).await
    }

    /// Shared handle to a session, for reading its surface and view.
    pub async fn session(&self, id: SessionId) -> Result<Option<Arc<ImageSession<G>>>, RuntimeError> {
        self.request(|resp| Command::Session { id, resp }).await
    }

    async fn run_on_session<T: Send + 'static>(
        &self,
        id: SessionId,
        f: impl FnOnce(&ImageSession<G>) -> T + Send + 'static,
    ) -> Result<EditTicket<T>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        let job: Job<G> = Box::new(move |session: &ImageSession<G>| {
            let _ = tx.send(f(session));
        });
        self.request(|resp| Command::Submit { id, job, resp })
            .await??;
        Ok(EditTicket { session: id, rx })
    }

    /// Queues an edit behind any pending work for the session. Returns as
    /// soon as it is queued.
    pub async fn apply_edit(
        &self,
        id: SessionId,
        kind: OperationKind,
        value: Option<OpValue>,
    ) -> Result<EditTicket<Result<EditOutcome, EditError>>, RuntimeError> {
        let events = self.events_tx.clone();
        self.run_on_session(id, move |session| {
            let result = session.apply_edit(kind, value);
            match &result {
                Ok(EditOutcome::Applied { version, .. }) => {
                    let _ = events.send(EditorEvent::EditApplied {
                        id,
                        kind,
                        version: *version,
                    });
                }
                Ok(EditOutcome::Unchanged) => {}
                Err(err) => {
                    let _ = events.send(EditorEvent::Status {
                        message: format!("{kind} failed: {err}"),
                    });
                }
            }
            result
        })
        .await
    }

    pub async fn undo_last(
        &self,
        id: SessionId,
    ) -> Result<EditTicket<Result<UndoOutcome, EditError>>, RuntimeError> {
        let events = self.events_tx.clone();
        self.run_on_session(id, move |session| {
            let result = session.undo_last();
            match &result {
                Ok(UndoOutcome::Undone { kind, version }) => {
                    let _ = events.send(EditorEvent::UndoApplied {
                        id,
                        kind: *kind,
                        version: *version,
                    });
                }
                Ok(UndoOutcome::NothingToUndo) => {}
                Err(err) => {
                    let _ = events.send(EditorEvent::Status {
                        message: format!("undo failed: {err}"),
                    });
                }
            }
            result
        })
        .await
    }

    /// Ledger contents once every job queued before this call has run.
    pub async fn history(&self, id: SessionId) -> Result<Vec<HistoryEntry>, RuntimeError> {
        self.run_on_session(id, |session| session.history())
            .await?
            .entries()
            .await
    }

    /// Stops the loop after every session worker has drained its queue.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Shutdown { resp }).await?
    }
}

async fn handle_command<G: Generation>(
    cmd: Command<G>,
    registry: &mut SessionRegistry<G>,
    workers: &mut HashMap<SessionId, SessionWorker<G>>,
    events_tx: &broadcast::Sender<EditorEvent>,
    config: &RuntimeConfig,
) -> bool {
    match cmd {
        Command::Open {
            path,
            generation,
            resp,
        } => {
            let shown = path.display().to_string();
            let out = open_session(path, generation, registry, workers, events_tx, config).await;
            if let Err(err) = &out {
                let _ = events_tx.send(EditorEvent::Status {
                    message: format!("could not open {shown}: {err}"),
                });
            }
            let _ = resp.send(out);
        }
        Command::Close { id, resp } => {
            let out = match registry.close(id) {
                Some(_) => {
                    // Pending jobs still run; the session is released once
                    // its worker finishes.
                    workers.remove(&id);
                    let _ = events_tx.send(EditorEvent::SessionClosed { id });
                    let _ = events_tx.send(EditorEvent::ActiveChanged {
                        id: registry.active(),
                    });
                    Ok(())
                }
                None => Err(RuntimeError::UnknownSession(id)),
            };
            let _ = resp.send(out);
        }
        Command::Activate { id, resp } => {
            let out = if registry.activate(id) {
                let _ = events_tx.send(EditorEvent::ActiveChanged { id: Some(id) });
                Ok(())
            } else {
                Err(RuntimeError::UnknownSession(id))
            };
            let _ = resp.send(out);
        }
        Command::Active { resp } => {
            let _ = resp.send(registry.active());
        }
        Command::Session { id, resp } => {
            let _ = resp.send(registry.get(id));
        }
        Command::Submit { id, job, resp } => {
            let _ = resp.send(submit(workers, id, job));
        }
        Command::Shutdown { resp } => {
            drain_workers(workers).await;
            info!("editor runtime shut down");
            let _ = resp.send(Ok(()));
            return true;
        }
    }

    false
}

async fn open_session<G: Generation>(
    path: PathBuf,
    generation: G,
    registry: &mut SessionRegistry<G>,
    workers: &mut HashMap<SessionId, SessionWorker<G>>,
    events_tx: &broadcast::Sender<EditorEvent>,
    config: &RuntimeConfig,
) -> Result<SessionId, RuntimeError> {
    if let Some(session) = registry.find_by_path(&path) {
        let id = session.id();
        let events = events_tx.clone();
        let job: Job<G> = Box::new(move |session: &ImageSession<G>| match session.reset(generation) {
            Ok(_) => {
                let _ = events.send(EditorEvent::SessionReset { id });
            }
            Err(err) => {
                warn!("reloading session {id} failed: {err}");
                let _ = events.send(EditorEvent::Status {
                    message: format!("could not reload {}: {err}", session.path().display()),
                });
            }
        });
        submit(workers, id, job)?;
        registry.activate(id);
        let _ = events_tx.send(EditorEvent::ActiveChanged { id: Some(id) });
        return Ok(id);
    }

    let id = registry.allocate_id();
    let scratch = registry.scratch();
    let format = registry.format();
    let open_path = path.clone();
    let session = tokio::task::spawn_blocking(move || {
        ImageSession::open(id, open_path, generation, scratch, format)
    })
    .await
    .map_err(|err| RuntimeError::Worker(err.to_string()))??;

    let session = registry.adopt(session);
    workers.insert(
        id,
        spawn_session_worker(session, config.session_queue_bound),
    );
    let _ = events_tx.send(EditorEvent::SessionOpened { id, path });
    let _ = events_tx.send(EditorEvent::ActiveChanged { id: Some(id) });
    Ok(id)
}

fn submit<G: Generation>(
    workers: &HashMap<SessionId, SessionWorker<G>>,
    id: SessionId,
    job: Job<G>,
) -> Result<(), RuntimeError> {
    let worker = workers.get(&id).ok_or(RuntimeError::UnknownSession(id))?;
    worker.jobs.try_send(job).map_err(|err| match err {
        mpsc::error::TrySendError::Full(_) => RuntimeError::QueueFull(id),
        mpsc::error::TrySendError::Closed(_) => RuntimeError::ChannelClosed,
    })
}

/// Runs one session's jobs in arrival order, each on the blocking pool.
fn spawn_session_worker<G: Generation>(
    session: Arc<ImageSession<G>>,
    bound: usize,
) -> SessionWorker<G> {
    let (jobs, mut rx) = mpsc::channel::<Job<G>>(bound);
    let id = session.id();

    let task = tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            let session = Arc::clone(&session);
            if let Err(err) = tokio::task::spawn_blocking(move || job(&session)).await {
                warn!("job for session {id} aborted: {err}");
            }
        }
        debug!("session {id} worker drained");
    });

    SessionWorker { jobs, task }
}

async fn drain_workers<G: Generation>(workers: &mut HashMap<SessionId, SessionWorker<G>>) {
    for (id, worker) in workers.drain() {
        drop(worker.jobs);
        if let Err(err) = worker.task.await {
            warn!("session {id} worker failed: {err}");
        }
    }
}
