use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::gate::OperationGate;
use crate::{
    core::{
        filters::FilterValues,
        ledger::{self, HistoryLedger, LedgerError, LedgerResponse},
        versions::{Resolution, VersionStore},
    },
    engine::{
        call::EngineCall,
        traits::{EngineError, Generation},
    },
    op::{HistoryEntry, OpValue, OperationKind},
    render::{
        RenderError, handoff::materialize, scratch::ScratchBuffer, surface::DisplaySurface,
    },
    types::{PixelFormat, SessionId, SurfaceVersion},
};

/// Zoom and pan of one tab. Survives a reset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub zoom: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Applied {
        response: LedgerResponse,
        resolution: Resolution,
        version: SurfaceVersion,
    },
    /// The slider moved less than the threshold; nothing happened.
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoOutcome {
    Undone {
        kind: OperationKind,
        version: SurfaceVersion,
    },
    /// The ledger was empty.
    NothingToUndo,
}

#[derive(Debug)]
pub enum EditError {
    Contract(LedgerError),
    Engine(EngineError),
    Render(RenderError),
}

impl From<LedgerError> for EditError {
    fn from(value: LedgerError) -> Self {
        Self::Contract(value)
    }
}

impl From<EngineError> for EditError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

impl From<RenderError> for EditError {
    fn from(value: RenderError) -> Self {
        Self::Render(value)
    }
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contract(err) => write!(f, "invalid edit: {err}"),
            Self::Engine(err) => write!(f, "image engine failed: {err}"),
            Self::Render(err) => write!(f, "display update failed: {err}"),
        }
    }
}

impl std::error::Error for EditError {}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|msg| (*msg).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}

struct SessionState<G: Generation> {
    ledger: HistoryLedger,
    versions: VersionStore<G>,
    filters: FilterValues,
}

impl<G: Generation> SessionState<G> {
    fn new(initial: G) -> Self {
        Self {
            ledger: HistoryLedger::new(),
            versions: VersionStore::new(initial),
            filters: FilterValues::default(),
        }
    }

    fn apply(
        &mut self,
        kind: OperationKind,
        value: Option<OpValue>,
        tracked: bool,
        scratch: &ScratchBuffer,
        surface: &DisplaySurface,
    ) -> Result<EditOutcome, EditError> {
        let value = ledger::validate(kind, value)?;
        let Some(call) = self.filters.plan(kind, &value) else {
            debug!("{kind} to {value:?} is below the slider threshold");
            return Ok(EditOutcome::Unchanged);
        };

        let response = if tracked {
            self.ledger.append(kind, Some(value.clone()))?
        } else {
            LedgerResponse::Dummy
        };

        let (generation, resolution) = match self.versions.resolve(&self.ledger, response) {
            Ok(resolved) => resolved,
            Err(err) => {
                if tracked {
                    self.ledger.pop();
                }
                return Err(err.into());
            }
        };

        // A panic is treated like an engine error so the rollback below
        // still runs and the gate never holds a half-applied edit.
        let mut engine_ran = false;
        let result = panic::catch_unwind(AssertUnwindSafe(|| match call.apply(generation) {
            Ok(()) => {
                engine_ran = true;
                materialize(generation, scratch, surface).map_err(EditError::from)
            }
            Err(err) => Err(err.into()),
        }))
        .unwrap_or_else(|payload| Err(EngineError::Panicked(panic_message(&*payload)).into()));

        match result {
            Ok(version) => {
                if tracked {
                    self.filters.record(kind, &value);
                }
                Ok(EditOutcome::Applied {
                    response,
                    resolution,
                    version,
                })
            }
            Err(err) => {
                warn!("{kind} failed, rolling back: {err}");
                self.roll_back(&call, resolution, engine_ran, tracked);
                Err(err)
            }
        }
    }

    fn roll_back(&mut self, call: &EngineCall, resolution: Resolution, engine_ran: bool, tracked: bool) {
        match resolution {
            Resolution::Forked => {
                self.versions.remove_last();
            }
            Resolution::InPlace if engine_ran && call.is_involution() => {
                if let Err(err) = call.apply(self.versions.current_mut()) {
                    warn!("could not revert {call:?}: {err}");
                }
            }
            Resolution::InPlace if engine_ran => {
                warn!("in-place {call:?} cannot be reverted");
            }
            Resolution::InPlace => {}
        }
        if tracked {
            self.ledger.pop();
        }
    }

    fn undo(
        &mut self,
        scratch: &ScratchBuffer,
        surface: &DisplaySurface,
    ) -> Result<UndoOutcome, EditError> {
        let Some(kind) = self.ledger.last_kind() else {
            debug!("undo with empty history");
            return Ok(UndoOutcome::NothingToUndo);
        };

        if kind.trivial_undo() {
            let call = EngineCall::involution(kind)
                .ok_or_else(|| EngineError::Unsupported(format!("{kind} has no inverse")))?;
            call.apply(self.versions.current_mut())?;
            self.ledger.pop();
        } else {
            self.versions.remove_last();
            self.ledger.pop();
            self.filters.restore(kind, &self.ledger);
        }

        let version = materialize(self.versions.current_mut(), scratch, surface)?;
        Ok(UndoOutcome::Undone { kind, version })
    }

    fn reset(
        &mut self,
        initial: G,
        scratch: &ScratchBuffer,
        surface: &DisplaySurface,
    ) -> Result<SurfaceVersion, RenderError> {
        self.ledger.reset();
        self.filters = FilterValues::default();
        self.versions.reset(initial);
        materialize(self.versions.current_mut(), scratch, surface)
    }
}

/// Editable state of one open image: history, generations, slider values
/// and the surface the renderer reads.
pub struct ImageSession<G: Generation> {
    id: SessionId,
    path: PathBuf,
    gate: OperationGate<SessionState<G>>,
    scratch: Arc<ScratchBuffer>,
    surface: Arc<DisplaySurface>,
    view: Mutex<ViewState>,
}

impl<G: Generation> ImageSession<G> {
    /// Wraps a freshly loaded generation and presents it.
    pub fn open(
        id: SessionId,
        path: impl Into<PathBuf>,
        mut generation: G,
        scratch: Arc<ScratchBuffer>,
        format: PixelFormat,
    ) -> Result<Self, RenderError> {
        let path = path.into();
        let surface = Arc::new(DisplaySurface::new(format));
        materialize(&mut generation, &scratch, &surface)?;
        info!(
            "opened session {id} for {} ({}x{})",
            path.display(),
            generation.width(),
            generation.height()
        );

        Ok(Self {
            id,
            path,
            gate: OperationGate::new(SessionState::new(generation)),
            scratch,
            surface,
            view: Mutex::new(ViewState::default()),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies one recorded edit. `value` is the absolute slider position
    /// for slider kinds.
    pub fn apply_edit(
        &self,
        kind: OperationKind,
        value: Option<OpValue>,
    ) -> Result<EditOutcome, EditError> {
        self.gate.with_exclusive_access(|state| {
            state.apply(kind, value, true, &self.scratch, &self.surface)
        })
    }

    /// Applies an edit to the current generation with no history effects.
    /// Slider values are left alone.
    pub fn apply_untracked(
        &self,
        kind: OperationKind,
        value: Option<OpValue>,
    ) -> Result<EditOutcome, EditError> {
        self.gate.with_exclusive_access(|state| {
            state.apply(kind, value, false, &self.scratch, &self.surface)
        })
    }

    pub fn undo_last(&self) -> Result<UndoOutcome, EditError> {
        self.gate
            .with_exclusive_access(|state| state.undo(&self.scratch, &self.surface))
    }

    /// Starts over from `initial`, keeping the view.
    pub fn reset(&self, initial: G) -> Result<SurfaceVersion, RenderError> {
        info!("resetting session {}", self.id);
        self.gate
            .with_exclusive_access(|state| state.reset(initial, &self.scratch, &self.surface))
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.gate.read(|state| state.ledger.history())
    }

    pub fn history_len(&self) -> usize {
        self.gate.read(|state| state.ledger.len())
    }

    pub fn generation_count(&self) -> usize {
        self.gate.read(|state| state.versions.len())
    }

    pub fn filter_values(&self) -> FilterValues {
        self.gate.read(|state| state.filters.clone())
    }

    /// Reads the current generation under the gate.
    pub fn with_current<R>(&self, f: impl FnOnce(&G) -> R) -> R {
        self.gate.read(|state| f(state.versions.current()))
    }

    /// "Operation in progress" indicator. Queries do not count.
    pub fn busy(&self) -> bool {
        self.gate.busy()
    }

    pub fn surface(&self) -> &Arc<DisplaySurface> {
        &self.surface
    }

    pub fn view(&self) -> ViewState {
        *self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_view(&self, view: ViewState) {
        *self.view.lock().unwrap_or_else(PoisonError::into_inner) = view;
    }
}

impl<G: Generation> fmt::Debug for ImageSession<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageSession")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("busy", &self.busy())
            .finish_non_exhaustive()
    }
}
