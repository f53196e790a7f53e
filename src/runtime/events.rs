//! Runtime event stream payloads.

use std::path::PathBuf;

use crate::{
    op::OperationKind,
    types::{SessionId, SurfaceVersion},
};

/// Events emitted by the editor runtime and its session workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    /// A new session was opened and made active.
    SessionOpened { id: SessionId, path: PathBuf },
    /// An already open file was reloaded; history was cleared.
    SessionReset { id: SessionId },
    SessionClosed { id: SessionId },
    ActiveChanged { id: Option<SessionId> },
    /// One edit reached the display surface.
    EditApplied {
        id: SessionId,
        kind: OperationKind,
        version: SurfaceVersion,
    },
    /// One undo step reached the display surface.
    UndoApplied {
        id: SessionId,
        kind: OperationKind,
        version: SurfaceVersion,
    },
    /// User-visible status line, e.g. a file that failed to load.
    Status { message: String },
}
