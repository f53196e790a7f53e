use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use hashbrown::HashMap;
use log::{debug, info};

use super::image::ImageSession;
use crate::{
    engine::traits::Generation,
    render::{RenderError, scratch::ScratchBuffer},
    types::{PixelFormat, SessionId},
};

/// Whether [`SessionRegistry::open`] created a session or reused one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenKind {
    Created,
    Reset,
}

/// Open sessions in tab order, plus which one is active.
///
/// Owns the scratch buffer every session shares.
pub struct SessionRegistry<G: Generation> {
    sessions: HashMap<SessionId, Arc<ImageSession<G>>>,
    by_path: HashMap<PathBuf, SessionId>,
    order: Vec<SessionId>,
    active: Option<usize>,
    scratch: Arc<ScratchBuffer>,
    format: PixelFormat,
    next_id: SessionId,
}

impl<G: Generation> SessionRegistry<G> {
    pub fn new(format: PixelFormat) -> Self {
        Self {
            sessions: HashMap::new(),
            by_path: HashMap::new(),
            order: Vec::new(),
            active: None,
            scratch: Arc::new(ScratchBuffer::new()),
            format,
            next_id: 1,
        }
    }

    /// Opens `path`, or resets its existing session to `generation`. Either
    /// way the session becomes active.
    pub fn open(
        &mut self,
        path: impl Into<PathBuf>,
        generation: G,
    ) -> Result<(Arc<ImageSession<G>>, OpenKind), RenderError> {
        let path = path.into();
        if let Some(session) = self.find_by_path(&path) {
            session.reset(generation)?;
            self.activate(session.id());
            return Ok((session, OpenKind::Reset));
        }

        let id = self.allocate_id();
        let session = ImageSession::open(id, path, generation, self.scratch(), self.format)?;
        Ok((self.adopt(session), OpenKind::Created))
    }

    /// Reserves an id for a session built outside the registry.
    pub fn allocate_id(&mut self) -> SessionId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Registers an already opened session as the new active tab.
    pub fn adopt(&mut self, session: ImageSession<G>) -> Arc<ImageSession<G>> {
        let id = session.id();
        let session = Arc::new(session);
        self.by_path.insert(session.path().to_path_buf(), id);
        self.sessions.insert(id, Arc::clone(&session));
        self.order.push(id);
        self.active = Some(self.order.len() - 1);
        debug!("registered session {id}, {} open", self.order.len());
        session
    }

    /// Removes a session. The previous tab becomes active when the closed one
    /// was active.
    pub fn close(&mut self, id: SessionId) -> Option<Arc<ImageSession<G>>> {
        let session = self.sessions.remove(&id)?;
        self.by_path.remove(session.path());
        let idx = self.order.iter().position(|open| *open == id)?;
        self.order.remove(idx);

        self.active = match self.active {
            _ if self.order.is_empty() => None,
            Some(active) if active == idx => Some(idx.saturating_sub(1)),
            Some(active) if active > idx => Some(active - 1),
            other => other,
        };
        info!("closed session {id}");
        Some(session)
    }

    pub fn activate(&mut self, id: SessionId) -> bool {
        match self.order.iter().position(|open| *open == id) {
            Some(idx) => {
                self.active = Some(idx);
                true
            }
            None => false,
        }
    }

    pub fn active(&self) -> Option<SessionId> {
        self.active.and_then(|idx| self.order.get(idx).copied())
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<ImageSession<G>>> {
        self.sessions.get(&id).cloned()
    }

    pub fn find_by_path(&self, path: &Path) -> Option<Arc<ImageSession<G>>> {
        self.by_path.get(path).and_then(|id| self.get(*id))
    }

    /// Session ids in tab order.
    pub fn ids(&self) -> &[SessionId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn scratch(&self) -> Arc<ScratchBuffer> {
        Arc::clone(&self.scratch)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }
}
