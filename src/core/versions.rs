use log::{debug, warn};

use super::ledger::{HistoryLedger, LedgerResponse};
use crate::engine::traits::{EngineResult, Generation};

/// Where the generation returned by [`VersionStore::resolve`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A fresh copy was appended; the previous generation is now frozen.
    Forked,
    /// The existing current generation is mutated in place.
    InPlace,
}

/// Ordered, never-empty list of image generations for one session. The last
/// one is current.
pub struct VersionStore<G: Generation> {
    generations: Vec<G>,
}

impl<G: Generation> VersionStore<G> {
    pub fn new(initial: G) -> Self {
        Self {
            generations: vec![initial],
        }
    }

    /// Picks the generation the next engine call should mutate.
    ///
    /// Must be called right after the ledger classified the edit. Forks
    /// when the newest ledger entry is not trivially undoable and the
    /// response is not [`LedgerResponse::Dummy`]; otherwise hands back the
    /// current generation for in-place mutation.
    pub fn resolve(
        &mut self,
        ledger: &HistoryLedger,
        response: LedgerResponse,
    ) -> EngineResult<(&mut G, Resolution)> {
        let must_fork = response != LedgerResponse::Dummy
            && ledger.last_kind().is_some_and(|kind| !kind.trivial_undo());

        let resolution = if must_fork {
            let copy = self.current().fork()?;
            self.generations.push(copy);
            debug!("forked generation, {} retained", self.generations.len());
            Resolution::Forked
        } else {
            Resolution::InPlace
        };

        Ok((self.current_mut(), resolution))
    }

    pub fn current(&self) -> &G {
        // Never empty: `remove_last` refuses to drop the final generation.
        &self.generations[self.generations.len() - 1]
    }

    pub fn current_mut(&mut self) -> &mut G {
        let last = self.generations.len() - 1;
        &mut self.generations[last]
    }

    /// Evicts and releases the current generation. Refuses when it is the
    /// only one left.
    pub fn remove_last(&mut self) -> bool {
        if self.generations.len() <= 1 {
            warn!("refusing to remove the only generation");
            return false;
        }
        if let Some(mut evicted) = self.generations.pop() {
            evicted.release();
        }
        true
    }

    /// Releases every generation and starts over from `initial`.
    pub fn reset(&mut self, initial: G) {
        for mut generation in self.generations.drain(..) {
            generation.release();
        }
        self.generations.push(initial);
    }

    pub fn len(&self) -> usize {
        self.generations.len()
    }
}

impl<G: Generation> Drop for VersionStore<G> {
    fn drop(&mut self) {
        for generation in &mut self.generations {
            generation.release();
        }
    }
}
