//! Execution identity and provenance wiring.
//!
//! An [`ExecutionContext`] hands out execution ids and, when a provenance
//! store is attached, registers each new id in the lineage as it is created.
//! The current id is allocated lazily: nothing is consumed until an
//! evaluation actually asks for it.

use log::debug;

use crate::error::Result;
use crate::id::IdGenerator;
use crate::provenance::ProvenanceStore;
use crate::types::ExecId;

/// Allocator of execution ids with optional provenance recording.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    current: Option<ExecId>,
    ids: IdGenerator,
    provenance: Option<ProvenanceStore>,
    /// Evaluation nesting depth; non-zero while a driver call is in flight.
    depth: u32,
}

impl ExecutionContext {
    /// Create a context with no current execution and no provenance store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current execution id, if one has been allocated.
    pub fn execution(&self) -> Option<ExecId> {
        self.current
    }

    /// The current execution id, allocating a fresh root one on first use.
    pub fn current_execution(&mut self) -> Result<ExecId> {
        if let Some(id) = self.current {
            return Ok(id);
        }
        let id = ExecId(self.ids.get());
        if let Some(store) = &mut self.provenance {
            store.add_root(id)?;
        }
        debug!("allocated root execution {}", id);
        self.current = Some(id);
        Ok(id)
    }

    /// Start a new execution and make it current.
    ///
    /// `parent` defaults to the previous current execution; when a
    /// provenance store is attached the new id is registered under that
    /// parent (or as a root when there is none).
    pub fn new_execution(&mut self, parent: Option<ExecId>) -> Result<ExecId> {
        let parent = parent.or(self.current);
        let id = ExecId(self.ids.get());
        if let Some(store) = &mut self.provenance {
            match parent {
                Some(p) => store.add_execution(p, id)?,
                None => store.add_root(id)?,
            }
        }
        debug!("started execution {} (parent {:?})", id, parent);
        self.current = Some(id);
        Ok(id)
    }

    /// Attach a provenance store, registering the current execution (if any)
    /// as a root of the lineage.
    pub fn set_provenance(&mut self, mut store: ProvenanceStore) -> Result<()> {
        if let Some(id) = self.current {
            if !store.contains(id) {
                store.add_root(id)?;
            }
        }
        self.provenance = Some(store);
        Ok(())
    }

    /// The attached provenance store, if any.
    pub fn provenance(&self) -> Option<&ProvenanceStore> {
        self.provenance.as_ref()
    }

    /// Mutable access to the attached provenance store, if any.
    pub fn provenance_mut(&mut self) -> Option<&mut ProvenanceStore> {
        self.provenance.as_mut()
    }

    /// Detach and return the provenance store.
    pub fn clear_provenance(&mut self) -> Option<ProvenanceStore> {
        self.provenance.take()
    }

    /// Mark entry into an evaluation. Nested slice evaluations driven by
    /// control-flow actors re-enter under the same execution id.
    pub(crate) fn enter_eval(&mut self) {
        self.depth += 1;
    }

    /// Mark exit from an evaluation; true when this was the outermost one.
    pub(crate) fn exit_eval(&mut self) -> bool {
        self.depth = self.depth.saturating_sub(1);
        self.depth == 0
    }
}
