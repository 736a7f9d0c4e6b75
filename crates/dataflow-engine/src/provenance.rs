//! Provenance: execution lineage, state snapshots, task timings.
//!
//! A [`ProvenanceStore`] records a forest of execution ids (who spawned
//! whom), one deep-copied state snapshot per execution, and the task timings
//! of the vertices that ran under it. Snapshots are write-once: storing the
//! same execution twice is a conflict.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{DataflowError, Result};
use crate::state::EvaluationState;
use crate::types::{ExecId, PortId, TaskTiming, Value, VertexId};

/// One recorded port entry of a state snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub port: PortId,
    pub value: Value,
    pub changed: bool,
}

/// A deep copy of the port values of an evaluation state.
pub type StateSnapshot = Vec<SnapshotEntry>;

/// Lineage, snapshots and timings of past executions.
#[derive(Debug, Default)]
pub struct ProvenanceStore {
    parents: HashMap<ExecId, Option<ExecId>>,
    children: HashMap<ExecId, Vec<ExecId>>,
    snapshots: HashMap<ExecId, StateSnapshot>,
    timings: HashMap<ExecId, HashMap<VertexId, TaskTiming>>,
}

impl ProvenanceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // -- lineage -----------------------------------------------------------

    /// Register an execution with no parent.
    pub fn add_root(&mut self, exec: ExecId) -> Result<()> {
        if self.parents.contains_key(&exec) {
            return Err(DataflowError::conflict(format!(
                "execution {} is already registered",
                exec
            )));
        }
        self.parents.insert(exec, None);
        Ok(())
    }

    /// Register `child` as spawned by `parent`.
    pub fn add_execution(&mut self, parent: ExecId, child: ExecId) -> Result<()> {
        if !self.parents.contains_key(&parent) {
            return Err(DataflowError::ExecutionNotFound(parent));
        }
        if self.parents.contains_key(&child) {
            return Err(DataflowError::conflict(format!(
                "execution {} is already registered",
                child
            )));
        }
        self.parents.insert(child, Some(parent));
        self.children.entry(parent).or_default().push(child);
        Ok(())
    }

    /// True if the execution is registered in the lineage.
    pub fn contains(&self, exec: ExecId) -> bool {
        self.parents.contains_key(&exec)
    }

    /// All registered executions, sorted.
    pub fn executions(&self) -> Vec<ExecId> {
        let mut out: Vec<ExecId> = self.parents.keys().copied().collect();
        out.sort();
        out
    }

    /// The parent of an execution (None for roots).
    pub fn parent(&self, exec: ExecId) -> Result<Option<ExecId>> {
        self.parents
            .get(&exec)
            .copied()
            .ok_or(DataflowError::ExecutionNotFound(exec))
    }

    /// The executions spawned by `exec`, in spawn order.
    pub fn children(&self, exec: ExecId) -> Result<Vec<ExecId>> {
        if !self.parents.contains_key(&exec) {
            return Err(DataflowError::ExecutionNotFound(exec));
        }
        Ok(self.children.get(&exec).cloned().unwrap_or_default())
    }

    // -- snapshots ---------------------------------------------------------

    /// Store a deep copy of a state under an execution. Write-once.
    pub fn store(&mut self, exec: ExecId, state: &EvaluationState) -> Result<()> {
        if !self.parents.contains_key(&exec) {
            return Err(DataflowError::ExecutionNotFound(exec));
        }
        if self.snapshots.contains_key(&exec) {
            return Err(DataflowError::conflict(format!(
                "execution {} already has a stored state",
                exec
            )));
        }
        let snapshot = state
            .items()
            .into_iter()
            .map(|(port, value, changed)| SnapshotEntry {
                port,
                value,
                changed,
            })
            .collect();
        self.snapshots.insert(exec, snapshot);
        Ok(())
    }

    /// True if a snapshot exists for the execution.
    pub fn has_state(&self, exec: ExecId) -> bool {
        self.snapshots.contains_key(&exec)
    }

    /// Rebuild a fresh state from the snapshot stored under an execution.
    pub fn get_state(&self, exec: ExecId) -> Result<EvaluationState> {
        let mut state = EvaluationState::new();
        self.load_state(exec, &mut state)?;
        Ok(state)
    }

    /// Load a stored snapshot into an existing state, overwriting entries.
    pub fn load_state(&self, exec: ExecId, state: &mut EvaluationState) -> Result<()> {
        let snapshot = self
            .snapshots
            .get(&exec)
            .ok_or(DataflowError::ExecutionNotFound(exec))?;
        for entry in snapshot {
            state.restore(entry.port, entry.value.clone(), entry.changed);
        }
        Ok(())
    }

    // -- task timings ------------------------------------------------------

    /// Record the timing of a vertex's task under an execution. Write-once
    /// per (execution, vertex) pair.
    pub fn record_task(&mut self, exec: ExecId, vertex: VertexId, timing: TaskTiming) -> Result<()> {
        if !self.parents.contains_key(&exec) {
            return Err(DataflowError::ExecutionNotFound(exec));
        }
        let per_exec = self.timings.entry(exec).or_default();
        if per_exec.contains_key(&vertex) {
            return Err(DataflowError::conflict(format!(
                "vertex {} already has a recorded task under execution {}",
                vertex, exec
            )));
        }
        per_exec.insert(vertex, timing);
        Ok(())
    }

    /// The recorded timing of a vertex under an execution, if the vertex ran.
    pub fn get_task(&self, exec: ExecId, vertex: VertexId) -> Result<Option<&TaskTiming>> {
        if !self.parents.contains_key(&exec) {
            return Err(DataflowError::ExecutionNotFound(exec));
        }
        Ok(self.timings.get(&exec).and_then(|m| m.get(&vertex)))
    }
}
