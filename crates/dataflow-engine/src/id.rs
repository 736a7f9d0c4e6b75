//! Dense integer identifier generator.
//!
//! Vertex, port, edge and execution ids are used as direct map keys, so the
//! generator hands out the smallest unused non-negative integer and reclaims
//! released ids, keeping the id space dense across structural churn.

use std::collections::BTreeSet;

use crate::error::{DataflowError, Result};

/// Issues and reclaims small dense integer identifiers.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    /// Upper bound of the issued range; every id >= next is unused.
    next: u32,
    /// Released ids below `next`, available for reuse.
    free: BTreeSet<u32>,
}

impl IdGenerator {
    /// Create a new generator starting at id 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the smallest unused id and mark it in use.
    pub fn get(&mut self) -> u32 {
        if let Some(id) = self.free.pop_first() {
            return id;
        }
        let id = self.next;
        self.next += 1;
        id
    }

    /// Register an externally supplied id as in use.
    ///
    /// Fails with a conflict if the id has already been issued.
    pub fn declare(&mut self, id: u32) -> Result<u32> {
        if id < self.next {
            if self.free.remove(&id) {
                Ok(id)
            } else {
                Err(DataflowError::conflict(format!("id {} already in use", id)))
            }
        } else {
            for gap in self.next..id {
                self.free.insert(gap);
            }
            self.next = id + 1;
            Ok(id)
        }
    }

    /// Return an id to the free pool.
    pub fn release(&mut self, id: u32) {
        if id >= self.next || !self.in_use(id) {
            return;
        }
        self.free.insert(id);
        // Shrink the issued range when its upper end becomes free.
        while self.next > 0 && self.free.remove(&(self.next - 1)) {
            self.next -= 1;
        }
    }

    /// True if the id has been issued and not released.
    pub fn in_use(&self, id: u32) -> bool {
        id < self.next && !self.free.contains(&id)
    }
}
