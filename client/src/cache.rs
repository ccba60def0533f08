//! Identity cache: fast id-to-owner resolution for inbound updates.
//!
//! The cache records which segment last owned each replica id. Entries
//! are hints, not ownership: every hit is re-validated against the
//! owning container's live collection by the reconciliation engine, and
//! stale entries are evicted explicitly. The cache never keeps a replica
//! alive and tolerates the referent vanishing without notice.

use std::collections::HashMap;

use shared::SegPos;

#[derive(Debug, Default)]
pub struct IdentityCache {
    entries: HashMap<u16, SegPos>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// The recorded owner for `id`. Absence is a normal outcome.
    pub fn lookup(&self, id: u16) -> Option<SegPos> {
        self.entries.get(&id).copied()
    }

    /// Records `pos` as the owner of `id`. Idempotent; a later call for
    /// the same id supersedes the previous mapping.
    pub fn insert(&mut self, id: u16, pos: SegPos) {
        self.entries.insert(id, pos);
    }

    /// Removes the mapping for `id`, if any.
    pub fn evict(&mut self, id: u16) {
        self.entries.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
