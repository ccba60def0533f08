//! Stack value semantics: equality, merge and change-detection helpers.
//!
//! Everything here is value-in/value-out; no protocol or lifecycle logic.

use serde::{Deserialize, Serialize};

pub const MAX_STACK_SIZE: u8 = 64;

/// The payload carried by a transit item: a quantity of one item kind,
/// with wear state and an optional opaque data tag.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Stack {
    pub kind: u16,
    pub count: u8,
    pub damage: u16,
    pub tag: Option<String>,
}

impl Stack {
    pub fn new(kind: u16, count: u8) -> Self {
        Self {
            kind,
            count,
            damage: 0,
            tag: None,
        }
    }

    pub fn with_damage(kind: u16, count: u8, damage: u16) -> Self {
        Self {
            kind,
            count,
            damage,
            tag: None,
        }
    }

    /// A zero-count stack is the canonical empty value.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Order-stable hash of the synchronized fields, used to detect
    /// payload changes between full syncs.
    pub fn content_hash(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }

        let mut hash = self.count as u64;
        hash = hash.wrapping_mul(31).wrapping_add(self.kind as u64);
        hash = hash.wrapping_mul(7).wrapping_add(self.damage as u64);
        hash
    }
}

/// Layered stack equality. Empty only ever equals empty; beyond that the
/// `match_*` flags select how strict the comparison is.
pub fn equals(
    source: &Stack,
    target: &Stack,
    match_count: bool,
    match_damage: bool,
    match_tag: bool,
) -> bool {
    if source.is_empty() {
        return target.is_empty();
    }

    if source.kind != target.kind {
        return false;
    }

    if match_count && source.count != target.count {
        return false;
    }

    if match_damage && source.damage != target.damage {
        return false;
    }

    if match_tag && source.tag != target.tag {
        return false;
    }

    true
}

/// Coarse "mergeable" match: same kind, damage and tag, quantity ignored.
pub fn can_merge(source: &Stack, target: &Stack) -> bool {
    equals(source, target, false, true, true)
}

/// Moves as many units as fit from `source` into `target`, respecting
/// `MAX_STACK_SIZE`. Returns the leftover, if any.
pub fn merge_into(source: Stack, target: &mut Stack) -> Option<Stack> {
    if source.is_empty() {
        return None;
    }

    if target.is_empty() {
        *target = source;
        return None;
    }

    if !can_merge(&source, target) {
        return Some(source);
    }

    let room = MAX_STACK_SIZE.saturating_sub(target.count);
    let moved = source.count.min(room);
    target.count += moved;

    let remaining = source.count - moved;
    if remaining == 0 {
        None
    } else {
        let mut leftover = source;
        leftover.count = remaining;
        Some(leftover)
    }
}
