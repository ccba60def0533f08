//! Delivery targets at the edge of the segment network.

use log::debug;
use shared::{merge_into, SegPos, Stack};

/// An inventory attached to a segment that absorbs arriving items.
#[derive(Debug, Clone)]
pub struct Endpoint {
    slots: Vec<Stack>,
    capacity: usize,
}

impl Endpoint {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            capacity,
        }
    }

    /// Tries to absorb `stack`, merging into compatible slots first and
    /// opening a new slot if there is room. Returns the leftover.
    pub fn accept(&mut self, stack: Stack) -> Option<Stack> {
        if stack.is_empty() {
            return None;
        }

        let mut remaining = stack;
        for slot in &mut self.slots {
            match merge_into(remaining, slot) {
                None => return None,
                Some(rest) => remaining = rest,
            }
        }

        if self.slots.len() < self.capacity {
            self.slots.push(remaining);
            return None;
        }

        Some(remaining)
    }

    pub fn slots(&self) -> &[Stack] {
        &self.slots
    }

    pub fn total_count(&self) -> u32 {
        self.slots.iter().map(|s| s.count as u32).sum()
    }
}

/// Materializes a stack leaving the network: give it to the segment's
/// endpoint if one can take it, otherwise spill it into the world list.
pub fn give_or_spill(
    endpoint: Option<&mut Endpoint>,
    spilled: &mut Vec<(SegPos, Stack)>,
    pos: SegPos,
    stack: Stack,
) {
    if stack.is_empty() {
        return;
    }

    let leftover = match endpoint {
        Some(endpoint) => endpoint.accept(stack),
        None => Some(stack),
    };

    if let Some(rest) = leftover {
        debug!(
            "Spilled {} units of kind {} at ({}, {}, {})",
            rest.count, rest.kind, pos.x, pos.y, pos.z
        );
        spilled.push((pos, rest));
    }
}
