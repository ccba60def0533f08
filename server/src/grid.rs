//! Authoritative segment network and per-tick item simulation.
//!
//! Items advance to the segment midpoint, pick an output edge there
//! (straight through when possible, otherwise any connected edge that is
//! not the entry face; deliberately no smarter routing), then advance to
//! the far side and transfer to the neighbor in one atomic step. An item
//! is never observable without an owner.

use std::collections::HashMap;

use log::{debug, info};
use shared::{Direction, SegPos, Stack, CENTER_PROGRESS, ITEM_SPEED, MAX_PROGRESS};

use crate::endpoint::{give_or_spill, Endpoint};
use crate::item::TransitItem;

/// One node of the network, owning the items currently inside it.
#[derive(Debug)]
pub struct Segment {
    pub pos: SegPos,
    pub items: Vec<TransitItem>,
    pub endpoint: Option<Endpoint>,
}

impl Segment {
    fn new(pos: SegPos) -> Self {
        Self {
            pos,
            items: Vec::new(),
            endpoint: None,
        }
    }

    pub fn item_by_id(&self, id: u16) -> Option<&TransitItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn contains_item(&self, id: u16) -> bool {
        self.items.iter().any(|item| item.id == id)
    }
}

/// The full authoritative world: segments, their items, and everything
/// that fell out of the network this session.
pub struct SegmentNetwork {
    segments: HashMap<SegPos, Segment>,
    next_item_id: u16,
    /// Items that left the network this tick, for removal notices.
    removed: Vec<(SegPos, u16)>,
    /// Stacks that had nowhere to go.
    pub spilled: Vec<(SegPos, Stack)>,
}

impl SegmentNetwork {
    pub fn new() -> Self {
        Self {
            segments: HashMap::new(),
            next_item_id: 1,
            removed: Vec::new(),
            spilled: Vec::new(),
        }
    }

    pub fn add_segment(&mut self, pos: SegPos) {
        self.segments.entry(pos).or_insert_with(|| Segment::new(pos));
    }

    /// Attaches a delivery endpoint to an existing segment.
    pub fn add_endpoint(&mut self, pos: SegPos, capacity: usize) {
        if let Some(segment) = self.segments.get_mut(&pos) {
            segment.endpoint = Some(Endpoint::new(capacity));
        }
    }

    /// Removes a segment; its items leave the network and removal
    /// notices are queued for observers.
    pub fn remove_segment(&mut self, pos: SegPos) -> Option<Segment> {
        let segment = self.segments.remove(&pos)?;
        for item in &segment.items {
            self.removed.push((pos, item.id));
        }
        info!(
            "Removed segment ({}, {}, {}) with {} items",
            pos.x,
            pos.y,
            pos.z,
            segment.items.len()
        );
        Some(segment)
    }

    pub fn contains(&self, pos: SegPos) -> bool {
        self.segments.contains_key(&pos)
    }

    pub fn segment(&self, pos: SegPos) -> Option<&Segment> {
        self.segments.get(&pos)
    }

    pub fn segment_mut(&mut self, pos: SegPos) -> Option<&mut Segment> {
        self.segments.get_mut(&pos)
    }

    pub fn positions(&self) -> Vec<SegPos> {
        self.segments.keys().copied().collect()
    }

    pub fn segments_mut(&mut self) -> impl Iterator<Item = &mut Segment> {
        self.segments.values_mut()
    }

    pub fn item_count(&self) -> usize {
        self.segments.values().map(|s| s.items.len()).sum()
    }

    /// Creates a new item inside the segment at `pos` with a fresh id.
    /// Returns the id, or `None` if the segment is missing or the stack
    /// is empty.
    pub fn inject(
        &mut self,
        pos: SegPos,
        input: Option<Direction>,
        stack: Stack,
    ) -> Option<u16> {
        if stack.is_empty() || !self.segments.contains_key(&pos) {
            return None;
        }

        let id = self.allocate_id();
        let item = TransitItem::new(id, stack, input);
        debug!(
            "Injected item {} at ({}, {}, {})",
            id, pos.x, pos.y, pos.z
        );
        if let Some(segment) = self.segments.get_mut(&pos) {
            segment.items.push(item);
        }
        Some(id)
    }

    /// Next id from the wrapping counter, skipping ids that are still
    /// live anywhere in the network so an id is never reused while a
    /// replica for it may exist.
    fn allocate_id(&mut self) -> u16 {
        loop {
            let id = self.next_item_id;
            self.next_item_id = self.next_item_id.wrapping_add(1);
            if !self.id_live(id) {
                return id;
            }
        }
    }

    fn id_live(&self, id: u16) -> bool {
        self.segments.values().any(|s| s.contains_item(id))
    }

    /// Advances every item one tick. Ownership transfers are collected
    /// first and applied after the sweep so no item moves twice in one
    /// tick.
    pub fn tick(&mut self) {
        let positions = self.positions();
        let mut transfers: Vec<(SegPos, SegPos, TransitItem)> = Vec::new();

        for pos in positions {
            let connected = self.connections(pos);
            let segment = match self.segments.get_mut(&pos) {
                Some(segment) => segment,
                None => continue,
            };
            let has_endpoint = segment.endpoint.is_some();

            let mut index = 0;
            while index < segment.items.len() {
                let departing = step_item(&mut segment.items[index], &connected, has_endpoint);
                if !departing {
                    index += 1;
                    continue;
                }

                let item = segment.items.remove(index);
                match item.output {
                    Some(out) if connected[out.index() as usize] => {
                        transfers.push((pos, pos.offset(out), item));
                    }
                    _ => {
                        // leaves the network here
                        self.removed.push((pos, item.id));
                        give_or_spill(
                            segment.endpoint.as_mut(),
                            &mut self.spilled,
                            pos,
                            item.into_stack(),
                        );
                    }
                }
            }
        }

        for (from, target, mut item) in transfers {
            match self.segments.get_mut(&target) {
                Some(segment) => {
                    item.input = item.output.map(Direction::opposite);
                    item.output = None;
                    item.progress = 0;
                    item.reached_center = false;
                    item.stuck = false;
                    item.blocks_since_sync = item.blocks_since_sync.saturating_add(1);
                    segment.items.push(item);
                }
                None => {
                    self.removed.push((from, item.id));
                    self.spilled.push((from, item.into_stack()));
                }
            }
        }
    }

    /// Drains the removal notices accumulated since the last call.
    pub fn take_removals(&mut self) -> Vec<(SegPos, u16)> {
        std::mem::take(&mut self.removed)
    }

    fn connections(&self, pos: SegPos) -> [bool; 6] {
        let mut connected = [false; 6];
        for dir in Direction::ALL {
            connected[dir.index() as usize] = self.segments.contains_key(&pos.offset(dir));
        }
        connected
    }
}

impl Default for SegmentNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// Advances one item. Returns true when the item has reached the far
/// side and must leave its segment this tick.
fn step_item(item: &mut TransitItem, connected: &[bool; 6], has_endpoint: bool) -> bool {
    if !item.reached_center {
        let next = item.progress.saturating_add(ITEM_SPEED);
        if next < CENTER_PROGRESS {
            item.progress = next;
            return false;
        }

        item.progress = CENTER_PROGRESS;
        item.reached_center = true;
        item.output = choose_output(item.input, connected, has_endpoint);
        item.stuck = item.output.is_none();
        return false;
    }

    if item.output.is_none() {
        // blocked at the center; the network may have changed since
        item.output = choose_output(item.input, connected, has_endpoint);
        item.stuck = item.output.is_none();
        if item.stuck {
            return false;
        }
    }

    item.progress = item.progress.saturating_add(ITEM_SPEED);
    item.progress == MAX_PROGRESS
}

/// Output edge selection: straight through if connected, else any
/// connected edge other than the entry face, else straight toward an
/// endpoint if the segment has one.
fn choose_output(
    input: Option<Direction>,
    connected: &[bool; 6],
    has_endpoint: bool,
) -> Option<Direction> {
    let straight = input.map(Direction::opposite);

    if let Some(dir) = straight {
        if connected[dir.index() as usize] {
            return Some(dir);
        }
    }

    for dir in Direction::ALL {
        if Some(dir) == input {
            continue;
        }
        if connected[dir.index() as usize] {
            return Some(dir);
        }
    }

    if has_endpoint {
        return straight;
    }

    None
}
