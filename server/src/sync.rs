//! Authoritative sync scheduling: which items get a full update (stack
//! attached) and which get a movement-only update this tick.
//!
//! Full updates go out when an item has never been synced, when its
//! stack changed since the last full sync, or when it has crossed more
//! than `RESYNC_BLOCK_THRESHOLD` segments since one. That last trigger
//! is the periodic safety net bounding observer divergence after lost
//! messages. Everything else is a movement-only update at tick cadence.

use shared::{ItemUpdate, SegPos, RESYNC_BLOCK_THRESHOLD};

use crate::grid::SegmentNetwork;

/// Builds this tick's updates for every live item, marking items whose
/// stack went out as synced.
pub fn collect_updates(network: &mut SegmentNetwork) -> Vec<(SegPos, ItemUpdate)> {
    let mut updates = Vec::new();

    for segment in network.segments_mut() {
        let pos = segment.pos;
        for item in &mut segment.items {
            let full = item.stack_dirty() || item.blocks_since_sync > RESYNC_BLOCK_THRESHOLD;
            let update = item.to_update(full);
            if full {
                item.mark_synced();
            }
            updates.push((pos, update));
        }
    }

    updates
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{SegPos, Stack};

    fn network_with_item() -> (SegmentNetwork, SegPos, u16) {
        let mut network = SegmentNetwork::new();
        let pos = SegPos::new(0, 0, 0);
        network.add_segment(pos);
        let id = network.inject(pos, None, Stack::new(1, 5)).unwrap();
        (network, pos, id)
    }

    fn updates_for(network: &mut SegmentNetwork, id: u16) -> Vec<ItemUpdate> {
        collect_updates(network)
            .into_iter()
            .filter(|(_, u)| u.id == id)
            .map(|(_, u)| u)
            .collect()
    }

    #[test]
    fn test_new_item_gets_full_update() {
        let (mut network, _, id) = network_with_item();
        let updates = updates_for(&mut network, id);
        assert_eq!(updates.len(), 1);
        assert!(updates[0].stack.is_some());
    }

    #[test]
    fn test_second_update_is_movement_only() {
        let (mut network, _, id) = network_with_item();
        updates_for(&mut network, id);

        let updates = updates_for(&mut network, id);
        assert_eq!(updates.len(), 1);
        assert!(updates[0].stack.is_none());
    }

    #[test]
    fn test_stack_change_forces_full_update() {
        let (mut network, pos, id) = network_with_item();
        updates_for(&mut network, id);

        let segment = network.segment_mut(pos).unwrap();
        segment.items[0].stack_mut().count = 6;

        let updates = updates_for(&mut network, id);
        assert!(updates[0].stack.is_some());
        assert_eq!(updates[0].stack.as_ref().map(|s| s.count), Some(6));
    }

    #[test]
    fn test_crossing_threshold_forces_full_update() {
        let (mut network, pos, id) = network_with_item();
        updates_for(&mut network, id);

        let segment = network.segment_mut(pos).unwrap();
        segment.items[0].blocks_since_sync = RESYNC_BLOCK_THRESHOLD + 1;

        let updates = updates_for(&mut network, id);
        assert!(updates[0].stack.is_some());

        // The counter resets once the full update went out.
        assert_eq!(network.segment(pos).unwrap().items[0].blocks_since_sync, 0);
    }

    #[test]
    fn test_threshold_not_exceeded_stays_movement_only() {
        let (mut network, pos, id) = network_with_item();
        updates_for(&mut network, id);

        let segment = network.segment_mut(pos).unwrap();
        segment.items[0].blocks_since_sync = RESYNC_BLOCK_THRESHOLD;

        let updates = updates_for(&mut network, id);
        assert!(updates[0].stack.is_none());
    }

    #[test]
    fn test_every_item_gets_an_update_each_tick() {
        let mut network = SegmentNetwork::new();
        let a = SegPos::new(0, 0, 0);
        let b = SegPos::new(5, 0, 0);
        network.add_segment(a);
        network.add_segment(b);
        network.inject(a, None, Stack::new(1, 1)).unwrap();
        network.inject(b, None, Stack::new(2, 1)).unwrap();

        assert_eq!(collect_updates(&mut network).len(), 2);
        assert_eq!(collect_updates(&mut network).len(), 2);
    }
}
