//! Reconciliation engine: applies one inbound item update to the
//! replica world.
//!
//! Identity is resolved cache-first, then by scanning the target
//! container, then by creating a replica when the update carries a
//! stack. A cached candidate is only trusted after re-validating that
//! its recorded owner is the update's target container and that the
//! owner's live collection still contains it; anything else is stale and
//! gets detached and evicted before resolution continues. Updates that
//! cannot be attached to anything are dropped silently: under unordered,
//! lossy delivery they are expected, not errors.

use log::debug;

use shared::{ItemUpdate, SegPos};

use crate::cache::IdentityCache;
use crate::world::{ClientWorld, ReplicaItem};

/// How the update's id was resolved to a replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Cache hit, owner and membership validated.
    CachedValid,
    /// Adopted by scanning the target container (including after a
    /// stale cache entry was evicted).
    OwnerScan,
    /// No candidate existed; a replica was created from a full update.
    Created,
}

/// Why an update was discarded without touching any replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The observer has no container for the target segment.
    UnknownSegment,
    /// Movement-only update for an id the observer does not know.
    NoPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied { resolution: Resolution },
    Dropped { reason: DropReason },
}

/// Applies one decoded update addressed to the container at `pos`.
///
/// Any sequence of updates, in any order and with any duplication,
/// leaves at most one replica per id across the cache and all
/// containers.
pub fn apply_update(
    world: &mut ClientWorld,
    cache: &mut IdentityCache,
    pos: SegPos,
    update: &ItemUpdate,
) -> ApplyOutcome {
    if !world.contains(pos) {
        return ApplyOutcome::Dropped {
            reason: DropReason::UnknownSegment,
        };
    }

    // Step 1: resolve by cache, re-validating owner and membership.
    let mut resolution = None;
    if let Some(owner) = cache.lookup(update.id) {
        let valid = owner == pos
            && world
                .segment(owner)
                .map_or(false, |segment| segment.contains_item(update.id));

        if valid {
            resolution = Some(Resolution::CachedValid);
        } else {
            if let Some(segment) = world.segment_mut(owner) {
                segment.detach(update.id);
            }
            cache.evict(update.id);
            debug!("Evicted stale cache entry for item {}", update.id);
        }
    }

    // Step 2: resolve by scanning the target container.
    if resolution.is_none() {
        if let Some(segment) = world.segment(pos) {
            if segment.contains_item(update.id) {
                resolution = Some(Resolution::OwnerScan);
            }
        }
    }

    // Step 5 for an existing candidate.
    if let Some(resolution) = resolution {
        if let Some(replica) = world
            .segment_mut(pos)
            .and_then(|segment| segment.item_by_id_mut(update.id))
        {
            apply_fields(replica, update);
            // Step 6: refresh the cache mapping.
            cache.insert(update.id, pos);
            return ApplyOutcome::Applied { resolution };
        }
    }

    // Steps 3 and 4: create from a full update, or drop.
    if update.stack.is_none() {
        return ApplyOutcome::Dropped {
            reason: DropReason::NoPayload,
        };
    }

    let mut replica = ReplicaItem::new(update.id);
    apply_fields(&mut replica, update);

    // Step 6: register, then attach, so a partially resolved replica is
    // never visible mid-reconciliation.
    cache.insert(update.id, pos);
    if let Some(segment) = world.segment_mut(pos) {
        segment.attach(replica);
    }

    ApplyOutcome::Applied {
        resolution: Resolution::Created,
    }
}

/// Step 5: field merge. The staleness counter resets here and only
/// here, on successful reconciliation.
fn apply_fields(replica: &mut ReplicaItem, update: &ItemUpdate) {
    replica.input = update.input;
    replica.output = update.output;
    replica.reached_center = update.reached_center;
    replica.stuck = update.stuck;
    replica.progress = update.progress;
    replica.ticks_since_update = 0;

    if let Some(stack) = &update.stack {
        replica.set_stack(stack.clone());
    }
}
