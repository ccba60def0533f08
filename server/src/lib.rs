//! # Transit Sync Server Library
//!
//! This library provides the authoritative side of the transit item
//! synchronization protocol. It owns the segment network simulation,
//! assigns item identities, and broadcasts the update stream that
//! observers reconcile against.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server runs the definitive version of the segment network. Items
//! are created here, move here, and leave the network here; observers
//! only ever hold replicas reconstructed from the update stream.
//!
//! ### Identity Assignment
//! Every transit item gets a 16-bit id that is unique for as long as a
//! live item with that id exists anywhere in the network. Observers key
//! their identity caches on these ids, so the allocator never reuses an
//! id that is still live.
//!
//! ### Sync Scheduling
//! Once per tick the server emits one update per item: a full update
//! (stack attached) for newly created items, items whose stack changed,
//! and items past the re-sync crossing threshold; a movement-only update
//! for everything else. Delivery is fire-and-forget over UDP; loss is
//! recovered by the periodic full re-sync, never by retries.
//!
//! ## Module Organization
//!
//! - `item`: the authoritative transit item state holder
//! - `grid`: segment network and per-tick movement simulation
//! - `endpoint`: delivery inventories at the edge of the network
//! - `sync`: full-vs-movement update scheduling
//! - `observers`: observer registry, capacity and timeouts
//! - `network`: UDP socket management and the main tick loop

pub mod endpoint;
pub mod grid;
pub mod item;
pub mod network;
pub mod observers;
pub mod sync;
