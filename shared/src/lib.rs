//! Types shared between the authoritative server and observer clients:
//! directions and grid positions, stack value semantics, the transit item
//! wire codec and the transport packet envelope.

pub mod direction;
pub mod packet;
pub mod stack;
pub mod wire;

pub use direction::{Direction, SegPos};
pub use packet::Packet;
pub use stack::{can_merge, equals, merge_into, Stack, MAX_STACK_SIZE};
pub use wire::{ItemUpdate, WireError};

/// Protocol version carried in `Packet::Connect`.
pub const PROTOCOL_VERSION: u32 = 1;

/// Progress units an item advances per simulation tick.
pub const ITEM_SPEED: u8 = 8;

/// Progress value at the segment midpoint, where the output edge is chosen.
pub const CENTER_PROGRESS: u8 = 128;

/// Progress value at which an item crosses into the next segment.
pub const MAX_PROGRESS: u8 = 255;

/// Segment crossings an item may accumulate before the server forces a
/// full re-sync, bounding observer divergence after lost creations.
pub const RESYNC_BLOCK_THRESHOLD: u8 = 16;

/// Observer-side ticks a replica may go without an update before it is
/// pruned, covering removal notices that never arrived.
pub const REPLICA_TTL_TICKS: u32 = 200;
