use serde::{Deserialize, Serialize};

use crate::direction::SegPos;

/// Transport envelope exchanged between the authoritative server and its
/// observers. Item update payloads travel as raw wire-codec bytes
/// addressed to their owning segment; everything else is plain bincode.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Connected {
        observer_id: u32,
    },
    /// Observer keepalive; carries no state.
    Heartbeat,
    Disconnect,
    Disconnected {
        reason: String,
    },

    /// Full segment layout, sent once after `Connected`.
    Topology {
        segments: Vec<SegPos>,
    },
    SegmentAdded {
        pos: SegPos,
    },
    SegmentRemoved {
        pos: SegPos,
    },

    /// One wire-codec item update for the segment at `pos`.
    ItemUpdate {
        pos: SegPos,
        data: Vec<u8>,
    },
    /// Best-effort removal notice; the protocol stays consistent when
    /// this is lost (stale replicas are evicted or pruned).
    ItemRemoved {
        pos: SegPos,
        id: u16,
    },
}
