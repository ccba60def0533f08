//! Binary wire format for transit item updates.
//!
//! One update is a fixed 5-byte header, optionally followed by the stack
//! payload. Whether the payload is present is driven strictly by the
//! `has_payload` flag bit, never by the message length. Integers are
//! big-endian.
//!
//! | Offset | Size | Field      | Notes                                    |
//! |--------|------|------------|------------------------------------------|
//! | 0      | 2    | id         | unsigned                                 |
//! | 2      | 1    | directions | bits 0-2 input, bits 3-5 output          |
//! | 3      | 1    | flags      | bit0 center, bit1 stuck, bit2 payload    |
//! | 4      | 1    | progress   | 0-255 along the current edge             |
//! | 5      | var  | stack      | bincode `Stack`, present iff flags bit2  |

use thiserror::Error;

use crate::direction::Direction;
use crate::stack::Stack;

pub const HEADER_LEN: usize = 5;

pub const FLAG_REACHED_CENTER: u8 = 0x01;
pub const FLAG_STUCK: u8 = 0x02;
pub const FLAG_HAS_PAYLOAD: u8 = 0x04;

/// Wire index for "no direction" in the packed direction byte.
const DIR_NONE: u8 = 6;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("item update truncated: got {0} bytes, header needs {HEADER_LEN}")]
    Truncated(usize),
    #[error("invalid direction bits: {0}")]
    Direction(u8),
    #[error("malformed stack payload: {0}")]
    Payload(#[from] bincode::Error),
}

/// One synchronization message for a single transit item.
///
/// A "full" update carries the stack (creation or periodic refresh); a
/// movement-only update carries just position and flags. Both share the
/// same shape, discriminated by `stack.is_some()`.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemUpdate {
    pub id: u16,
    pub input: Option<Direction>,
    pub output: Option<Direction>,
    pub reached_center: bool,
    pub stuck: bool,
    pub progress: u8,
    pub stack: Option<Stack>,
}

impl ItemUpdate {
    pub fn has_payload(&self) -> bool {
        self.stack.is_some()
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut buf = Vec::with_capacity(HEADER_LEN + 16);

        buf.extend_from_slice(&self.id.to_be_bytes());
        buf.push(pack_directions(self.input, self.output));

        let mut flags = 0u8;
        if self.reached_center {
            flags |= FLAG_REACHED_CENTER;
        }
        if self.stuck {
            flags |= FLAG_STUCK;
        }
        if self.stack.is_some() {
            flags |= FLAG_HAS_PAYLOAD;
        }
        buf.push(flags);
        buf.push(self.progress);

        if let Some(stack) = &self.stack {
            buf.extend_from_slice(&bincode::serialize(stack)?);
        }

        Ok(buf)
    }

    pub fn decode(buf: &[u8]) -> Result<ItemUpdate, WireError> {
        if buf.len() < HEADER_LEN {
            return Err(WireError::Truncated(buf.len()));
        }

        let id = u16::from_be_bytes([buf[0], buf[1]]);
        let dirs = buf[2];
        let flags = buf[3];
        let progress = buf[4];

        let input = unpack_direction(dirs & 0x07)?;
        let output = unpack_direction((dirs >> 3) & 0x07)?;

        let stack = if flags & FLAG_HAS_PAYLOAD != 0 {
            Some(bincode::deserialize(&buf[HEADER_LEN..])?)
        } else {
            None
        };

        Ok(ItemUpdate {
            id,
            input,
            output,
            reached_center: flags & FLAG_REACHED_CENTER != 0,
            stuck: flags & FLAG_STUCK != 0,
            progress,
            stack,
        })
    }
}

fn pack_directions(input: Option<Direction>, output: Option<Direction>) -> u8 {
    wire_index(input) | (wire_index(output) << 3)
}

fn wire_index(dir: Option<Direction>) -> u8 {
    dir.map_or(DIR_NONE, Direction::index)
}

fn unpack_direction(bits: u8) -> Result<Option<Direction>, WireError> {
    if bits == DIR_NONE {
        return Ok(None);
    }

    match Direction::from_index(bits) {
        Some(dir) => Ok(Some(dir)),
        None => Err(WireError::Direction(bits)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movement_update() -> ItemUpdate {
        ItemUpdate {
            id: 7,
            input: Some(Direction::North),
            output: Some(Direction::South),
            reached_center: true,
            stuck: false,
            progress: 128,
            stack: None,
        }
    }

    #[test]
    fn test_movement_update_is_five_bytes() {
        let encoded = movement_update().encode().unwrap();
        assert_eq!(encoded.len(), HEADER_LEN);
    }

    #[test]
    fn test_header_layout() {
        let encoded = movement_update().encode().unwrap();

        assert_eq!(u16::from_be_bytes([encoded[0], encoded[1]]), 7);
        // input North (2) in bits 0-2, output South (3) in bits 3-5
        assert_eq!(encoded[2], 2 | (3 << 3));
        assert_eq!(encoded[3], FLAG_REACHED_CENTER);
        assert_eq!(encoded[4], 128);
    }

    #[test]
    fn test_payload_flag_follows_stack_presence() {
        let mut update = movement_update();
        assert_eq!(update.encode().unwrap()[3] & FLAG_HAS_PAYLOAD, 0);

        update.stack = Some(Stack::new(1, 4));
        let encoded = update.encode().unwrap();
        assert_ne!(encoded[3] & FLAG_HAS_PAYLOAD, 0);
        assert!(encoded.len() > HEADER_LEN);
    }

    #[test]
    fn test_roundtrip_movement_only() {
        let update = movement_update();
        let decoded = ItemUpdate::decode(&update.encode().unwrap()).unwrap();
        assert_eq!(decoded, update);
    }

    #[test]
    fn test_roundtrip_with_stack() {
        let mut stack = Stack::with_damage(513, 17, 9);
        stack.tag = Some("fragile".to_string());

        let update = ItemUpdate {
            id: u16::MAX,
            input: None,
            output: Some(Direction::Up),
            reached_center: false,
            stuck: true,
            progress: 255,
            stack: Some(stack),
        };

        let decoded = ItemUpdate::decode(&update.encode().unwrap()).unwrap();
        assert_eq!(decoded, update);
    }

    #[test]
    fn test_roundtrip_no_directions() {
        let update = ItemUpdate {
            id: 0,
            input: None,
            output: None,
            reached_center: false,
            stuck: false,
            progress: 0,
            stack: None,
        };

        let decoded = ItemUpdate::decode(&update.encode().unwrap()).unwrap();
        assert_eq!(decoded, update);
    }

    #[test]
    fn test_decode_truncated_header() {
        let err = ItemUpdate::decode(&[0, 7, 2]).unwrap_err();
        match err {
            WireError::Truncated(len) => assert_eq!(len, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decode_rejects_direction_bits_seven() {
        let buf = [0, 7, 0x07, 0, 0];
        assert!(matches!(
            ItemUpdate::decode(&buf),
            Err(WireError::Direction(7))
        ));
    }

    #[test]
    fn test_decode_truncated_payload() {
        let mut update = movement_update();
        update.stack = Some(Stack::new(1, 4));
        let mut encoded = update.encode().unwrap();
        encoded.truncate(HEADER_LEN + 2);

        assert!(matches!(
            ItemUpdate::decode(&encoded),
            Err(WireError::Payload(_))
        ));
    }

    #[test]
    fn test_decode_ignores_length_without_flag() {
        // Payload bytes appended but flag clear: decoder must not read them.
        let mut encoded = movement_update().encode().unwrap();
        encoded.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);

        let decoded = ItemUpdate::decode(&encoded).unwrap();
        assert!(decoded.stack.is_none());
    }
}
