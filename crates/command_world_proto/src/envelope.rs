//! Command envelope: the wire-facing payload for one command invocation.

use serde::{Deserialize, Serialize};

// ============================================================================
// Type Aliases
// ============================================================================

/// Linearized map tile index. Zero means "no location".
pub type TileIndex = u32;

pub const NO_TILE: TileIndex = 0;

// ============================================================================
// Opcode Packing
// ============================================================================

/// Identifier of one registered command kind.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Opcode(pub u16);

/// Identifier of a user-facing message prefix, resolved by the presentation
/// layer. Only the low 12 bits travel on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u16);

/// Layout of [`CommandEnvelope::packed`]: `[flag bits | message bits | opcode id]`.
pub const OPCODE_MASK: u32 = 0x0000_FFFF;
pub const MESSAGE_SHIFT: u32 = 16;
pub const MESSAGE_MASK: u32 = 0x0FFF_0000;
pub const FLAGS_MASK: u32 = 0xF000_0000;

/// Set by the replication layer when it re-delivers a locally queued command.
/// Never trusted on envelopes arriving from outside the local session.
pub const PACKED_FROM_NETWORK: u32 = 1 << 28;

pub fn pack_command(opcode: Opcode, message: Option<MessageId>) -> u32 {
    let message_bits = match message {
        Some(message) => {
            debug_assert!(u32::from(message.0) <= MESSAGE_MASK >> MESSAGE_SHIFT);
            (u32::from(message.0) << MESSAGE_SHIFT) & MESSAGE_MASK
        }
        None => 0,
    };
    u32::from(opcode.0) | message_bits
}

pub fn unpack_opcode(packed: u32) -> Opcode {
    Opcode((packed & OPCODE_MASK) as u16)
}

/// Message id zero means "no message prefix".
pub fn unpack_message(packed: u32) -> Option<MessageId> {
    let bits = ((packed & MESSAGE_MASK) >> MESSAGE_SHIFT) as u16;
    if bits == 0 {
        None
    } else {
        Some(MessageId(bits))
    }
}

// ============================================================================
// Payload
// ============================================================================

/// Free-form command payload. Text payloads are human-entered strings;
/// binary payloads carry opaque bytes (e.g. uploaded settings blobs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "data")]
pub enum CommandPayload {
    #[default]
    None,
    Text(String),
    Binary(Vec<u8>),
}

impl CommandPayload {
    pub fn is_empty(&self) -> bool {
        match self {
            CommandPayload::None => true,
            CommandPayload::Text(text) => text.is_empty(),
            CommandPayload::Binary(bytes) => bytes.is_empty(),
        }
    }

    pub fn has_text(&self) -> bool {
        matches!(self, CommandPayload::Text(text) if !text.is_empty())
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, CommandPayload::Binary(_))
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            CommandPayload::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn binary_len(&self) -> Option<usize> {
        match self {
            CommandPayload::Binary(bytes) => Some(bytes.len()),
            _ => None,
        }
    }

    /// Strip control characters from text payloads unless the command is
    /// registered as carrying formatting control sequences. Binary payloads
    /// pass through untouched.
    pub fn sanitized(self, allow_control: bool) -> Self {
        match self {
            CommandPayload::Text(text) if !allow_control => {
                CommandPayload::Text(text.chars().filter(|c| !c.is_control()).collect())
            }
            other => other,
        }
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// One command invocation as it travels between peers. The completion
/// callback is process-local and deliberately not part of this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub tile: TileIndex,
    pub p1: u32,
    pub p2: u32,
    /// Packed `[flag bits | message bits | opcode id]`, see [`pack_command`].
    pub packed: u32,
    #[serde(default)]
    pub payload: CommandPayload,
}

impl CommandEnvelope {
    pub fn new(tile: TileIndex, p1: u32, p2: u32, opcode: Opcode) -> Self {
        Self {
            tile,
            p1,
            p2,
            packed: pack_command(opcode, None),
            payload: CommandPayload::None,
        }
    }

    pub fn with_message(mut self, message: MessageId) -> Self {
        self.packed = pack_command(self.opcode(), Some(message)) | (self.packed & FLAGS_MASK);
        self
    }

    pub fn with_payload(mut self, payload: CommandPayload) -> Self {
        self.payload = payload;
        self
    }

    pub fn opcode(&self) -> Opcode {
        unpack_opcode(self.packed)
    }

    pub fn message(&self) -> Option<MessageId> {
        unpack_message(self.packed)
    }

    pub fn from_network(&self) -> bool {
        self.packed & PACKED_FROM_NETWORK != 0
    }

    pub fn mark_from_network(&mut self) {
        self.packed |= PACKED_FROM_NETWORK;
    }

    pub fn clear_network_mark(&mut self) {
        self.packed &= !PACKED_FROM_NETWORK;
    }
}
