pub mod envelope;
pub mod wire;

pub use envelope::{
    pack_command, unpack_message, unpack_opcode, CommandEnvelope, CommandPayload, MessageId,
    Opcode, TileIndex, FLAGS_MASK, MESSAGE_MASK, MESSAGE_SHIFT, NO_TILE, OPCODE_MASK,
    PACKED_FROM_NETWORK,
};
pub use wire::{
    decode_envelope, encode_envelope, envelope_digest, from_cbor, to_canonical_cbor, WireError,
    WIRE_ENCODING_CBOR,
};
