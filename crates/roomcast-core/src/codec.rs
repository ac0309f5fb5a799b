//! MessagePack wire codec
//!
//! Messages travel as self-describing MessagePack maps with named keys
//! (`rmp_serde::to_vec_named`), so field order never matters and payloads
//! stay readable to any MessagePack tooling. The `type` key carries the
//! variant tag.

use bytes::Bytes;

use crate::error::Result;
use crate::types::Message;

/// Encode a message to MessagePack bytes
pub fn encode(message: &Message) -> Result<Bytes> {
    let buf = rmp_serde::to_vec_named(message)?;
    Ok(Bytes::from(buf))
}

/// Decode a message from MessagePack bytes
pub fn decode(bytes: &[u8]) -> Result<Message> {
    Ok(rmp_serde::from_slice(bytes)?)
}
