//! Codec errors for packet framing and decoding
//!
//! Every variant here is fatal for the connection that produced it: once a
//! tag is not understood or a field overruns its buffer, the position of the
//! next frame can no longer be trusted.

use crate::dispatch::DispatcherRole;
use thiserror::Error;

/// Packet decoding errors with diagnostic context
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// No registration in the dispatcher chain recognises the tag
    #[error("Unknown packet type {tag} for {role} dispatcher (family: {family})")]
    UnknownPacketType {
        tag: u8,
        role: DispatcherRole,
        family: &'static str,
    },

    /// Decoding read past the declared payload, or left bytes behind
    #[error("Malformed packet (tag {tag}) at offset {offset}: need {need} bytes, {remaining} remaining ({context})")]
    Malformed {
        tag: u8,
        offset: usize,
        need: usize,
        remaining: usize,
        context: String,
    },

    /// A frame header announced more bytes than the connection accepts
    #[error("Frame too large: {size} bytes exceeds maximum {max}")]
    FrameTooLarge { size: usize, max: usize },
}

impl CodecError {
    pub fn unknown_packet_type(tag: u8, role: DispatcherRole) -> Self {
        let family = types::ProtocolFamily::from_tag(tag)
            .map(|f| f.name())
            .unwrap_or("unreserved");
        Self::UnknownPacketType { tag, role, family }
    }

    pub fn malformed(
        tag: u8,
        offset: usize,
        need: usize,
        remaining: usize,
        context: impl Into<String>,
    ) -> Self {
        Self::Malformed {
            tag,
            offset,
            need,
            remaining,
            context: context.into(),
        }
    }

    pub fn frame_too_large(size: usize, max: usize) -> Self {
        Self::FrameTooLarge { size, max }
    }

    /// Whether the connection must be torn down after this error
    ///
    /// All codec errors are; the method exists so supervisors do not have to
    /// match on variants.
    pub fn is_fatal(&self) -> bool {
        true
    }
}

/// Result type for codec operations
pub type CodecResult<T> = std::result::Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_packet_type_names_family() {
        let err = CodecError::unknown_packet_type(95, DispatcherRole::Client);
        assert_eq!(
            err.to_string(),
            "Unknown packet type 95 for client dispatcher (family: replication)"
        );

        let err = CodecError::unknown_packet_type(250, DispatcherRole::Base);
        assert!(err.to_string().contains("unreserved"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_malformed_formatting() {
        let err = CodecError::malformed(71, 12, 8, 3, "field message_id");
        assert_eq!(
            err.to_string(),
            "Malformed packet (tag 71) at offset 12: need 8 bytes, 3 remaining (field message_id)"
        );
    }
}
