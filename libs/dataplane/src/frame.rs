//! Stream framing
//!
//! ```text
//! ┌────────────┬──────────────┬─────┬─────────────┐
//! │ length u32 │ channel i64  │ tag │ fields...   │
//! └────────────┴──────────────┴─────┴─────────────┘
//!               └──────────── length ─────────────┘
//! ```
//!
//! Big-endian like every other integer on the wire.

use bytes::{Buf, BufMut, BytesMut};
use codec::wire::wire_len;
use codec::{CodecError, CodecResult, Packet, PacketDispatcher};
use tracing::trace;
use types::{FRAME_LENGTH_SIZE, MIN_FRAME_BODY};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub channel_id: i64,
    pub packet: Packet,
}

impl Frame {
    pub fn new(channel_id: i64, packet: impl Into<Packet>) -> Self {
        Self {
            channel_id,
            packet: packet.into(),
        }
    }
}

/// Append `frame` to `out`
pub fn encode_frame(frame: &Frame, out: &mut BytesMut) {
    let start = out.len();
    out.put_u32(0);
    out.put_i64(frame.channel_id);
    frame.packet.encode(out);

    let length = wire_len(out.len() - start - FRAME_LENGTH_SIZE);
    out[start..start + FRAME_LENGTH_SIZE].copy_from_slice(&length.to_be_bytes());
}

/// Incremental frame decoder for one connection
///
/// Connections share the process-wide dispatch tables; the decoder only
/// borrows them.
#[derive(Debug, Clone, Copy)]
pub struct FrameDecoder {
    dispatcher: &'static PacketDispatcher,
    max_frame_size: usize,
}

impl FrameDecoder {
    pub fn new(dispatcher: &'static PacketDispatcher, max_frame_size: usize) -> Self {
        Self {
            dispatcher,
            max_frame_size,
        }
    }

    /// Decoder for inbound traffic on the broker side
    pub fn server(max_frame_size: usize) -> Self {
        Self::new(PacketDispatcher::server(), max_frame_size)
    }

    pub fn client(max_frame_size: usize) -> Self {
        Self::new(PacketDispatcher::client(), max_frame_size)
    }

    pub fn dispatcher(&self) -> &'static PacketDispatcher {
        self.dispatcher
    }

    /// Take one frame off the front of `src`
    ///
    /// `Ok(None)` until a whole frame is buffered. Errors are fatal: after
    /// one, the rest of the stream cannot be re-synchronised.
    pub fn decode(&self, src: &mut BytesMut) -> CodecResult<Option<Frame>> {
        if src.len() < FRAME_LENGTH_SIZE {
            return Ok(None);
        }

        let mut length_bytes = [0u8; FRAME_LENGTH_SIZE];
        length_bytes.copy_from_slice(&src[..FRAME_LENGTH_SIZE]);
        let length = u32::from_be_bytes(length_bytes) as usize;

        if length > self.max_frame_size {
            return Err(CodecError::frame_too_large(length, self.max_frame_size));
        }
        if length < MIN_FRAME_BODY {
            return Err(CodecError::malformed(
                0,
                FRAME_LENGTH_SIZE,
                MIN_FRAME_BODY,
                length,
                "frame shorter than channel id and tag",
            ));
        }
        if src.len() < FRAME_LENGTH_SIZE + length {
            src.reserve(FRAME_LENGTH_SIZE + length - src.len());
            return Ok(None);
        }

        src.advance(FRAME_LENGTH_SIZE);
        let mut body = src.split_to(length);
        let channel_id = body.get_i64();
        let packet = self.dispatcher.decode(&body)?;

        trace!(channel_id, packet_type = %packet.packet_type(), "Decoded frame");
        Ok(Some(Frame { channel_id, packet }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::{Ping, SessionClose, SessionReceiveContinuation, SessionSendContinuation};
    use bytes::Bytes;

    fn decoder() -> FrameDecoder {
        FrameDecoder::server(1024)
    }

    #[test]
    fn test_frame_layout() {
        let mut out = BytesMut::new();
        encode_frame(&Frame::new(7, Ping { connection_ttl: 1 }), &mut out);

        assert_eq!(out.len(), 4 + 8 + 1 + 8);
        assert_eq!(&out[..4], &17u32.to_be_bytes());
        assert_eq!(&out[4..12], &7i64.to_be_bytes());
        assert_eq!(out[12], types::PacketType::Ping.tag());
    }

    #[test]
    fn test_partial_frames_wait_for_more() {
        let mut encoded = BytesMut::new();
        encode_frame(&Frame::new(3, SessionClose {}), &mut encoded);
        encode_frame(&Frame::new(4, Ping { connection_ttl: 9 }), &mut encoded);

        let mut src = BytesMut::new();
        let mut frames = Vec::new();
        for byte in encoded.iter() {
            src.put_u8(*byte);
            while let Some(frame) = decoder().decode(&mut src).unwrap() {
                frames.push(frame);
            }
        }

        assert_eq!(
            frames,
            vec![
                Frame::new(3, SessionClose {}),
                Frame::new(4, Ping { connection_ttl: 9 })
            ]
        );
        assert!(src.is_empty());
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut src = BytesMut::new();
        encode_frame(
            &Frame::new(
                1,
                SessionSendContinuation {
                    body: Bytes::from(vec![0u8; 2048]),
                    continues: false,
                    requires_response: false,
                },
            ),
            &mut src,
        );
        assert!(matches!(
            decoder().decode(&mut src),
            Err(CodecError::FrameTooLarge { max: 1024, .. })
        ));
    }

    #[test]
    fn test_runt_frame_is_malformed() {
        let mut src = BytesMut::new();
        src.put_u32(3);
        src.put_slice(&[0, 0, 0]);
        assert!(matches!(
            decoder().decode(&mut src),
            Err(CodecError::Malformed { .. })
        ));
    }

    #[test]
    fn test_decoders_share_the_dispatch_tables() {
        let first = FrameDecoder::server(1024);
        let second = FrameDecoder::server(4096);
        assert!(std::ptr::eq(first.dispatcher(), PacketDispatcher::server()));
        assert!(std::ptr::eq(first.dispatcher(), second.dispatcher()));
        assert!(std::ptr::eq(
            FrameDecoder::client(1024).dispatcher(),
            PacketDispatcher::client()
        ));
    }

    #[test]
    fn test_role_decides_what_decodes() {
        let mut src = BytesMut::new();
        encode_frame(
            &Frame::new(
                5,
                SessionReceiveContinuation {
                    consumer_id: 1,
                    body: Bytes::from_static(b"x"),
                    continues: false,
                },
            ),
            &mut src,
        );

        let mut copy = src.clone();
        assert!(FrameDecoder::client(1024).decode(&mut copy).unwrap().is_some());
        assert!(matches!(
            decoder().decode(&mut src),
            Err(CodecError::UnknownPacketType { tag: 77, .. })
        ));
    }
}
