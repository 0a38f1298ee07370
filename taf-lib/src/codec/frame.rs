use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_value, encode_value, HEADER_LEN};
use crate::error::TafError;
use crate::proto::Message;

/// Upper bound on a single frame, header included. A peer declaring more is
/// treated as a protocol violation rather than a buffering request.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// tokio-util codec turning the duplex byte stream into whole [`Message`]s.
///
/// The decoder asks for exactly as many bytes as the next decision needs: 4
/// until a length header is visible, then the full frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Message;
    type Error = TafError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, TafError> {
        if src.len() < 4 {
            src.reserve(4 - src.len());
            return Ok(None);
        }
        let payload_len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        let total = HEADER_LEN + payload_len;
        if total > MAX_FRAME_LEN {
            return Err(TafError::Protocol(format!(
                "frame of {total} bytes exceeds the {MAX_FRAME_LEN} byte limit"
            )));
        }
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }
        let frame = src.split_to(total);
        let (value, _) = decode_value(&frame)?;
        Message::from_value(value).map(Some)
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = TafError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<(), TafError> {
        let value = msg.into_value();
        dst.reserve(value.encoded_len());
        let mut out = Vec::with_capacity(value.encoded_len());
        encode_value(&value, &mut out);
        dst.extend_from_slice(&out);
        Ok(())
    }
}
