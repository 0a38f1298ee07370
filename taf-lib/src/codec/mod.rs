//! TAF wire objects.
//!
//! Every object on the wire carries a 5-octet header: the payload length as a
//! big-endian `u32` (not counting the header itself), then a one-byte type
//! code. Three object types exist:
//!
//! - `0x01` uint: minimal big-endian byte representation, zero bytes for `0`
//! - `0x02` string: opaque octets
//! - `0x03` list: a big-endian `u32` element count followed by the encoded
//!   elements back to back
//!
//! Messages are top-level lists whose first element is the message type code;
//! see [`crate::proto`].

mod frame;

pub use frame::{FrameCodec, MAX_FRAME_LEN};

use crate::error::{Result, TafError};

pub const HEADER_LEN: usize = 5;

const TYPE_UINT: u8 = 0x01;
const TYPE_STRING: u8 = 0x02;
const TYPE_LIST: u8 = 0x03;

/// A decoded TAF protocol object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    UInt(u128),
    Bytes(Vec<u8>),
    List(Vec<Value>),
}

impl Value {
    /// Total encoded size, header included.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN
            + match self {
                Value::UInt(v) => uint_len(*v),
                Value::Bytes(b) => b.len(),
                Value::List(items) => 4 + items.iter().map(Value::encoded_len).sum::<usize>(),
            }
    }
}

fn uint_len(v: u128) -> usize {
    ((128 - v.leading_zeros()) as usize).div_ceil(8)
}

/// Append the encoded form of `value` to `out`.
///
/// List headers are back-patched once the children have been emitted, so a
/// single pass suffices.
pub fn encode_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::UInt(v) => {
            let len = uint_len(*v);
            out.extend_from_slice(&(len as u32).to_be_bytes());
            out.push(TYPE_UINT);
            out.extend_from_slice(&v.to_be_bytes()[16 - len..]);
        }
        Value::Bytes(b) => {
            out.extend_from_slice(&(b.len() as u32).to_be_bytes());
            out.push(TYPE_STRING);
            out.extend_from_slice(b);
        }
        Value::List(items) => {
            let size_at = out.len();
            out.extend_from_slice(&[0u8; 4]);
            out.push(TYPE_LIST);
            out.extend_from_slice(&(items.len() as u32).to_be_bytes());
            for item in items {
                encode_value(item, out);
            }
            let payload = out.len() - size_at - HEADER_LEN;
            out[size_at..size_at + 4].copy_from_slice(&(payload as u32).to_be_bytes());
        }
    }
}

/// Encode `value` into a fresh buffer.
pub fn encode_to_vec(value: &Value) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.encoded_len());
    encode_value(value, &mut out);
    out
}

/// Decode one object from the front of `buf`.
///
/// Returns the value and the number of bytes consumed. Fails with a protocol
/// error on an unknown type code, a truncated object, or a list whose declared
/// payload length does not match the sum of its children.
pub fn decode_value(buf: &[u8]) -> Result<(Value, usize)> {
    if buf.len() < HEADER_LEN {
        return Err(TafError::Protocol(format!(
            "truncated object header: {} of {HEADER_LEN} bytes",
            buf.len()
        )));
    }
    let payload_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    let total = HEADER_LEN + payload_len;
    if buf.len() < total {
        return Err(TafError::Protocol(format!(
            "object length {total} exceeds the {} bytes available in its container",
            buf.len()
        )));
    }
    let type_code = buf[4];
    let payload = &buf[HEADER_LEN..total];

    let value = match type_code {
        TYPE_UINT => Value::UInt(uint_from_be(payload)?),
        TYPE_STRING => Value::Bytes(payload.to_vec()),
        TYPE_LIST => {
            if payload.len() < 4 {
                return Err(TafError::Protocol(format!(
                    "list payload of {} bytes is too short for an element count",
                    payload.len()
                )));
            }
            let count = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
            let mut items = Vec::new();
            let mut off = 4;
            for _ in 0..count {
                let (item, used) = decode_value(&payload[off..])?;
                off += used;
                items.push(item);
            }
            if off != payload.len() {
                return Err(TafError::Protocol(format!(
                    "list length mismatch: payload declares {} bytes, elements cover {}",
                    payload.len(),
                    off
                )));
            }
            Value::List(items)
        }
        other => {
            return Err(TafError::Protocol(format!("unknown type code 0x{other:02x}")));
        }
    };
    Ok((value, total))
}

fn uint_from_be(payload: &[u8]) -> Result<u128> {
    let digits = match payload.iter().position(|&b| b != 0) {
        Some(first) => &payload[first..],
        None => &[],
    };
    if digits.len() > 16 {
        return Err(TafError::Protocol(format!(
            "uint of {} significant bytes exceeds the supported width",
            digits.len()
        )));
    }
    Ok(digits.iter().fold(0u128, |acc, &b| (acc << 8) | u128::from(b)))
}
