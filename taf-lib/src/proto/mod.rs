//! Protocol messages and shared dispatch.
//!
//! A message is a top-level list whose first element is the message type code.
//! Dispatch is a static `match` over the code; a message the receiving
//! endpoint has no handler for is a protocol error, which terminates the
//! session.

use crate::codec::Value;
use crate::error::{Result, TafError};

pub const MSG_PING: u8 = 0x00;
pub const MSG_PONG: u8 = 0x01;
pub const MSG_ACK: u8 = 0x02;
pub const MSG_WATCH_SETUP: u8 = 0x03;
pub const MSG_WATCH_SET: u8 = 0x04;
pub const MSG_RESET: u8 = 0x05;
pub const MSG_NOTIFY: u8 = 0x06;

/// A parsed protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Ping(u128),
    Pong(u128),
    Ack,
    /// Register a watch: filename pattern and line pattern, both opaque byte
    /// regexes compiled server-side only.
    WatchSetup {
        file_pattern: Vec<u8>,
        line_pattern: Vec<u8>,
    },
    /// Select the armed subset: little-endian bitmask over watch indices.
    WatchSet { mask: Vec<u8> },
    Reset,
    Notify { watch: u32 },
}

impl Message {
    pub fn code(&self) -> u8 {
        match self {
            Message::Ping(_) => MSG_PING,
            Message::Pong(_) => MSG_PONG,
            Message::Ack => MSG_ACK,
            Message::WatchSetup { .. } => MSG_WATCH_SETUP,
            Message::WatchSet { .. } => MSG_WATCH_SET,
            Message::Reset => MSG_RESET,
            Message::Notify { .. } => MSG_NOTIFY,
        }
    }

    /// Build the wire value: `[code, payload...]`.
    pub fn into_value(self) -> Value {
        let mut items = vec![Value::UInt(u128::from(self.code()))];
        match self {
            Message::Ping(arg) | Message::Pong(arg) => items.push(Value::UInt(arg)),
            Message::Ack | Message::Reset => {}
            Message::WatchSetup { file_pattern, line_pattern } => {
                items.push(Value::Bytes(file_pattern));
                items.push(Value::Bytes(line_pattern));
            }
            Message::WatchSet { mask } => items.push(Value::Bytes(mask)),
            Message::Notify { watch } => items.push(Value::UInt(u128::from(watch))),
        }
        Value::List(items)
    }

    /// Parse a decoded wire value into a message.
    ///
    /// The root must be a non-empty list starting with a uint type code;
    /// anything else, an unknown code, or a payload of the wrong shape is a
    /// protocol error.
    pub fn from_value(value: Value) -> Result<Message> {
        let Value::List(items) = value else {
            return Err(TafError::Protocol("message root is not a list".into()));
        };
        let mut items = items.into_iter();
        let code = match items.next() {
            Some(Value::UInt(code)) => code,
            Some(_) => {
                return Err(TafError::Protocol("message type code is not a uint".into()));
            }
            None => return Err(TafError::Protocol("empty message".into())),
        };
        let payload: Vec<Value> = items.collect();

        let msg = match u8::try_from(code) {
            Ok(MSG_PING) => Message::Ping(one_uint(payload, "PING")?),
            Ok(MSG_PONG) => Message::Pong(one_uint(payload, "PONG")?),
            Ok(MSG_ACK) => {
                empty(payload, "ACK")?;
                Message::Ack
            }
            Ok(MSG_WATCH_SETUP) => {
                let [fn_p, line_p] = arity::<2>(payload, "WATCH_SETUP")?;
                Message::WatchSetup {
                    file_pattern: bytes(fn_p, "WATCH_SETUP filename pattern")?,
                    line_pattern: bytes(line_p, "WATCH_SETUP line pattern")?,
                }
            }
            Ok(MSG_WATCH_SET) => {
                let [mask] = arity::<1>(payload, "WATCH_SET")?;
                Message::WatchSet { mask: bytes(mask, "WATCH_SET mask")? }
            }
            Ok(MSG_RESET) => {
                empty(payload, "RESET")?;
                Message::Reset
            }
            Ok(MSG_NOTIFY) => {
                let idx = one_uint(payload, "NOTIFY")?;
                let watch = u32::try_from(idx).map_err(|_| {
                    TafError::Protocol(format!("NOTIFY watch index {idx} out of range"))
                })?;
                Message::Notify { watch }
            }
            _ => {
                return Err(TafError::Protocol(format!("unknown message code {code}")));
            }
        };
        Ok(msg)
    }
}

fn arity<const N: usize>(payload: Vec<Value>, what: &str) -> Result<[Value; N]> {
    let got = payload.len();
    payload.try_into().map_err(|_| {
        TafError::Protocol(format!("{what} expects {N} payload elements, got {got}"))
    })
}

fn empty(payload: Vec<Value>, what: &str) -> Result<()> {
    if payload.is_empty() {
        Ok(())
    } else {
        Err(TafError::Protocol(format!(
            "{what} carries no payload, got {} elements",
            payload.len()
        )))
    }
}

fn one_uint(payload: Vec<Value>, what: &str) -> Result<u128> {
    let [arg] = arity::<1>(payload, what)?;
    match arg {
        Value::UInt(v) => Ok(v),
        other => Err(TafError::Protocol(format!("{what} argument is not a uint: {other:?}"))),
    }
}

fn bytes(value: Value, what: &str) -> Result<Vec<u8>> {
    match value {
        Value::Bytes(b) => Ok(b),
        other => Err(TafError::Protocol(format!("{what} is not a string: {other:?}"))),
    }
}

/// One side of the event stream. Implementations handle the messages valid
/// for their direction; PING is answered centrally by [`dispatch`].
pub trait Endpoint {
    fn handle(&mut self, msg: Message, out: &mut Vec<Message>) -> Result<()>;
}

/// Route one inbound message, answering PING with PONG for either side.
pub fn dispatch<E: Endpoint>(endpoint: &mut E, msg: Message, out: &mut Vec<Message>) -> Result<()> {
    match msg {
        Message::Ping(arg) => {
            out.push(Message::Pong(arg));
            Ok(())
        }
        other => endpoint.handle(other, out),
    }
}
