//! Types defined in AMQP 1.0 specification Part 2.8: Definitions

use siderite_codec::convert::{FromValue, IntoValue};
use siderite_codec::error::Error as CodecError;
use siderite_codec::primitives::{Binary, OrderedMap, Symbol};
use siderite_codec::value::Value;

mod conditions;
pub use conditions::{AmqpError, ConnectionError, ErrorCondition, LinkError, SessionError};

mod error;
pub use error::Error;

/// 2.8.4 Handle: the index a link is addressed by within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(pub u32);

impl Default for Handle {
    fn default() -> Self {
        Handle(u32::MAX)
    }
}

impl From<u32> for Handle {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Handle> for u32 {
    fn from(value: Handle) -> Self {
        value.0
    }
}

impl IntoValue for Handle {
    fn into_value(self) -> Value {
        Value::UInt(self.0)
    }
}

impl FromValue for Handle {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        u32::from_value(value).map(Handle)
    }
}

/// 2.8.5 Seconds
pub type Seconds = u32;

/// 2.8.6 Milliseconds
pub type Milliseconds = u32;

/// 2.8.7 Delivery Tag: up to 32 octets chosen by the sender
pub type DeliveryTag = Binary;

/// 2.8.8 Delivery Number
pub type DeliveryNumber = SequenceNo;

/// 2.8.9 Transfer Number
pub type TransferNumber = SequenceNo;

/// 2.8.10 Sequence No: RFC 1982 serial numbers; arithmetic wraps
pub type SequenceNo = u32;

/// 2.8.11 Message Format
pub type MessageFormat = u32;

/// 2.8.12 IETF Language Tag
pub type IetfLanguageTag = Symbol;

/// 2.8.13 Fields
pub type Fields = OrderedMap<Symbol, Value>;

/// 2.8.1 Role: `false` is sender, `true` is receiver on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Sender,
    Receiver,
}

impl Role {
    pub fn is_sender(&self) -> bool {
        matches!(self, Role::Sender)
    }

    pub fn is_receiver(&self) -> bool {
        matches!(self, Role::Receiver)
    }

    /// The role the remote peer plays on the same link
    pub fn remote(&self) -> Role {
        match self {
            Role::Sender => Role::Receiver,
            Role::Receiver => Role::Sender,
        }
    }
}

impl IntoValue for Role {
    fn into_value(self) -> Value {
        Value::Bool(self.is_receiver())
    }
}

impl FromValue for Role {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        Ok(match bool::from_value(value)? {
            false => Role::Sender,
            true => Role::Receiver,
        })
    }
}

/// 2.8.2 Sender Settle Mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum SenderSettleMode {
    Unsettled = 0,
    Settled = 1,
    #[default]
    Mixed = 2,
}

impl IntoValue for SenderSettleMode {
    fn into_value(self) -> Value {
        Value::UByte(self as u8)
    }
}

impl FromValue for SenderSettleMode {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        match u8::from_value(value)? {
            0 => Ok(SenderSettleMode::Unsettled),
            1 => Ok(SenderSettleMode::Settled),
            2 => Ok(SenderSettleMode::Mixed),
            _ => Err(CodecError::Message("invalid snd-settle-mode".into())),
        }
    }
}

/// 2.8.3 Receiver Settle Mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum ReceiverSettleMode {
    #[default]
    First = 0,
    Second = 1,
}

impl IntoValue for ReceiverSettleMode {
    fn into_value(self) -> Value {
        Value::UByte(self as u8)
    }
}

impl FromValue for ReceiverSettleMode {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        match u8::from_value(value)? {
            0 => Ok(ReceiverSettleMode::First),
            1 => Ok(ReceiverSettleMode::Second),
            _ => Err(CodecError::Message("invalid rcv-settle-mode".into())),
        }
    }
}

/// 2.8.19 Constant definitions
pub const MAJOR: u8 = 1;
pub const MINOR: u8 = 0;
pub const REVISION: u8 = 0;
pub const PORT: u16 = 5672;
pub const SECURE_PORT: u16 = 5671;
/// Both peers MUST accept frames of up to 512 octets
pub const MIN_MAX_FRAME_SIZE: u32 = 512;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_wire_encoding() {
        assert_eq!(Role::Sender.into_value(), Value::Bool(false));
        assert_eq!(Role::Receiver.into_value(), Value::Bool(true));
        assert_eq!(Role::from_value(Value::Bool(true)).unwrap(), Role::Receiver);
    }

    #[test]
    fn handle_default_is_unset() {
        assert_eq!(Handle::default().0, u32::MAX);
    }

    #[test]
    fn settle_mode_defaults() {
        assert_eq!(SenderSettleMode::default(), SenderSettleMode::Mixed);
        assert_eq!(ReceiverSettleMode::default(), ReceiverSettleMode::First);
    }
}
