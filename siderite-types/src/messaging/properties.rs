use siderite_codec::composite;
use siderite_codec::convert::{FromValue, IntoValue};
use siderite_codec::error::Error as CodecError;
use siderite_codec::primitives::{Binary, Symbol, Timestamp, Uuid};
use siderite_codec::value::Value;

use crate::definitions::SequenceNo;

/// 3.2.4 Properties: the immutable properties of the bare message.
///
/// ```text
/// <type name="properties" class="composite" source="list" provides="section">
///     <descriptor name="amqp:properties:list" code="0x00000000:0x00000073"/>
/// </type>
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    pub message_id: Option<MessageId>,
    pub user_id: Option<Binary>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub reply_to: Option<String>,
    pub correlation_id: Option<MessageId>,
    pub content_type: Option<Symbol>,
    pub content_encoding: Option<Symbol>,
    pub absolute_expiry_time: Option<Timestamp>,
    pub creation_time: Option<Timestamp>,
    pub group_id: Option<String>,
    pub group_sequence: Option<SequenceNo>,
    pub reply_to_group_id: Option<String>,
}

composite! {
    Properties, "amqp:properties:list", 0x0000_0000_0000_0073;
    optional message_id,
    optional user_id,
    optional to,
    optional subject,
    optional reply_to,
    optional correlation_id,
    optional content_type,
    optional content_encoding,
    optional absolute_expiry_time,
    optional creation_time,
    optional group_id,
    optional group_sequence,
    optional reply_to_group_id,
}

/// A message-id or correlation-id; one of four primitive shapes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageId {
    ULong(u64),
    Uuid(Uuid),
    Binary(Binary),
    String(String),
}

impl From<u64> for MessageId {
    fn from(value: u64) -> Self {
        MessageId::ULong(value)
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        MessageId::String(value)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        MessageId::String(value.into())
    }
}

impl IntoValue for MessageId {
    fn into_value(self) -> Value {
        match self {
            MessageId::ULong(v) => Value::ULong(v),
            MessageId::Uuid(v) => Value::Uuid(v),
            MessageId::Binary(v) => Value::Binary(v),
            MessageId::String(v) => Value::String(v),
        }
    }
}

impl FromValue for MessageId {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::ULong(v) => Ok(MessageId::ULong(v)),
            Value::Uuid(v) => Ok(MessageId::Uuid(v)),
            Value::Binary(v) => Ok(MessageId::Binary(v)),
            Value::String(v) => Ok(MessageId::String(v)),
            other => Err(CodecError::TypeMismatch {
                expected: "message-id",
                found: other.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use siderite_codec::convert::{FromValue, IntoValue};

    use super::{MessageId, Properties};

    #[test]
    fn properties_roundtrip() {
        let properties = Properties {
            message_id: Some(MessageId::from("m-1")),
            to: Some("q".into()),
            reply_to: Some("replies".into()),
            ..Default::default()
        };
        assert_eq!(
            Properties::from_value(properties.clone().into_value()).unwrap(),
            properties
        );
    }
}
