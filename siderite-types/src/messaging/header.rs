use siderite_codec::composite;
use siderite_codec::convert::{FromValue, IntoValue};
use siderite_codec::error::Error as CodecError;
use siderite_codec::value::Value;

use crate::definitions::Milliseconds;

/// 3.2.1 Header: transport headers for a message.
///
/// ```text
/// <type name="header" class="composite" source="list" provides="section">
///     <descriptor name="amqp:header:list" code="0x00000000:0x00000070"/>
/// </type>
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    /// <field name="durable" type="boolean" default="false"/>
    pub durable: bool,

    /// <field name="priority" type="ubyte" default="4"/>
    pub priority: Priority,

    /// <field name="ttl" type="milliseconds"/>
    pub ttl: Option<Milliseconds>,

    /// <field name="first-acquirer" type="boolean" default="false"/>
    pub first_acquirer: bool,

    /// <field name="delivery-count" type="uint" default="0"/>
    pub delivery_count: u32,
}

composite! {
    Header, "amqp:header:list", 0x0000_0000_0000_0070;
    default durable,
    default priority,
    optional ttl,
    default first_acquirer,
    default delivery_count,
}

/// Relative message priority; higher numbers take precedence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priority(pub u8);

impl Default for Priority {
    fn default() -> Self {
        Priority(4)
    }
}

impl From<u8> for Priority {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl IntoValue for Priority {
    fn into_value(self) -> Value {
        Value::UByte(self.0)
    }
}

impl FromValue for Priority {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        u8::from_value(value).map(Priority)
    }
}

#[cfg(test)]
mod tests {
    use siderite_codec::convert::{FromValue, IntoValue};
    use siderite_codec::value::Value;

    use super::{Header, Priority};

    #[test]
    fn default_header_is_an_empty_list() {
        match Header::default().into_value() {
            Value::Described(described) => assert_eq!(described.value, Value::List(vec![])),
            other => panic!("expected described, got {:?}", other),
        }
    }

    #[test]
    fn non_default_priority_roundtrips() {
        let header = Header {
            priority: Priority(9),
            ttl: Some(60_000),
            ..Default::default()
        };
        assert_eq!(Header::from_value(header.clone().into_value()).unwrap(), header);
    }
}
