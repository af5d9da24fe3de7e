//! Body sections of the bare message

use siderite_codec::convert::{FromValue, IntoValue};
use siderite_codec::error::Error as CodecError;
use siderite_codec::primitives::Binary;
use siderite_codec::value::{Descriptor, Value};

macro_rules! descriptor_check {
    ($value:expr, $name:ident) => {
        match $value {
            Value::Described(described) => {
                let matches = match &described.descriptor {
                    Descriptor::Code(code) => *code == $name::DESCRIPTOR_CODE,
                    Descriptor::Name(name) => name.as_str() == $name::DESCRIPTOR_NAME,
                };
                if !matches {
                    return Err(CodecError::UnexpectedDescriptor);
                }
                described.value
            }
            other => other,
        }
    };
}

/// 3.2.6 Data: one section of opaque binary content
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Data(pub Binary);

impl Data {
    pub const DESCRIPTOR_NAME: &'static str = "amqp:data:binary";
    pub const DESCRIPTOR_CODE: u64 = 0x0000_0000_0000_0075;
}

impl IntoValue for Data {
    fn into_value(self) -> Value {
        Value::described(Self::DESCRIPTOR_CODE, Value::Binary(self.0))
    }
}

impl FromValue for Data {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        let body = descriptor_check!(value, Data);
        Binary::from_value(body).map(Data)
    }
}

/// 3.2.7 AMQP Sequence: one section of structured list content
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmqpSequence(pub Vec<Value>);

impl AmqpSequence {
    pub const DESCRIPTOR_NAME: &'static str = "amqp:amqp-sequence:list";
    pub const DESCRIPTOR_CODE: u64 = 0x0000_0000_0000_0076;
}

impl IntoValue for AmqpSequence {
    fn into_value(self) -> Value {
        Value::described(Self::DESCRIPTOR_CODE, Value::List(self.0))
    }
}

impl FromValue for AmqpSequence {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        let body = descriptor_check!(value, AmqpSequence);
        Vec::from_value(body).map(AmqpSequence)
    }
}

/// 3.2.8 AMQP Value: a single value as the whole body
#[derive(Debug, Clone, PartialEq)]
pub struct AmqpValue(pub Value);

impl AmqpValue {
    pub const DESCRIPTOR_NAME: &'static str = "amqp:amqp-value:*";
    pub const DESCRIPTOR_CODE: u64 = 0x0000_0000_0000_0077;
}

impl IntoValue for AmqpValue {
    fn into_value(self) -> Value {
        Value::described(Self::DESCRIPTOR_CODE, self.0)
    }
}

impl FromValue for AmqpValue {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        let body = descriptor_check!(value, AmqpValue);
        Ok(AmqpValue(body))
    }
}

/// The body of a message: data sections, sequence sections, a single value,
/// or nothing at all
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    #[default]
    Empty,
    Data(Vec<Data>),
    Sequence(Vec<AmqpSequence>),
    Value(AmqpValue),
}

impl Body {
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// The payload of a single data-section body, if that is the shape
    pub fn as_data(&self) -> Option<&Binary> {
        match self {
            Body::Data(sections) if sections.len() == 1 => Some(&sections[0].0),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Body::Value(value) => Some(&value.0),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use siderite_codec::convert::{FromValue, IntoValue};
    use siderite_codec::value::Value;

    use super::{AmqpValue, Data};

    #[test]
    fn data_roundtrip() {
        let data = Data(vec![1u8, 2, 3].into());
        assert_eq!(Data::from_value(data.clone().into_value()).unwrap(), data);
    }

    #[test]
    fn amqp_value_carries_anything() {
        let value = AmqpValue(Value::String("hi".into()));
        assert_eq!(
            AmqpValue::from_value(value.clone().into_value()).unwrap(),
            value
        );
    }
}
