//! 3.4 Delivery states

use siderite_codec::composite;
use siderite_codec::convert::{FromValue, IntoValue};
use siderite_codec::error::Error as CodecError;
use siderite_codec::value::{Descriptor, Value};

use crate::definitions::{Error, Fields};

/// The state of a delivery as seen by one end of a link
///
/// Accepted, rejected, released and modified are terminal outcomes; received
/// reports partial progress.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryState {
    Received(Received),
    Accepted(Accepted),
    Rejected(Rejected),
    Released(Released),
    Modified(Modified),
}

impl DeliveryState {
    pub fn accepted() -> Self {
        DeliveryState::Accepted(Accepted {})
    }

    pub fn released() -> Self {
        DeliveryState::Released(Released {})
    }

    pub fn rejected(error: Option<Error>) -> Self {
        DeliveryState::Rejected(Rejected { error })
    }

    /// Whether this state is an outcome, after which it cannot change
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryState::Received(_))
    }
}

impl IntoValue for DeliveryState {
    fn into_value(self) -> Value {
        match self {
            DeliveryState::Received(s) => s.into_value(),
            DeliveryState::Accepted(s) => s.into_value(),
            DeliveryState::Rejected(s) => s.into_value(),
            DeliveryState::Released(s) => s.into_value(),
            DeliveryState::Modified(s) => s.into_value(),
        }
    }
}

impl FromValue for DeliveryState {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        let code = match &value {
            Value::Described(described) => match &described.descriptor {
                Descriptor::Code(code) => *code,
                Descriptor::Name(name) => match name.as_str() {
                    Received::DESCRIPTOR_NAME => Received::DESCRIPTOR_CODE,
                    Accepted::DESCRIPTOR_NAME => Accepted::DESCRIPTOR_CODE,
                    Rejected::DESCRIPTOR_NAME => Rejected::DESCRIPTOR_CODE,
                    Released::DESCRIPTOR_NAME => Released::DESCRIPTOR_CODE,
                    Modified::DESCRIPTOR_NAME => Modified::DESCRIPTOR_CODE,
                    _ => return Err(CodecError::UnexpectedDescriptor),
                },
            },
            other => {
                return Err(CodecError::TypeMismatch {
                    expected: "delivery-state",
                    found: other.kind(),
                })
            }
        };
        match code {
            Received::DESCRIPTOR_CODE => Received::from_value(value).map(DeliveryState::Received),
            Accepted::DESCRIPTOR_CODE => Accepted::from_value(value).map(DeliveryState::Accepted),
            Rejected::DESCRIPTOR_CODE => Rejected::from_value(value).map(DeliveryState::Rejected),
            Released::DESCRIPTOR_CODE => Released::from_value(value).map(DeliveryState::Released),
            Modified::DESCRIPTOR_CODE => Modified::from_value(value).map(DeliveryState::Modified),
            _ => Err(CodecError::UnexpectedDescriptor),
        }
    }
}

/// 3.4.1 Received: partial progress of a delivery
#[derive(Debug, Clone, PartialEq)]
pub struct Received {
    /// <field name="section-number" type="uint" mandatory="true"/>
    pub section_number: u32,

    /// <field name="section-offset" type="ulong" mandatory="true"/>
    pub section_offset: u64,
}

composite! {
    Received, "amqp:received:list", 0x0000_0000_0000_0023;
    required section_number,
    required section_offset,
}

/// 3.4.2 Accepted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Accepted {}

composite! {
    Accepted, "amqp:accepted:list", 0x0000_0000_0000_0024;
}

/// 3.4.3 Rejected
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rejected {
    /// <field name="error" type="error"/>
    pub error: Option<Error>,
}

composite! {
    Rejected, "amqp:rejected:list", 0x0000_0000_0000_0025;
    optional error,
}

/// 3.4.4 Released
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Released {}

composite! {
    Released, "amqp:released:list", 0x0000_0000_0000_0026;
}

/// 3.4.5 Modified
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Modified {
    /// <field name="delivery-failed" type="boolean"/>
    pub delivery_failed: Option<bool>,

    /// <field name="undeliverable-here" type="boolean"/>
    pub undeliverable_here: Option<bool>,

    /// <field name="message-annotations" type="fields"/>
    pub message_annotations: Option<Fields>,
}

composite! {
    Modified, "amqp:modified:list", 0x0000_0000_0000_0027;
    optional delivery_failed,
    optional undeliverable_here,
    optional message_annotations,
}

#[cfg(test)]
mod tests {
    use siderite_codec::de::value_from_slice;
    use siderite_codec::format_code::FormatCode;
    use siderite_codec::ser::to_vec;

    use super::*;

    #[test]
    fn state_dispatch_roundtrip() {
        for state in [
            DeliveryState::accepted(),
            DeliveryState::released(),
            DeliveryState::rejected(None),
            DeliveryState::Modified(Modified {
                delivery_failed: Some(true),
                ..Default::default()
            }),
            DeliveryState::Received(Received {
                section_number: 0,
                section_offset: 100,
            }),
        ] {
            let encoded = to_vec(&state.clone().into_value()).unwrap();
            let decoded = DeliveryState::from_value(value_from_slice(&encoded).unwrap()).unwrap();
            assert_eq!(decoded, state);
        }
    }

    #[test]
    fn accepted_decodes_from_an_explicit_empty_list() {
        let raw = vec![
            FormatCode::Described as u8,
            FormatCode::SmallULong as u8,
            0x24,
            FormatCode::List8 as u8,
            1, // size covers only the count byte
            0, // count
        ];
        let decoded = DeliveryState::from_value(value_from_slice(&raw).unwrap()).unwrap();
        assert_eq!(decoded, DeliveryState::accepted());
    }

    #[test]
    fn terminal_states() {
        assert!(DeliveryState::accepted().is_terminal());
        assert!(!DeliveryState::Received(Received {
            section_number: 0,
            section_offset: 0
        })
        .is_terminal());
    }
}
