//! Map-bodied message sections

use siderite_codec::convert::{FromValue, IntoValue};
use siderite_codec::error::Error as CodecError;
use siderite_codec::primitives::{OrderedMap, Symbol};
use siderite_codec::value::{Descriptor, Value};

/// Keys are restricted to symbols (ulong keys are reserved for the standard)
pub type Annotations = OrderedMap<Symbol, Value>;

macro_rules! described_map {
    (
        $(#[$meta:meta])*
        $name:ident, $key:ty, $dname:literal, $dcode:expr
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $name(pub OrderedMap<$key, Value>);

        impl $name {
            pub const DESCRIPTOR_NAME: &'static str = $dname;
            pub const DESCRIPTOR_CODE: u64 = $dcode;

            pub fn into_inner(self) -> OrderedMap<$key, Value> {
                self.0
            }
        }

        impl From<OrderedMap<$key, Value>> for $name {
            fn from(map: OrderedMap<$key, Value>) -> Self {
                Self(map)
            }
        }

        impl IntoValue for $name {
            fn into_value(self) -> Value {
                Value::described(Self::DESCRIPTOR_CODE, self.0.into_value())
            }
        }

        impl FromValue for $name {
            fn from_value(value: Value) -> Result<Self, CodecError> {
                let body = match value {
                    Value::Described(described) => {
                        let matches = match &described.descriptor {
                            Descriptor::Code(code) => *code == Self::DESCRIPTOR_CODE,
                            Descriptor::Name(name) => name.as_str() == Self::DESCRIPTOR_NAME,
                        };
                        if !matches {
                            return Err(CodecError::UnexpectedDescriptor);
                        }
                        described.value
                    }
                    other => other,
                };
                match body {
                    Value::Null => Ok(Self::default()),
                    body => OrderedMap::from_value(body).map(Self),
                }
            }
        }
    };
}

described_map! {
    /// 3.2.2 Delivery Annotations: node-to-node delivery attributes
    DeliveryAnnotations, Symbol, "amqp:delivery-annotations:map", 0x0000_0000_0000_0071
}

described_map! {
    /// 3.2.3 Message Annotations: infrastructure-targeted message attributes
    MessageAnnotations, Symbol, "amqp:message-annotations:map", 0x0000_0000_0000_0072
}

described_map! {
    /// 3.2.5 Application Properties: structured application data keyed by
    /// string
    ApplicationProperties, String, "amqp:application-properties:map", 0x0000_0000_0000_0074
}

described_map! {
    /// 3.2.9 Footer: details only computable after the bare message
    Footer, Symbol, "amqp:footer:map", 0x0000_0000_0000_0078
}

#[cfg(test)]
mod tests {
    use siderite_codec::convert::{FromValue, IntoValue};
    use siderite_codec::primitives::{OrderedMap, Symbol};
    use siderite_codec::value::Value;

    use super::{ApplicationProperties, MessageAnnotations};

    #[test]
    fn annotations_roundtrip() {
        let mut map = OrderedMap::new();
        map.insert(Symbol::from("x-opt-partition"), Value::UInt(3));
        let annotations = MessageAnnotations(map);
        assert_eq!(
            MessageAnnotations::from_value(annotations.clone().into_value()).unwrap(),
            annotations
        );
    }

    #[test]
    fn application_properties_use_string_keys() {
        let mut map = OrderedMap::new();
        map.insert("color".to_string(), Value::String("red".into()));
        let properties = ApplicationProperties(map);
        assert_eq!(
            ApplicationProperties::from_value(properties.clone().into_value()).unwrap(),
            properties
        );
    }
}
