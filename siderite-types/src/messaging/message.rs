//! The annotated message: ordered sections around a bare message

use bytes::{Bytes, BytesMut};

use siderite_codec::convert::{FromValue, IntoValue};
use siderite_codec::de::Decoder;
use siderite_codec::error::Error as CodecError;
use siderite_codec::read::SliceReader;
use siderite_codec::ser::encode_value;
use siderite_codec::value::{Descriptor, Value};

use super::{
    AmqpSequence, AmqpValue, ApplicationProperties, Body, Data, DeliveryAnnotations, Footer,
    Header, MessageAnnotations, Properties,
};

/// A message assembled from its sections in wire order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub header: Option<Header>,
    pub delivery_annotations: Option<DeliveryAnnotations>,
    pub message_annotations: Option<MessageAnnotations>,
    pub properties: Option<Properties>,
    pub application_properties: Option<ApplicationProperties>,
    pub body: Body,
    pub footer: Option<Footer>,
}

impl Message {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// A message whose body is a single amqp-value section
    pub fn value(value: impl IntoValue) -> Self {
        Self {
            body: Body::Value(AmqpValue(value.into_value())),
            ..Default::default()
        }
    }

    /// A message whose body is a single data section
    pub fn data(data: impl Into<Bytes>) -> Self {
        Self {
            body: Body::Data(vec![Data(data.into())]),
            ..Default::default()
        }
    }

    /// Serializes the sections in order into a payload
    pub fn encode(self) -> Result<Bytes, CodecError> {
        let mut dst = BytesMut::new();
        if let Some(header) = self.header {
            encode_value(&mut dst, &header.into_value())?;
        }
        if let Some(delivery_annotations) = self.delivery_annotations {
            encode_value(&mut dst, &delivery_annotations.into_value())?;
        }
        if let Some(message_annotations) = self.message_annotations {
            encode_value(&mut dst, &message_annotations.into_value())?;
        }
        if let Some(properties) = self.properties {
            encode_value(&mut dst, &properties.into_value())?;
        }
        if let Some(application_properties) = self.application_properties {
            encode_value(&mut dst, &application_properties.into_value())?;
        }
        match self.body {
            Body::Empty => {}
            Body::Data(sections) => {
                for section in sections {
                    encode_value(&mut dst, &section.into_value())?;
                }
            }
            Body::Sequence(sections) => {
                for section in sections {
                    encode_value(&mut dst, &section.into_value())?;
                }
            }
            Body::Value(value) => encode_value(&mut dst, &value.into_value())?,
        }
        if let Some(footer) = self.footer {
            encode_value(&mut dst, &footer.into_value())?;
        }
        Ok(dst.freeze())
    }

    /// Parses a payload into sections; unknown section descriptors are an
    /// error since the bare-message grammar is closed
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        let mut reader = SliceReader::new(payload);
        let mut message = Message::default();
        let mut data_sections: Vec<Data> = Vec::new();
        let mut sequence_sections: Vec<AmqpSequence> = Vec::new();

        while !reader.is_empty() {
            let value = Decoder::new(&mut reader).read_value()?;
            let code = match &value {
                Value::Described(described) => match &described.descriptor {
                    Descriptor::Code(code) => *code,
                    Descriptor::Name(name) => match name.as_str() {
                        Header::DESCRIPTOR_NAME => Header::DESCRIPTOR_CODE,
                        DeliveryAnnotations::DESCRIPTOR_NAME => {
                            DeliveryAnnotations::DESCRIPTOR_CODE
                        }
                        MessageAnnotations::DESCRIPTOR_NAME => MessageAnnotations::DESCRIPTOR_CODE,
                        Properties::DESCRIPTOR_NAME => Properties::DESCRIPTOR_CODE,
                        ApplicationProperties::DESCRIPTOR_NAME => {
                            ApplicationProperties::DESCRIPTOR_CODE
                        }
                        Data::DESCRIPTOR_NAME => Data::DESCRIPTOR_CODE,
                        AmqpSequence::DESCRIPTOR_NAME => AmqpSequence::DESCRIPTOR_CODE,
                        AmqpValue::DESCRIPTOR_NAME => AmqpValue::DESCRIPTOR_CODE,
                        Footer::DESCRIPTOR_NAME => Footer::DESCRIPTOR_CODE,
                        _ => return Err(CodecError::UnexpectedDescriptor),
                    },
                },
                other => {
                    return Err(CodecError::TypeMismatch {
                        expected: "message section",
                        found: other.kind(),
                    })
                }
            };

            match code {
                Header::DESCRIPTOR_CODE => message.header = Some(Header::from_value(value)?),
                DeliveryAnnotations::DESCRIPTOR_CODE => {
                    message.delivery_annotations = Some(DeliveryAnnotations::from_value(value)?)
                }
                MessageAnnotations::DESCRIPTOR_CODE => {
                    message.message_annotations = Some(MessageAnnotations::from_value(value)?)
                }
                Properties::DESCRIPTOR_CODE => {
                    message.properties = Some(Properties::from_value(value)?)
                }
                ApplicationProperties::DESCRIPTOR_CODE => {
                    message.application_properties = Some(ApplicationProperties::from_value(value)?)
                }
                Data::DESCRIPTOR_CODE => data_sections.push(Data::from_value(value)?),
                AmqpSequence::DESCRIPTOR_CODE => {
                    sequence_sections.push(AmqpSequence::from_value(value)?)
                }
                AmqpValue::DESCRIPTOR_CODE => {
                    message.body = Body::Value(AmqpValue::from_value(value)?)
                }
                Footer::DESCRIPTOR_CODE => message.footer = Some(Footer::from_value(value)?),
                _ => return Err(CodecError::UnexpectedDescriptor),
            }
        }

        if !data_sections.is_empty() {
            message.body = Body::Data(data_sections);
        } else if !sequence_sections.is_empty() {
            message.body = Body::Sequence(sequence_sections);
        }
        Ok(message)
    }
}

/// Assembles a [`Message`] section by section
#[derive(Debug, Clone, Default)]
pub struct Builder {
    inner: Message,
}

impl Builder {
    pub fn header(mut self, header: Header) -> Self {
        self.inner.header = Some(header);
        self
    }

    pub fn delivery_annotations(mut self, annotations: DeliveryAnnotations) -> Self {
        self.inner.delivery_annotations = Some(annotations);
        self
    }

    pub fn message_annotations(mut self, annotations: MessageAnnotations) -> Self {
        self.inner.message_annotations = Some(annotations);
        self
    }

    pub fn properties(mut self, properties: Properties) -> Self {
        self.inner.properties = Some(properties);
        self
    }

    pub fn application_properties(mut self, properties: ApplicationProperties) -> Self {
        self.inner.application_properties = Some(properties);
        self
    }

    pub fn body(mut self, body: Body) -> Self {
        self.inner.body = body;
        self
    }

    pub fn value(self, value: impl IntoValue) -> Self {
        self.body(Body::Value(AmqpValue(value.into_value())))
    }

    pub fn data(self, data: impl Into<Bytes>) -> Self {
        self.body(Body::Data(vec![Data(data.into())]))
    }

    pub fn footer(mut self, footer: Footer) -> Self {
        self.inner.footer = Some(footer);
        self
    }

    pub fn build(self) -> Message {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use siderite_codec::primitives::OrderedMap;
    use siderite_codec::value::Value;

    use crate::messaging::{ApplicationProperties, Body, MessageId, Priority, Properties};

    use super::Message;

    #[test]
    fn value_message_roundtrip() {
        let message = Message::value("hi");
        let payload = message.clone().encode().unwrap();
        assert_eq!(Message::decode(&payload).unwrap(), message);
    }

    #[test]
    fn full_message_roundtrip() {
        let mut props = OrderedMap::new();
        props.insert("k".to_string(), Value::UInt(1));
        let message = Message::builder()
            .header(crate::messaging::Header {
                priority: Priority(7),
                ..Default::default()
            })
            .properties(Properties {
                message_id: Some(MessageId::from(99u64)),
                ..Default::default()
            })
            .application_properties(ApplicationProperties(props))
            .data(&b"payload"[..])
            .build();
        let payload = message.clone().encode().unwrap();
        assert_eq!(Message::decode(&payload).unwrap(), message);
    }

    #[test]
    fn multiple_data_sections_accumulate() {
        let message = Message {
            body: Body::Data(vec![
                crate::messaging::Data(vec![1u8].into()),
                crate::messaging::Data(vec![2u8].into()),
            ]),
            ..Default::default()
        };
        let payload = message.clone().encode().unwrap();
        assert_eq!(Message::decode(&payload).unwrap(), message);
    }

    #[test]
    fn empty_payload_is_an_empty_message() {
        let message = Message::decode(&[]).unwrap();
        assert!(message.body.is_empty());
    }
}
