//! Transport performatives of AMQP 1.0 Part 2.7

use siderite_codec::convert::{FromValue, IntoValue};
use siderite_codec::error::Error as CodecError;
use siderite_codec::value::{Descriptor, Value};

mod open;
pub use open::{ChannelMax, MaxFrameSize, Open};

mod begin;
pub use begin::Begin;

mod attach;
pub use attach::Attach;

mod flow;
pub use flow::Flow;

mod transfer;
pub use transfer::Transfer;

mod disposition;
pub use disposition::Disposition;

mod detach;
pub use detach::Detach;

mod end;
pub use end::End;

mod close;
pub use close::Close;

/// The tagged sum of all transport performatives
///
/// Dispatch is a direct match on the descriptor; unknown descriptors are a
/// decode error at this level since a frame body must be a performative.
#[derive(Debug, Clone, PartialEq)]
pub enum Performative {
    Open(Open),
    Begin(Begin),
    Attach(Attach),
    Flow(Flow),
    Transfer(Transfer),
    Disposition(Disposition),
    Detach(Detach),
    End(End),
    Close(Close),
}

impl Performative {
    /// The wire name of the performative, used in traces
    pub fn name(&self) -> &'static str {
        match self {
            Performative::Open(_) => "open",
            Performative::Begin(_) => "begin",
            Performative::Attach(_) => "attach",
            Performative::Flow(_) => "flow",
            Performative::Transfer(_) => "transfer",
            Performative::Disposition(_) => "disposition",
            Performative::Detach(_) => "detach",
            Performative::End(_) => "end",
            Performative::Close(_) => "close",
        }
    }

    pub fn from_value(value: Value) -> Result<Self, CodecError> {
        let described = match value {
            Value::Described(described) => *described,
            other => {
                return Err(CodecError::TypeMismatch {
                    expected: "described performative",
                    found: other.kind(),
                })
            }
        };

        let code = match &described.descriptor {
            Descriptor::Code(code) => *code,
            Descriptor::Name(name) => match name.as_str() {
                Open::DESCRIPTOR_NAME => Open::DESCRIPTOR_CODE,
                Begin::DESCRIPTOR_NAME => Begin::DESCRIPTOR_CODE,
                Attach::DESCRIPTOR_NAME => Attach::DESCRIPTOR_CODE,
                Flow::DESCRIPTOR_NAME => Flow::DESCRIPTOR_CODE,
                Transfer::DESCRIPTOR_NAME => Transfer::DESCRIPTOR_CODE,
                Disposition::DESCRIPTOR_NAME => Disposition::DESCRIPTOR_CODE,
                Detach::DESCRIPTOR_NAME => Detach::DESCRIPTOR_CODE,
                End::DESCRIPTOR_NAME => End::DESCRIPTOR_CODE,
                Close::DESCRIPTOR_NAME => Close::DESCRIPTOR_CODE,
                _ => return Err(CodecError::UnexpectedDescriptor),
            },
        };

        let body = described.value;
        let performative = match code {
            Open::DESCRIPTOR_CODE => Performative::Open(Open::from_value(body)?),
            Begin::DESCRIPTOR_CODE => Performative::Begin(Begin::from_value(body)?),
            Attach::DESCRIPTOR_CODE => Performative::Attach(Attach::from_value(body)?),
            Flow::DESCRIPTOR_CODE => Performative::Flow(Flow::from_value(body)?),
            Transfer::DESCRIPTOR_CODE => Performative::Transfer(Transfer::from_value(body)?),
            Disposition::DESCRIPTOR_CODE => {
                Performative::Disposition(Disposition::from_value(body)?)
            }
            Detach::DESCRIPTOR_CODE => Performative::Detach(Detach::from_value(body)?),
            End::DESCRIPTOR_CODE => Performative::End(End::from_value(body)?),
            Close::DESCRIPTOR_CODE => Performative::Close(Close::from_value(body)?),
            _ => return Err(CodecError::UnexpectedDescriptor),
        };
        Ok(performative)
    }

    pub fn into_value(self) -> Value {
        match self {
            Performative::Open(p) => p.into_value(),
            Performative::Begin(p) => p.into_value(),
            Performative::Attach(p) => p.into_value(),
            Performative::Flow(p) => p.into_value(),
            Performative::Transfer(p) => p.into_value(),
            Performative::Disposition(p) => p.into_value(),
            Performative::Detach(p) => p.into_value(),
            Performative::End(p) => p.into_value(),
            Performative::Close(p) => p.into_value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use siderite_codec::de::value_from_slice;
    use siderite_codec::ser::to_vec;

    use super::*;

    #[test]
    fn open_dispatches_by_code() {
        let open = Open {
            container_id: "c1".into(),
            ..Default::default()
        };
        let encoded = to_vec(&Performative::Open(open.clone()).into_value()).unwrap();
        let decoded = Performative::from_value(value_from_slice(&encoded).unwrap()).unwrap();
        match decoded {
            Performative::Open(decoded) => assert_eq!(decoded.container_id, open.container_id),
            other => panic!("expected open, got {}", other.name()),
        }
    }

    #[test]
    fn non_performative_descriptor_is_rejected() {
        let value = Value::described(0x99u64, Value::List(vec![]));
        assert!(Performative::from_value(value).is_err());
    }
}
