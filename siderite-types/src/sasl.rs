//! SASL records of AMQP 1.0 Part 5.3

use siderite_codec::composite;
use siderite_codec::convert::{FromValue, IntoValue};
use siderite_codec::error::Error as CodecError;
use siderite_codec::primitives::{Array, Binary, Symbol};
use siderite_codec::value::{Descriptor, Value};

pub const SASL_MAJOR: u8 = 1;
pub const SASL_MINOR: u8 = 0;
pub const SASL_REVISION: u8 = 0;

/// 5.3.3.1 SASL Mechanisms: the server advertises what it accepts, ordered
/// by decreasing preference
#[derive(Debug, Clone, PartialEq)]
pub struct SaslMechanisms {
    /// <field name="sasl-server-mechanisms" type="symbol" multiple="true" mandatory="true"/>
    pub sasl_server_mechanisms: Array<Symbol>,
}

composite! {
    SaslMechanisms, "amqp:sasl-mechanisms:list", 0x0000_0000_0000_0040;
    required sasl_server_mechanisms,
}

/// 5.3.3.2 SASL Init: the client selects a mechanism
#[derive(Debug, Clone, PartialEq)]
pub struct SaslInit {
    /// <field name="mechanism" type="symbol" mandatory="true"/>
    pub mechanism: Symbol,

    /// <field name="initial-response" type="binary"/>
    pub initial_response: Option<Binary>,

    /// <field name="hostname" type="string"/>
    pub hostname: Option<String>,
}

composite! {
    SaslInit, "amqp:sasl-init:list", 0x0000_0000_0000_0041;
    required mechanism,
    optional initial_response,
    optional hostname,
}

/// 5.3.3.3 SASL Challenge
#[derive(Debug, Clone, PartialEq)]
pub struct SaslChallenge {
    /// <field name="challenge" type="binary" mandatory="true"/>
    pub challenge: Binary,
}

composite! {
    SaslChallenge, "amqp:sasl-challenge:list", 0x0000_0000_0000_0042;
    required challenge,
}

/// 5.3.3.4 SASL Response
#[derive(Debug, Clone, PartialEq)]
pub struct SaslResponse {
    /// <field name="response" type="binary" mandatory="true"/>
    pub response: Binary,
}

composite! {
    SaslResponse, "amqp:sasl-response:list", 0x0000_0000_0000_0043;
    required response,
}

/// 5.3.3.5 SASL Outcome: ends the dialog; on `Ok` the peers re-exchange
/// protocol headers
#[derive(Debug, Clone, PartialEq)]
pub struct SaslOutcome {
    /// <field name="code" type="sasl-code" mandatory="true"/>
    pub code: SaslCode,

    /// <field name="additional-data" type="binary"/>
    pub additional_data: Option<Binary>,
}

composite! {
    SaslOutcome, "amqp:sasl-outcome:list", 0x0000_0000_0000_0044;
    required code,
    optional additional_data,
}

/// 5.3.3.6 SASL Code
///
/// A code outside the defined range is a decode error, which fails the
/// negotiation outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SaslCode {
    Ok = 0,
    Auth = 1,
    Sys = 2,
    SysPerm = 3,
    SysTemp = 4,
}

impl IntoValue for SaslCode {
    fn into_value(self) -> Value {
        Value::UByte(self as u8)
    }
}

impl FromValue for SaslCode {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        match u8::from_value(value)? {
            0 => Ok(SaslCode::Ok),
            1 => Ok(SaslCode::Auth),
            2 => Ok(SaslCode::Sys),
            3 => Ok(SaslCode::SysPerm),
            4 => Ok(SaslCode::SysTemp),
            _ => Err(CodecError::Message("unknown sasl outcome code".into())),
        }
    }
}

/// The tagged sum of SASL frame bodies
#[derive(Debug, Clone, PartialEq)]
pub enum SaslFrameBody {
    Mechanisms(SaslMechanisms),
    Init(SaslInit),
    Challenge(SaslChallenge),
    Response(SaslResponse),
    Outcome(SaslOutcome),
}

impl SaslFrameBody {
    pub fn name(&self) -> &'static str {
        match self {
            SaslFrameBody::Mechanisms(_) => "sasl-mechanisms",
            SaslFrameBody::Init(_) => "sasl-init",
            SaslFrameBody::Challenge(_) => "sasl-challenge",
            SaslFrameBody::Response(_) => "sasl-response",
            SaslFrameBody::Outcome(_) => "sasl-outcome",
        }
    }

    pub fn from_value(value: Value) -> Result<Self, CodecError> {
        let described = match value {
            Value::Described(described) => *described,
            other => {
                return Err(CodecError::TypeMismatch {
                    expected: "described sasl frame body",
                    found: other.kind(),
                })
            }
        };
        let code = match &described.descriptor {
            Descriptor::Code(code) => *code,
            Descriptor::Name(name) => match name.as_str() {
                SaslMechanisms::DESCRIPTOR_NAME => SaslMechanisms::DESCRIPTOR_CODE,
                SaslInit::DESCRIPTOR_NAME => SaslInit::DESCRIPTOR_CODE,
                SaslChallenge::DESCRIPTOR_NAME => SaslChallenge::DESCRIPTOR_CODE,
                SaslResponse::DESCRIPTOR_NAME => SaslResponse::DESCRIPTOR_CODE,
                SaslOutcome::DESCRIPTOR_NAME => SaslOutcome::DESCRIPTOR_CODE,
                _ => return Err(CodecError::UnexpectedDescriptor),
            },
        };
        let body = described.value;
        let frame = match code {
            SaslMechanisms::DESCRIPTOR_CODE => {
                SaslFrameBody::Mechanisms(SaslMechanisms::from_value(body)?)
            }
            SaslInit::DESCRIPTOR_CODE => SaslFrameBody::Init(SaslInit::from_value(body)?),
            SaslChallenge::DESCRIPTOR_CODE => {
                SaslFrameBody::Challenge(SaslChallenge::from_value(body)?)
            }
            SaslResponse::DESCRIPTOR_CODE => {
                SaslFrameBody::Response(SaslResponse::from_value(body)?)
            }
            SaslOutcome::DESCRIPTOR_CODE => SaslFrameBody::Outcome(SaslOutcome::from_value(body)?),
            _ => return Err(CodecError::UnexpectedDescriptor),
        };
        Ok(frame)
    }

    pub fn into_value(self) -> Value {
        match self {
            SaslFrameBody::Mechanisms(body) => body.into_value(),
            SaslFrameBody::Init(body) => body.into_value(),
            SaslFrameBody::Challenge(body) => body.into_value(),
            SaslFrameBody::Response(body) => body.into_value(),
            SaslFrameBody::Outcome(body) => body.into_value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use siderite_codec::de::value_from_slice;
    use siderite_codec::primitives::{Array, Symbol};
    use siderite_codec::ser::to_vec;

    use super::*;

    #[test]
    fn mechanisms_roundtrip() {
        let body = SaslFrameBody::Mechanisms(SaslMechanisms {
            sasl_server_mechanisms: Array::from(vec![
                Symbol::from("PLAIN"),
                Symbol::from("ANONYMOUS"),
            ]),
        });
        let encoded = to_vec(&body.clone().into_value()).unwrap();
        let decoded = SaslFrameBody::from_value(value_from_slice(&encoded).unwrap()).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn unknown_outcome_code_fails() {
        let outcome = Value::described(
            SaslOutcome::DESCRIPTOR_CODE,
            Value::List(vec![Value::UByte(9)]),
        );
        assert!(SaslFrameBody::from_value(outcome).is_err());
    }
}
