//! Source and target termini carried on attach

use siderite_codec::composite;
use siderite_codec::convert::{FromValue, IntoValue};
use siderite_codec::error::Error as CodecError;
use siderite_codec::primitives::{Array, OrderedMap, Symbol};
use siderite_codec::value::Value;

use crate::definitions::{Fields, Seconds};

use super::DeliveryState;

/// 3.5.1 Terminus Durability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u32)]
pub enum TerminusDurability {
    #[default]
    None = 0,
    Configuration = 1,
    UnsettledState = 2,
}

impl IntoValue for TerminusDurability {
    fn into_value(self) -> Value {
        Value::UInt(self as u32)
    }
}

impl FromValue for TerminusDurability {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        match u32::from_value(value)? {
            0 => Ok(TerminusDurability::None),
            1 => Ok(TerminusDurability::Configuration),
            2 => Ok(TerminusDurability::UnsettledState),
            _ => Err(CodecError::Message("invalid terminus durability".into())),
        }
    }
}

/// 3.5.2 Terminus Expiry Policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExpiryPolicy {
    LinkDetach,
    #[default]
    SessionEnd,
    ConnectionClose,
    Never,
}

impl ExpiryPolicy {
    pub fn symbol(&self) -> &'static str {
        match self {
            ExpiryPolicy::LinkDetach => "link-detach",
            ExpiryPolicy::SessionEnd => "session-end",
            ExpiryPolicy::ConnectionClose => "connection-close",
            ExpiryPolicy::Never => "never",
        }
    }
}

impl IntoValue for ExpiryPolicy {
    fn into_value(self) -> Value {
        Value::Symbol(Symbol::from(self.symbol()))
    }
}

impl FromValue for ExpiryPolicy {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        let symbol = Symbol::from_value(value)?;
        match symbol.as_str() {
            "link-detach" => Ok(ExpiryPolicy::LinkDetach),
            "session-end" => Ok(ExpiryPolicy::SessionEnd),
            "connection-close" => Ok(ExpiryPolicy::ConnectionClose),
            "never" => Ok(ExpiryPolicy::Never),
            _ => Err(CodecError::Message("invalid expiry policy".into())),
        }
    }
}

/// 3.5.3 Source: where messages come from on a receiving link.
///
/// ```text
/// <type name="source" class="composite" source="list" provides="source">
///     <descriptor name="amqp:source:list" code="0x00000000:0x00000028"/>
/// </type>
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Source {
    pub address: Option<String>,
    pub durable: TerminusDurability,
    pub expiry_policy: ExpiryPolicy,
    pub timeout: Seconds,
    pub dynamic: bool,
    pub dynamic_node_properties: Option<Fields>,
    pub distribution_mode: Option<Symbol>,
    pub filter: Option<OrderedMap<Symbol, Value>>,
    pub default_outcome: Option<DeliveryState>,
    pub outcomes: Option<Array<Symbol>>,
    pub capabilities: Option<Array<Symbol>>,
}

composite! {
    Source, "amqp:source:list", 0x0000_0000_0000_0028;
    optional address,
    default durable,
    default expiry_policy,
    default timeout,
    default dynamic,
    optional dynamic_node_properties,
    optional distribution_mode,
    optional filter,
    optional default_outcome,
    optional outcomes,
    optional capabilities,
}

impl Source {
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            ..Default::default()
        }
    }
}

/// 3.5.4 Target: where messages go on a sending link.
///
/// ```text
/// <type name="target" class="composite" source="list" provides="target">
///     <descriptor name="amqp:target:list" code="0x00000000:0x00000029"/>
/// </type>
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Target {
    pub address: Option<String>,
    pub durable: TerminusDurability,
    pub expiry_policy: ExpiryPolicy,
    pub timeout: Seconds,
    pub dynamic: bool,
    pub dynamic_node_properties: Option<Fields>,
    pub capabilities: Option<Array<Symbol>>,
}

composite! {
    Target, "amqp:target:list", 0x0000_0000_0000_0029;
    optional address,
    default durable,
    default expiry_policy,
    default timeout,
    default dynamic,
    optional dynamic_node_properties,
    optional capabilities,
}

impl Target {
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use siderite_codec::convert::{FromValue, IntoValue};

    use super::{ExpiryPolicy, Source, Target};

    #[test]
    fn source_roundtrip() {
        let source = Source {
            address: Some("q".into()),
            expiry_policy: ExpiryPolicy::Never,
            ..Default::default()
        };
        assert_eq!(Source::from_value(source.clone().into_value()).unwrap(), source);
    }

    #[test]
    fn bare_target_trims_to_address_only() {
        let target = Target::with_address("q2");
        let decoded = Target::from_value(target.clone().into_value()).unwrap();
        assert_eq!(decoded, target);
    }
}
