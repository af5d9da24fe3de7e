use siderite_codec::composite;
use siderite_codec::convert::{FromValue, IntoValue};
use siderite_codec::error::Error as CodecError;
use siderite_codec::primitives::{Array, Symbol};
use siderite_codec::value::Value;

use crate::definitions::{Fields, IetfLanguageTag, Milliseconds};

/// Negotiate connection parameters.
///
/// ```text
/// <type name="open" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:open:list" code="0x00000000:0x00000010"/>
/// </type>
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Open {
    /// <field name="container-id" type="string" mandatory="true"/>
    pub container_id: String,

    /// <field name="hostname" type="string"/>
    pub hostname: Option<String>,

    /// <field name="max-frame-size" type="uint" default="4294967295"/>
    pub max_frame_size: MaxFrameSize,

    /// <field name="channel-max" type="ushort" default="65535"/>
    pub channel_max: ChannelMax,

    /// <field name="idle-time-out" type="milliseconds"/>
    pub idle_time_out: Option<Milliseconds>,

    /// <field name="outgoing-locales" type="ietf-language-tag" multiple="true"/>
    pub outgoing_locales: Option<Array<IetfLanguageTag>>,

    /// <field name="incoming-locales" type="ietf-language-tag" multiple="true"/>
    pub incoming_locales: Option<Array<IetfLanguageTag>>,

    /// <field name="offered-capabilities" type="symbol" multiple="true"/>
    pub offered_capabilities: Option<Array<Symbol>>,

    /// <field name="desired-capabilities" type="symbol" multiple="true"/>
    pub desired_capabilities: Option<Array<Symbol>>,

    /// <field name="properties" type="fields"/>
    pub properties: Option<Fields>,
}

composite! {
    Open, "amqp:open:list", 0x0000_0000_0000_0010;
    required container_id,
    optional hostname,
    default max_frame_size,
    default channel_max,
    optional idle_time_out,
    optional outgoing_locales,
    optional incoming_locales,
    optional offered_capabilities,
    optional desired_capabilities,
    optional properties,
}

/// Proposed maximum frame size; unset means no specific limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxFrameSize(pub u32);

impl Default for MaxFrameSize {
    fn default() -> Self {
        MaxFrameSize(u32::MAX)
    }
}

impl From<u32> for MaxFrameSize {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<MaxFrameSize> for u32 {
    fn from(value: MaxFrameSize) -> Self {
        value.0
    }
}

impl From<MaxFrameSize> for usize {
    fn from(value: MaxFrameSize) -> Self {
        value.0 as usize
    }
}

impl IntoValue for MaxFrameSize {
    fn into_value(self) -> Value {
        Value::UInt(self.0)
    }
}

impl FromValue for MaxFrameSize {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        u32::from_value(value).map(MaxFrameSize)
    }
}

/// The highest channel number that can be used on the connection; this value
/// plus one is the maximum number of simultaneously active sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMax(pub u16);

impl Default for ChannelMax {
    fn default() -> Self {
        Self(u16::MAX)
    }
}

impl From<u16> for ChannelMax {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<ChannelMax> for u16 {
    fn from(value: ChannelMax) -> Self {
        value.0
    }
}

impl IntoValue for ChannelMax {
    fn into_value(self) -> Value {
        Value::UShort(self.0)
    }
}

impl FromValue for ChannelMax {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        u16::from_value(value).map(ChannelMax)
    }
}

#[cfg(test)]
mod tests {
    use siderite_codec::convert::{FromValue, IntoValue};

    use super::{ChannelMax, MaxFrameSize, Open};

    #[test]
    fn defaults_encode_as_trailing_nulls() {
        let open = Open {
            container_id: "c".into(),
            ..Default::default()
        };
        let value = open.into_value();
        let decoded = Open::from_value(value).unwrap();
        assert_eq!(decoded.max_frame_size, MaxFrameSize(u32::MAX));
        assert_eq!(decoded.channel_max, ChannelMax(u16::MAX));
    }

    #[test]
    fn negotiated_values_roundtrip() {
        let open = Open {
            container_id: "c2".into(),
            hostname: Some("localhost".into()),
            max_frame_size: MaxFrameSize(65_536),
            channel_max: ChannelMax(255),
            idle_time_out: Some(30_000),
            ..Default::default()
        };
        let decoded = Open::from_value(open.clone().into_value()).unwrap();
        assert_eq!(decoded, open);
    }
}
