use siderite_codec::composite;
use siderite_codec::primitives::{Array, Symbol};

use crate::definitions::{Fields, Handle, TransferNumber};

/// Begin a session on a channel.
///
/// ```text
/// <type name="begin" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:begin:list" code="0x00000000:0x00000011"/>
/// </type>
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Begin {
    /// <field name="remote-channel" type="ushort"/>
    pub remote_channel: Option<u16>,

    /// <field name="next-outgoing-id" type="transfer-number" mandatory="true"/>
    pub next_outgoing_id: TransferNumber,

    /// <field name="incoming-window" type="uint" mandatory="true"/>
    pub incoming_window: u32,

    /// <field name="outgoing-window" type="uint" mandatory="true"/>
    pub outgoing_window: u32,

    /// <field name="handle-max" type="handle" default="4294967295"/>
    pub handle_max: Handle,

    /// <field name="offered-capabilities" type="symbol" multiple="true"/>
    pub offered_capabilities: Option<Array<Symbol>>,

    /// <field name="desired-capabilities" type="symbol" multiple="true"/>
    pub desired_capabilities: Option<Array<Symbol>>,

    /// <field name="properties" type="fields"/>
    pub properties: Option<Fields>,
}

composite! {
    Begin, "amqp:begin:list", 0x0000_0000_0000_0011;
    optional remote_channel,
    required next_outgoing_id,
    required incoming_window,
    required outgoing_window,
    default handle_max,
    optional offered_capabilities,
    optional desired_capabilities,
    optional properties,
}

#[cfg(test)]
mod tests {
    use siderite_codec::convert::{FromValue, IntoValue};

    use super::Begin;

    #[test]
    fn roundtrip() {
        let begin = Begin {
            remote_channel: Some(3),
            next_outgoing_id: 1,
            incoming_window: 2048,
            outgoing_window: 2048,
            handle_max: 31.into(),
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };
        assert_eq!(Begin::from_value(begin.clone().into_value()).unwrap(), begin);
    }
}
