use siderite_codec::composite;

use crate::definitions::{Fields, Handle, SequenceNo, TransferNumber};

/// Update link state and session flow-control windows.
///
/// ```text
/// <type name="flow" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:flow:list" code="0x00000000:0x00000013"/>
/// </type>
/// ```
///
/// The session-level fields are always present; the link-level fields
/// (`handle` onwards) only when the flow addresses a link.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flow {
    /// <field name="next-incoming-id" type="transfer-number"/>
    pub next_incoming_id: Option<TransferNumber>,

    /// <field name="incoming-window" type="uint" mandatory="true"/>
    pub incoming_window: u32,

    /// <field name="next-outgoing-id" type="transfer-number" mandatory="true"/>
    pub next_outgoing_id: TransferNumber,

    /// <field name="outgoing-window" type="uint" mandatory="true"/>
    pub outgoing_window: u32,

    /// <field name="handle" type="handle"/>
    pub handle: Option<Handle>,

    /// <field name="delivery-count" type="sequence-no"/>
    pub delivery_count: Option<SequenceNo>,

    /// <field name="link-credit" type="uint"/>
    pub link_credit: Option<u32>,

    /// <field name="available" type="uint"/>
    pub available: Option<u32>,

    /// <field name="drain" type="boolean" default="false"/>
    pub drain: bool,

    /// <field name="echo" type="boolean" default="false"/>
    pub echo: bool,

    /// <field name="properties" type="fields"/>
    pub properties: Option<Fields>,
}

composite! {
    Flow, "amqp:flow:list", 0x0000_0000_0000_0013;
    optional next_incoming_id,
    required incoming_window,
    required next_outgoing_id,
    required outgoing_window,
    optional handle,
    optional delivery_count,
    optional link_credit,
    optional available,
    default drain,
    default echo,
    optional properties,
}

#[cfg(test)]
mod tests {
    use siderite_codec::convert::{FromValue, IntoValue};

    use super::Flow;

    #[test]
    fn link_flow_roundtrip() {
        let flow = Flow {
            next_incoming_id: Some(0),
            incoming_window: 2048,
            next_outgoing_id: 0,
            outgoing_window: 2048,
            handle: Some(0.into()),
            delivery_count: Some(0),
            link_credit: Some(10),
            drain: true,
            ..Default::default()
        };
        assert_eq!(Flow::from_value(flow.clone().into_value()).unwrap(), flow);
    }
}
