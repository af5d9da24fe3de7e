use siderite_codec::composite;
use siderite_codec::primitives::{Array, OrderedMap, Symbol};
use siderite_codec::value::Value;

use crate::definitions::{
    Fields, Handle, ReceiverSettleMode, Role, SenderSettleMode, SequenceNo,
};
use crate::messaging::{Source, Target};

/// Attach a link to a session.
///
/// ```text
/// <type name="attach" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:attach:list" code="0x00000000:0x00000012"/>
/// </type>
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Attach {
    /// <field name="name" type="string" mandatory="true"/>
    ///
    /// Link names are unique per direction within a session and identify the
    /// link across detach/re-attach.
    pub name: String,

    /// <field name="handle" type="handle" mandatory="true"/>
    pub handle: Handle,

    /// <field name="role" type="role" mandatory="true"/>
    pub role: Role,

    /// <field name="snd-settle-mode" type="sender-settle-mode" default="mixed"/>
    pub snd_settle_mode: SenderSettleMode,

    /// <field name="rcv-settle-mode" type="receiver-settle-mode" default="first"/>
    pub rcv_settle_mode: ReceiverSettleMode,

    /// <field name="source" type="*" requires="source"/>
    pub source: Option<Source>,

    /// <field name="target" type="*" requires="target"/>
    pub target: Option<Target>,

    /// <field name="unsettled" type="map"/>
    ///
    /// Delivery-tag keyed map of unsettled delivery states, carried on
    /// re-attach to resume in-flight deliveries.
    pub unsettled: Option<OrderedMap<Value, Value>>,

    /// <field name="incomplete-unsettled" type="boolean" default="false"/>
    pub incomplete_unsettled: bool,

    /// <field name="initial-delivery-count" type="sequence-no"/>
    ///
    /// Mandatory when the role is sender.
    pub initial_delivery_count: Option<SequenceNo>,

    /// <field name="max-message-size" type="ulong"/>
    pub max_message_size: Option<u64>,

    /// <field name="offered-capabilities" type="symbol" multiple="true"/>
    pub offered_capabilities: Option<Array<Symbol>>,

    /// <field name="desired-capabilities" type="symbol" multiple="true"/>
    pub desired_capabilities: Option<Array<Symbol>>,

    /// <field name="properties" type="fields"/>
    pub properties: Option<Fields>,
}

composite! {
    Attach, "amqp:attach:list", 0x0000_0000_0000_0012;
    required name,
    required handle,
    required role,
    default snd_settle_mode,
    default rcv_settle_mode,
    optional source,
    optional target,
    optional unsettled,
    default incomplete_unsettled,
    optional initial_delivery_count,
    optional max_message_size,
    optional offered_capabilities,
    optional desired_capabilities,
    optional properties,
}

#[cfg(test)]
mod tests {
    use siderite_codec::convert::{FromValue, IntoValue};

    use crate::definitions::{Role, SenderSettleMode};
    use crate::messaging::Target;

    use super::Attach;

    #[test]
    fn sender_attach_roundtrip() {
        let attach = Attach {
            name: "sender-0".into(),
            handle: 0.into(),
            role: Role::Sender,
            snd_settle_mode: SenderSettleMode::Settled,
            rcv_settle_mode: Default::default(),
            source: None,
            target: Some(Target {
                address: Some("q1".into()),
                ..Default::default()
            }),
            unsettled: None,
            incomplete_unsettled: false,
            initial_delivery_count: Some(0),
            max_message_size: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };
        assert_eq!(
            Attach::from_value(attach.clone().into_value()).unwrap(),
            attach
        );
    }
}
