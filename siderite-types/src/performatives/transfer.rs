use siderite_codec::composite;

use crate::definitions::{
    DeliveryNumber, DeliveryTag, Handle, MessageFormat, ReceiverSettleMode,
};
use crate::messaging::DeliveryState;

/// Transfer a message.
///
/// ```text
/// <type name="transfer" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:transfer:list" code="0x00000000:0x00000014"/>
/// </type>
/// ```
///
/// The message payload follows the performative in the frame body. A
/// delivery spanning several frames repeats the handle and delivery-id with
/// `more` set on every frame but the last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transfer {
    /// <field name="handle" type="handle" mandatory="true"/>
    pub handle: Handle,

    /// <field name="delivery-id" type="delivery-number"/>
    pub delivery_id: Option<DeliveryNumber>,

    /// <field name="delivery-tag" type="delivery-tag"/>
    pub delivery_tag: Option<DeliveryTag>,

    /// <field name="message-format" type="message-format"/>
    pub message_format: Option<MessageFormat>,

    /// <field name="settled" type="boolean"/>
    pub settled: Option<bool>,

    /// <field name="more" type="boolean" default="false"/>
    pub more: bool,

    /// <field name="rcv-settle-mode" type="receiver-settle-mode"/>
    pub rcv_settle_mode: Option<ReceiverSettleMode>,

    /// <field name="state" type="*" requires="delivery-state"/>
    pub state: Option<DeliveryState>,

    /// <field name="resume" type="boolean" default="false"/>
    pub resume: bool,

    /// <field name="aborted" type="boolean" default="false"/>
    pub aborted: bool,

    /// <field name="batchable" type="boolean" default="false"/>
    pub batchable: bool,
}

composite! {
    Transfer, "amqp:transfer:list", 0x0000_0000_0000_0014;
    required handle,
    optional delivery_id,
    optional delivery_tag,
    optional message_format,
    optional settled,
    default more,
    optional rcv_settle_mode,
    optional state,
    default resume,
    default aborted,
    default batchable,
}

#[cfg(test)]
mod tests {
    use siderite_codec::convert::{FromValue, IntoValue};

    use super::Transfer;

    #[test]
    fn settled_transfer_roundtrip() {
        let transfer = Transfer {
            handle: 0.into(),
            delivery_id: Some(0),
            delivery_tag: Some(vec![0x01].into()),
            message_format: Some(0),
            settled: Some(true),
            more: false,
            ..Default::default()
        };
        assert_eq!(
            Transfer::from_value(transfer.clone().into_value()).unwrap(),
            transfer
        );
    }

    #[test]
    fn continuation_omits_most_fields() {
        let transfer = Transfer {
            handle: 2.into(),
            more: true,
            ..Default::default()
        };
        let decoded = Transfer::from_value(transfer.clone().into_value()).unwrap();
        assert_eq!(decoded, transfer);
        assert_eq!(decoded.delivery_id, None);
    }
}
