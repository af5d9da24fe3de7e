use siderite_codec::composite;

use crate::definitions::{DeliveryNumber, Role};
use crate::messaging::DeliveryState;

/// Advertise delivery state over a contiguous range of delivery-ids.
///
/// ```text
/// <type name="disposition" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:disposition:list" code="0x00000000:0x00000015"/>
/// </type>
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Disposition {
    /// <field name="role" type="role" mandatory="true"/>
    pub role: Role,

    /// <field name="first" type="delivery-number" mandatory="true"/>
    pub first: DeliveryNumber,

    /// <field name="last" type="delivery-number"/>
    ///
    /// Defaults to `first` when absent.
    pub last: Option<DeliveryNumber>,

    /// <field name="settled" type="boolean" default="false"/>
    pub settled: bool,

    /// <field name="state" type="*" requires="delivery-state"/>
    pub state: Option<DeliveryState>,

    /// <field name="batchable" type="boolean" default="false"/>
    pub batchable: bool,
}

composite! {
    Disposition, "amqp:disposition:list", 0x0000_0000_0000_0015;
    required role,
    required first,
    optional last,
    default settled,
    optional state,
    default batchable,
}

#[cfg(test)]
mod tests {
    use siderite_codec::convert::{FromValue, IntoValue};

    use crate::definitions::Role;
    use crate::messaging::{Accepted, DeliveryState};

    use super::Disposition;

    #[test]
    fn range_roundtrip() {
        let disposition = Disposition {
            role: Role::Receiver,
            first: 7,
            last: Some(9),
            settled: true,
            state: Some(DeliveryState::Accepted(Accepted {})),
            batchable: false,
        };
        assert_eq!(
            Disposition::from_value(disposition.clone().into_value()).unwrap(),
            disposition
        );
    }
}
