use siderite_codec::composite;

use crate::definitions::{Error, Handle};

/// Detach a link from a session.
///
/// ```text
/// <type name="detach" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:detach:list" code="0x00000000:0x00000016"/>
/// </type>
/// ```
///
/// `closed=false` leaves the link name resumable with its unsettled
/// deliveries; `closed=true` terminates it.
#[derive(Debug, Clone, PartialEq)]
pub struct Detach {
    /// <field name="handle" type="handle" mandatory="true"/>
    pub handle: Handle,

    /// <field name="closed" type="boolean" default="false"/>
    pub closed: bool,

    /// <field name="error" type="error"/>
    pub error: Option<Error>,
}

composite! {
    Detach, "amqp:detach:list", 0x0000_0000_0000_0016;
    required handle,
    default closed,
    optional error,
}
