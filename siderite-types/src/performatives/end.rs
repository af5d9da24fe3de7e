use siderite_codec::composite;

use crate::definitions::Error;

/// End a session.
///
/// ```text
/// <type name="end" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:end:list" code="0x00000000:0x00000017"/>
/// </type>
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct End {
    /// <field name="error" type="error"/>
    pub error: Option<Error>,
}

composite! {
    End, "amqp:end:list", 0x0000_0000_0000_0017;
    optional error,
}
