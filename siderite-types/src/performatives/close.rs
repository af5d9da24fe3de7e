use siderite_codec::composite;

use crate::definitions::Error;

/// Signal a connection close.
///
/// ```text
/// <type name="close" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:close:list" code="0x00000000:0x00000018"/>
/// </type>
/// ```
///
/// A close without an error is a graceful shutdown; with an error it fails
/// the whole connection hierarchy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Close {
    /// <field name="error" type="error"/>
    pub error: Option<Error>,
}

composite! {
    Close, "amqp:close:list", 0x0000_0000_0000_0018;
    optional error,
}

#[cfg(test)]
mod tests {
    use siderite_codec::convert::{FromValue, IntoValue};
    use siderite_codec::value::Value;

    use crate::definitions::{ConnectionError, Error};

    use super::Close;

    #[test]
    fn graceful_close_is_an_empty_list() {
        let value = Close::default().into_value();
        match &value {
            Value::Described(described) => assert_eq!(described.value, Value::List(vec![])),
            other => panic!("expected described, got {:?}", other),
        }
    }

    #[test]
    fn close_with_error_roundtrip() {
        let close = Close {
            error: Some(Error::new(ConnectionError::FramingError, "bad size")),
        };
        assert_eq!(Close::from_value(close.clone().into_value()).unwrap(), close);
    }
}
