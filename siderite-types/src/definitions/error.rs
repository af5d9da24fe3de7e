//! 2.8.14 Error: the described record peers attach to detach/end/close

use siderite_codec::composite;

use super::{ErrorCondition, Fields};

/// Details of an error condition
///
/// ```text
/// <type name="error" class="composite" source="list">
///     <descriptor name="amqp:error:list" code="0x00000000:0x0000001d"/>
/// </type>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    /// <field name="condition" type="symbol" mandatory="true"/>
    pub condition: ErrorCondition,

    /// <field name="description" type="string"/>
    pub description: Option<String>,

    /// <field name="info" type="fields"/>
    pub info: Option<Fields>,
}

composite! {
    Error, "amqp:error:list", 0x0000_0000_0000_001d;
    required condition,
    optional description,
    optional info,
}

impl Error {
    pub fn new(condition: impl Into<ErrorCondition>, description: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            description: Some(description.into()),
            info: None,
        }
    }

    pub fn condition(condition: impl Into<ErrorCondition>) -> Self {
        Self {
            condition: condition.into(),
            description: None,
            info: None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{}: {}", self.condition, description),
            None => write!(f, "{}", self.condition),
        }
    }
}

#[cfg(test)]
mod tests {
    use siderite_codec::convert::{FromValue, IntoValue};

    use crate::definitions::AmqpError;

    use super::Error;

    #[test]
    fn roundtrip() {
        let error = Error::new(AmqpError::DecodeError, "truncated performative");
        let value = error.clone().into_value();
        assert_eq!(Error::from_value(value).unwrap(), error);
    }
}
