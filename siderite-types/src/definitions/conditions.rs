//! Error conditions of Part 2.8.15 through 2.8.18

use std::fmt;

use siderite_codec::convert::{FromValue, IntoValue};
use siderite_codec::error::Error as CodecError;
use siderite_codec::primitives::Symbol;
use siderite_codec::value::Value;

macro_rules! condition_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $( $variant:ident => $symbol:literal ),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $variant ),*
        }

        impl $name {
            pub fn symbol(&self) -> &'static str {
                match self {
                    $( $name::$variant => $symbol ),*
                }
            }

            pub fn from_symbol(symbol: &str) -> Option<Self> {
                match symbol {
                    $( $symbol => Some($name::$variant), )*
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.symbol())
            }
        }

        impl From<$name> for ErrorCondition {
            fn from(value: $name) -> Self {
                ErrorCondition::$name(value)
            }
        }
    };
}

condition_enum! {
    /// 2.8.15 AMQP Error
    AmqpError {
        InternalError => "amqp:internal-error",
        NotFound => "amqp:not-found",
        UnauthorizedAccess => "amqp:unauthorized-access",
        DecodeError => "amqp:decode-error",
        ResourceLimitExceeded => "amqp:resource-limit-exceeded",
        NotAllowed => "amqp:not-allowed",
        InvalidField => "amqp:invalid-field",
        NotImplemented => "amqp:not-implemented",
        ResourceLocked => "amqp:resource-locked",
        PreconditionFailed => "amqp:precondition-failed",
        ResourceDeleted => "amqp:resource-deleted",
        IllegalState => "amqp:illegal-state",
        FrameSizeTooSmall => "amqp:frame-size-too-small",
    }
}

condition_enum! {
    /// 2.8.16 Connection Error
    ConnectionError {
        ConnectionForced => "amqp:connection:forced",
        FramingError => "amqp:connection:framing-error",
        Redirect => "amqp:connection:redirect",
    }
}

condition_enum! {
    /// 2.8.17 Session Error
    SessionError {
        WindowViolation => "amqp:session:window-violation",
        ErrantLink => "amqp:session:errant-link",
        HandleInUse => "amqp:session:handle-in-use",
        UnattachedHandle => "amqp:session:unattached-handle",
    }
}

condition_enum! {
    /// 2.8.18 Link Error
    LinkError {
        DetachForced => "amqp:link:detach-forced",
        TransferLimitExceeded => "amqp:link:transfer-limit-exceeded",
        MessageSizeExceeded => "amqp:link:message-size-exceeded",
        Redirect => "amqp:link:redirect",
        Stolen => "amqp:link:stolen",
    }
}

/// Any error condition a peer can carry in an `error` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCondition {
    AmqpError(AmqpError),
    ConnectionError(ConnectionError),
    SessionError(SessionError),
    LinkError(LinkError),
    Custom(Symbol),
}

impl ErrorCondition {
    pub fn symbol(&self) -> Symbol {
        match self {
            ErrorCondition::AmqpError(c) => Symbol::from(c.symbol()),
            ErrorCondition::ConnectionError(c) => Symbol::from(c.symbol()),
            ErrorCondition::SessionError(c) => Symbol::from(c.symbol()),
            ErrorCondition::LinkError(c) => Symbol::from(c.symbol()),
            ErrorCondition::Custom(symbol) => symbol.clone(),
        }
    }
}

impl From<Symbol> for ErrorCondition {
    fn from(symbol: Symbol) -> Self {
        let name = symbol.as_str();
        if let Some(c) = AmqpError::from_symbol(name) {
            return ErrorCondition::AmqpError(c);
        }
        if let Some(c) = ConnectionError::from_symbol(name) {
            return ErrorCondition::ConnectionError(c);
        }
        if let Some(c) = SessionError::from_symbol(name) {
            return ErrorCondition::SessionError(c);
        }
        if let Some(c) = LinkError::from_symbol(name) {
            return ErrorCondition::LinkError(c);
        }
        ErrorCondition::Custom(symbol)
    }
}

impl fmt::Display for ErrorCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol().as_str())
    }
}

impl IntoValue for ErrorCondition {
    fn into_value(self) -> Value {
        Value::Symbol(self.symbol())
    }
}

impl FromValue for ErrorCondition {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        Symbol::from_value(value).map(ErrorCondition::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_roundtrip() {
        let condition = ErrorCondition::from(Symbol::from("amqp:session:window-violation"));
        assert_eq!(
            condition,
            ErrorCondition::SessionError(SessionError::WindowViolation)
        );
        assert_eq!(
            condition.symbol(),
            Symbol::from("amqp:session:window-violation")
        );
    }

    #[test]
    fn unknown_symbols_stay_custom() {
        let condition = ErrorCondition::from(Symbol::from("vendor:odd-condition"));
        assert!(matches!(condition, ErrorCondition::Custom(_)));
    }
}
