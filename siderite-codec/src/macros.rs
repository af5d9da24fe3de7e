//! The `composite!` macro and its runtime support
//!
//! AMQP composite types are described lists whose fields are positional.
//! Three field kinds cover the grammar: `required` (null is an error),
//! `optional` (null maps to `None`) and `default` (null maps to
//! `Default::default()`, and the default value encodes as null). Trailing
//! nulls are trimmed on encode, missing trailing fields are tolerated on
//! decode, exactly as the wire format allows.

use crate::convert::{FromValue, IntoValue};
use crate::error::Error;
use crate::value::{Descriptor, Value};

/// Accumulates the positional fields of a composite while encoding
#[derive(Debug, Default)]
pub struct CompositeFields {
    values: Vec<Value>,
}

impl CompositeFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_required(&mut self, value: impl IntoValue) {
        self.values.push(value.into_value());
    }

    pub fn push_optional(&mut self, value: impl IntoValue) {
        self.values.push(value.into_value());
    }

    pub fn push_default<T>(&mut self, value: T)
    where
        T: IntoValue + Default + PartialEq,
    {
        if value == T::default() {
            self.values.push(Value::Null);
        } else {
            self.values.push(value.into_value());
        }
    }

    /// Trims trailing nulls and wraps the list with its descriptor
    pub fn into_described(mut self, code: u64) -> Value {
        while matches!(self.values.last(), Some(Value::Null)) {
            self.values.pop();
        }
        Value::described(code, Value::List(self.values))
    }
}

/// Walks the positional fields of a composite while decoding
#[derive(Debug)]
pub struct CompositeReader {
    fields: std::vec::IntoIter<Value>,
}

impl CompositeReader {
    /// Accepts either the full described value (verifying the descriptor) or
    /// an already unwrapped body
    pub fn decode(value: Value, code: u64, name: &str) -> Result<Self, Error> {
        let body = match value {
            Value::Described(described) => {
                let matches = match &described.descriptor {
                    Descriptor::Code(c) => *c == code,
                    Descriptor::Name(n) => n.as_str() == name,
                };
                if !matches {
                    return Err(Error::UnexpectedDescriptor);
                }
                described.value
            }
            other => other,
        };
        let values = match body {
            Value::List(values) => values,
            Value::Null => Vec::new(),
            other => {
                return Err(Error::TypeMismatch {
                    expected: "list",
                    found: other.kind(),
                })
            }
        };
        Ok(Self {
            fields: values.into_iter(),
        })
    }

    pub fn required<T: FromValue>(&mut self, field: &'static str) -> Result<T, Error> {
        match self.fields.next() {
            None | Some(Value::Null) => Err(Error::MissingField(field)),
            Some(value) => T::from_value(value),
        }
    }

    pub fn optional<T: FromValue>(&mut self) -> Result<Option<T>, Error> {
        match self.fields.next() {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::from_value(value).map(Some),
        }
    }

    pub fn or_default<T: FromValue + Default>(&mut self) -> Result<T, Error> {
        match self.fields.next() {
            None | Some(Value::Null) => Ok(T::default()),
            Some(value) => T::from_value(value),
        }
    }
}

/// Implements the described-list contract for a struct declared alongside:
/// descriptor constants plus [`IntoValue`]/[`FromValue`] walking the fields
/// in declaration order.
///
/// ```ignore
/// pub struct Begin {
///     pub remote_channel: Option<u16>,
///     pub next_outgoing_id: u32,
///     // ...
/// }
///
/// composite! {
///     Begin, "amqp:begin:list", 0x0000_0000_0000_0011;
///     optional remote_channel,
///     required next_outgoing_id,
///     // ...
/// }
/// ```
#[macro_export]
macro_rules! composite {
    (
        $name:ident, $dname:literal, $dcode:expr;
        $( $kind:ident $field:ident ),* $(,)?
    ) => {
        impl $name {
            pub const DESCRIPTOR_NAME: &'static str = $dname;
            pub const DESCRIPTOR_CODE: u64 = $dcode;
        }

        impl $crate::convert::IntoValue for $name {
            fn into_value(self) -> $crate::value::Value {
                let mut fields = $crate::macros::CompositeFields::new();
                let _ = &mut fields;
                $( $crate::composite!(@push fields, $kind, self.$field); )*
                fields.into_described(Self::DESCRIPTOR_CODE)
            }
        }

        impl $crate::convert::FromValue for $name {
            fn from_value(value: $crate::value::Value) -> Result<Self, $crate::error::Error> {
                let mut fields = $crate::macros::CompositeReader::decode(
                    value,
                    Self::DESCRIPTOR_CODE,
                    Self::DESCRIPTOR_NAME,
                )?;
                let _ = &mut fields;
                Ok(Self {
                    $( $field: $crate::composite!(@take fields, $kind, stringify!($field))?, )*
                })
            }
        }
    };

    (@push $fields:ident, required, $value:expr) => {
        $fields.push_required($value)
    };
    (@push $fields:ident, optional, $value:expr) => {
        $fields.push_optional($value)
    };
    (@push $fields:ident, default, $value:expr) => {
        $fields.push_default($value)
    };

    (@take $fields:ident, required, $field:expr) => {
        $fields.required($field)
    };
    (@take $fields:ident, optional, $field:expr) => {
        $fields.optional()
    };
    (@take $fields:ident, default, $field:expr) => {
        $fields.or_default()
    };
}
