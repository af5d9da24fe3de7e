//! Conversions between typed values and [`Value`]
//!
//! These traits are the seam the `composite!` macro builds on: every field of
//! a described record converts through `IntoValue`/`FromValue`.

use ordered_float::OrderedFloat;

use crate::error::Error;
use crate::primitives::{Array, Binary, OrderedMap, Symbol, Timestamp, Uuid};
use crate::value::{Described, Descriptor, Value};

/// Conversion into the untyped representation
pub trait IntoValue {
    fn into_value(self) -> Value;
}

/// Conversion out of the untyped representation
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, Error>;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, Error> {
        Ok(value)
    }
}

fn mismatch<T>(expected: &'static str, found: &Value) -> Result<T, Error> {
    Err(Error::TypeMismatch {
        expected,
        found: found.kind(),
    })
}

macro_rules! value_conversions {
    ($($variant:ident => $ty:ty, $expected:literal),* $(,)?) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::$variant(self.into())
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, Error> {
                    match value {
                        Value::$variant(inner) => Ok(inner.into()),
                        other => mismatch($expected, &other),
                    }
                }
            }
        )*
    };
}

value_conversions! {
    Bool => bool, "boolean",
    UByte => u8, "ubyte",
    UShort => u16, "ushort",
    UInt => u32, "uint",
    ULong => u64, "ulong",
    Byte => i8, "byte",
    Short => i16, "short",
    Int => i32, "int",
    Long => i64, "long",
    Char => char, "char",
    Timestamp => Timestamp, "timestamp",
    Uuid => Uuid, "uuid",
    Binary => Binary, "binary",
    String => String, "string",
    Symbol => Symbol, "symbol",
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Float(OrderedFloat(self))
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Float(inner) => Ok(inner.into_inner()),
            other => mismatch("float", &other),
        }
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Double(OrderedFloat(self))
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Double(inner) => Ok(inner.into_inner()),
            other => mismatch("double", &other),
        }
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::String(self.to_owned())
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(inner) => inner.into_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            other => mismatch("list", &other),
        }
    }
}

impl<T: IntoValue> IntoValue for Array<T> {
    fn into_value(self) -> Value {
        Value::Array(self.into_iter().map(IntoValue::into_value).collect())
    }
}

/// Fields declared `multiple="true"` may arrive as an array or as a single
/// bare element; both shapes are accepted
impl<T: FromValue> FromValue for Array<T> {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            single => Ok(Array::from(vec![T::from_value(single)?])),
        }
    }
}

impl<K: IntoValue, V: IntoValue> IntoValue for OrderedMap<K, V> {
    fn into_value(self) -> Value {
        Value::Map(
            self.into_iter()
                .map(|(k, v)| (k.into_value(), v.into_value()))
                .collect(),
        )
    }
}

impl<K, V> FromValue for OrderedMap<K, V>
where
    K: FromValue + std::hash::Hash + Eq,
    V: FromValue,
{
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Map(map) => map
                .into_iter()
                .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
                .collect::<Result<_, Error>>(),
            other => mismatch("map", &other),
        }
    }
}

impl IntoValue for Described<Value> {
    fn into_value(self) -> Value {
        Value::Described(Box::new(self))
    }
}

impl FromValue for Described<Value> {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Described(described) => Ok(*described),
            other => mismatch("described", &other),
        }
    }
}

impl IntoValue for Descriptor {
    fn into_value(self) -> Value {
        match self {
            Descriptor::Code(code) => Value::ULong(code),
            Descriptor::Name(name) => Value::Symbol(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_null_roundtrip() {
        assert_eq!(Option::<u32>::from_value(Value::Null).unwrap(), None);
        assert_eq!(None::<u32>.into_value(), Value::Null);
        assert_eq!(Some(3u32).into_value(), Value::UInt(3));
    }

    #[test]
    fn multiple_field_accepts_a_bare_element() {
        let parsed = Array::<Symbol>::from_value(Value::Symbol(Symbol::from("PLAIN"))).unwrap();
        assert_eq!(parsed.into_inner(), vec![Symbol::from("PLAIN")]);
    }

    #[test]
    fn mismatch_reports_both_kinds() {
        let err = u32::from_value(Value::String("nope".into())).unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch {
                expected: "uint",
                found: "string"
            }
        ));
    }
}
