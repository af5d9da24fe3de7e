//! Encoding of AMQP values into byte sinks
//!
//! Values are written with the smallest applicable encoding (`uint0`,
//! `smalluint`, `str8`, ...). Inside arrays every element must share one
//! constructor, so elements are written in their fixed wide form instead.

use bytes::{BufMut, BytesMut};

use crate::error::Error;
use crate::format_code::FormatCode;
use crate::primitives::Symbol;
use crate::value::{Descriptor, Value};

/// Encodes one value into any [`BufMut`]
pub fn encode_value<B: BufMut>(dst: &mut B, value: &Value) -> Result<(), Error> {
    match value {
        Value::Null => dst.put_u8(FormatCode::Null as u8),

        Value::Bool(true) => dst.put_u8(FormatCode::BooleanTrue as u8),
        Value::Bool(false) => dst.put_u8(FormatCode::BooleanFalse as u8),

        Value::UByte(v) => {
            dst.put_u8(FormatCode::UByte as u8);
            dst.put_u8(*v);
        }
        Value::UShort(v) => {
            dst.put_u8(FormatCode::UShort as u8);
            dst.put_u16(*v);
        }
        Value::UInt(0) => dst.put_u8(FormatCode::UInt0 as u8),
        Value::UInt(v) if *v <= u8::MAX as u32 => {
            dst.put_u8(FormatCode::SmallUInt as u8);
            dst.put_u8(*v as u8);
        }
        Value::UInt(v) => {
            dst.put_u8(FormatCode::UInt as u8);
            dst.put_u32(*v);
        }
        Value::ULong(0) => dst.put_u8(FormatCode::ULong0 as u8),
        Value::ULong(v) if *v <= u8::MAX as u64 => {
            dst.put_u8(FormatCode::SmallULong as u8);
            dst.put_u8(*v as u8);
        }
        Value::ULong(v) => {
            dst.put_u8(FormatCode::ULong as u8);
            dst.put_u64(*v);
        }

        Value::Byte(v) => {
            dst.put_u8(FormatCode::Byte as u8);
            dst.put_i8(*v);
        }
        Value::Short(v) => {
            dst.put_u8(FormatCode::Short as u8);
            dst.put_i16(*v);
        }
        Value::Int(v) if (i8::MIN as i32..=i8::MAX as i32).contains(v) => {
            dst.put_u8(FormatCode::SmallInt as u8);
            dst.put_i8(*v as i8);
        }
        Value::Int(v) => {
            dst.put_u8(FormatCode::Int as u8);
            dst.put_i32(*v);
        }
        Value::Long(v) if (i8::MIN as i64..=i8::MAX as i64).contains(v) => {
            dst.put_u8(FormatCode::SmallLong as u8);
            dst.put_i8(*v as i8);
        }
        Value::Long(v) => {
            dst.put_u8(FormatCode::Long as u8);
            dst.put_i64(*v);
        }

        Value::Float(v) => {
            dst.put_u8(FormatCode::Float as u8);
            dst.put_f32(v.into_inner());
        }
        Value::Double(v) => {
            dst.put_u8(FormatCode::Double as u8);
            dst.put_f64(v.into_inner());
        }

        Value::Char(v) => {
            dst.put_u8(FormatCode::Char as u8);
            dst.put_u32(*v as u32);
        }
        Value::Timestamp(v) => {
            dst.put_u8(FormatCode::Timestamp as u8);
            dst.put_i64(v.milliseconds());
        }
        Value::Uuid(v) => {
            dst.put_u8(FormatCode::Uuid as u8);
            dst.put_slice(v.as_ref());
        }

        Value::Binary(v) => {
            encode_variable(dst, FormatCode::VBin8, FormatCode::VBin32, v)?;
        }
        Value::String(v) => {
            encode_variable(dst, FormatCode::Str8, FormatCode::Str32, v.as_bytes())?;
        }
        Value::Symbol(v) => encode_symbol(dst, v)?,

        Value::List(items) if items.is_empty() => dst.put_u8(FormatCode::List0 as u8),
        Value::List(items) => {
            let mut body = BytesMut::new();
            for item in items {
                encode_value(&mut body, item)?;
            }
            encode_compound(dst, FormatCode::List8, FormatCode::List32, items.len(), &body)?;
        }

        Value::Map(map) => {
            let mut body = BytesMut::new();
            for (key, value) in map {
                encode_value(&mut body, key)?;
                encode_value(&mut body, value)?;
            }
            encode_compound(dst, FormatCode::Map8, FormatCode::Map32, map.len() * 2, &body)?;
        }

        Value::Array(items) => encode_array(dst, items.iter())?,

        Value::Described(described) => {
            dst.put_u8(FormatCode::Described as u8);
            encode_descriptor(dst, &described.descriptor)?;
            encode_value(dst, &described.value)?;
        }
    }
    Ok(())
}

/// Encodes one value into a fresh vector
pub fn to_vec(value: &Value) -> Result<Vec<u8>, Error> {
    let mut dst = BytesMut::new();
    encode_value(&mut dst, value)?;
    Ok(dst.to_vec())
}

fn encode_descriptor<B: BufMut>(dst: &mut B, descriptor: &Descriptor) -> Result<(), Error> {
    match descriptor {
        Descriptor::Code(code) => encode_value(dst, &Value::ULong(*code)),
        Descriptor::Name(name) => encode_symbol(dst, name),
    }
}

fn encode_symbol<B: BufMut>(dst: &mut B, symbol: &Symbol) -> Result<(), Error> {
    if !symbol.is_ascii() {
        return Err(Error::NonAsciiSymbol);
    }
    encode_variable(dst, FormatCode::Sym8, FormatCode::Sym32, symbol.as_str().as_bytes())
}

fn encode_variable<B: BufMut>(
    dst: &mut B,
    narrow: FormatCode,
    wide: FormatCode,
    body: &[u8],
) -> Result<(), Error> {
    if body.len() <= u8::MAX as usize {
        dst.put_u8(narrow as u8);
        dst.put_u8(body.len() as u8);
    } else if body.len() <= u32::MAX as usize {
        dst.put_u8(wide as u8);
        dst.put_u32(body.len() as u32);
    } else {
        return Err(Error::TooLong);
    }
    dst.put_slice(body);
    Ok(())
}

fn encode_compound<B: BufMut>(
    dst: &mut B,
    narrow: FormatCode,
    wide: FormatCode,
    count: usize,
    body: &[u8],
) -> Result<(), Error> {
    // the declared size covers the count field as well
    if count <= u8::MAX as usize && body.len() + 1 <= u8::MAX as usize {
        dst.put_u8(narrow as u8);
        dst.put_u8((body.len() + 1) as u8);
        dst.put_u8(count as u8);
    } else if count <= u32::MAX as usize && body.len() + 4 <= u32::MAX as usize {
        dst.put_u8(wide as u8);
        dst.put_u32((body.len() + 4) as u32);
        dst.put_u32(count as u32);
    } else {
        return Err(Error::TooLong);
    }
    dst.put_slice(body);
    Ok(())
}

/// The constructor an element takes inside an array (always the wide form)
fn array_constructor(value: &Value) -> Result<FormatCode, Error> {
    let code = match value {
        Value::Null => FormatCode::Null,
        Value::Bool(_) => FormatCode::Boolean,
        Value::UByte(_) => FormatCode::UByte,
        Value::UShort(_) => FormatCode::UShort,
        Value::UInt(_) => FormatCode::UInt,
        Value::ULong(_) => FormatCode::ULong,
        Value::Byte(_) => FormatCode::Byte,
        Value::Short(_) => FormatCode::Short,
        Value::Int(_) => FormatCode::Int,
        Value::Long(_) => FormatCode::Long,
        Value::Float(_) => FormatCode::Float,
        Value::Double(_) => FormatCode::Double,
        Value::Char(_) => FormatCode::Char,
        Value::Timestamp(_) => FormatCode::Timestamp,
        Value::Uuid(_) => FormatCode::Uuid,
        Value::Binary(_) => FormatCode::VBin32,
        Value::String(_) => FormatCode::Str32,
        Value::Symbol(_) => FormatCode::Sym32,
        Value::List(_) => FormatCode::List32,
        Value::Map(_) => FormatCode::Map32,
        Value::Array(_) => FormatCode::Array32,
        Value::Described(_) => return Err(Error::MixedArray),
    };
    Ok(code)
}

/// Writes an element body without its constructor, in the wide encoding the
/// shared array constructor declares
fn encode_array_element<B: BufMut>(dst: &mut B, value: &Value) -> Result<(), Error> {
    match value {
        Value::Null => {}
        Value::Bool(v) => dst.put_u8(*v as u8),
        Value::UByte(v) => dst.put_u8(*v),
        Value::UShort(v) => dst.put_u16(*v),
        Value::UInt(v) => dst.put_u32(*v),
        Value::ULong(v) => dst.put_u64(*v),
        Value::Byte(v) => dst.put_i8(*v),
        Value::Short(v) => dst.put_i16(*v),
        Value::Int(v) => dst.put_i32(*v),
        Value::Long(v) => dst.put_i64(*v),
        Value::Float(v) => dst.put_f32(v.into_inner()),
        Value::Double(v) => dst.put_f64(v.into_inner()),
        Value::Char(v) => dst.put_u32(*v as u32),
        Value::Timestamp(v) => dst.put_i64(v.milliseconds()),
        Value::Uuid(v) => dst.put_slice(v.as_ref()),
        Value::Binary(v) => {
            dst.put_u32(v.len() as u32);
            dst.put_slice(v);
        }
        Value::String(v) => {
            dst.put_u32(v.len() as u32);
            dst.put_slice(v.as_bytes());
        }
        Value::Symbol(v) => {
            if !v.is_ascii() {
                return Err(Error::NonAsciiSymbol);
            }
            dst.put_u32(v.as_str().len() as u32);
            dst.put_slice(v.as_str().as_bytes());
        }
        Value::List(items) => {
            let mut body = BytesMut::new();
            for item in items {
                encode_value(&mut body, item)?;
            }
            dst.put_u32((body.len() + 4) as u32);
            dst.put_u32(items.len() as u32);
            dst.put_slice(&body);
        }
        Value::Map(map) => {
            let mut body = BytesMut::new();
            for (key, value) in map {
                encode_value(&mut body, key)?;
                encode_value(&mut body, value)?;
            }
            dst.put_u32((body.len() + 4) as u32);
            dst.put_u32((map.len() * 2) as u32);
            dst.put_slice(&body);
        }
        Value::Array(_) | Value::Described(_) => return Err(Error::MixedArray),
    }
    Ok(())
}

fn encode_array<'a, B: BufMut>(
    dst: &mut B,
    mut items: impl Iterator<Item = &'a Value> + Clone,
) -> Result<(), Error> {
    let constructor = match items.clone().next() {
        // an empty array still declares a constructor; null is conventional
        None => FormatCode::Null,
        Some(first) => {
            let code = array_constructor(first)?;
            if items
                .clone()
                .any(|item| array_constructor(item).map_or(true, |c| c != code))
            {
                return Err(Error::MixedArray);
            }
            code
        }
    };

    let mut body = BytesMut::new();
    body.put_u8(constructor as u8);
    let mut count = 0usize;
    for item in &mut items {
        encode_array_element(&mut body, item)?;
        count += 1;
    }

    if count <= u8::MAX as usize && body.len() + 1 <= u8::MAX as usize {
        dst.put_u8(FormatCode::Array8 as u8);
        dst.put_u8((body.len() + 1) as u8);
        dst.put_u8(count as u8);
    } else if count <= u32::MAX as usize && body.len() + 4 <= u32::MAX as usize {
        dst.put_u8(FormatCode::Array32 as u8);
        dst.put_u32((body.len() + 4) as u32);
        dst.put_u32(count as u32);
    } else {
        return Err(Error::TooLong);
    }
    dst.put_slice(&body);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::de::value_from_slice;
    use crate::primitives::{Array, OrderedMap, Symbol};

    fn roundtrip(value: Value) {
        let encoded = to_vec(&value).unwrap();
        assert_eq!(value_from_slice(&encoded).unwrap(), value, "{:x?}", encoded);
    }

    #[test]
    fn scalar_roundtrips() {
        roundtrip(Value::Null);
        roundtrip(Value::Bool(true));
        roundtrip(Value::UByte(0xff));
        roundtrip(Value::UShort(700));
        roundtrip(Value::UInt(0));
        roundtrip(Value::UInt(255));
        roundtrip(Value::UInt(65_536));
        roundtrip(Value::ULong(0));
        roundtrip(Value::ULong(77));
        roundtrip(Value::ULong(u64::MAX));
        roundtrip(Value::Byte(-1));
        roundtrip(Value::Short(-300));
        roundtrip(Value::Int(-5));
        roundtrip(Value::Int(1 << 20));
        roundtrip(Value::Long(-5));
        roundtrip(Value::Long(i64::MIN));
        roundtrip(Value::Float(1.25.into()));
        roundtrip(Value::Double((-0.5).into()));
        roundtrip(Value::Char('漢'));
        roundtrip(Value::Timestamp(1_600_000_000_000i64.into()));
        roundtrip(Value::Uuid([7u8; 16].into()));
    }

    #[test]
    fn variable_width_roundtrips() {
        roundtrip(Value::Binary(vec![1u8; 3].into()));
        roundtrip(Value::Binary(vec![2u8; 500].into()));
        roundtrip(Value::String("short".into()));
        roundtrip(Value::String("long".repeat(100)));
        roundtrip(Value::Symbol(Symbol::from("amqp:link:stolen")));
    }

    #[test]
    fn compound_roundtrips() {
        roundtrip(Value::List(vec![]));
        roundtrip(Value::List(vec![
            Value::UInt(1),
            Value::String("two".into()),
            Value::Null,
        ]));
        let mut map = OrderedMap::new();
        map.insert(Value::Symbol(Symbol::from("k1")), Value::UInt(1));
        map.insert(Value::Symbol(Symbol::from("k2")), Value::Bool(false));
        roundtrip(Value::Map(map));
        roundtrip(Value::Array(Array::from(vec![
            Value::Symbol(Symbol::from("PLAIN")),
            Value::Symbol(Symbol::from("ANONYMOUS")),
        ])));
        roundtrip(Value::Array(Array::from(vec![
            Value::UInt(1),
            Value::UInt(1000),
        ])));
        roundtrip(Value::Array(Array::new()));
    }

    #[test]
    fn described_roundtrips() {
        roundtrip(Value::described(
            0x10u64,
            Value::List(vec![Value::String("container".into())]),
        ));
        roundtrip(Value::described("amqp:custom:type", Value::UInt(9)));
    }

    #[test]
    fn mixed_array_is_rejected() {
        let value = Value::Array(Array::from(vec![Value::UInt(1), Value::String("x".into())]));
        assert!(matches!(to_vec(&value), Err(Error::MixedArray)));
    }

    #[test]
    fn list_crossing_the_small_size_limit_uses_list32() {
        let items: Vec<Value> = (0..100).map(|i| Value::UInt(i + 256)).collect();
        let value = Value::List(items);
        let encoded = to_vec(&value).unwrap();
        assert_eq!(encoded[0], FormatCode::List32 as u8);
        assert_eq!(value_from_slice(&encoded).unwrap(), value);
    }
}
