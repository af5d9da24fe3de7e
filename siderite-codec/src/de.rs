//! Decoding of AMQP values from byte sources
//!
//! The front door is [`Decoder::read_value`]: it reads one constructor byte
//! and either dispatches to the primitive decoder for that format code or,
//! on `0x00`, reads the descriptor and decodes a described value. Alternative
//! encodings (`smalluint`, `list0`, ...) are normalized into the canonical
//! [`Value`] variant.

use std::convert::TryFrom;

use ordered_float::OrderedFloat;

use crate::error::Error;
use crate::format_code::FormatCode;
use crate::primitives::{Array, Binary, OrderedMap, Symbol, Timestamp, Uuid};
use crate::read::{IoReader, Read, SliceReader};
use crate::registry::Registry;
use crate::value::{Descriptor, Value};

/// Decodes values from a [`Read`] source, optionally consulting a
/// described-type [`Registry`]
pub struct Decoder<'r, R> {
    reader: R,
    registry: Option<&'r Registry>,
}

impl<R> Decoder<'static, R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            registry: None,
        }
    }
}

impl<'r, R> Decoder<'r, R> {
    pub fn with_registry(reader: R, registry: &'r Registry) -> Self {
        Self {
            reader,
            registry: Some(registry),
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }
}

impl<'r, R: Read> Decoder<'r, R> {
    /// Reads the next complete value
    pub fn read_value(&mut self) -> Result<Value, Error> {
        let code = self.read_format_code()?;
        match code {
            FormatCode::Described => self.read_described(),
            primitive => self.read_primitive(primitive),
        }
    }

    fn read_format_code(&mut self) -> Result<FormatCode, Error> {
        FormatCode::try_from(self.reader.next()?)
    }

    fn read_described(&mut self) -> Result<Value, Error> {
        let descriptor = self.read_descriptor()?;
        let value = self.read_value()?;
        match self.registry {
            Some(registry) => registry.decode(descriptor, value),
            None => Ok(Value::described(descriptor, value)),
        }
    }

    /// A descriptor is constrained to an unsigned long or a symbol
    fn read_descriptor(&mut self) -> Result<Descriptor, Error> {
        let descriptor = match self.read_format_code()? {
            FormatCode::ULong0 => Descriptor::Code(0),
            FormatCode::SmallULong => Descriptor::Code(self.reader.next()? as u64),
            FormatCode::ULong => {
                Descriptor::Code(u64::from_be_bytes(self.reader.read_const_bytes()?))
            }
            FormatCode::Sym8 => {
                let len = self.reader.next()? as usize;
                Descriptor::Name(self.read_symbol_body(len)?)
            }
            FormatCode::Sym32 => {
                let len = u32::from_be_bytes(self.reader.read_const_bytes()?) as usize;
                Descriptor::Name(self.read_symbol_body(len)?)
            }
            _ => return Err(Error::InvalidDescriptor),
        };
        Ok(descriptor)
    }

    fn read_primitive(&mut self, code: FormatCode) -> Result<Value, Error> {
        let value = match code {
            FormatCode::Null => Value::Null,

            FormatCode::BooleanTrue => Value::Bool(true),
            FormatCode::BooleanFalse => Value::Bool(false),
            FormatCode::Boolean => match self.reader.next()? {
                0x00 => Value::Bool(false),
                0x01 => Value::Bool(true),
                _ => return Err(Error::InvalidValue(FormatCode::Boolean)),
            },

            FormatCode::UByte => Value::UByte(self.reader.next()?),
            FormatCode::UShort => {
                Value::UShort(u16::from_be_bytes(self.reader.read_const_bytes()?))
            }
            FormatCode::UInt0 => Value::UInt(0),
            FormatCode::SmallUInt => Value::UInt(self.reader.next()? as u32),
            FormatCode::UInt => Value::UInt(u32::from_be_bytes(self.reader.read_const_bytes()?)),
            FormatCode::ULong0 => Value::ULong(0),
            FormatCode::SmallULong => Value::ULong(self.reader.next()? as u64),
            FormatCode::ULong => Value::ULong(u64::from_be_bytes(self.reader.read_const_bytes()?)),

            FormatCode::Byte => Value::Byte(self.reader.next()? as i8),
            FormatCode::Short => Value::Short(i16::from_be_bytes(self.reader.read_const_bytes()?)),
            FormatCode::SmallInt => Value::Int((self.reader.next()? as i8) as i32),
            FormatCode::Int => Value::Int(i32::from_be_bytes(self.reader.read_const_bytes()?)),
            FormatCode::SmallLong => Value::Long((self.reader.next()? as i8) as i64),
            FormatCode::Long => Value::Long(i64::from_be_bytes(self.reader.read_const_bytes()?)),

            FormatCode::Float => Value::Float(OrderedFloat(f32::from_be_bytes(
                self.reader.read_const_bytes()?,
            ))),
            FormatCode::Double => Value::Double(OrderedFloat(f64::from_be_bytes(
                self.reader.read_const_bytes()?,
            ))),

            FormatCode::Char => {
                let raw = u32::from_be_bytes(self.reader.read_const_bytes()?);
                Value::Char(char::from_u32(raw).ok_or(Error::InvalidValue(FormatCode::Char))?)
            }
            FormatCode::Timestamp => Value::Timestamp(Timestamp::from_milliseconds(
                i64::from_be_bytes(self.reader.read_const_bytes()?),
            )),
            FormatCode::Uuid => Value::Uuid(Uuid::from(self.reader.read_const_bytes::<16>()?)),

            FormatCode::VBin8 => {
                let len = self.reader.next()? as usize;
                Value::Binary(Binary::from(self.reader.read_bytes(len)?))
            }
            FormatCode::VBin32 => {
                let len = u32::from_be_bytes(self.reader.read_const_bytes()?) as usize;
                Value::Binary(Binary::from(self.reader.read_bytes(len)?))
            }

            FormatCode::Str8 => {
                let len = self.reader.next()? as usize;
                Value::String(String::from_utf8(self.reader.read_bytes(len)?)?)
            }
            FormatCode::Str32 => {
                let len = u32::from_be_bytes(self.reader.read_const_bytes()?) as usize;
                Value::String(String::from_utf8(self.reader.read_bytes(len)?)?)
            }

            FormatCode::Sym8 => {
                let len = self.reader.next()? as usize;
                Value::Symbol(self.read_symbol_body(len)?)
            }
            FormatCode::Sym32 => {
                let len = u32::from_be_bytes(self.reader.read_const_bytes()?) as usize;
                Value::Symbol(self.read_symbol_body(len)?)
            }

            FormatCode::List0 => Value::List(Vec::new()),
            FormatCode::List8 => {
                let (size, count) = self.read_compound_header(false)?;
                self.read_list(size, count)?
            }
            FormatCode::List32 => {
                let (size, count) = self.read_compound_header(true)?;
                self.read_list(size, count)?
            }

            FormatCode::Map8 => {
                let (size, count) = self.read_compound_header(false)?;
                self.read_map(size, count)?
            }
            FormatCode::Map32 => {
                let (size, count) = self.read_compound_header(true)?;
                self.read_map(size, count)?
            }

            FormatCode::Array8 => {
                let (size, count) = self.read_compound_header(false)?;
                self.read_array(size, count)?
            }
            FormatCode::Array32 => {
                let (size, count) = self.read_compound_header(true)?;
                self.read_array(size, count)?
            }

            FormatCode::Described => return Err(Error::InvalidFormatCode(0x00)),
        };
        Ok(value)
    }

    fn read_symbol_body(&mut self, len: usize) -> Result<Symbol, Error> {
        let raw = self.reader.read_bytes(len)?;
        if !raw.is_ascii() {
            return Err(Error::NonAsciiSymbol);
        }
        Ok(Symbol::new(String::from_utf8(raw)?))
    }

    /// Reads the `size` and `count` prefix of a compound encoding; `size`
    /// is returned as the byte count remaining after the count field
    fn read_compound_header(&mut self, wide: bool) -> Result<(usize, usize), Error> {
        let (size, count, count_width) = if wide {
            (
                u32::from_be_bytes(self.reader.read_const_bytes()?) as usize,
                u32::from_be_bytes(self.reader.read_const_bytes()?) as usize,
                4,
            )
        } else {
            (
                self.reader.next()? as usize,
                self.reader.next()? as usize,
                1,
            )
        };
        if size < count_width {
            return Err(Error::MalformedLength { size, count });
        }
        Ok((size - count_width, count))
    }

    fn read_list(&mut self, size: usize, count: usize) -> Result<Value, Error> {
        // every element takes at least one constructor byte
        if count > size {
            return Err(Error::MalformedLength { size, count });
        }
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            items.push(self.read_value()?);
        }
        Ok(Value::List(items))
    }

    fn read_map(&mut self, size: usize, count: usize) -> Result<Value, Error> {
        if count % 2 != 0 || count > size {
            return Err(Error::MalformedLength { size, count });
        }
        let mut map = OrderedMap::new();
        for _ in 0..count / 2 {
            let key = self.read_value()?;
            let value = self.read_value()?;
            map.insert(key, value);
        }
        Ok(Value::Map(map))
    }

    /// An array carries exactly one constructor shared by all elements
    fn read_array(&mut self, size: usize, count: usize) -> Result<Value, Error> {
        let mut header = 1;
        let mut descriptor = None;
        let mut element_code = self.read_format_code()?;
        if element_code == FormatCode::Described {
            descriptor = Some(self.read_descriptor()?);
            element_code = self.read_format_code()?;
            header += 1; // descriptor bytes are not re-counted; keep the check conservative
        }
        let declared = size.saturating_sub(header);
        if count.saturating_mul(element_code.min_width()) > declared {
            return Err(Error::MalformedLength { size, count });
        }
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let element = self.read_primitive(element_code)?;
            items.push(match &descriptor {
                Some(descriptor) => Value::described(descriptor.clone(), element),
                None => element,
            });
        }
        Ok(Value::Array(Array::from(items)))
    }
}

/// Decodes a single value from a slice
pub fn value_from_slice(slice: &[u8]) -> Result<Value, Error> {
    Decoder::new(SliceReader::new(slice)).read_value()
}

/// Decodes a single value from a byte stream
pub fn value_from_reader(reader: impl std::io::Read) -> Result<Value, Error> {
    Decoder::new(IoReader::new(reader)).read_value()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ser::to_vec;

    #[test]
    fn list0_is_the_empty_list() {
        let value = value_from_slice(&[0x45]).unwrap();
        assert_eq!(value, Value::List(Vec::new()));
    }

    #[test]
    fn smalluint_normalizes() {
        let value = value_from_slice(&[0x52, 0x09]).unwrap();
        assert_eq!(value, Value::UInt(9));
    }

    #[test]
    fn unknown_descriptor_stays_opaque() {
        let encoded = to_vec(&Value::described(0xdead_beefu64, Value::UInt(1))).unwrap();
        let decoded = value_from_slice(&encoded).unwrap();
        assert_eq!(decoded, Value::described(0xdead_beefu64, Value::UInt(1)));
    }

    #[test]
    fn count_exceeding_size_is_rejected() {
        // list8 claiming 9 elements in 2 bytes of body
        let err = value_from_slice(&[0xc0, 0x03, 0x09, 0x40, 0x40]).unwrap_err();
        assert!(matches!(err, Error::MalformedLength { .. }));
    }

    #[test]
    fn array_count_validated_against_size() {
        // array8 of uint (4-byte elements): size says 1 element fits, count says 4
        let err = value_from_slice(&[0xe0, 0x06, 0x04, 0x70, 0, 0, 0, 1]).unwrap_err();
        assert!(matches!(err, Error::MalformedLength { .. }));
    }

    #[test]
    fn odd_map_count_is_rejected() {
        let err = value_from_slice(&[0xc1, 0x02, 0x01, 0x40]).unwrap_err();
        assert!(matches!(err, Error::MalformedLength { .. }));
    }

    #[test]
    fn non_ascii_symbol_is_rejected() {
        let err = value_from_slice(&[0xa3, 0x02, 0xc3, 0xa9]).unwrap_err();
        assert!(matches!(err, Error::NonAsciiSymbol));
    }

    #[test]
    fn truncated_body_is_eof() {
        let err = value_from_slice(&[0x70, 0x00, 0x01]).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof));
    }

    #[test]
    fn slice_and_stream_decoders_agree() {
        let value = Value::List(vec![
            Value::String("hello".into()),
            Value::UInt(512),
            Value::Bool(true),
        ]);
        let encoded = to_vec(&value).unwrap();
        let from_slice = value_from_slice(&encoded).unwrap();
        let from_stream = value_from_reader(&encoded[..]).unwrap();
        assert_eq!(from_slice, from_stream);
        assert_eq!(from_slice, value);
    }
}
