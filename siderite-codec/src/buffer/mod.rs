//! Byte containers with independent read and write cursors
//!
//! A [`Buffer`] keeps `read_offset <= write_offset <= capacity` at all times.
//! Typed accessors are checked and return `Result`; the [`bytes::Buf`] and
//! [`bytes::BufMut`] implementations bridge into `bytes`-generic code (such as
//! [`crate::ser::encode_value`]) with the panicking conventions of that crate.

use bytes::buf::UninitSlice;
use bytes::{Buf, BufMut};

use crate::error::Error;
use crate::read::Read;

mod composite;
pub use composite::CompositeBuffer;

/// A contiguous byte container with independent read and write cursors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buffer {
    data: Vec<u8>,
    read_offset: usize,
    write_offset: usize,
}

impl Buffer {
    /// An empty buffer with no capacity
    pub fn new() -> Self {
        Self::default()
    }

    /// A zero-filled buffer of the given capacity with both cursors at zero
    pub fn allocate(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            read_offset: 0,
            write_offset: 0,
        }
    }

    /// Wraps existing bytes; the write cursor is placed past the last byte
    pub fn wrap(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let write_offset = data.len();
        Self {
            data,
            read_offset: 0,
            write_offset,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn read_offset(&self) -> usize {
        self.read_offset
    }

    pub fn write_offset(&self) -> usize {
        self.write_offset
    }

    /// Number of bytes between the read and write cursors
    pub fn readable(&self) -> usize {
        self.write_offset - self.read_offset
    }

    /// Number of bytes between the write cursor and the end of the buffer
    pub fn writable(&self) -> usize {
        self.data.len() - self.write_offset
    }

    pub fn is_fully_read(&self) -> bool {
        self.read_offset == self.capacity()
    }

    /// The readable region `[read_offset, write_offset)`
    pub fn readable_slice(&self) -> &[u8] {
        &self.data[self.read_offset..self.write_offset]
    }

    pub fn set_read_offset(&mut self, offset: usize) -> Result<(), Error> {
        if offset > self.write_offset {
            return Err(Error::OutOfBounds {
                offset,
                capacity: self.write_offset,
            });
        }
        self.read_offset = offset;
        Ok(())
    }

    pub fn set_write_offset(&mut self, offset: usize) -> Result<(), Error> {
        if offset < self.read_offset || offset > self.capacity() {
            return Err(Error::OutOfBounds {
                offset,
                capacity: self.capacity(),
            });
        }
        self.write_offset = offset;
        Ok(())
    }

    /// Grows the buffer so that at least `n` bytes are writable
    pub fn ensure_writable(&mut self, n: usize) -> Result<(), Error> {
        let needed = self
            .write_offset
            .checked_add(n)
            .ok_or(Error::CapacityOverflow)?;
        if needed > self.data.len() {
            self.data.resize(needed, 0);
        }
        Ok(())
    }

    /// Splits off and returns `[0, offset)`; `self` retains `[offset, capacity)`
    /// with both cursors rebased
    pub fn split_to(&mut self, offset: usize) -> Result<Buffer, Error> {
        if offset > self.capacity() {
            return Err(Error::OutOfBounds {
                offset,
                capacity: self.capacity(),
            });
        }
        let tail = self.data.split_off(offset);
        let front = Buffer {
            data: std::mem::replace(&mut self.data, tail),
            read_offset: self.read_offset.min(offset),
            write_offset: self.write_offset.min(offset),
        };
        self.read_offset = self.read_offset.saturating_sub(offset);
        self.write_offset = self.write_offset.saturating_sub(offset);
        Ok(front)
    }

    /// Discards `[0, read_offset)` by shifting the readable region to the
    /// front; capacity is unchanged
    pub fn compact(&mut self) {
        if self.read_offset == 0 {
            return;
        }
        self.data.copy_within(self.read_offset..self.write_offset, 0);
        self.write_offset -= self.read_offset;
        self.read_offset = 0;
    }

    /// Copies `[offset, offset + len)` into a new buffer; cursors of `self`
    /// are unchanged
    pub fn copy_range(&self, offset: usize, len: usize) -> Result<Buffer, Error> {
        let end = offset.checked_add(len).ok_or(Error::CapacityOverflow)?;
        if end > self.capacity() {
            return Err(Error::OutOfBounds {
                offset: end,
                capacity: self.capacity(),
            });
        }
        Ok(Buffer::wrap(self.data[offset..end].to_vec()))
    }

    /// Sets every byte of the backing storage; cursors are unchanged
    pub fn fill(&mut self, byte: u8) {
        self.data.fill(byte);
    }

    pub(crate) fn storage_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    pub(crate) fn raw_slice(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn raw_slice_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn take(&mut self, n: usize) -> Result<&[u8], Error> {
        if self.readable() < n {
            return Err(Error::UnexpectedEof);
        }
        let start = self.read_offset;
        self.read_offset += n;
        Ok(&self.data[start..start + n])
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if self.writable() < bytes.len() {
            return Err(Error::OutOfBounds {
                offset: self.write_offset + bytes.len(),
                capacity: self.capacity(),
            });
        }
        self.data[self.write_offset..self.write_offset + bytes.len()].copy_from_slice(bytes);
        self.write_offset += bytes.len();
        Ok(())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, Error> {
        self.take(n).map(<[u8]>::to_vec)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.put(bytes)
    }
}

macro_rules! buffer_primitives {
    ($($read:ident, $write:ident => $ty:ty),* $(,)?) => {
        impl Buffer {
            $(
                pub fn $read(&mut self) -> Result<$ty, Error> {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(self.take(std::mem::size_of::<$ty>())?);
                    Ok(<$ty>::from_be_bytes(raw))
                }

                pub fn $write(&mut self, value: $ty) -> Result<(), Error> {
                    self.put(&value.to_be_bytes())
                }
            )*
        }
    };
}

buffer_primitives! {
    read_u8, write_u8 => u8,
    read_u16, write_u16 => u16,
    read_u32, write_u32 => u32,
    read_u64, write_u64 => u64,
    read_i8, write_i8 => i8,
    read_i16, write_i16 => i16,
    read_i32, write_i32 => i32,
    read_i64, write_i64 => i64,
}

impl Buffer {
    pub fn read_f32(&mut self) -> Result<f32, Error> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn write_f32(&mut self, value: f32) -> Result<(), Error> {
        self.write_u32(value.to_bits())
    }

    pub fn read_f64(&mut self) -> Result<f64, Error> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    pub fn write_f64(&mut self, value: f64) -> Result<(), Error> {
        self.write_u64(value.to_bits())
    }

    pub fn read_bool(&mut self) -> Result<bool, Error> {
        match self.read_u8()? {
            0x00 => Ok(false),
            0x01 => Ok(true),
            _ => Err(Error::InvalidValue(crate::format_code::FormatCode::Boolean)),
        }
    }

    pub fn write_bool(&mut self, value: bool) -> Result<(), Error> {
        self.write_u8(value as u8)
    }

    /// Reads a UTF-32BE code point
    pub fn read_char(&mut self) -> Result<char, Error> {
        let raw = self.read_u32()?;
        char::from_u32(raw).ok_or(Error::InvalidValue(crate::format_code::FormatCode::Char))
    }

    pub fn write_char(&mut self, value: char) -> Result<(), Error> {
        self.write_u32(value as u32)
    }
}

impl Buf for Buffer {
    fn remaining(&self) -> usize {
        self.readable()
    }

    fn chunk(&self) -> &[u8] {
        self.readable_slice()
    }

    fn advance(&mut self, cnt: usize) {
        assert!(cnt <= self.readable(), "advance past write cursor");
        self.read_offset += cnt;
    }
}

// Writing past the current capacity grows the backing storage, the same
// contract as the `Vec<u8>` implementation in `bytes`.
unsafe impl BufMut for Buffer {
    fn remaining_mut(&self) -> usize {
        isize::MAX as usize - self.write_offset
    }

    fn chunk_mut(&mut self) -> &mut UninitSlice {
        if self.writable() == 0 {
            let grown = (self.data.len() + 64).max(self.data.len() * 2);
            self.data.resize(grown, 0);
        }
        let write_offset = self.write_offset;
        UninitSlice::new(&mut self.data[write_offset..])
    }

    unsafe fn advance_mut(&mut self, cnt: usize) {
        assert!(cnt <= self.writable(), "advance past capacity");
        self.write_offset += cnt;
    }
}

impl Read for Buffer {
    fn peek(&mut self) -> Result<u8, Error> {
        self.readable_slice()
            .first()
            .copied()
            .ok_or(Error::UnexpectedEof)
    }

    fn next(&mut self) -> Result<u8, Error> {
        self.read_u8()
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        buf.copy_from_slice(self.take(buf.len())?);
        Ok(())
    }
}
