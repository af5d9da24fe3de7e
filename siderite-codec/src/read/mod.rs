//! Byte sources for the decoder

use crate::error::Error;

mod ioread;
pub use ioread::IoReader;

mod sliceread;
pub use sliceread::SliceReader;

/// A byte source the decoder can pull from
///
/// Implemented by [`SliceReader`] for in-memory decoding, [`IoReader`] for
/// streaming decoding, and the buffer types. Both readers consume exactly
/// what the grammar requires; nothing is buffered ahead beyond one byte of
/// lookahead.
pub trait Read {
    /// Peeks the next byte without consuming it
    fn peek(&mut self) -> Result<u8, Error>;

    /// Consumes and returns the next byte
    fn next(&mut self) -> Result<u8, Error>;

    /// Fills `buf` entirely or fails
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Error>;

    /// Reads a fixed number of bytes into a stack array
    fn read_const_bytes<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads `n` bytes into a heap buffer
    fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0u8; n];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl<R: Read + ?Sized> Read for &mut R {
    fn peek(&mut self) -> Result<u8, Error> {
        (**self).peek()
    }

    fn next(&mut self) -> Result<u8, Error> {
        (**self).next()
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        (**self).read_exact(buf)
    }
}
