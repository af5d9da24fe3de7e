use std::io;

use crate::error::Error;

use super::Read;

/// A reader over any [`std::io::Read`] stream with one byte of lookahead
#[derive(Debug)]
pub struct IoReader<R> {
    reader: R,
    peeked: Option<u8>,
}

impl<R: io::Read> IoReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            peeked: None,
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn pull(&mut self) -> Result<u8, Error> {
        let mut byte = [0u8; 1];
        match self.reader.read_exact(&mut byte) {
            Ok(()) => Ok(byte[0]),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Err(Error::UnexpectedEof),
            Err(err) => Err(Error::Io(err)),
        }
    }
}

impl<R: io::Read> Read for IoReader<R> {
    fn peek(&mut self) -> Result<u8, Error> {
        match self.peeked {
            Some(byte) => Ok(byte),
            None => {
                let byte = self.pull()?;
                self.peeked = Some(byte);
                Ok(byte)
            }
        }
    }

    fn next(&mut self) -> Result<u8, Error> {
        match self.peeked.take() {
            Some(byte) => Ok(byte),
            None => self.pull(),
        }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        if buf.is_empty() {
            return Ok(());
        }
        let mut start = 0;
        if let Some(byte) = self.peeked.take() {
            buf[0] = byte;
            start = 1;
        }
        match self.reader.read_exact(&mut buf[start..]) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Err(Error::UnexpectedEof),
            Err(err) => Err(Error::Io(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{IoReader, Read};

    #[test]
    fn lookahead_is_transparent() {
        let mut reader = IoReader::new(&[0xa1u8, 0x02, b'h', b'i'][..]);
        assert_eq!(reader.peek().unwrap(), 0xa1);
        assert_eq!(reader.next().unwrap(), 0xa1);
        assert_eq!(reader.next().unwrap(), 0x02);
        assert_eq!(reader.read_bytes(2).unwrap(), b"hi");
        assert!(reader.peek().is_err());
    }
}
