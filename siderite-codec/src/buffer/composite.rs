//! A buffer whose storage is an ordered sequence of constituent buffers

use bytes::{Buf, Bytes};

use crate::error::Error;
use crate::read::Read;

use super::Buffer;

/// An ordered sequence of constituent buffers presented as one logical byte
/// sequence
///
/// Composite-level cursors are authoritative; constituent cursors are only
/// consulted when a buffer is appended and rewritten when the composite is
/// decomposed. Two invariants are enforced on append: constituents are unique
/// by storage identity, and neither cursor may leave a gap (once a
/// constituent has unwritten or unread bytes, no later constituent may be
/// written or read past its start).
#[derive(Debug, Default)]
pub struct CompositeBuffer {
    parts: Vec<Buffer>,
    /// Start offset of each part within the composite (prefix sums)
    starts: Vec<usize>,
    capacity: usize,
    read_offset: usize,
    write_offset: usize,
}

impl CompositeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn read_offset(&self) -> usize {
        self.read_offset
    }

    pub fn write_offset(&self) -> usize {
        self.write_offset
    }

    pub fn readable(&self) -> usize {
        self.write_offset - self.read_offset
    }

    pub fn writable(&self) -> usize {
        self.capacity - self.write_offset
    }

    pub fn constituents(&self) -> usize {
        self.parts.len()
    }

    /// Appends a constituent buffer at the tail
    pub fn append(&mut self, buffer: Buffer) -> Result<(), Error> {
        if buffer.capacity() > 0
            && self
                .parts
                .iter()
                .any(|p| std::ptr::eq(p.storage_ptr(), buffer.storage_ptr()))
        {
            return Err(Error::DuplicateConstituent);
        }
        if self.write_offset < self.capacity && buffer.write_offset() > 0 {
            return Err(Error::WriteGap);
        }
        if self.read_offset < self.write_offset && buffer.read_offset() > 0 {
            return Err(Error::ReadGap);
        }
        self.starts.push(self.capacity);
        self.read_offset += buffer.read_offset();
        self.write_offset += buffer.write_offset();
        self.capacity = self
            .capacity
            .checked_add(buffer.capacity())
            .ok_or(Error::CapacityOverflow)?;
        self.parts.push(buffer);
        Ok(())
    }

    /// Takes the composite apart, projecting the composite cursors back onto
    /// each constituent
    pub fn decompose(mut self) -> Vec<Buffer> {
        for (index, part) in self.parts.iter_mut().enumerate() {
            let start = self.starts[index];
            let end = start + part.capacity();
            let write = self.write_offset.clamp(start, end) - start;
            let read = self.read_offset.clamp(start, end) - start;
            // write first so the read <= write invariant holds throughout
            part.set_write_offset(write).expect("within capacity");
            part.set_read_offset(read).expect("within write offset");
        }
        self.parts
    }

    /// Drops fully-read leading constituents and rebases all offsets
    pub fn reclaim(&mut self) {
        let mut dropped = 0;
        while dropped < self.parts.len() {
            let len = self.parts[dropped].capacity();
            if self.starts[dropped] + len <= self.read_offset {
                dropped += 1;
            } else {
                break;
            }
        }
        if dropped == 0 {
            return;
        }
        let removed: usize = self.parts.drain(..dropped).map(|p| p.capacity()).sum();
        self.starts.drain(..dropped);
        for start in &mut self.starts {
            *start -= removed;
        }
        self.capacity -= removed;
        self.read_offset -= removed;
        self.write_offset -= removed;
    }

    /// Makes at least `n` bytes writable, reclaiming read constituents first
    /// and allocating a tail constituent if that is not enough
    pub fn ensure_writable(&mut self, n: usize) -> Result<(), Error> {
        self.reclaim();
        let writable = self.writable();
        if writable < n {
            self.append(Buffer::allocate(n - writable))?;
        }
        Ok(())
    }

    /// Locates the constituent containing the absolute `offset`
    fn locate(&self, offset: usize) -> (usize, usize) {
        let index = match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        (index, offset - self.starts[index])
    }

    pub fn read_exact_bytes(&mut self, out: &mut [u8]) -> Result<(), Error> {
        if self.readable() < out.len() {
            return Err(Error::UnexpectedEof);
        }
        let mut filled = 0;
        while filled < out.len() {
            let (index, within) = self.locate(self.read_offset);
            let part = &self.parts[index];
            let available = (part.capacity() - within).min(out.len() - filled);
            out[filled..filled + available]
                .copy_from_slice(&part.raw_slice()[within..within + available]);
            filled += available;
            self.read_offset += available;
        }
        Ok(())
    }

    pub fn write_all_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if self.writable() < bytes.len() {
            return Err(Error::OutOfBounds {
                offset: self.write_offset + bytes.len(),
                capacity: self.capacity,
            });
        }
        let mut written = 0;
        while written < bytes.len() {
            let (index, within) = self.locate(self.write_offset);
            let part = &mut self.parts[index];
            let available = (part.capacity() - within).min(bytes.len() - written);
            // write through the raw storage; composite cursors are canonical
            part.raw_slice_mut()[within..within + available]
                .copy_from_slice(&bytes[written..written + available]);
            written += available;
            self.write_offset += available;
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        let mut raw = [0u8; 1];
        self.read_exact_bytes(&mut raw)?;
        Ok(raw[0])
    }

    pub fn read_u32(&mut self) -> Result<u32, Error> {
        let mut raw = [0u8; 4];
        self.read_exact_bytes(&mut raw)?;
        Ok(u32::from_be_bytes(raw))
    }

    pub fn read_u64(&mut self) -> Result<u64, Error> {
        let mut raw = [0u8; 8];
        self.read_exact_bytes(&mut raw)?;
        Ok(u64::from_be_bytes(raw))
    }

    /// Copies the readable region into a contiguous [`Bytes`], consuming it
    pub fn copy_to_bytes(&mut self) -> Bytes {
        let mut out = vec![0u8; self.readable()];
        self.read_exact_bytes(&mut out).expect("readable bytes");
        Bytes::from(out)
    }
}

impl Buf for CompositeBuffer {
    fn remaining(&self) -> usize {
        self.readable()
    }

    fn chunk(&self) -> &[u8] {
        if self.readable() == 0 {
            return &[];
        }
        let (index, within) = self.locate(self.read_offset);
        let part = &self.parts[index];
        let end = (self.write_offset - self.starts[index]).min(part.capacity());
        // safe view into the raw storage of the located constituent
        &part.raw_slice()[within..end]
    }

    fn advance(&mut self, cnt: usize) {
        assert!(cnt <= self.readable(), "advance past write cursor");
        self.read_offset += cnt;
    }
}

impl Read for CompositeBuffer {
    fn peek(&mut self) -> Result<u8, Error> {
        self.chunk().first().copied().ok_or(Error::UnexpectedEof)
    }

    fn next(&mut self) -> Result<u8, Error> {
        self.read_u8()
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        self.read_exact_bytes(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::{Buffer, CompositeBuffer};
    use crate::error::Error;

    fn composite_of(parts: Vec<Buffer>) -> CompositeBuffer {
        let mut composite = CompositeBuffer::new();
        for part in parts {
            composite.append(part).unwrap();
        }
        composite
    }

    #[test]
    fn capacity_is_the_sum() {
        let composite = composite_of(vec![Buffer::allocate(4), Buffer::allocate(8)]);
        assert_eq!(composite.capacity(), 12);
        assert_eq!(composite.writable(), 12);
    }

    #[test]
    fn cursors_project_across_constituents() {
        let mut composite = composite_of(vec![
            Buffer::wrap(vec![0x12, 0x34]),
            Buffer::wrap(vec![0x56, 0x78]),
        ]);
        assert_eq!(composite.read_u32().unwrap(), 0x1234_5678);
        assert_eq!(composite.readable(), 0);
    }

    #[test]
    fn write_spans_constituents() {
        let mut composite = composite_of(vec![Buffer::allocate(2), Buffer::allocate(4)]);
        composite.write_all_bytes(&[1, 2, 3, 4, 5]).unwrap();
        let mut out = [0u8; 5];
        composite.read_exact_bytes(&mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn rejects_write_gap() {
        let mut composite = composite_of(vec![Buffer::allocate(4)]);
        let err = composite.append(Buffer::wrap(vec![1, 2])).unwrap_err();
        assert!(matches!(err, Error::WriteGap));
    }

    #[test]
    fn rejects_read_gap() {
        let mut composite = composite_of(vec![Buffer::wrap(vec![1, 2])]);
        let mut read_part = Buffer::wrap(vec![3, 4]);
        read_part.set_read_offset(1).unwrap();
        let err = composite.append(read_part).unwrap_err();
        assert!(matches!(err, Error::ReadGap));
    }

    #[test]
    fn reclaim_drops_fully_read_heads() {
        let mut composite = composite_of(vec![
            Buffer::wrap(vec![1, 2]),
            Buffer::wrap(vec![3, 4]),
        ]);
        composite.read_u8().unwrap();
        composite.read_u8().unwrap();
        composite.reclaim();
        assert_eq!(composite.constituents(), 1);
        assert_eq!(composite.capacity(), 2);
        assert_eq!(composite.read_offset(), 0);
        assert_eq!(composite.read_u8().unwrap(), 3);
    }

    #[test]
    fn ensure_writable_allocates_a_tail() {
        let mut composite = composite_of(vec![Buffer::wrap(vec![1])]);
        composite.read_u8().unwrap();
        composite.ensure_writable(8).unwrap();
        assert!(composite.writable() >= 8);
    }

    #[test]
    fn decompose_writes_cursors_back() {
        let mut composite = composite_of(vec![Buffer::allocate(2), Buffer::allocate(2)]);
        composite.write_all_bytes(&[9, 8, 7]).unwrap();
        composite.read_u8().unwrap();
        let parts = composite.decompose();
        assert_eq!(parts[0].read_offset(), 1);
        assert_eq!(parts[0].write_offset(), 2);
        assert_eq!(parts[1].read_offset(), 0);
        assert_eq!(parts[1].write_offset(), 1);
    }
}
