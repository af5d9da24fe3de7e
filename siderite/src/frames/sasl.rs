//! SASL frame encoder and decoder
//!
//! SASL frames share the outer layout of AMQP frames with type byte `0x01`;
//! bytes 6 and 7 are ignored and emitted as zero.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use siderite_codec::de::value_from_slice;
use siderite_codec::ser::encode_value;
use siderite_types::sasl::SaslFrameBody;

use super::{Error, FRAME_HEADER_LEN, FRAME_TYPE_SASL};

/// A decoded SASL frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub body: SaslFrameBody,
}

impl Frame {
    pub fn new(body: SaslFrameBody) -> Self {
        Self { body }
    }
}

/// Codec for the SASL layer; frames are small so the bound is fixed at the
/// minimum every peer must accept times a generous factor
#[derive(Debug, Default)]
pub struct FrameCodec {
    poisoned: bool,
}

const SASL_MAX_FRAME_SIZE: usize = 4096;

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }

    fn decode_inner(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Error> {
        if src.len() < 4 {
            return Ok(None);
        }
        let size = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if size < FRAME_HEADER_LEN {
            return Err(Error::FrameSizeTooSmall(size));
        }
        if size > SASL_MAX_FRAME_SIZE {
            return Err(Error::FrameSizeExceeded {
                size,
                max: SASL_MAX_FRAME_SIZE,
            });
        }
        if src.len() < size {
            src.reserve(size - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(size);
        frame.advance(4);
        let doff = frame.get_u8();
        let ftype = frame.get_u8();
        let _ignored = frame.get_u16();
        if ftype != FRAME_TYPE_SASL {
            return Err(Error::UnexpectedFrameType(ftype));
        }
        let doff_bytes = doff as usize * 4;
        if doff < 2 || doff_bytes > size {
            return Err(Error::InvalidDataOffset(doff));
        }
        frame.advance(doff_bytes - FRAME_HEADER_LEN);

        let value = value_from_slice(&frame)?;
        let body = SaslFrameBody::from_value(value)?;
        Ok(Some(Frame::new(body)))
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.poisoned {
            return Err(Error::Poisoned);
        }
        let result = self.decode_inner(src);
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let start = dst.len();
        dst.put_u32(0);
        dst.put_u8(2);
        dst.put_u8(FRAME_TYPE_SASL);
        dst.put_u16(0x0000);
        encode_value(dst, &item.body.into_value())?;
        let size = dst.len() - start;
        dst[start..start + 4].copy_from_slice(&(size as u32).to_be_bytes());
        Ok(())
    }
}
