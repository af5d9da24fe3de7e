//! AMQP frame encoder and decoder

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use siderite_codec::de::Decoder as ValueDecoder;
use siderite_codec::read::SliceReader;
use siderite_codec::registry::Registry;
use siderite_codec::ser::encode_value;
use siderite_types::performatives::{
    Attach, Begin, Close, Detach, Disposition, End, Flow, Open, Performative, Transfer,
};

use crate::Payload;

use super::{Error, FRAME_HEADER_LEN, FRAME_TYPE_AMQP};

/// A decoded AMQP frame: a channel and a performative body
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub channel: u16,
    pub body: FrameBody,
}

impl Frame {
    pub fn new(channel: impl Into<u16>, body: FrameBody) -> Self {
        Self {
            channel: channel.into(),
            body,
        }
    }

    /// The keepalive frame: a header with no body
    pub fn empty() -> Self {
        Self {
            channel: 0,
            body: FrameBody::Empty,
        }
    }

    pub fn into_body(self) -> FrameBody {
        self.body
    }
}

/// The body of an AMQP frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameBody {
    // handled by the link layer
    Attach(Attach),
    Flow(Flow),
    Transfer {
        performative: Transfer,
        /// Message bytes following the performative, carried verbatim
        payload: Payload,
    },
    Disposition(Disposition),
    Detach(Detach),

    // handled by the session layer
    Begin(Begin),
    End(End),

    // handled by the connection layer
    Open(Open),
    Close(Close),

    /// A frame with no body, used only as keepalive
    Empty,
}

impl FrameBody {
    pub fn name(&self) -> &'static str {
        match self {
            FrameBody::Open(_) => "open",
            FrameBody::Begin(_) => "begin",
            FrameBody::Attach(_) => "attach",
            FrameBody::Flow(_) => "flow",
            FrameBody::Transfer { .. } => "transfer",
            FrameBody::Disposition(_) => "disposition",
            FrameBody::Detach(_) => "detach",
            FrameBody::End(_) => "end",
            FrameBody::Close(_) => "close",
            FrameBody::Empty => "empty",
        }
    }
}

/// Stateful frame codec
///
/// Decoding runs the three-stage grammar: wait for the 4-byte size, wait for
/// the whole frame, then parse header and body. The first fatal parse error
/// poisons the decoder; every later call re-raises. Inbound frames are
/// bounded by what this peer advertised, outbound frames by what the remote
/// advertised; both bounds start at the local maximum until open negotiation
/// settles them.
#[derive(Debug)]
pub struct FrameCodec {
    decode_max: usize,
    encode_max: usize,
    poisoned: bool,
    registry: Registry,
}

impl FrameCodec {
    pub fn new(local_max_frame_size: u32) -> Self {
        Self {
            decode_max: local_max_frame_size as usize,
            encode_max: local_max_frame_size as usize,
            poisoned: false,
            registry: Registry::new(),
        }
    }

    /// Decodes frame bodies through the given described-type registry, so
    /// its hooks validate performative shapes as they are read
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Applies the remote's advertised maximum to the outbound direction
    pub fn set_encode_max(&mut self, remote_max_frame_size: u32) {
        self.encode_max = remote_max_frame_size as usize;
    }

    pub fn encode_max(&self) -> usize {
        self.encode_max
    }

    fn decode_inner(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Error> {
        if src.len() < 4 {
            return Ok(None);
        }
        let size = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if size < FRAME_HEADER_LEN {
            return Err(Error::FrameSizeTooSmall(size));
        }
        if size > self.decode_max {
            return Err(Error::FrameSizeExceeded {
                size,
                max: self.decode_max,
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
        let channel = frame.get_u16();
        if ftype != FRAME_TYPE_AMQP {
            return Err(Error::UnexpectedFrameType(ftype));
        }
        let doff_bytes = doff as usize * 4;
        if doff < 2 || doff_bytes > size {
            return Err(Error::InvalidDataOffset(doff));
        }
        // skip the extended header
        frame.advance(doff_bytes - FRAME_HEADER_LEN);

        if frame.is_empty() {
            return Ok(Some(Frame::new(channel, FrameBody::Empty)));
        }

        let mut reader = SliceReader::new(&frame);
        let value = ValueDecoder::with_registry(&mut reader, &self.registry).read_value()?;
        let consumed = reader.position();
        let performative = Performative::from_value(value)?;

        let body = match performative {
            Performative::Open(p) => FrameBody::Open(p),
            Performative::Begin(p) => FrameBody::Begin(p),
            Performative::Attach(p) => FrameBody::Attach(p),
            Performative::Flow(p) => FrameBody::Flow(p),
            Performative::Transfer(performative) => {
                frame.advance(consumed);
                FrameBody::Transfer {
                    performative,
                    payload: frame.freeze(),
                }
            }
            Performative::Disposition(p) => FrameBody::Disposition(p),
            Performative::Detach(p) => FrameBody::Detach(p),
            Performative::End(p) => FrameBody::End(p),
            Performative::Close(p) => FrameBody::Close(p),
        };
        Ok(Some(Frame::new(channel, body)))
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
        dst.put_u32(0); // size, fixed up below
        dst.put_u8(2); // the extended header is never emitted
        dst.put_u8(FRAME_TYPE_AMQP);
        dst.put_u16(item.channel);

        match item.body {
            FrameBody::Open(p) => encode_value(dst, &Performative::Open(p).into_value())?,
            FrameBody::Begin(p) => encode_value(dst, &Performative::Begin(p).into_value())?,
            FrameBody::Attach(p) => encode_value(dst, &Performative::Attach(p).into_value())?,
            FrameBody::Flow(p) => encode_value(dst, &Performative::Flow(p).into_value())?,
            FrameBody::Transfer {
                performative,
                payload,
            } => {
                encode_value(dst, &Performative::Transfer(performative).into_value())?;
                dst.put(payload);
            }
            FrameBody::Disposition(p) => {
                encode_value(dst, &Performative::Disposition(p).into_value())?
            }
            FrameBody::Detach(p) => encode_value(dst, &Performative::Detach(p).into_value())?,
            FrameBody::End(p) => encode_value(dst, &Performative::End(p).into_value())?,
            FrameBody::Close(p) => encode_value(dst, &Performative::Close(p).into_value())?,
            FrameBody::Empty => {}
        }

        let size = dst.len() - start;
        if size > self.encode_max {
            return Err(Error::FrameSizeExceeded {
                size,
                max: self.encode_max,
            });
        }
        dst[start..start + 4].copy_from_slice(&(size as u32).to_be_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use tokio_util::codec::{Decoder, Encoder};

    use siderite_types::performatives::Open;

    use super::{Frame, FrameBody, FrameCodec};

    fn codec() -> FrameCodec {
        FrameCodec::new(65_536)
    }

    #[test]
    fn empty_frame_roundtrip() {
        let mut codec = codec();
        let mut dst = BytesMut::new();
        codec.encode(Frame::empty(), &mut dst).unwrap();
        assert_eq!(&dst[..], &[0, 0, 0, 8, 2, 0, 0, 0]);

        let decoded = codec.decode(&mut dst).unwrap().unwrap();
        assert_eq!(decoded.body, FrameBody::Empty);
    }

    #[test]
    fn open_frame_roundtrip() {
        let mut codec = codec();
        let open = Open {
            container_id: "c1".into(),
            hostname: Some("localhost".into()),
            ..Default::default()
        };
        let mut dst = BytesMut::new();
        codec
            .encode(Frame::new(0u16, FrameBody::Open(open.clone())), &mut dst)
            .unwrap();

        let decoded = codec.decode(&mut dst).unwrap().unwrap();
        assert_eq!(decoded.channel, 0);
        match decoded.body {
            FrameBody::Open(decoded) => assert_eq!(decoded, open),
            other => panic!("expected open, got {}", other.name()),
        }
    }

    #[test]
    fn underrun_waits_for_more_bytes() {
        let mut codec = codec();
        let mut src = BytesMut::from(&[0u8, 0, 0, 16, 2, 0][..]);
        assert!(codec.decode(&mut src).unwrap().is_none());
        assert_eq!(src.len(), 6);
    }

    #[test]
    fn transfer_payload_is_carried_verbatim() {
        use siderite_types::performatives::Transfer;

        let mut codec = codec();
        let transfer = Transfer {
            handle: 0.into(),
            delivery_id: Some(0),
            delivery_tag: Some(vec![1].into()),
            settled: Some(true),
            ..Default::default()
        };
        let mut dst = BytesMut::new();
        codec
            .encode(
                Frame::new(
                    0u16,
                    FrameBody::Transfer {
                        performative: transfer,
                        payload: bytes::Bytes::from_static(b"raw payload"),
                    },
                ),
                &mut dst,
            )
            .unwrap();

        match codec.decode(&mut dst).unwrap().unwrap().body {
            FrameBody::Transfer { payload, .. } => assert_eq!(&payload[..], b"raw payload"),
            other => panic!("expected transfer, got {}", other.name()),
        }
    }

    #[test]
    fn oversized_frame_poisons_the_decoder() {
        let mut codec = FrameCodec::new(512);
        let mut src = BytesMut::from(&[0xffu8, 0xff, 0xff, 0xff, 2, 0, 0, 0][..]);
        assert!(codec.decode(&mut src).is_err());
        // every further byte re-raises
        let mut more = BytesMut::from(&[0u8, 0, 0, 8, 2, 0, 0, 0][..]);
        assert!(matches!(
            codec.decode(&mut more),
            Err(super::Error::Poisoned)
        ));
    }

    #[test]
    fn emitted_frames_respect_the_remote_maximum() {
        let mut codec = FrameCodec::new(65_536);
        codec.set_encode_max(512);
        let mut dst = BytesMut::new();
        let result = codec.encode(
            Frame::new(
                0u16,
                FrameBody::Transfer {
                    performative: Default::default(),
                    payload: vec![0u8; 4096].into(),
                },
            ),
            &mut dst,
        );
        assert!(matches!(
            result,
            Err(super::Error::FrameSizeExceeded { .. })
        ));
    }
}
