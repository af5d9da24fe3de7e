//! Scripted-peer helpers: the remote end of the wire is played by encoding
//! and decoding frames directly against the sans-I/O engine
#![allow(dead_code)]

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use siderite::engine::{Engine, Event, SessionId, SessionOptions};
use siderite::frames::amqp::{Frame, FrameBody, FrameCodec};
use siderite::types::performatives::{Begin, Open};

pub const AMQP_HEADER: &[u8] = b"AMQP\x00\x01\x00\x00";

/// The peer's view of the byte stream the engine emits
pub struct Peer {
    codec: FrameCodec,
    inbox: BytesMut,
}

impl Default for Peer {
    fn default() -> Self {
        Self::new()
    }
}

impl Peer {
    pub fn new() -> Self {
        Self {
            codec: FrameCodec::new(16 * 1024 * 1024),
            inbox: BytesMut::new(),
        }
    }

    /// Pulls everything the engine queued and parses it into frames,
    /// swallowing protocol headers
    pub fn drain(&mut self, engine: &mut Engine) -> Vec<Frame> {
        while let Some(chunk) = engine.pending_output() {
            self.inbox.extend_from_slice(&chunk);
        }
        let mut frames = Vec::new();
        loop {
            if self.inbox.len() >= 8 && &self.inbox[..4] == b"AMQP" {
                let _ = self.inbox.split_to(8);
                continue;
            }
            match self.codec.decode(&mut self.inbox).expect("valid frame") {
                Some(frame) => frames.push(frame),
                None => break,
            }
        }
        frames
    }

    /// Encodes one frame as the peer and feeds it to the engine
    pub fn feed(&mut self, engine: &mut Engine, channel: u16, body: FrameBody) {
        let mut buf = BytesMut::new();
        self.codec
            .encode(Frame::new(channel, body), &mut buf)
            .expect("encodable frame");
        engine.ingest(&buf).expect("engine accepts the frame");
    }

    pub fn feed_header(&mut self, engine: &mut Engine) {
        engine.ingest(AMQP_HEADER).expect("engine accepts the header");
    }
}

pub fn events(engine: &mut Engine) -> Vec<Event> {
    let mut out = Vec::new();
    while let Some(event) = engine.next_event() {
        out.push(event);
    }
    out
}

/// Builds an engine and walks it through header and open exchange with the
/// scripted peer
pub fn opened_engine(peer: &mut Peer) -> Engine {
    let mut engine = Engine::builder().container_id("c1").build();
    engine.start();
    engine.open().unwrap();

    peer.feed_header(&mut engine);
    let frames = peer.drain(&mut engine);
    assert!(
        matches!(frames.first().map(|f| &f.body), Some(FrameBody::Open(_))),
        "engine must open after the header exchange, got {frames:?}"
    );

    peer.feed(
        &mut engine,
        0,
        FrameBody::Open(Open {
            container_id: "s1".into(),
            ..Default::default()
        }),
    );
    assert!(
        events(&mut engine)
            .iter()
            .any(|event| matches!(event, Event::Opened)),
        "open exchange must complete"
    );
    engine
}

/// Begins a session on channel 0 and answers it as the peer
pub fn begin_session(peer: &mut Peer, engine: &mut Engine) -> SessionId {
    begin_session_with_windows(peer, engine, 2048)
}

pub fn begin_session_with_windows(
    peer: &mut Peer,
    engine: &mut Engine,
    peer_incoming_window: u32,
) -> SessionId {
    let session = engine.begin_session(SessionOptions::default()).unwrap();
    let frames = peer.drain(engine);
    assert!(
        matches!(frames.first().map(|f| &f.body), Some(FrameBody::Begin(_))),
        "begin must go out, got {frames:?}"
    );

    peer.feed(
        engine,
        0,
        FrameBody::Begin(Begin {
            remote_channel: Some(0),
            next_outgoing_id: 0,
            incoming_window: peer_incoming_window,
            outgoing_window: 2048,
            handle_max: Default::default(),
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        }),
    );
    assert!(
        events(engine)
            .iter()
            .any(|event| matches!(event, Event::SessionBegun { .. })),
        "begin exchange must complete"
    );
    session
}
