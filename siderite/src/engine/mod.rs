//! The sans-I/O protocol engine
//!
//! Bytes enter through [`Engine::ingest`], bytes leave through
//! [`Engine::pending_output`], time enters through [`Engine::tick`], and
//! state changes surface through [`Engine::next_event`]. The engine owns the
//! connection, session and link state machines and never touches a socket;
//! a transport collaborator pumps the byte ends.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder as _, Encoder as _};

use siderite_codec::registry::Registry;
use siderite_types::definitions::{
    self, ConnectionError, DeliveryNumber, DeliveryTag, ErrorCondition, Milliseconds,
};
use siderite_types::messaging::DeliveryState;

use crate::frames::amqp::{Frame, FrameBody, FrameCodec};
use crate::frames::{self, sasl as sasl_frames, ProtocolHeader, ProtocolId};
use crate::Payload;

mod builder;
mod connection;
mod delivery;
mod error;
mod event;
mod link;
mod sasl;
mod session;

pub use builder::{Builder, DEFAULT_CHANNEL_MAX, DEFAULT_MAX_FRAME_SIZE};
pub use delivery::Delivery;
pub use error::Error;
pub use event::Event;
pub use link::LinkOptions;
pub use session::{SendOptions, SessionOptions};

use connection::{Connection, ConnectionState};
use sasl::{SaslClient, SaslStep};
use session::SessionState;

/// Identifies a session within its engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub(crate) usize);

/// Identifies a link within its engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId {
    pub(crate) session: usize,
    pub(crate) link: usize,
}

impl LinkId {
    pub fn session_id(&self) -> SessionId {
        SessionId(self.session)
    }
}

/// What the inbound byte parser expects next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    SaslHeader,
    SaslFrames,
    AmqpHeader,
    AmqpFrames,
}

/// The protocol engine; see the module docs for the driving contract
#[derive(Debug)]
pub struct Engine {
    conn: Connection,
    sasl: Option<SaslClient>,
    phase: Phase,

    inbox: BytesMut,
    outbox: BytesMut,
    amqp_codec: FrameCodec,
    sasl_codec: sasl_frames::FrameCodec,

    events: VecDeque<Event>,
    failure: Option<String>,
    started: bool,

    local_idle_timeout: Option<Milliseconds>,
    last_received: Option<Instant>,
    last_sent: Option<Instant>,
    received_flag: bool,
    sent_flag: bool,
}

impl Engine {
    pub fn builder() -> Builder {
        Builder::new()
    }

    pub(crate) fn from_builder(builder: Builder) -> Self {
        let local_open = builder.local_open();
        let local_idle_timeout = builder.idle_time_out;
        let amqp_codec =
            FrameCodec::new(builder.max_frame_size).with_registry(builder.registry);
        let sasl = (!builder.sasl_profiles.is_empty())
            .then(|| SaslClient::new(builder.sasl_profiles, builder.hostname.clone()));
        let phase = if sasl.is_some() {
            Phase::SaslHeader
        } else {
            Phase::AmqpHeader
        };
        Self {
            conn: Connection::new(local_open),
            sasl,
            phase,
            inbox: BytesMut::new(),
            outbox: BytesMut::new(),
            amqp_codec,
            sasl_codec: sasl_frames::FrameCodec::new(),
            events: VecDeque::new(),
            failure: None,
            started: false,
            local_idle_timeout,
            last_received: None,
            last_sent: None,
            received_flag: false,
            sent_flag: false,
        }
    }

    /* --------------------------- driver surface --------------------------- */

    /// Emits the first protocol header; idempotent
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        let header = if self.sasl.is_some() {
            ProtocolHeader::sasl()
        } else {
            self.conn.on_header_sent();
            ProtocolHeader::amqp()
        };
        self.emit_header(header);
    }

    /// Feeds inbound bytes through the parser and the state machines
    pub fn ingest(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.guard()?;
        if !bytes.is_empty() {
            self.received_flag = true;
            self.inbox.extend_from_slice(bytes);
        }
        match self.pump() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Drains queued outbound bytes; ownership transfers to the caller
    pub fn pending_output(&mut self) -> Option<Bytes> {
        if self.outbox.is_empty() {
            None
        } else {
            Some(self.outbox.split().freeze())
        }
    }

    /// Pops the next queued event
    pub fn next_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Advances timers; returns the next deadline the driver must call back
    /// at, if any timer is armed
    pub fn tick(&mut self, now: Instant) -> Option<Instant> {
        if !self.started || self.failure.is_some() {
            return None;
        }
        if self.received_flag || self.last_received.is_none() {
            self.last_received = Some(now);
            self.received_flag = false;
        }
        if self.sent_flag || self.last_sent.is_none() {
            self.last_sent = Some(now);
            self.sent_flag = false;
        }

        let mut next: Option<Instant> = None;
        let mut arm = |deadline: Instant, next: &mut Option<Instant>| {
            *next = Some(match *next {
                Some(existing) => existing.min(deadline),
                None => deadline,
            });
        };

        // keepalive: never let the remote's idle timeout expire on us
        if self.conn.state == ConnectionState::Opened {
            if let Some(remote_timeout) = self.conn.remote_idle_timeout {
                let interval = Duration::from_millis(u64::from(remote_timeout) / 2);
                let mut deadline = self.last_sent.expect("set above") + interval;
                if now >= deadline {
                    tracing::trace!("emitting keepalive frame");
                    let _ = self.emit_amqp(Frame::empty());
                    self.last_sent = Some(now);
                    self.sent_flag = false;
                    deadline = now + interval;
                }
                arm(deadline, &mut next);
            }
        }

        // enforcement: a peer silent for twice our advertised timeout is gone
        if let Some(local_timeout) = self.local_idle_timeout.filter(|t| *t > 0) {
            let limit = Duration::from_millis(u64::from(local_timeout) * 2);
            let deadline = self.last_received.expect("set above") + limit;
            if now >= deadline {
                let record = definitions::Error::new(
                    ConnectionError::ConnectionForced,
                    "local idle timeout expired",
                );
                let err = Error::Protocol(record);
                self.fail(&err);
                return None;
            }
            arm(deadline, &mut next);
        }
        next
    }

    /// Drops all pending work and marks the engine finished locally
    pub fn shutdown(&mut self) {
        self.inbox.clear();
        self.conn.state = ConnectionState::End;
        for (index, session) in self.conn.sessions.iter_mut() {
            if session.state == SessionState::Mapped {
                session.teardown(index, None, &mut self.events);
                session.state = SessionState::Ended;
            }
        }
        self.events.push_back(Event::Closed { error: None });
    }

    pub fn is_opened(&self) -> bool {
        self.conn.state == ConnectionState::Opened
    }

    pub fn is_closed(&self) -> bool {
        matches!(
            self.conn.state,
            ConnectionState::End | ConnectionState::Failed
        )
    }

    pub fn agreed_max_frame_size(&self) -> u32 {
        self.conn.agreed_max_frame_size
    }

    /// The described-type registry inbound frame bodies are decoded against;
    /// applications decode payload extensions with the same one
    pub fn registry(&self) -> &Registry {
        self.amqp_codec.registry()
    }

    /* ---------------------------- operations ------------------------------ */

    /// Requests the open exchange; queued until the header exchange is done
    pub fn open(&mut self) -> Result<(), Error> {
        self.guard()?;
        match self.conn.state {
            ConnectionState::HeaderExchange | ConnectionState::OpenReceived => {
                let open = self.conn.open_body()?;
                self.emit_amqp(Frame::new(0u16, FrameBody::Open(open)))
            }
            ConnectionState::Start | ConnectionState::HeaderSent => {
                self.conn.pending_open = true;
                Ok(())
            }
            _ => Err(Error::illegal_state("open")),
        }
    }

    /// Starts a graceful or erroring close
    pub fn close(&mut self, error: Option<definitions::Error>) -> Result<(), Error> {
        self.guard()?;
        let close = self.conn.close_body(error)?;
        self.emit_amqp(Frame::new(0u16, FrameBody::Close(close)))
    }

    pub fn begin_session(&mut self, options: SessionOptions) -> Result<SessionId, Error> {
        self.guard()?;
        let (index, channel, begin) = self.conn.begin_session(&options)?;
        self.emit_amqp(Frame::new(channel, FrameBody::Begin(begin)))?;
        Ok(SessionId(index))
    }

    pub fn end_session(
        &mut self,
        session: SessionId,
        error: Option<definitions::Error>,
    ) -> Result<(), Error> {
        self.guard()?;
        let session_ref = self
            .conn
            .sessions
            .get_mut(session.0)
            .ok_or(Error::UnknownSession)?;
        if session_ref.state != SessionState::Mapped {
            return Err(Error::illegal_state("end"));
        }
        let channel = session_ref.outgoing_channel;
        let end = session_ref.end_body(error);
        self.emit_amqp(Frame::new(channel, FrameBody::End(end)))
    }

    pub fn attach(&mut self, session: SessionId, options: LinkOptions) -> Result<LinkId, Error> {
        self.guard()?;
        let session_ref = self
            .conn
            .sessions
            .get_mut(session.0)
            .ok_or(Error::UnknownSession)?;
        let channel = session_ref.outgoing_channel;
        let (link_index, attach) = session_ref.attach(options)?;
        self.emit_amqp(Frame::new(channel, attach))?;
        Ok(LinkId {
            session: session.0,
            link: link_index,
        })
    }

    pub fn detach(
        &mut self,
        link: LinkId,
        closed: bool,
        error: Option<definitions::Error>,
    ) -> Result<(), Error> {
        self.guard()?;
        let session_ref = self
            .conn
            .sessions
            .get_mut(link.session)
            .ok_or(Error::UnknownSession)?;
        let channel = session_ref.outgoing_channel;
        let detach = session_ref.detach(link.link, closed, error)?;
        self.emit_amqp(Frame::new(channel, detach))
    }

    /// Queues one outbound delivery; transfers go out as far as credit and
    /// the session window allow, the rest follows on future flow
    pub fn send(
        &mut self,
        link: LinkId,
        tag: DeliveryTag,
        payload: Payload,
        options: SendOptions,
    ) -> Result<(), Error> {
        self.guard()?;
        let max_frame_size = self.conn.agreed_max_frame_size as usize;
        let session_ref = self
            .conn
            .sessions
            .get_mut(link.session)
            .ok_or(Error::UnknownSession)?;
        let channel = session_ref.outgoing_channel;
        let bodies = session_ref.send(
            link.session,
            link.link,
            tag,
            payload,
            options,
            max_frame_size,
            &mut self.events,
        )?;
        self.emit_bodies(channel, bodies)
    }

    /// Grants credit on a receiver link; with `drain` the sender must use or
    /// return all of it
    pub fn flow_credit(
        &mut self,
        link: LinkId,
        credit: u32,
        drain: bool,
        echo: bool,
    ) -> Result<(), Error> {
        self.guard()?;
        let session_ref = self
            .conn
            .sessions
            .get_mut(link.session)
            .ok_or(Error::UnknownSession)?;
        let channel = session_ref.outgoing_channel;
        let bodies = session_ref.flow_credit(link.link, credit, drain, echo)?;
        self.emit_bodies(channel, bodies)
    }

    /// Starts a drain cycle on a receiver link; completion surfaces as
    /// [`Event::Drained`] once the sender consumed or returned the credit
    pub fn drain(&mut self, link: LinkId) -> Result<(), Error> {
        self.guard()?;
        let session_ref = self
            .conn
            .sessions
            .get_mut(link.session)
            .ok_or(Error::UnknownSession)?;
        let channel = session_ref.outgoing_channel;
        let bodies = session_ref.drain_link(link.session, link.link, &mut self.events)?;
        self.emit_bodies(channel, bodies)
    }

    /// Applies local delivery state; dispositions are coalesced per pump
    pub fn dispose(
        &mut self,
        link: LinkId,
        delivery_id: DeliveryNumber,
        state: DeliveryState,
        settled: bool,
    ) -> Result<(), Error> {
        self.guard()?;
        let session_ref = self
            .conn
            .sessions
            .get_mut(link.session)
            .ok_or(Error::UnknownSession)?;
        let role = session_ref
            .links
            .get(link.link)
            .ok_or(Error::UnknownLink)?
            .role;
        session_ref.dispose(role, delivery_id, state, settled)?;
        self.flush_sessions()
    }

    /* ----------------------------- internals ------------------------------ */

    fn guard(&self) -> Result<(), Error> {
        match &self.failure {
            Some(description) => Err(Error::Failed(description.clone())),
            None => Ok(()),
        }
    }

    fn emit_header(&mut self, header: ProtocolHeader) {
        tracing::trace!(?header, "emitting protocol header");
        let raw: [u8; 8] = header.into();
        self.outbox.extend_from_slice(&raw);
        self.sent_flag = true;
    }

    fn emit_amqp(&mut self, frame: Frame) -> Result<(), Error> {
        tracing::trace!(channel = frame.channel, body = frame.body.name(), "SEND");
        self.amqp_codec
            .encode(frame, &mut self.outbox)
            .map_err(Error::from)?;
        self.sent_flag = true;
        Ok(())
    }

    fn emit_bodies(&mut self, channel: u16, bodies: Vec<FrameBody>) -> Result<(), Error> {
        for body in bodies {
            self.emit_amqp(Frame::new(channel, body))?;
        }
        Ok(())
    }

    fn emit_sasl(&mut self, body: siderite_types::sasl::SaslFrameBody) -> Result<(), Error> {
        tracing::trace!(body = body.name(), "SEND sasl");
        self.sasl_codec
            .encode(sasl_frames::Frame::new(body), &mut self.outbox)
            .map_err(Error::from)?;
        self.sent_flag = true;
        Ok(())
    }

    /// Records the failure, synthetically tears the hierarchy down and
    /// refuses everything from here on
    fn fail(&mut self, error: &Error) {
        if self.failure.is_some() {
            return;
        }
        let description = error.to_string();
        tracing::error!(%description, "engine failed");

        // best effort: tell the peer why before going silent
        if matches!(
            self.conn.state,
            ConnectionState::Opened | ConnectionState::OpenSent | ConnectionState::OpenReceived
        ) {
            let record = match error {
                Error::Protocol(record) => record.clone(),
                Error::Framing(_) => definitions::Error::new(
                    definitions::AmqpError::DecodeError,
                    description.clone(),
                ),
                _ => definitions::Error::new(
                    definitions::AmqpError::InternalError,
                    description.clone(),
                ),
            };
            if let Ok(close) = self.conn.close_body(Some(record)) {
                let _ = self.emit_amqp(Frame::new(0u16, FrameBody::Close(close)));
            }
        }

        let remote_error = match error {
            Error::RemoteClosed(record) => Some(record.clone()),
            _ => None,
        };
        for (index, session) in self.conn.sessions.iter_mut() {
            if matches!(session.state, SessionState::Mapped | SessionState::BeginSent) {
                session.teardown(index, remote_error.as_ref(), &mut self.events);
                if !session.ended_notified {
                    session.ended_notified = true;
                    self.events.push_back(Event::SessionEnded {
                        session: SessionId(index),
                        error: remote_error.clone(),
                    });
                }
                session.state = SessionState::Ended;
            }
        }
        self.conn.state = ConnectionState::Failed;
        self.failure = Some(description.clone());
        self.events.push_back(Event::Failed { description });
    }

    /// Parses as much of the inbox as the current phase allows
    fn pump(&mut self) -> Result<(), Error> {
        loop {
            // a handler may have failed the engine mid-batch (e.g. a remote
            // close with an error); anything after that point is discarded
            if self.failure.is_some() {
                self.inbox.clear();
                return Ok(());
            }
            match self.phase {
                Phase::SaslHeader | Phase::AmqpHeader => {
                    if self.inbox.len() < 8 {
                        break;
                    }
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(&self.inbox.split_to(8));
                    let header = ProtocolHeader::try_from(raw)
                        .map_err(|raw| frames::Error::InvalidProtocolHeader(raw))?;
                    self.on_protocol_header(header)?;
                }
                Phase::SaslFrames => match self.sasl_codec.decode(&mut self.inbox)? {
                    Some(frame) => self.on_sasl_frame(frame.body)?,
                    None => break,
                },
                Phase::AmqpFrames => match self.amqp_codec.decode(&mut self.inbox)? {
                    Some(frame) => self.on_amqp_frame(frame)?,
                    None => break,
                },
            }
        }
        self.flush_sessions()
    }

    fn on_protocol_header(&mut self, header: ProtocolHeader) -> Result<(), Error> {
        tracing::trace!(?header, "RECV protocol header");
        let expected = match self.phase {
            Phase::SaslHeader => ProtocolHeader::sasl(),
            Phase::AmqpHeader => ProtocolHeader::amqp(),
            _ => return Err(Error::illegal_state("protocol header")),
        };
        if header != expected {
            return Err(frames::Error::InvalidProtocolHeader(header.into()).into());
        }
        match header.id {
            ProtocolId::Sasl => {
                self.phase = Phase::SaslFrames;
            }
            ProtocolId::Amqp => {
                self.phase = Phase::AmqpFrames;
                if self.conn.on_header_exchanged()? {
                    let open = self.conn.open_body()?;
                    self.emit_amqp(Frame::new(0u16, FrameBody::Open(open)))?;
                }
            }
            ProtocolId::Tls => {
                return Err(frames::Error::InvalidProtocolHeader(header.into()).into())
            }
        }
        Ok(())
    }

    fn on_sasl_frame(&mut self, body: siderite_types::sasl::SaslFrameBody) -> Result<(), Error> {
        tracing::trace!(body = body.name(), "RECV sasl");
        let client = self.sasl.as_mut().ok_or(Error::illegal_state("sasl"))?;
        match client.on_frame(body)? {
            SaslStep::Emit(reply) => self.emit_sasl(reply),
            SaslStep::Authenticated => {
                tracing::debug!("sasl negotiation complete");
                self.phase = Phase::AmqpHeader;
                self.conn.on_header_sent();
                self.emit_header(ProtocolHeader::amqp());
                Ok(())
            }
        }
    }

    fn on_amqp_frame(&mut self, frame: Frame) -> Result<(), Error> {
        tracing::trace!(channel = frame.channel, body = frame.body.name(), "RECV");
        let channel = frame.channel;
        match frame.body {
            FrameBody::Empty => Ok(()),

            FrameBody::Open(open) => {
                let was_open_sent = self.conn.state == ConnectionState::OpenSent;
                self.conn.on_incoming_open(open)?;
                if was_open_sent {
                    self.on_opened();
                }
                Ok(())
            }

            FrameBody::Close(close) => {
                let outcome = self.conn.on_incoming_close(close)?;
                if outcome.echo {
                    let close = self.conn.close_body(None)?;
                    self.emit_amqp(Frame::new(0u16, FrameBody::Close(close)))?;
                }
                match outcome.error {
                    Some(record) => {
                        // surfaced through fail(); ingest reports Ok since
                        // the failure is the peer's and already handled
                        self.events.push_back(Event::Closed {
                            error: Some(record.clone()),
                        });
                        self.fail(&Error::RemoteClosed(record));
                        Ok(())
                    }
                    None => {
                        self.events.push_back(Event::Closed { error: None });
                        Ok(())
                    }
                }
            }

            FrameBody::Begin(begin) => {
                let index = self.conn.on_incoming_begin(channel, &begin)?;
                self.events.push_back(Event::SessionBegun {
                    session: SessionId(index),
                });
                Ok(())
            }

            FrameBody::End(end) => {
                let index = self.conn.session_by_incoming_channel(channel)?;
                let session = &mut self.conn.sessions[index];
                match session.state {
                    SessionState::EndSent => {
                        session.state = SessionState::Ended;
                        if !session.ended_notified {
                            session.ended_notified = true;
                            self.events.push_back(Event::SessionEnded {
                                session: SessionId(index),
                                error: end.error,
                            });
                        }
                    }
                    SessionState::Mapped => {
                        session.teardown(index, end.error.as_ref(), &mut self.events);
                        session.state = SessionState::Ended;
                        session.ended_notified = true;
                        let channel = session.outgoing_channel;
                        self.events.push_back(Event::SessionEnded {
                            session: SessionId(index),
                            error: end.error,
                        });
                        self.emit_amqp(Frame::new(channel, FrameBody::End(Default::default())))?;
                    }
                    _ => return Err(Error::illegal_state("incoming end")),
                }
                self.conn.unmap_session(index);
                Ok(())
            }

            FrameBody::Attach(attach) => self.with_session(channel, |engine, index| {
                let session = &mut engine.conn.sessions[index];
                session.on_incoming_attach(index, attach, &mut engine.events)
            }),

            FrameBody::Flow(flow) => {
                let max_frame_size = self.conn.agreed_max_frame_size as usize;
                self.with_session(channel, move |engine, index| {
                    let session = &mut engine.conn.sessions[index];
                    session.on_incoming_flow(index, flow, max_frame_size, &mut engine.events)
                })
            }

            FrameBody::Transfer {
                performative,
                payload,
            } => self.with_session(channel, move |engine, index| {
                let session = &mut engine.conn.sessions[index];
                session.on_incoming_transfer(index, performative, payload, &mut engine.events)
            }),

            FrameBody::Disposition(disposition) => self.with_session(channel, |engine, index| {
                let session = &mut engine.conn.sessions[index];
                session.on_incoming_disposition(index, disposition, &mut engine.events)
            }),

            FrameBody::Detach(detach) => self.with_session(channel, |engine, index| {
                let session = &mut engine.conn.sessions[index];
                session.on_incoming_detach(index, detach, &mut engine.events)
            }),
        }
    }

    /// Open negotiation settled: cap the outbound codec and surface the event
    fn on_opened(&mut self) {
        self.amqp_codec
            .set_encode_max(self.conn.agreed_max_frame_size);
        tracing::debug!(
            max_frame_size = self.conn.agreed_max_frame_size,
            channel_max = self.conn.agreed_channel_max,
            idle_time_out = ?self.conn.remote_idle_timeout,
            "connection opened"
        );
        self.events.push_back(Event::Opened);
    }

    /// Runs a session-scoped handler; violations are fatal to the component
    /// where detected: a link-scoped one detaches the offending link with
    /// the error, a session-scoped one ends that session, anything else
    /// escalates to the connection
    fn with_session<F>(&mut self, channel: u16, handler: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Engine, usize) -> Result<Vec<FrameBody>, Error>,
    {
        let index = self.conn.session_by_incoming_channel(channel)?;
        let outgoing_channel = self.conn.sessions[index].outgoing_channel;
        match handler(self, index) {
            Ok(bodies) => self.emit_bodies(outgoing_channel, bodies),
            Err(Error::LinkProtocol { link, error }) => self.fail_link(index, link, error),
            Err(Error::Protocol(record)) if session_scoped(&record.condition) => {
                self.fail_session(index, record)
            }
            Err(other) => Err(other),
        }
    }

    /// Detaches a link with an error after a link-scoped violation; the
    /// session stays mapped
    fn fail_link(
        &mut self,
        session_index: usize,
        link_index: usize,
        record: definitions::Error,
    ) -> Result<(), Error> {
        tracing::warn!(
            session = session_index,
            link = link_index,
            error = %record,
            "failing link"
        );
        let session = &mut self.conn.sessions[session_index];
        let channel = session.outgoing_channel;
        let bodies = session.fail_link(session_index, link_index, record, &mut self.events);
        self.emit_bodies(channel, bodies)
    }

    /// Ends a session with an error and synthetically detaches its links
    fn fail_session(&mut self, index: usize, record: definitions::Error) -> Result<(), Error> {
        tracing::warn!(session = index, error = %record, "failing session");
        let session = &mut self.conn.sessions[index];
        let channel = session.outgoing_channel;
        session.teardown(index, Some(&record), &mut self.events);
        let end = session.end_body(Some(record.clone()));
        session.ended_notified = true;
        self.events.push_back(Event::SessionEnded {
            session: SessionId(index),
            error: Some(record),
        });
        self.emit_amqp(Frame::new(channel, FrameBody::End(end)))
    }

    /// End-of-pump housekeeping: coalesced dispositions and window
    /// replenishment flows for every mapped session
    fn flush_sessions(&mut self) -> Result<(), Error> {
        let mut emissions: Vec<(u16, FrameBody)> = Vec::new();
        for (_, session) in self.conn.sessions.iter_mut() {
            if session.state != SessionState::Mapped {
                session.pending_dispositions.clear();
                continue;
            }
            let channel = session.outgoing_channel;
            for body in session.flush_dispositions() {
                emissions.push((channel, body));
            }
            if let Some(body) = session.maybe_replenish_window() {
                emissions.push((channel, body));
            }
        }
        for (channel, body) in emissions {
            self.emit_amqp(Frame::new(channel, body))?;
        }
        Ok(())
    }
}

/// Conditions that end a session rather than the whole connection;
/// link-scoped violations travel as [`Error::LinkProtocol`] and detach only
/// the offending link
fn session_scoped(condition: &ErrorCondition) -> bool {
    matches!(
        condition,
        ErrorCondition::SessionError(_)
            | ErrorCondition::AmqpError(
                definitions::AmqpError::NotAllowed | definitions::AmqpError::InvalidField
            )
    )
}
