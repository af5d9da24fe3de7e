//! Connection state machine and parameter negotiation

use std::cmp::min;
use std::collections::HashMap;

use slab::Slab;

use siderite_types::definitions::{self, Milliseconds};
use siderite_types::performatives::{Begin, Close, Open};

use super::error::Error;
use super::session::{Session, SessionOptions, SessionState};

/// Connection endpoint states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionState {
    Start,
    HeaderSent,
    HeaderExchange,
    OpenSent,
    OpenReceived,
    Opened,
    CloseSent,
    CloseReceived,
    End,
    Failed,
}

/// What an incoming close asks of the engine
pub(crate) struct CloseOutcome {
    /// Reply with our own close before stopping
    pub echo: bool,
    /// The error the peer failed the connection with, if any
    pub error: Option<definitions::Error>,
}

#[derive(Debug)]
pub(crate) struct Connection {
    pub state: ConnectionState,
    pub local_open: Open,
    pub remote_open: Option<Open>,

    // negotiated down to min(local, remote) on the open exchange
    pub agreed_max_frame_size: u32,
    pub agreed_channel_max: u16,
    /// The remote's advertised idle timeout; we keepalive at half of it
    pub remote_idle_timeout: Option<Milliseconds>,

    pub sessions: Slab<Session>,
    pub sessions_by_incoming_channel: HashMap<u16, usize>,

    /// Open was requested before the header exchange completed (pipelining)
    pub pending_open: bool,
}

impl Connection {
    pub(crate) fn new(local_open: Open) -> Self {
        let agreed_max_frame_size = local_open.max_frame_size.0;
        let agreed_channel_max = local_open.channel_max.0;
        Self {
            state: ConnectionState::Start,
            local_open,
            remote_open: None,
            agreed_max_frame_size,
            agreed_channel_max,
            remote_idle_timeout: None,
            sessions: Slab::new(),
            sessions_by_incoming_channel: HashMap::new(),
            pending_open: false,
        }
    }

    pub(crate) fn on_header_sent(&mut self) {
        if self.state == ConnectionState::Start {
            self.state = ConnectionState::HeaderSent;
        }
    }

    /// Header echo received; returns whether a queued open should go out now
    pub(crate) fn on_header_exchanged(&mut self) -> Result<bool, Error> {
        match self.state {
            ConnectionState::HeaderSent => self.state = ConnectionState::HeaderExchange,
            _ => return Err(Error::illegal_state("header exchange")),
        }
        Ok(std::mem::take(&mut self.pending_open))
    }

    pub(crate) fn open_body(&mut self) -> Result<Open, Error> {
        match self.state {
            ConnectionState::HeaderExchange => self.state = ConnectionState::OpenSent,
            ConnectionState::OpenReceived => self.state = ConnectionState::Opened,
            _ => return Err(Error::illegal_state("open")),
        }
        Ok(self.local_open.clone())
    }

    pub(crate) fn on_incoming_open(&mut self, open: Open) -> Result<(), Error> {
        match self.state {
            ConnectionState::OpenSent => self.state = ConnectionState::Opened,
            ConnectionState::HeaderExchange => self.state = ConnectionState::OpenReceived,
            _ => return Err(Error::illegal_state("incoming open")),
        }
        self.agreed_max_frame_size =
            min(self.local_open.max_frame_size.0, open.max_frame_size.0);
        self.agreed_channel_max = min(self.local_open.channel_max.0, open.channel_max.0);
        self.remote_idle_timeout = open.idle_time_out.filter(|timeout| *timeout > 0);
        self.remote_open = Some(open);
        Ok(())
    }

    pub(crate) fn close_body(&mut self, error: Option<definitions::Error>) -> Result<Close, Error> {
        match self.state {
            ConnectionState::Opened | ConnectionState::OpenSent => {
                self.state = ConnectionState::CloseSent
            }
            ConnectionState::CloseReceived => self.state = ConnectionState::End,
            _ => return Err(Error::illegal_state("close")),
        }
        Ok(Close { error })
    }

    pub(crate) fn on_incoming_close(&mut self, close: Close) -> Result<CloseOutcome, Error> {
        let echo = match self.state {
            ConnectionState::CloseSent => {
                self.state = ConnectionState::End;
                false
            }
            ConnectionState::Opened => {
                self.state = ConnectionState::CloseReceived;
                true
            }
            _ => return Err(Error::illegal_state("incoming close")),
        };
        Ok(CloseOutcome {
            echo,
            error: close.error,
        })
    }

    /* ------------------------------ sessions ------------------------------ */

    /// Allocates an outgoing channel and produces the begin to emit
    pub(crate) fn begin_session(
        &mut self,
        options: &SessionOptions,
    ) -> Result<(usize, u16, Begin), Error> {
        if self.state != ConnectionState::Opened {
            return Err(Error::illegal_state("begin"));
        }
        let entry = self.sessions.vacant_entry();
        let channel = entry.key();
        if channel > self.agreed_channel_max as usize {
            return Err(Error::ResourceExhausted("channel-max"));
        }
        let channel = channel as u16;
        let mut session = Session::new(channel, options);
        session.state = SessionState::BeginSent;
        let begin = session.begin_body();
        let index = entry.key();
        entry.insert(session);
        Ok((index, channel, begin))
    }

    /// Routes a begin echo to the session it answers
    pub(crate) fn on_incoming_begin(
        &mut self,
        incoming_channel: u16,
        begin: &Begin,
    ) -> Result<usize, Error> {
        let remote_channel = begin.remote_channel.ok_or_else(|| {
            Error::protocol(
                definitions::AmqpError::NotAllowed,
                "peer-initiated sessions are not supported",
            )
        })?;
        let index = self
            .sessions
            .iter()
            .find(|(_, session)| {
                session.outgoing_channel == remote_channel
                    && session.state == SessionState::BeginSent
            })
            .map(|(index, _)| index)
            .ok_or_else(|| {
                Error::protocol(
                    definitions::AmqpError::NotAllowed,
                    format!("begin names unknown outgoing channel {remote_channel}"),
                )
            })?;
        if self
            .sessions_by_incoming_channel
            .insert(incoming_channel, index)
            .is_some()
        {
            return Err(Error::protocol(
                siderite_codec::primitives::Symbol::from("amqp:session-busy"),
                format!("incoming channel {incoming_channel} is already mapped"),
            ));
        }
        self.sessions[index].on_incoming_begin(incoming_channel, begin)?;
        Ok(index)
    }

    pub(crate) fn session_by_incoming_channel(&mut self, channel: u16) -> Result<usize, Error> {
        self.sessions_by_incoming_channel
            .get(&channel)
            .copied()
            .ok_or_else(|| {
                Error::protocol(
                    definitions::AmqpError::NotAllowed,
                    format!("frame on unmapped channel {channel}"),
                )
            })
    }

    /// Drops the channel mapping once a session fully ends
    pub(crate) fn unmap_session(&mut self, index: usize) {
        self.sessions_by_incoming_channel
            .retain(|_, mapped| *mapped != index);
    }
}
