//! The async client façade
//!
//! One tokio task per connection owns the sans-I/O [`Engine`] and the byte
//! transport; handles marshal operations onto that task over a command
//! channel and await oneshot completions. The task never blocks inside the
//! engine: it pumps inbound bytes, drains outbound bytes, dispatches engine
//! events to completions, and sleeps until the engine's next timer deadline.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};

use siderite_types::definitions::{self, DeliveryNumber, DeliveryTag, Role};
use siderite_types::messaging::DeliveryState;

use crate::engine::{
    Delivery, Engine, Event, LinkId, LinkOptions, SendOptions, SessionId, SessionOptions,
};

mod builder;
pub use builder::Builder;

mod error;
pub use error::Error;

mod session;
pub use session::Session;

mod sender;
pub use sender::Sender;

mod receiver;
pub use receiver::Receiver;

pub(crate) type Responder<T> = oneshot::Sender<Result<T, Error>>;

/// Operations marshalled onto the connection task
pub(crate) enum Op {
    Begin {
        options: SessionOptions,
        resp: Responder<SessionId>,
    },
    End {
        session: SessionId,
        resp: Responder<()>,
    },
    Attach {
        session: SessionId,
        options: LinkOptions,
        deliveries: Option<mpsc::UnboundedSender<Result<Delivery, Error>>>,
        resp: Responder<LinkId>,
    },
    Detach {
        link: LinkId,
        closed: bool,
        resp: Responder<()>,
    },
    Send {
        link: LinkId,
        payload: Bytes,
        options: SendOptions,
        resp: Responder<Option<DeliveryState>>,
    },
    Credit {
        link: LinkId,
        credit: u32,
    },
    Drain {
        link: LinkId,
        resp: Responder<()>,
    },
    Dispose {
        link: LinkId,
        delivery_id: DeliveryNumber,
        state: DeliveryState,
        settled: bool,
        resp: Responder<()>,
    },
    Close {
        error: Option<definitions::Error>,
        resp: Responder<()>,
    },
}

/// Façade timeouts, copied into every handle
#[derive(Debug, Clone, Copy)]
pub(crate) struct Timeouts {
    pub open: Duration,
    pub close: Duration,
    pub send: Duration,
    pub drain: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            open: Duration::from_secs(10),
            close: Duration::from_secs(10),
            send: Duration::from_secs(30),
            drain: Duration::from_secs(30),
        }
    }
}

/// An open AMQP connection
///
/// Dropping the handle without [`close`](Connection::close) leaves the task
/// to wind down on transport EOF.
#[derive(Debug)]
pub struct Connection {
    pub(crate) ops: mpsc::UnboundedSender<Op>,
    pub(crate) timeouts: Timeouts,
}

impl Connection {
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Gracefully closes the connection and waits for the peer's close
    pub async fn close(self) -> Result<(), Error> {
        let (resp, rx) = oneshot::channel();
        self.ops
            .send(Op::Close { error: None, resp })
            .map_err(|_| Error::ConnectionDropped)?;
        complete(rx, self.timeouts.close, "close").await
    }
}

/// Awaits a completion under the operation's timeout; expiry does not undo
/// wire effects that already went out
pub(crate) async fn complete<T>(
    rx: oneshot::Receiver<Result<T, Error>>,
    timeout: Duration,
    what: &'static str,
) -> Result<T, Error> {
    match tokio::time::timeout(timeout, rx).await {
        Err(_) => Err(Error::Timeout(what)),
        Ok(Err(_)) => Err(Error::ConnectionDropped),
        Ok(Ok(result)) => result,
    }
}

/* --------------------------- the connection task -------------------------- */

#[derive(Default)]
struct Completions {
    open: Option<Responder<()>>,
    close: Option<Responder<()>>,
    begins: HashMap<SessionId, Responder<SessionId>>,
    ends: HashMap<SessionId, Responder<()>>,
    attaches: HashMap<LinkId, Responder<LinkId>>,
    detaches: HashMap<LinkId, Responder<()>>,
    sends: HashMap<(LinkId, DeliveryTag), Responder<Option<DeliveryState>>>,
    drains: HashMap<LinkId, Responder<()>>,
    receivers: HashMap<LinkId, mpsc::UnboundedSender<Result<Delivery, Error>>>,
}

impl Completions {
    fn fail_all(&mut self, error: impl Fn() -> Error) {
        if let Some(resp) = self.open.take() {
            let _ = resp.send(Err(error()));
        }
        if let Some(resp) = self.close.take() {
            let _ = resp.send(Err(error()));
        }
        for (_, resp) in self.begins.drain() {
            let _ = resp.send(Err(error()));
        }
        for (_, resp) in self.ends.drain() {
            let _ = resp.send(Err(error()));
        }
        for (_, resp) in self.attaches.drain() {
            let _ = resp.send(Err(error()));
        }
        for (_, resp) in self.detaches.drain() {
            let _ = resp.send(Err(error()));
        }
        for (_, resp) in self.sends.drain() {
            let _ = resp.send(Err(error()));
        }
        for (_, resp) in self.drains.drain() {
            let _ = resp.send(Err(error()));
        }
        for (_, deliveries) in self.receivers.drain() {
            let _ = deliveries.send(Err(error()));
        }
    }
}

pub(crate) struct ConnectionTask<Io> {
    engine: Engine,
    io: Io,
    ops: mpsc::UnboundedReceiver<Op>,
    completions: Completions,
    next_tag: u64,
}

impl<Io> ConnectionTask<Io>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(
        engine: Engine,
        io: Io,
        ops: mpsc::UnboundedReceiver<Op>,
        open_resp: Responder<()>,
    ) -> Self {
        let mut completions = Completions::default();
        completions.open = Some(open_resp);
        Self {
            engine,
            io,
            ops,
            completions,
            next_tag: 0,
        }
    }

    pub(crate) async fn run(mut self) {
        if let Err(error) = self.drive().await {
            tracing::debug!(%error, "connection task stopped");
            self.completions.fail_all(|| match &error {
                Error::Io(io) => std::io::Error::new(io.kind(), io.to_string()).into(),
                other => Error::EngineFailed(other.to_string()),
            });
        }
    }

    async fn drive(&mut self) -> Result<(), Error> {
        self.engine.start();
        self.engine.open()?;

        let mut read_buf = vec![0u8; 16 * 1024];
        loop {
            self.flush().await?;
            self.dispatch_events();
            if self.engine.is_closed() {
                self.flush().await?;
                self.completions
                    .fail_all(|| Error::ConnectionClosed(None));
                return Ok(());
            }
            let deadline = self.engine.tick(Instant::now());
            self.flush().await?;

            tokio::select! {
                read = self.io.read(&mut read_buf) => {
                    let n = read?;
                    if n == 0 {
                        return Err(Error::ConnectionDropped);
                    }
                    if let Err(error) = self.engine.ingest(&read_buf[..n]) {
                        // failure events are queued; surface them, then stop
                        self.flush().await.ok();
                        self.dispatch_events();
                        return Err(error.into());
                    }
                }
                op = self.ops.recv() => {
                    match op {
                        Some(op) => self.handle_op(op),
                        // every handle is gone; nothing left to serve
                        None => return Ok(()),
                    }
                }
                _ = sleep_until(deadline) => {}
            }
            let _ = self.engine.tick(Instant::now());
        }
    }

    async fn flush(&mut self) -> Result<(), Error> {
        let mut wrote = false;
        while let Some(chunk) = self.engine.pending_output() {
            self.io.write_all(&chunk).await?;
            wrote = true;
        }
        if wrote {
            self.io.flush().await?;
        }
        Ok(())
    }

    fn next_delivery_tag(&mut self) -> DeliveryTag {
        let tag = self.next_tag.to_be_bytes().to_vec();
        self.next_tag += 1;
        DeliveryTag::from(tag)
    }

    fn handle_op(&mut self, op: Op) {
        match op {
            Op::Begin { options, resp } => match self.engine.begin_session(options) {
                Ok(session) => {
                    self.completions.begins.insert(session, resp);
                }
                Err(error) => {
                    let _ = resp.send(Err(error.into()));
                }
            },
            Op::End { session, resp } => match self.engine.end_session(session, None) {
                Ok(()) => {
                    self.completions.ends.insert(session, resp);
                }
                Err(error) => {
                    let _ = resp.send(Err(error.into()));
                }
            },
            Op::Attach {
                session,
                options,
                deliveries,
                resp,
            } => match self.engine.attach(session, options) {
                Ok(link) => {
                    if let Some(deliveries) = deliveries {
                        self.completions.receivers.insert(link, deliveries);
                    }
                    self.completions.attaches.insert(link, resp);
                }
                Err(error) => {
                    let _ = resp.send(Err(error.into()));
                }
            },
            Op::Detach { link, closed, resp } => match self.engine.detach(link, closed, None) {
                Ok(()) => {
                    self.completions.detaches.insert(link, resp);
                }
                Err(error) => {
                    let _ = resp.send(Err(error.into()));
                }
            },
            Op::Send {
                link,
                payload,
                options,
                resp,
            } => {
                let tag = self.next_delivery_tag();
                match self.engine.send(link, tag.clone(), payload, options) {
                    Ok(()) => {
                        self.completions.sends.insert((link, tag), resp);
                    }
                    Err(error) => {
                        let _ = resp.send(Err(error.into()));
                    }
                }
            }
            Op::Credit { link, credit } => {
                if let Err(error) = self.engine.flow_credit(link, credit, false, false) {
                    tracing::warn!(%error, "credit update failed");
                }
            }
            Op::Drain { link, resp } => match self.engine.drain(link) {
                Ok(()) => {
                    self.completions.drains.insert(link, resp);
                }
                Err(error) => {
                    let _ = resp.send(Err(error.into()));
                }
            },
            Op::Dispose {
                link,
                delivery_id,
                state,
                settled,
                resp,
            } => {
                let result = self
                    .engine
                    .dispose(link, delivery_id, state, settled)
                    .map_err(Error::from);
                let _ = resp.send(result);
            }
            Op::Close { error, resp } => match self.engine.close(error) {
                Ok(()) => {
                    self.completions.close = Some(resp);
                }
                Err(error) => {
                    let _ = resp.send(Err(error.into()));
                }
            },
        }
    }

    fn dispatch_events(&mut self) {
        while let Some(event) = self.engine.next_event() {
            match event {
                Event::Opened => {
                    if let Some(resp) = self.completions.open.take() {
                        let _ = resp.send(Ok(()));
                    }
                }
                Event::Closed { error } => {
                    if let Some(resp) = self.completions.close.take() {
                        let _ = resp.send(match error {
                            None => Ok(()),
                            Some(record) => Err(Error::ConnectionClosed(Some(record))),
                        });
                    }
                }
                Event::SessionBegun { session } => {
                    if let Some(resp) = self.completions.begins.remove(&session) {
                        let _ = resp.send(Ok(session));
                    }
                }
                Event::SessionEnded { session, error } => {
                    if let Some(resp) = self.completions.ends.remove(&session) {
                        let _ = resp.send(match &error {
                            None => Ok(()),
                            Some(record) => Err(Error::SessionEnded(Some(record.clone()))),
                        });
                    }
                    self.fail_session_scope(session, &error);
                }
                Event::LinkAttached { link } => {
                    if let Some(resp) = self.completions.attaches.remove(&link) {
                        let _ = resp.send(Ok(link));
                    }
                }
                Event::LinkDetached {
                    link,
                    closed: _,
                    error,
                } => {
                    if let Some(resp) = self.completions.detaches.remove(&link) {
                        let _ = resp.send(Ok(()));
                    }
                    if let Some(resp) = self.completions.attaches.remove(&link) {
                        let _ = resp.send(Err(Error::Detached(error.clone())));
                    }
                    if let Some(resp) = self.completions.drains.remove(&link) {
                        let _ = resp.send(Err(Error::Detached(error.clone())));
                    }
                    self.completions
                        .sends
                        .retain(|(send_link, _), _| *send_link != link);
                    // dropping the channel ends the receiver's recv stream
                    self.completions.receivers.remove(&link);
                }
                Event::LinkFlow { .. } => {}
                Event::Drained { link } => {
                    if let Some(resp) = self.completions.drains.remove(&link) {
                        let _ = resp.send(Ok(()));
                    }
                }
                Event::TransferSent {
                    link,
                    delivery_id: _,
                    tag,
                    settled,
                } => {
                    if settled {
                        if let Some(resp) = self.completions.sends.remove(&(link, tag)) {
                            let _ = resp.send(Ok(None));
                        }
                    }
                }
                Event::Delivery { link, delivery } => {
                    if let Some(deliveries) = self.completions.receivers.get(&link) {
                        let _ = deliveries.send(Ok(delivery));
                    }
                }
                Event::DeliveryAborted { link, .. } => {
                    if let Some(deliveries) = self.completions.receivers.get(&link) {
                        let _ = deliveries.send(Err(Error::DeliveryAborted));
                    }
                }
                Event::Disposition {
                    link,
                    role,
                    tag,
                    state,
                    settled,
                    ..
                } => {
                    // the remote receiver reporting on a delivery we sent
                    if role == Role::Receiver {
                        let terminal =
                            state.as_ref().map_or(false, DeliveryState::is_terminal);
                        if settled || terminal {
                            if let Some(resp) = self.completions.sends.remove(&(link, tag)) {
                                let _ = resp.send(Ok(state));
                            }
                        }
                    }
                }
                Event::Failed { description } => {
                    self.completions
                        .fail_all(|| Error::EngineFailed(description.clone()));
                }
            }
        }
    }

    /// Completions scoped to a dead session can never resolve
    fn fail_session_scope(&mut self, session: SessionId, error: &Option<definitions::Error>) {
        let scoped = |link: &LinkId| link.session_id() == session;
        let make_error = || Error::SessionEnded(error.clone());

        let dead: Vec<_> = self
            .completions
            .attaches
            .keys()
            .copied()
            .filter(scoped)
            .collect();
        for link in dead {
            if let Some(resp) = self.completions.attaches.remove(&link) {
                let _ = resp.send(Err(make_error()));
            }
        }
        let dead: Vec<_> = self
            .completions
            .detaches
            .keys()
            .copied()
            .filter(scoped)
            .collect();
        for link in dead {
            if let Some(resp) = self.completions.detaches.remove(&link) {
                let _ = resp.send(Err(make_error()));
            }
        }
        let dead: Vec<_> = self
            .completions
            .sends
            .keys()
            .filter(|(link, _)| scoped(link))
            .cloned()
            .collect();
        for key in dead {
            if let Some(resp) = self.completions.sends.remove(&key) {
                let _ = resp.send(Err(make_error()));
            }
        }
        let dead: Vec<_> = self
            .completions
            .drains
            .keys()
            .copied()
            .filter(scoped)
            .collect();
        for link in dead {
            if let Some(resp) = self.completions.drains.remove(&link) {
                let _ = resp.send(Err(make_error()));
            }
        }
        self.completions
            .receivers
            .retain(|link, _| !scoped(link));
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => {
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await
        }
        None => std::future::pending().await,
    }
}
