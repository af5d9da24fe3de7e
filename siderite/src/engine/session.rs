//! Per-session state: flow-control windows, handle tables and delivery
//! bookkeeping
//!
//! Handlers mutate the session and return the frame bodies to emit on the
//! session's channel; the engine owns encoding and channel routing. Delivery
//! ids are session scoped, so the unsettled maps live here and point back at
//! links by slab index.

use std::collections::{BTreeMap, HashMap, VecDeque};

use slab::Slab;

use siderite_codec::buffer::{Buffer, CompositeBuffer};
use siderite_codec::ser::to_vec;
use siderite_types::definitions::{
    self, AmqpError, DeliveryNumber, DeliveryTag, Handle, LinkError, ReceiverSettleMode, Role,
    SessionError, TransferNumber,
};
use siderite_types::messaging::DeliveryState;
use siderite_types::performatives::{
    Attach, Begin, Detach, Disposition, End, Flow, Performative, Transfer,
};

use crate::frames::amqp::FrameBody;
use crate::frames::FRAME_HEADER_LEN;
use crate::Payload;

use super::delivery::Delivery;
use super::error::Error;
use super::event::Event;
use super::link::{IncompleteDelivery, Link, LinkOptions, LinkState, PendingSend};
use super::LinkId;

/// Session endpoint states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
    Unmapped,
    BeginSent,
    Mapped,
    EndSent,
    Ended,
}

/// Options for beginning a session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub incoming_window: u32,
    pub outgoing_window: u32,
    pub handle_max: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            incoming_window: 2048,
            outgoing_window: 2048,
            handle_max: u32::MAX,
        }
    }
}

/// Options for one outbound delivery
#[derive(Debug, Default)]
pub struct SendOptions {
    /// Per-delivery settlement wish, meaningful in mixed mode
    pub settled: Option<bool>,
    pub message_format: u32,
    pub state: Option<DeliveryState>,
    /// Reclaim an unsettled delivery by tag after re-attach
    pub resume: bool,
}

#[derive(Debug)]
pub(crate) struct OutgoingDelivery {
    pub link: usize,
    pub tag: DeliveryTag,
    pub state: Option<DeliveryState>,
}

#[derive(Debug)]
pub(crate) struct IncomingDelivery {
    pub link: usize,
    pub tag: DeliveryTag,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PendingDisposition {
    pub role: Role,
    pub delivery_id: DeliveryNumber,
    pub settled: bool,
    pub state: Option<DeliveryState>,
}

#[derive(Debug)]
pub(crate) struct Session {
    pub state: SessionState,
    pub outgoing_channel: u16,
    pub incoming_channel: Option<u16>,

    // local flow control
    pub next_outgoing_id: TransferNumber,
    pub incoming_window: u32,
    pub initial_incoming_window: u32,
    pub outgoing_window: u32,
    pub handle_max: u32,

    // remote flow control, learned from begin and flow
    pub next_incoming_id: TransferNumber,
    pub remote_incoming_window: u32,
    pub remote_outgoing_window: u32,

    pub next_outgoing_delivery_id: DeliveryNumber,

    pub links: Slab<Link>,
    pub links_by_input_handle: HashMap<u32, usize>,
    pub links_by_name: HashMap<String, usize>,

    pub outgoing_unsettled: BTreeMap<DeliveryNumber, OutgoingDelivery>,
    pub incoming_unsettled: BTreeMap<DeliveryNumber, IncomingDelivery>,

    pub pending_dispositions: Vec<PendingDisposition>,

    /// A session-ended event already went out, e.g. when the session failed
    pub ended_notified: bool,
}

impl Session {
    pub(crate) fn new(outgoing_channel: u16, options: &SessionOptions) -> Self {
        Self {
            state: SessionState::Unmapped,
            outgoing_channel,
            incoming_channel: None,
            next_outgoing_id: 0,
            incoming_window: options.incoming_window,
            initial_incoming_window: options.incoming_window,
            outgoing_window: options.outgoing_window,
            handle_max: options.handle_max,
            next_incoming_id: 0,
            remote_incoming_window: 0,
            remote_outgoing_window: 0,
            next_outgoing_delivery_id: 0,
            links: Slab::new(),
            links_by_input_handle: HashMap::new(),
            links_by_name: HashMap::new(),
            outgoing_unsettled: BTreeMap::new(),
            incoming_unsettled: BTreeMap::new(),
            pending_dispositions: Vec::new(),
            ended_notified: false,
        }
    }

    pub(crate) fn begin_body(&self) -> Begin {
        Begin {
            remote_channel: None,
            next_outgoing_id: self.next_outgoing_id,
            incoming_window: self.incoming_window,
            outgoing_window: self.outgoing_window,
            handle_max: Handle(self.handle_max),
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        }
    }

    pub(crate) fn on_incoming_begin(
        &mut self,
        incoming_channel: u16,
        begin: &Begin,
    ) -> Result<(), Error> {
        match self.state {
            SessionState::BeginSent => self.state = SessionState::Mapped,
            _ => return Err(Error::illegal_state("incoming begin")),
        }
        self.incoming_channel = Some(incoming_channel);
        self.next_incoming_id = begin.next_outgoing_id;
        self.remote_incoming_window = begin.incoming_window;
        self.remote_outgoing_window = begin.outgoing_window;
        Ok(())
    }

    pub(crate) fn end_body(&mut self, error: Option<definitions::Error>) -> End {
        self.state = SessionState::EndSent;
        End { error }
    }

    /* ------------------------------- links ------------------------------- */

    pub(crate) fn attach(
        &mut self,
        mut options: LinkOptions,
    ) -> Result<(usize, FrameBody), Error> {
        if self.state != SessionState::Mapped {
            return Err(Error::illegal_state("attach"));
        }
        // a name is reusable only once its previous link is fully detached
        // (that is what makes unsettled-delivery resumption possible)
        if let Some(&existing) = self.links_by_name.get(&options.name) {
            if self.links[existing].state != LinkState::Detached {
                return Err(Error::DuplicateLinkName);
            }
            self.links.remove(existing);
            self.links_by_name.remove(&options.name);
        }
        let entry = self.links.vacant_entry();
        let handle = entry.key() as u32;
        if handle > self.handle_max {
            return Err(Error::ResourceExhausted("handle-max"));
        }

        let unsettled = options.unsettled.take();
        let properties = options.properties.take();
        let mut link = Link::new(options, Handle(handle));
        link.state = LinkState::AttachSent;
        let attach = Attach {
            name: link.name.clone(),
            handle: link.output_handle,
            role: link.role,
            snd_settle_mode: link.snd_settle_mode,
            rcv_settle_mode: link.rcv_settle_mode,
            source: link.source.clone(),
            target: link.target.clone(),
            unsettled,
            incomplete_unsettled: false,
            initial_delivery_count: link.role.is_sender().then_some(link.delivery_count),
            max_message_size: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties,
        };
        let name = link.name.clone();
        let index = entry.key();
        entry.insert(link);
        self.links_by_name.insert(name, index);
        Ok((index, FrameBody::Attach(attach)))
    }

    pub(crate) fn on_incoming_attach(
        &mut self,
        session_index: usize,
        attach: Attach,
        events: &mut VecDeque<Event>,
    ) -> Result<Vec<FrameBody>, Error> {
        let index = match self.links_by_name.get(&attach.name) {
            Some(index) => *index,
            None => {
                // peer-initiated links are a server concern
                return Err(Error::protocol(
                    SessionError::UnattachedHandle,
                    format!("attach for unknown link name `{}`", attach.name),
                ));
            }
        };
        let input_handle = attach.handle.0;
        if self
            .links_by_input_handle
            .insert(input_handle, index)
            .is_some()
        {
            return Err(Error::protocol(
                SessionError::HandleInUse,
                format!("remote handle {input_handle} is already attached"),
            ));
        }

        let link = &mut self.links[index];
        if link.state != LinkState::AttachSent {
            return Err(Error::illegal_state("incoming attach"));
        }
        link.state = LinkState::Attached;
        link.input_handle = Some(attach.handle);
        // the peer's terminus answers ours; for dynamic nodes it carries the
        // generated address
        if link.role.is_receiver() {
            link.source = attach.source.clone();
            link.delivery_count = attach.initial_delivery_count.unwrap_or(0);
        } else {
            link.target = attach.target.clone();
        }
        let grant_initial_credit = link.role.is_receiver() && link.credit_window > 0;
        if grant_initial_credit {
            link.credit = link.credit_window;
        }

        events.push_back(Event::LinkAttached {
            link: LinkId {
                session: session_index,
                link: index,
            },
        });

        let mut out = Vec::new();
        if grant_initial_credit {
            out.push(FrameBody::Flow(self.link_flow_body(index, false)));
        }
        Ok(out)
    }

    pub(crate) fn detach(
        &mut self,
        link_index: usize,
        closed: bool,
        error: Option<definitions::Error>,
    ) -> Result<FrameBody, Error> {
        let link = self.links.get_mut(link_index).ok_or(Error::UnknownLink)?;
        if link.state != LinkState::Attached {
            return Err(Error::illegal_state("detach"));
        }
        link.state = LinkState::DetachSent;
        Ok(FrameBody::Detach(Detach {
            handle: link.output_handle,
            closed,
            error,
        }))
    }

    pub(crate) fn on_incoming_detach(
        &mut self,
        session_index: usize,
        detach: Detach,
        events: &mut VecDeque<Event>,
    ) -> Result<Vec<FrameBody>, Error> {
        let index = self.link_by_input_handle(detach.handle)?;
        let mut out = Vec::new();
        let link = &mut self.links[index];
        match link.state {
            LinkState::DetachSent => {}
            LinkState::Attached => {
                // answer a remote-initiated detach in kind
                out.push(FrameBody::Detach(Detach {
                    handle: link.output_handle,
                    closed: detach.closed,
                    error: None,
                }));
            }
            _ => return Err(Error::illegal_state("incoming detach")),
        }
        let already_notified = link.detach_notified;
        link.state = LinkState::Detached;
        link.incomplete = None;
        self.links_by_input_handle.remove(&detach.handle.0);

        if !already_notified {
            events.push_back(Event::LinkDetached {
                link: LinkId {
                    session: session_index,
                    link: index,
                },
                closed: detach.closed,
                error: detach.error,
            });
        }

        if detach.closed {
            // a closed link forgets its name and unsettled deliveries
            let name = self.links[index].name.clone();
            self.links_by_name.remove(&name);
            self.outgoing_unsettled.retain(|_, d| d.link != index);
            self.incoming_unsettled.retain(|_, d| d.link != index);
            self.links.remove(index);
        }
        Ok(out)
    }

    fn link_by_input_handle(&self, handle: Handle) -> Result<usize, Error> {
        self.links_by_input_handle
            .get(&handle.0)
            .copied()
            .ok_or_else(|| {
                Error::protocol(
                    SessionError::UnattachedHandle,
                    format!("no attached link with remote handle {}", handle.0),
                )
            })
    }

    /* ---------------------------- flow control ---------------------------- */

    /// A session-level flow body carrying the current window state
    pub(crate) fn session_flow_body(&self) -> Flow {
        Flow {
            next_incoming_id: Some(self.next_incoming_id),
            incoming_window: self.incoming_window,
            next_outgoing_id: self.next_outgoing_id,
            outgoing_window: self.outgoing_window,
            ..Default::default()
        }
    }

    /// A link-level flow body for the given link
    pub(crate) fn link_flow_body(&self, link_index: usize, drain: bool) -> Flow {
        let link = &self.links[link_index];
        Flow {
            handle: Some(link.output_handle),
            delivery_count: Some(link.delivery_count),
            link_credit: Some(link.credit),
            available: Some(link.available),
            drain,
            ..self.session_flow_body()
        }
    }

    /// Replenishes the local incoming window once half of it is consumed
    pub(crate) fn maybe_replenish_window(&mut self) -> Option<FrameBody> {
        if self.state == SessionState::Mapped
            && self.incoming_window < self.initial_incoming_window / 2
        {
            self.incoming_window = self.initial_incoming_window;
            Some(FrameBody::Flow(self.session_flow_body()))
        } else {
            None
        }
    }

    pub(crate) fn on_incoming_flow(
        &mut self,
        session_index: usize,
        flow: Flow,
        max_frame_size: usize,
        events: &mut VecDeque<Event>,
    ) -> Result<Vec<FrameBody>, Error> {
        if self.state != SessionState::Mapped {
            return Err(Error::illegal_state("incoming flow"));
        }

        // session half: our view of the remote windows
        self.next_incoming_id = flow.next_outgoing_id;
        self.remote_outgoing_window = flow.outgoing_window;
        self.remote_incoming_window = match flow.next_incoming_id {
            Some(next_incoming_id) => next_incoming_id
                .wrapping_add(flow.incoming_window)
                .wrapping_sub(self.next_outgoing_id),
            None => flow.incoming_window,
        };

        let mut out = Vec::new();
        if let Some(handle) = flow.handle {
            let index = self.link_by_input_handle(handle)?;
            let link_id = LinkId {
                session: session_index,
                link: index,
            };
            let link = &mut self.links[index];
            match link.role {
                Role::Sender => {
                    // the receiver's flow grants us credit; an absent
                    // delivery-count means its view matches ours
                    let delivery_limit = flow
                        .delivery_count
                        .unwrap_or(link.delivery_count)
                        .wrapping_add(flow.link_credit.unwrap_or(0));
                    link.credit = delivery_limit.wrapping_sub(link.delivery_count);
                    link.drain = flow.drain;
                    events.push_back(Event::LinkFlow { link: link_id });

                    out.extend(self.try_send(session_index, index, max_frame_size, events)?);

                    let link = &mut self.links[index];
                    if link.drain && link.credit > 0 && link.pending.is_empty() {
                        // consume the rest of the credit as drain demands
                        link.delivery_count = link.delivery_count.wrapping_add(link.credit);
                        link.credit = 0;
                        link.drain = false;
                        out.push(FrameBody::Flow(self.link_flow_body(index, true)));
                    } else if flow.echo {
                        out.push(FrameBody::Flow(self.link_flow_body(index, false)));
                    }
                }
                Role::Receiver => {
                    // the sender reports its progress; drain responses
                    // advance delivery-count without transfers
                    if let Some(delivery_count) = flow.delivery_count {
                        let consumed = delivery_count.wrapping_sub(link.delivery_count);
                        link.credit = link.credit.saturating_sub(consumed);
                        link.delivery_count = delivery_count;
                    }
                    link.available = flow.available.unwrap_or(link.available);
                    if link.drain && link.credit == 0 {
                        link.drain = false;
                        events.push_back(Event::Drained { link: link_id });
                    }
                    if flow.echo {
                        out.push(FrameBody::Flow(self.link_flow_body(index, false)));
                    }
                }
            }
        } else if flow.echo {
            out.push(FrameBody::Flow(self.session_flow_body()));
        }
        Ok(out)
    }

    /// Asks the sender to use up or return the outstanding credit
    pub(crate) fn drain_link(
        &mut self,
        session_index: usize,
        link_index: usize,
        events: &mut VecDeque<Event>,
    ) -> Result<Vec<FrameBody>, Error> {
        let link = self.links.get_mut(link_index).ok_or(Error::UnknownLink)?;
        if link.state != LinkState::Attached || !link.role.is_receiver() {
            return Err(Error::illegal_state("drain"));
        }
        if link.credit == 0 {
            // nothing outstanding; the cycle completes on the spot
            events.push_back(Event::Drained {
                link: LinkId {
                    session: session_index,
                    link: link_index,
                },
            });
            return Ok(Vec::new());
        }
        link.drain = true;
        Ok(vec![FrameBody::Flow(self.link_flow_body(link_index, true))])
    }

    /// Grants credit on a receiver link, optionally draining
    pub(crate) fn flow_credit(
        &mut self,
        link_index: usize,
        credit: u32,
        drain: bool,
        echo: bool,
    ) -> Result<Vec<FrameBody>, Error> {
        let link = self.links.get_mut(link_index).ok_or(Error::UnknownLink)?;
        if link.state != LinkState::Attached || !link.role.is_receiver() {
            return Err(Error::illegal_state("flow credit"));
        }
        link.credit = credit;
        link.drain = drain;
        let mut body = self.link_flow_body(link_index, drain);
        body.echo = echo;
        Ok(vec![FrameBody::Flow(body)])
    }

    /* ------------------------------ transfers ----------------------------- */

    /// Queues a delivery on a sender link and sends as far as credit and the
    /// remote incoming window allow
    pub(crate) fn send(
        &mut self,
        session_index: usize,
        link_index: usize,
        tag: DeliveryTag,
        payload: Payload,
        options: SendOptions,
        max_frame_size: usize,
        events: &mut VecDeque<Event>,
    ) -> Result<Vec<FrameBody>, Error> {
        let link = self.links.get_mut(link_index).ok_or(Error::UnknownLink)?;
        if link.state != LinkState::Attached || !link.role.is_sender() {
            return Err(Error::illegal_state("send"));
        }
        let settled = link.effective_settled(options.settled);
        link.pending.push_back(PendingSend {
            tag,
            payload,
            offset: 0,
            delivery_id: None,
            settled,
            message_format: options.message_format,
            state: options.state,
            resume: options.resume,
        });
        self.try_send(session_index, link_index, max_frame_size, events)
    }

    /// Emits transfers for queued deliveries while flow control allows;
    /// called from `send` and whenever an incoming flow moves a window
    fn try_send(
        &mut self,
        session_index: usize,
        link_index: usize,
        max_frame_size: usize,
        events: &mut VecDeque<Event>,
    ) -> Result<Vec<FrameBody>, Error> {
        let mut out = Vec::new();
        loop {
            let link = &mut self.links[link_index];
            if link.pending.is_empty() || link.credit == 0 || self.remote_incoming_window == 0 {
                break;
            }
            let pending = link.pending.front_mut().expect("non-empty queue");
            let delivery_id = match pending.delivery_id {
                Some(id) => id,
                None => {
                    let id = self.next_outgoing_delivery_id;
                    self.next_outgoing_delivery_id = id.wrapping_add(1);
                    pending.delivery_id = Some(id);
                    id
                }
            };

            // emit frames for this delivery until it completes or the
            // session window stalls it
            let mut completed = false;
            while self.remote_incoming_window > 0 {
                let link = &mut self.links[link_index];
                let pending = link.pending.front_mut().expect("non-empty queue");
                let first_frame = pending.offset == 0;
                let mut transfer = Transfer {
                    handle: link.output_handle,
                    delivery_id: Some(delivery_id),
                    more: true,
                    ..Default::default()
                };
                if first_frame {
                    transfer.delivery_tag = Some(pending.tag.clone());
                    transfer.message_format = Some(pending.message_format);
                    transfer.settled = Some(pending.settled);
                    transfer.state = pending.state.clone();
                    transfer.resume = pending.resume;
                }

                // measure the performative in its larger (`more=true`) form
                let probe = to_vec(&Performative::Transfer(transfer.clone()).into_value())
                    .map_err(crate::frames::Error::from)?;
                let headroom = max_frame_size.saturating_sub(FRAME_HEADER_LEN + probe.len());
                if headroom == 0 {
                    return Err(Error::ResourceExhausted("negotiated frame size"));
                }

                let remaining = pending.payload.len() - pending.offset;
                let chunk = remaining.min(headroom);
                let more = chunk < remaining;
                transfer.more = more;
                let payload = pending
                    .payload
                    .slice(pending.offset..pending.offset + chunk);
                pending.offset += chunk;

                self.next_outgoing_id = self.next_outgoing_id.wrapping_add(1);
                self.remote_incoming_window -= 1;
                out.push(FrameBody::Transfer {
                    performative: transfer,
                    payload,
                });

                if !more {
                    completed = true;
                    break;
                }
            }

            if !completed {
                // stalled mid-delivery; resume when the window reopens
                break;
            }

            let link = &mut self.links[link_index];
            let pending = link.pending.pop_front().expect("non-empty queue");
            link.delivery_count = link.delivery_count.wrapping_add(1);
            link.credit -= 1;
            if !pending.settled {
                self.outgoing_unsettled.insert(
                    delivery_id,
                    OutgoingDelivery {
                        link: link_index,
                        tag: pending.tag.clone(),
                        state: pending.state.clone(),
                    },
                );
            }
            events.push_back(Event::TransferSent {
                link: LinkId {
                    session: session_index,
                    link: link_index,
                },
                delivery_id,
                tag: pending.tag,
                settled: pending.settled,
            });
        }
        Ok(out)
    }

    pub(crate) fn on_incoming_transfer(
        &mut self,
        session_index: usize,
        transfer: Transfer,
        payload: Payload,
        events: &mut VecDeque<Event>,
    ) -> Result<Vec<FrameBody>, Error> {
        if self.state != SessionState::Mapped {
            return Err(Error::illegal_state("incoming transfer"));
        }
        if self.incoming_window == 0 {
            // the peer ignored our window
            return Err(Error::protocol(
                SessionError::WindowViolation,
                "transfer received with an exhausted incoming window",
            ));
        }
        self.incoming_window -= 1;
        self.next_incoming_id = self.next_incoming_id.wrapping_add(1);

        let index = self.link_by_input_handle(transfer.handle)?;
        let link_id = LinkId {
            session: session_index,
            link: index,
        };
        let link = &mut self.links[index];
        if link.state == LinkState::DetachSent {
            // the peer raced frames against our detach; drop them until it
            // answers
            return Ok(Vec::new());
        }
        if link.state != LinkState::Attached || !link.role.is_receiver() {
            return Err(Error::protocol(
                SessionError::UnattachedHandle,
                "transfer on a handle that is not an attached receiver",
            ));
        }

        match &mut link.incomplete {
            Some(incomplete) => {
                // continuation frames may omit the delivery-id
                if let Some(delivery_id) = transfer.delivery_id {
                    if delivery_id != incomplete.delivery_id {
                        return Err(Error::protocol(
                            AmqpError::NotAllowed,
                            "interleaved transfers for distinct deliveries on one link",
                        ));
                    }
                }
                if !payload.is_empty() {
                    incomplete
                        .payload
                        .append(Buffer::wrap(payload.to_vec()))
                        .map_err(|_| {
                            Error::protocol(AmqpError::InternalError, "payload reassembly failed")
                        })?;
                }
                if transfer.settled == Some(true) {
                    incomplete.settled = true;
                }
            }
            None => {
                let delivery_id = transfer.delivery_id.ok_or_else(|| {
                    Error::protocol(
                        AmqpError::InvalidField,
                        "first transfer of a delivery without a delivery-id",
                    )
                })?;
                if link.credit == 0 {
                    // more deliveries in flight than we ever granted; the
                    // link, not the session, is at fault
                    return Err(Error::LinkProtocol {
                        link: index,
                        error: definitions::Error::new(
                            LinkError::TransferLimitExceeded,
                            "transfer received without link credit",
                        ),
                    });
                }
                let mut composite = CompositeBuffer::new();
                if !payload.is_empty() {
                    composite.append(Buffer::wrap(payload.to_vec())).map_err(|_| {
                        Error::protocol(AmqpError::InternalError, "payload reassembly failed")
                    })?;
                }
                link.incomplete = Some(IncompleteDelivery {
                    delivery_id,
                    tag: transfer.delivery_tag.clone().unwrap_or_default(),
                    message_format: transfer.message_format.unwrap_or(0),
                    settled: transfer.settled.unwrap_or(false),
                    payload: composite,
                });
            }
        }

        let mut out = Vec::new();
        if transfer.aborted {
            // the delivery never happened: drop the payload, settle quietly
            let incomplete = link.incomplete.take().expect("delivery in progress");
            link.credit = link.credit.saturating_sub(1);
            link.delivery_count = link.delivery_count.wrapping_add(1);
            events.push_back(Event::DeliveryAborted {
                link: link_id,
                delivery_id: incomplete.delivery_id,
            });
            out.extend(self.replenish_credit(index));
        } else if !transfer.more {
            let mut incomplete = link.incomplete.take().expect("delivery in progress");
            link.credit = link.credit.saturating_sub(1);
            link.delivery_count = link.delivery_count.wrapping_add(1);
            let settled = incomplete.settled;
            let delivery = Delivery {
                delivery_id: incomplete.delivery_id,
                delivery_tag: incomplete.tag.clone(),
                message_format: incomplete.message_format,
                payload: incomplete.payload.copy_to_bytes(),
                settled,
            };
            if !settled {
                self.incoming_unsettled.insert(
                    delivery.delivery_id,
                    IncomingDelivery {
                        link: index,
                        tag: delivery.delivery_tag.clone(),
                    },
                );
            }
            let delivery_id = delivery.delivery_id;
            events.push_back(Event::Delivery {
                link: link_id,
                delivery,
            });

            let link = &self.links[index];
            if link.auto_accept && !settled {
                let settle_now =
                    link.auto_settle && link.rcv_settle_mode == ReceiverSettleMode::First;
                self.dispose(Role::Receiver, delivery_id, DeliveryState::accepted(), settle_now)?;
            }
            let link = &mut self.links[index];
            if link.drain && link.credit == 0 {
                link.drain = false;
                events.push_back(Event::Drained { link: link_id });
            }
            out.extend(self.replenish_credit(index));
        }
        Ok(out)
    }

    /// Tops receiver credit back up to the configured window
    fn replenish_credit(&mut self, link_index: usize) -> Option<FrameBody> {
        let link = &mut self.links[link_index];
        if link.drain || link.credit_window == 0 || link.credit >= link.credit_window {
            return None;
        }
        link.credit = link.credit_window;
        Some(FrameBody::Flow(self.link_flow_body(link_index, false)))
    }

    /* ----------------------------- disposition ---------------------------- */

    /// Records local delivery state; emitted coalesced at flush time
    pub(crate) fn dispose(
        &mut self,
        role: Role,
        delivery_id: DeliveryNumber,
        state: DeliveryState,
        settled: bool,
    ) -> Result<(), Error> {
        match role {
            Role::Receiver => {
                if settled {
                    self.incoming_unsettled.remove(&delivery_id);
                }
            }
            Role::Sender => {
                if settled {
                    self.outgoing_unsettled.remove(&delivery_id);
                }
            }
        }
        self.pending_dispositions.push(PendingDisposition {
            role,
            delivery_id,
            settled,
            state: Some(state),
        });
        Ok(())
    }

    /// Coalesces queued dispositions into `(first, last)` ranges; adjacent
    /// ids with identical settled flag and state merge into one frame
    pub(crate) fn flush_dispositions(&mut self) -> Vec<FrameBody> {
        let mut out = Vec::new();
        let pending = std::mem::take(&mut self.pending_dispositions);
        let mut run: Option<(PendingDisposition, DeliveryNumber)> = None;

        for disposition in pending {
            let id = disposition.delivery_id;
            run = match run {
                Some((head, last))
                    if head.role == disposition.role
                        && head.settled == disposition.settled
                        && head.state == disposition.state
                        && id == last.wrapping_add(1) =>
                {
                    Some((head, id))
                }
                Some((head, last)) => {
                    out.push(Self::disposition_body(head, last));
                    Some((disposition, id))
                }
                None => Some((disposition, id)),
            };
        }
        if let Some((head, last)) = run {
            out.push(Self::disposition_body(head, last));
        }
        out
    }

    fn disposition_body(head: PendingDisposition, last: DeliveryNumber) -> FrameBody {
        FrameBody::Disposition(Disposition {
            role: head.role,
            first: head.delivery_id,
            last: (last != head.delivery_id).then_some(last),
            settled: head.settled,
            state: head.state,
            batchable: false,
        })
    }

    pub(crate) fn on_incoming_disposition(
        &mut self,
        session_index: usize,
        disposition: Disposition,
        events: &mut VecDeque<Event>,
    ) -> Result<Vec<FrameBody>, Error> {
        let first = disposition.first;
        let last = disposition.last.unwrap_or(first);
        if last < first {
            return Err(Error::protocol(
                AmqpError::InvalidField,
                "disposition with first > last",
            ));
        }

        // a cumulative disposition may legally span billions of ids; only
        // the unsettled entries inside the range carry any state, so walk
        // the sparse maps instead of the id range
        match disposition.role {
            // the remote receiver reports on deliveries we sent
            Role::Receiver => {
                let in_range: Vec<DeliveryNumber> = self
                    .outgoing_unsettled
                    .range(first..=last)
                    .map(|(delivery_id, _)| *delivery_id)
                    .collect();
                for delivery_id in in_range {
                    let Some(entry) = self.outgoing_unsettled.get_mut(&delivery_id) else {
                        continue;
                    };
                    entry.state = disposition.state.clone();
                    let link_index = entry.link;
                    let tag = entry.tag.clone();
                    if disposition.settled {
                        self.outgoing_unsettled.remove(&delivery_id);
                    }
                    events.push_back(Event::Disposition {
                        link: LinkId {
                            session: session_index,
                            link: link_index,
                        },
                        role: Role::Receiver,
                        delivery_id,
                        tag,
                        state: disposition.state.clone(),
                        settled: disposition.settled,
                    });

                    // in second mode the receiver waits for us to settle
                    let link = &self.links[link_index];
                    if !disposition.settled
                        && link.rcv_settle_mode == ReceiverSettleMode::Second
                        && disposition
                            .state
                            .as_ref()
                            .map_or(false, DeliveryState::is_terminal)
                    {
                        let state = disposition.state.clone().expect("terminal state");
                        self.dispose(Role::Sender, delivery_id, state, true)?;
                    }
                }
            }
            // the remote sender reports on deliveries we received
            Role::Sender => {
                let in_range: Vec<DeliveryNumber> = self
                    .incoming_unsettled
                    .range(first..=last)
                    .map(|(delivery_id, _)| *delivery_id)
                    .collect();
                for delivery_id in in_range {
                    let Some(entry) = self.incoming_unsettled.get(&delivery_id) else {
                        continue;
                    };
                    let link_index = entry.link;
                    let tag = entry.tag.clone();
                    if disposition.settled {
                        self.incoming_unsettled.remove(&delivery_id);
                    }
                    events.push_back(Event::Disposition {
                        link: LinkId {
                            session: session_index,
                            link: link_index,
                        },
                        role: Role::Sender,
                        delivery_id,
                        tag,
                        state: disposition.state.clone(),
                        settled: disposition.settled,
                    });
                }
            }
        }
        Ok(Vec::new())
    }

    /// Detaches one link with an error after a link-scoped protocol
    /// violation; the session stays mapped
    pub(crate) fn fail_link(
        &mut self,
        session_index: usize,
        link_index: usize,
        error: definitions::Error,
        events: &mut VecDeque<Event>,
    ) -> Vec<FrameBody> {
        let link = &mut self.links[link_index];
        link.state = LinkState::DetachSent;
        link.incomplete = None;
        link.detach_notified = true;
        events.push_back(Event::LinkDetached {
            link: LinkId {
                session: session_index,
                link: link_index,
            },
            closed: true,
            error: Some(error.clone()),
        });
        vec![FrameBody::Detach(Detach {
            handle: link.output_handle,
            closed: true,
            error: Some(error),
        })]
    }

    /// Synthetic teardown of every attached link, used when the session or
    /// the whole connection fails
    pub(crate) fn teardown(
        &mut self,
        session_index: usize,
        error: Option<&definitions::Error>,
        events: &mut VecDeque<Event>,
    ) {
        for (index, link) in self.links.iter_mut() {
            if link.state == LinkState::Attached || link.state == LinkState::AttachSent {
                link.state = LinkState::Detached;
                events.push_back(Event::LinkDetached {
                    link: LinkId {
                        session: session_index,
                        link: index,
                    },
                    closed: true,
                    error: error.cloned(),
                });
            }
        }
        self.links_by_input_handle.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use siderite_types::definitions::Role;
    use siderite_types::messaging::DeliveryState;
    use siderite_types::performatives::Disposition;

    use crate::engine::LinkOptions;
    use crate::frames::amqp::FrameBody;

    use super::{OutgoingDelivery, PendingDisposition, Session, SessionOptions};

    fn mapped_session() -> Session {
        let mut session = Session::new(0, &SessionOptions::default());
        session.state = super::SessionState::BeginSent;
        session
            .on_incoming_begin(
                0,
                &siderite_types::performatives::Begin {
                    remote_channel: Some(0),
                    next_outgoing_id: 0,
                    incoming_window: 100,
                    outgoing_window: 100,
                    handle_max: Default::default(),
                    offered_capabilities: None,
                    desired_capabilities: None,
                    properties: None,
                },
            )
            .unwrap();
        session
    }

    #[test]
    fn disposition_coalescing_merges_adjacent_ids() {
        let mut session = mapped_session();
        for id in [3u32, 4, 5, 7] {
            session.pending_dispositions.push(PendingDisposition {
                role: Role::Receiver,
                delivery_id: id,
                settled: true,
                state: Some(DeliveryState::accepted()),
            });
        }
        let frames = session.flush_dispositions();
        assert_eq!(frames.len(), 2);
        match &frames[0] {
            FrameBody::Disposition(d) => {
                assert_eq!(d.first, 3);
                assert_eq!(d.last, Some(5));
            }
            other => panic!("expected disposition, got {}", other.name()),
        }
        match &frames[1] {
            FrameBody::Disposition(d) => {
                assert_eq!(d.first, 7);
                assert_eq!(d.last, None);
            }
            other => panic!("expected disposition, got {}", other.name()),
        }
    }

    #[test]
    fn disposition_range_walks_only_unsettled_entries() {
        let mut session = mapped_session();
        let (link_index, _) = session.attach(LinkOptions::sender("L1")).unwrap();
        for id in [2u32, 5, 9] {
            session.outgoing_unsettled.insert(
                id,
                OutgoingDelivery {
                    link: link_index,
                    tag: vec![id as u8].into(),
                    state: None,
                },
            );
        }

        // a cumulative range over the whole id space settles the three
        // entries without visiting anything else
        let mut events = VecDeque::new();
        session
            .on_incoming_disposition(
                0,
                Disposition {
                    role: Role::Receiver,
                    first: 0,
                    last: Some(u32::MAX),
                    settled: true,
                    state: Some(DeliveryState::accepted()),
                    batchable: false,
                },
                &mut events,
            )
            .unwrap();

        assert!(session.outgoing_unsettled.is_empty());
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn mixed_states_do_not_coalesce() {
        let mut session = mapped_session();
        session.pending_dispositions.push(PendingDisposition {
            role: Role::Receiver,
            delivery_id: 0,
            settled: true,
            state: Some(DeliveryState::accepted()),
        });
        session.pending_dispositions.push(PendingDisposition {
            role: Role::Receiver,
            delivery_id: 1,
            settled: true,
            state: Some(DeliveryState::released()),
        });
        assert_eq!(session.flush_dispositions().len(), 2);
    }
}
