//! Per-link state: credit, settlement modes and in-flight deliveries

use std::collections::VecDeque;

use siderite_codec::buffer::CompositeBuffer;
use siderite_codec::primitives::OrderedMap;
use siderite_codec::value::Value;
use siderite_types::definitions::{
    DeliveryNumber, DeliveryTag, Fields, Handle, MessageFormat, ReceiverSettleMode, Role,
    SenderSettleMode, SequenceNo,
};
use siderite_types::messaging::{DeliveryState, Source, Target};

use crate::Payload;

/// Link endpoint states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkState {
    Detached,
    AttachSent,
    Attached,
    DetachSent,
}

/// Options for attaching a link
#[derive(Debug)]
pub struct LinkOptions {
    pub name: String,
    pub role: Role,
    pub snd_settle_mode: SenderSettleMode,
    pub rcv_settle_mode: ReceiverSettleMode,
    pub source: Option<Source>,
    pub target: Option<Target>,
    /// Receiver credit auto-replenishment target; zero disables it
    pub credit_window: u32,
    /// Send an accepted disposition as soon as a delivery completes
    pub auto_accept: bool,
    /// Settle in the same disposition that acknowledges
    pub auto_settle: bool,
    /// Unsettled delivery map carried on re-attach for resumption
    pub unsettled: Option<OrderedMap<Value, Value>>,
    pub properties: Option<Fields>,
}

impl LinkOptions {
    pub fn sender(name: impl Into<String>) -> Self {
        Self::new(name, Role::Sender)
    }

    pub fn receiver(name: impl Into<String>) -> Self {
        Self::new(name, Role::Receiver)
    }

    fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
            snd_settle_mode: SenderSettleMode::default(),
            rcv_settle_mode: ReceiverSettleMode::default(),
            source: None,
            target: None,
            credit_window: 0,
            auto_accept: false,
            auto_settle: true,
            unsettled: None,
            properties: None,
        }
    }

    pub fn source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    pub fn target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    pub fn snd_settle_mode(mut self, mode: SenderSettleMode) -> Self {
        self.snd_settle_mode = mode;
        self
    }

    pub fn rcv_settle_mode(mut self, mode: ReceiverSettleMode) -> Self {
        self.rcv_settle_mode = mode;
        self
    }

    pub fn credit_window(mut self, window: u32) -> Self {
        self.credit_window = window;
        self
    }

    pub fn auto_accept(mut self, auto_accept: bool) -> Self {
        self.auto_accept = auto_accept;
        self
    }

    pub fn auto_settle(mut self, auto_settle: bool) -> Self {
        self.auto_settle = auto_settle;
        self
    }

    pub fn unsettled(mut self, unsettled: OrderedMap<Value, Value>) -> Self {
        self.unsettled = Some(unsettled);
        self
    }
}

/// An outbound delivery queued on a sender link; `offset` tracks how much of
/// the payload already left in earlier frames when a session window stalled
/// the delivery mid-flight
#[derive(Debug)]
pub(crate) struct PendingSend {
    pub tag: DeliveryTag,
    pub payload: Payload,
    pub offset: usize,
    pub delivery_id: Option<DeliveryNumber>,
    pub settled: bool,
    pub message_format: MessageFormat,
    pub state: Option<DeliveryState>,
    pub resume: bool,
}

/// An inbound delivery still spanning frames; payload fragments accumulate
/// as constituents of a composite buffer until `more=false` or an abort
#[derive(Debug)]
pub(crate) struct IncompleteDelivery {
    pub delivery_id: DeliveryNumber,
    pub tag: DeliveryTag,
    pub message_format: MessageFormat,
    pub settled: bool,
    pub payload: CompositeBuffer,
}

#[derive(Debug)]
pub(crate) struct Link {
    pub name: String,
    pub role: Role,
    pub state: LinkState,
    pub snd_settle_mode: SenderSettleMode,
    pub rcv_settle_mode: ReceiverSettleMode,
    pub source: Option<Source>,
    pub target: Option<Target>,

    /// Handle we chose (the slab key)
    pub output_handle: Handle,
    /// Handle the remote chose, learned from its attach
    pub input_handle: Option<Handle>,

    /// Sender: completed deliveries; receiver: the sender's count as tracked
    pub delivery_count: SequenceNo,
    /// Sender: credit granted to us; receiver: credit we granted
    pub credit: u32,
    pub available: u32,
    /// Sender: the peer asked us to drain; receiver: we asked the peer
    pub drain: bool,

    pub credit_window: u32,
    pub auto_accept: bool,
    pub auto_settle: bool,

    pub incomplete: Option<IncompleteDelivery>,
    pub pending: VecDeque<PendingSend>,

    /// A link-detached event already went out, e.g. when the link failed
    /// locally; the peer's detach echo must not raise a second one
    pub detach_notified: bool,
}

impl Link {
    pub(crate) fn new(options: LinkOptions, output_handle: Handle) -> Self {
        Self {
            name: options.name,
            role: options.role,
            state: LinkState::Detached,
            snd_settle_mode: options.snd_settle_mode,
            rcv_settle_mode: options.rcv_settle_mode,
            source: options.source,
            target: options.target,
            output_handle,
            input_handle: None,
            delivery_count: 0,
            credit: 0,
            available: 0,
            drain: false,
            credit_window: options.credit_window,
            auto_accept: options.auto_accept,
            auto_settle: options.auto_settle,
            incomplete: None,
            pending: VecDeque::new(),
            detach_notified: false,
        }
    }

    /// Whether a sender decides per delivery, or the mode forces settlement
    pub(crate) fn effective_settled(&self, requested: Option<bool>) -> bool {
        match self.snd_settle_mode {
            SenderSettleMode::Settled => true,
            SenderSettleMode::Unsettled => false,
            SenderSettleMode::Mixed => requested.unwrap_or(false),
        }
    }
}
