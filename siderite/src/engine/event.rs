//! Events surfaced by the engine to its driver

use siderite_types::definitions::{self, DeliveryNumber, DeliveryTag, Role};
use siderite_types::messaging::DeliveryState;

use super::delivery::Delivery;
use super::{LinkId, SessionId};

/// State changes the driver (or a client layer above it) reacts to
///
/// Events are queued in the order the engine produced them and drained with
/// [`Engine::next_event`](super::Engine::next_event).
#[derive(Debug)]
pub enum Event {
    /// Open was exchanged; the connection is usable
    Opened,

    /// The connection reached its end; with an error when the peer failed it
    Closed { error: Option<definitions::Error> },

    /// Begin was exchanged for this session
    SessionBegun { session: SessionId },

    /// The session ended, remotely or as an echo of a local end
    SessionEnded {
        session: SessionId,
        error: Option<definitions::Error>,
    },

    /// Attach was exchanged for this link
    LinkAttached { link: LinkId },

    /// The link detached
    LinkDetached {
        link: LinkId,
        closed: bool,
        error: Option<definitions::Error>,
    },

    /// Credit or window movement made a sender link able to progress
    LinkFlow { link: LinkId },

    /// A drain cycle completed on a receiver link
    Drained { link: LinkId },

    /// A complete outbound delivery left the engine
    TransferSent {
        link: LinkId,
        delivery_id: DeliveryNumber,
        tag: DeliveryTag,
        settled: bool,
    },

    /// A complete inbound delivery is ready
    Delivery { link: LinkId, delivery: Delivery },

    /// The remote aborted an in-progress delivery; its payload is discarded
    DeliveryAborted {
        link: LinkId,
        delivery_id: DeliveryNumber,
    },

    /// The remote advertised delivery state for one delivery
    Disposition {
        link: LinkId,
        /// Role the remote plays: `Receiver` concerns deliveries we sent
        role: Role,
        delivery_id: DeliveryNumber,
        tag: DeliveryTag,
        state: Option<DeliveryState>,
        settled: bool,
    },

    /// The engine failed and refuses further input
    Failed { description: String },
}
