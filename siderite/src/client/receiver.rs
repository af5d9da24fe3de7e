use tokio::sync::{mpsc, oneshot};

use siderite_types::messaging::{DeliveryState, Source};

use crate::engine::{Delivery, LinkId, LinkOptions};

use super::{complete, Error, Op, Session, Timeouts};

/// A receiving link
///
/// Deliveries queue on the connection task and are awaited with
/// [`recv`](Receiver::recv). The default configuration replenishes credit to
/// a window of 100 and accepts deliveries as they complete; turn
/// `auto_accept` off in the link options to acknowledge manually.
#[derive(Debug)]
pub struct Receiver {
    ops: mpsc::UnboundedSender<Op>,
    link: LinkId,
    timeouts: Timeouts,
    deliveries: mpsc::UnboundedReceiver<Result<Delivery, Error>>,
}

impl Receiver {
    /// Attaches a receiver named `name` on the source address with the
    /// default credit window and auto-accept
    pub async fn attach(
        session: &mut Session,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<Receiver, Error> {
        let options = LinkOptions::receiver(name)
            .source(Source::with_address(source.into()))
            .credit_window(100)
            .auto_accept(true);
        Self::attach_with_options(session, options).await
    }

    pub async fn attach_with_options(
        session: &mut Session,
        options: LinkOptions,
    ) -> Result<Receiver, Error> {
        let (deliveries_tx, deliveries_rx) = mpsc::unbounded_channel();
        let (resp, rx) = oneshot::channel();
        session
            .ops
            .send(Op::Attach {
                session: session.id,
                options,
                deliveries: Some(deliveries_tx),
                resp,
            })
            .map_err(|_| Error::ConnectionDropped)?;
        let link = complete(rx, session.timeouts.open, "attach").await?;
        Ok(Receiver {
            ops: session.ops.clone(),
            link,
            timeouts: session.timeouts,
            deliveries: deliveries_rx,
        })
    }

    /// Awaits the next delivery
    pub async fn recv(&mut self) -> Result<Delivery, Error> {
        match self.deliveries.recv().await {
            Some(result) => result,
            None => Err(Error::Detached(None)),
        }
    }

    /// Accepts a delivery; settles it unless the link negotiated
    /// second-mode settlement
    pub async fn accept(&self, delivery: &Delivery) -> Result<(), Error> {
        self.dispose(delivery, DeliveryState::accepted(), true).await
    }

    /// Releases a delivery back to the sender
    pub async fn release(&self, delivery: &Delivery) -> Result<(), Error> {
        self.dispose(delivery, DeliveryState::released(), true).await
    }

    /// Rejects a delivery
    pub async fn reject(&self, delivery: &Delivery) -> Result<(), Error> {
        self.dispose(delivery, DeliveryState::rejected(None), true)
            .await
    }

    /// Applies an explicit delivery state
    pub async fn dispose(
        &self,
        delivery: &Delivery,
        state: DeliveryState,
        settled: bool,
    ) -> Result<(), Error> {
        let (resp, rx) = oneshot::channel();
        self.ops
            .send(Op::Dispose {
                link: self.link,
                delivery_id: delivery.delivery_id,
                state,
                settled,
                resp,
            })
            .map_err(|_| Error::ConnectionDropped)?;
        complete(rx, self.timeouts.send, "disposition").await
    }

    /// Grants additional credit outside the automatic window
    pub fn add_credit(&self, credit: u32) -> Result<(), Error> {
        self.ops
            .send(Op::Credit {
                link: self.link,
                credit,
            })
            .map_err(|_| Error::ConnectionDropped)
    }

    /// Asks the sender to exhaust or return all outstanding credit and
    /// waits for the cycle to finish
    pub async fn drain(&self) -> Result<(), Error> {
        let (resp, rx) = oneshot::channel();
        self.ops
            .send(Op::Drain {
                link: self.link,
                resp,
            })
            .map_err(|_| Error::ConnectionDropped)?;
        complete(rx, self.timeouts.drain, "drain").await
    }

    /// Detaches, leaving the link resumable under its name
    pub async fn detach(self) -> Result<(), Error> {
        self.detach_inner(false).await
    }

    /// Closes the link for good
    pub async fn close(self) -> Result<(), Error> {
        self.detach_inner(true).await
    }

    async fn detach_inner(self, closed: bool) -> Result<(), Error> {
        let (resp, rx) = oneshot::channel();
        self.ops
            .send(Op::Detach {
                link: self.link,
                closed,
                resp,
            })
            .map_err(|_| Error::ConnectionDropped)?;
        complete(rx, self.timeouts.close, "detach").await
    }
}
