use tokio::sync::{mpsc, oneshot};

use siderite_types::definitions::SenderSettleMode;
use siderite_types::messaging::{DeliveryState, Message, Target};

use crate::engine::{LinkId, LinkOptions, SendOptions};

use super::{complete, Error, Op, Session, Timeouts};

/// A sending link
///
/// `send` resolves according to the delivery mode: a settled (at-most-once)
/// delivery completes once its transfers left the engine, an unsettled
/// (at-least-once) delivery completes on the receiver's disposition, whose
/// terminal state is returned.
#[derive(Debug)]
pub struct Sender {
    ops: mpsc::UnboundedSender<Op>,
    link: LinkId,
    timeouts: Timeouts,
}

impl Sender {
    /// Attaches a sender named `name` towards the target address, unsettled
    /// (at-least-once) by default
    pub async fn attach(
        session: &mut Session,
        name: impl Into<String>,
        target: impl Into<String>,
    ) -> Result<Sender, Error> {
        let options = LinkOptions::sender(name)
            .target(Target::with_address(target.into()))
            .snd_settle_mode(SenderSettleMode::Unsettled);
        Self::attach_with_options(session, options).await
    }

    /// Attaches with explicit link options, e.g. a settled mode for
    /// at-most-once delivery
    pub async fn attach_with_options(
        session: &mut Session,
        options: LinkOptions,
    ) -> Result<Sender, Error> {
        let (resp, rx) = oneshot::channel();
        session
            .ops
            .send(Op::Attach {
                session: session.id,
                options,
                deliveries: None,
                resp,
            })
            .map_err(|_| Error::ConnectionDropped)?;
        let link = complete(rx, session.timeouts.open, "attach").await?;
        Ok(Sender {
            ops: session.ops.clone(),
            link,
            timeouts: session.timeouts,
        })
    }

    /// Sends a message under the link's settlement mode
    pub async fn send(&self, message: Message) -> Result<Option<DeliveryState>, Error> {
        self.send_with_options(message, SendOptions::default()).await
    }

    /// Sends with per-delivery options (settlement wish, message format)
    pub async fn send_with_options(
        &self,
        message: Message,
        options: SendOptions,
    ) -> Result<Option<DeliveryState>, Error> {
        let payload = message.encode()?;
        let (resp, rx) = oneshot::channel();
        self.ops
            .send(Op::Send {
                link: self.link,
                payload,
                options,
                resp,
            })
            .map_err(|_| Error::ConnectionDropped)?;
        complete(rx, self.timeouts.send, "send").await
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
