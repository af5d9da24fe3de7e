use tokio::sync::{mpsc, oneshot};

use crate::engine::{SessionId, SessionOptions};

use super::{complete, Connection, Error, Op, Timeouts};

/// An open session on a connection
#[derive(Debug)]
pub struct Session {
    pub(crate) ops: mpsc::UnboundedSender<Op>,
    pub(crate) id: SessionId,
    pub(crate) timeouts: Timeouts,
}

impl Session {
    /// Begins a session with default windows
    pub async fn begin(connection: &mut Connection) -> Result<Session, Error> {
        Self::begin_with_options(connection, SessionOptions::default()).await
    }

    pub async fn begin_with_options(
        connection: &mut Connection,
        options: SessionOptions,
    ) -> Result<Session, Error> {
        let (resp, rx) = oneshot::channel();
        connection
            .ops
            .send(Op::Begin { options, resp })
            .map_err(|_| Error::ConnectionDropped)?;
        let id = complete(rx, connection.timeouts.open, "begin").await?;
        Ok(Session {
            ops: connection.ops.clone(),
            id,
            timeouts: connection.timeouts,
        })
    }

    /// Ends the session and waits for the peer's end
    pub async fn end(self) -> Result<(), Error> {
        let (resp, rx) = oneshot::channel();
        self.ops
            .send(Op::End {
                session: self.id,
                resp,
            })
            .map_err(|_| Error::ConnectionDropped)?;
        complete(rx, self.timeouts.close, "end").await
    }
}
