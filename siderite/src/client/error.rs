use siderite_types::definitions;

/// Errors surfaced on client completions
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The operation's deadline passed; wire effects already emitted stand
    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error(transparent)]
    Engine(#[from] crate::engine::Error),

    #[error(transparent)]
    Codec(#[from] siderite_codec::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("the connection task is gone")]
    ConnectionDropped,

    #[error("the engine failed: {0}")]
    EngineFailed(String),

    #[error("the connection was closed: {0:?}")]
    ConnectionClosed(Option<definitions::Error>),

    #[error("the session was ended: {0:?}")]
    SessionEnded(Option<definitions::Error>),

    #[error("the link was detached: {0:?}")]
    Detached(Option<definitions::Error>),

    /// The remote aborted the delivery mid-flight; no payload was surfaced
    #[error("the delivery was aborted by the remote peer")]
    DeliveryAborted,

    #[error("invalid address `{0}`")]
    InvalidAddress(String),

    #[error("unsupported scheme `{0}`; bring your own transport and use open_with_stream")]
    UnsupportedScheme(String),
}
