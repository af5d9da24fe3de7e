use siderite_types::definitions;
use siderite_types::sasl::SaslCode;

/// Errors raised by the protocol engine
///
/// The taxonomy follows the transport spec: protocol violations and decode
/// errors are fatal to the engine, everything else is local to the operation
/// that raised it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Framing or codec failure; fatal to the connection
    #[error(transparent)]
    Framing(#[from] crate::frames::Error),

    /// A state machine rejected the operation or frame
    #[error("illegal state for {operation}")]
    IllegalState { operation: &'static str },

    /// A peer broke a protocol invariant; carries the condition reported back
    #[error("protocol error: {0}")]
    Protocol(definitions::Error),

    /// A peer broke a link-scoped invariant; fatal to that link only, which
    /// detaches with the error while its session stays mapped
    #[error("link protocol error: {error}")]
    LinkProtocol {
        /// Index of the offending link within its session
        link: usize,
        error: definitions::Error,
    },

    /// The peer closed the connection with an error
    #[error("remote peer closed the connection: {0}")]
    RemoteClosed(definitions::Error),

    #[error(transparent)]
    Sasl(#[from] crate::sasl_profile::Error),

    #[error("sasl negotiation ended with outcome {0:?}")]
    SaslRejected(SaslCode),

    /// A local limit was hit; engine state is unchanged
    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),

    #[error("link name is already attached in this session")]
    DuplicateLinkName,

    #[error("unknown session")]
    UnknownSession,

    #[error("unknown link")]
    UnknownLink,

    /// Raised by every call after the engine transitioned to failed
    #[error("engine has failed: {0}")]
    Failed(String),
}

impl Error {
    pub(crate) fn illegal_state(operation: &'static str) -> Self {
        Error::IllegalState { operation }
    }

    pub(crate) fn protocol(
        condition: impl Into<definitions::ErrorCondition>,
        description: impl Into<String>,
    ) -> Self {
        Error::Protocol(definitions::Error::new(condition, description))
    }
}
