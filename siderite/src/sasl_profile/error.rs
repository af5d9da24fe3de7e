/// Errors raised during SASL negotiation
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("none of the configured mechanisms is offered by the peer")]
    NoCommonMechanism,

    #[error("the selected mechanism does not expect a challenge")]
    UnexpectedChallenge,

    #[error("unexpected SASL frame {0}")]
    UnexpectedFrame(&'static str),

    #[error("mechanism failure: {0}")]
    Mechanism(String),
}
