//! Client-side SASL negotiation state machine

use siderite_types::sasl::{SaslCode, SaslFrameBody, SaslInit, SaslResponse};

use crate::sasl_profile::{self, SaslProfile};

use super::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaslState {
    /// Headers exchanged, waiting for the server's mechanism list
    WaitingMechanisms,
    InitSent,
    Done,
}

/// What the negotiation asks of the engine after each server frame
pub(crate) enum SaslStep {
    Emit(SaslFrameBody),
    /// Outcome `ok`: move on to the AMQP header exchange
    Authenticated,
}

/// Drives the configured profiles against the server's offer
pub(crate) struct SaslClient {
    profiles: Vec<SaslProfile>,
    chosen: Option<usize>,
    hostname: Option<String>,
    state: SaslState,
}

impl std::fmt::Debug for SaslClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaslClient")
            .field("profiles", &self.profiles)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl SaslClient {
    pub(crate) fn new(profiles: Vec<SaslProfile>, hostname: Option<String>) -> Self {
        Self {
            profiles,
            chosen: None,
            hostname,
            state: SaslState::WaitingMechanisms,
        }
    }

    pub(crate) fn on_frame(&mut self, frame: SaslFrameBody) -> Result<SaslStep, Error> {
        match frame {
            SaslFrameBody::Mechanisms(mechanisms) if self.state == SaslState::WaitingMechanisms => {
                // our configured order expresses preference
                let chosen = self
                    .profiles
                    .iter()
                    .position(|profile| {
                        mechanisms
                            .sasl_server_mechanisms
                            .contains(&profile.mechanism())
                    })
                    .ok_or(sasl_profile::Error::NoCommonMechanism)?;
                self.chosen = Some(chosen);
                self.state = SaslState::InitSent;
                let profile = &mut self.profiles[chosen];
                tracing::debug!(mechanism = %profile.mechanism(), "sasl mechanism selected");
                Ok(SaslStep::Emit(SaslFrameBody::Init(SaslInit {
                    mechanism: profile.mechanism(),
                    initial_response: profile.initial_response(),
                    hostname: self.hostname.clone(),
                })))
            }
            SaslFrameBody::Challenge(challenge) if self.state == SaslState::InitSent => {
                let chosen = self.chosen.expect("mechanism chosen before init");
                let response = self.profiles[chosen].on_challenge(&challenge.challenge)?;
                Ok(SaslStep::Emit(SaslFrameBody::Response(SaslResponse {
                    response,
                })))
            }
            SaslFrameBody::Outcome(outcome) if self.state == SaslState::InitSent => {
                match outcome.code {
                    SaslCode::Ok => {
                        self.state = SaslState::Done;
                        Ok(SaslStep::Authenticated)
                    }
                    code => Err(Error::SaslRejected(code)),
                }
            }
            other => Err(sasl_profile::Error::UnexpectedFrame(other.name()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use siderite_codec::primitives::{Array, Symbol};
    use siderite_types::sasl::{SaslFrameBody, SaslMechanisms, SaslOutcome};

    use crate::sasl_profile::SaslProfile;

    use super::{SaslClient, SaslStep};

    fn mechanisms(names: &[&str]) -> SaslFrameBody {
        SaslFrameBody::Mechanisms(SaslMechanisms {
            sasl_server_mechanisms: names.iter().copied().map(Symbol::from).collect::<Array<_>>(),
        })
    }

    #[test]
    fn plain_negotiation() {
        let mut client = SaslClient::new(
            vec![SaslProfile::from(("user", "pass"))],
            Some("localhost".into()),
        );
        let step = client.on_frame(mechanisms(&["PLAIN", "ANONYMOUS"])).unwrap();
        match step {
            SaslStep::Emit(SaslFrameBody::Init(init)) => {
                assert_eq!(init.mechanism, Symbol::from("PLAIN"));
                assert_eq!(&init.initial_response.unwrap()[..], b"\0user\0pass");
                assert_eq!(init.hostname.as_deref(), Some("localhost"));
            }
            _ => panic!("expected init"),
        }

        let step = client
            .on_frame(SaslFrameBody::Outcome(SaslOutcome {
                code: siderite_types::sasl::SaslCode::Ok,
                additional_data: None,
            }))
            .unwrap();
        assert!(matches!(step, SaslStep::Authenticated));
    }

    #[test]
    fn no_common_mechanism_fails() {
        let mut client = SaslClient::new(vec![SaslProfile::Anonymous], None);
        assert!(client.on_frame(mechanisms(&["SCRAM-SHA-256"])).is_err());
    }

    #[test]
    fn rejected_outcome_fails() {
        let mut client = SaslClient::new(vec![SaslProfile::Anonymous], None);
        client.on_frame(mechanisms(&["ANONYMOUS"])).unwrap();
        let result = client.on_frame(SaslFrameBody::Outcome(SaslOutcome {
            code: siderite_types::sasl::SaslCode::Auth,
            additional_data: None,
        }));
        assert!(result.is_err());
    }
}
