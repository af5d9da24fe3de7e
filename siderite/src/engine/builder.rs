//! Engine configuration

use siderite_codec::registry::Registry;
use siderite_types::definitions::{Fields, Milliseconds};
use siderite_types::performatives::{ChannelMax, MaxFrameSize, Open};
use siderite_types::registry::transport_registry;

use crate::sasl_profile::SaslProfile;

use super::Engine;

/// Default maximum frame size advertised on open
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 65_536;

/// Default channel-max advertised on open
pub const DEFAULT_CHANNEL_MAX: u16 = 255;

/// Builder for an [`Engine`]
///
/// The option set mirrors the open performative plus the engine-local knobs;
/// everything a peer negotiates starts from these values.
pub struct Builder {
    pub(crate) container_id: String,
    pub(crate) hostname: Option<String>,
    pub(crate) max_frame_size: u32,
    pub(crate) channel_max: u16,
    pub(crate) idle_time_out: Option<Milliseconds>,
    pub(crate) properties: Option<Fields>,
    pub(crate) sasl_profiles: Vec<SaslProfile>,
    pub(crate) registry: Registry,
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("container_id", &self.container_id)
            .field("hostname", &self.hostname)
            .field("max_frame_size", &self.max_frame_size)
            .field("channel_max", &self.channel_max)
            .field("idle_time_out", &self.idle_time_out)
            .field("sasl_profiles", &self.sasl_profiles)
            .finish_non_exhaustive()
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            container_id: String::from("siderite"),
            hostname: None,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            channel_max: DEFAULT_CHANNEL_MAX,
            idle_time_out: None,
            properties: None,
            sasl_profiles: Vec::new(),
            registry: transport_registry(),
        }
    }
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Container identity carried on open; keep it stable across resumes
    pub fn container_id(mut self, container_id: impl Into<String>) -> Self {
        self.container_id = container_id.into();
        self
    }

    /// Virtual-host hint carried on open and sasl-init
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn max_frame_size(mut self, max_frame_size: u32) -> Self {
        self.max_frame_size =
            max_frame_size.max(siderite_types::definitions::MIN_MAX_FRAME_SIZE);
        self
    }

    pub fn channel_max(mut self, channel_max: u16) -> Self {
        self.channel_max = channel_max;
        self
    }

    /// Idle timeout advertised to the peer, in milliseconds; the engine
    /// fails the connection after twice this long without traffic
    pub fn idle_time_out(mut self, milliseconds: Milliseconds) -> Self {
        self.idle_time_out = Some(milliseconds);
        self
    }

    pub fn properties(mut self, properties: Fields) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Adds a SASL profile; order expresses preference. With none
    /// configured the engine skips the SASL layer entirely.
    pub fn sasl_profile(mut self, profile: impl Into<SaslProfile>) -> Self {
        self.sasl_profiles.push(profile.into());
        self
    }

    /// Replaces the described-type registry, e.g. to add application types
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    pub(crate) fn local_open(&self) -> Open {
        Open {
            container_id: self.container_id.clone(),
            hostname: self.hostname.clone(),
            max_frame_size: MaxFrameSize(self.max_frame_size),
            channel_max: ChannelMax(self.channel_max),
            idle_time_out: self.idle_time_out,
            properties: self.properties.clone(),
            ..Default::default()
        }
    }

    pub fn build(self) -> Engine {
        Engine::from_builder(self)
    }
}
