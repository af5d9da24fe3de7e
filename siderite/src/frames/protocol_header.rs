//! The 8-byte protocol header exchanged before any frames

use siderite_types::definitions::{MAJOR, MINOR, REVISION};

const PROTOCOL_HEADER_PREFIX: &[u8; 4] = b"AMQP";

/// `AMQP` + protocol id + version triple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolHeader {
    pub id: ProtocolId,
    pub major: u8,
    pub minor: u8,
    pub revision: u8,
}

impl Default for ProtocolHeader {
    fn default() -> Self {
        Self {
            id: ProtocolId::Amqp,
            major: MAJOR,
            minor: MINOR,
            revision: REVISION,
        }
    }
}

impl ProtocolHeader {
    pub fn new(id: ProtocolId, major: u8, minor: u8, revision: u8) -> Self {
        Self {
            id,
            major,
            minor,
            revision,
        }
    }

    pub fn amqp() -> Self {
        Self::default()
    }

    pub fn sasl() -> Self {
        Self {
            id: ProtocolId::Sasl,
            ..Default::default()
        }
    }
}

impl From<ProtocolHeader> for [u8; 8] {
    fn from(value: ProtocolHeader) -> Self {
        [
            PROTOCOL_HEADER_PREFIX[0],
            PROTOCOL_HEADER_PREFIX[1],
            PROTOCOL_HEADER_PREFIX[2],
            PROTOCOL_HEADER_PREFIX[3],
            value.id as u8,
            value.major,
            value.minor,
            value.revision,
        ]
    }
}

impl TryFrom<[u8; 8]> for ProtocolHeader {
    type Error = [u8; 8];

    fn try_from(value: [u8; 8]) -> Result<Self, Self::Error> {
        if &value[..4] != PROTOCOL_HEADER_PREFIX {
            return Err(value);
        }
        let id = ProtocolId::try_from(value[4]).map_err(|_| value)?;
        Ok(Self::new(id, value[5], value[6], value[7]))
    }
}

/// Protocol id byte of the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProtocolId {
    Amqp = 0x0,
    Tls = 0x2,
    Sasl = 0x3,
}

impl TryFrom<u8> for ProtocolId {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0 => Ok(ProtocolId::Amqp),
            0x2 => Ok(ProtocolId::Tls),
            0x3 => Ok(ProtocolId::Sasl),
            other => Err(other),
        }
    }
}
