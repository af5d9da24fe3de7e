//! Inbound deliveries as the application sees them

use siderite_codec::error::Error as CodecError;
use siderite_types::definitions::{DeliveryNumber, DeliveryTag, MessageFormat};
use siderite_types::messaging::Message;

use crate::Payload;

/// A fully received delivery
///
/// Ownership of the payload moves to whoever consumes the event; the engine
/// keeps only the settlement bookkeeping entry until the delivery settles.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub delivery_id: DeliveryNumber,
    pub delivery_tag: DeliveryTag,
    pub message_format: MessageFormat,
    pub payload: Payload,
    /// Whether the sender settled the delivery up front
    pub settled: bool,
}

impl Delivery {
    /// Parses the payload as an AMQP message
    pub fn message(&self) -> Result<Message, CodecError> {
        Message::decode(&self.payload)
    }
}
