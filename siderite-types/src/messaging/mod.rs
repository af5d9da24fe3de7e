//! Messaging types of AMQP 1.0 Part 3: termini, sections and delivery states

mod terminus;
pub use terminus::{ExpiryPolicy, Source, Target, TerminusDurability};

mod delivery_state;
pub use delivery_state::{
    Accepted, DeliveryState, Modified, Received, Rejected, Released,
};

mod header;
pub use header::{Header, Priority};

mod annotations;
pub use annotations::{
    Annotations, ApplicationProperties, DeliveryAnnotations, Footer, MessageAnnotations,
};

mod properties;
pub use properties::{MessageId, Properties};

mod body;
pub use body::{AmqpSequence, AmqpValue, Body, Data};

mod message;
pub use message::Message;
