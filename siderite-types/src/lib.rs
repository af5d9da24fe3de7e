//! AMQP 1.0 wire records on top of the `siderite-codec` type system
//!
//! Everything a protocol engine speaks: Part 2.8 definitions, the transport
//! performatives, the messaging sections of Part 3, delivery states and the
//! SASL records of Part 5.

pub mod definitions;
pub mod messaging;
pub mod performatives;
pub mod registry;
pub mod sasl;

// the primitive layer is part of this crate's vocabulary
pub use siderite_codec::primitives;
pub use siderite_codec::value::{Described, Descriptor, Value};
