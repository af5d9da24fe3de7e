//! An AMQP 1.0 client: a sans-I/O protocol engine with an async façade
//!
//! The heart of the crate is [`engine::Engine`], a single-threaded,
//! event-driven state machine for the connection → session → link →
//! delivery hierarchy. It is I/O-free: bytes in through `ingest`, bytes out
//! through `pending_output`, time through `tick`, state changes out through
//! events. Everything network-y lives in the thin tokio façade under
//! [`client`], which pumps a byte transport and maps engine events onto
//! futures.
//!
//! ```no_run
//! use siderite::{Connection, Session, Sender};
//! use siderite::types::messaging::Message;
//!
//! # async fn example() -> Result<(), siderite::client::Error> {
//! let mut connection = Connection::builder()
//!     .container_id("example")
//!     .open("amqp://localhost:5672")
//!     .await?;
//! let mut session = Session::begin(&mut connection).await?;
//! let sender = Sender::attach(&mut session, "sender-0", "my-queue").await?;
//! sender.send(Message::value("hello")).await?;
//! session.end().await?;
//! connection.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod engine;
pub mod frames;
pub mod sasl_profile;

/// Message bytes riding behind a transfer performative
pub type Payload = bytes::Bytes;

pub use client::{Connection, Receiver, Sender, Session};
pub use engine::{Delivery, Engine, Event, LinkOptions, SendOptions, SessionOptions};
pub use sasl_profile::SaslProfile;

// the layers this crate is built on, re-exported for downstream use
pub use siderite_codec as codec;
pub use siderite_types as types;
