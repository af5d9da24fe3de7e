//! AMQP 1.0 type system: buffers, primitives, encoder and decoder
//!
//! This crate carries the layers below the wire protocol proper:
//!
//! - [`buffer`]: byte containers with independent read/write cursors,
//!   including composite buffers assembled from constituents
//! - [`primitives`] and [`value`]: the AMQP primitive types and the untyped
//!   [`Value`](value::Value) sum over them
//! - [`ser`] and [`de`]: encoding into any [`bytes::BufMut`] and decoding
//!   from slices, streams or buffers through one shared [`read::Read`] seam
//! - [`macros`]: the [`composite!`] macro implementing described-list records
//! - [`registry`]: runtime dispatch for described types, opaque by default
//!
//! The round-trip law `decode(encode(v)) == v` holds for every [`Value`]
//! this crate can produce, over both the slice and the streaming decoder.

pub mod buffer;
pub mod convert;
pub mod de;
pub mod error;
pub mod format_code;
#[macro_use]
pub mod macros;
pub mod primitives;
pub mod read;
pub mod registry;
pub mod ser;
pub mod value;

pub use convert::{FromValue, IntoValue};
pub use error::Error;
pub use value::{Described, Descriptor, Value};
