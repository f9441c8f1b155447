/// Protocol types for tagged key/value messages
///
/// This module defines how typed messages become flat payloads carrying a
/// type tag, and the descriptors subscribers use to turn them back.
mod codec;
mod descriptor;
mod message;

pub use codec::{encode, from_fields, tag_of, to_fields, TYPE_KEY};
pub use descriptor::Descriptor;
pub use message::{Message, OutboundMessage};
