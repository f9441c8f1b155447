use crate::{RawPayload, Result};

/// A message kind that can travel over a session.
///
/// Each kind declares a fixed tag and knows how to flatten itself into
/// fields. The tag is what subscribers filter on, so two kinds must never
/// share one. Field names must not collide with [`TYPE_KEY`](crate::TYPE_KEY).
///
/// For serde types, [`to_fields`](crate::to_fields) does the flattening:
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use session_link::{Message, RawPayload, Result};
///
/// #[derive(Serialize, Deserialize)]
/// struct Ping {
///     count: i64,
/// }
///
/// impl Message for Ping {
///     const TAG: &'static str = "ping";
///
///     fn to_fields(&self) -> Result<RawPayload> {
///         session_link::to_fields(self)
///     }
/// }
/// ```
pub trait Message: Send + Sync + 'static {
    // ---
    /// Tag identifying this message kind on the wire.
    const TAG: &'static str;

    /// Flatten the message into its variant-specific fields.
    fn to_fields(&self) -> Result<RawPayload>;
}

/// Object-safe view of a [`Message`].
///
/// Lets the connector hold messages of any kind, e.g. in its pending slot.
pub trait OutboundMessage: Send + Sync {
    // ---
    fn tag(&self) -> &'static str;

    fn fields(&self) -> Result<RawPayload>;
}

impl<M: Message> OutboundMessage for M {
    fn tag(&self) -> &'static str {
        M::TAG
    }

    fn fields(&self) -> Result<RawPayload> {
        self.to_fields()
    }
}
