//! Typed publish/subscribe over an intermittently reachable peer session.
//!
//! Two peer processes (a companion device and its host, say) share a session
//! that either side may lose at any time. This library turns that session's
//! untyped key/value payloads into typed messages: senders hand over values
//! implementing [`Message`], subscribers register a [`Descriptor`] and get
//! decoded values back on a single serial delivery context.
//!
//! A send attempted while the session is down is parked and retried once
//! when activation next completes. Subscriptions end when their
//! [`SubscriptionHandle`] is dropped.
//!

// Import all sub modules once...
mod connector;
mod connector_builder;
mod delivery;
mod domain;
mod protocol;
mod subscription;
mod transport;

mod error;
mod lock;
mod macros;

// Re-export main types
pub use connector::{Connector, ErrorHandler};
pub use connector_builder::ConnectorBuilder;

pub use delivery::{DeliveryContext, DeliveryQueue, Job};
pub use error::{Error, Result};

pub use protocol::{
    //
    encode,
    from_fields,
    tag_of,
    to_fields,
    Descriptor,
    Message,
    OutboundMessage,
    TYPE_KEY,
};

pub use subscription::{SubscriptionHandle, SubscriptionId};

pub use transport::MemorySession;

// --- public re-exports
pub use domain::{
    //
    ActivationState,
    RawPayload,
    SessionConfig,
    SessionDelegate,
    Transport,
    TransportBase,
    TransportPtr,
};
