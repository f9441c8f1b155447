//! Session domain.
//!
//! The contract between the connector and whatever platform session it
//! drives: activation states, the transport trait, and the delegate through
//! which a transport reports back. Nothing here knows about tags or codecs.

mod transport;

// --- session contract

pub use transport::{
    //
    ActivationState,
    RawPayload,
    SessionConfig,
    SessionDelegate,
    Transport,
    TransportBase,
    TransportPtr,
};
