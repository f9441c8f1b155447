// src/domain/transport.rs

//! Session transport abstractions.
//!
//! A session is a bidirectional channel between two peer processes that may
//! each be unreachable at arbitrary times. The transport owns activation,
//! reachability and the low-level send/receive primitives; this module only
//! describes the contract the connector relies on.
//!
//! The transport is responsible for delivering opaque key/value payloads.
//! Typed routing, subscriber lifetime and the pending-message retry are
//! handled by the connector.
//!
//! Concrete implementations of this interface live under `src/transport/`.
use crate::{Error, Result};
use std::sync::{Arc, Weak};

/// A flat mapping of string keys to JSON-compatible values.
///
/// Every payload built or accepted by the connector carries the reserved
/// [`TYPE_KEY`](crate::TYPE_KEY) holding the message tag.
pub type RawPayload = serde_json::Map<String, serde_json::Value>;

/// Activation state reported by a session transport.
///
/// Only [`ActivationState::Activated`] counts as ready. The enum is
/// non-exhaustive so that states added by a platform later degrade to
/// "not ready" in downstream matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum ActivationState {
    /// `activate()` has not completed yet.
    #[default]
    NotActivated,

    /// The session was active and is winding down (e.g. a device switch).
    Inactive,

    /// The session can carry messages.
    Activated,
}

impl ActivationState {
    /// True exactly when the session can carry messages.
    pub fn is_ready(self) -> bool {
        matches!(self, ActivationState::Activated)
    }
}

/// Configuration for creating a session transport.
///
/// Passed to transport factory functions such as
/// [`MemorySession::new`](crate::MemorySession::new).
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Identifier for this endpoint, used in logs.
    pub session_id: String,

    /// Whether sessions are supported on this device.
    ///
    /// Unsupported transports are never activated.
    pub supported: bool,

    /// Complete activation as soon as `activate()` is called.
    ///
    /// When false, activation stays pending until the owner of the transport
    /// signals completion (useful for simulating a slow pairing handshake).
    pub auto_activate: bool,
}

impl SessionConfig {
    /// Create a config for a supported, auto-activating session.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            supported: true,
            auto_activate: true,
        }
    }

    /// Mark the session as supported or not.
    pub fn with_supported(mut self, supported: bool) -> Self {
        self.supported = supported;
        self
    }

    /// Enable or disable immediate activation.
    pub fn with_auto_activate(mut self, auto_activate: bool) -> Self {
        self.auto_activate = auto_activate;
        self
    }
}

/// Shared base state for transport implementations.
///
/// Each concrete transport embeds this as a field named `base` so that the
/// default `Transport` methods can delegate to it.
#[derive(Debug, Clone)]
pub struct TransportBase {
    /// Unique identifier for this endpoint.
    pub transport_id: String,
    /// Whether the platform supports sessions at all.
    pub supported: bool,
}

impl From<&SessionConfig> for TransportBase {
    fn from(config: &SessionConfig) -> Self {
        // ---
        Self {
            transport_id: config.session_id.clone(),
            supported: config.supported,
        }
    }
}

/// Receiver of session lifecycle events and inbound payloads.
///
/// Transports may invoke these from their own threads, possibly
/// concurrently for different channels. Implementations must not block.
pub trait SessionDelegate: Send + Sync {
    // ---
    /// Activation finished, successfully or not.
    fn activation_did_complete(&self, state: ActivationState, error: Option<&Error>);

    /// A direct message arrived.
    fn did_receive_message(&self, payload: RawPayload);

    /// The peer replaced its application context.
    fn did_receive_application_context(&self, payload: RawPayload);

    /// A queued user-info transfer arrived.
    fn did_receive_user_info(&self, payload: RawPayload);

    /// The session is about to switch peers.
    fn session_did_become_inactive(&self) {}

    /// The session finished deactivating.
    fn session_did_deactivate(&self) {}

    /// The peer became reachable or unreachable.
    fn reachability_did_change(&self, _reachable: bool) {}
}

/// Session transport abstraction.
///
/// Implementations must ensure that:
/// - `activation_state()` is cheap and never blocks.
/// - `send_message()` does not wait for the peer to process the payload.
/// - delegate callbacks are not issued while holding locks the delegate
///   might need.
///
/// No assumptions are made about ordering, durability, or deduplication.
/// The in-memory session is the reference implementation.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    // ---
    /// Returns a reference to the shared base state.
    fn base(&self) -> &TransportBase;

    /// Returns the id of this endpoint.
    fn transport_id(&self) -> &str {
        &self.base().transport_id
    }

    /// Whether sessions are supported on this device.
    fn is_supported(&self) -> bool {
        self.base().supported
    }

    /// Current activation state.
    fn activation_state(&self) -> ActivationState;

    /// Begin activating the session.
    ///
    /// Completion is reported through
    /// [`SessionDelegate::activation_did_complete`].
    fn activate(&self) -> Result<()>;

    /// Send a payload to the peer, fire-and-forget.
    ///
    /// The returned future resolves once the transport has accepted or
    /// rejected the payload.
    async fn send_message(&self, payload: RawPayload) -> Result<()>;

    /// Replace the latest application context seen by the peer.
    fn update_application_context(&self, payload: RawPayload) -> Result<()>;

    /// Queue a payload for background delivery to the peer.
    fn transfer_user_info(&self, payload: RawPayload) -> Result<()>;

    /// Install the receiver of lifecycle events and inbound payloads.
    ///
    /// The transport holds the delegate weakly.
    fn set_delegate(&self, delegate: Weak<dyn SessionDelegate>);
}

/// Shared transport pointer.
///
/// This is an `Arc<dyn Transport>`; clones share the same session.
pub type TransportPtr = Arc<dyn Transport>;
