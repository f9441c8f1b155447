//! In-memory session transport.
//!
//! This module provides a pure in-process implementation of the domain-level
//! `Transport` trait. It is intended primarily for testing, local execution,
//! and as a reference for session semantics.
//!
//! ## Reference Semantics
//!
//! - Two endpoints created with [`MemorySession::pair`] see each other as
//!   peers. An endpoint created with [`MemorySession::new`] has no peer and
//!   its sends fail with [`Error::PeerUnreachable`].
//! - Payloads cross the link as JSON frames, so only JSON-compatible values
//!   survive the trip, as on a real wire.
//! - Delegate callbacks run synchronously on the calling thread, never while
//!   an endpoint lock is held. Delivery is deterministic within a process.
//!
//! ## Non-Goals
//!
//! Reachability changes, background transfer scheduling and payload size
//! limits of real session stacks are not simulated. The owner of an endpoint
//! drives activation and failures explicitly through the control methods.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use bytes::Bytes;

use crate::lock::lock_ignore_poison;
use crate::macros::{log_debug, log_trace};
use crate::{
    // ---
    ActivationState,
    Error,
    RawPayload,
    Result,
    SessionConfig,
    SessionDelegate,
    Transport,
    TransportBase,
};

/// Inbound delivery channel on the receiving endpoint.
#[derive(Debug, Clone, Copy)]
enum Channel {
    Message,
    ApplicationContext,
    UserInfo,
}

/// One endpoint of an in-process session.
pub struct MemorySession {
    // ---
    base: TransportBase,
    auto_activate: bool,
    state: Mutex<ActivationState>,
    delegate: Mutex<Option<Weak<dyn SessionDelegate>>>,
    peer: Mutex<Weak<MemorySession>>,

    // latest context this endpoint published
    context: Mutex<Option<RawPayload>>,
    sent: Mutex<Vec<RawPayload>>,
    fail_sends: AtomicBool,
    fail_context_updates: AtomicBool,
}

impl MemorySession {
    // ---

    /// Create an endpoint with no peer.
    pub fn new(config: SessionConfig) -> Arc<Self> {
        // ---
        log_debug!("{}: create memory session", config.session_id);

        Arc::new(Self {
            base: TransportBase::from(&config),
            auto_activate: config.auto_activate,
            state: Mutex::new(ActivationState::NotActivated),
            delegate: Mutex::new(None),
            peer: Mutex::new(Weak::new()),
            context: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            fail_context_updates: AtomicBool::new(false),
        })
    }

    /// Create two endpoints linked to each other.
    ///
    /// Each endpoint holds its peer weakly; dropping one makes the other's
    /// sends fail with [`Error::PeerUnreachable`].
    pub fn pair(a: SessionConfig, b: SessionConfig) -> (Arc<Self>, Arc<Self>) {
        // ---
        let a = Self::new(a);
        let b = Self::new(b);
        *lock_ignore_poison(&a.peer) = Arc::downgrade(&b);
        *lock_ignore_poison(&b.peer) = Arc::downgrade(&a);
        (a, b)
    }

    /// Set the activation state and report completion to the delegate.
    pub fn complete_activation(&self, state: ActivationState) {
        // ---
        *lock_ignore_poison(&self.state) = state;
        log_debug!("{}: activation complete: {state:?}", self.transport_id());

        if let Some(delegate) = self.delegate() {
            delegate.activation_did_complete(state, None);
        }
    }

    /// Fail activation with `error`, leaving the session not activated.
    pub fn fail_activation(&self, error: Error) {
        // ---
        *lock_ignore_poison(&self.state) = ActivationState::NotActivated;
        log_debug!("{}: activation failed: {error}", self.transport_id());

        if let Some(delegate) = self.delegate() {
            delegate.activation_did_complete(ActivationState::NotActivated, Some(&error));
        }
    }

    /// Change the activation state without notifying anyone.
    pub fn set_activation_state(&self, state: ActivationState) {
        *lock_ignore_poison(&self.state) = state;
    }

    /// Walk the session through becoming inactive and deactivating.
    pub fn deactivate(&self) {
        // ---
        self.set_activation_state(ActivationState::Inactive);
        let delegate = self.delegate();
        if let Some(delegate) = &delegate {
            delegate.session_did_become_inactive();
        }

        self.set_activation_state(ActivationState::NotActivated);
        if let Some(delegate) = &delegate {
            delegate.session_did_deactivate();
        }
    }

    /// Deliver a payload as if the peer had sent it as a message.
    pub fn inject_message(&self, payload: RawPayload) {
        self.receive(Channel::Message, payload);
    }

    /// Deliver a payload as if the peer had updated its application context.
    pub fn inject_application_context(&self, payload: RawPayload) {
        self.receive(Channel::ApplicationContext, payload);
    }

    /// Deliver a payload as if the peer had transferred user info.
    pub fn inject_user_info(&self, payload: RawPayload) {
        self.receive(Channel::UserInfo, payload);
    }

    /// Every payload accepted by `send_message` so far.
    pub fn sent_messages(&self) -> Vec<RawPayload> {
        lock_ignore_poison(&self.sent).clone()
    }

    /// Latest application context published from this endpoint.
    pub fn application_context(&self) -> Option<RawPayload> {
        lock_ignore_poison(&self.context).clone()
    }

    /// Make `send_message` fail with [`Error::TransportSend`].
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Make `update_application_context` fail with [`Error::TransportSend`].
    pub fn fail_context_updates(&self, fail: bool) {
        self.fail_context_updates.store(fail, Ordering::SeqCst);
    }

    fn delegate(&self) -> Option<Arc<dyn SessionDelegate>> {
        // ---
        let weak = lock_ignore_poison(&self.delegate).clone();
        weak.and_then(|weak| weak.upgrade())
    }

    fn peer(&self) -> Result<Arc<MemorySession>> {
        lock_ignore_poison(&self.peer)
            .upgrade()
            .ok_or(Error::PeerUnreachable)
    }

    /// Push a payload over the link to the peer.
    fn forward(&self, channel: Channel, payload: &RawPayload) -> Result<()> {
        // ---
        let peer = self.peer()?;
        let frame = Bytes::from(serde_json::to_vec(payload)?);
        log_trace!(
            "{} -> {}: {channel:?} frame of {} bytes",
            self.transport_id(),
            peer.transport_id(),
            frame.len()
        );

        let payload: RawPayload = serde_json::from_slice(&frame)?;
        peer.receive(channel, payload);
        Ok(())
    }

    fn receive(&self, channel: Channel, payload: RawPayload) {
        // ---
        let Some(delegate) = self.delegate() else {
            log_debug!("{}: no delegate, {channel:?} dropped", self.transport_id());
            return;
        };

        match channel {
            Channel::Message => delegate.did_receive_message(payload),
            Channel::ApplicationContext => delegate.did_receive_application_context(payload),
            Channel::UserInfo => delegate.did_receive_user_info(payload),
        }
    }
}

#[async_trait::async_trait]
impl Transport for MemorySession {
    // ---
    fn base(&self) -> &TransportBase {
        &self.base
    }

    fn activation_state(&self) -> ActivationState {
        *lock_ignore_poison(&self.state)
    }

    /// Activate the session.
    ///
    /// With `auto_activate` the session becomes active immediately and the
    /// delegate hears about it before this returns. Otherwise activation
    /// stays pending until [`MemorySession::complete_activation`].
    fn activate(&self) -> Result<()> {
        // ---
        if !self.is_supported() {
            return Err(Error::Unsupported);
        }

        if self.auto_activate {
            self.complete_activation(ActivationState::Activated);
        } else {
            log_debug!("{}: activation pending", self.transport_id());
        }
        Ok(())
    }

    async fn send_message(&self, payload: RawPayload) -> Result<()> {
        // ---
        if !self.activation_state().is_ready() {
            return Err(Error::InactiveSession);
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::TransportSend("injected send failure".into()));
        }

        self.forward(Channel::Message, &payload)?;
        lock_ignore_poison(&self.sent).push(payload);
        Ok(())
    }

    /// Replace the published context.
    ///
    /// The context is kept even when no peer is linked.
    fn update_application_context(&self, payload: RawPayload) -> Result<()> {
        // ---
        if self.fail_context_updates.load(Ordering::SeqCst) {
            return Err(Error::TransportSend("injected context failure".into()));
        }

        *lock_ignore_poison(&self.context) = Some(payload.clone());

        match self.forward(Channel::ApplicationContext, &payload) {
            Err(Error::PeerUnreachable) => Ok(()),
            other => other,
        }
    }

    fn transfer_user_info(&self, payload: RawPayload) -> Result<()> {
        self.forward(Channel::UserInfo, &payload)
    }

    fn set_delegate(&self, delegate: Weak<dyn SessionDelegate>) {
        *lock_ignore_poison(&self.delegate) = Some(delegate);
    }
}
