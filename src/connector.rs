//! Session connector.
//!
//! The connector sits between application code and a session
//! [`Transport`](crate::Transport).
//! Outbound, it encodes typed messages and parks one message for retry while
//! the session is not active. Inbound, it funnels the three delivery channels
//! (direct message, application context, user info) into a single dispatch
//! that routes payloads by tag to typed subscribers.

use std::sync::{Arc, Mutex, Weak};

use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::lock::lock_ignore_poison;
use crate::macros::{log_debug, log_error, log_info, log_trace, log_warn};
use crate::subscription::{SubscriptionOwner, SubscriptionRegistry};
use crate::{
    // ---
    encode,
    tag_of,
    ActivationState,
    DeliveryContext,
    Descriptor,
    Error,
    Message,
    OutboundMessage,
    RawPayload,
    Result,
    SessionDelegate,
    SubscriptionHandle,
    SubscriptionId,
    TransportPtr,
};

/// Callback receiving asynchronous transport failures for one send.
pub type ErrorHandler = Box<dyn FnOnce(Error) + Send + 'static>;

/// Typed publish/subscribe endpoint over a session transport.
///
/// Created through [`ConnectorBuilder`](crate::ConnectorBuilder). Cloning is
/// cheap; clones share the same registry, pending slot and transport.
///
/// # Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use session_link::{
///     Connector, Descriptor, MemorySession, Message, RawPayload, Result, SessionConfig,
/// };
///
/// #[derive(Debug, Serialize, Deserialize)]
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
///
/// # #[tokio::main]
/// # async fn main() -> Result<()> {
/// let (phone, watch) = MemorySession::pair(SessionConfig::new("phone"), SessionConfig::new("watch"));
///
/// let phone = Connector::builder(phone).build()?;
/// let watch = Connector::builder(watch).build()?;
///
/// let _handle = watch.subscribe(Descriptor::<Ping>::json(), |ping| {
///     println!("ping #{}", ping.count);
/// });
///
/// phone.send(Ping { count: 1 }, None)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Connector {
    inner: Arc<Inner>,
}

struct Inner {
    connector_id: String,
    transport: TransportPtr,
    runtime: Handle,
    delivery: Arc<dyn DeliveryContext>,

    // At most one message waiting for the next activation.
    pending: Mutex<Option<Box<dyn OutboundMessage>>>,
    registry: Mutex<SubscriptionRegistry>,
}

impl Connector {
    // ---

    /// Start building a connector over `transport`.
    pub fn builder(transport: TransportPtr) -> crate::ConnectorBuilder {
        crate::ConnectorBuilder::new(transport)
    }

    /// Wire a connector to its transport (internal use by ConnectorBuilder).
    ///
    /// Registers the connector as the transport's delegate and, when asked
    /// to, activates the session if the device supports it.
    pub(crate) fn new(
        transport: TransportPtr,
        connector_id: String,
        runtime: Handle,
        delivery: Arc<dyn DeliveryContext>,
        activate: bool,
    ) -> Result<Self> {
        // ---
        let inner = Arc::new(Inner {
            connector_id,
            transport,
            runtime,
            delivery,
            pending: Mutex::new(None),
            registry: Mutex::new(SubscriptionRegistry::new()),
        });

        let weak: Weak<Inner> = Arc::downgrade(&inner);
        let delegate: Weak<dyn SessionDelegate> = weak;
        inner.transport.set_delegate(delegate);

        log_debug!(
            "{}: connector created over {}",
            inner.connector_id,
            inner.transport.transport_id()
        );

        if activate {
            if inner.transport.is_supported() {
                inner.transport.activate()?;
            } else {
                log_info!("{}: sessions not supported, staying inactive", inner.connector_id);
            }
        }

        Ok(Self { inner })
    }

    /// Identifier used in logs.
    pub fn connector_id(&self) -> &str {
        &self.inner.connector_id
    }

    /// The transport this connector drives.
    pub fn transport(&self) -> &TransportPtr {
        &self.inner.transport
    }

    /// True exactly when the transport reports an activated session.
    pub fn has_active_channel(&self) -> bool {
        self.inner.has_active_channel()
    }

    /// Send a message to the peer.
    ///
    /// When the session is active the payload is handed to the transport and
    /// this returns immediately; a later delivery failure is reported only
    /// through `on_error`, from a runtime task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InactiveSession`] when the session is not active. The
    /// message is then kept in the pending slot (replacing any earlier one)
    /// and sent once more when activation next completes. Encoding failures
    /// are returned as-is.
    pub fn send<M: Message>(&self, message: M, on_error: Option<ErrorHandler>) -> Result<()> {
        self.inner.send(Box::new(message), on_error)
    }

    /// Publish `message` as the latest application context.
    ///
    /// Best effort: the peer only ever sees the newest context, so failures
    /// are logged and otherwise ignored.
    pub fn update_application_context<M: Message>(&self, message: &M) {
        // ---
        let id = &self.inner.connector_id;

        let payload = match encode(message) {
            Ok(payload) => payload,
            Err(err) => {
                log_error!("{id}: cannot encode `{}` context: {err}", M::TAG);
                return;
            }
        };

        if let Err(err) = self.inner.transport.update_application_context(payload) {
            log_warn!("{id}: application context update ignored: {err}");
        }
    }

    /// Queue `message` for background delivery on the user-info channel.
    ///
    /// Unlike [`send`](Self::send), nothing is parked when the session is
    /// inactive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InactiveSession`] when the session is not active, or
    /// whatever the transport reports when queueing fails.
    pub fn transfer_user_info<M: Message>(&self, message: &M) -> Result<()> {
        // ---
        if !self.has_active_channel() {
            return Err(Error::InactiveSession);
        }
        let payload = encode(message)?;
        self.inner.transport.transfer_user_info(payload)
    }

    /// Encode `message` exactly as it would go on the wire.
    pub fn payload_for<M: Message>(&self, message: &M) -> Result<RawPayload> {
        encode(message)
    }

    /// Subscribe to messages matching the descriptor's tag.
    ///
    /// `callback` runs on the delivery context, once per matching inbound
    /// payload that decodes. The subscription lives as long as the returned
    /// handle.
    pub fn subscribe<T, F>(&self, descriptor: Descriptor<T>, callback: F) -> SubscriptionHandle
    where
        T: Message,
        F: Fn(T) + Send + Sync + 'static,
    {
        // ---
        let id = lock_ignore_poison(&self.inner.registry).add(descriptor, callback);
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let owner: Weak<dyn SubscriptionOwner> = weak;
        SubscriptionHandle::new(id, owner)
    }

    /// Remove the subscription behind `handle`.
    ///
    /// Idempotent: unknown or already removed handles are ignored.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        self.inner.remove_subscription(&handle.id());
    }

    /// Number of registered subscriptions.
    pub fn subscription_count(&self) -> usize {
        lock_ignore_poison(&self.inner.registry).len()
    }

    /// True while a message is parked waiting for activation.
    pub fn has_pending_message(&self) -> bool {
        lock_ignore_poison(&self.inner.pending).is_some()
    }

    /// Wait until every delivery scheduled so far has run.
    pub async fn flush_deliveries(&self) {
        // ---
        let (tx, rx) = oneshot::channel();
        self.inner.delivery.schedule(Box::new(move || {
            let _ = tx.send(());
        }));
        // Err only if the delivery context dropped the job.
        let _ = rx.await;
    }
}

impl Inner {
    // ---

    fn has_active_channel(&self) -> bool {
        self.transport.activation_state().is_ready()
    }

    fn send(&self, message: Box<dyn OutboundMessage>, on_error: Option<ErrorHandler>) -> Result<()> {
        // ---
        if !self.has_active_channel() {
            log_debug!(
                "{}: session inactive, parking `{}`",
                self.connector_id,
                message.tag()
            );
            *lock_ignore_poison(&self.pending) = Some(message);

            // Activation may have completed between the readiness check and
            // the store, in which case its retry found an empty slot.
            if self.has_active_channel() {
                let reclaimed = lock_ignore_poison(&self.pending).take();
                if let Some(message) = reclaimed {
                    log_debug!("{}: session became active, sending parked message", self.connector_id);
                    return self.send(message, on_error);
                }
            }
            return Err(Error::InactiveSession);
        }

        let payload = encode(message.as_ref())?;
        let transport = self.transport.clone();
        let id = self.connector_id.clone();
        let tag = message.tag();

        self.runtime.spawn(async move {
            if let Err(err) = transport.send_message(payload).await {
                log_warn!("{id}: send of `{tag}` failed: {err}");
                if let Some(on_error) = on_error {
                    on_error(err);
                }
            }
        });

        Ok(())
    }

    /// Route an inbound payload to every subscription on its tag.
    fn dispatch(&self, channel: &'static str, payload: RawPayload) {
        // ---
        let invokers = match tag_of(&payload) {
            Ok(tag) => {
                let invokers = lock_ignore_poison(&self.registry).matching(tag);
                log_trace!(
                    "{}: {channel} `{tag}` -> {} subscriber(s)",
                    self.connector_id,
                    invokers.len()
                );
                invokers
            }
            Err(err) => {
                log_error!("{}: dropping {channel} payload: {err}", self.connector_id);
                return;
            }
        };

        if invokers.is_empty() {
            return;
        }

        let payload = Arc::new(payload);
        for invoke in invokers {
            let payload = payload.clone();
            self.delivery.schedule(Box::new(move || invoke(&payload)));
        }
    }
}

impl SessionDelegate for Inner {
    // ---
    fn activation_did_complete(&self, state: ActivationState, error: Option<&Error>) {
        // ---
        match error {
            Some(err) => log_warn!("{}: activation finished as {state:?}: {err}", self.connector_id),
            None => log_info!("{}: activation finished as {state:?}", self.connector_id),
        }

        // One retry per completion; a still-inactive session parks it again.
        let pending = lock_ignore_poison(&self.pending).take();
        if let Some(message) = pending {
            let tag = message.tag();
            log_debug!("{}: retrying parked `{tag}`", self.connector_id);
            if let Err(err) = self.send(message, None) {
                log_warn!("{}: retry of `{tag}` failed: {err}", self.connector_id);
            }
        }
    }

    fn did_receive_message(&self, payload: RawPayload) {
        self.dispatch("message", payload);
    }

    fn did_receive_application_context(&self, payload: RawPayload) {
        self.dispatch("application context", payload);
    }

    fn did_receive_user_info(&self, payload: RawPayload) {
        self.dispatch("user info", payload);
    }

    fn session_did_become_inactive(&self) {
        log_debug!("{}: session became inactive", self.connector_id);
    }

    fn session_did_deactivate(&self) {
        log_debug!("{}: session deactivated", self.connector_id);
    }

    fn reachability_did_change(&self, reachable: bool) {
        log_debug!("{}: peer reachable = {reachable}", self.connector_id);
    }
}

impl SubscriptionOwner for Inner {
    fn remove_subscription(&self, id: &SubscriptionId) {
        // ---
        // The guard is released at the end of this statement; the invoker is
        // dropped afterwards because it may own another handle.
        let removed = lock_ignore_poison(&self.registry).remove(id);
        drop(removed);
    }

    fn has_subscription(&self, id: &SubscriptionId) -> bool {
        lock_ignore_poison(&self.registry).contains(id)
    }
}
