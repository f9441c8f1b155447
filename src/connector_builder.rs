//! Connector builder.
//!
//! Provides a fluent builder API for wiring a [`Connector`] to a session
//! transport and a delivery context.

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::{Connector, DeliveryContext, DeliveryQueue, Error, Result, TransportPtr};

/// Builder for creating connectors.
///
/// # Examples
///
/// ## Defaults
/// ```
/// use session_link::{ConnectorBuilder, MemorySession, SessionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> session_link::Result<()> {
/// let session = MemorySession::new(SessionConfig::new("phone"));
/// let connector = ConnectorBuilder::new(session).build()?;
/// assert!(connector.has_active_channel());
/// # Ok(())
/// # }
/// ```
///
/// ## Deferred activation
/// ```
/// use session_link::{ConnectorBuilder, MemorySession, SessionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> session_link::Result<()> {
/// let session = MemorySession::new(SessionConfig::new("phone"));
/// let connector = ConnectorBuilder::new(session.clone())
///     .connector_id("companion")
///     .activate_on_build(false)
///     .build()?;
///
/// assert!(!connector.has_active_channel());
/// assert_eq!(connector.connector_id(), "companion");
/// # Ok(())
/// # }
/// ```
pub struct ConnectorBuilder {
    // ---
    transport: TransportPtr,
    connector_id: Option<String>,
    delivery: Option<Arc<dyn DeliveryContext>>,
    activate_on_build: bool,
    runtime: Option<Handle>,
}

impl ConnectorBuilder {
    /// Create a new connector builder.
    ///
    /// The connector id defaults to `transport.transport_id()`.
    pub fn new(transport: TransportPtr) -> Self {
        // ---
        Self {
            transport,
            connector_id: None,
            delivery: None,
            activate_on_build: true,
            runtime: None,
        }
    }

    /// Override the id used in logs.
    pub fn connector_id(mut self, id: impl Into<String>) -> Self {
        self.connector_id = Some(id.into());
        self
    }

    /// Deliver subscriber callbacks on a custom serial context.
    ///
    /// Default: a [`DeliveryQueue`] task on the connector's runtime.
    pub fn delivery_context(mut self, delivery: Arc<dyn DeliveryContext>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    /// Activate the session while building.
    ///
    /// Default: true. Unsupported transports are never activated.
    pub fn activate_on_build(mut self, activate: bool) -> Self {
        self.activate_on_build = activate;
        self
    }

    /// Run send tasks and the default delivery queue on this runtime.
    ///
    /// Default: the runtime `build()` is called from.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Build the connector (consumes self).
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingRuntime`] when no runtime was given and
    /// `build()` is called outside of one, or whatever the transport reports
    /// from `activate()`.
    pub fn build(self) -> Result<Connector> {
        // ---
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| Error::MissingRuntime)?,
        };

        let connector_id = self
            .connector_id
            .unwrap_or_else(|| self.transport.transport_id().to_string());

        let delivery = self
            .delivery
            .unwrap_or_else(|| Arc::new(DeliveryQueue::spawn(&runtime)) as Arc<dyn DeliveryContext>);

        Connector::new(
            self.transport,
            connector_id,
            runtime,
            delivery,
            self.activate_on_build,
        )
    }
}
