use std::fmt;
use std::sync::Weak;

use super::SubscriptionId;

/// Back-reference from a handle to whatever owns its subscription.
pub(crate) trait SubscriptionOwner: Send + Sync {
    fn remove_subscription(&self, id: &SubscriptionId);

    fn has_subscription(&self, id: &SubscriptionId) -> bool;
}

/// Revocation token returned from [`Connector::subscribe`](crate::Connector::subscribe).
///
/// The subscription stays registered while the handle is alive. Dropping the
/// handle unsubscribes; so does
/// [`Connector::unsubscribe`](crate::Connector::unsubscribe), after which the
/// eventual drop is a no-op.
///
/// A handle only refers to its connector weakly: holding one never keeps the
/// connector alive, and a handle outliving its connector is harmless.
///
/// Invocations already queued on the delivery context when the handle goes
/// away still run.
#[must_use = "dropping the handle immediately unsubscribes"]
pub struct SubscriptionHandle {
    // ---
    id: SubscriptionId,
    owner: Weak<dyn SubscriptionOwner>,
}

impl SubscriptionHandle {
    // ---

    pub(crate) fn new(id: SubscriptionId, owner: Weak<dyn SubscriptionOwner>) -> Self {
        Self { id, owner }
    }

    /// Identity of the subscription this handle controls.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// True while the subscription is still registered with a live connector.
    pub fn is_active(&self) -> bool {
        // ---
        self.owner
            .upgrade()
            .is_some_and(|owner| owner.has_subscription(&self.id))
    }

    /// Unsubscribe now. Equivalent to dropping the handle.
    pub fn cancel(self) {}
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        // ---
        if let Some(owner) = self.owner.upgrade() {
            owner.remove_subscription(&self.id);
        }
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
