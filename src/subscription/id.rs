use std::fmt;
use uuid::Uuid;

/// Identity of one subscription.
///
/// Generated fresh for every subscribe call; never reused, even after the
/// subscription is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    // ---

    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        write!(f, "sub-{}", self.0.simple())
    }
}
