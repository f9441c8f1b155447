//! Subscription bookkeeping.
//!
//! A subscription pairs a tag filter with a decode-and-invoke closure. The
//! registry owns them; callers hold a [`SubscriptionHandle`] whose drop
//! removes the entry again.

mod handle;
mod id;
mod registry;

pub use handle::SubscriptionHandle;
pub use id::SubscriptionId;

pub(crate) use handle::SubscriptionOwner;
pub(crate) use registry::SubscriptionRegistry;
