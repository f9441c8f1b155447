use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::{Message, RawPayload, Result};

type ConvertFn<T> = dyn Fn(&RawPayload) -> Result<T> + Send + Sync;

/// A typed decoding rule bound to one message tag.
///
/// The tag always comes from `T`, so a descriptor cannot disagree with the
/// encoder about which payloads it owns. The connector only hands a
/// descriptor payloads whose tag already matched.
pub struct Descriptor<T> {
    // ---
    tag: &'static str,
    convert: Arc<ConvertFn<T>>,
}

impl<T: Message> Descriptor<T> {
    // ---

    /// Create a descriptor from a hand-written decode function.
    pub fn new<F>(convert: F) -> Self
    where
        F: Fn(&RawPayload) -> Result<T> + Send + Sync + 'static,
    {
        // ---
        Self {
            tag: T::TAG,
            convert: Arc::new(convert),
        }
    }

    /// Tag this descriptor accepts.
    pub fn tag(&self) -> &'static str {
        self.tag
    }

    /// Decode a payload already known to carry this descriptor's tag.
    pub fn convert(&self, payload: &RawPayload) -> Result<T> {
        (self.convert)(payload)
    }
}

impl<T> Descriptor<T>
where
    T: Message + DeserializeOwned,
{
    /// Create a descriptor that decodes through serde.
    pub fn json() -> Self {
        Self::new(crate::from_fields::<T>)
    }
}

impl<T> Clone for Descriptor<T> {
    fn clone(&self) -> Self {
        Self {
            tag: self.tag,
            convert: self.convert.clone(),
        }
    }
}

impl<T> fmt::Debug for Descriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor").field("tag", &self.tag).finish()
    }
}
