use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An opaque message from the model that doesn't need to be processed
/// by the agent loop.
///
/// The agent keeps it in the history in place of the provider-neutral
/// [`crate::AssistantMessage`], since types this crate defines may lose
/// context for the model. `OpaqueMessage` allows
/// model implementors to add arbitrary items to the history messages.
/// For example, some models rely on complete tool call message to work
/// correctly, the model implementor can use this type to store that
/// structure and later serialize to the request payload.
pub struct OpaqueMessage(Arc<dyn OpaqueMessageObject>);

impl OpaqueMessage {
    /// Creates a new `OpaqueMessage`.
    ///
    /// The `id` will be used to identify the message, and is should be
    /// unique across the conversation. Comparing `OpaqueMessage` is just
    /// trivially comparing the `id`.
    #[inline]
    pub fn new<ID: Into<String>, T: Send + Sync + 'static>(
        id: ID,
        value: T,
    ) -> Self {
        let id = id.into();
        Self(Arc::new(OpaqueMessageInner { id, value }))
    }

    /// Returns the identifier of this message.
    #[inline]
    pub fn id(&self) -> &str {
        self.0.id()
    }

    /// Converts the `OpaqueMessage` into its raw type.
    #[inline]
    pub fn to_raw<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref()
    }
}

impl Clone for OpaqueMessage {
    #[inline]
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl Debug for OpaqueMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueMessage")
            .field("id", &self.0.id())
            .finish()
    }
}

impl PartialEq for OpaqueMessage {
    fn eq(&self, other: &Self) -> bool {
        self.0.id() == other.0.id()
    }
}

impl Eq for OpaqueMessage {}

impl Hash for OpaqueMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id().hash(state);
    }
}

trait OpaqueMessageObject: Send + Sync {
    fn id(&self) -> &str;
    fn as_any(&self) -> &dyn Any;
}

struct OpaqueMessageInner<T> {
    id: String,
    value: T,
}

impl<T: Send + Sync + 'static> OpaqueMessageObject for OpaqueMessageInner<T> {
    fn id(&self) -> &str {
        &self.id
    }

    fn as_any(&self) -> &dyn Any {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[derive(Clone)]
    struct ProviderMessage {
        text: String,
        reasoning: Option<String>,
    }

    #[test]
    fn test_downcast() {
        let opaque = OpaqueMessage::new(
            "chatcmpl-1",
            ProviderMessage {
                text: "Water boils at 100°C.".to_owned(),
                reasoning: Some("Looked it up.".to_owned()),
            },
        );
        assert_eq!(opaque.id(), "chatcmpl-1");

        let raw = opaque.to_raw::<ProviderMessage>().unwrap();
        assert_eq!(raw.text, "Water boils at 100°C.");
        assert_eq!(raw.reasoning.as_deref(), Some("Looked it up."));
        assert!(opaque.to_raw::<String>().is_none());
    }

    #[test]
    fn test_identity_by_id() {
        let first = OpaqueMessage::new("msg:2", "first".to_owned());
        let same_id = OpaqueMessage::new("msg:2", "other payload".to_owned());
        let second = OpaqueMessage::new("msg:4", "second".to_owned());

        assert_eq!(first, same_id);
        assert_ne!(first, second);

        let set: HashSet<_> = [first.clone(), same_id, second].into();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&first));
    }
}
