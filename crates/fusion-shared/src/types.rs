use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable participant identifier, as issued by the identity provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The unordered pair of participants that defines a conversation.
///
/// Normalized on construction so that `ConversationKey::new(a, b)` and
/// `ConversationKey::new(b, a)` are the same value and produce the same
/// live-channel topic, whichever side opens the conversation first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    low: UserId,
    high: UserId,
}

impl ConversationKey {
    pub fn new(a: UserId, b: UserId) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    /// Canonical live-channel topic for this pair.
    pub fn topic(&self) -> String {
        format!("chat:{}:{}", self.low, self.high)
    }

    /// The two participants, in canonical (sorted) order.
    pub fn pair(&self) -> (UserId, UserId) {
        (self.low, self.high)
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.low == user || self.high == user
    }

    /// The other participant, if `user` is one of the pair.
    pub fn counterpart_of(&self, user: UserId) -> Option<UserId> {
        if user == self.low {
            Some(self.high)
        } else if user == self.high {
            Some(self.low)
        } else {
            None
        }
    }

    /// Whether a `(sender, receiver)` pair belongs to this conversation.
    pub fn matches(&self, sender: UserId, receiver: UserId) -> bool {
        (sender == self.low && receiver == self.high)
            || (sender == self.high && receiver == self.low)
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.topic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_is_canonical_regardless_of_order() {
        let a = UserId::new();
        let b = UserId::new();
        assert_eq!(
            ConversationKey::new(a, b).topic(),
            ConversationKey::new(b, a).topic()
        );
    }

    #[test]
    fn counterpart_lookup() {
        let a = UserId::new();
        let b = UserId::new();
        let key = ConversationKey::new(a, b);
        assert_eq!(key.counterpart_of(a), Some(b));
        assert_eq!(key.counterpart_of(b), Some(a));
        assert_eq!(key.counterpart_of(UserId::new()), None);
    }

    #[test]
    fn matches_both_directions_only() {
        let a = UserId::new();
        let b = UserId::new();
        let c = UserId::new();
        let key = ConversationKey::new(a, b);
        assert!(key.matches(a, b));
        assert!(key.matches(b, a));
        assert!(!key.matches(a, c));
        assert!(!key.matches(c, b));
    }
}
