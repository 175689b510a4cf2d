/// The topics the client wants to be joined to.
///
/// This is intent, not confirmed server state: it survives reconnects and is
/// replayed as join frames on every open. Insertion order is kept so rejoins
/// go out in the order topics were first joined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    topics: Vec<String>,
}

impl Membership {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a topic. Returns `false` if it was already present.
    pub fn insert(&mut self, topic: &str) -> bool {
        if self.contains(topic) {
            return false;
        }
        self.topics.push(topic.to_owned());
        true
    }

    /// Remove a topic. Returns `false` if it was not present.
    pub fn remove(&mut self, topic: &str) -> bool {
        let before = self.topics.len();
        self.topics.retain(|t| t != topic);
        self.topics.len() != before
    }

    #[must_use]
    pub fn contains(&self, topic: &str) -> bool {
        self.topics.iter().any(|t| t == topic)
    }

    pub fn clear(&mut self) {
        self.topics.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.topics.clone()
    }
}
