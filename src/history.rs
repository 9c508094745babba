use crate::ai::Message;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Thread-history collaborator. The pipeline builds each conversation
/// fresh per turn and persists nothing itself; prior turns come from
/// whatever store sits behind this trait.
#[async_trait]
pub trait ThreadHistory: Send + Sync {
    async fn fetch(&self, conversation_id: &str) -> Vec<Message>;
}

/// Process-local history, keyed by conversation id. Suitable for tests
/// and single-process deployments.
pub struct InMemoryHistory {
    threads: Mutex<HashMap<String, Vec<Message>>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        InMemoryHistory {
            threads: Mutex::new(HashMap::new()),
        }
    }

    pub fn record(&self, conversation_id: &str, message: Message) {
        let mut threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
        threads
            .entry(conversation_id.to_string())
            .or_default()
            .push(message);
    }
}

impl Default for InMemoryHistory {
    fn default() -> Self {
        InMemoryHistory::new()
    }
}

#[async_trait]
impl ThreadHistory for InMemoryHistory {
    async fn fetch(&self, conversation_id: &str) -> Vec<Message> {
        let threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
        threads.get(conversation_id).cloned().unwrap_or_default()
    }
}
