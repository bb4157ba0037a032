//! In-memory publisher for tests and replay tooling

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::PublishReadings;
use crate::error::{Result, VemSrvError};

/// Records every publication in order
#[derive(Debug, Clone, Default)]
pub struct MemoryPublisher {
    messages: Arc<Mutex<Vec<(String, String)>>>,
    fail: bool,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every publication
    pub fn failing() -> Self {
        Self {
            messages: Arc::default(),
            fail: true,
        }
    }

    /// Snapshot of `(topic, payload)` pairs
    pub fn messages(&self) -> Vec<(String, String)> {
        match self.messages.lock() {
            Ok(messages) => messages.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Last payload published on `topic`
    pub fn last(&self, topic: &str) -> Option<String> {
        self.messages()
            .into_iter()
            .rev()
            .find(|(t, _)| t == topic)
            .map(|(_, payload)| payload)
    }
}

#[async_trait]
impl PublishReadings for MemoryPublisher {
    async fn publish(&self, topic: &str, payload: String) -> Result<()> {
        if self.fail {
            return Err(VemSrvError::publish(format!("{topic}: sink unavailable")));
        }
        match self.messages.lock() {
            Ok(mut messages) => messages.push((topic.to_string(), payload)),
            Err(poisoned) => poisoned.into_inner().push((topic.to_string(), payload)),
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
