//! Serialized access to the shared brain.
//!
//! The underlying engine is stateful and not safe for concurrent use, so
//! every logical learn-or-reply operation takes the handle's lock for its
//! whole duration, persistence included. One handle is shared process-wide
//! by the dispatcher, the command runner, and the auto-post scheduler.

use std::path::Path;

use tokio::sync::Mutex;

use crate::{ports::Brain, Result};

pub struct BrainHandle {
    inner: Mutex<Box<dyn Brain>>,
}

impl BrainHandle {
    pub fn new(brain: Box<dyn Brain>) -> Self {
        Self {
            inner: Mutex::new(brain),
        }
    }

    /// Learn one string and flush.
    pub async fn learn_and_persist(&self, text: &str) -> Result<()> {
        let mut brain = self.inner.lock().await;
        brain.learn(text).await?;
        brain.persist().await
    }

    /// Learn from the input, produce a reply, and flush.
    pub async fn reply_with_learn(&self, text: &str, max_len: usize) -> Result<String> {
        let mut brain = self.inner.lock().await;
        let reply = brain.reply(text, max_len).await?;
        brain.persist().await?;
        Ok(reply)
    }

    /// Produce a reply without learning. An empty input asks for a random
    /// line.
    pub async fn reply_nolearn(&self, text: &str, max_len: usize) -> Result<String> {
        let mut brain = self.inner.lock().await;
        brain.reply_nolearn(text, max_len).await
    }

    /// Learn a whole file of strings and flush.
    pub async fn train_and_persist(&self, path: &Path) -> Result<()> {
        let mut brain = self.inner.lock().await;
        brain.train(path).await?;
        brain.persist().await
    }

    pub async fn close(&self) -> Result<()> {
        let mut brain = self.inner.lock().await;
        brain.close().await
    }
}
