//! Hexagonal ports for the engine's collaborators.
//!
//! The social-network transport, the generative brain, the operator console,
//! and the weather lookup are all external; adapter crates implement these
//! traits. The engine only ever holds them as `Arc<dyn …>`.

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{Account, AccountId, Notification, NotificationId, StatusId, Visibility},
    Result,
};

/// Identity of the bot's own account, fetched once at connect time.
#[derive(Clone, Debug)]
pub struct Identity {
    pub account_id: AccountId,
    pub acct: String,
    pub username: String,
}

/// Relationship of the bot to another account.
#[derive(Clone, Copy, Debug, Default)]
pub struct Relationship {
    pub following: bool,
    pub blocking: bool,
    pub domain_blocking: bool,
}

/// Profile counters for the `/info` command.
#[derive(Clone, Debug, Default)]
pub struct ProfileSummary {
    pub display_name: String,
    pub followers: u64,
    pub following: u64,
    pub statuses: u64,
}

/// Message kinds delivered on the stream channel. Heartbeats drive the
/// auto-post scheduler; a disconnect triggers backlog re-sync.
#[derive(Clone, Debug)]
pub enum StreamEvent {
    Notification(Notification),
    Heartbeat,
    Disconnected,
}

/// Port onto the social network.
///
/// Every call may fail; failures are logged and never fatal to the process.
#[async_trait]
pub trait SocialClient: Send + Sync {
    async fn verify_identity(&self) -> Result<Identity>;

    /// Undelivered notifications, in the order the platform returns them.
    /// The engine does not re-order.
    async fn backlog(&self) -> Result<Vec<Notification>>;

    /// Dismiss a notification. Idempotent on the platform side.
    async fn dismiss(&self, id: &NotificationId) -> Result<()>;

    async fn post_status(&self, text: &str, visibility: Visibility) -> Result<StatusId>;
    async fn reply_to(
        &self,
        status: &StatusId,
        text: &str,
        visibility: Visibility,
    ) -> Result<StatusId>;

    async fn follow(&self, id: &AccountId) -> Result<()>;
    async fn unfollow(&self, id: &AccountId) -> Result<()>;

    async fn block_account(&self, id: &AccountId) -> Result<()>;
    async fn unblock_account(&self, id: &AccountId) -> Result<()>;
    async fn block_domain(&self, domain: &str) -> Result<()>;
    async fn unblock_domain(&self, domain: &str) -> Result<()>;

    /// Resolve a handle to an account, `None` when the platform reports
    /// no such account.
    async fn lookup_account(&self, handle: &str) -> Result<Option<Account>>;
    async fn relationship(&self, id: &AccountId) -> Result<Relationship>;

    async fn list_blocked_accounts(&self) -> Result<Vec<Account>>;
    async fn list_blocked_domains(&self) -> Result<Vec<String>>;

    async fn profile_summary(&self) -> Result<ProfileSummary>;

    /// Update the presence field on the bot's profile (`ONLINE since …`).
    async fn set_presence(&self, text: &str) -> Result<()>;

    /// Run the live push stream, sending `Notification` and `Heartbeat`
    /// events until the connection drops, `cancel` fires, or the channel
    /// closes. Returns on disconnect; the session owns reconnect policy.
    async fn stream(
        &self,
        events: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) -> Result<()>;
}

/// Port onto the generative/learning text engine.
///
/// The engine is stateful and not assumed safe for concurrent use; the core
/// serializes every call through [`crate::brain::BrainHandle`].
#[async_trait]
pub trait Brain: Send + Sync {
    async fn learn(&mut self, text: &str) -> Result<()>;

    /// Learn from `text` and produce a reply of at most `max_len` characters.
    async fn reply(&mut self, text: &str, max_len: usize) -> Result<String>;

    /// Produce a reply without learning from the input.
    async fn reply_nolearn(&mut self, text: &str, max_len: usize) -> Result<String>;

    /// Flush learned state to the brain's own persistence.
    async fn persist(&mut self) -> Result<()>;

    /// Learn from a file of strings, one per line.
    async fn train(&mut self, path: &Path) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

/// Port onto the operator console. Line editing, history, and rendering are
/// adapter concerns; the engine only needs lines in and lines out.
#[async_trait]
pub trait Console: Send + Sync {
    /// Show `prompt` and read one line of input.
    async fn prompt(&self, prompt: &str) -> Result<String>;

    fn print(&self, line: &str);
}

/// Port onto a weather lookup. Failures degrade to `None`; the auto-post
/// simply omits the weather clause.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current_summary(&self) -> Option<String>;
}

/// Fire-and-forget activity log. The engine never checks whether a write
/// landed.
pub trait LogSink: Send + Sync {
    fn log(&self, line: &str, to_screen: bool, to_file: bool, timestamp: bool);

    /// Last `n` lines of the persisted log, oldest first.
    fn tail(&self, n: usize) -> Vec<String>;

    /// The common case: timestamped, to both screen and file.
    fn record(&self, line: &str) {
        self.log(line, true, true, true);
    }
}
