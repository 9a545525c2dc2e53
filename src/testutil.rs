//! Recording fakes for the ports, shared by the unit tests.

use std::{
    collections::VecDeque,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{
        Account, AccountId, Notification, NotificationId, NotificationKind, SessionContext,
        Status, StatusId, Visibility,
    },
    errors::Error,
    ports::{
        Brain, Console, Identity, LogSink, ProfileSummary, Relationship, SocialClient,
        StreamEvent, WeatherProvider,
    },
    Result,
};

pub fn ctx() -> SessionContext {
    SessionContext {
        account_id: AccountId("self".to_string()),
        acct: "bot@example.social".to_string(),
        username: "bot".to_string(),
        max_post_length: 500,
    }
}

pub fn status_notif(id: &str, actor: &str, text: &str, visibility: Visibility) -> Notification {
    notif(id, NotificationKind::Status, actor, text, visibility)
}

pub fn mention(id: &str, actor: &str, text: &str, visibility: Visibility) -> Notification {
    notif(id, NotificationKind::Mention, actor, text, visibility)
}

fn notif(
    id: &str,
    kind: NotificationKind,
    actor: &str,
    text: &str,
    visibility: Visibility,
) -> Notification {
    Notification {
        id: NotificationId(id.to_string()),
        kind,
        account: Account {
            id: AccountId(actor.to_string()),
            acct: format!("{actor}@example.social"),
        },
        status: Some(Status {
            id: StatusId(format!("s-{id}")),
            text: text.to_string(),
            visibility,
            in_reply_to: None,
        }),
    }
}

/// Social client that records every call as a `name:arg` string.
///
/// With `hold_replies` set, `reply_to` parks on `reply_release` (signalling
/// `reply_entered` first) so tests can pin down what runs while a reply is
/// in flight. With `stream_fails` set, `stream` returns an error instead of
/// waiting for cancellation.
#[derive(Default)]
pub struct RecordingSocial {
    calls: Mutex<Vec<String>>,
    pub lookup_result: Mutex<Option<Account>>,
    pub relationship: Mutex<Relationship>,
    pub backlog_items: Mutex<Vec<Notification>>,
    pub blocked_accounts: Mutex<Vec<Account>>,
    pub blocked_domains: Mutex<Vec<String>>,
    pub hold_replies: AtomicBool,
    pub reply_entered: Notify,
    pub reply_release: Notify,
    pub stream_fails: AtomicBool,
}

impl RecordingSocial {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn set_lookup(&self, account: Account) {
        *self.lookup_result.lock().unwrap() = Some(account);
    }

    pub fn set_relationship(&self, relationship: Relationship) {
        *self.relationship.lock().unwrap() = relationship;
    }
}

#[async_trait]
impl SocialClient for RecordingSocial {
    async fn verify_identity(&self) -> Result<Identity> {
        Ok(Identity {
            account_id: AccountId("self".to_string()),
            acct: "bot@example.social".to_string(),
            username: "bot".to_string(),
        })
    }

    async fn backlog(&self) -> Result<Vec<Notification>> {
        self.push("backlog".to_string());
        Ok(self.backlog_items.lock().unwrap().clone())
    }

    async fn dismiss(&self, id: &NotificationId) -> Result<()> {
        self.push(format!("dismiss:{}", id.0));
        Ok(())
    }

    async fn post_status(&self, text: &str, visibility: Visibility) -> Result<StatusId> {
        self.push(format!("post:{text}:{}", visibility.as_str()));
        Ok(StatusId("posted".to_string()))
    }

    async fn reply_to(
        &self,
        status: &StatusId,
        text: &str,
        visibility: Visibility,
    ) -> Result<StatusId> {
        if self.hold_replies.load(Ordering::SeqCst) {
            self.reply_entered.notify_one();
            self.reply_release.notified().await;
        }
        self.push(format!("reply_to:{}:{text}:{}", status.0, visibility.as_str()));
        Ok(StatusId("replied".to_string()))
    }

    async fn follow(&self, id: &AccountId) -> Result<()> {
        self.push(format!("follow:{}", id.0));
        Ok(())
    }

    async fn unfollow(&self, id: &AccountId) -> Result<()> {
        self.push(format!("unfollow:{}", id.0));
        Ok(())
    }

    async fn block_account(&self, id: &AccountId) -> Result<()> {
        self.push(format!("block_account:{}", id.0));
        Ok(())
    }

    async fn unblock_account(&self, id: &AccountId) -> Result<()> {
        self.push(format!("unblock_account:{}", id.0));
        Ok(())
    }

    async fn block_domain(&self, domain: &str) -> Result<()> {
        self.push(format!("block_domain:{domain}"));
        Ok(())
    }

    async fn unblock_domain(&self, domain: &str) -> Result<()> {
        self.push(format!("unblock_domain:{domain}"));
        Ok(())
    }

    async fn lookup_account(&self, handle: &str) -> Result<Option<Account>> {
        self.push(format!("lookup:{handle}"));
        Ok(self.lookup_result.lock().unwrap().clone())
    }

    async fn relationship(&self, id: &AccountId) -> Result<Relationship> {
        self.push(format!("relationship:{}", id.0));
        Ok(*self.relationship.lock().unwrap())
    }

    async fn list_blocked_accounts(&self) -> Result<Vec<Account>> {
        self.push("list_blocked_accounts".to_string());
        Ok(self.blocked_accounts.lock().unwrap().clone())
    }

    async fn list_blocked_domains(&self) -> Result<Vec<String>> {
        self.push("list_blocked_domains".to_string());
        Ok(self.blocked_domains.lock().unwrap().clone())
    }

    async fn profile_summary(&self) -> Result<ProfileSummary> {
        self.push("profile_summary".to_string());
        Ok(ProfileSummary {
            display_name: "Gibber".to_string(),
            followers: 3,
            following: 2,
            statuses: 14,
        })
    }

    async fn set_presence(&self, text: &str) -> Result<()> {
        self.push(format!("set_presence:{text}"));
        Ok(())
    }

    async fn stream(
        &self,
        _events: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) -> Result<()> {
        if self.stream_fails.load(Ordering::SeqCst) {
            return Err(Error::Stream("stub disconnect".to_string()));
        }
        cancel.cancelled().await;
        Ok(())
    }
}

/// Brain stub with canned replies and call recording. With `stall` set,
/// every mutating call parks forever; it only ends when its future is
/// dropped.
pub struct StubBrain {
    pub fail: bool,
    pub stall: bool,
    pub reply: String,
    pub learned: Arc<Mutex<Vec<String>>>,
    pub queries: Arc<Mutex<Vec<String>>>,
    pub persists: Arc<Mutex<usize>>,
}

impl Default for StubBrain {
    fn default() -> Self {
        Self::with_reply("babble")
    }
}

impl StubBrain {
    pub fn with_reply(reply: &str) -> Self {
        Self {
            fail: false,
            stall: false,
            reply: reply.to_string(),
            learned: Arc::new(Mutex::new(Vec::new())),
            queries: Arc::new(Mutex::new(Vec::new())),
            persists: Arc::new(Mutex::new(0)),
        }
    }

    async fn check(&self) -> Result<()> {
        if self.stall {
            std::future::pending::<()>().await;
        }
        if self.fail {
            return Err(Error::Brain("stub failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Brain for StubBrain {
    async fn learn(&mut self, text: &str) -> Result<()> {
        self.check().await?;
        self.learned.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn reply(&mut self, text: &str, _max_len: usize) -> Result<String> {
        self.check().await?;
        self.learned.lock().unwrap().push(text.to_string());
        self.queries.lock().unwrap().push(text.to_string());
        Ok(self.reply.clone())
    }

    async fn reply_nolearn(&mut self, text: &str, _max_len: usize) -> Result<String> {
        self.check().await?;
        self.queries.lock().unwrap().push(text.to_string());
        Ok(self.reply.clone())
    }

    async fn persist(&mut self) -> Result<()> {
        self.check().await?;
        *self.persists.lock().unwrap() += 1;
        Ok(())
    }

    async fn train(&mut self, path: &Path) -> Result<()> {
        self.check().await?;
        self.learned
            .lock()
            .unwrap()
            .push(format!("file:{}", path.display()));
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Console with a scripted reply queue.
#[derive(Default)]
pub struct ScriptedConsole {
    replies: Mutex<VecDeque<String>>,
    printed: Mutex<Vec<String>>,
}

impl ScriptedConsole {
    pub fn with_replies(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
            printed: Mutex::new(Vec::new()),
        }
    }

    pub fn printed(&self) -> Vec<String> {
        self.printed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Console for ScriptedConsole {
    async fn prompt(&self, _prompt: &str) -> Result<String> {
        Ok(self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    fn print(&self, line: &str) {
        self.printed.lock().unwrap().push(line.to_string());
    }
}

/// Log sink that keeps lines in memory.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl LogSink for MemorySink {
    fn log(&self, line: &str, _to_screen: bool, _to_file: bool, _timestamp: bool) {
        self.lines.lock().unwrap().push(line.to_string());
    }

    fn tail(&self, n: usize) -> Vec<String> {
        let lines = self.lines.lock().unwrap();
        lines.iter().rev().take(n).rev().cloned().collect()
    }
}

/// Weather provider with a fixed summary.
pub struct StubWeather(pub Option<String>);

#[async_trait]
impl WeatherProvider for StubWeather {
    async fn current_summary(&self) -> Option<String> {
        self.0.clone()
    }
}
