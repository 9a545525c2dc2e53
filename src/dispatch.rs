//! Dispatch engine: executes classified actions against the brain and the
//! social client, with dismissal bookkeeping and backlog catch-up.
//!
//! All brain-mutating and social-mutating calls in the process funnel through
//! this type's action gate, so a stream notification, an operator command,
//! and a scheduled auto-post can never run a mutating call concurrently.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
    brain::BrainHandle,
    classify::{classify, user_help},
    domain::{
        Account, ClassifiedAction, Notification, NotificationKind, SessionContext, Status,
        StatusId, Visibility,
    },
    ports::{LogSink, SocialClient},
    text, Result,
};

pub struct Dispatcher {
    ctx: SessionContext,
    social: Arc<dyn SocialClient>,
    brain: Arc<BrainHandle>,
    journal: Arc<dyn LogSink>,
    gate: Mutex<()>,
}

impl Dispatcher {
    pub fn new(
        ctx: SessionContext,
        social: Arc<dyn SocialClient>,
        brain: Arc<BrainHandle>,
        journal: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            ctx,
            social,
            brain,
            journal,
            gate: Mutex::new(()),
        }
    }

    pub fn ctx(&self) -> &SessionContext {
        &self.ctx
    }

    /// Classify and execute one notification, then dismiss it by id whether
    /// or not execution succeeded. A failed learn or reply must not come back
    /// through re-delivery.
    ///
    /// Returns true when the action was actionable: anything other than
    /// Ignore, and execution did not fail.
    pub async fn handle(&self, notification: &Notification) -> bool {
        let action = classify(notification, &self.ctx);
        let handled = match self.execute(notification, &action).await {
            Ok(actionable) => actionable,
            Err(e) => {
                self.journal.record(&format!(
                    "* @{} experienced an error handling a notification: {e}",
                    self.ctx.acct
                ));
                false
            }
        };

        if let Err(e) = self.social.dismiss(&notification.id).await {
            tracing::warn!(id = %notification.id.0, error = %e, "failed to dismiss notification");
        }

        handled
    }

    /// Consume a finite backlog, short-circuiting if `cancel` fires between
    /// items or while one is being handled. Individual failures are logged
    /// inside `handle` and never stop the sweep. Returns (actionable, total
    /// processed).
    pub async fn drain_backlog(
        &self,
        items: Vec<Notification>,
        cancel: &CancellationToken,
    ) -> (usize, usize) {
        let mut actionable = 0usize;
        let mut total = 0usize;
        for notification in &items {
            if cancel.is_cancelled() {
                break;
            }
            // Cancellation also interrupts a stuck collaborator call, so an
            // operator interrupt is never held up by a slow item.
            let handled = tokio::select! {
                _ = cancel.cancelled() => break,
                handled = self.handle(notification) => handled,
            };
            if handled {
                actionable += 1;
            }
            total += 1;
        }
        (actionable, total)
    }

    async fn execute(&self, notification: &Notification, action: &ClassifiedAction) -> Result<bool> {
        // One inbound line per status-bearing event we act on.
        if !matches!(action, ClassifiedAction::Ignore)
            && notification.kind != NotificationKind::Follow
        {
            if let Some(status) = &notification.status {
                self.journal.record(&format!(
                    "{} <@{}> {}",
                    status.visibility.glyph(),
                    notification.account.acct,
                    status.text
                ));
            }
        }

        match action {
            ClassifiedAction::Ignore => Ok(false),

            ClassifiedAction::RecordFollow { account } => {
                self.journal.record(&format!(
                    "🤝 @{} ({}) follows @{}",
                    account.acct, account.id.0, self.ctx.acct
                ));
                Ok(true)
            }

            ClassifiedAction::LearnOnly { text } => {
                let _serial = self.gate.lock().await;
                self.brain.learn_and_persist(text).await?;
                self.journal.record(&format!(
                    "💭 @{} learns from @{}: {}",
                    self.ctx.acct, notification.account.acct, text
                ));
                Ok(true)
            }

            ClassifiedAction::ReplyWithLearn {
                text,
                reply_to,
                account,
            } => {
                let _serial = self.gate.lock().await;
                let budget = self.ctx.reply_budget(&account.acct);
                let raw = self.brain.reply_with_learn(text, budget).await?;
                self.journal.record(&format!(
                    "💭 @{} learns from @{}: {}",
                    self.ctx.acct, account.acct, text
                ));
                self.send_reply(account, reply_to, &text::format_reply(&raw, budget))
                    .await?;
                Ok(true)
            }

            ClassifiedAction::ReplyNoLearn {
                text,
                reply_to,
                account,
            } => {
                let _serial = self.gate.lock().await;
                let budget = self.ctx.reply_budget(&account.acct);
                let raw = self.brain.reply_nolearn(text, budget).await?;
                self.send_reply(account, reply_to, &text::format_reply(&raw, budget))
                    .await?;
                Ok(true)
            }

            ClassifiedAction::ReplyHelp { reply_to, account } => {
                let _serial = self.gate.lock().await;
                self.send_reply(account, reply_to, &user_help(&self.ctx))
                    .await?;
                Ok(true)
            }

            ClassifiedAction::FollowRequest { account, follow } => {
                let _serial = self.gate.lock().await;
                self.follow_raw(account, *follow).await?;
                Ok(true)
            }
        }
    }

    async fn send_reply(&self, account: &Account, reply_to: &Status, reply: &str) -> Result<()> {
        let visibility = reply_to.visibility.for_reply();
        self.social.reply_to(&reply_to.id, reply, visibility).await?;
        self.journal.record(&format!(
            "{} <@{}> @{} {}",
            visibility.glyph(),
            self.ctx.acct,
            account.acct,
            reply.replace('\n', " ")
        ));
        Ok(())
    }

    async fn follow_raw(&self, account: &Account, follow: bool) -> Result<()> {
        if follow {
            self.social.follow(&account.id).await?;
        } else {
            self.social.unfollow(&account.id).await?;
        }
        self.journal.record(&format!(
            "{} @{} {}follows @{} ({})",
            if follow { "✔️" } else { "❌" },
            self.ctx.acct,
            if follow { "" } else { "un" },
            account.acct,
            account.id.0
        ));
        Ok(())
    }

    // --- shared action primitives ---
    //
    // The command runner and the auto-post scheduler go through these so a
    // manual trigger and an automated one share one code path per action.

    /// Follow or unfollow, gated.
    pub async fn follow_action(&self, account: &Account, follow: bool) -> Result<()> {
        let _serial = self.gate.lock().await;
        self.follow_raw(account, follow).await
    }

    /// Block or unblock an account, gated.
    pub async fn block_action(&self, account: &Account, block: bool) -> Result<()> {
        let _serial = self.gate.lock().await;
        if block {
            self.social.block_account(&account.id).await?;
        } else {
            self.social.unblock_account(&account.id).await?;
        }
        self.journal.record(&format!(
            "{} @{} {}blocks {} ({})",
            if block { "⛔" } else { "🆗" },
            self.ctx.username,
            if block { "" } else { "un" },
            account.acct,
            account.id.0
        ));
        Ok(())
    }

    /// Block or unblock a whole domain, gated.
    pub async fn block_domain_action(&self, domain: &str, block: bool) -> Result<()> {
        let _serial = self.gate.lock().await;
        if block {
            self.social.block_domain(domain).await?;
        } else {
            self.social.unblock_domain(domain).await?;
        }
        self.journal.record(&format!(
            "{} @{} {}blocks domain {domain}",
            if block { "⛔" } else { "🆗" },
            self.ctx.username,
            if block { "" } else { "un" }
        ));
        Ok(())
    }

    /// Post a status, gated. Auto-posts get a clock tag in the journal.
    pub async fn post(&self, text: &str, visibility: Visibility, auto: bool) -> Result<StatusId> {
        let _serial = self.gate.lock().await;
        let id = self.social.post_status(text, visibility).await?;
        self.journal.record(&format!(
            "{} {}<@{}> {}",
            visibility.glyph(),
            if auto { "⏰ " } else { "" },
            self.ctx.acct,
            text
        ));
        Ok(id)
    }

    /// Learn one string, gated. Journaling is left to the caller, which
    /// knows where the string came from.
    pub async fn learn(&self, text: &str) -> Result<()> {
        let _serial = self.gate.lock().await;
        self.brain.learn_and_persist(text).await
    }

    /// Learn a file of strings, gated.
    pub async fn train(&self, path: &Path) -> Result<()> {
        let _serial = self.gate.lock().await;
        self.brain.train_and_persist(path).await
    }

    /// No-learn brain query, gated. An empty input asks for a random line.
    pub async fn query_nolearn(&self, text: &str, max_len: usize) -> Result<String> {
        let _serial = self.gate.lock().await;
        self.brain.reply_nolearn(text, max_len).await
    }
}
