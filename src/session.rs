//! Session engine: owns the bot lifecycle from connect to shutdown.
//!
//! `Engine::connect` resolves the bot's identity and wires the dispatcher,
//! the auto-poster, and the command runner together; `Engine::run` then
//! drives three concerns until the operator exits:
//!
//! - a stream supervisor that keeps the push stream alive with bounded
//!   reconnect attempts,
//! - a single worker that consumes stream events in order, so notification
//!   handling never interleaves,
//! - the operator console loop.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::{Local, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    brain::BrainHandle,
    commands::{CommandRunner, Outcome},
    config::Config,
    dispatch::Dispatcher,
    domain::{BotState, SessionContext},
    errors::Error,
    journal::Journal,
    ports::{Brain, Console, LogSink, SocialClient, StreamEvent, WeatherProvider},
    scheduler::AutoPoster,
    Result,
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Lifecycle guard. Transitions only ever move forward; anything else is a
/// programming error surfaced as [`Error::State`].
///
/// Also tracks whether live stream delivery is still up: the supervisor
/// flips `stream_live` off when its reconnect budget runs out, and anything
/// holding the lifecycle can observe that the session has gone passive.
pub struct Lifecycle {
    state: std::sync::Mutex<BotState>,
    stream_live: AtomicBool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: std::sync::Mutex::new(BotState::Uninitialized),
            stream_live: AtomicBool::new(true),
        }
    }

    pub fn current(&self) -> BotState {
        *self.state.lock().expect("lifecycle lock")
    }

    pub fn stream_live(&self) -> bool {
        self.stream_live.load(Ordering::SeqCst)
    }

    pub fn mark_stream_lost(&self) {
        self.stream_live.store(false, Ordering::SeqCst);
    }

    pub fn transition(&self, to: BotState) -> Result<()> {
        let mut state = self.state.lock().expect("lifecycle lock");
        let legal = matches!(
            (*state, to),
            (BotState::Uninitialized, BotState::Connected)
                | (BotState::Connected, BotState::Running)
                | (BotState::Uninitialized, BotState::Stopped)
                | (BotState::Connected, BotState::Stopped)
                | (BotState::Running, BotState::Stopped)
        );
        if !legal {
            return Err(Error::State(format!(
                "illegal transition {:?} -> {to:?}",
                *state
            )));
        }
        *state = to;
        Ok(())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Engine {
    cfg: Config,
    ctx: SessionContext,
    lifecycle: Arc<Lifecycle>,
    social: Arc<dyn SocialClient>,
    brain: Arc<BrainHandle>,
    dispatcher: Arc<Dispatcher>,
    poster: Arc<AutoPoster>,
    runner: CommandRunner,
    console: Arc<dyn Console>,
    journal: Arc<dyn LogSink>,
    cancel: CancellationToken,
}

impl Engine {
    /// Verify credentials and wire the engine together. Nothing is posted
    /// and no stream is opened yet.
    pub async fn connect(
        cfg: Config,
        social: Arc<dyn SocialClient>,
        brain: Box<dyn Brain>,
        console: Arc<dyn Console>,
        weather: Option<Arc<dyn WeatherProvider>>,
    ) -> Result<Self> {
        let identity = social.verify_identity().await?;
        let ctx = SessionContext {
            account_id: identity.account_id,
            acct: identity.acct,
            username: identity.username,
            max_post_length: cfg.max_post_length,
        };
        tracing::info!(acct = %ctx.acct, "connected");

        let journal: Arc<dyn LogSink> = Arc::new(Journal::open(&cfg.data_dir, &ctx.username));
        let brain = Arc::new(BrainHandle::new(brain));
        let dispatcher = Arc::new(Dispatcher::new(
            ctx.clone(),
            social.clone(),
            brain.clone(),
            journal.clone(),
        ));
        let poster = Arc::new(AutoPoster::new(
            cfg.auto_post,
            cfg.auto_times.clone(),
            cfg.max_post_length,
            cfg.data_dir.join(format!("{}.last", ctx.username)),
            dispatcher.clone(),
            weather,
            journal.clone(),
        ));
        let runner = CommandRunner::new(
            dispatcher.clone(),
            social.clone(),
            console.clone(),
            journal.clone(),
            cfg.command_prefix.clone(),
            cfg.recap_lines,
        );

        let lifecycle = Arc::new(Lifecycle::new());
        lifecycle.transition(BotState::Connected)?;

        Ok(Self {
            cfg,
            ctx,
            lifecycle,
            social,
            brain,
            dispatcher,
            poster,
            runner,
            console,
            journal,
            cancel: CancellationToken::new(),
        })
    }

    pub fn state(&self) -> BotState {
        self.lifecycle.current()
    }

    /// Whether live stream delivery is still up (false once the reconnect
    /// budget is exhausted).
    pub fn stream_live(&self) -> bool {
        self.lifecycle.stream_live()
    }

    /// Run until the operator confirms an exit.
    pub async fn run(self) -> Result<()> {
        self.lifecycle.transition(BotState::Running)?;

        // Recap the tail of the previous session before anything new lands.
        for line in self.journal.tail(self.cfg.recap_lines) {
            self.console.print(&line);
        }

        let since = Local::now().format("%Y-%m-%d %H:%M").to_string();
        if let Err(e) = self
            .social
            .set_presence(&format!("🟢 ONLINE since {since}"))
            .await
        {
            tracing::warn!(error = %e, "failed to set online presence");
        }
        self.journal
            .record(&format!("🟢 @{} is ONLINE", self.ctx.acct));

        // Catch up on whatever arrived while we were offline.
        Self::resync(&self.social, &self.dispatcher, &self.journal, &self.cancel).await;

        let (tx, rx) = mpsc::channel::<StreamEvent>(EVENT_CHANNEL_CAPACITY);
        let supervisor = tokio::spawn(Self::supervise_stream(
            self.social.clone(),
            tx,
            self.cancel.clone(),
            self.cfg.reconnect_attempts,
            self.cfg.reconnect_wait,
            self.journal.clone(),
            self.lifecycle.clone(),
            self.ctx.acct.clone(),
        ));
        let worker = tokio::spawn(Self::run_worker(
            rx,
            self.social.clone(),
            self.dispatcher.clone(),
            self.poster.clone(),
            self.journal.clone(),
            self.cancel.clone(),
        ));

        loop {
            let line = match self.console.prompt("> ").await {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(error = %e, "console closed, shutting down");
                    break;
                }
            };
            if matches!(self.runner.run(&line).await, Outcome::Exit) {
                break;
            }
        }

        self.cancel.cancel();
        let _ = supervisor.await;
        let _ = worker.await;

        self.lifecycle.transition(BotState::Stopped)?;

        let since = Local::now().format("%Y-%m-%d %H:%M").to_string();
        if let Err(e) = self
            .social
            .set_presence(&format!("🔴 OFFLINE since {since}"))
            .await
        {
            tracing::warn!(error = %e, "failed to set offline presence");
        }
        self.journal
            .record(&format!("🔴 @{} is OFFLINE", self.ctx.acct));

        if let Err(e) = self.brain.close().await {
            tracing::warn!(error = %e, "brain close failed");
        }

        // Blank separator so the next session's recap reads cleanly.
        self.journal.log("", false, true, false);
        Ok(())
    }

    /// Sweep the notification backlog through the dispatcher.
    async fn resync(
        social: &Arc<dyn SocialClient>,
        dispatcher: &Dispatcher,
        journal: &Arc<dyn LogSink>,
        cancel: &CancellationToken,
    ) {
        match social.backlog().await {
            Ok(items) => {
                let (actionable, total) = dispatcher.drain_backlog(items, cancel).await;
                journal.record(&format!(
                    "🔁 @{} resyncs notifications ({actionable} actionable / {total} total)",
                    dispatcher.ctx().acct
                ));
            }
            Err(e) => tracing::warn!(error = %e, "backlog fetch failed"),
        }
    }

    /// Keep the push stream alive. Each disconnect is reported downstream
    /// as `StreamEvent::Disconnected` so the worker re-syncs. When the
    /// attempt budget is spent the session goes passive: the lifecycle is
    /// marked stream-lost and the operator gets a journal line, since they
    /// would otherwise sit at a prompt with live delivery silently gone.
    #[allow(clippy::too_many_arguments)]
    async fn supervise_stream(
        social: Arc<dyn SocialClient>,
        tx: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
        attempts: u32,
        wait: std::time::Duration,
        journal: Arc<dyn LogSink>,
        lifecycle: Arc<Lifecycle>,
        acct: String,
    ) {
        let mut remaining = attempts;
        loop {
            if cancel.is_cancelled() {
                return;
            }
            match social.stream(tx.clone(), cancel.clone()).await {
                Ok(()) => tracing::info!("stream ended"),
                Err(e) => tracing::warn!(error = %e, "stream failed"),
            }
            if cancel.is_cancelled() {
                return;
            }
            if remaining == 0 {
                lifecycle.mark_stream_lost();
                journal.record(&format!(
                    "⚠️ @{acct} lost the notification stream after {attempts} reconnect \
attempts; live delivery is paused until restart"
                ));
                return;
            }
            remaining -= 1;
            let _ = tx.send(StreamEvent::Disconnected).await;
            tokio::time::sleep(wait).await;
        }
    }

    /// Single consumer of stream events. Sequential by construction, so
    /// notifications are handled in arrival order.
    async fn run_worker(
        mut rx: mpsc::Receiver<StreamEvent>,
        social: Arc<dyn SocialClient>,
        dispatcher: Arc<Dispatcher>,
        poster: Arc<AutoPoster>,
        journal: Arc<dyn LogSink>,
        cancel: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => return,
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => return,
                },
            };
            match event {
                StreamEvent::Notification(n) => {
                    dispatcher.handle(&n).await;
                }
                StreamEvent::Heartbeat => {
                    let local_time = Local::now().format("%H:%M").to_string();
                    poster.tick(Utc::now().timestamp(), &local_time).await;
                }
                StreamEvent::Disconnected => {
                    Self::resync(&social, &dispatcher, &journal, &cancel).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Visibility;
    use crate::testutil::{status_notif, MemorySink, RecordingSocial, ScriptedConsole, StubBrain};

    #[test]
    fn lifecycle_accepts_the_forward_path() {
        let l = Lifecycle::new();
        assert_eq!(l.current(), BotState::Uninitialized);
        l.transition(BotState::Connected).unwrap();
        l.transition(BotState::Running).unwrap();
        l.transition(BotState::Stopped).unwrap();
        assert_eq!(l.current(), BotState::Stopped);
    }

    #[test]
    fn lifecycle_rejects_backwards_and_skipping_transitions() {
        let l = Lifecycle::new();
        assert!(l.transition(BotState::Running).is_err());
        l.transition(BotState::Connected).unwrap();
        assert!(l.transition(BotState::Uninitialized).is_err());
        l.transition(BotState::Stopped).unwrap();
        assert!(l.transition(BotState::Running).is_err());
    }

    #[tokio::test]
    async fn engine_drains_backlog_and_shuts_down_on_exit() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::for_tests();
        cfg.data_dir = dir.path().to_path_buf();
        cfg.auto_post = false;

        let social = Arc::new(RecordingSocial::default());
        *social.backlog_items.lock().unwrap() = vec![status_notif(
            "b1",
            "alice",
            "teach me something",
            Visibility::Public,
        )];
        let console = Arc::new(ScriptedConsole::with_replies(&["/exit", "y"]));

        let engine = Engine::connect(
            cfg,
            social.clone(),
            Box::new(StubBrain::default()),
            console.clone(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(engine.state(), BotState::Connected);

        engine.run().await.unwrap();

        let calls = social.calls();
        assert!(calls.contains(&"dismiss:b1".to_string()));
        assert!(calls.iter().any(|c| c.starts_with("set_presence:🟢")));
        assert!(calls.iter().any(|c| c.starts_with("set_presence:🔴")));
    }

    #[tokio::test]
    async fn stream_exhaustion_is_journaled_and_marks_the_lifecycle() {
        let social = Arc::new(RecordingSocial::default());
        social.stream_fails.store(true, Ordering::SeqCst);
        let sink = Arc::new(MemorySink::default());
        let lifecycle = Arc::new(Lifecycle::new());
        let (tx, mut rx) = mpsc::channel(8);

        Engine::supervise_stream(
            social.clone(),
            tx,
            CancellationToken::new(),
            2,
            std::time::Duration::from_millis(1),
            sink.clone(),
            lifecycle.clone(),
            "bot@example.social".to_string(),
        )
        .await;

        assert!(!lifecycle.stream_live());
        assert!(sink
            .lines()
            .iter()
            .any(|l| l.contains("live delivery is paused")));

        // Each failed attempt before exhaustion reported a disconnect
        // downstream so the worker re-synced.
        let mut disconnects = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, StreamEvent::Disconnected) {
                disconnects += 1;
            }
        }
        assert_eq!(disconnects, 2);
    }

    #[tokio::test]
    async fn engine_resyncs_after_a_reported_disconnect() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::for_tests();
        cfg.data_dir = dir.path().to_path_buf();

        let social = Arc::new(RecordingSocial::default());
        let console = Arc::new(ScriptedConsole::with_replies(&["/exit", "y"]));
        let engine = Engine::connect(
            cfg,
            social.clone(),
            Box::new(StubBrain::default()),
            console,
            None,
        )
        .await
        .unwrap();

        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(Engine::run_worker(
            rx,
            engine.social.clone(),
            engine.dispatcher.clone(),
            engine.poster.clone(),
            engine.journal.clone(),
            cancel.clone(),
        ));
        tx.send(StreamEvent::Disconnected).await.unwrap();
        drop(tx);
        worker.await.unwrap();

        assert!(social.calls().contains(&"backlog".to_string()));
    }
}
