//! Operator command resolution and execution.
//!
//! Free-text console input resolves through a static alias table to a
//! canonical command; anything not starting with the command prefix is a
//! no-learn brain query. Every state-mutating command is gated behind a
//! literal yes/no confirmation before the first collaborator call, and an
//! operator declining is a distinct cancellation outcome, not an error.

use std::path::Path;
use std::sync::Arc;

use crate::{
    dispatch::Dispatcher,
    domain::Visibility,
    ports::{Console, LogSink, SocialClient},
    text::{self, BlockTarget},
    Result,
};

pub struct CommandSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

/// Canonical commands and their accepted aliases. The empty alias makes a
/// bare prefix show the help.
pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "help",
        aliases: &["help", "?", "h", ""],
    },
    CommandSpec {
        name: "say",
        aliases: &["say", "post", "toot", "publish"],
    },
    CommandSpec {
        name: "msg",
        aliases: &["msg", "privmsg", "d", "dm", "direct", "pm", "message"],
    },
    CommandSpec {
        name: "exit",
        aliases: &["exit", "quit", "q", "close"],
    },
    CommandSpec {
        name: "learn",
        aliases: &["learn"],
    },
    CommandSpec {
        name: "train",
        aliases: &["train"],
    },
    CommandSpec {
        name: "block",
        aliases: &["block", "ban"],
    },
    CommandSpec {
        name: "unblock",
        aliases: &["unblock", "unban"],
    },
    CommandSpec {
        name: "blocks",
        aliases: &["blocks", "bans"],
    },
    CommandSpec {
        name: "info",
        aliases: &["info", "stats", "information", "statistics"],
    },
    CommandSpec {
        name: "tail",
        aliases: &["tail", "log"],
    },
];

/// Case-insensitive exact alias lookup. No prefix or fuzzy matching.
pub fn lookup(word: &str) -> Option<&'static str> {
    let word = word.to_lowercase();
    COMMANDS
        .iter()
        .find(|spec| spec.aliases.contains(&word.as_str()))
        .map(|spec| spec.name)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolved<'a> {
    /// Input without the command prefix: answered via a no-learn brain query.
    Freeform(&'a str),
    Command {
        name: &'static str,
        params: &'a str,
    },
    Unknown(&'a str),
}

pub fn resolve<'a>(input: &'a str, prefix: &str) -> Resolved<'a> {
    let input = input.trim();
    let Some(rest) = input.strip_prefix(prefix) else {
        return Resolved::Freeform(input);
    };
    let (word, params) = match rest.split_once(char::is_whitespace) {
        Some((word, params)) => (word, params.trim()),
        None => (rest, ""),
    };
    match lookup(word) {
        Some(name) => Resolved::Command { name, params },
        None => Resolved::Unknown(word),
    }
}

/// Result of running one line of operator input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// Operator declined a confirmation or left a required parameter blank.
    Cancelled,
    /// Input rejected before any collaborator call.
    Invalid,
    /// A collaborator call failed; already reported.
    Failed,
    Unknown,
    /// Operator confirmed shutdown.
    Exit,
}

pub struct CommandRunner {
    dispatcher: Arc<Dispatcher>,
    social: Arc<dyn SocialClient>,
    console: Arc<dyn Console>,
    journal: Arc<dyn LogSink>,
    prefix: String,
    recap_lines: usize,
}

impl CommandRunner {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        social: Arc<dyn SocialClient>,
        console: Arc<dyn Console>,
        journal: Arc<dyn LogSink>,
        prefix: String,
        recap_lines: usize,
    ) -> Self {
        Self {
            dispatcher,
            social,
            console,
            journal,
            prefix,
            recap_lines,
        }
    }

    pub async fn run(&self, raw: &str) -> Outcome {
        match resolve(raw, &self.prefix) {
            Resolved::Freeform(input) => self.do_freeform(input).await,
            Resolved::Unknown(word) => {
                self.console.print(&format!("Unknown command: {word}"));
                Outcome::Unknown
            }
            Resolved::Command { name, params } => match name {
                "help" => self.do_help(),
                "exit" => self.do_exit().await,
                "say" => self.do_say(params, false).await,
                "msg" => self.do_say(params, true).await,
                "learn" => self.do_learn(params).await,
                "train" => self.do_train(params).await,
                "block" => self.do_block(params, true).await,
                "unblock" => self.do_block(params, false).await,
                "blocks" => self.do_blocks().await,
                "info" => self.do_info().await,
                "tail" => self.do_tail(),
                _ => unreachable!("alias table maps to handled names"),
            },
        }
    }

    async fn do_freeform(&self, input: &str) -> Outcome {
        let ctx = self.dispatcher.ctx();
        match self
            .dispatcher
            .query_nolearn(input, ctx.max_post_length)
            .await
        {
            Ok(reply) => {
                self.console.print(&format!("<@{}> {reply}", ctx.acct));
                Outcome::Done
            }
            Err(e) => {
                self.console.print(&format!("{e}"));
                Outcome::Failed
            }
        }
    }

    fn do_help(&self) -> Outcome {
        let c = &self.prefix;
        self.console.print(&format!(
            "·{c}help: this help        ·{c}exit: stop the bot\n\
             ·{c}say: post a status     ·{c}msg: direct-message somebody\n\
             ·{c}learn: learn a string  ·{c}train: learn a file of strings\n\
             ·{c}block: block a user or domain   ·{c}unblock: unblock a user or domain\n\
             ·{c}blocks: list blocks    ·{c}info: bot information\n\
             ·{c}tail: last {} log lines",
            self.recap_lines
        ));
        Outcome::Done
    }

    async fn do_exit(&self) -> Outcome {
        match self.confirm("Stop the bot and exit?").await {
            Ok(true) => Outcome::Exit,
            Ok(false) => self.cancelled(),
            Err(_) => Outcome::Failed,
        }
    }

    async fn do_say(&self, params: &str, private: bool) -> Outcome {
        let Ok(message) = self.param_or_prompt(params, "Message?").await else {
            return Outcome::Failed;
        };
        if message.is_empty() {
            return self.cancelled();
        }

        let visibility = if private {
            Visibility::Direct
        } else {
            let prompt = "Visibility? [public/unlisted/private/direct/CANCEL]";
            let answer = match self.console.prompt(&format!("{prompt} ")).await {
                Ok(a) => a.trim().to_lowercase(),
                Err(_) => return Outcome::Failed,
            };
            match Visibility::parse(&answer) {
                Some(v) => v,
                None => return self.cancelled(),
            }
        };

        match self
            .confirm(&format!("{} Say \"{message}\"?", visibility.glyph()))
            .await
        {
            Ok(true) => {}
            Ok(false) => return self.cancelled(),
            Err(_) => return Outcome::Failed,
        }

        match self.dispatcher.post(&message, visibility, false).await {
            Ok(_) => Outcome::Done,
            Err(e) => {
                self.console.print(&format!("{e}"));
                Outcome::Failed
            }
        }
    }

    async fn do_learn(&self, params: &str) -> Outcome {
        let Ok(message) = self.param_or_prompt(params, "String to learn:").await else {
            return Outcome::Failed;
        };
        if message.is_empty() {
            return self.cancelled();
        }
        match self.confirm(&format!("Learn \"{message}\"?")).await {
            Ok(true) => {}
            Ok(false) => return self.cancelled(),
            Err(_) => return Outcome::Failed,
        }

        match self.dispatcher.learn(&message).await {
            Ok(()) => {
                let ctx = self.dispatcher.ctx();
                self.journal.record(&format!(
                    "💭 @{} learns from manual input: {message}",
                    ctx.username
                ));
                Outcome::Done
            }
            Err(e) => {
                self.console.print(&format!("{e}"));
                Outcome::Failed
            }
        }
    }

    async fn do_train(&self, params: &str) -> Outcome {
        let Ok(filename) = self.param_or_prompt(params, "Filename:").await else {
            return Outcome::Failed;
        };
        if filename.is_empty() {
            return self.cancelled();
        }
        match self.confirm(&format!("Learn from {filename}?")).await {
            Ok(true) => {}
            Ok(false) => return self.cancelled(),
            Err(_) => return Outcome::Failed,
        }

        match self.dispatcher.train(Path::new(&filename)).await {
            Ok(()) => {
                let ctx = self.dispatcher.ctx();
                self.journal
                    .record(&format!("💭 @{} trains on {filename}", ctx.username));
                Outcome::Done
            }
            Err(e) => {
                self.console.print(&format!("{e}"));
                Outcome::Failed
            }
        }
    }

    async fn do_block(&self, params: &str, block: bool) -> Outcome {
        let verb = if block { "Block" } else { "Unblock" };
        let Ok(target) = self
            .param_or_prompt(
                params,
                &format!("User/domain to {}:", verb.to_lowercase()),
            )
            .await
        else {
            return Outcome::Failed;
        };
        if target.is_empty() {
            return self.cancelled();
        }

        match text::parse_block_target(&target) {
            Err(e) => {
                self.console
                    .print(&format!("⚠️ {e}: use username@domain.tld or domain.tld format"));
                Outcome::Invalid
            }

            Ok(BlockTarget::Domain(domain)) => {
                match self.confirm(&format!("{verb} {domain}?")).await {
                    Ok(true) => {}
                    Ok(false) => return self.cancelled(),
                    Err(_) => return Outcome::Failed,
                }
                match self.dispatcher.block_domain_action(&domain, block).await {
                    Ok(()) => Outcome::Done,
                    Err(e) => {
                        self.console.print(&format!("{e}"));
                        Outcome::Failed
                    }
                }
            }

            Ok(BlockTarget::User(handle)) => {
                let account = match self.social.lookup_account(&handle).await {
                    Ok(Some(account)) => account,
                    Ok(None) => {
                        self.console.print(&format!("⚠️ Account {handle} not found"));
                        return Outcome::Invalid;
                    }
                    Err(e) => {
                        self.console.print(&format!("{e}"));
                        return Outcome::Failed;
                    }
                };
                let desc = format!("{} ({})", account.acct, account.id.0);

                let rel = match self.social.relationship(&account.id).await {
                    Ok(rel) => rel,
                    Err(e) => {
                        self.console.print(&format!("{e}"));
                        return Outcome::Failed;
                    }
                };

                if block {
                    // Offer to unfollow first; a failure here does not stop
                    // the block itself.
                    if rel.following {
                        match self.confirm(&format!("Unfollow {desc}?")).await {
                            Ok(true) => {
                                let _ = self.dispatcher.follow_action(&account, false).await;
                            }
                            Ok(false) => {}
                            Err(_) => return Outcome::Failed,
                        }
                    }
                    if rel.blocking {
                        self.console.print(&format!("⚠️ Already blocking {desc}"));
                        return Outcome::Invalid;
                    }
                    if rel.domain_blocking {
                        self.console
                            .print(&format!("Already blocking the domain for {desc}"));
                    }
                } else if !rel.blocking {
                    self.console.print(&format!(
                        "⚠️ User {desc} is not blocked{}",
                        if rel.domain_blocking {
                            ", their entire domain is"
                        } else {
                            ""
                        }
                    ));
                    return Outcome::Invalid;
                }

                match self.confirm(&format!("{verb} {desc}?")).await {
                    Ok(true) => {}
                    Ok(false) => return self.cancelled(),
                    Err(_) => return Outcome::Failed,
                }

                match self.dispatcher.block_action(&account, block).await {
                    Ok(()) => Outcome::Done,
                    Err(e) => {
                        self.console.print(&format!("{e}"));
                        Outcome::Failed
                    }
                }
            }
        }
    }

    async fn do_blocks(&self) -> Outcome {
        let accounts = match self.social.list_blocked_accounts().await {
            Ok(v) => v,
            Err(e) => {
                self.console.print(&format!("{e}"));
                return Outcome::Failed;
            }
        };
        let domains = match self.social.list_blocked_domains().await {
            Ok(v) => v,
            Err(e) => {
                self.console.print(&format!("{e}"));
                return Outcome::Failed;
            }
        };

        self.console.print("⛔ Blocked users:");
        for account in &accounts {
            self.console
                .print(&format!("· {} ({})", account.acct, account.id.0));
        }
        self.console.print("⛔ Blocked domains:");
        for domain in &domains {
            self.console.print(&format!("· {domain}"));
        }
        Outcome::Done
    }

    async fn do_info(&self) -> Outcome {
        let summary = match self.social.profile_summary().await {
            Ok(s) => s,
            Err(e) => {
                self.console.print(&format!("{e}"));
                return Outcome::Failed;
            }
        };
        let blocks = self
            .social
            .list_blocked_accounts()
            .await
            .map(|v| v.len())
            .unwrap_or(0);
        let domain_blocks = self
            .social
            .list_blocked_domains()
            .await
            .map(|v| v.len())
            .unwrap_or(0);

        let ctx = self.dispatcher.ctx();
        self.console.print(&format!(
            "{} ({}) has {} followers, is following {} users, posted {} statuses, \
             and blocks {} users and {} domains",
            ctx.acct,
            summary.display_name,
            summary.followers,
            summary.following,
            summary.statuses,
            blocks,
            domain_blocks
        ));
        Outcome::Done
    }

    fn do_tail(&self) -> Outcome {
        self.console
            .print(&format!("--- Last {} log lines:", self.recap_lines));
        for line in self.journal.tail(self.recap_lines) {
            self.console.print(&line);
        }
        self.console.print("---");
        Outcome::Done
    }

    async fn param_or_prompt(&self, params: &str, prompt: &str) -> Result<String> {
        let params = params.trim();
        if !params.is_empty() {
            return Ok(params.to_string());
        }
        Ok(self
            .console
            .prompt(&format!("{prompt} "))
            .await?
            .trim()
            .to_string())
    }

    /// Yes/no prompt, defaulting to no.
    async fn confirm(&self, question: &str) -> Result<bool> {
        let answer = self.console.prompt(&format!("{question} [y/N] ")).await?;
        Ok(matches!(
            answer.trim().to_lowercase().as_str(),
            "y" | "yes"
        ))
    }

    fn cancelled(&self) -> Outcome {
        self.console.print("Cancelled");
        Outcome::Cancelled
    }
}
