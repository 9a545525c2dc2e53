//! Identifiers and core value types shared across the engine.

/// Opaque account id as issued by the platform.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AccountId(pub String);

/// Notification id, used for dismissal. Unique within a session.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NotificationId(pub String);

/// Status (post) id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StatusId(pub String);

/// An account as seen in notifications: id plus the qualified handle
/// (`user` for local accounts, `user@domain.tld` for remote ones).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub acct: String,
}

/// Post visibility. Only Public content may be learned from; replies to
/// Public posts are downgraded to Unlisted to avoid amplifying bot chatter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Unlisted,
    Private,
    Direct,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Unlisted => "unlisted",
            Visibility::Private => "private",
            Visibility::Direct => "direct",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Visibility::Public),
            "unlisted" => Some(Visibility::Unlisted),
            "private" => Some(Visibility::Private),
            "direct" => Some(Visibility::Direct),
            _ => None,
        }
    }

    /// Glyph used in journal lines.
    pub fn glyph(self) -> &'static str {
        match self {
            Visibility::Public => "🌎",
            Visibility::Unlisted => "🔓",
            Visibility::Private => "🔒",
            Visibility::Direct => "@",
        }
    }

    /// Visibility a reply should be posted with.
    pub fn for_reply(self) -> Self {
        match self {
            Visibility::Public => Visibility::Unlisted,
            other => other,
        }
    }
}

/// Kind of an inbound notification. Anything else is filtered out by the
/// transport adapter before it reaches the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationKind {
    Follow,
    Status,
    Mention,
}

/// The status attached to a Status/Mention notification.
///
/// `text` is plain text: the transport adapter strips markup before handing
/// the notification over. Mentions and hashtag sigils are still present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    pub id: StatusId,
    pub text: String,
    pub visibility: Visibility,
    pub in_reply_to: Option<StatusId>,
}

/// An inbound event record. Immutable once received; consumed exactly once by
/// the dispatcher, then dismissed regardless of handling outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub account: Account,
    pub status: Option<Status>,
}

/// The decision produced by classifying a notification. Produced once per
/// notification, never mutated; classification is a pure function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClassifiedAction {
    Ignore,
    RecordFollow {
        account: Account,
    },
    LearnOnly {
        text: String,
    },
    ReplyWithLearn {
        text: String,
        reply_to: Status,
        account: Account,
    },
    ReplyNoLearn {
        text: String,
        reply_to: Status,
        account: Account,
    },
    /// Mentions saying `help` / `?` get a fixed self-describing reply
    /// without touching the brain.
    ReplyHelp {
        reply_to: Status,
        account: Account,
    },
    FollowRequest {
        account: Account,
        follow: bool,
    },
}

/// Lifecycle state of the bot. Owned by the session; everything else only
/// reads it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BotState {
    Uninitialized,
    Connected,
    Running,
    Stopped,
}

/// Per-session identity, resolved once at connect time and passed by value
/// into every component at construction.
#[derive(Clone, Debug)]
pub struct SessionContext {
    pub account_id: AccountId,
    /// Qualified handle, e.g. `gibber@example.social`.
    pub acct: String,
    /// Bare username, e.g. `gibber`.
    pub username: String,
    pub max_post_length: usize,
}

impl SessionContext {
    /// Longest reply the platform will accept once it prepends `@{acct} `.
    pub fn reply_budget(&self, acct: &str) -> usize {
        self.max_post_length.saturating_sub(acct.len() + 2)
    }
}
