//! Pure text normalization: mention/hashtag stripping, whitespace collapsing,
//! and platform-length truncation. Everything here is stateless and
//! idempotent.

use std::sync::OnceLock;

use regex::Regex;

use crate::{errors::Error, Result};

fn mention_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"@([a-zA-Z0-9_%+-]+)(@([a-zA-Z0-9.-]+\.[a-zA-Z]{2,}))?").expect("valid regex")
    })
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s\s+").expect("valid regex"))
}

fn user_target_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([a-zA-Z0-9_%+-]+)(@([a-zA-Z0-9.-]+\.[a-zA-Z]{2,}))?$").expect("valid regex")
    })
}

fn domain_target_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([a-zA-Z0-9.-]+\.[a-zA-Z]{2,})$").expect("valid regex"))
}

/// Strip mentions, drop hashtag sigils (keeping the word), collapse
/// whitespace runs to a single space, and trim.
pub fn normalize(input: &str) -> String {
    let no_mentions = mention_re().replace_all(input, "");
    let no_sigils = no_mentions.replace('#', "");
    whitespace_re()
        .replace_all(&no_sigils, " ")
        .trim()
        .to_string()
}

/// Truncate to at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Normalize a brain-generated line and fit it into the platform limit.
pub fn format_reply(raw: &str, max: usize) -> String {
    truncate_chars(&normalize(raw), max)
}

/// A block/unblock target, resolved from exactly two grammars:
/// `user` / `user@domain.tld`, or a bare `domain.tld`. Anything else is
/// rejected before any collaborator call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockTarget {
    User(String),
    Domain(String),
}

pub fn parse_block_target(raw: &str) -> Result<BlockTarget> {
    let raw = raw.trim();
    if user_target_re().is_match(raw) {
        return Ok(BlockTarget::User(raw.to_string()));
    }
    if domain_target_re().is_match(raw) {
        return Ok(BlockTarget::Domain(raw.to_string()));
    }
    Err(Error::InvalidTarget(raw.to_string()))
}
