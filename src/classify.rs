//! Event classifier: turns a raw notification into a typed decision.
//!
//! Pure with respect to its inputs; re-classifying the same notification
//! always yields the same action. Side effects happen later, in the
//! dispatcher.

use regex::Regex;

use crate::domain::{ClassifiedAction, Notification, NotificationKind, SessionContext, Visibility};
use crate::text;

pub fn classify(notification: &Notification, ctx: &SessionContext) -> ClassifiedAction {
    // Circuit-breaker for self-notifications, whatever their kind.
    if notification.account.id == ctx.account_id {
        return ClassifiedAction::Ignore;
    }

    if notification.kind == NotificationKind::Follow {
        return ClassifiedAction::RecordFollow {
            account: notification.account.clone(),
        };
    }

    let Some(status) = &notification.status else {
        return ClassifiedAction::Ignore;
    };

    // A plain status carrying our own mention is a duplicated mention event,
    // not fresh learning material.
    if notification.kind == NotificationKind::Status && mentions_self(&status.text, &ctx.username) {
        return ClassifiedAction::Ignore;
    }

    let message = text::normalize(&status.text);
    let learnable = status.visibility == Visibility::Public && !message.is_empty();

    match notification.kind {
        NotificationKind::Status => {
            if learnable {
                ClassifiedAction::LearnOnly { text: message }
            } else {
                ClassifiedAction::Ignore
            }
        }
        NotificationKind::Mention => {
            match message.trim().to_lowercase().as_str() {
                "follow" => ClassifiedAction::FollowRequest {
                    account: notification.account.clone(),
                    follow: true,
                },
                "unfollow" => ClassifiedAction::FollowRequest {
                    account: notification.account.clone(),
                    follow: false,
                },
                "help" | "?" => ClassifiedAction::ReplyHelp {
                    reply_to: status.clone(),
                    account: notification.account.clone(),
                },
                _ => {
                    // Note the asymmetry, kept deliberately: the learn gate
                    // uses the mention's own visibility, while a reply is
                    // produced regardless (with downgraded visibility).
                    if learnable {
                        ClassifiedAction::ReplyWithLearn {
                            text: message,
                            reply_to: status.clone(),
                            account: notification.account.clone(),
                        }
                    } else {
                        ClassifiedAction::ReplyNoLearn {
                            text: message,
                            reply_to: status.clone(),
                            account: notification.account.clone(),
                        }
                    }
                }
            }
        }
        NotificationKind::Follow => unreachable!("handled above"),
    }
}

fn mentions_self(raw_text: &str, username: &str) -> bool {
    let pattern = format!("(?i)@{}", regex::escape(username));
    Regex::new(&pattern)
        .map(|re| re.is_match(raw_text))
        .unwrap_or(false)
}

/// Fixed reply for mentions asking for help. No brain access.
pub fn user_help(ctx: &SessionContext) -> String {
    format!(
        "Hi! My name is {username}. I read and learn public posts from the users I follow \
so I can turn them into word salad later!\n\n\
If you'd like me to follow you, send me:\n@{acct} follow\n\n\
Likewise, to get me to stop, send me:\n@{acct} unfollow\n\n\
If you mention me, I will reply to you.",
        username = ctx.username,
        acct = ctx.acct,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Account, AccountId, NotificationId, Status, StatusId};

    fn ctx() -> SessionContext {
        SessionContext {
            account_id: AccountId("self".to_string()),
            acct: "bot@example.social".to_string(),
            username: "bot".to_string(),
            max_post_length: 500,
        }
    }

    fn notif(
        kind: NotificationKind,
        actor: &str,
        text: &str,
        visibility: Visibility,
    ) -> Notification {
        Notification {
            id: NotificationId("n1".to_string()),
            kind,
            account: Account {
                id: AccountId(actor.to_string()),
                acct: format!("{actor}@example.social"),
            },
            status: Some(Status {
                id: StatusId("s1".to_string()),
                text: text.to_string(),
                visibility,
                in_reply_to: None,
            }),
        }
    }

    #[test]
    fn self_notifications_are_ignored_regardless_of_kind() {
        for kind in [
            NotificationKind::Follow,
            NotificationKind::Status,
            NotificationKind::Mention,
        ] {
            let mut n = notif(kind, "self", "hello", Visibility::Public);
            n.account.id = AccountId("self".to_string());
            assert_eq!(classify(&n, &ctx()), ClassifiedAction::Ignore);
        }
    }

    #[test]
    fn follow_event_records_follower() {
        let n = Notification {
            status: None,
            ..notif(NotificationKind::Follow, "alice", "", Visibility::Public)
        };
        match classify(&n, &ctx()) {
            ClassifiedAction::RecordFollow { account } => assert_eq!(account.id.0, "alice"),
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn public_status_learns_normalized_text() {
        let n = notif(
            NotificationKind::Status,
            "alice",
            "hello #world @someone",
            Visibility::Public,
        );
        assert_eq!(
            classify(&n, &ctx()),
            ClassifiedAction::LearnOnly {
                text: "hello world".to_string()
            }
        );
    }

    #[test]
    fn non_public_status_is_ignored() {
        for vis in [Visibility::Unlisted, Visibility::Private, Visibility::Direct] {
            let n = notif(NotificationKind::Status, "alice", "hello", vis);
            assert_eq!(classify(&n, &ctx()), ClassifiedAction::Ignore);
        }
    }

    #[test]
    fn empty_status_after_normalization_is_ignored() {
        let n = notif(
            NotificationKind::Status,
            "alice",
            "@someone @other",
            Visibility::Public,
        );
        assert_eq!(classify(&n, &ctx()), ClassifiedAction::Ignore);
    }

    #[test]
    fn status_mentioning_us_is_ignored() {
        let n = notif(
            NotificationKind::Status,
            "alice",
            "look at @BOT today",
            Visibility::Public,
        );
        assert_eq!(classify(&n, &ctx()), ClassifiedAction::Ignore);
    }

    #[test]
    fn mention_follow_command_requests_follow_without_brain() {
        let n = notif(
            NotificationKind::Mention,
            "alice",
            "@bot follow",
            Visibility::Public,
        );
        match classify(&n, &ctx()) {
            ClassifiedAction::FollowRequest { account, follow } => {
                assert_eq!(account.id.0, "alice");
                assert!(follow);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn mention_unfollow_command_requests_unfollow() {
        let n = notif(
            NotificationKind::Mention,
            "alice",
            "@bot UNFOLLOW",
            Visibility::Direct,
        );
        match classify(&n, &ctx()) {
            ClassifiedAction::FollowRequest { follow, .. } => assert!(!follow),
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn mention_help_gets_fixed_reply() {
        for text in ["@bot help", "@bot ?"] {
            let n = notif(NotificationKind::Mention, "alice", text, Visibility::Public);
            assert!(matches!(
                classify(&n, &ctx()),
                ClassifiedAction::ReplyHelp { .. }
            ));
        }
    }

    #[test]
    fn public_mention_replies_with_learn() {
        let n = notif(
            NotificationKind::Mention,
            "alice",
            "@bot hello there",
            Visibility::Public,
        );
        assert!(matches!(
            classify(&n, &ctx()),
            ClassifiedAction::ReplyWithLearn { ref text, .. } if text == "hello there"
        ));
    }

    #[test]
    fn private_mention_replies_without_learn() {
        let n = notif(
            NotificationKind::Mention,
            "alice",
            "@bot hello there",
            Visibility::Private,
        );
        assert!(matches!(
            classify(&n, &ctx()),
            ClassifiedAction::ReplyNoLearn { .. }
        ));
    }

    #[test]
    fn classification_is_pure() {
        let n = notif(
            NotificationKind::Mention,
            "alice",
            "@bot hello #world",
            Visibility::Public,
        );
        assert_eq!(classify(&n, &ctx()), classify(&n, &ctx()));
    }
}
