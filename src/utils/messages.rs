//! User-visible texts. Each business outcome has its own message.

use crate::models::{ClaimOutcome, LeaderboardEntry, RedeemOutcome, RegisterOutcome};

pub const CLAIM_BUTTON_TEXT: &str = "Claim!";
pub const WON_CAPTION: &str = "Congratulations! The picture is yours! 🎉";
pub const REDEEMED_CAPTION: &str = "Here is the picture you bought with your coins!";
pub const BACKLOG_CAPTION: &str = "A picture you missed earlier:";
pub const COLLECTION_CAPTION: &str = "Your collection";
pub const EMPTY_LEADERBOARD: &str = "No one has won a picture yet.";
pub const EMPTY_BACKLOG: &str = "You have no missed pictures to retrieve.";
pub const EMPTY_COLLECTION: &str = "You have not won any pictures yet.";
pub const NOT_REGISTERED: &str = "Send /start to join the give-away first.";
pub const UPLOAD_FORBIDDEN: &str = "Only administrators can add new pictures.";
pub const UNKNOWN_COMMAND: &str =
    "Commands: /start, /rating, /balance, /redeem, /missed, /collection";
pub const INTERNAL_ERROR: &str = "Something went wrong, please try again later.";

const LEADERBOARD_NAME_WIDTH: usize = 17;
const LEADERBOARD_COUNT_WIDTH: usize = 9;

pub fn register_text(outcome: RegisterOutcome, winner_cap: i32, interval_secs: u64) -> String {
    match outcome {
        RegisterOutcome::AlreadyRegistered => "You are already registered!".to_string(),
        RegisterOutcome::Registered => format!(
            "Hi! Welcome aboard, you are registered!\n\
             Every {} a new hidden picture will arrive and you get a chance to claim it.\n\
             Only the first {winner_cap} users get the picture, so press 'Claim!' quickly!",
            describe_interval(interval_secs)
        ),
    }
}

/// Reply for a claim; `None` for `Won`, which is answered with the picture itself.
pub fn claim_text(outcome: &ClaimOutcome, winner_cap: i32) -> Option<String> {
    match outcome {
        ClaimOutcome::Won { .. } => None,
        ClaimOutcome::AlreadyClaimed => Some("You already got this picture!".to_string()),
        ClaimOutcome::Closed => Some(format!(
            "Too late: {winner_cap} users already claimed this picture. \
             It was added to your /missed list."
        )),
        ClaimOutcome::Unavailable => Some("This picture is not up for grabs.".to_string()),
    }
}

pub fn redeem_text(outcome: &RedeemOutcome) -> String {
    match outcome {
        RedeemOutcome::Redeemed { balance, .. } => {
            format!("{REDEEMED_CAPTION} Coins left: {balance}.")
        }
        RedeemOutcome::InsufficientFunds { balance, cost } => format!(
            "Not enough coins: a picture costs {cost} and you have {balance}."
        ),
        RedeemOutcome::NoPrizesLeft => {
            "There are no pictures left to redeem. Your coins were not spent.".to_string()
        }
    }
}

pub fn balance_text(coins: i64, cost: i64) -> String {
    format!("You have {coins} coins. A picture costs {cost}; send /redeem to buy one.")
}

pub fn upload_text(prize_id: i32) -> String {
    format!("Picture added to the pool as prize #{prize_id}.")
}

/// Monospace table wrapped in `<pre>` for HTML parse mode. Names are shown as stored;
/// only usernames carry the `@` prefix.
pub fn leaderboard_html(entries: &[LeaderboardEntry]) -> String {
    let rule = "-".repeat(LEADERBOARD_NAME_WIDTH + LEADERBOARD_COUNT_WIDTH + 5);
    let mut lines = vec![
        format!(
            "| {:<width$}| {:^count$}|",
            "USER",
            "WINS",
            width = LEADERBOARD_NAME_WIDTH,
            count = LEADERBOARD_COUNT_WIDTH
        ),
        rule.clone(),
    ];
    for entry in entries {
        lines.push(format!(
            "| {:<width$}| {:^count$}|",
            escape_html(&entry.name),
            entry.win_count,
            width = LEADERBOARD_NAME_WIDTH,
            count = LEADERBOARD_COUNT_WIDTH
        ));
    }
    lines.push(rule);
    format!("<pre>{}</pre>", lines.join("\n"))
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn describe_interval(secs: u64) -> String {
    match secs {
        60 => "minute".to_string(),
        s if s % 60 == 0 => format!("{} minutes", s / 60),
        s => format!("{s} seconds"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_outcomes_have_distinct_messages() {
        let texts = [
            claim_text(&ClaimOutcome::AlreadyClaimed, 3).unwrap(),
            claim_text(&ClaimOutcome::Closed, 3).unwrap(),
            claim_text(&ClaimOutcome::Unavailable, 3).unwrap(),
            redeem_text(&RedeemOutcome::InsufficientFunds {
                balance: 29,
                cost: 30,
            }),
            redeem_text(&RedeemOutcome::NoPrizesLeft),
            EMPTY_BACKLOG.to_string(),
            EMPTY_LEADERBOARD.to_string(),
            EMPTY_COLLECTION.to_string(),
            register_text(RegisterOutcome::AlreadyRegistered, 3, 60),
        ];
        for (i, a) in texts.iter().enumerate() {
            for b in texts.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        assert!(
            claim_text(
                &ClaimOutcome::Won {
                    prize_id: 1,
                    image: "a.png".into()
                },
                3
            )
            .is_none()
        );
    }

    #[test]
    fn test_register_text_mentions_interval() {
        let text = register_text(RegisterOutcome::Registered, 3, 60);
        assert!(text.contains("Every minute"));
        let text = register_text(RegisterOutcome::Registered, 3, 300);
        assert!(text.contains("Every 5 minutes"));
    }

    #[test]
    fn test_leaderboard_html() {
        let html = leaderboard_html(&[
            LeaderboardEntry {
                user_id: 1,
                name: "@<bob>".into(),
                win_count: 4,
            },
            LeaderboardEntry {
                user_id: 2,
                name: "Ann".into(),
                win_count: 2,
            },
            LeaderboardEntry {
                user_id: 12345,
                name: "12345".into(),
                win_count: 1,
            },
        ]);
        assert!(html.starts_with("<pre>"));
        assert!(html.ends_with("</pre>"));
        assert!(html.contains("| @&lt;bob&gt;"));
        assert!(html.contains(" 4 "));
        // 没有用户名的用户不显示 @
        assert!(html.contains("| Ann "));
        assert!(!html.contains("@Ann"));
        assert!(!html.contains("@12345"));
    }
}
