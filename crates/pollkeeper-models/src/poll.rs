use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Duration used when the computed one is not strictly positive.
pub const DEFAULT_POLL_DURATION_HOURS: i16 = 24;

/// A stored poll as read back from the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: i64,
    pub question: String,
    pub guild_id: String,
    pub author_id: String,
    pub is_multi: bool,
    /// Whole hours, always > 0.
    pub duration: i16,
    pub created_at: DateTime<Utc>,
    /// Display strings in insertion order, see [`option_display`].
    pub options: Vec<String>,
}

/// One selectable option of a poll being created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerInput {
    pub text: String,
    /// Empty means no emoji.
    #[serde(default)]
    pub emoji: String,
}

impl AnswerInput {
    pub fn new(emoji: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emoji: emoji.into(),
        }
    }

    /// Parses operator input of the form `emoji:text` or plain `text`.
    /// A prefix containing ASCII letters, digits or spaces is kept as text.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((emoji, text)) if looks_like_emoji(emoji) => Self::new(emoji, text.trim()),
            _ => Self::new("", raw.trim()),
        }
    }

    pub fn emoji(&self) -> Option<&str> {
        if self.emoji.is_empty() {
            None
        } else {
            Some(&self.emoji)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePollInput {
    pub question: String,
    pub guild_id: String,
    pub author_id: String,
    /// Already normalized by the caller, see [`duration_hours_until`].
    pub duration: i16,
    pub is_multi: bool,
    pub answers: Vec<AnswerInput>,
}

/// Renders a stored option the way polls show it: `"<emoji> <text>"`.
pub fn option_display(emoji: Option<&str>, text: &str) -> String {
    match emoji.filter(|e| !e.is_empty()) {
        Some(emoji) => format!("{emoji} {text}"),
        None => text.to_string(),
    }
}

fn looks_like_emoji(raw: &str) -> bool {
    !raw.is_empty()
        && !raw
            .chars()
            .any(|ch| ch.is_ascii_alphanumeric() || ch.is_whitespace())
}

pub fn normalize_duration_hours(hours: i64) -> i16 {
    if hours <= 0 {
        DEFAULT_POLL_DURATION_HOURS
    } else {
        hours.min(i16::MAX as i64) as i16
    }
}

/// Whole hours (rounded up) from `now` until `expiry`.
pub fn duration_hours_until(expiry: DateTime<Utc>, now: DateTime<Utc>) -> i16 {
    let seconds = expiry.signed_duration_since(now).num_seconds();
    let hours = if seconds <= 0 {
        0
    } else {
        (seconds + 3599) / 3600
    };
    normalize_duration_hours(hours)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn expiry_now_normalizes_to_default() {
        let now = Utc::now();
        assert_eq!(duration_hours_until(now, now), DEFAULT_POLL_DURATION_HOURS);
    }

    #[test]
    fn expiry_in_past_normalizes_to_default() {
        let now = Utc::now();
        let expiry = now - Duration::hours(3);
        assert_eq!(duration_hours_until(expiry, now), 24);
    }

    #[test]
    fn partial_hours_round_up() {
        let now = Utc::now();
        assert_eq!(duration_hours_until(now + Duration::minutes(1), now), 1);
        assert_eq!(duration_hours_until(now + Duration::minutes(61), now), 2);
        assert_eq!(duration_hours_until(now + Duration::hours(48), now), 48);
    }

    #[test]
    fn huge_durations_are_clamped() {
        assert_eq!(normalize_duration_hours(1_000_000), i16::MAX);
    }

    #[test]
    fn option_display_joins_emoji_and_text() {
        assert_eq!(option_display(Some("🍕"), "Pizza"), "🍕 Pizza");
        assert_eq!(option_display(Some(""), "Tacos"), "Tacos");
        assert_eq!(option_display(None, "Tacos"), "Tacos");
    }

    #[test]
    fn parse_answer_with_and_without_emoji() {
        assert_eq!(AnswerInput::parse("🍕:Pizza"), AnswerInput::new("🍕", "Pizza"));
        assert_eq!(AnswerInput::parse("Tacos"), AnswerInput::new("", "Tacos"));
        assert_eq!(
            AnswerInput::parse("Time: noon or later"),
            AnswerInput::new("", "Time: noon or later")
        );
    }

    #[test]
    fn create_input_round_trips_through_json() {
        let input = CreatePollInput {
            question: "Pizza or Tacos?".into(),
            guild_id: "guild-1".into(),
            author_id: "user-9".into(),
            duration: 24,
            is_multi: false,
            answers: vec![AnswerInput::new("🍕", "Pizza")],
        };
        let raw = serde_json::to_string(&input).unwrap();
        let back: CreatePollInput = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, input);
    }
}
