use chrono::{DateTime, Datelike, SubsecRound, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Priority given to tasks added without one. It means "not set".
pub const DEFAULT_PRIORITY: i64 = 0;
/// New tasks land in the inbox unless told otherwise.
pub const DEFAULT_INBOX: bool = true;
pub const MIN_PRIORITY: i64 = 0;
pub const MAX_PRIORITY: i64 = 4;

/// Text layout of every timestamp column. Fixed width, so text order is
/// chronological order.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// A single task, saved as an entry in the tasks table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub priority: i64, // 0 unset, 1 highest, 4 lowest
    pub inbox: bool,
    pub completed: bool,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_optional_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_optional_timestamp")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// What a caller provides to create a task. The store assigns the id and
/// the update stamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    pub title: String,
    pub priority: i64,
    pub inbox: bool,
    pub completed: bool,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl TaskInput {
    /// A pending task created now.
    pub fn new(title: impl Into<String>, priority: i64, inbox: bool) -> Self {
        TaskInput {
            title: title.into(),
            priority,
            inbox,
            completed: false,
            created_at: now(),
        }
    }
}

/// Completion filter used by `list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pending,
    Completed,
}

impl Status {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Status::Pending => !task.completed,
            Status::Completed => task.completed,
        }
    }
}

impl FromStr for Status {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Status::Pending),
            "completed" | "done" => Ok(Status::Completed),
            _ => Err(ValidationError::UnknownStatus(s.to_string())),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Pending => write!(f, "pending"),
            Status::Completed => write!(f, "completed"),
        }
    }
}

/// Current UTC time, cut down to what the text encoding keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Whether `at` fits the four-digit year of the text encoding.
pub fn is_encodable(at: &DateTime<Utc>) -> bool {
    (0..=9999).contains(&at.year())
}

pub fn encode_timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn serialize_timestamp<S: Serializer>(at: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&encode_timestamp(at))
}

fn serialize_optional_timestamp<S: Serializer>(
    at: &Option<DateTime<Utc>>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match at {
        Some(at) => serialize_timestamp(at, s),
        None => s.serialize_none(),
    }
}

/// Parse a stored timestamp. Any RFC 3339 offset is accepted and
/// normalized to UTC.
pub fn decode_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(text: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn timestamps_survive_the_text_encoding() {
        let stamp = at("2024-03-09T07:05:03.042Z");
        let text = encode_timestamp(&stamp);
        assert_eq!(text, "2024-03-09T07:05:03.042Z");
        assert_eq!(decode_timestamp(&text), Some(stamp));
    }

    #[test]
    fn encoded_timestamps_sort_chronologically() {
        let earlier = at("2023-12-31T23:59:59.999Z");
        let later = at("2024-01-01T00:00:00Z");
        assert!(encode_timestamp(&earlier) < encode_timestamp(&later));
    }

    #[test]
    fn offsets_are_normalized_to_utc() {
        let stamp = decode_timestamp("2024-03-09T09:05:03.042+02:00").unwrap();
        assert_eq!(encode_timestamp(&stamp), "2024-03-09T07:05:03.042Z");
    }

    #[test]
    fn only_four_digit_years_are_encodable() {
        use chrono::TimeZone;

        assert!(is_encodable(&at("9999-12-31T23:59:59.999Z")));
        assert!(!is_encodable(&Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap()));
        assert!(!is_encodable(&Utc.with_ymd_and_hms(-1, 1, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn json_keeps_the_stored_timestamp_text() {
        let task = Task {
            id: 1,
            title: "a".to_string(),
            priority: 0,
            inbox: true,
            completed: false,
            created_at: at("2024-05-01T10:00:00Z"),
            updated_at: None,
            completed_at: Some(at("2024-05-02T08:30:00.500Z")),
        };
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["createdAt"], "2024-05-01T10:00:00.000Z");
        assert_eq!(value["updatedAt"], serde_json::Value::Null);
        assert_eq!(value["completedAt"], "2024-05-02T08:30:00.500Z");
    }

    #[test]
    fn garbage_timestamps_are_rejected() {
        assert_eq!(decode_timestamp("yesterday"), None);
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Completed".parse::<Status>(), Ok(Status::Completed));
        assert_eq!("PENDING".parse::<Status>(), Ok(Status::Pending));
        assert_eq!(
            "later".parse::<Status>(),
            Err(ValidationError::UnknownStatus("later".to_string()))
        );
    }

    #[test]
    fn new_input_is_pending() {
        let input = TaskInput::new("Write spec", DEFAULT_PRIORITY, DEFAULT_INBOX);
        assert!(!input.completed);
        assert!(input.inbox);
        assert_eq!(input.priority, 0);
    }
}
