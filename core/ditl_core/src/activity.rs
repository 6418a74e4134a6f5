use serde::{Serialize, Serializer};
use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime};

use crate::error::ValidationError;

/// A named time interval. `end_time == None` means the activity is still running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activity {
    pub id: i64,
    pub title: String,
    #[serde(rename = "start_ts", serialize_with = "serialize_ts")]
    pub start_time: OffsetDateTime,
    #[serde(rename = "end_ts", serialize_with = "serialize_opt_ts")]
    pub end_time: Option<OffsetDateTime>,
    pub duration_minutes: Option<i64>,
}

impl Activity {
    pub fn is_running(&self) -> bool {
        self.end_time.is_none()
    }

    /// End of the interval, with `now` standing in for a running activity.
    pub fn effective_end(&self, now: OffsetDateTime) -> OffsetDateTime {
        self.end_time.unwrap_or(now)
    }
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityUpdate {
    pub title: Option<String>,
    pub start_time: Option<OffsetDateTime>,
    pub end_time: Option<OffsetDateTime>,
    pub duration_minutes: Option<i64>,
}

impl ActivityUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.duration_minutes.is_none()
    }
}

pub fn normalize_title(raw: &str) -> Result<String, ValidationError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(title.to_string())
}

pub fn check_span(
    start: OffsetDateTime,
    end: Option<OffsetDateTime>,
) -> Result<(), ValidationError> {
    match end {
        Some(end) if end < start => Err(ValidationError::EndBeforeStart),
        _ => Ok(()),
    }
}

pub fn check_duration(duration_minutes: Option<i64>) -> Result<(), ValidationError> {
    match duration_minutes {
        Some(d) if d < 0 => Err(ValidationError::NegativeDuration),
        _ => Ok(()),
    }
}

/// Whole minutes between two instants, floored; zero when `to <= from`.
pub fn whole_minutes(from: OffsetDateTime, to: OffsetDateTime) -> i64 {
    if to <= from {
        return 0;
    }
    (to - from).whole_minutes()
}

/// Drops sub-second precision; rows store unix seconds.
pub fn whole_seconds(t: OffsetDateTime) -> OffsetDateTime {
    t - Duration::nanoseconds(i64::from(t.nanosecond()))
}

pub fn format_ts(t: OffsetDateTime) -> String {
    t.format(&Rfc3339).unwrap_or_default()
}

pub fn parse_ts(s: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(s.trim(), &Rfc3339).ok()
}

fn serialize_ts<S: Serializer>(t: &OffsetDateTime, s: S) -> Result<S::Ok, S::Error> {
    let text = t.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
    s.serialize_str(&text)
}

fn serialize_opt_ts<S: Serializer>(t: &Option<OffsetDateTime>, s: S) -> Result<S::Ok, S::Error> {
    match t {
        Some(t) => serialize_ts(t, s),
        None => s.serialize_none(),
    }
}
