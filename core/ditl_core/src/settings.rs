use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};
use tracing::warn;

use crate::activity::format_ts;
use crate::calendar::Calendar;
use crate::quick_start::{DEFAULT_QUICK_STARTS, QUICK_START_LIMIT};

pub const TZ_OFFSET_MINUTES_MIN: i32 = -14 * 60;
pub const TZ_OFFSET_MINUTES_MAX: i32 = 14 * 60;

/// What `update`/`delete` do when the id does not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingIdPolicy {
    #[default]
    Silent,
    Strict,
}

impl MissingIdPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissingIdPolicy::Silent => "silent",
            MissingIdPolicy::Strict => "strict",
        }
    }

    fn from_column(s: &str) -> Self {
        match s {
            "strict" => MissingIdPolicy::Strict,
            _ => MissingIdPolicy::Silent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub tz_offset_minutes: i32,
    pub missing_ids: MissingIdPolicy,
    pub quick_start_defaults: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tz_offset_minutes: 0,
            missing_ids: MissingIdPolicy::Silent,
            quick_start_defaults: default_quick_starts(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub tz_offset_minutes: Option<i32>,
    #[serde(default)]
    pub missing_ids: Option<MissingIdPolicy>,
    #[serde(default)]
    pub quick_start_defaults: Option<Vec<String>>,
}

impl Settings {
    pub fn calendar(&self) -> Calendar {
        Calendar::new(tz_offset_from_minutes(self.tz_offset_minutes))
    }

    pub fn apply(&self, update: SettingsUpdate) -> Settings {
        Settings {
            tz_offset_minutes: update.tz_offset_minutes.unwrap_or(self.tz_offset_minutes),
            missing_ids: update.missing_ids.unwrap_or(self.missing_ids),
            quick_start_defaults: update
                .quick_start_defaults
                .unwrap_or_else(|| self.quick_start_defaults.clone()),
        }
        .normalized()
    }

    /// Clamps the offset and cleans the default list (trimmed, unique, non-empty).
    pub fn normalized(self) -> Settings {
        let mut defaults: Vec<String> = Vec::new();
        for d in self.quick_start_defaults {
            let d = d.trim();
            if d.is_empty() || defaults.iter().any(|x| x == d) {
                continue;
            }
            defaults.push(d.to_string());
            if defaults.len() == QUICK_START_LIMIT {
                break;
            }
        }
        Settings {
            tz_offset_minutes: normalize_tz_offset_minutes(Some(self.tz_offset_minutes)),
            missing_ids: self.missing_ids,
            quick_start_defaults: defaults,
        }
    }
}

pub fn default_quick_starts() -> Vec<String> {
    DEFAULT_QUICK_STARTS.iter().map(|s| s.to_string()).collect()
}

pub fn normalize_tz_offset_minutes(v: Option<i32>) -> i32 {
    v.unwrap_or(0)
        .clamp(TZ_OFFSET_MINUTES_MIN, TZ_OFFSET_MINUTES_MAX)
}

pub fn tz_offset_from_minutes(minutes: i32) -> UtcOffset {
    UtcOffset::from_whole_seconds(minutes.saturating_mul(60)).unwrap_or(UtcOffset::UTC)
}

pub fn load_or_init_settings(conn: &Connection, defaults: Settings) -> rusqlite::Result<Settings> {
    if let Some(settings) = load_app_settings(conn)? {
        let fixed = settings.clone().normalized();
        if fixed != settings {
            upsert_app_settings(conn, &fixed)?;
        }
        return Ok(fixed);
    }

    let fixed = defaults.normalized();
    upsert_app_settings(conn, &fixed)?;
    Ok(fixed)
}

fn load_app_settings(conn: &Connection) -> rusqlite::Result<Option<Settings>> {
    conn.query_row(
        "SELECT tz_offset_minutes, missing_ids, quick_start_defaults_json FROM app_settings WHERE id = 1",
        [],
        |row| {
            let missing_ids: String = row.get(1)?;
            let defaults_json: Option<String> = row.get(2)?;
            let quick_start_defaults = match defaults_json.as_deref() {
                None => default_quick_starts(),
                Some(raw) => serde_json::from_str::<Vec<String>>(raw).unwrap_or_else(|err| {
                    warn!("quick_start_defaults_json unreadable, using defaults: {err}");
                    default_quick_starts()
                }),
            };
            Ok(Settings {
                tz_offset_minutes: row.get(0)?,
                missing_ids: MissingIdPolicy::from_column(&missing_ids),
                quick_start_defaults,
            })
        },
    )
    .optional()
}

pub fn upsert_app_settings(conn: &Connection, settings: &Settings) -> rusqlite::Result<()> {
    let defaults_json =
        serde_json::to_string(&settings.quick_start_defaults).unwrap_or_else(|_| "[]".to_string());
    let updated_at = format_ts(OffsetDateTime::now_utc());
    conn.execute(
        r#"
INSERT INTO app_settings (id, tz_offset_minutes, missing_ids, quick_start_defaults_json, updated_at)
VALUES (1, ?1, ?2, ?3, ?4)
ON CONFLICT(id) DO UPDATE SET
  tz_offset_minutes=excluded.tz_offset_minutes,
  missing_ids=excluded.missing_ids,
  quick_start_defaults_json=excluded.quick_start_defaults_json,
  updated_at=excluded.updated_at
        "#,
        (
            settings.tz_offset_minutes,
            settings.missing_ids.as_str(),
            defaults_json,
            updated_at,
        ),
    )?;
    Ok(())
}
