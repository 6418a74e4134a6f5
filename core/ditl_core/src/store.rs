use std::{collections::HashSet, path::Path};

use rusqlite::{params, Connection, OptionalExtension, Row};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::activity::{
    check_duration, check_span, normalize_title, whole_minutes, whole_seconds, Activity,
    ActivityUpdate,
};
use crate::error::{StoreError, ValidationError};
use crate::settings::{load_or_init_settings, upsert_app_settings, MissingIdPolicy, Settings};

const ACTIVITY_COLUMNS: &str = "id, title, start_time, end_time, duration_minutes";

pub struct ActivityStore {
    conn: Connection,
    missing_ids: MissingIdPolicy,
}

/// Per-title usage over the whole history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleUsage {
    pub title: String,
    pub count: i64,
    pub last_used: OffsetDateTime,
}

impl ActivityStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self, StoreError> {
        init_db(&mut conn)?;
        Ok(Self {
            conn,
            missing_ids: MissingIdPolicy::default(),
        })
    }

    pub fn missing_id_policy(&self) -> MissingIdPolicy {
        self.missing_ids
    }

    pub fn set_missing_id_policy(&mut self, policy: MissingIdPolicy) {
        self.missing_ids = policy;
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Stored settings, inserting `defaults` on first run.
    pub fn load_settings(&self, defaults: Settings) -> Result<Settings, StoreError> {
        Ok(load_or_init_settings(&self.conn, defaults)?)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        Ok(upsert_app_settings(&self.conn, settings)?)
    }

    /// Without `end` the activity is open; only one may be open at a time.
    pub fn create(
        &mut self,
        title: &str,
        start: OffsetDateTime,
        end: Option<OffsetDateTime>,
        duration_minutes: Option<i64>,
    ) -> Result<i64, StoreError> {
        let title = normalize_title(title)?;
        let start = whole_seconds(start);
        let end = end.map(whole_seconds);
        check_span(start, end)?;
        check_duration(duration_minutes)?;
        let duration_minutes = duration_minutes.or_else(|| end.map(|e| whole_minutes(start, e)));

        let tx = self.conn.transaction()?;
        if end.is_none() {
            if let Some(open_id) = open_activity_id(&tx)? {
                return Err(StoreError::AlreadyRunning(open_id));
            }
        }
        let id = insert_activity(&tx, &title, start, end, duration_minutes)?;
        tx.commit()?;

        debug!(id, title = %title, "activity created");
        Ok(id)
    }

    pub fn read(&self, id: i64) -> Result<Option<Activity>, StoreError> {
        Ok(read_activity(&self.conn, id)?)
    }

    pub fn update(&mut self, id: i64, changes: &ActivityUpdate) -> Result<(), StoreError> {
        if changes.is_empty() {
            return Ok(());
        }
        let title = changes.title.as_deref().map(normalize_title).transpose()?;
        check_duration(changes.duration_minutes)?;

        let policy = self.missing_ids;
        let tx = self.conn.transaction()?;
        let Some(existing) = read_activity(&tx, id)? else {
            return missing_id(policy, id, "update");
        };

        let start = changes.start_time.map(whole_seconds).unwrap_or(existing.start_time);
        let end = changes.end_time.map(whole_seconds).or(existing.end_time);
        check_span(start, end)?;

        let span_changed = changes.start_time.is_some() || changes.end_time.is_some();
        let duration_minutes = match (changes.duration_minutes, end) {
            (Some(d), _) => Some(d),
            (None, Some(end)) if span_changed => Some(whole_minutes(start, end)),
            (None, _) => existing.duration_minutes,
        };

        tx.execute(
            "UPDATE activities SET title = ?1, start_time = ?2, end_time = ?3, duration_minutes = ?4 WHERE id = ?5",
            params![
                title.unwrap_or(existing.title),
                start.unix_timestamp(),
                end.map(|t| t.unix_timestamp()),
                duration_minutes,
                id,
            ],
        )?;
        tx.commit()?;

        debug!(id, "activity updated");
        Ok(())
    }

    pub fn delete(&mut self, id: i64) -> Result<(), StoreError> {
        let deleted = self
            .conn
            .execute("DELETE FROM activities WHERE id = ?1", [id])?;
        if deleted == 0 {
            return missing_id(self.missing_ids, id, "delete");
        }
        debug!(id, "activity deleted");
        Ok(())
    }

    /// Activities intersecting `[from, to)`, oldest first. Unclipped.
    pub fn list_overlapping(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<Activity>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities \
             WHERE start_time < ?2 AND (end_time IS NULL OR end_time > ?1) \
             ORDER BY start_time ASC, id ASC"
        ))?;
        let rows = stmt.query_map(
            params![from.unix_timestamp(), to.unix_timestamp()],
            activity_from_row,
        )?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn current(&self) -> Result<Option<Activity>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE end_time IS NULL \
                     ORDER BY start_time DESC, id DESC LIMIT 1"
                ),
                [],
                activity_from_row,
            )
            .optional()?)
    }

    // Nearest match within the tolerance wins. A new record is open when idle,
    // otherwise closed with zero length.
    pub fn find_or_create(
        &mut self,
        title: &str,
        approx_start: OffsetDateTime,
        tolerance_seconds: i64,
    ) -> Result<Activity, StoreError> {
        let title = normalize_title(title)?;
        if tolerance_seconds < 0 {
            return Err(ValidationError::NegativeTolerance.into());
        }
        let approx_start = whole_seconds(approx_start);
        let approx = approx_start.unix_timestamp();

        let tx = self.conn.transaction()?;
        let found = tx
            .query_row(
                &format!(
                    "SELECT {ACTIVITY_COLUMNS} FROM activities \
                     WHERE title = ?1 AND ABS(start_time - ?2) < ?3 \
                     ORDER BY ABS(start_time - ?2) ASC, id ASC LIMIT 1"
                ),
                params![title, approx, tolerance_seconds],
                activity_from_row,
            )
            .optional()?;
        if let Some(activity) = found {
            return Ok(activity);
        }

        let end = match open_activity_id(&tx)? {
            Some(_) => Some(approx_start),
            None => None,
        };
        let duration = end.map(|_| 0);
        let id = insert_activity(&tx, &title, approx_start, end, duration)?;
        let created = read_activity(&tx, id)?.ok_or(StoreError::NotFound(id))?;
        tx.commit()?;

        info!(id, title = %title, running = created.is_running(), "activity created for clip");
        Ok(created)
    }

    /// Titles ranked by use count, then by most recent start.
    pub fn title_usage(&self, limit: usize) -> Result<Vec<TitleUsage>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT title, COUNT(*) AS usage_count, MAX(start_time) AS last_used
FROM activities
GROUP BY title
ORDER BY usage_count DESC, last_used DESC, title ASC
LIMIT ?1
"#,
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            Ok(TitleUsage {
                title: row.get(0)?,
                count: row.get(1)?,
                last_used: ts_from_column(row.get(2)?, 2)?,
            })
        })?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Deletes every activity. Ids keep counting up afterwards.
    pub fn wipe(&mut self) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        let deleted = tx.execute("DELETE FROM activities", [])?;
        tx.commit()?;
        info!(deleted, "all activities wiped");
        Ok(deleted)
    }
}

fn missing_id(policy: MissingIdPolicy, id: i64, op: &str) -> Result<(), StoreError> {
    match policy {
        MissingIdPolicy::Silent => {
            debug!(id, op, "no activity with this id; ignoring");
            Ok(())
        }
        MissingIdPolicy::Strict => Err(StoreError::NotFound(id)),
    }
}

fn insert_activity(
    conn: &Connection,
    title: &str,
    start: OffsetDateTime,
    end: Option<OffsetDateTime>,
    duration_minutes: Option<i64>,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO activities (title, start_time, end_time, duration_minutes) VALUES (?1, ?2, ?3, ?4)",
        params![
            title,
            start.unix_timestamp(),
            end.map(|t| t.unix_timestamp()),
            duration_minutes,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn read_activity(conn: &Connection, id: i64) -> rusqlite::Result<Option<Activity>> {
    conn.query_row(
        &format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = ?1"),
        [id],
        activity_from_row,
    )
    .optional()
}

fn open_activity_id(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM activities WHERE end_time IS NULL ORDER BY start_time DESC LIMIT 1",
        [],
        |row| row.get(0),
    )
    .optional()
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<Activity> {
    let end_time = match row.get::<_, Option<i64>>(3)? {
        Some(secs) => Some(ts_from_column(secs, 3)?),
        None => None,
    };
    Ok(Activity {
        id: row.get(0)?,
        title: row.get(1)?,
        start_time: ts_from_column(row.get(2)?, 2)?,
        end_time,
        duration_minutes: row.get(4)?,
    })
}

fn ts_from_column(secs: i64, idx: usize) -> rusqlite::Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(secs).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Integer,
            Box::new(err),
        )
    })
}

struct Migration {
    name: &'static str,
    apply: fn(&Connection) -> rusqlite::Result<()>,
}

/// Applied in order at open. Each step is additive and safe to run again.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "0001_create_activities",
        apply: create_activities,
    },
    Migration {
        name: "0002_activities_duration_minutes",
        apply: ensure_activities_columns,
    },
    Migration {
        name: "0003_activities_indexes",
        apply: create_activities_indexes,
    },
    Migration {
        name: "0004_create_app_settings",
        apply: create_app_settings,
    },
    Migration {
        name: "0005_app_settings_columns",
        apply: ensure_app_settings_columns,
    },
];

fn init_db(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = FULL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS schema_migrations (
  name TEXT PRIMARY KEY,
  applied_at INTEGER NOT NULL
);
"#,
    )?;
    run_migrations(conn)
}

fn run_migrations(conn: &mut Connection) -> rusqlite::Result<()> {
    for m in MIGRATIONS {
        let tx = conn.transaction()?;
        let applied: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE name = ?1)",
            [m.name],
            |row| row.get(0),
        )?;
        if applied {
            continue;
        }
        if let Err(err) = (m.apply)(&tx) {
            warn!(migration = m.name, "schema migration failed: {err}");
            return Err(err);
        }
        tx.execute(
            "INSERT INTO schema_migrations (name, applied_at) VALUES (?1, ?2)",
            params![m.name, OffsetDateTime::now_utc().unix_timestamp()],
        )?;
        tx.commit()?;
        info!(migration = m.name, "schema migration applied");
    }
    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut cols: HashSet<String> = HashSet::new();
    for r in rows {
        cols.insert(r?);
    }
    Ok(cols)
}

fn create_activities(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS activities (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  title TEXT NOT NULL,
  start_time INTEGER NOT NULL,
  end_time INTEGER
);
"#,
    )
}

fn ensure_activities_columns(conn: &Connection) -> rusqlite::Result<()> {
    let cols = table_columns(conn, "activities")?;
    if !cols.contains("duration_minutes") {
        conn.execute(
            "ALTER TABLE activities ADD COLUMN duration_minutes INTEGER",
            [],
        )?;
    }
    Ok(())
}

fn create_activities_indexes(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
CREATE INDEX IF NOT EXISTS idx_activities_start_time ON activities(start_time);
CREATE INDEX IF NOT EXISTS idx_activities_end_time ON activities(end_time);
CREATE INDEX IF NOT EXISTS idx_activities_title ON activities(title);
"#,
    )
}

fn create_app_settings(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS app_settings (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  tz_offset_minutes INTEGER NOT NULL DEFAULT 0,
  updated_at TEXT NOT NULL
);
"#,
    )
}

fn ensure_app_settings_columns(conn: &Connection) -> rusqlite::Result<()> {
    let cols = table_columns(conn, "app_settings")?;
    if !cols.contains("missing_ids") {
        conn.execute(
            "ALTER TABLE app_settings ADD COLUMN missing_ids TEXT NOT NULL DEFAULT 'silent'",
            [],
        )?;
    }
    if !cols.contains("quick_start_defaults_json") {
        conn.execute(
            "ALTER TABLE app_settings ADD COLUMN quick_start_defaults_json TEXT",
            [],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Window;
    use crate::clip::clip_all;
    use time::format_description::well_known::Rfc3339;

    fn ts(s: &str) -> OffsetDateTime {
        OffsetDateTime::parse(s, &Rfc3339).unwrap()
    }

    #[test]
    fn sub_second_inputs_store_consistent_minutes() {
        let mut store = ActivityStore::in_memory().unwrap();
        let id = store
            .create(
                "Homework",
                ts("2026-10-14T08:12:00.900Z"),
                Some(ts("2026-10-14T09:47:00.100Z")),
                None,
            )
            .unwrap();

        let stored = store.read(id).unwrap().unwrap();
        assert_eq!(stored.start_time, ts("2026-10-14T08:12:00Z"));
        assert_eq!(stored.end_time, Some(ts("2026-10-14T09:47:00Z")));
        assert_eq!(stored.duration_minutes, Some(95));

        let day = Window {
            start: ts("2026-10-14T00:00:00Z"),
            end: ts("2026-10-15T00:00:00Z"),
        };
        let clipped = clip_all(&[stored], day, ts("2026-10-14T20:00:00Z"));
        assert_eq!(clipped[0].duration_minutes, Some(95));

        store
            .update(
                id,
                &ActivityUpdate {
                    end_time: Some(ts("2026-10-14T08:42:59.999Z")),
                    ..Default::default()
                },
            )
            .unwrap();
        let a = store.read(id).unwrap().unwrap();
        assert_eq!(a.end_time, Some(ts("2026-10-14T08:42:59Z")));
        assert_eq!(a.duration_minutes, Some(30));
    }

    #[test]
    fn create_then_read_round_trips() {
        let mut store = ActivityStore::in_memory().unwrap();
        let id = store
            .create(
                "  Homework ",
                ts("2026-10-14T08:12:00Z"),
                Some(ts("2026-10-14T09:47:00Z")),
                None,
            )
            .unwrap();

        let a = store.read(id).unwrap().unwrap();
        assert_eq!(a.title, "Homework");
        assert_eq!(a.start_time, ts("2026-10-14T08:12:00Z"));
        assert_eq!(a.end_time, Some(ts("2026-10-14T09:47:00Z")));
        assert_eq!(a.duration_minutes, Some(95));
        assert!(store.read(id + 1).unwrap().is_none());
    }

    #[test]
    fn create_rejects_invalid_input_without_writing() {
        let mut store = ActivityStore::in_memory().unwrap();
        let start = ts("2026-10-14T10:00:00Z");

        let err = store.create(" \t", start, None, None).unwrap_err();
        assert!(matches!(err, StoreError::Validation(ValidationError::EmptyTitle)));

        let err = store
            .create("Code", start, Some(ts("2026-10-14T09:00:00Z")), None)
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(ValidationError::EndBeforeStart)));

        let err = store.create("Code", start, None, Some(-1)).unwrap_err();
        assert!(matches!(err, StoreError::Validation(ValidationError::NegativeDuration)));

        assert!(store
            .list_overlapping(ts("2000-01-01T00:00:00Z"), ts("2100-01-01T00:00:00Z"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn only_one_open_activity() {
        let mut store = ActivityStore::in_memory().unwrap();
        let first = store
            .create("Code", ts("2026-10-14T10:00:00Z"), None, None)
            .unwrap();
        let err = store
            .create("Eat", ts("2026-10-14T11:00:00Z"), None, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyRunning(id) if id == first));

        // Closed activities are still accepted while one is open.
        store
            .create(
                "Eat",
                ts("2026-10-14T07:00:00Z"),
                Some(ts("2026-10-14T07:30:00Z")),
                None,
            )
            .unwrap();
        assert_eq!(store.current().unwrap().unwrap().id, first);
    }

    #[test]
    fn titles_with_quotes_and_delimiters_round_trip() {
        let mut store = ActivityStore::in_memory().unwrap();
        let title = r#"Bob's "DROP TABLE activities;" -- , | ; '' "#.trim();
        let id = store
            .create(title, ts("2026-10-14T10:00:00Z"), None, None)
            .unwrap();
        assert_eq!(store.read(id).unwrap().unwrap().title, title);

        let renamed = "it's 100% \"done\"";
        store
            .update(
                id,
                &ActivityUpdate {
                    title: Some(renamed.to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(store.read(id).unwrap().unwrap().title, renamed);
    }

    #[test]
    fn update_applies_only_given_fields() {
        let mut store = ActivityStore::in_memory().unwrap();
        let id = store
            .create(
                "Code",
                ts("2026-10-14T10:00:00Z"),
                Some(ts("2026-10-14T11:00:00Z")),
                None,
            )
            .unwrap();

        store.update(id, &ActivityUpdate::default()).unwrap();
        assert_eq!(store.read(id).unwrap().unwrap().duration_minutes, Some(60));

        store
            .update(
                id,
                &ActivityUpdate {
                    end_time: Some(ts("2026-10-14T11:30:00Z")),
                    ..Default::default()
                },
            )
            .unwrap();
        let a = store.read(id).unwrap().unwrap();
        assert_eq!(a.title, "Code");
        assert_eq!(a.start_time, ts("2026-10-14T10:00:00Z"));
        assert_eq!(a.duration_minutes, Some(90));

        store
            .update(
                id,
                &ActivityUpdate {
                    duration_minutes: Some(42),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(store.read(id).unwrap().unwrap().duration_minutes, Some(42));
    }

    #[test]
    fn rejected_update_leaves_record_intact() {
        let mut store = ActivityStore::in_memory().unwrap();
        let id = store
            .create(
                "Code",
                ts("2026-10-14T10:00:00Z"),
                Some(ts("2026-10-14T11:00:00Z")),
                None,
            )
            .unwrap();
        let before = store.read(id).unwrap().unwrap();

        let err = store
            .update(
                id,
                &ActivityUpdate {
                    start_time: Some(ts("2026-10-14T12:00:00Z")),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(ValidationError::EndBeforeStart)));

        let err = store
            .update(
                id,
                &ActivityUpdate {
                    title: Some("   ".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(ValidationError::EmptyTitle)));

        assert_eq!(store.read(id).unwrap().unwrap(), before);
    }

    #[test]
    fn missing_ids_are_silent_by_default_and_reported_when_strict() {
        let mut store = ActivityStore::in_memory().unwrap();
        let rename = ActivityUpdate {
            title: Some("Eat".to_string()),
            ..Default::default()
        };

        store.update(99, &rename).unwrap();
        store.delete(99).unwrap();
        assert!(store.read(99).unwrap().is_none());

        store.set_missing_id_policy(MissingIdPolicy::Strict);
        assert!(matches!(store.update(99, &rename), Err(StoreError::NotFound(99))));
        assert!(matches!(store.delete(99), Err(StoreError::NotFound(99))));
    }

    #[test]
    fn delete_removes_and_ids_are_not_reused() {
        let mut store = ActivityStore::in_memory().unwrap();
        let start = ts("2026-10-14T10:00:00Z");
        let end = Some(ts("2026-10-14T10:30:00Z"));
        let first = store.create("Code", start, end, None).unwrap();
        store.delete(first).unwrap();
        assert!(store.read(first).unwrap().is_none());

        let second = store.create("Code", start, end, None).unwrap();
        assert!(second > first);

        store.wipe().unwrap();
        let third = store.create("Code", start, end, None).unwrap();
        assert!(third > second);
    }

    #[test]
    fn list_overlapping_filters_and_orders_by_start() {
        let mut store = ActivityStore::in_memory().unwrap();
        let late = store
            .create(
                "Late",
                ts("2026-10-14T15:00:00Z"),
                Some(ts("2026-10-14T16:00:00Z")),
                None,
            )
            .unwrap();
        let early = store
            .create(
                "Early",
                ts("2026-10-14T09:00:00Z"),
                Some(ts("2026-10-14T10:00:00Z")),
                None,
            )
            .unwrap();
        // Ends exactly at the window start: no overlap.
        store
            .create(
                "Before",
                ts("2026-10-14T07:00:00Z"),
                Some(ts("2026-10-14T08:00:00Z")),
                None,
            )
            .unwrap();
        // Starts exactly at the window end: no overlap.
        store
            .create(
                "After",
                ts("2026-10-14T18:00:00Z"),
                Some(ts("2026-10-14T19:00:00Z")),
                None,
            )
            .unwrap();
        let open = store
            .create("Running", ts("2026-10-13T23:00:00Z"), None, None)
            .unwrap();

        let got: Vec<i64> = store
            .list_overlapping(ts("2026-10-14T08:00:00Z"), ts("2026-10-14T18:00:00Z"))
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(got, vec![open, early, late]);
    }

    #[test]
    fn find_or_create_matches_within_tolerance() {
        let mut store = ActivityStore::in_memory().unwrap();
        let id = store
            .create(
                "Gym",
                ts("2026-10-14T07:00:00Z"),
                Some(ts("2026-10-14T08:00:00Z")),
                None,
            )
            .unwrap();

        let found = store
            .find_or_create("Gym", ts("2026-10-14T07:01:30Z"), 120)
            .unwrap();
        assert_eq!(found.id, id);

        // Boundary is exclusive.
        let created = store
            .find_or_create("Gym", ts("2026-10-14T07:02:00Z"), 120)
            .unwrap();
        assert_ne!(created.id, id);
        assert_eq!(created.start_time, ts("2026-10-14T07:02:00Z"));
        assert!(created.is_running());

        // Something is running now, so the next one is recorded closed.
        let closed = store
            .find_or_create("Swim", ts("2026-10-14T09:00:00Z"), 120)
            .unwrap();
        assert_eq!(closed.end_time, Some(ts("2026-10-14T09:00:00Z")));
        assert_eq!(closed.duration_minutes, Some(0));

        assert!(matches!(
            store.find_or_create("Swim", ts("2026-10-14T09:00:00Z"), -1),
            Err(StoreError::Validation(ValidationError::NegativeTolerance))
        ));
    }

    #[test]
    fn title_usage_ranks_by_count_then_recency() {
        let mut store = ActivityStore::in_memory().unwrap();
        let add = |store: &mut ActivityStore, title: &str, start: &str| {
            let start = ts(start);
            store
                .create(title, start, Some(start + time::Duration::minutes(10)), None)
                .unwrap();
        };
        add(&mut store, "Code", "2026-10-10T10:00:00Z");
        add(&mut store, "Code", "2026-10-11T10:00:00Z");
        add(&mut store, "Eat", "2026-10-12T10:00:00Z");
        add(&mut store, "Read", "2026-10-13T10:00:00Z");

        let usage = store.title_usage(10).unwrap();
        let titles: Vec<&str> = usage.iter().map(|u| u.title.as_str()).collect();
        assert_eq!(titles, vec!["Code", "Read", "Eat"]);
        assert_eq!(usage[0].count, 2);
        assert_eq!(usage[0].last_used, ts("2026-10-11T10:00:00Z"));
    }

    #[test]
    fn migrations_are_recorded_and_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ditl.db");

        let id = {
            let mut store = ActivityStore::open(&path).unwrap();
            store
                .create("Code", ts("2026-10-14T10:00:00Z"), None, None)
                .unwrap()
        };

        let mut store = ActivityStore::open(&path).unwrap();
        run_migrations(&mut store.conn).unwrap();
        for m in MIGRATIONS {
            (m.apply)(&store.conn).unwrap();
        }

        let applied: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
        assert_eq!(store.current().unwrap().unwrap().id, id);
    }

    #[test]
    fn older_schema_gains_new_columns_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                r#"
CREATE TABLE activities (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  title TEXT NOT NULL,
  start_time INTEGER NOT NULL,
  end_time INTEGER
);
INSERT INTO activities (title, start_time, end_time) VALUES ('Legacy', 1760000000, 1760003600);
"#,
            )
            .unwrap();
        }

        let store = ActivityStore::open(&path).unwrap();
        let cols = table_columns(&store.conn, "activities").unwrap();
        assert!(cols.contains("duration_minutes"));

        let legacy = store.read(1).unwrap().unwrap();
        assert_eq!(legacy.title, "Legacy");
        assert_eq!(legacy.duration_minutes, None);
    }
}
