use serde::Serialize;
use time::{Date, OffsetDateTime};
use tracing::error;

use crate::activity::Activity;
use crate::calendar::Calendar;
use crate::clip::clip_all;
use crate::stats::{rank, RankedActivity, TOP_ACTIVITIES};
use crate::store::ActivityStore;

#[derive(Debug, Serialize)]
pub struct DayTimeline {
    pub date: String,
    pub total_minutes: i64,
    /// Titles with the most minutes that day.
    pub top_activities: Vec<RankedActivity>,
    pub activities: Vec<Activity>,
}

/// Activities of one calendar day, clipped to that day (and to `now` while
/// running), oldest first. A failed read yields an empty list.
pub fn list_for_day(
    store: &ActivityStore,
    calendar: &Calendar,
    date: Date,
    now: OffsetDateTime,
) -> Vec<Activity> {
    let window = calendar.day_window(date);
    match store.list_overlapping(window.start, window.end) {
        Ok(activities) => clip_all(&activities, window, now),
        Err(err) => {
            error!("list_overlapping failed for {date}: {err}");
            Vec::new()
        }
    }
}

pub fn day_timeline(
    store: &ActivityStore,
    calendar: &Calendar,
    date: Date,
    now: OffsetDateTime,
) -> DayTimeline {
    let activities = list_for_day(store, calendar, date, now);
    DayTimeline {
        date: date.to_string(),
        total_minutes: total_minutes(&activities),
        top_activities: rank(&activities, TOP_ACTIVITIES),
        activities,
    }
}

pub fn total_minutes(clipped: &[Activity]) -> i64 {
    clipped.iter().filter_map(|a| a.duration_minutes).sum()
}
