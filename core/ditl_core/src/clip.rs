use time::OffsetDateTime;

use crate::activity::{whole_minutes, Activity};
use crate::calendar::Window;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clipped {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
    pub minutes: i64,
}

pub fn clip(
    start: OffsetDateTime,
    end: Option<OffsetDateTime>,
    now: OffsetDateTime,
    window: Window,
) -> Option<Clipped> {
    let clipped_start = start.max(window.start);
    let clipped_end = end.unwrap_or(now).min(window.end);
    let minutes = whole_minutes(clipped_start, clipped_end);
    if minutes == 0 {
        return None;
    }
    Some(Clipped {
        start: clipped_start,
        end: clipped_end,
        minutes,
    })
}

/// The activity restricted to `window`, with `duration_minutes` set to the
/// clipped length.
pub fn clip_activity(activity: &Activity, window: Window, now: OffsetDateTime) -> Option<Activity> {
    let c = clip(activity.start_time, activity.end_time, now, window)?;
    Some(Activity {
        id: activity.id,
        title: activity.title.clone(),
        start_time: c.start,
        end_time: Some(c.end),
        duration_minutes: Some(c.minutes),
    })
}

/// Clips every activity to `window`, keeping input order and dropping empty results.
pub fn clip_all(activities: &[Activity], window: Window, now: OffsetDateTime) -> Vec<Activity> {
    activities
        .iter()
        .filter_map(|a| clip_activity(a, window, now))
        .collect()
}
