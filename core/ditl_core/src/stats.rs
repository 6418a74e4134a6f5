use std::collections::HashMap;

use serde::Serialize;
use time::{Date, OffsetDateTime};
use tracing::error;

use crate::activity::{format_ts, Activity};
use crate::calendar::{
    days_in_month_of, short_date, weeks_in_month, Calendar, Scope, Window, MONTH_LABELS,
    WEEKDAY_LABELS,
};
use crate::clip::clip_all;
use crate::store::ActivityStore;

pub const TOP_ACTIVITIES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedActivity {
    /// Earliest clipped occurrence of the title in the window.
    pub activity: Activity,
    pub minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartBuckets {
    pub current: Vec<i64>,
    pub previous: Vec<i64>,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BiggestDay {
    pub date: String,
    pub minutes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodStats {
    pub scope: Scope,
    pub offset: u32,
    pub title: String,
    pub range_label: String,
    pub start_ts: String,
    pub end_ts: String,
    pub total: i64,
    pub previous_total: i64,
    pub delta: i64,
    pub percent_change: f64,
    pub average_minutes: i64,
    pub average_unit: &'static str,
    pub ranked_activities: Vec<RankedActivity>,
    pub chart_buckets: ChartBuckets,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biggest_day: Option<BiggestDay>,
}

/// Clipped activities of one window.
struct Period {
    window: Window,
    clipped: Vec<Activity>,
    total: i64,
}

pub struct PeriodAggregator<'a> {
    store: &'a ActivityStore,
    calendar: Calendar,
}

impl<'a> PeriodAggregator<'a> {
    pub fn new(store: &'a ActivityStore, calendar: Calendar) -> Self {
        Self { store, calendar }
    }

    pub fn stats(&self, scope: Scope, offset: u32, now: OffsetDateTime) -> PeriodStats {
        let current = self.period(scope, offset, now);
        let previous = self.period(scope, offset.saturating_add(1), now);

        let delta = current.total - previous.total;
        let first_day = self.calendar.local_date(current.window.start);
        let last_day = self
            .calendar
            .local_date(current.window.end)
            .previous_day()
            .unwrap_or(first_day);

        PeriodStats {
            scope,
            offset,
            title: period_title(scope, offset),
            range_label: format!("{} – {}", short_date(first_day), short_date(last_day)),
            start_ts: format_ts(current.window.start),
            end_ts: format_ts(current.window.end),
            total: current.total,
            previous_total: previous.total,
            delta,
            percent_change: percent_change(current.total, previous.total),
            average_minutes: average_minutes(scope, current.total, first_day),
            average_unit: average_unit(scope),
            ranked_activities: rank(&current.clipped, TOP_ACTIVITIES),
            chart_buckets: self.chart(scope, &current, &previous),
            biggest_day: match scope {
                Scope::Year => biggest_day(&self.calendar, &current.clipped),
                Scope::Week | Scope::Month => None,
            },
        }
    }

    fn period(&self, scope: Scope, offset: u32, now: OffsetDateTime) -> Period {
        let window = self.calendar.window(scope, offset, now);
        let activities = self
            .store
            .list_overlapping(window.start, window.end)
            .unwrap_or_else(|err| {
                error!("list_overlapping failed for {} offset {offset}: {err}", scope.as_str());
                Vec::new()
            });
        let clipped = clip_all(&activities, window, now);
        let total = clipped.iter().filter_map(|a| a.duration_minutes).sum();
        Period {
            window,
            clipped,
            total,
        }
    }

    fn chart(&self, scope: Scope, current: &Period, previous: &Period) -> ChartBuckets {
        let len = match scope {
            Scope::Week => WEEKDAY_LABELS.len(),
            Scope::Year => MONTH_LABELS.len(),
            Scope::Month => self
                .month_weeks(current.window)
                .max(self.month_weeks(previous.window)),
        };
        let labels = match scope {
            Scope::Week => WEEKDAY_LABELS.iter().map(|s| s.to_string()).collect(),
            Scope::Year => MONTH_LABELS.iter().map(|s| s.to_string()).collect(),
            Scope::Month => (1..=len).map(|i| format!("Week {i}")).collect(),
        };
        ChartBuckets {
            current: self.buckets(scope, &current.clipped, len),
            previous: self.buckets(scope, &previous.clipped, len),
            labels,
        }
    }

    fn month_weeks(&self, window: Window) -> usize {
        let first = self.calendar.local_date(window.start);
        weeks_in_month(first.year(), first.month())
    }

    fn buckets(&self, scope: Scope, clipped: &[Activity], len: usize) -> Vec<i64> {
        let mut out = vec![0; len];
        for a in clipped {
            let idx = match scope {
                Scope::Week => self.calendar.weekday_index(a.start_time),
                Scope::Month => self.calendar.week_of_month(a.start_time),
                Scope::Year => self.calendar.month_index(a.start_time),
            };
            if let Some(slot) = out.get_mut(idx) {
                *slot += a.duration_minutes.unwrap_or(0);
            }
        }
        out
    }
}

/// Minutes per title, highest first; equal totals keep first-seen order.
pub fn rank(clipped: &[Activity], limit: usize) -> Vec<RankedActivity> {
    let mut ranked: Vec<RankedActivity> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for a in clipped {
        let minutes = a.duration_minutes.unwrap_or(0);
        match index.get(a.title.as_str()) {
            Some(&i) => ranked[i].minutes += minutes,
            None => {
                index.insert(a.title.as_str(), ranked.len());
                ranked.push(RankedActivity {
                    activity: a.clone(),
                    minutes,
                });
            }
        }
    }
    ranked.sort_by(|a, b| b.minutes.cmp(&a.minutes));
    ranked.truncate(limit);
    ranked
}

pub fn biggest_day(calendar: &Calendar, clipped: &[Activity]) -> Option<BiggestDay> {
    let mut days: Vec<(Date, i64)> = Vec::new();
    for a in clipped {
        let day = calendar.local_date(a.start_time);
        let minutes = a.duration_minutes.unwrap_or(0);
        match days.iter_mut().find(|(d, _)| *d == day) {
            Some((_, total)) => *total += minutes,
            None => days.push((day, minutes)),
        }
    }

    let mut best: Option<(Date, i64)> = None;
    for (day, minutes) in days {
        if best.map_or(true, |(_, m)| minutes > m) {
            best = Some((day, minutes));
        }
    }
    best.map(|(date, minutes)| BiggestDay {
        date: date.to_string(),
        minutes,
    })
}

/// Zero when there is nothing to compare against.
pub fn percent_change(total: i64, previous_total: i64) -> f64 {
    if previous_total <= 0 {
        return 0.0;
    }
    (total - previous_total) as f64 / previous_total as f64 * 100.0
}

pub fn period_title(scope: Scope, offset: u32) -> String {
    match offset {
        0 => format!("This {}", scope.display_name()),
        1 => format!("1 {} Ago", scope.display_name()),
        n => format!("{n} {}s Ago", scope.display_name()),
    }
}

fn average_minutes(scope: Scope, total: i64, first_day: Date) -> i64 {
    match scope {
        Scope::Week => total / 7,
        Scope::Month => total / i64::from(days_in_month_of(first_day)),
        Scope::Year => total / 12,
    }
}

fn average_unit(scope: Scope) -> &'static str {
    match scope {
        Scope::Week | Scope::Month => "day",
        Scope::Year => "month",
    }
}
