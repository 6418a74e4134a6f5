use serde::{Deserialize, Serialize};
use time::{util::days_in_year_month, Date, Duration, Month, OffsetDateTime, UtcOffset};

pub const WEEKDAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
pub const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Week,
    Month,
    Year,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Week => "week",
            Scope::Month => "month",
            Scope::Year => "year",
        }
    }

    pub fn from_name(name: &str) -> Option<Scope> {
        match name.trim().to_ascii_lowercase().as_str() {
            "week" => Some(Scope::Week),
            "month" => Some(Scope::Month),
            "year" => Some(Scope::Year),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Scope::Week => "Week",
            Scope::Month => "Month",
            Scope::Year => "Year",
        }
    }
}

/// Half-open instant range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

/// Fixed UTC offset; callers send the offset that applies to the queried date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    offset: UtcOffset,
}

impl Default for Calendar {
    fn default() -> Self {
        Self::new(UtcOffset::UTC)
    }
}

impl Calendar {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }

    pub fn local_date(&self, t: OffsetDateTime) -> Date {
        t.to_offset(self.offset).date()
    }

    pub fn start_of_day(&self, date: Date) -> OffsetDateTime {
        date.midnight().assume_offset(self.offset)
    }

    pub fn day_window(&self, date: Date) -> Window {
        Window {
            start: self.start_of_day(date),
            end: self.start_of_day(date.next_day().unwrap_or(Date::MAX)),
        }
    }

    /// Window for `scope`, `offset` units back from the one containing `now`.
    pub fn window(&self, scope: Scope, offset: u32, now: OffsetDateTime) -> Window {
        let today = self.local_date(now);
        let (first, next) = match scope {
            Scope::Week => {
                let anchor = today
                    .checked_sub(Duration::weeks(i64::from(offset)))
                    .unwrap_or(Date::MIN);
                let monday = anchor
                    .checked_sub(Duration::days(i64::from(
                        anchor.weekday().number_days_from_monday(),
                    )))
                    .unwrap_or(Date::MIN);
                let next = monday.checked_add(Duration::days(7)).unwrap_or(Date::MAX);
                (monday, next)
            }
            Scope::Month => {
                let index = month_index(today) - i64::from(offset);
                (first_of_month_index(index), first_of_month_index(index + 1))
            }
            Scope::Year => {
                let year = i64::from(today.year()) - i64::from(offset);
                (first_of_year(year), first_of_year(year + 1))
            }
        };
        Window {
            start: self.start_of_day(first),
            end: self.start_of_day(next),
        }
    }

    /// Monday = 0 .. Sunday = 6.
    pub fn weekday_index(&self, t: OffsetDateTime) -> usize {
        usize::from(self.local_date(t).weekday().number_days_from_monday())
    }

    /// January = 0 .. December = 11.
    pub fn month_index(&self, t: OffsetDateTime) -> usize {
        usize::from(u8::from(self.local_date(t).month())) - 1
    }

    /// Zero-based Monday-start week of the month containing `t`.
    pub fn week_of_month(&self, t: OffsetDateTime) -> usize {
        week_of_month(self.local_date(t))
    }
}

// Weeks start on Monday; week 0 is the one containing the 1st.
pub fn week_of_month(date: Date) -> usize {
    let first = date.replace_day(1).unwrap_or(date);
    let lead = usize::from(first.weekday().number_days_from_monday());
    (usize::from(date.day()) - 1 + lead) / 7
}

pub fn weeks_in_month(year: i32, month: Month) -> usize {
    let last = days_in_year_month(year, month);
    match Date::from_calendar_date(year, month, last) {
        Ok(d) => week_of_month(d) + 1,
        Err(_) => 5,
    }
}

pub fn days_in_month_of(date: Date) -> u8 {
    days_in_year_month(date.year(), date.month())
}

/// "Oct 12" style label.
pub fn short_date(date: Date) -> String {
    let m = usize::from(u8::from(date.month())) - 1;
    format!("{} {}", MONTH_LABELS[m], date.day())
}

/// Parses `YYYY-MM-DD`.
pub fn parse_date(date: &str) -> Result<Date, ()> {
    let parts: Vec<&str> = date.trim().split('-').collect();
    if parts.len() != 3 {
        return Err(());
    }
    let y: i32 = parts[0].parse().map_err(|_| ())?;
    let m: u8 = parts[1].parse().map_err(|_| ())?;
    let d: u8 = parts[2].parse().map_err(|_| ())?;
    let month = Month::try_from(m).map_err(|_| ())?;
    Date::from_calendar_date(y, month, d).map_err(|_| ())
}

fn month_index(date: Date) -> i64 {
    i64::from(date.year()) * 12 + i64::from(u8::from(date.month())) - 1
}

fn first_of_month_index(index: i64) -> Date {
    let year = index.div_euclid(12);
    let month = (index.rem_euclid(12) + 1) as u8;
    let Ok(year) = i32::try_from(year) else {
        return if index < 0 { Date::MIN } else { Date::MAX };
    };
    Month::try_from(month)
        .ok()
        .and_then(|m| Date::from_calendar_date(year, m, 1).ok())
        .unwrap_or(if index < 0 { Date::MIN } else { Date::MAX })
}

fn first_of_year(year: i64) -> Date {
    i32::try_from(year)
        .ok()
        .and_then(|y| Date::from_calendar_date(y, Month::January, 1).ok())
        .unwrap_or(if year < 0 { Date::MIN } else { Date::MAX })
}
