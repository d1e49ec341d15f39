//! Daily summary computation: sleep sessions, wake windows and per-category
//! totals for one calendar day.

use crate::event::{Event, EventKind};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use std::fmt;

/// Substring present in the "no events" text and never in a populated summary.
pub const NO_EVENTS_MARKER: &str = "No events";

const MICROS_PER_HOUR: f64 = 3_600_000_000.0;

#[derive(Debug, Clone, PartialEq)]
pub enum DailySummary {
    NoEvents { date: NaiveDate },
    Stats(DailyStats),
}

impl DailySummary {
    pub fn should_notify(&self) -> bool {
        matches!(self, DailySummary::Stats(_))
    }
}

impl fmt::Display for DailySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DailySummary::NoEvents { date } => {
                write!(f, "{NO_EVENTS_MARKER} for {}.", format_date(*date))
            }
            DailySummary::Stats(stats) => fmt::Display::fmt(stats, f),
        }
    }
}

/// True when rendered summary text is the "no events" sentinel.
pub fn is_no_events_text(text: &str) -> bool {
    text.contains(NO_EVENTS_MARKER)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SleepSession {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub sessions: Vec<SleepSession>,
    pub wake_windows: Vec<f64>,
    pub sleep_hours: f64,
    pub feed: Ounces,
    pub pump: Ounces,
    pub freeze: Ounces,
    pub h2o: Ounces,
    pub poop_count: u32,
    pub pee_count: u32,
}

impl DailyStats {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            sessions: Vec::new(),
            wake_windows: Vec::new(),
            sleep_hours: 0.0,
            feed: Ounces::default(),
            pump: Ounces::default(),
            freeze: Ounces::default(),
            h2o: Ounces::default(),
            poop_count: 0,
            pee_count: 0,
        }
    }

    pub fn avg_wake_window_hours(&self) -> f64 {
        if self.wake_windows.is_empty() {
            return 0.0;
        }
        self.wake_windows.iter().sum::<f64>() / self.wake_windows.len() as f64
    }
}

impl fmt::Display for DailyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", format_date(self.date))?;

        write!(f, "Baby Stats - Slept ")?;
        if self.sleep_hours > 0.0 {
            write!(f, "{:.1} hours", self.sleep_hours)?;
        } else {
            write!(f, "0 hours")?;
        }
        let avg_wake = self.avg_wake_window_hours();
        if avg_wake > 0.0 {
            write!(f, ", Avg wake window: {avg_wake:.1} hours")?;
        }
        writeln!(
            f,
            ", Fed {} oz, {} {}, {} {}",
            self.feed,
            self.poop_count,
            plural(self.poop_count, "poop", "poops"),
            self.pee_count,
            plural(self.pee_count, "pee", "pees"),
        )?;

        writeln!(
            f,
            "Mama Stats - Pumped {} oz, Froze {} oz, Drank {} oz",
            self.pump, self.freeze, self.h2o
        )
    }
}

/// Running ounce total for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Ounces {
    pub total: f64,
    pub entries: u32,
}

impl Ounces {
    fn add(&mut self, amount: f64) {
        self.total += amount;
        self.entries += 1;
    }
}

impl fmt::Display for Ounces {
    /// A category nobody logged prints as a bare `0`; logged totals always
    /// carry a fractional part (`4.0`, `0.5`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries == 0 {
            return f.write_str("0");
        }
        let total = self.total;
        if total.is_finite() && total.fract() == 0.0 && total.abs() < 1e16 {
            write!(f, "{total:.1}")
        } else {
            write!(f, "{total}")
        }
    }
}

fn plural<'a>(count: u32, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 { one } else { many }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%B %d, %Y").to_string()
}

#[derive(Debug, Clone, Copy)]
struct DayBounds {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl DayBounds {
    fn of(date: NaiveDate) -> Self {
        let start = date.and_time(NaiveTime::MIN);
        Self {
            start,
            end: start + TimeDelta::days(1) - TimeDelta::microseconds(1),
        }
    }

    /// Hours of `[start, end)` falling inside the day, zero when disjoint.
    fn clipped_hours(&self, start: NaiveDateTime, end: NaiveDateTime) -> f64 {
        let start = start.max(self.start);
        let end = end.min(self.end);
        if end <= start {
            return 0.0;
        }
        (end - start)
            .num_microseconds()
            .map(|micros| micros as f64 / MICROS_PER_HOUR)
            .unwrap_or(0.0)
    }
}

/// Builds the summary for `date` from the full, unordered event list.
pub fn summarize(events: &[Event], date: NaiveDate) -> DailySummary {
    let mut day_events: Vec<&Event> = events.iter().filter(|ev| ev.date() == date).collect();
    if day_events.is_empty() {
        return DailySummary::NoEvents { date };
    }
    day_events.sort_by_key(|ev| ev.ts.local());

    let bounds = DayBounds::of(date);
    let mut stats = DailyStats::empty(date);
    let mut current_sleep_start: Option<NaiveDateTime> = None;
    let mut last_sleep_end: Option<NaiveDateTime> = None;

    for ev in day_events {
        let at = ev.ts.local();
        match &ev.kind {
            EventKind::SleepStart => {
                if let Some(woke) = last_sleep_end.take() {
                    let hours = bounds.clipped_hours(woke, at);
                    if hours > 0.0 {
                        stats.wake_windows.push(hours);
                    }
                }
                current_sleep_start = Some(at);
            }
            EventKind::SleepEnd => {
                if let Some(start) = current_sleep_start.take() {
                    stats.sessions.push(SleepSession { start, end: at });
                    last_sleep_end = Some(at);
                }
            }
            EventKind::Feed => stats.feed.add(ev.amount()),
            EventKind::Pump => stats.pump.add(ev.amount()),
            EventKind::Freeze => stats.freeze.add(ev.amount()),
            EventKind::H2o => stats.h2o.add(ev.amount()),
            EventKind::Poop => stats.poop_count += 1,
            EventKind::Pee => stats.pee_count += 1,
            EventKind::Other(_) => {}
        }
    }

    if let Some(open) = current_sleep_start {
        tracing::debug!(%date, start = %open, "dropping unterminated sleep session");
    }

    stats.sleep_hours = stats
        .sessions
        .iter()
        .map(|session| bounds.clipped_hours(session.start, session.end))
        .sum();

    DailySummary::Stats(stats)
}
