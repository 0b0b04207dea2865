use std::fmt;

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One temperature interval within a day. The interval is half-open:
/// `start` is included, `end` is not.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub temperature: f64,
}

impl ScheduleEntry {
    pub fn new(start: NaiveTime, end: NaiveTime, temperature: f64) -> Self {
        Self { start, end, temperature }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time < self.end
    }

    fn overlaps(&self, other: &ScheduleEntry) -> bool {
        other.start < self.end && other.end > self.start
    }
}

impl fmt::Display for ScheduleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}: {}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M"),
            self.temperature
        )
    }
}

/// Entries for one weekday. Insertion order is preserved and meaningful:
/// lookup returns the first match in stored order.
pub type DaySchedule = Vec<ScheduleEntry>;

/// A full week of day schedules, indexed Monday-first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekSchedule {
    days: Vec<DaySchedule>,
}

impl WeekSchedule {
    /// Seven empty day schedules.
    pub fn empty() -> Self {
        Self { days: vec![Vec::new(); 7] }
    }

    /// Builds from an explicit day list. The list is kept as supplied so that
    /// [`validate`](Self::validate) can reject a wrong day count; storing it
    /// on a zone normalizes it to 7 days.
    pub fn from_days(days: Vec<DaySchedule>) -> Self {
        Self { days }
    }

    pub fn days(&self) -> &[DaySchedule] {
        &self.days
    }

    pub fn day(&self, weekday: Weekday) -> &[ScheduleEntry] {
        self.days
            .get(weekday.num_days_from_monday() as usize)
            .map(|d| d.as_slice())
            .unwrap_or(&[])
    }

    /// Pads with empty day schedules until the week has 7 days.
    pub(crate) fn normalize(&mut self) {
        while self.days.len() < 7 {
            self.days.push(Vec::new());
        }
    }

    /// Checks the week for exactly 7 days, internally ordered entries and
    /// pairwise non-overlapping intervals per day.
    pub fn validate(&self) -> Result<()> {
        if self.days.len() != 7 {
            return Err(Error::InvalidTimeSpec(format!(
                "a week schedule must have exactly 7 days, got {}",
                self.days.len()
            )));
        }
        for day in &self.days {
            for (i, entry) in day.iter().enumerate() {
                if entry.start >= entry.end {
                    return Err(Error::InvalidTimeSpec(format!(
                        "start time must be earlier than end time: {entry}"
                    )));
                }
                for other in &day[i + 1..] {
                    if entry.overlaps(other) {
                        return Err(Error::InvalidTimeSpec(format!(
                            "overlapping schedules: {entry} and {other}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// First entry of the given weekday whose interval contains `time`.
    pub fn active_entry(&self, weekday: Weekday, time: NaiveTime) -> Option<&ScheduleEntry> {
        self.day(weekday).iter().find(|entry| entry.contains(time))
    }
}

impl Default for WeekSchedule {
    fn default() -> Self {
        Self::empty()
    }
}
