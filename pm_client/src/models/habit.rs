use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::null_as_default;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HabitType {
    YesNo,
    Numeric,
    Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HabitFrequency {
    #[default]
    Daily,
    Weekly,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub habit_type: HabitType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub frequency: HabitFrequency,
    #[serde(default, deserialize_with = "null_as_default")]
    pub scheduled_days: Vec<DayOfWeek>,
    /// Target count for NUMERIC habits.
    #[serde(default)]
    pub number_of_times: Option<u32>,
    /// Target minutes for DURATION habits.
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl HabitData {
    /// The goal value for the habit's type, if it has one.
    pub fn target(&self) -> Option<u32> {
        match self.habit_type {
            HabitType::YesNo => None,
            HabitType::Numeric => self.number_of_times,
            HabitType::Duration => self.duration,
        }
    }

    pub fn is_scheduled_on(&self, day: NaiveDate) -> bool {
        use chrono::Datelike;
        self.scheduled_days.is_empty() || self.scheduled_days.contains(&day.weekday().into())
    }
}

/// Fields a user fills in to create or edit a habit.
#[derive(Debug, Clone, PartialEq)]
pub struct HabitDraft {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub habit_type: HabitType,
    pub frequency: HabitFrequency,
    pub scheduled_days: Vec<DayOfWeek>,
    pub number_of_times: Option<u32>,
    pub duration: Option<u32>,
}

impl HabitDraft {
    pub fn new(title: impl Into<String>, habit_type: HabitType) -> Self {
        Self {
            title: title.into(),
            description: None,
            category: None,
            habit_type,
            frequency: HabitFrequency::Daily,
            scheduled_days: Vec::new(),
            number_of_times: None,
            duration: None,
        }
    }

    /// Wire payload. Empty strings are omitted and the target fields are only
    /// sent for the habit type that uses them.
    pub fn payload(&self) -> HabitPayload<'_> {
        HabitPayload {
            title: &self.title,
            description: self.description.as_deref().filter(|s| !s.is_empty()),
            category: self.category.as_deref().filter(|s| !s.is_empty()),
            habit_type: self.habit_type,
            frequency: self.frequency,
            scheduled_days: &self.scheduled_days,
            number_of_times: self
                .number_of_times
                .filter(|_| self.habit_type == HabitType::Numeric),
            duration: self.duration.filter(|_| self.habit_type == HabitType::Duration),
        }
    }
}

impl From<&HabitData> for HabitDraft {
    fn from(habit: &HabitData) -> Self {
        Self {
            title: habit.title.clone(),
            description: habit.description.clone(),
            category: habit.category.clone(),
            habit_type: habit.habit_type,
            frequency: habit.frequency,
            scheduled_days: habit.scheduled_days.clone(),
            number_of_times: habit.number_of_times,
            duration: habit.duration,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitPayload<'a> {
    pub title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<&'a str>,
    pub habit_type: HabitType,
    pub frequency: HabitFrequency,
    pub scheduled_days: &'a [DayOfWeek],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_times: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitLog {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub habit_id: Option<i64>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Either a plain date or an ISO timestamp, depending on the endpoint.
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub number_of_times: Option<u32>,
    #[serde(default)]
    pub duration: Option<u32>,
}

impl HabitLog {
    /// The day this log counts for: `date`, else the date part of `createdAt`.
    pub fn day(&self) -> Option<NaiveDate> {
        if let Some(date) = self.date {
            return Some(date);
        }
        let created = self.created_at.as_deref()?;
        let date_part = created.split('T').next()?;
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
    }

    pub fn value(&self, field: LogField) -> Option<u32> {
        match field {
            LogField::NumberOfTimes => self.number_of_times,
            LogField::Duration => self.duration,
        }
    }
}

/// Body of a habit-log create/update.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitLogEntry {
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_times: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

impl HabitLogEntry {
    pub fn done(date: NaiveDate) -> Self {
        Self {
            date,
            completed: Some(true),
            number_of_times: None,
            duration: None,
        }
    }

    pub fn count(date: NaiveDate, times: u32) -> Self {
        Self {
            date,
            completed: None,
            number_of_times: Some(times),
            duration: None,
        }
    }

    pub fn minutes(date: NaiveDate, minutes: u32) -> Self {
        Self {
            date,
            completed: None,
            number_of_times: None,
            duration: Some(minutes),
        }
    }

    /// The entry a habit of this type expects for `value`.
    pub fn for_habit(habit_type: HabitType, date: NaiveDate, value: u32) -> Self {
        match habit_type {
            HabitType::YesNo => Self::done(date),
            HabitType::Numeric => Self::count(date, value),
            HabitType::Duration => Self::minutes(date, value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogField {
    NumberOfTimes,
    Duration,
}

/// Completion state of a habit on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayStatus {
    Complete,
    Partial,
    Unlogged,
}

fn log_on(logs: &[HabitLog], day: NaiveDate) -> Option<&HabitLog> {
    logs.iter().find(|log| log.day() == Some(day))
}

/// Derives a habit's status for `day` from its type and the value logged that day.
pub fn day_status(habit: &HabitData, logs: &[HabitLog], day: NaiveDate) -> DayStatus {
    let Some(log) = log_on(logs, day) else {
        return DayStatus::Unlogged;
    };

    let logged = match habit.habit_type {
        HabitType::YesNo => {
            return if log.completed == Some(true) {
                DayStatus::Complete
            } else {
                DayStatus::Unlogged
            };
        }
        HabitType::Numeric => log.number_of_times,
        HabitType::Duration => log.duration,
    };

    match (habit.target().filter(|t| *t > 0), logged) {
        (Some(target), Some(value)) if value >= target => DayStatus::Complete,
        (Some(_), Some(value)) if value > 0 => DayStatus::Partial,
        _ => DayStatus::Unlogged,
    }
}

/// Whether the habit's goal was reached on `day`.
///
/// Unlike [`day_status`], a target of zero counts as met by any logged value.
pub fn is_goal_met(habit: &HabitData, logs: &[HabitLog], day: NaiveDate) -> bool {
    let Some(log) = log_on(logs, day) else {
        return false;
    };
    match habit.habit_type {
        HabitType::YesNo => log.completed == Some(true),
        HabitType::Numeric => matches!(
            (habit.number_of_times, log.number_of_times),
            (Some(target), Some(value)) if value >= target
        ),
        HabitType::Duration => matches!(
            (habit.duration, log.duration),
            (Some(target), Some(value)) if value >= target
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn habit(habit_type: HabitType, target: Option<u32>) -> HabitData {
        let mut draft = HabitDraft::new("h", habit_type);
        draft.number_of_times = target;
        draft.duration = target;
        HabitData {
            id: Some(1),
            title: draft.title,
            description: None,
            category: None,
            habit_type,
            frequency: HabitFrequency::Daily,
            scheduled_days: vec![],
            number_of_times: draft.number_of_times,
            duration: draft.duration,
            user_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn log(date: NaiveDate, completed: Option<bool>, value: Option<u32>) -> HabitLog {
        HabitLog {
            id: Some(9),
            habit_id: Some(1),
            date: Some(date),
            created_at: None,
            completed,
            number_of_times: value,
            duration: value,
        }
    }

    #[test]
    fn yes_no_status() {
        let h = habit(HabitType::YesNo, None);
        assert_eq!(day_status(&h, &[log(day(2), Some(true), None)], day(2)), DayStatus::Complete);
        assert_eq!(day_status(&h, &[log(day(2), Some(false), None)], day(2)), DayStatus::Unlogged);
        assert_eq!(day_status(&h, &[log(day(2), Some(true), None)], day(3)), DayStatus::Unlogged);
        assert_eq!(day_status(&h, &[], day(2)), DayStatus::Unlogged);
    }

    #[test]
    fn numeric_and_duration_status() {
        for kind in [HabitType::Numeric, HabitType::Duration] {
            let h = habit(kind, Some(10));
            assert_eq!(day_status(&h, &[log(day(5), None, Some(10))], day(5)), DayStatus::Complete);
            assert_eq!(day_status(&h, &[log(day(5), None, Some(12))], day(5)), DayStatus::Complete);
            assert_eq!(day_status(&h, &[log(day(5), None, Some(3))], day(5)), DayStatus::Partial);
            assert_eq!(day_status(&h, &[log(day(5), None, Some(0))], day(5)), DayStatus::Unlogged);
            assert_eq!(day_status(&h, &[log(day(5), None, None)], day(5)), DayStatus::Unlogged);
        }
    }

    #[test]
    fn zero_or_missing_target_never_completes_status() {
        let zero = habit(HabitType::Numeric, Some(0));
        assert_eq!(day_status(&zero, &[log(day(5), None, Some(4))], day(5)), DayStatus::Unlogged);
        assert!(is_goal_met(&zero, &[log(day(5), None, Some(4))], day(5)));

        let missing = habit(HabitType::Duration, None);
        assert_eq!(day_status(&missing, &[log(day(5), None, Some(4))], day(5)), DayStatus::Unlogged);
        assert!(!is_goal_met(&missing, &[log(day(5), None, Some(4))], day(5)));
    }

    #[test]
    fn log_day_falls_back_to_created_at() {
        let l: HabitLog = serde_json::from_value(json!({
            "id": 1, "habitId": 2, "createdAt": "2025-01-07T08:30:00", "numberOfTimes": 3
        }))
        .unwrap();
        assert_eq!(l.day(), Some(day(7)));
        assert_eq!(l.value(LogField::NumberOfTimes), Some(3));

        let plain: HabitLog = serde_json::from_value(json!({ "createdAt": "2025-01-08" })).unwrap();
        assert_eq!(plain.day(), Some(day(8)));
    }

    #[test]
    fn payload_only_sends_target_for_matching_type() {
        let mut draft = HabitDraft::new("Read", HabitType::Numeric);
        draft.number_of_times = Some(20);
        draft.duration = Some(30);
        draft.description = Some(String::new());
        draft.scheduled_days = vec![DayOfWeek::Monday];
        let body = serde_json::to_value(draft.payload()).unwrap();
        assert_eq!(
            body,
            json!({
                "title": "Read",
                "habitType": "NUMERIC",
                "frequency": "DAILY",
                "scheduledDays": ["MONDAY"],
                "numberOfTimes": 20
            })
        );
    }

    #[test]
    fn scheduled_days_gate_the_calendar() {
        let mut h = habit(HabitType::YesNo, None);
        assert!(h.is_scheduled_on(day(6)));
        h.scheduled_days = vec![DayOfWeek::Monday];
        // 2025-01-06 is a Monday.
        assert!(h.is_scheduled_on(day(6)));
        assert!(!h.is_scheduled_on(day(7)));
    }
}
