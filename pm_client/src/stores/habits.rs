use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::watch;

use super::{error_message, Reactive};
use crate::error::ClientResult;
use crate::models::{
    day_status, is_goal_met, DayStatus, HabitData, HabitDraft, HabitLog, HabitLogEntry, LogField,
};
use crate::services::HabitsService;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HabitState {
    pub habits: Vec<HabitData>,
    /// Logs per habit id, filled by `fetch_habit_logs`.
    pub logs: HashMap<i64, Vec<HabitLog>>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl HabitState {
    pub fn habit(&self, habit_id: i64) -> Option<&HabitData> {
        self.habits.iter().find(|h| h.id == Some(habit_id))
    }

    fn logs_of(&self, habit_id: i64) -> &[HabitLog] {
        self.logs.get(&habit_id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn log_on(&self, habit_id: i64, day: NaiveDate) -> Option<&HabitLog> {
        self.logs_of(habit_id).iter().find(|l| l.day() == Some(day))
    }

    pub fn log_count(&self, habit_id: i64) -> usize {
        self.logs_of(habit_id).len()
    }

    /// Whether any log exists for `day`, regardless of its value.
    pub fn is_logged_on(&self, habit_id: i64, day: NaiveDate) -> bool {
        self.log_on(habit_id, day).is_some()
    }

    pub fn is_goal_met_on(&self, habit_id: i64, day: NaiveDate) -> bool {
        self.habit(habit_id)
            .map(|h| is_goal_met(h, self.logs_of(habit_id), day))
            .unwrap_or(false)
    }

    pub fn log_value_on(&self, habit_id: i64, day: NaiveDate, field: LogField) -> Option<u32> {
        self.log_on(habit_id, day).and_then(|l| l.value(field))
    }

    /// Unknown habits read as unlogged.
    pub fn date_status(&self, habit_id: i64, day: NaiveDate) -> DayStatus {
        self.habit(habit_id)
            .map(|h| day_status(h, self.logs_of(habit_id), day))
            .unwrap_or(DayStatus::Unlogged)
    }
}

#[derive(Clone)]
pub struct HabitStore {
    service: HabitsService,
    state: Arc<Reactive<HabitState>>,
}

impl HabitStore {
    pub fn new(service: HabitsService) -> Self {
        Self {
            service,
            state: Arc::new(Reactive::new(HabitState::default())),
        }
    }

    pub fn state(&self) -> HabitState {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<HabitState> {
        self.state.subscribe()
    }

    pub fn log_count(&self, habit_id: i64) -> usize {
        self.state.read(|s| s.log_count(habit_id))
    }

    pub fn is_logged_on(&self, habit_id: i64, day: NaiveDate) -> bool {
        self.state.read(|s| s.is_logged_on(habit_id, day))
    }

    pub fn is_goal_met_on(&self, habit_id: i64, day: NaiveDate) -> bool {
        self.state.read(|s| s.is_goal_met_on(habit_id, day))
    }

    pub fn log_value_on(&self, habit_id: i64, day: NaiveDate, field: LogField) -> Option<u32> {
        self.state.read(|s| s.log_value_on(habit_id, day, field))
    }

    pub fn date_status(&self, habit_id: i64, day: NaiveDate) -> DayStatus {
        self.state.read(|s| s.date_status(habit_id, day))
    }

    pub async fn fetch_habits(&self) {
        self.state.update(|s| {
            s.is_loading = true;
            s.error = None;
        });
        let result = self.service.get_habits().await;
        self.state.update(|s| {
            match result {
                Ok(habits) => s.habits = habits,
                Err(e) => {
                    log::error!("Error fetching habits: {}", e);
                    s.error = Some(error_message(&e, "Failed to fetch habits"));
                }
            }
            s.is_loading = false;
        });
    }

    pub async fn add_habit(&self, draft: &HabitDraft) -> ClientResult<HabitData> {
        self.state.update(|s| s.error = None);
        let created = self.record(self.service.create_habit(draft).await, "Failed to create habit")?;
        log::info!("Habit created: {}", created.title);
        self.fetch_habits().await;
        Ok(created)
    }

    /// Optimistic update with rollback.
    pub async fn update_habit(&self, habit_id: i64, draft: &HabitDraft) -> ClientResult<HabitData> {
        let mut previous = None;
        self.state.update(|s| {
            s.error = None;
            if let Some(habit) = s.habits.iter_mut().find(|h| h.id == Some(habit_id)) {
                previous = Some(habit.clone());
                apply_draft(habit, draft);
            }
        });

        match self.service.update_habit(habit_id, draft).await {
            Ok(updated) => {
                self.state.update(|s| {
                    if let Some(habit) = s.habits.iter_mut().find(|h| h.id == Some(habit_id)) {
                        *habit = updated.clone();
                    }
                });
                Ok(updated)
            }
            Err(e) => {
                log::error!("Error updating habit: {}", e);
                self.state.update(|s| {
                    s.error = Some(error_message(&e, "Failed to update habit"));
                    if let Some(previous) = previous {
                        if let Some(habit) = s.habits.iter_mut().find(|h| h.id == Some(habit_id)) {
                            *habit = previous;
                        }
                    }
                });
                Err(e)
            }
        }
    }

    /// Optimistic delete with rollback; the habit's cached logs go with it.
    pub async fn delete_habit(&self, habit_id: i64) -> ClientResult<()> {
        let mut previous = (Vec::new(), None);
        self.state.update(|s| {
            s.error = None;
            previous = (s.habits.clone(), s.logs.remove(&habit_id));
            s.habits.retain(|h| h.id != Some(habit_id));
        });

        match self.service.delete_habit(habit_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                log::error!("Error deleting habit: {}", e);
                let (habits, logs) = previous;
                self.state.update(|s| {
                    s.error = Some(error_message(&e, "Failed to delete habit"));
                    s.habits = habits;
                    if let Some(logs) = logs {
                        s.logs.insert(habit_id, logs);
                    }
                });
                Err(e)
            }
        }
    }

    pub async fn fetch_habit_logs(&self, habit_id: i64) {
        let result = self.service.get_habit_logs(habit_id).await;
        self.state.update(|s| match result {
            Ok(logs) => {
                s.logs.insert(habit_id, logs);
            }
            Err(e) => {
                log::error!("Error fetching logs for habit {}: {}", habit_id, e);
                s.error = Some(error_message(&e, "Failed to fetch habit logs"));
            }
        });
    }

    pub async fn add_habit_log(&self, habit_id: i64, entry: &HabitLogEntry) -> ClientResult<HabitLog> {
        self.state.update(|s| s.error = None);
        let log = self.record(
            self.service.create_habit_log(habit_id, entry).await,
            "Failed to add habit log",
        )?;
        log::debug!("Habit log added for habit {} on {}", habit_id, entry.date);
        self.state
            .update(|s| s.logs.entry(habit_id).or_default().push(log.clone()));
        Ok(log)
    }

    pub async fn update_habit_log(
        &self,
        habit_id: i64,
        log: &HabitLog,
        entry: &HabitLogEntry,
    ) -> ClientResult<HabitLog> {
        self.state.update(|s| s.error = None);
        let updated = self.record(
            self.service.update_habit_log(habit_id, log, entry).await,
            "Failed to update habit log",
        )?;
        self.state.update(|s| {
            let logs = s.logs.entry(habit_id).or_default();
            match logs.iter_mut().find(|l| l.id.is_some() && l.id == updated.id) {
                Some(slot) => *slot = updated.clone(),
                None => logs.push(updated.clone()),
            }
        });
        Ok(updated)
    }

    pub async fn delete_habit_log(&self, habit_id: i64, log_id: i64) -> ClientResult<()> {
        self.state.update(|s| s.error = None);
        self.record(
            self.service.delete_habit_log(habit_id, log_id).await,
            "Failed to delete habit log",
        )?;
        self.state.update(|s| {
            if let Some(logs) = s.logs.get_mut(&habit_id) {
                logs.retain(|l| l.id != Some(log_id));
            }
        });
        Ok(())
    }

    fn record<T>(&self, result: ClientResult<T>, fallback: &str) -> ClientResult<T> {
        if let Err(e) = &result {
            log::error!("{}: {}", fallback, e);
            let msg = error_message(e, fallback);
            self.state.update(|s| s.error = Some(msg));
        }
        result
    }
}

fn apply_draft(habit: &mut HabitData, draft: &HabitDraft) {
    habit.title = draft.title.clone();
    habit.description = draft.description.clone();
    habit.category = draft.category.clone();
    habit.habit_type = draft.habit_type;
    habit.frequency = draft.frequency;
    habit.scheduled_days = draft.scheduled_days.clone();
    habit.number_of_times = draft.number_of_times;
    habit.duration = draft.duration;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HabitType;
    use serde_json::json;

    fn state() -> HabitState {
        let habits: Vec<HabitData> = serde_json::from_value(json!([
            { "id": 1, "title": "Run", "habitType": "YES_NO", "frequency": "DAILY", "scheduledDays": [] },
            { "id": 2, "title": "Read", "habitType": "NUMERIC", "frequency": "DAILY", "scheduledDays": [], "numberOfTimes": 20 }
        ]))
        .unwrap();
        let logs: Vec<HabitLog> = serde_json::from_value(json!([
            { "id": 10, "habitId": 2, "date": "2025-03-01", "numberOfTimes": 5 },
            { "id": 11, "habitId": 2, "createdAt": "2025-03-02T21:00:00", "numberOfTimes": 20 }
        ]))
        .unwrap();
        let mut state = HabitState {
            habits,
            ..Default::default()
        };
        state.logs.insert(2, logs);
        state
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn derived_helpers_read_the_log_cache() {
        let s = state();
        assert_eq!(s.log_count(2), 2);
        assert_eq!(s.log_count(1), 0);
        assert!(s.is_logged_on(2, day(1)));
        assert!(!s.is_goal_met_on(2, day(1)));
        assert!(s.is_goal_met_on(2, day(2)));
        assert_eq!(s.log_value_on(2, day(2), LogField::NumberOfTimes), Some(20));
        assert_eq!(s.log_value_on(2, day(2), LogField::Duration), None);
        assert_eq!(s.date_status(2, day(1)), DayStatus::Partial);
        assert_eq!(s.date_status(2, day(2)), DayStatus::Complete);
        assert_eq!(s.date_status(2, day(3)), DayStatus::Unlogged);
        assert_eq!(s.date_status(99, day(1)), DayStatus::Unlogged);
    }

    #[test]
    fn apply_draft_overwrites_editable_fields() {
        let mut s = state();
        let mut draft = HabitDraft::from(&s.habits[0]);
        draft.title = "Jog".into();
        draft.habit_type = HabitType::Duration;
        draft.duration = Some(30);
        apply_draft(&mut s.habits[0], &draft);
        assert_eq!(s.habits[0].title, "Jog");
        assert_eq!(s.habits[0].target(), Some(30));
        assert_eq!(s.habits[0].id, Some(1));
    }
}
