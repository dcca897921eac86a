use std::sync::Arc;

use crate::error::{ClientError, ClientResult};
use crate::models::{HabitData, HabitDraft, HabitLog, HabitLogEntry};
use crate::retrieve::ApiClient;

const API_URL: &str = "/api/habits";

#[derive(Clone)]
pub struct HabitsService {
    client: Arc<ApiClient>,
}

impl HabitsService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub async fn get_habits(&self) -> ClientResult<Vec<HabitData>> {
        log::debug!("Fetching habits from {}", API_URL);
        self.client.get(API_URL, &[]).await
    }

    pub async fn get_habit(&self, id: i64) -> ClientResult<HabitData> {
        self.client.get(&format!("{}/{}", API_URL, id), &[]).await
    }

    pub async fn create_habit(&self, draft: &HabitDraft) -> ClientResult<HabitData> {
        log::debug!("Creating habit: {}", draft.title);
        self.client.post(API_URL, &[], &draft.payload()).await
    }

    pub async fn update_habit(&self, id: i64, draft: &HabitDraft) -> ClientResult<HabitData> {
        self.client
            .put(&format!("{}/{}", API_URL, id), &draft.payload())
            .await
    }

    pub async fn delete_habit(&self, id: i64) -> ClientResult<()> {
        log::debug!("Deleting habit {}", id);
        self.client.delete(&format!("{}/{}", API_URL, id)).await
    }

    pub async fn get_habit_logs(&self, habit_id: i64) -> ClientResult<Vec<HabitLog>> {
        self.client
            .get(&format!("{}/{}/logs", API_URL, habit_id), &[])
            .await
    }

    pub async fn create_habit_log(&self, habit_id: i64, entry: &HabitLogEntry) -> ClientResult<HabitLog> {
        self.client
            .post(&format!("{}/{}/logs", API_URL, habit_id), &[], entry)
            .await
    }

    pub async fn update_habit_log(
        &self,
        habit_id: i64,
        log: &HabitLog,
        entry: &HabitLogEntry,
    ) -> ClientResult<HabitLog> {
        let log_id = log.id.ok_or(ClientError::MissingField("habit log id"))?;
        self.client
            .put(&format!("{}/{}/logs/{}", API_URL, habit_id, log_id), entry)
            .await
    }

    pub async fn delete_habit_log(&self, habit_id: i64, log_id: i64) -> ClientResult<()> {
        log::debug!("Deleting log {} for habit {}", log_id, habit_id);
        self.client
            .delete(&format!("{}/{}/logs/{}", API_URL, habit_id, log_id))
            .await
    }
}
