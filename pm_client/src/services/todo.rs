use std::sync::Arc;

use serde::Serialize;

use crate::error::{ClientError, ClientResult};
use crate::models::{Todo, TodoGroup, TodoId, TodoPayload, TodosView};
use crate::retrieve::ApiClient;

const API_URL: &str = "/api/todos";
const GROUP_API_URL: &str = "/api/todo-groups";

#[derive(Serialize)]
struct NewGroup<'a> {
    title: &'a str,
    description: &'a str,
}

#[derive(Clone)]
pub struct TodoService {
    client: Arc<ApiClient>,
}

impl TodoService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub async fn get_todos(&self) -> ClientResult<TodosView> {
        log::debug!("Fetching todos from {}", API_URL);
        self.client.get(API_URL, &[]).await
    }

    /// Creates `todo`, optionally inside `group_id`. Any id on `todo` is not sent.
    pub async fn add_todo(&self, todo: &Todo, group_id: Option<i64>) -> ClientResult<()> {
        let mut payload = TodoPayload::new(todo, group_id);
        payload.id = None;
        log::debug!("Adding todo: {}", todo.title);
        self.client.post_unit(API_URL, &[], &payload).await
    }

    pub async fn update_todo(&self, todo: &Todo, group_id: Option<i64>) -> ClientResult<()> {
        let id = todo.id.ok_or(ClientError::MissingField("todo id"))?;
        let payload = TodoPayload::new(todo, group_id);
        self.client
            .put_unit(&format!("{}/{}", API_URL, id), &payload)
            .await
    }

    pub async fn delete_todo(&self, id: TodoId) -> ClientResult<()> {
        self.client.delete(&format!("{}/{}", API_URL, id)).await
    }

    pub async fn create_group(&self, title: &str, description: &str) -> ClientResult<TodoGroup> {
        self.client
            .post(GROUP_API_URL, &[], &NewGroup { title, description })
            .await
    }

    pub async fn delete_group(&self, group_id: i64) -> ClientResult<()> {
        self.client
            .delete(&format!("{}/{}", GROUP_API_URL, group_id))
            .await
    }

    /// Moves `todo` into `group_id`, or out of any group with `None`.
    pub async fn move_todo_to_group(&self, todo: &Todo, group_id: Option<i64>) -> ClientResult<()> {
        self.update_todo(todo, group_id).await
    }
}
