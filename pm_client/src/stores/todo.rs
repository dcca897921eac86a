use std::sync::Arc;

use tokio::sync::watch;

use super::{error_message, Reactive};
use crate::error::ClientResult;
use crate::models::{Todo, TodoFilter, TodoGroup, TodoId, TodosView};
use crate::services::TodoService;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TodoState {
    pub todos: TodosView,
    pub is_loading: bool,
    pub error: Option<String>,
    pub filter: TodoFilter,
}

impl TodoState {
    pub fn filtered_todos(&self) -> Vec<Todo> {
        self.todos
            .iter()
            .filter(|t| self.filter.matches(t))
            .cloned()
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.todos.iter().filter(|t| !t.completed).count()
    }

    pub fn completed_count(&self) -> usize {
        self.todos.iter().filter(|t| t.completed).count()
    }
}

#[derive(Clone)]
pub struct TodoStore {
    service: TodoService,
    state: Arc<Reactive<TodoState>>,
}

impl TodoStore {
    pub fn new(service: TodoService) -> Self {
        Self {
            service,
            state: Arc::new(Reactive::new(TodoState::default())),
        }
    }

    pub fn state(&self) -> TodoState {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<TodoState> {
        self.state.subscribe()
    }

    pub fn filtered_todos(&self) -> Vec<Todo> {
        self.state.read(TodoState::filtered_todos)
    }

    pub fn active_count(&self) -> usize {
        self.state.read(TodoState::active_count)
    }

    pub fn completed_count(&self) -> usize {
        self.state.read(TodoState::completed_count)
    }

    pub fn set_filter(&self, filter: TodoFilter) {
        self.state.update(|s| s.filter = filter);
    }

    /// Replaces the cache with the server's list. Failures land in `error`.
    pub async fn fetch_todos(&self) {
        self.state.update(|s| {
            s.is_loading = true;
            s.error = None;
        });

        let result = self.service.get_todos().await;
        self.state.update(|s| {
            match result {
                Ok(view) => {
                    log::debug!("Todos retrieved: {}", view.len());
                    s.todos = view;
                }
                Err(e) => {
                    log::error!("Error fetching todos: {}", e);
                    s.error = Some(error_message(&e, "Failed to fetch todos"));
                }
            }
            s.is_loading = false;
        });
    }

    /// Creates the todo, then reloads the list.
    pub async fn add_todo(&self, todo: &Todo, group_id: Option<i64>) -> ClientResult<()> {
        self.state.update(|s| {
            s.is_loading = true;
            s.error = None;
        });

        let result = self.service.add_todo(todo, group_id).await;
        match result {
            Ok(()) => {
                self.fetch_todos().await;
                self.state.update(|s| s.is_loading = false);
                Ok(())
            }
            Err(e) => {
                log::error!("Error creating todo: {}", e);
                self.state.update(|s| {
                    s.error = Some(error_message(&e, "Failed to create todo"));
                    s.is_loading = false;
                });
                Err(e)
            }
        }
    }

    /// Optimistic update: the cache changes first and is restored if the
    /// server rejects the change. The todo keeps its current group.
    pub async fn update_todo(&self, todo: Todo) -> ClientResult<()> {
        let (previous, group_id) = {
            let mut previous = None;
            let mut group_id = None;
            self.state.update(|s| {
                s.error = None;
                if let Some(id) = todo.id {
                    group_id = s.todos.group_of(id);
                }
                previous = s.todos.replace(todo.clone());
            });
            (previous, group_id)
        };

        match self.service.update_todo(&todo, group_id).await {
            Ok(()) => {
                log::debug!("Todo updated: {:?}", todo.id);
                Ok(())
            }
            Err(e) => {
                log::error!("Error updating todo: {}", e);
                self.state.update(|s| {
                    s.error = Some(error_message(&e, "Failed to update todo"));
                    if let Some(previous) = previous {
                        s.todos.replace(previous);
                    }
                });
                Err(e)
            }
        }
    }

    /// Optimistic delete with rollback of the whole list on failure.
    pub async fn delete_todo(&self, id: TodoId) -> ClientResult<()> {
        let mut previous = TodosView::default();
        self.state.update(|s| {
            s.error = None;
            previous = s.todos.clone();
            s.todos.remove(id);
        });

        match self.service.delete_todo(id).await {
            Ok(()) => {
                log::debug!("Todo deleted: {}", id);
                Ok(())
            }
            Err(e) => {
                log::error!("Error deleting todo: {}", e);
                self.state.update(|s| {
                    s.error = Some(error_message(&e, "Failed to delete todo"));
                    s.todos = previous;
                });
                Err(e)
            }
        }
    }

    pub async fn toggle_completion(&self, todo: &Todo) -> ClientResult<()> {
        let mut updated = todo.clone();
        updated.completed = !todo.completed;
        self.update_todo(updated).await
    }

    pub async fn create_group(&self, title: &str, description: &str) -> ClientResult<TodoGroup> {
        let group = self
            .record(self.service.create_group(title, description).await, "Failed to create group")?;
        self.fetch_todos().await;
        Ok(group)
    }

    pub async fn delete_group(&self, group_id: i64) -> ClientResult<()> {
        self.record(self.service.delete_group(group_id).await, "Failed to delete group")?;
        self.fetch_todos().await;
        Ok(())
    }

    pub async fn move_todo_to_group(&self, todo: &Todo, group_id: Option<i64>) -> ClientResult<()> {
        self.record(
            self.service.move_todo_to_group(todo, group_id).await,
            "Failed to move todo",
        )?;
        self.fetch_todos().await;
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
