use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::null_as_default;

pub type TodoId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TodoId>,
    pub title: String,
    #[serde(rename = "enhancedTitle", default)]
    pub enhanced_title: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed: bool,
    #[serde(default)]
    pub assigned_to: Option<String>,
}

impl Todo {
    /// A new, not yet persisted todo.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            enhanced_title: None,
            due_date: None,
            completed: false,
            assigned_to: None,
        }
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn assigned_to(mut self, owner: impl Into<String>) -> Self {
        self.assigned_to = Some(owner.into());
        self
    }
}

/// Body sent on todo create/update/move.
#[derive(Debug, Serialize)]
pub struct TodoPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<TodoId>,
    pub title: &'a str,
    #[serde(rename = "enhancedTitle")]
    pub enhanced_title: Option<&'a str>,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub assigned_to: Option<&'a str>,
    #[serde(rename = "todoGroupId")]
    pub todo_group_id: Option<i64>,
}

impl<'a> TodoPayload<'a> {
    pub fn new(todo: &'a Todo, todo_group_id: Option<i64>) -> Self {
        Self {
            id: todo.id,
            title: &todo.title,
            enhanced_title: todo.enhanced_title.as_deref().filter(|t| !t.is_empty()),
            due_date: todo.due_date,
            completed: todo.completed,
            assigned_to: todo.assigned_to.as_deref(),
            todo_group_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoGroup {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub todos: Vec<Todo>,
}

/// The `/api/todos` listing: loose todos plus todos organised in groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TodosView {
    #[serde(rename = "ungroupedTodos", default, deserialize_with = "null_as_default")]
    pub ungrouped_todos: Vec<Todo>,
    #[serde(rename = "groupedTodos", default, deserialize_with = "null_as_default")]
    pub grouped_todos: Vec<TodoGroup>,
}

impl TodosView {
    /// Every todo, ungrouped first, then group by group.
    pub fn iter(&self) -> impl Iterator<Item = &Todo> {
        self.ungrouped_todos
            .iter()
            .chain(self.grouped_todos.iter().flat_map(|g| g.todos.iter()))
    }

    pub fn find(&self, id: TodoId) -> Option<&Todo> {
        self.iter().find(|t| t.id == Some(id))
    }

    /// Group holding `id`, `None` when the todo is ungrouped or unknown.
    pub fn group_of(&self, id: TodoId) -> Option<i64> {
        self.grouped_todos
            .iter()
            .find(|g| g.todos.iter().any(|t| t.id == Some(id)))
            .map(|g| g.id)
    }

    /// Replaces the todo with the same id in place and returns the old value.
    pub fn replace(&mut self, todo: Todo) -> Option<Todo> {
        let id = todo.id?;
        let slot = self
            .ungrouped_todos
            .iter_mut()
            .chain(self.grouped_todos.iter_mut().flat_map(|g| g.todos.iter_mut()))
            .find(|t| t.id == Some(id))?;
        Some(std::mem::replace(slot, todo))
    }

    /// Removes the todo with `id` wherever it lives. Returns whether one was removed.
    pub fn remove(&mut self, id: TodoId) -> bool {
        let before = self.len();
        self.ungrouped_todos.retain(|t| t.id != Some(id));
        for group in &mut self.grouped_todos {
            group.todos.retain(|t| t.id != Some(id));
        }
        self.len() != before
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TodoFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl TodoFilter {
    pub fn matches(self, todo: &Todo) -> bool {
        match self {
            TodoFilter::All => true,
            TodoFilter::Active => !todo.completed,
            TodoFilter::Completed => todo.completed,
        }
    }
}

impl FromStr for TodoFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(TodoFilter::All),
            "active" => Ok(TodoFilter::Active),
            "completed" => Ok(TodoFilter::Completed),
            other => Err(format!("unknown todo filter: {}", other)),
        }
    }
}

impl fmt::Display for TodoFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TodoFilter::All => "all",
            TodoFilter::Active => "active",
            TodoFilter::Completed => "completed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_view() -> TodosView {
        serde_json::from_value(json!({
            "ungroupedTodos": [
                { "id": 1, "title": "Buy milk", "due_date": "2025-03-01", "completed": false, "assigned_to": null }
            ],
            "groupedTodos": [
                { "id": 10, "title": "House", "description": "chores", "todos": [
                    { "id": 2, "title": "Fix door", "completed": true, "enhancedTitle": "Repair the front door" }
                ]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn decodes_listing_with_mixed_field_names() {
        let view = sample_view();
        assert_eq!(view.len(), 2);
        let first = view.find(1).unwrap();
        assert_eq!(first.due_date, NaiveDate::from_ymd_opt(2025, 3, 1));
        let grouped = view.find(2).unwrap();
        assert_eq!(grouped.enhanced_title.as_deref(), Some("Repair the front door"));
        assert_eq!(view.group_of(2), Some(10));
        assert_eq!(view.group_of(1), None);
    }

    #[test]
    fn null_completed_reads_as_false() {
        let todo: Todo = serde_json::from_value(json!({ "id": 3, "title": "x", "completed": null })).unwrap();
        assert!(!todo.completed);
    }

    #[test]
    fn replace_and_remove_reach_grouped_todos() {
        let mut view = sample_view();
        let mut updated = view.find(2).unwrap().clone();
        updated.completed = false;
        let previous = view.replace(updated).unwrap();
        assert!(previous.completed);
        assert!(!view.find(2).unwrap().completed);

        assert!(view.remove(2));
        assert!(view.find(2).is_none());
        assert!(!view.remove(2));
    }

    #[test]
    fn payload_drops_empty_enhanced_title_and_carries_group() {
        let mut todo = Todo::new("Walk");
        todo.enhanced_title = Some(String::new());
        let payload = serde_json::to_value(TodoPayload::new(&todo, Some(4))).unwrap();
        assert_eq!(
            payload,
            json!({
                "title": "Walk",
                "enhancedTitle": null,
                "due_date": null,
                "completed": false,
                "assigned_to": null,
                "todoGroupId": 4
            })
        );
    }
}
