//! # Services and Stores Integration Tests
//!
//! Drives the stores through the real services against the mock backend and
//! checks both sides: what went over the wire and what the store holds
//! afterwards, including rollback of optimistic changes.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;

use pm_client::error::ClientError;
use pm_client::models::{
    DayStatus, GrantWalletPermissionRequest, HabitDraft, HabitLogEntry, HabitType, Todo,
    TodoFilter, TransactionQuery, WalletRole,
};
use pm_client::services::Services;
use pm_client::stores::{AccountingStore, HabitStore, TodoStore};
use project_tests::{MockServer, StaticToken};

fn services(server: &MockServer) -> Services {
    Services::new(server.api_client(Arc::new(StaticToken::new("tok"))))
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn todos_view() -> serde_json::Value {
    json!({
        "ungroupedTodos": [
            { "id": 1, "title": "Buy milk", "completed": false, "due_date": "2026-10-20" },
            { "id": 2, "title": "Call bank", "completed": true }
        ],
        "groupedTodos": [
            {
                "id": 7,
                "title": "House",
                "description": "chores",
                "todos": [ { "id": 3, "title": "Fix sink", "completed": null } ]
            }
        ]
    })
}

#[tokio::test]
async fn todo_fetch_and_filters() {
    let server = MockServer::start().await;
    server.respond_json("GET", "/api/todos", todos_view());
    let store = TodoStore::new(services(&server).todos);

    store.fetch_todos().await;
    let state = store.state();
    assert_eq!(state.error, None);
    assert!(!state.is_loading);
    assert_eq!(state.todos.len(), 3);
    assert_eq!(store.active_count(), 2);
    assert_eq!(store.completed_count(), 1);

    store.set_filter(TodoFilter::Active);
    let titles: Vec<_> = store.filtered_todos().into_iter().map(|t| t.title).collect();
    assert_eq!(titles, vec!["Buy milk", "Fix sink"]);
}

#[tokio::test]
async fn fetch_failure_is_recorded_not_raised() {
    let server = MockServer::start().await;
    server.respond("GET", "/api/todos", 500, "boom");
    let store = TodoStore::new(services(&server).todos);

    store.fetch_todos().await;
    let state = store.state();
    assert!(state.todos.is_empty());
    assert!(state.error.unwrap().contains("500"));
    assert!(!state.is_loading);
}

#[tokio::test]
async fn add_todo_posts_without_id_and_refetches() {
    let server = MockServer::start().await;
    server.respond_json("GET", "/api/todos", todos_view());
    server.respond("POST", "/api/todos", 201, "");
    let store = TodoStore::new(services(&server).todos);

    let mut todo = Todo::new("Water plants").with_due_date(date("2026-11-01"));
    todo.id = Some(99);
    store.add_todo(&todo, Some(7)).await.unwrap();

    let post = server.requests_to("POST", "/api/todos").remove(0);
    let body = post.json();
    assert_eq!(body.get("id"), None);
    assert_eq!(body["title"], json!("Water plants"));
    assert_eq!(body["due_date"], json!("2026-11-01"));
    assert_eq!(body["todoGroupId"], json!(7));
    assert_eq!(server.requests_to("GET", "/api/todos").len(), 1);
    assert_eq!(store.state().todos.len(), 3);
}

#[tokio::test]
async fn optimistic_update_rolls_back_on_failure() {
    let server = MockServer::start().await;
    server.respond_json("GET", "/api/todos", todos_view());
    server.respond("PUT", "/api/todos/3", 500, "nope");
    let store = TodoStore::new(services(&server).todos);
    store.fetch_todos().await;
    let before = store.state().todos;

    let sink = before.find(3).cloned().unwrap();
    let mut rx = store.subscribe();
    let err = store.toggle_completion(&sink).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(rx.has_changed().unwrap());

    // The update went out with the todo's group.
    let put = server.requests_to("PUT", "/api/todos/3").remove(0);
    assert_eq!(put.json()["completed"], json!(true));
    assert_eq!(put.json()["todoGroupId"], json!(7));

    let after = store.state();
    assert_eq!(after.todos, before);
    assert!(after.error.is_some());

    server.respond("PUT", "/api/todos/3", 200, "");
    store.toggle_completion(&sink).await.unwrap();
    assert!(store.state().todos.find(3).unwrap().completed);
    assert_eq!(store.state().error, None);
}

#[tokio::test]
async fn optimistic_delete_rolls_back_on_failure() {
    let server = MockServer::start().await;
    server.respond_json("GET", "/api/todos", todos_view());
    server.respond("DELETE", "/api/todos/1", 503, "");
    let store = TodoStore::new(services(&server).todos);
    store.fetch_todos().await;

    assert!(store.delete_todo(1).await.is_err());
    assert!(store.state().todos.find(1).is_some());

    server.respond("DELETE", "/api/todos/1", 200, "");
    store.delete_todo(1).await.unwrap();
    assert!(store.state().todos.find(1).is_none());
    assert_eq!(store.state().todos.len(), 2);
}

#[tokio::test]
async fn update_without_id_fails_locally() {
    let server = MockServer::start().await;
    let todos = services(&server).todos;
    let err = todos.update_todo(&Todo::new("draft"), None).await.unwrap_err();
    assert!(matches!(err, ClientError::MissingField("todo id")));
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn group_operations_refetch() {
    let server = MockServer::start().await;
    server.respond_json("GET", "/api/todos", todos_view());
    server.respond_json(
        "POST",
        "/api/todo-groups",
        json!({ "id": 8, "title": "Garden", "description": "outside", "todos": [] }),
    );
    server.respond("DELETE", "/api/todo-groups/7", 200, "");
    server.respond("PUT", "/api/todos/1", 200, "");
    let store = TodoStore::new(services(&server).todos);

    let group = store.create_group("Garden", "outside").await.unwrap();
    assert_eq!(group.id, 8);
    assert_eq!(
        server.requests_to("POST", "/api/todo-groups")[0].json(),
        json!({ "title": "Garden", "description": "outside" })
    );

    let milk = store.state().todos.find(1).cloned().unwrap();
    store.move_todo_to_group(&milk, Some(8)).await.unwrap();
    assert_eq!(server.requests_to("PUT", "/api/todos/1")[0].json()["todoGroupId"], json!(8));

    store.delete_group(7).await.unwrap();
    assert_eq!(server.requests_to("GET", "/api/todos").len(), 3);
}

#[tokio::test]
async fn habit_payloads_and_day_status() {
    let server = MockServer::start().await;
    server.respond_json(
        "GET",
        "/api/habits",
        json!([
            { "id": 1, "title": "Push-ups", "habitType": "NUMERIC", "frequency": "DAILY",
              "scheduledDays": [], "numberOfTimes": 20 },
            { "id": 2, "title": "Meditate", "habitType": "YES_NO", "frequency": null,
              "scheduledDays": null }
        ]),
    );
    server.respond_json(
        "GET",
        "/api/habits/1/logs",
        json!([
            { "id": 10, "habitId": 1, "date": "2026-10-17", "numberOfTimes": 20 },
            { "id": 11, "habitId": 1, "createdAt": "2026-10-18T07:30:00", "numberOfTimes": 5 }
        ]),
    );
    server.respond_json(
        "POST",
        "/api/habits",
        json!({ "id": 3, "title": "Read", "habitType": "DURATION", "duration": 30 }),
    );
    server.respond_json(
        "POST",
        "/api/habits/1/logs",
        json!({ "id": 12, "habitId": 1, "date": "2026-10-19", "numberOfTimes": 25 }),
    );

    let store = HabitStore::new(services(&server).habits);
    store.fetch_habits().await;
    store.fetch_habit_logs(1).await;

    assert_eq!(store.log_count(1), 2);
    assert_eq!(store.date_status(1, date("2026-10-17")), DayStatus::Complete);
    assert_eq!(store.date_status(1, date("2026-10-18")), DayStatus::Partial);
    assert_eq!(store.date_status(1, date("2026-10-19")), DayStatus::Unlogged);
    assert!(store.is_logged_on(1, date("2026-10-18")));
    assert!(!store.is_goal_met_on(1, date("2026-10-18")));

    store
        .add_habit_log(1, &HabitLogEntry::count(date("2026-10-19"), 25))
        .await
        .unwrap();
    assert_eq!(store.date_status(1, date("2026-10-19")), DayStatus::Complete);
    assert_eq!(
        server.requests_to("POST", "/api/habits/1/logs")[0].json(),
        json!({ "date": "2026-10-19", "numberOfTimes": 25 })
    );

    // Targets are only sent for the habit type that uses them.
    let mut draft = HabitDraft::new("Read", HabitType::Duration);
    draft.duration = Some(30);
    draft.number_of_times = Some(4);
    draft.description = Some(String::new());
    store.add_habit(&draft).await.unwrap();
    let body = server.requests_to("POST", "/api/habits")[0].json();
    assert_eq!(body["duration"], json!(30));
    assert_eq!(body.get("numberOfTimes"), None);
    assert_eq!(body.get("description"), None);
    assert_eq!(body["habitType"], json!("DURATION"));
}

#[tokio::test]
async fn habit_delete_rolls_back_with_its_logs() {
    let server = MockServer::start().await;
    server.respond_json(
        "GET",
        "/api/habits",
        json!([{ "id": 2, "title": "Meditate", "habitType": "YES_NO" }]),
    );
    server.respond_json(
        "GET",
        "/api/habits/2/logs",
        json!([{ "id": 20, "date": "2026-10-19", "completed": true }]),
    );
    server.respond("DELETE", "/api/habits/2", 500, "");

    let store = HabitStore::new(services(&server).habits);
    store.fetch_habits().await;
    store.fetch_habit_logs(2).await;

    assert!(store.delete_habit(2).await.is_err());
    let state = store.state();
    assert_eq!(state.habits.len(), 1);
    assert_eq!(state.log_count(2), 1);
    assert_eq!(store.date_status(2, date("2026-10-19")), DayStatus::Complete);
    assert!(state.error.is_some());
}

#[tokio::test]
async fn uncategorized_counter() {
    let server = MockServer::start().await;
    server.respond_json(
        "GET",
        "/api/transactions/to-categorize",
        json!({ "transactions": [], "page": 0, "totalPage": 1, "totalElements": 12 }),
    );
    let store = AccountingStore::new(services(&server).accounting);

    store.fetch_uncategorized_count(Some(3)).await;
    assert_eq!(store.uncategorized_count(), 12);
    let call = server.requests_to("GET", "/api/transactions/to-categorize").remove(0);
    assert_eq!(
        call.query_pairs(),
        vec![
            ("page".to_string(), "0".to_string()),
            ("size".to_string(), "100".to_string()),
            ("walletId".to_string(), "3".to_string()),
        ]
    );

    server.respond("GET", "/api/transactions/to-categorize", 500, "");
    store.fetch_uncategorized_count(None).await;
    assert_eq!(store.uncategorized_count(), 0);
    assert!(!store.state().is_loading);
}

#[tokio::test]
async fn accounting_summary_and_wallet_sharing() {
    let server = MockServer::start().await;
    server.respond_json(
        "GET",
        "/api/transactions/summary",
        json!({ "income": 3000.0, "expense": 1200.5, "saving": 1799.5 }),
    );
    server.respond_json(
        "POST",
        "/api/wallets/5/permissions",
        json!({ "id": 1, "walletId": 5, "walletName": "Joint", "userId": 9,
                "userEmail": "bob@example.com", "role": "WRITE", "createdAt": 1760000000000i64 }),
    );
    server.respond("PUT", "/api/transaction-categories/reorder", 200, "");
    let services = services(&server);

    let query = TransactionQuery::new().between(date("2026-10-01"), date("2026-10-31"));
    let summary = services
        .accounting
        .get_accounting_summary(query, Some(5))
        .await
        .unwrap();
    assert_eq!(summary.saving, 1799.5);
    assert_eq!(summary.balance, None);
    assert_eq!(
        server.requests_to("GET", "/api/transactions/summary")[0].query_pairs(),
        vec![
            ("startDate".to_string(), "2026-10-01".to_string()),
            ("endDate".to_string(), "2026-10-31".to_string()),
            ("walletId".to_string(), "5".to_string()),
        ]
    );

    let permission = services
        .wallets
        .grant_permission(5, &GrantWalletPermissionRequest { user_id: 9, role: WalletRole::Write })
        .await
        .unwrap();
    assert_eq!(permission.role, WalletRole::Write);
    assert_eq!(
        server.requests_to("POST", "/api/wallets/5/permissions")[0].json(),
        json!({ "userId": 9, "role": "WRITE" })
    );

    services.categories.reorder(&[3, 1, 2]).await.unwrap();
    assert_eq!(
        server.requests_to("PUT", "/api/transaction-categories/reorder")[0].json(),
        json!({ "categoryIds": [3, 1, 2] })
    );
}
