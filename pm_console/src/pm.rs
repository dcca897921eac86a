use anyhow::{bail, Context, Result};
use chrono::{Duration, Local, NaiveDate};
use clap::{Parser, Subcommand};

use pm_client::configs::ClientConfig;
use pm_client::loggers::setup_logging;
use pm_client::models::{DayStatus, HabitLogEntry, Todo, TodoFilter, TransactionQuery};
use pm_client::stores::{AccountingStore, HabitStore, ModulePreferences, TodoStore};

mod session;
use session::Session;

#[derive(Parser, Debug)]
#[command(name = "pm", about = "Personal Manager console", version)]
struct Cli {
    #[command(flatten)]
    config: ClientConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Todo list.
    Todos {
        #[command(subcommand)]
        action: TodoAction,
    },
    /// Habits and their logs.
    Habits {
        #[command(subcommand)]
        action: HabitAction,
    },
    /// Wallets shared with the signed-in user.
    Wallets {
        #[command(subcommand)]
        action: WalletAction,
    },
    /// Income, expense and saving over a period, with per-category spending.
    Summary {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        wallet: Option<i64>,
    },
    /// Number of transactions waiting for a category.
    Uncategorized {
        #[arg(long)]
        wallet: Option<i64>,
    },
    /// The signed-in user's profile.
    Me,
    /// Dashboard module visibility (local, no sign-in needed).
    Modules {
        #[command(subcommand)]
        action: ModuleAction,
    },
}

#[derive(Subcommand, Debug)]
enum TodoAction {
    List {
        #[arg(long, default_value = "all")]
        filter: TodoFilter,
    },
    Add {
        title: String,
        #[arg(long)]
        due: Option<NaiveDate>,
        #[arg(long)]
        group: Option<i64>,
    },
    Done {
        id: i64,
    },
    Rm {
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum HabitAction {
    List,
    /// Logs a habit for a day (today by default). `value` is the count or minutes.
    Log {
        habit: i64,
        #[arg(long)]
        value: Option<u32>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Day-by-day status over the last `days` days.
    Status {
        habit: i64,
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
}

#[derive(Subcommand, Debug)]
enum WalletAction {
    List,
}

#[derive(Subcommand, Debug)]
enum ModuleAction {
    List,
    Toggle { key: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = cli.config.resolve()?;
    setup_logging("pm", &config.log_dir(), config.log_level())?;

    if let Command::Modules { action } = &cli.command {
        return run_modules(&config, action);
    }

    let session = Session::sign_in(config).await?;
    match cli.command {
        Command::Todos { action } => run_todos(&session, action).await,
        Command::Habits { action } => run_habits(&session, action).await,
        Command::Wallets { action: WalletAction::List } => {
            for wallet in session.services.wallets.list_for_current_user().await? {
                println!(
                    "{:>5}  {:<24} {:>12}  owner {}",
                    wallet.id,
                    wallet.name,
                    wallet.balance.map(|b| format!("{:.2}", b)).unwrap_or_default(),
                    wallet.owner_email
                );
            }
            Ok(())
        }
        Command::Summary { from, to, wallet } => run_summary(&session, from, to, wallet).await,
        Command::Uncategorized { wallet } => {
            let store = AccountingStore::new(session.services.accounting.clone());
            store.fetch_uncategorized_count(wallet).await;
            println!("{} transactions to categorize", store.uncategorized_count());
            Ok(())
        }
        Command::Me => {
            let identity = session
                .services
                .users
                .get_user_identity()
                .await
                .context("could not load the user profile")?;
            println!("{}", serde_json::to_string_pretty(&identity)?);
            if let Some(uid) = session.user_id() {
                println!("identity provider uid: {}", uid);
            }
            Ok(())
        }
        Command::Modules { .. } => Ok(()),
    }
}

fn run_modules(config: &ClientConfig, action: &ModuleAction) -> Result<()> {
    let path = config
        .modules_path()
        .context("no data directory for module settings; set PM_MODULES_PATH")?;
    let prefs = ModulePreferences::load(path);
    match action {
        ModuleAction::List => {
            let settings = prefs.settings();
            for key in &settings.order {
                let mark = if settings.is_enabled(key) { "x" } else { " " };
                println!("[{}] {}", mark, key);
            }
        }
        ModuleAction::Toggle { key } => {
            let now = prefs.toggle(key)?;
            println!("{} is now {}", key, if now { "shown" } else { "hidden" });
        }
    }
    Ok(())
}

async fn run_todos(session: &Session, action: TodoAction) -> Result<()> {
    let store = TodoStore::new(session.services.todos.clone());
    match action {
        TodoAction::List { filter } => {
            store.fetch_todos().await;
            if let Some(err) = store.state().error {
                bail!("could not load todos: {}", err);
            }
            store.set_filter(filter);
            for todo in store.filtered_todos() {
                println!(
                    "{:>5} [{}] {}{}",
                    todo.id.map(|id| id.to_string()).unwrap_or_default(),
                    if todo.completed { "x" } else { " " },
                    todo.title,
                    todo.due_date.map(|d| format!("  (due {})", d)).unwrap_or_default()
                );
            }
            println!("{} active, {} completed", store.active_count(), store.completed_count());
        }
        TodoAction::Add { title, due, group } => {
            let mut todo = Todo::new(title);
            if let Some(due) = due {
                todo = todo.with_due_date(due);
            }
            store.add_todo(&todo, group).await?;
            println!("Added. {} todos now.", store.state().todos.len());
        }
        TodoAction::Done { id } => {
            store.fetch_todos().await;
            let todo = store
                .state()
                .todos
                .find(id)
                .cloned()
                .with_context(|| format!("no todo with id {}", id))?;
            store.toggle_completion(&todo).await?;
            println!("{} marked {}", id, if todo.completed { "open" } else { "done" });
        }
        TodoAction::Rm { id } => {
            store.fetch_todos().await;
            store.delete_todo(id).await?;
            println!("Deleted {}", id);
        }
    }
    Ok(())
}

async fn run_habits(session: &Session, action: HabitAction) -> Result<()> {
    let store = HabitStore::new(session.services.habits.clone());
    store.fetch_habits().await;
    if let Some(err) = store.state().error {
        bail!("could not load habits: {}", err);
    }
    let today = Local::now().date_naive();

    match action {
        HabitAction::List => {
            for habit in store.state().habits {
                let Some(id) = habit.id else { continue };
                store.fetch_habit_logs(id).await;
                println!(
                    "{:>5}  {:<28} {:?}  today: {}",
                    id,
                    habit.title,
                    habit.habit_type,
                    status_label(store.date_status(id, today))
                );
            }
        }
        HabitAction::Log { habit, value, date } => {
            let habit_type = store
                .state()
                .habit(habit)
                .map(|h| h.habit_type)
                .with_context(|| format!("no habit with id {}", habit))?;
            let entry = HabitLogEntry::for_habit(habit_type, date.unwrap_or(today), value.unwrap_or(1));
            let log = store.add_habit_log(habit, &entry).await?;
            println!("Logged habit {} (log {:?})", habit, log.id);
        }
        HabitAction::Status { habit, days } => {
            if store.state().habit(habit).is_none() {
                bail!("no habit with id {}", habit);
            }
            store.fetch_habit_logs(habit).await;
            for offset in (0..days.max(1)).rev() {
                let day = today - Duration::days(offset);
                println!("{}  {}", day, status_label(store.date_status(habit, day)));
            }
        }
    }
    Ok(())
}

async fn run_summary(
    session: &Session,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    wallet: Option<i64>,
) -> Result<()> {
    let query = || match (from, to) {
        (Some(from), Some(to)) => TransactionQuery::new().between(from, to),
        (Some(from), None) => TransactionQuery::new().param("startDate", from),
        (None, Some(to)) => TransactionQuery::new().param("endDate", to),
        (None, None) => TransactionQuery::new(),
    };

    let accounting = &session.services.accounting;
    let summary = accounting.get_accounting_summary(query(), wallet).await?;
    println!(
        "income {:.2}  expense {:.2}  saving {:.2}{}",
        summary.income,
        summary.expense,
        summary.saving,
        summary.balance.map(|b| format!("  balance {:.2}", b)).unwrap_or_default()
    );

    for line in accounting.get_transactions_summary(query(), wallet).await? {
        let title = line
            .category
            .as_ref()
            .map(|c| c.title.as_str())
            .unwrap_or("uncategorized");
        println!(
            "  {:<24} {:>10.2} {:>5.1}%  ({} transactions)",
            title,
            line.expense,
            line.percent,
            line.transactions.len()
        );
    }
    Ok(())
}

fn status_label(status: DayStatus) -> &'static str {
    match status {
        DayStatus::Complete => "complete",
        DayStatus::Partial => "partial",
        DayStatus::Unlogged => "-",
    }
}
