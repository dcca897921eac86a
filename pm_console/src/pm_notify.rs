use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;

use pm_client::configs::ClientConfig;
use pm_client::loggers::setup_logging;
use pm_client::models::Notification;
use pm_client::notifications::{NotificationConnector, StompTransport};
use pm_client::stores::NotificationStore;

mod session;
use session::Session;

#[derive(Parser, Debug)]
#[command(name = "pm_notify", about = "Streams Personal Manager notifications to the console", version)]
struct Cli {
    #[command(flatten)]
    config: ClientConfig,
}

const STATUS_CHECK_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Cli::parse().config.resolve()?;
    setup_logging("pm_notify", &config.log_dir(), config.log_level())?;

    let session = Session::sign_in(config).await?;
    let user_id = session.user_id().context("signed in without a user id")?;
    let account_id = session
        .services
        .users
        .get_user_identity()
        .await
        .and_then(|identity| identity.id)
        .context("could not resolve the account id from /api/users/me")?;

    let transport = StompTransport::new(session.config.api_base_url(), session.config.heartbeat())?;
    log::info!("Notification endpoint: {}", transport.url());
    let connector = NotificationConnector::new(Arc::new(transport), session.config.connector());

    let store = NotificationStore::default();
    store.attach(&connector);
    let mut updates = store.subscribe();

    connector.connect(user_id, account_id);

    let mut status_check = tokio::time::interval(STATUS_CHECK_INTERVAL);
    let mut last_seen: Option<String> = None;

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                log::info!("Ctrl-C received, initiating shutdown.");
                break;
            }
            _ = terminate() => {
                log::info!("SIGTERM received, initiating shutdown.");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                // Several notifications can land between two wake-ups.
                let fresh: Vec<Notification> = updates
                    .borrow_and_update()
                    .newer_than(last_seen.as_deref())
                    .to_vec();
                let unread = store.unread_count();
                for notification in fresh.iter().rev() {
                    print_notification(notification, unread);
                }
                if let Some(newest) = fresh.first() {
                    last_seen = Some(newest.id.clone());
                }
            }
            _ = status_check.tick() => {
                let status = connector.status();
                log::debug!("Notification channel: {:?}", status);
                if status.exhausted {
                    log::error!(
                        "Notification channel gave up after {} attempts, exiting.",
                        status.attempts
                    );
                    break;
                }
            }
        }
    }

    connector.disconnect();
    log::info!(
        "Shutdown complete. {} notifications received, {} unread.",
        store.state().notifications.len(),
        store.unread_count()
    );
    Ok(())
}

fn print_notification(notification: &Notification, unread: usize) {
    log::info!("{:?} notification {}", notification.kind, notification.id);
    println!(
        "{} {}: {}  ({} unread)",
        notification.icon, notification.title, notification.message, unread
    );
}

async fn terminate() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term_signal) => {
                term_signal.recv().await;
            }
            Err(e) => {
                log::warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        // On non-unix platforms, just wait forever.
        std::future::pending::<()>().await;
    }
}
