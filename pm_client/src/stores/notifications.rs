use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::Reactive;
use crate::models::Notification;
use crate::notifications::{ListenerId, NotificationConnector};

/// Oldest notifications beyond this are dropped.
pub const MAX_NOTIFICATIONS: usize = 50;
pub const TOAST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationState {
    /// Newest first.
    pub notifications: Vec<Notification>,
    pub current_toast: Option<Notification>,
}

impl NotificationState {
    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }

    pub fn has_unread(&self) -> bool {
        self.unread_count() > 0
    }

    /// Notifications that arrived after `last_seen`, newest first. All of
    /// them when `last_seen` is `None` or no longer in the list.
    pub fn newer_than(&self, last_seen: Option<&str>) -> &[Notification] {
        let end = last_seen
            .and_then(|id| self.notifications.iter().position(|n| n.id == id))
            .unwrap_or(self.notifications.len());
        &self.notifications[..end]
    }
}

#[derive(Clone)]
pub struct NotificationStore {
    state: Arc<Reactive<NotificationState>>,
    toast_timer: Arc<Mutex<Option<CancellationToken>>>,
    toast_timeout: Duration,
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new(TOAST_TIMEOUT)
    }
}

impl NotificationStore {
    pub fn new(toast_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Reactive::new(NotificationState::default())),
            toast_timer: Arc::new(Mutex::new(None)),
            toast_timeout,
        }
    }

    pub fn state(&self) -> NotificationState {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationState> {
        self.state.subscribe()
    }

    pub fn unread_count(&self) -> usize {
        self.state.read(NotificationState::unread_count)
    }

    pub fn has_unread(&self) -> bool {
        self.state.read(NotificationState::has_unread)
    }

    /// Feeds every notification the connector receives into this store.
    pub fn attach(&self, connector: &NotificationConnector) -> ListenerId {
        let store = self.clone();
        connector.add_listener(move |n| store.add_notification(n.clone()))
    }

    pub fn add_notification(&self, notification: Notification) {
        self.state.update(|s| {
            s.notifications.insert(0, notification.clone());
            s.notifications.truncate(MAX_NOTIFICATIONS);
        });
        self.show_toast(notification);
    }

    /// Shows `notification` as the toast and hides it after the timeout,
    /// unless another toast replaced it in the meantime.
    pub fn show_toast(&self, notification: Notification) {
        let id = notification.id.clone();
        self.state.update(|s| s.current_toast = Some(notification));

        let token = CancellationToken::new();
        if let Some(old) = self.swap_timer(Some(token.clone())) {
            old.cancel();
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!("No runtime available, toast {} will not auto-hide", id);
            return;
        };
        let state = Arc::clone(&self.state);
        let timeout = self.toast_timeout;
        runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = sleep(timeout) => {
                    state.update(|s| {
                        if s.current_toast.as_ref().map(|t| &t.id) == Some(&id) {
                            s.current_toast = None;
                        }
                    });
                }
            }
        });
    }

    pub fn hide_toast(&self) {
        if let Some(timer) = self.swap_timer(None) {
            timer.cancel();
        }
        self.state.update(|s| s.current_toast = None);
    }

    pub fn mark_as_read(&self, notification_id: &str) {
        self.state.update(|s| {
            if let Some(n) = s.notifications.iter_mut().find(|n| n.id == notification_id) {
                n.read = true;
            }
        });
    }

    pub fn mark_all_as_read(&self) {
        self.state.update(|s| s.notifications.iter_mut().for_each(|n| n.read = true));
    }

    pub fn clear_all(&self) {
        self.state.update(|s| s.notifications.clear());
    }

    fn swap_timer(&self, next: Option<CancellationToken>) -> Option<CancellationToken> {
        let mut timer = self.toast_timer.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *timer, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationKind;

    fn note(id: &str) -> Notification {
        Notification {
            id: id.to_string(),
            kind: NotificationKind::EssenceGained,
            title: "Essence".into(),
            message: String::new(),
            icon: String::new(),
            essence_amount: Some(3),
            new_level: None,
            achievement_id: None,
            achievement_name: None,
            reward_id: None,
            reward_name: None,
            timestamp: String::new(),
            read: false,
        }
    }

    fn toast_id(store: &NotificationStore) -> Option<String> {
        store.state().current_toast.map(|t| t.id)
    }

    #[tokio::test]
    async fn keeps_newest_fifty() {
        let store = NotificationStore::default();
        for i in 0..60 {
            store.add_notification(note(&i.to_string()));
        }
        let state = store.state();
        assert_eq!(state.notifications.len(), MAX_NOTIFICATIONS);
        assert_eq!(state.notifications[0].id, "59");
        assert_eq!(state.notifications[49].id, "10");
    }

    #[tokio::test]
    async fn read_tracking() {
        let store = NotificationStore::default();
        store.add_notification(note("a"));
        store.add_notification(note("b"));
        assert_eq!(store.unread_count(), 2);

        store.mark_as_read("a");
        store.mark_as_read("missing");
        assert_eq!(store.unread_count(), 1);
        store.mark_all_as_read();
        assert!(!store.has_unread());

        store.clear_all();
        assert!(store.state().notifications.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn toast_hides_after_timeout() {
        let store = NotificationStore::default();
        store.add_notification(note("a"));
        sleep(TOAST_TIMEOUT - Duration::from_millis(100)).await;
        assert_eq!(toast_id(&store).as_deref(), Some("a"));
        sleep(Duration::from_millis(200)).await;
        assert_eq!(toast_id(&store), None);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_toast_is_not_hidden_by_older_timer() {
        let store = NotificationStore::default();
        store.add_notification(note("a"));
        sleep(Duration::from_secs(3)).await;
        store.add_notification(note("b"));
        sleep(Duration::from_millis(2500)).await;
        assert_eq!(toast_id(&store).as_deref(), Some("b"));
        sleep(Duration::from_secs(3)).await;
        assert_eq!(toast_id(&store), None);
    }

    #[tokio::test]
    async fn burst_is_visible_in_full_to_a_late_reader() {
        let store = NotificationStore::default();
        let mut updates = store.subscribe();
        store.add_notification(note("a"));
        let _ = updates.borrow_and_update();

        for id in ["b", "c", "d"] {
            store.add_notification(note(id));
        }
        assert!(updates.has_changed().unwrap());
        let state = updates.borrow_and_update().clone();
        assert_eq!(state.current_toast.clone().map(|t| t.id).as_deref(), Some("d"));
        let fresh: Vec<&str> = state.newer_than(Some("a")).iter().map(|n| n.id.as_str()).collect();
        assert_eq!(fresh, vec!["d", "c", "b"]);

        assert_eq!(state.newer_than(Some("d")).len(), 0);
        assert_eq!(state.newer_than(None).len(), 4);
        assert_eq!(state.newer_than(Some("evicted")).len(), 4);
    }

    #[tokio::test]
    async fn hide_toast_clears_immediately() {
        let store = NotificationStore::default();
        store.add_notification(note("a"));
        store.hide_toast();
        assert_eq!(toast_id(&store), None);
        assert_eq!(store.state().notifications.len(), 1);
    }
}
