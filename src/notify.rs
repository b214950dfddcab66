//! User-facing side effects: notifications and hard redirects.
//!
//! The client never talks to a UI directly; it reports through these two
//! capabilities so a host (desktop shell, CLI, tests) decides how to show them.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// A message meant for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl Notification {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            raised_at: Utc::now(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

pub trait Navigator: Send + Sync {
    /// Leave the current view entirely and load `path`
    fn hard_redirect(&self, path: &str);
}

/// Keeps notifications until the host drains them
#[derive(Default)]
pub struct NotificationCenter {
    pending: Mutex<Vec<Notification>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every pending notification, oldest first
    pub fn drain(&self) -> Vec<Notification> {
        match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for NotificationCenter {
    fn notify(&self, notification: Notification) {
        warn!(text = %notification.message, "User notification");
        if let Ok(mut pending) = self.pending.lock() {
            pending.push(notification);
        }
    }
}

/// Records hard redirects for the host to act on
#[derive(Default)]
pub struct RedirectRecorder {
    redirects: Mutex<Vec<String>>,
}

impl RedirectRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<String> {
        self.redirects.lock().ok().and_then(|r| r.last().cloned())
    }
}

impl Navigator for RedirectRecorder {
    fn hard_redirect(&self, path: &str) {
        info!("Hard redirect to {}", path);
        if let Ok(mut redirects) = self.redirects.lock() {
            redirects.push(path.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_the_center() {
        let center = NotificationCenter::new();
        center.notify(Notification::error("first"));
        center.notify(Notification::error("second"));

        let drained: Vec<_> = center.drain().into_iter().map(|n| n.message).collect();
        assert_eq!(drained, vec!["first", "second"]);
        assert!(center.is_empty());
    }

    #[test]
    fn recorder_keeps_order() {
        let recorder = RedirectRecorder::new();
        recorder.hard_redirect("/login");
        recorder.hard_redirect("/register");

        assert_eq!(recorder.redirects(), vec!["/login", "/register"]);
        assert_eq!(recorder.last().as_deref(), Some("/register"));
    }
}
