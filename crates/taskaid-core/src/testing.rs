//! Deterministic collaborators for driving the app without a terminal,
//! a wall clock or a runtime.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::NaiveDateTime;
use parking_lot::Mutex;

use crate::clock::{Clock, utc_from_ms};
use crate::event::Outbound;
use crate::shell::{Notification, Shell};
use crate::task::Task;
use crate::ticker::{TickDriver, TickHandle};
use crate::view::{View, ViewModel};

/// A clock that only moves when told to. Local time equals UTC.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn at_ms(now_ms: i64) -> Self {
        Self {
            now_ms: Arc::new(AtomicI64::new(now_ms)),
        }
    }

    /// Starts at `at`, read as UTC.
    pub fn at(at: NaiveDateTime) -> Self {
        Self::at_ms(at.and_utc().timestamp_millis())
    }

    pub fn advance(&self, by: Duration) {
        let by = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.now_ms.fetch_add(by, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, by: i64) {
        self.now_ms.fetch_add(by, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn local_now(&self) -> NaiveDateTime {
        utc_from_ms(self.now_ms())
    }
}

/// Hands out inert tick handles and counts them. Ticks are delivered by
/// calling `App::tick` directly.
#[derive(Debug, Clone, Default)]
pub struct ManualTickDriver {
    active: Arc<AtomicUsize>,
    spawned: Arc<AtomicUsize>,
}

impl ManualTickDriver {
    /// Handles spawned and not yet cancelled.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }
}

impl TickDriver for ManualTickDriver {
    fn spawn(&self, _period: Duration) -> TickHandle {
        self.active.fetch_add(1, Ordering::SeqCst);
        self.spawned.fetch_add(1, Ordering::SeqCst);
        let active = Arc::clone(&self.active);
        TickHandle::new(move || {
            active.fetch_sub(1, Ordering::SeqCst);
        })
    }
}

#[derive(Debug, Default)]
pub struct ShellLog {
    pub toasts: Vec<String>,
    /// `None` for an empty form, else the id of the task being edited.
    pub forms: Vec<Option<String>>,
    pub notifications: Vec<Notification>,
    pub signals: Vec<Outbound>,
}

/// Records everything the app asks of its shell. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingShell {
    log: Arc<Mutex<ShellLog>>,
    fail_notifications: bool,
}

impl RecordingShell {
    /// A shell whose notifications always fail.
    pub fn failing_notifications() -> Self {
        Self {
            fail_notifications: true,
            ..Self::default()
        }
    }

    pub fn toasts(&self) -> Vec<String> {
        self.log.lock().toasts.clone()
    }

    pub fn last_toast(&self) -> Option<String> {
        self.log.lock().toasts.last().cloned()
    }

    pub fn forms(&self) -> Vec<Option<String>> {
        self.log.lock().forms.clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.log.lock().notifications.clone()
    }

    pub fn signals(&self) -> Vec<Outbound> {
        self.log.lock().signals.clone()
    }
}

impl Shell for RecordingShell {
    fn toast(&mut self, message: &str) {
        self.log.lock().toasts.push(message.to_string());
    }

    fn open_task_form(&mut self, task: Option<&Task>) {
        self.log.lock().forms.push(task.map(|task| task.id.clone()));
    }

    fn show_notification(&mut self, notification: &Notification) -> anyhow::Result<()> {
        if self.fail_notifications {
            anyhow::bail!("notifications are unavailable");
        }
        self.log.lock().notifications.push(notification.clone());
        Ok(())
    }

    fn emit(&mut self, signal: Outbound) {
        self.log.lock().signals.push(signal);
        match signal {
            Outbound::TimerCompleted => {
                let _ = self.show_notification(&Notification::timer_completed());
            }
        }
    }
}

/// Keeps every rendered view. Clones share the history.
#[derive(Debug, Clone, Default)]
pub struct RecordingView {
    frames: Arc<Mutex<Vec<ViewModel>>>,
}

impl RecordingView {
    pub fn frames(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn last(&self) -> Option<ViewModel> {
        self.frames.lock().last().cloned()
    }
}

impl View for RecordingView {
    fn render(&mut self, view: &ViewModel) -> anyhow::Result<()> {
        self.frames.lock().push(view.clone());
        Ok(())
    }
}
