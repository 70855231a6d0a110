use std::io::{self, IsTerminal, Write};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::event::Outbound;
use crate::task::{Task, TaskDraft};

/// A desktop notification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub silent: bool,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            silent: false,
        }
    }

    pub fn timer_completed() -> Self {
        Self::new("Timer Completed!", "Great job! Your focus session is complete.")
    }
}

/// The host around the app: transient messages, the task form, system
/// notifications and outbound signals.
pub trait Shell {
    fn toast(&mut self, message: &str);

    /// `None` opens an empty form.
    fn open_task_form(&mut self, task: Option<&Task>);

    fn show_notification(&mut self, notification: &Notification) -> anyhow::Result<()>;

    /// Relays outbound signals. Notification failures are logged and
    /// dropped.
    fn emit(&mut self, signal: Outbound) {
        debug!(signal = signal.as_str(), "emitting outbound signal");
        match signal {
            Outbound::TimerCompleted => {
                if let Err(err) = self.show_notification(&Notification::timer_completed()) {
                    warn!(error = %format!("{err:#}"), "failed to show notification");
                }
            }
        }
    }
}

/// Writes toasts and notifications to stderr so stdout stays the view.
#[derive(Debug, Clone)]
pub struct TerminalShell {
    color: bool,
}

impl TerminalShell {
    pub fn new(color: bool) -> Self {
        Self {
            color: color && io::stderr().is_terminal(),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

impl Shell for TerminalShell {
    fn toast(&mut self, message: &str) {
        let line = self.paint(message, "36");
        let _ = writeln!(io::stderr().lock(), "{line}");
    }

    fn open_task_form(&mut self, task: Option<&Task>) {
        let hint = match task {
            None => "taskaid add --name <NAME> --date <YYYY-MM-DD> [--time <HH:MM>]".to_string(),
            Some(task) => {
                let draft = TaskDraft::from_task(task);
                let mut cmd = format!(
                    "taskaid edit {} --name {:?} --date {}",
                    task.id, draft.name, draft.due_date
                );
                if !draft.due_time.is_empty() {
                    cmd.push_str(&format!(" --time {}", draft.due_time));
                }
                cmd.push_str(&format!(
                    " --status {} --label {:?}",
                    draft.reminder_status.as_str(),
                    draft.reminder_label
                ));
                cmd
            }
        };
        let title = self.paint(if task.is_some() { "Edit task" } else { "New task" }, "1");
        let _ = writeln!(io::stderr().lock(), "{title}: {hint}");
    }

    fn show_notification(&mut self, notification: &Notification) -> anyhow::Result<()> {
        let mut err = io::stderr().lock();
        let bell = if notification.silent { "" } else { "\x07" };
        let title = self.paint(&notification.title, "1;32");
        writeln!(err, "{bell}{title} {}", notification.body)?;
        err.flush()?;
        Ok(())
    }
}
