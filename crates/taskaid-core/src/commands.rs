use anyhow::{Context, anyhow};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, instrument};

use crate::app::App;
use crate::cli::{CalendarCommand, Command, Direction, TaskEdits, TaskFields, ThemeArg, TimerCommand};
use crate::event::AppEvent;
use crate::runtime::{Until, install_signal_handlers, run_event_loop, spawn_trigger_reader};
use crate::state::Theme;
use crate::task::{ReminderStatus, TaskDraft};

/// The event channel shared by the tick driver, signal handlers and the
/// trigger reader.
pub struct EventChannel {
    pub sender: UnboundedSender<AppEvent>,
    pub receiver: UnboundedReceiver<AppEvent>,
}

impl EventChannel {
    pub fn new() -> Self {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        Self { sender, receiver }
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the command keeps the app alive on the event loop.
pub fn is_long_running(command: &Command) -> bool {
    matches!(command, Command::Session | Command::Timer(TimerCommand::Run))
}

#[instrument(skip(app, runtime, events))]
pub fn dispatch(
    app: &mut App,
    runtime: &Runtime,
    events: &mut EventChannel,
    command: Command,
) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    let result = apply(app, runtime, events, command);
    app.shutdown();
    result
}

fn apply(
    app: &mut App,
    runtime: &Runtime,
    events: &mut EventChannel,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Show => {
            app.render();
            Ok(())
        }
        Command::Add(fields) => cmd_add(app, fields),
        Command::Edit { id, fields } => cmd_edit(app, &id, fields),
        Command::Delete { id } => {
            let id = resolve_task_id(app, &id)?;
            app.delete_task(&id);
            Ok(())
        }
        Command::Search { terms } => {
            app.set_search(&terms.join(" "));
            Ok(())
        }
        Command::Page { direction } => {
            app.change_page(match direction {
                Direction::Next => 1,
                Direction::Prev => -1,
            });
            Ok(())
        }
        Command::Rows { size } => {
            let size: u32 = size.parse().with_context(|| format!("invalid page size: {size}"))?;
            if app.set_page_size(size) {
                Ok(())
            } else {
                Err(anyhow!("unsupported page size: {size}"))
            }
        }
        Command::Calendar(CalendarCommand::Next) => {
            app.change_month(1);
            Ok(())
        }
        Command::Calendar(CalendarCommand::Prev) => {
            app.change_month(-1);
            Ok(())
        }
        Command::Calendar(CalendarCommand::Select { date }) => {
            app.select_date(date);
            Ok(())
        }
        Command::Theme { theme } => {
            match theme {
                None | Some(ThemeArg::Toggle) => app.toggle_theme(),
                Some(ThemeArg::Light) => app.set_theme(Theme::Light),
                Some(ThemeArg::Dark) => app.set_theme(Theme::Dark),
            }
            Ok(())
        }
        Command::Helper => {
            app.toggle_helper();
            Ok(())
        }
        Command::Timer(TimerCommand::Start) => {
            app.start_timer();
            Ok(())
        }
        Command::Timer(TimerCommand::Pause) => {
            app.pause_timer();
            Ok(())
        }
        Command::Timer(TimerCommand::Toggle) => {
            app.toggle_timer();
            Ok(())
        }
        Command::Timer(TimerCommand::Reset) => {
            app.reset_timer();
            Ok(())
        }
        Command::Timer(TimerCommand::Run) => cmd_timer_run(app, runtime, events),
        Command::Trigger { name } => {
            app.trigger(name);
            Ok(())
        }
        Command::Session => cmd_session(app, runtime, events),
        Command::Sync => {
            app.sync_calendar();
            Ok(())
        }
        Command::Filters => {
            app.open_filters();
            Ok(())
        }
        Command::Forget => {
            app.forget();
            Ok(())
        }
    }
}

fn cmd_add(app: &mut App, fields: TaskFields) -> anyhow::Result<()> {
    let draft = TaskDraft {
        id: None,
        name: fields.name,
        due_date: fields.date,
        due_time: fields.time.unwrap_or_default(),
        reminder_status: fields.status.unwrap_or(ReminderStatus::Active),
        reminder_label: fields.label.unwrap_or_default(),
    };
    app.save_task(draft).context("task not added")?;
    Ok(())
}

fn cmd_edit(app: &mut App, id: &str, edits: TaskEdits) -> anyhow::Result<()> {
    let id = resolve_task_id(app, id)?;
    if edits.is_empty() {
        app.edit_task(&id);
        return Ok(());
    }

    let task = app
        .state()
        .task(&id)
        .ok_or_else(|| anyhow!("no task with id {id}"))?;
    let mut draft = TaskDraft::from_task(task);
    let status_changed = edits.status.is_some_and(|status| status != draft.reminder_status);

    if let Some(name) = edits.name {
        draft.name = name;
    }
    if let Some(date) = edits.date {
        draft.due_date = date;
    }
    if let Some(time) = edits.time {
        draft.due_time = time;
    }
    if let Some(status) = edits.status {
        draft.reminder_status = status;
    }
    match edits.label {
        Some(label) => draft.reminder_label = label,
        // Let the new status pick its default label.
        None if status_changed => draft.reminder_label.clear(),
        None => {}
    }

    app.save_task(draft).context("task not updated")?;
    Ok(())
}

/// Accepts a full id or a unique prefix of one.
fn resolve_task_id(app: &App, query: &str) -> anyhow::Result<String> {
    let query = query.trim();
    if query.is_empty() {
        return Err(anyhow!("task id cannot be empty"));
    }
    if app.state().task(query).is_some() {
        return Ok(query.to_string());
    }

    let mut matches = app
        .state()
        .tasks
        .iter()
        .filter(|task| task.id.starts_with(query));
    match (matches.next(), matches.next()) {
        (Some(task), None) => Ok(task.id.clone()),
        (Some(_), Some(_)) => Err(anyhow!("task id prefix {query} is ambiguous")),
        (None, _) => Err(anyhow!("no task with id {query}")),
    }
}

fn cmd_timer_run(app: &mut App, runtime: &Runtime, events: &mut EventChannel) -> anyhow::Result<()> {
    app.start_timer();
    info!(remaining = app.state().timer.remaining_seconds, "running timer");

    runtime.block_on(async {
        install_signal_handlers(events.sender.clone());
        run_event_loop(app, &mut events.receiver, Until::TimerStopped).await;
    });
    Ok(())
}

fn cmd_session(app: &mut App, runtime: &Runtime, events: &mut EventChannel) -> anyhow::Result<()> {
    app.render();
    runtime.block_on(async {
        install_signal_handlers(events.sender.clone());
        spawn_trigger_reader(tokio::io::stdin(), events.sender.clone());
        run_event_loop(app, &mut events.receiver, Until::Closed).await;
    });
    Ok(())
}
