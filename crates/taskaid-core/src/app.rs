use std::ops::ControlFlow;

use chrono::NaiveDate;
use tracing::{debug, error, info, instrument, warn};

use crate::clock::{Clock, first_of_month, shift_month};
use crate::event::{AppEvent, Outbound, Trigger};
use crate::shell::Shell;
use crate::state::{
  AppState, PAGE_SIZES, STORAGE_KEY, StateDefaults, Theme, Upsert, load_state, save_state,
};
use crate::storage::Storage;
use crate::task::{TaskDraft, TaskValidationError};
use crate::ticker::TickDriver;
use crate::timer::{TickOutcome, TimerEngine};
use crate::view::{self, View};

/// Everything the app is built from.
pub struct AppParts {
  pub storage: Storage,
  pub driver: Box<dyn TickDriver>,
  pub clock: Box<dyn Clock>,
  pub shell: Box<dyn Shell>,
  pub view: Box<dyn View>,
  pub defaults: StateDefaults,
}

/// The single owner of [`AppState`]. Every action mutates the state,
/// persists it, then renders.
pub struct App {
  state: AppState,
  storage: Storage,
  engine: TimerEngine,
  clock: Box<dyn Clock>,
  shell: Box<dyn Shell>,
  view: Box<dyn View>,
  defaults: StateDefaults,
}

impl App {
  /// Loads the persisted document and re-arms a timer that was running
  /// when it was saved.
  #[instrument(skip_all)]
  pub fn start(parts: AppParts) -> Self {
    let AppParts {
      storage,
      driver,
      clock,
      shell,
      view,
      defaults,
    } = parts;

    let state = load_state(&storage, clock.today(), clock.now_ms(), defaults);
    info!(
      tasks = state.tasks.len(),
      running = state.timer.running,
      store = %storage.describe(),
      "state loaded"
    );

    let mut app = Self {
      state,
      storage,
      engine: TimerEngine::new(driver),
      clock,
      shell,
      view,
      defaults,
    };

    if app.state.timer.resume(app.clock.now_ms()) {
      info!(remaining = app.state.timer.remaining_seconds, "resuming running timer");
      app.engine.ensure_ticking();
    }
    app
  }

  pub fn state(&self) -> &AppState {
    &self.state
  }

  pub fn is_ticking(&self) -> bool {
    self.engine.is_ticking()
  }

  /// Projects the current state to the view. Rolls the daily total over
  /// and clamps the page first.
  pub fn render(&mut self) {
    self.state.timer.refresh_day(self.clock.today());
    let visible = view::search_filter(&self.state.tasks, &self.state.search).len();
    self.state.pagination.clamp(visible);

    let model = view::build(&self.state, self.clock.local_now());
    if let Err(err) = self.view.render(&model) {
      warn!(error = %format!("{err:#}"), "render failed");
    }
  }

  fn persist(&mut self) {
    if let Err(err) = save_state(&mut self.storage, &self.state) {
      error!(error = %format!("{err:#}"), "failed to persist state");
    }
  }

  fn commit(&mut self) {
    self.persist();
    self.render();
  }

  // Timer

  #[instrument(skip(self))]
  pub fn start_timer(&mut self) {
    if !self.state.timer.start(self.clock.now_ms()) {
      debug!("timer already running");
      return;
    }
    self.engine.ensure_ticking();
    self.commit();
  }

  #[instrument(skip(self))]
  pub fn pause_timer(&mut self) {
    if !self.state.timer.pause() {
      debug!("timer not running");
      return;
    }
    self.engine.stop_ticking();
    self.commit();
  }

  pub fn toggle_timer(&mut self) {
    if self.state.timer.running {
      self.pause_timer();
    } else {
      self.start_timer();
    }
  }

  #[instrument(skip(self))]
  pub fn reset_timer(&mut self) {
    self.state.timer.reset();
    self.engine.stop_ticking();
    self.commit();
  }

  /// Applies one tick of the timer loop.
  #[instrument(skip(self), level = "trace")]
  pub fn tick(&mut self) -> TickOutcome {
    self.state.timer.refresh_day(self.clock.today());
    let outcome = self.state.timer.tick(self.clock.now_ms());

    match outcome {
      TickOutcome::NotRunning => {
        debug!("tick while stopped; cancelling loop");
        self.engine.stop_ticking();
        return outcome;
      }
      TickOutcome::Absorbed => return outcome,
      TickOutcome::Completed { credited_seconds } => {
        info!(credited_seconds, "timer completed");
        self.engine.stop_ticking();
        self.shell.toast("Great job! Timer completed.");
        self.shell.emit(Outbound::TimerCompleted);
      }
      TickOutcome::Advanced { .. } => {}
    }

    self.commit();
    outcome
  }

  // Settings

  pub fn set_theme(&mut self, theme: Theme) {
    self.state.settings.theme = theme;
    self.commit();
  }

  pub fn toggle_theme(&mut self) {
    self.set_theme(self.state.settings.theme.toggled());
  }

  pub fn toggle_helper(&mut self) {
    self.state.settings.helper_mode = !self.state.settings.helper_mode;
    self.commit();
  }

  // Task table

  pub fn set_search(&mut self, search: &str) {
    self.state.search = search.to_string();
    self.state.pagination.page = 1;
    self.commit();
  }

  /// Ignores sizes outside [`PAGE_SIZES`].
  pub fn set_page_size(&mut self, size: u32) -> bool {
    if !PAGE_SIZES.contains(&size) {
      warn!(size, "unsupported page size");
      return false;
    }
    self.state.pagination.page_size = size;
    self.state.pagination.page = 1;
    self.commit();
    true
  }

  pub fn change_page(&mut self, delta: i32) {
    let visible = view::search_filter(&self.state.tasks, &self.state.search).len();
    let last = self.state.pagination.total_pages(visible) as i64;
    let page = (i64::from(self.state.pagination.page) + i64::from(delta)).clamp(1, last);
    self.state.pagination.page = page as u32;
    self.commit();
  }

  // Calendar

  pub fn select_date(&mut self, date: NaiveDate) {
    self.state.calendar.selected_date = date;
    self.state.calendar.current_month = first_of_month(date);
    self.commit();
  }

  pub fn change_month(&mut self, offset: i32) {
    let month = first_of_month(self.state.calendar.current_month);
    self.state.calendar.current_month = shift_month(month, offset);
    self.commit();
  }

  // Tasks

  /// Creates or updates a task. A rejected draft is toasted and leaves
  /// the task list untouched.
  #[instrument(skip(self, draft), fields(id = ?draft.target_id()))]
  pub fn save_task(&mut self, draft: TaskDraft) -> Result<Upsert, TaskValidationError> {
    let existing = draft.target_id().and_then(|id| self.state.task(id)).cloned();
    let task = match draft.into_task(existing.as_ref(), self.clock.now_ms()) {
      Ok(task) => task,
      Err(err) => {
        warn!(error = %err, "rejected task");
        self.shell.toast(&err.to_string());
        return Err(err);
      }
    };

    let id = task.id.clone();
    let outcome = self.state.upsert_task(task);
    info!(%id, ?outcome, "saved task");
    self.shell.toast(match outcome {
      Upsert::Added => "Task added.",
      Upsert::Updated => "Task updated.",
    });
    self.commit();
    Ok(outcome)
  }

  #[instrument(skip(self))]
  pub fn delete_task(&mut self, id: &str) -> bool {
    if !self.state.remove_task(id) {
      debug!("no such task");
      return false;
    }
    self.shell.toast("Task deleted.");
    self.commit();
    true
  }

  pub fn quick_add(&mut self) {
    self.shell.open_task_form(None);
  }

  pub fn edit_task(&mut self, id: &str) -> bool {
    match self.state.task(id) {
      Some(task) => {
        self.shell.open_task_form(Some(task));
        true
      }
      None => false,
    }
  }

  pub fn sync_calendar(&mut self) {
    self.shell.toast("Calendar sync coming soon.");
  }

  pub fn open_filters(&mut self) {
    self.shell.toast("Filters coming soon.");
  }

  /// Drops the persisted document and starts over from defaults.
  #[instrument(skip(self))]
  pub fn forget(&mut self) {
    self.engine.stop_ticking();
    if let Err(err) = self.storage.delete(STORAGE_KEY) {
      error!(error = %format!("{err:#}"), "failed to delete stored state");
    }
    self.state = AppState::new_default(self.clock.today(), self.clock.now_ms(), self.defaults);
    self.render();
  }

  // Events

  #[instrument(skip(self))]
  pub fn trigger(&mut self, trigger: Trigger) {
    match trigger {
      Trigger::QuickAdd => self.quick_add(),
      Trigger::TimerStart => self.start_timer(),
      Trigger::TimerPause => self.pause_timer(),
      Trigger::TimerToggle => self.toggle_timer(),
      Trigger::TimerReset => self.reset_timer(),
    }
  }

  pub fn handle(&mut self, event: AppEvent) -> ControlFlow<()> {
    match event {
      AppEvent::Tick => {
        self.tick();
      }
      AppEvent::Trigger(trigger) => self.trigger(trigger),
      AppEvent::Shutdown => {
        self.shutdown();
        return ControlFlow::Break(());
      }
    }
    ControlFlow::Continue(())
  }

  /// Cancels the tick loop and writes the final document.
  #[instrument(skip(self))]
  pub fn shutdown(&mut self) {
    self.engine.stop_ticking();
    self.persist();
    info!("shut down");
  }
}
