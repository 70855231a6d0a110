use chrono::NaiveDate;
use serde::{
  Deserialize,
  Serialize
};
use serde_json::{
  Map,
  Value
};
use tracing::{
  debug,
  instrument,
  warn
};

use crate::clock::{
  first_of_month,
  parse_iso_date
};
use crate::storage::Storage;
use crate::task::{
  ReminderStatus,
  Task,
  new_task_id
};
use crate::timer::TimerState;

/// Key the whole document is stored
/// under.
pub const STORAGE_KEY: &str =
  "taskAidState";
pub const DEFAULT_TIMER_SECONDS: u32 =
  25 * 60;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const PAGE_SIZES: [u32; 4] =
  [5, 10, 20, 50];

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
  #[default]
  Light,
  Dark
}

impl Theme {
  pub fn toggled(self) -> Self {
    match self {
      | Theme::Light => Theme::Dark,
      | Theme::Dark => Theme::Light
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      | Theme::Light => "light",
      | Theme::Dark => "dark"
    }
  }

  fn parse(raw: &str) -> Option<Self> {
    match raw.trim() {
      | "light" => Some(Theme::Light),
      | "dark" => Some(Theme::Dark),
      | _ => None
    }
  }
}

impl std::str::FromStr for Theme {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    Theme::parse(s).ok_or_else(|| {
      anyhow::anyhow!(
        "unknown theme: {s} (expected \
         light or dark)"
      )
    })
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
  pub page:      u32,
  pub page_size: u32
}

impl Pagination {
  pub fn total_pages(
    &self,
    total: usize
  ) -> u32 {
    let size = self.page_size.max(1) as usize;
    total.div_ceil(size).max(1) as u32
  }

  pub fn clamp(&mut self, total: usize) {
    self.page = self
      .page
      .clamp(1, self.total_pages(total));
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
)]
pub struct Settings {
  pub theme:       Theme,
  #[serde(
    rename = "helper",
    alias = "helperMode"
  )]
  pub helper_mode: bool
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct CalendarCursor {
  pub current_month: NaiveDate,
  pub selected_date: NaiveDate
}

/// The whole persisted document.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
pub struct AppState {
  pub tasks:      Vec<Task>,
  pub search:     String,
  pub pagination: Pagination,
  pub settings:   Settings,
  pub calendar:   CalendarCursor,
  pub timer:      TimerState
}

/// Values a fresh document starts from.
#[derive(Debug, Clone, Copy)]
pub struct StateDefaults {
  pub timer_seconds: u32,
  pub page_size:     u32
}

impl Default for StateDefaults {
  fn default() -> Self {
    Self {
      timer_seconds:
        DEFAULT_TIMER_SECONDS,
      page_size:     DEFAULT_PAGE_SIZE
    }
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Upsert {
  Added,
  Updated
}

impl AppState {
  pub fn new_default(
    today: NaiveDate,
    now_ms: i64,
    defaults: StateDefaults
  ) -> Self {
    Self {
      tasks:      sample_tasks(now_ms),
      search:     String::new(),
      pagination: Pagination {
        page:      1,
        page_size: defaults.page_size
      },
      settings:   Settings::default(),
      calendar:   CalendarCursor {
        current_month: first_of_month(
          today
        ),
        selected_date: today
      },
      timer:      TimerState::new(
        defaults.timer_seconds,
        today
      )
    }
  }

  pub fn task(
    &self,
    id: &str
  ) -> Option<&Task> {
    self
      .tasks
      .iter()
      .find(|task| task.id == id)
  }

  /// Replaces the task with the same id in
  /// place, or appends it.
  pub fn upsert_task(
    &mut self,
    task: Task
  ) -> Upsert {
    match self
      .tasks
      .iter_mut()
      .find(|existing| {
        existing.id == task.id
      }) {
      | Some(existing) => {
        *existing = task;
        Upsert::Updated
      }
      | None => {
        self.tasks.push(task);
        Upsert::Added
      }
    }
  }

  pub fn remove_task(
    &mut self,
    id: &str
  ) -> bool {
    let before = self.tasks.len();
    self.tasks.retain(|task| task.id != id);
    self.tasks.len() != before
  }

  /// The document as it is written to
  /// storage: never with a live tick
  /// stamp.
  pub fn persistable(&self) -> Self {
    let mut doc = self.clone();
    doc.timer.last_tick_ms = None;
    doc
  }
}

/// Reads the persisted document and merges
/// it over the defaults field by field.
/// Never fails.
#[instrument(skip(storage, defaults))]
pub fn load_state(
  storage: &Storage,
  today: NaiveDate,
  now_ms: i64,
  defaults: StateDefaults
) -> AppState {
  let fresh = AppState::new_default(
    today, now_ms, defaults
  );
  let stored = storage
    .get_value(STORAGE_KEY, Value::Null);

  match stored {
    | Value::Null => {
      debug!(
        "no stored document; starting \
         from defaults"
      );
      fresh
    }
    | Value::Object(doc) => {
      merge_document(&doc, fresh)
    }
    | Value::String(text) => {
      match serde_json::from_str::<Value>(
        &text
      ) {
        | Ok(Value::Object(doc)) => {
          debug!(
            "stored document was \
             string-encoded"
          );
          merge_document(&doc, fresh)
        }
        | _ => {
          warn!(
            "stored document is an \
             unparsable string; using \
             defaults"
          );
          fresh
        }
      }
    }
    | other => {
      warn!(
        kind = ?other,
        "stored document is not an \
         object; using defaults"
      );
      fresh
    }
  }
}

#[instrument(skip(storage, state))]
pub fn save_state(
  storage: &mut Storage,
  state: &AppState
) -> anyhow::Result<()> {
  storage.set(
    STORAGE_KEY,
    &state.persistable()
  )
}

fn merge_document(
  doc: &Map<String, Value>,
  defaults: AppState
) -> AppState {
  let tasks = match doc.get("tasks") {
    | Some(Value::Array(items)) => {
      merge_tasks(items)
    }
    | Some(_) => {
      warn!(
        "stored tasks are not a list; \
         using sample tasks"
      );
      defaults.tasks
    }
    | None => defaults.tasks
  };

  let search = doc
    .get("search")
    .and_then(Value::as_str)
    .unwrap_or_default()
    .to_string();

  let pagination = {
    let stored =
      section(doc, "pagination");
    Pagination {
      page:      field(stored, &["page"])
        .and_then(whole_number)
        .filter(|page| *page > 0)
        .and_then(|page| {
          u32::try_from(page).ok()
        })
        .unwrap_or(
          defaults.pagination.page
        ),
      page_size: field(stored, &[
        "pageSize"
      ])
      .and_then(whole_number)
      .and_then(|size| {
        u32::try_from(size).ok()
      })
      .filter(|size| {
        PAGE_SIZES.contains(size)
      })
      .unwrap_or(
        defaults.pagination.page_size
      )
    }
  };

  let settings = {
    let stored = section(doc, "settings");
    Settings {
      theme:       field(stored, &[
        "theme"
      ])
      .and_then(Value::as_str)
      .and_then(Theme::parse)
      .unwrap_or(defaults.settings.theme),
      helper_mode: field(stored, &[
        "helper",
        "helperMode"
      ])
      .is_some_and(truthy)
    }
  };

  let calendar = {
    let stored = section(doc, "calendar");
    CalendarCursor {
      current_month: field(stored, &[
        "currentMonth"
      ])
      .and_then(iso_date)
      .map(first_of_month)
      .unwrap_or(
        defaults.calendar.current_month
      ),
      selected_date: field(stored, &[
        "selectedDate"
      ])
      .and_then(iso_date)
      .unwrap_or(
        defaults.calendar.selected_date
      )
    }
  };

  let timer =
    merge_timer(section(doc, "timer"), &defaults.timer);

  AppState {
    tasks,
    search,
    pagination,
    settings,
    calendar,
    timer
  }
}

fn merge_tasks(
  items: &[Value]
) -> Vec<Task> {
  items
    .iter()
    .enumerate()
    .filter_map(|(idx, item)| {
      match serde_json::from_value::<Task>(
        item.clone()
      ) {
        | Ok(mut task) => {
          if task.id.trim().is_empty() {
            task.id = new_task_id();
          }
          Some(task)
        }
        | Err(err) => {
          warn!(
            index = idx,
            error = %err,
            "dropping unreadable stored \
             task"
          );
          None
        }
      }
    })
    .collect()
}

fn merge_timer(
  stored: Option<&Map<String, Value>>,
  defaults: &TimerState
) -> TimerState {
  let duration_seconds = field(stored, &[
    "duration",
    "durationSeconds"
  ])
  .and_then(whole_number)
  .filter(|secs| *secs > 0)
  .and_then(|secs| u32::try_from(secs).ok())
  .unwrap_or(defaults.duration_seconds);

  let remaining_seconds = field(stored, &[
    "remaining",
    "remainingSeconds"
  ])
  .filter(|value| !value.is_null())
  .and_then(whole_number)
  .map(|secs| {
    secs.min(u64::from(duration_seconds))
      as u32
  })
  .unwrap_or(duration_seconds);

  TimerState {
    duration_seconds,
    remaining_seconds,
    running: field(stored, &["running"])
      .is_some_and(truthy),
    last_tick_ms: None,
    done_today_seconds: field(stored, &[
      "doneTodaySeconds"
    ])
    .and_then(whole_number)
    .unwrap_or(0),
    done_today_date: field(stored, &[
      "doneTodayDate"
    ])
    .and_then(iso_date)
    .unwrap_or(defaults.done_today_date)
  }
}

fn section<'a>(
  doc: &'a Map<String, Value>,
  key: &str
) -> Option<&'a Map<String, Value>> {
  doc.get(key).and_then(Value::as_object)
}

/// First present, non-null member among
/// `keys`.
fn field<'a>(
  section: Option<&'a Map<String, Value>>,
  keys: &[&str]
) -> Option<&'a Value> {
  let section = section?;
  keys
    .iter()
    .filter_map(|key| section.get(*key))
    .find(|value| !value.is_null())
}

/// Non-negative integral value; fractional
/// numbers are truncated.
fn whole_number(
  value: &Value
) -> Option<u64> {
  if let Some(n) = value.as_u64() {
    return Some(n);
  }
  value
    .as_f64()
    .filter(|n| n.is_finite() && *n >= 0.0)
    .map(|n| n.trunc() as u64)
}

fn iso_date(
  value: &Value
) -> Option<NaiveDate> {
  value.as_str().and_then(parse_iso_date)
}

/// Boolean casting as the document's
/// original writer applied it.
fn truthy(value: &Value) -> bool {
  match value {
    | Value::Null => false,
    | Value::Bool(flag) => *flag,
    | Value::Number(n) => n
      .as_f64()
      .is_some_and(|n| n != 0.0 && !n.is_nan()),
    | Value::String(text) => {
      !text.is_empty()
    }
    | Value::Array(_)
    | Value::Object(_) => true
  }
}

fn sample_tasks(now_ms: i64) -> Vec<Task> {
  let sample = |name: &str,
                date: (i32, u32, u32),
                time: (u32, u32),
                status: ReminderStatus,
                label: &str| {
    Task {
      id: new_task_id(),
      name: name.to_string(),
      due_date: NaiveDate::from_ymd_opt(
        date.0, date.1, date.2
      )
      .unwrap_or_default(),
      due_time:
        chrono::NaiveTime::from_hms_opt(
          time.0, time.1, 0
        ),
      reminder_status: status,
      reminder_label: label.to_string(),
      created_at: now_ms
    }
  };

  vec![
    sample(
      "Understanding the tools in Figma",
      (2025, 1, 14),
      (9, 0),
      ReminderStatus::Active,
      "Monday, Jan 14 - 9:00"
    ),
    sample(
      "Understanding the tools in Figma",
      (2025, 1, 18),
      (9, 0),
      ReminderStatus::Overdue,
      "Monday, Jan 18 - 9:00"
    ),
    sample(
      "Task name",
      (2025, 1, 20),
      (21, 0),
      ReminderStatus::Unset,
      "Not set"
    ),
    sample(
      "Task name",
      (2025, 1, 20),
      (21, 0),
      ReminderStatus::Unset,
      "Not set"
    ),
  ]
}
