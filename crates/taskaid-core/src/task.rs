use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    #[default]
    Active,
    Overdue,
    #[serde(rename = "none")]
    Unset,
}

/// Unknown or null statuses read back as `none`.
impl<'de> Deserialize<'de> for ReminderStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .and_then(|value| value.parse().ok())
            .unwrap_or(ReminderStatus::Unset))
    }
}

impl ReminderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReminderStatus::Active => "active",
            ReminderStatus::Overdue => "overdue",
            ReminderStatus::Unset => "none",
        }
    }

    fn default_label(self) -> &'static str {
        match self {
            ReminderStatus::Unset => "Not set",
            ReminderStatus::Active | ReminderStatus::Overdue => "Reminder set",
        }
    }
}

impl std::str::FromStr for ReminderStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(ReminderStatus::Active),
            "overdue" => Ok(ReminderStatus::Overdue),
            "none" | "unset" | "" => Ok(ReminderStatus::Unset),
            other => Err(anyhow::anyhow!(
                "unknown reminder status: {other} (expected active, overdue or none)"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default = "new_task_id")]
    pub id: String,

    pub name: String,

    pub due_date: NaiveDate,

    #[serde(default, with = "hhmm_serde")]
    pub due_time: Option<NaiveTime>,

    #[serde(default = "unset_status")]
    pub reminder_status: ReminderStatus,

    #[serde(default)]
    pub reminder_label: String,

    #[serde(default)]
    pub created_at: i64,
}

impl Task {
    /// Due moment used for ordering; a task without a time sorts at the
    /// start of its day.
    pub fn sort_key(&self) -> NaiveDateTime {
        self.due_date.and_time(self.due_time.unwrap_or(NaiveTime::MIN))
    }

    /// Due moment used to decide whether a task is still upcoming; a task
    /// without a time stays upcoming until the end of its day.
    pub fn upcoming_deadline(&self) -> NaiveDateTime {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN);
        self.due_date.and_time(self.due_time.unwrap_or(end_of_day))
    }
}

fn unset_status() -> ReminderStatus {
    ReminderStatus::Unset
}

pub fn new_task_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskValidationError {
    #[error("Please complete required fields.")]
    MissingRequired,

    #[error("Due date must look like YYYY-MM-DD (got {0}).")]
    InvalidDueDate(String),

    #[error("Due time must look like HH:MM (got {0}).")]
    InvalidDueTime(String),
}

/// Raw task form input, as typed by the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub due_date: String,
    #[serde(default)]
    pub due_time: String,
    #[serde(default)]
    pub reminder_status: ReminderStatus,
    #[serde(default)]
    pub reminder_label: String,
}

impl TaskDraft {
    pub fn from_task(task: &Task) -> Self {
        Self {
            id: Some(task.id.clone()),
            name: task.name.clone(),
            due_date: crate::clock::iso_date(task.due_date),
            due_time: task
                .due_time
                .map(|t| t.format("%H:%M").to_string())
                .unwrap_or_default(),
            reminder_status: task.reminder_status,
            reminder_label: task.reminder_label.clone(),
        }
    }

    /// The id this draft will be stored under, if it names one.
    pub fn target_id(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }

    /// Validates the draft and builds the task to store. `existing` is the
    /// stored task with the same id, whose creation stamp is kept.
    #[tracing::instrument(skip(self, existing), fields(id = ?self.id))]
    pub fn into_task(self, existing: Option<&Task>, now_ms: i64) -> Result<Task, TaskValidationError> {
        let name = self.name.trim().to_string();
        let raw_date = self.due_date.trim();
        if name.is_empty() || raw_date.is_empty() {
            return Err(TaskValidationError::MissingRequired);
        }

        let due_date = crate::clock::parse_iso_date(raw_date)
            .ok_or_else(|| TaskValidationError::InvalidDueDate(raw_date.to_string()))?;

        let raw_time = self.due_time.trim();
        let due_time = if raw_time.is_empty() {
            None
        } else {
            Some(
                hhmm_serde::parse(raw_time)
                    .ok_or_else(|| TaskValidationError::InvalidDueTime(raw_time.to_string()))?,
            )
        };

        let label = self.reminder_label.trim();
        let reminder_label = if label.is_empty() {
            self.reminder_status.default_label().to_string()
        } else {
            label.to_string()
        };

        let id = self
            .target_id()
            .map(str::to_string)
            .unwrap_or_else(new_task_id);

        Ok(Task {
            id,
            name,
            due_date,
            due_time,
            reminder_status: self.reminder_status,
            reminder_label,
            created_at: existing.map(|task| task.created_at).unwrap_or(now_ms),
        })
    }
}

/// `"HH:MM"` on the wire; an empty string or null means no time.
pub mod hhmm_serde {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<NaiveTime> {
        let raw = raw.trim();
        NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .ok()
    }

    pub fn serialize<S>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(value) => serializer.serialize_str(&value.format("%H:%M").to_string()),
            None => serializer.serialize_str(""),
        }
    }

    /// Unparseable times degrade to "no time" instead of failing the task.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(raw.as_ref().and_then(|v| v.as_str()).and_then(parse))
    }
}
