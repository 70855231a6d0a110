//! Pure projection of [`AppState`] into what the UI shows.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::clock::shift_month;
use crate::state::{AppState, Theme};
use crate::task::{ReminderStatus, Task};
use crate::timer::TimerPhase;

/// Receives a fresh view after every mutation.
pub trait View {
    fn render(&mut self, view: &ViewModel) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModel {
    pub theme: Theme,
    pub helper_mode: bool,
    pub timer: TimerView,
    pub upcoming: UpcomingView,
    pub calendar: CalendarView,
    pub daily: DailySummary,
    pub table: TablePage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerView {
    pub display: String,
    pub done_today: String,
    pub toggle_label: &'static str,
    pub phase: TimerPhase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpcomingView {
    pub title: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub day: u32,
    pub today: bool,
    pub selected: bool,
    pub has_tasks: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarView {
    pub title: String,
    /// Empty cells before day one, weeks starting on Sunday.
    pub leading_blanks: u32,
    pub days: Vec<CalendarDay>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySummary {
    pub label: String,
    pub count_label: String,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub id: String,
    pub name: String,
    pub date: String,
    pub time: String,
    pub reminder_status: ReminderStatus,
    pub reminder_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePage {
    pub rows: Vec<TaskRow>,
    pub summary: String,
    pub page: u32,
    pub total_pages: u32,
    pub has_prev: bool,
    pub has_next: bool,
}

const DAILY_PREVIEW: usize = 3;

pub fn build(state: &AppState, now: NaiveDateTime) -> ViewModel {
    ViewModel {
        theme: state.settings.theme,
        helper_mode: state.settings.helper_mode,
        timer: timer_view(state),
        upcoming: upcoming_view(&state.tasks, now),
        calendar: calendar_view(state, now.date()),
        daily: daily_summary(state),
        table: table_page(state),
    }
}

fn timer_view(state: &AppState) -> TimerView {
    let timer = &state.timer;
    TimerView {
        display: format_timer_display(timer.remaining_seconds),
        done_today: format!("{} Done Today", format_duration_hms(timer.done_today_seconds)),
        toggle_label: if timer.running { "Pause Timer" } else { "Start Timer" },
        phase: timer.phase(),
    }
}

fn upcoming_view(tasks: &[Task], now: NaiveDateTime) -> UpcomingView {
    let sorted = sorted_by_due(tasks.iter());
    let upcoming = sorted
        .iter()
        .find(|task| task.upcoming_deadline() >= now)
        .or_else(|| sorted.first());

    let Some(task) = upcoming else {
        return UpcomingView {
            title: "No tasks yet".to_string(),
            detail: "Plan something amazing today.".to_string(),
        };
    };

    let date = format_date_display(task.due_date);
    let detail = match task.due_time {
        Some(time) => format!("{date} • {}", format_time_display(time)),
        None => date,
    };
    UpcomingView {
        title: task.name.clone(),
        detail,
    }
}

fn calendar_view(state: &AppState, today: NaiveDate) -> CalendarView {
    let month = state.calendar.current_month;
    let next_month = shift_month(month, 1);
    let days_in_month = (next_month - month).num_days().max(0) as u32;

    let days = month
        .iter_days()
        .take(days_in_month as usize)
        .map(|date| CalendarDay {
            date,
            day: date.day(),
            today: date == today,
            selected: date == state.calendar.selected_date,
            has_tasks: state.tasks.iter().any(|task| task.due_date == date),
        })
        .collect();

    CalendarView {
        title: month.format("%B %Y").to_string(),
        leading_blanks: month.weekday().num_days_from_sunday(),
        days,
    }
}

fn daily_summary(state: &AppState) -> DailySummary {
    let selected = state.calendar.selected_date;
    let mut for_day: Vec<&Task> = state
        .tasks
        .iter()
        .filter(|task| task.due_date == selected)
        .collect();
    for_day.sort_by_key(|task| task.due_time);

    let count = for_day.len();
    DailySummary {
        label: selected.format("%A, %b %-d").to_string(),
        count_label: format!("{count} Task{} planned", if count == 1 { "" } else { "s" }),
        items: for_day
            .into_iter()
            .take(DAILY_PREVIEW)
            .map(|task| task.name.clone())
            .collect(),
    }
}

fn table_page(state: &AppState) -> TablePage {
    let filtered = search_filter(&state.tasks, &state.search);
    let sorted = sorted_by_due(filtered.into_iter());
    let total = sorted.len();

    let pagination = state.pagination;
    let total_pages = pagination.total_pages(total);
    let page = pagination.page.clamp(1, total_pages);
    let size = pagination.page_size.max(1) as usize;
    let start = (page as usize - 1) * size;

    let rows: Vec<TaskRow> = sorted
        .iter()
        .skip(start)
        .take(size)
        .map(|task| TaskRow {
            id: task.id.clone(),
            name: task.name.clone(),
            date: format_date_display(task.due_date),
            time: task.due_time.map(format_time_display).unwrap_or_default(),
            reminder_status: task.reminder_status,
            reminder_label: if task.reminder_label.is_empty() {
                "Not set".to_string()
            } else {
                task.reminder_label.clone()
            },
        })
        .collect();

    let first = if total == 0 { 0 } else { start + 1 };
    let last = total.min(start + rows.len());
    TablePage {
        summary: format!("{first} - {last} of {total}"),
        rows,
        page,
        total_pages,
        has_prev: page > 1,
        has_next: page < total_pages,
    }
}

/// Case-insensitive match over name and reminder label.
pub fn search_filter<'a>(tasks: &'a [Task], search: &str) -> Vec<&'a Task> {
    let term = search.trim().to_lowercase();
    tasks
        .iter()
        .filter(|task| {
            term.is_empty()
                || format!("{} {}", task.name, task.reminder_label)
                    .to_lowercase()
                    .contains(&term)
        })
        .collect()
}

fn sorted_by_due<'a>(tasks: impl Iterator<Item = &'a Task>) -> Vec<&'a Task> {
    let mut sorted: Vec<&Task> = tasks.collect();
    sorted.sort_by_key(|task| task.sort_key());
    sorted
}

/// `MM:SS`; minutes grow past 59 for long timers.
pub fn format_timer_display(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// `H:MM:SS`.
pub fn format_duration_hms(seconds: u64) -> String {
    format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// `DD-MM-YYYY`.
pub fn format_date_display(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

/// `9 AM`, `9:30 PM`, `12 PM`.
pub fn format_time_display(time: NaiveTime) -> String {
    let (is_pm, hour12) = time.hour12();
    let period = if is_pm { "PM" } else { "AM" };
    match time.minute() {
        0 => format!("{hour12} {period}"),
        minute => format!("{hour12}:{minute:02} {period}"),
    }
}
