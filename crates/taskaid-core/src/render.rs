use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::state::Theme;
use crate::task::ReminderStatus;
use crate::timer::TimerPhase;
use crate::view::{CalendarView, TablePage, View, ViewModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Timer, upcoming task, calendar, daily summary and task table.
    Dashboard,
    /// One timer line per frame.
    Compact,
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    layout: Layout,
}

impl Renderer {
    pub fn new(cfg: &Config, layout: Layout) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
            layout,
        })
    }

    pub fn plain(layout: Layout) -> Self {
        Self {
            color: false,
            layout,
        }
    }

    #[tracing::instrument(skip(self, out, view))]
    pub fn write_dashboard<W: Write>(&self, mut out: W, view: &ViewModel) -> anyhow::Result<()> {
        let accent = match view.theme {
            Theme::Light => "34",
            Theme::Dark => "35",
        };

        writeln!(
            out,
            "{}  {}  [{}]",
            self.paint(&view.timer.display, &format!("1;{accent}")),
            view.timer.done_today,
            view.timer.toggle_label
        )?;
        writeln!(out)?;

        writeln!(out, "{}", self.paint("Upcoming", "1"))?;
        writeln!(out, "  {}", view.upcoming.title)?;
        writeln!(out, "  {}", view.upcoming.detail)?;
        writeln!(out)?;

        self.write_calendar(&mut out, &view.calendar)?;
        writeln!(out)?;

        writeln!(out, "{}", self.paint(&view.daily.label, "1"))?;
        writeln!(out, "  {}", view.daily.count_label)?;
        if view.daily.items.is_empty() {
            writeln!(out, "  No tasks planned")?;
        }
        for item in &view.daily.items {
            writeln!(out, "  - {item}")?;
        }
        writeln!(out)?;

        self.write_task_table(&mut out, &view.table)?;

        if view.helper_mode {
            writeln!(out)?;
            writeln!(
                out,
                "{}",
                self.paint(
                    "Hint: `taskaid timer toggle` starts or pauses the focus timer; `taskaid add` plans a task.",
                    "2"
                )
            )?;
        }
        Ok(())
    }

    pub fn write_compact<W: Write>(&self, mut out: W, view: &ViewModel) -> anyhow::Result<()> {
        let phase = match view.timer.phase {
            TimerPhase::Idle => "idle",
            TimerPhase::Running => "running",
            TimerPhase::Paused => "paused",
        };
        writeln!(
            out,
            "{} {}  {}",
            self.paint(&view.timer.display, "1"),
            phase,
            view.timer.done_today
        )?;
        Ok(())
    }

    fn write_calendar<W: Write>(&self, out: &mut W, calendar: &CalendarView) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&calendar.title, "1"))?;
        writeln!(out, " Su  Mo  Tu  We  Th  Fr  Sa")?;

        let mut column = calendar.leading_blanks;
        write!(out, "{}", "    ".repeat(column as usize))?;
        for day in &calendar.days {
            let marker = if day.has_tasks { '*' } else { ' ' };
            let cell = format!("{:>3}{marker}", day.day);
            let cell = if day.selected {
                self.paint(&cell, "7")
            } else if day.today {
                self.paint(&cell, "1;4")
            } else {
                cell
            };
            write!(out, "{cell}")?;
            column += 1;
            if column == 7 {
                writeln!(out)?;
                column = 0;
            }
        }
        if column != 0 {
            writeln!(out)?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, out, table))]
    pub fn write_task_table<W: Write>(&self, mut out: W, table: &TablePage) -> anyhow::Result<()> {
        let headers = vec![
            "ID".to_string(),
            "Task".to_string(),
            "Date".to_string(),
            "Time".to_string(),
            "Reminder".to_string(),
        ];

        let rows = table
            .rows
            .iter()
            .map(|row| {
                let id: String = row.id.chars().take(8).collect();
                let reminder = match row.reminder_status {
                    ReminderStatus::Active => self.paint(&row.reminder_label, "32"),
                    ReminderStatus::Overdue => self.paint(&row.reminder_label, "31"),
                    ReminderStatus::Unset => row.reminder_label.clone(),
                };
                vec![
                    self.paint(&id, "33"),
                    row.name.clone(),
                    row.date.clone(),
                    row.time.clone(),
                    reminder,
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        writeln!(
            out,
            "{}  page {}/{}{}{}",
            table.summary,
            table.page,
            table.total_pages,
            if table.has_prev { "  < prev" } else { "" },
            if table.has_next { "  next >" } else { "" }
        )?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

impl View for Renderer {
    fn render(&mut self, view: &ViewModel) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        match self.layout {
            Layout::Dashboard => self.write_dashboard(out, view),
            Layout::Compact => self.write_compact(out, view),
        }
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
