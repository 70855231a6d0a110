use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::event::Trigger;
use crate::task::ReminderStatus;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskaid",
    version,
    about = "Desktop Task Aid: tasks, calendar and a focus timer",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "taskaidrc")]
    pub taskaidrc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    /// Render the one-line timer instead of the dashboard.
    #[arg(long = "compact", global = true)]
    pub compact: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Render the dashboard.
    Show,
    /// Add a task.
    Add(TaskFields),
    /// Edit a task by id or unique id prefix. Without fields, prints the
    /// prefilled form.
    Edit {
        id: String,
        #[command(flatten)]
        fields: TaskEdits,
    },
    /// Delete a task by id or unique id prefix.
    Delete { id: String },
    /// Filter the task table; no terms clears the search.
    Search { terms: Vec<String> },
    /// Move through the task table.
    Page { direction: Direction },
    /// Rows per table page.
    Rows {
        #[arg(value_parser = ["5", "10", "20", "50"])]
        size: String,
    },
    #[command(subcommand)]
    Calendar(CalendarCommand),
    /// Set or toggle the theme.
    Theme { theme: Option<ThemeArg> },
    /// Toggle helper mode.
    Helper,
    #[command(subcommand)]
    Timer(TimerCommand),
    /// Apply one shell trigger (quick-add, timer-start, ...).
    Trigger {
        #[arg(value_parser = parse_trigger)]
        name: Trigger,
    },
    /// Read triggers from stdin, one per line, while the timer ticks.
    Session,
    /// Calendar sync.
    Sync,
    /// Table filters.
    Filters,
    /// Delete the stored document and start from defaults.
    Forget,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct TaskFields {
    #[arg(long)]
    pub name: String,
    /// YYYY-MM-DD
    #[arg(long)]
    pub date: String,
    /// HH:MM, 24-hour
    #[arg(long)]
    pub time: Option<String>,
    #[arg(long, value_parser = parse_status)]
    pub status: Option<ReminderStatus>,
    #[arg(long)]
    pub label: Option<String>,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskEdits {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub date: Option<String>,
    /// HH:MM; an empty value clears the time.
    #[arg(long)]
    pub time: Option<String>,
    #[arg(long, value_parser = parse_status)]
    pub status: Option<ReminderStatus>,
    #[arg(long)]
    pub label: Option<String>,
}

impl TaskEdits {
    pub fn is_empty(&self) -> bool {
        *self == TaskEdits::default()
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CalendarCommand {
    Next,
    Prev,
    /// Select a day (YYYY-MM-DD) and jump to its month.
    Select {
        #[arg(value_parser = parse_date)]
        date: NaiveDate,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    Start,
    Pause,
    Toggle,
    Reset,
    /// Tick until the running timer completes or a signal arrives.
    Run,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeArg {
    Light,
    Dark,
    Toggle,
}

fn parse_trigger(s: &str) -> anyhow::Result<Trigger> {
    s.parse()
}

fn parse_status(s: &str) -> anyhow::Result<ReminderStatus> {
    s.parse()
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    crate::clock::parse_iso_date(s).ok_or_else(|| anyhow!("expected YYYY-MM-DD, got: {s}"))
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls `rc.key=value` and `rc.key:value` tokens out of the argument
/// list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use clap::Parser;

    use super::{Command, GlobalCli, TimerCommand, preprocess_args};
    use crate::event::Trigger;

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_rc_overrides_are_extracted() {
        let pre = preprocess_args(&args(&["taskaid", "rc.timer.minutes=50", "timer", "rc.color:off", "start"]))
            .expect("preprocess");
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.timer.minutes".to_string(), "50".to_string()),
                ("rc.color".to_string(), "off".to_string())
            ]
        );

        let cli = GlobalCli::try_parse_from(pre.cleaned_args).expect("parse");
        assert_eq!(cli.command, Some(Command::Timer(TimerCommand::Start)));
    }

    #[test]
    fn parses_task_and_trigger_commands() {
        let cli = GlobalCli::try_parse_from(args(&[
            "taskaid", "-vv", "add", "--name", "Review", "--date", "2026-10-20", "--time", "14:30",
        ]))
        .expect("parse");
        assert_eq!(cli.verbose, 2);
        let Some(Command::Add(fields)) = cli.command else {
            panic!("expected add");
        };
        assert_eq!(fields.time.as_deref(), Some("14:30"));

        let cli = GlobalCli::try_parse_from(args(&["taskaid", "trigger", "trigger-timer-reset"])).expect("parse");
        assert_eq!(cli.command, Some(Command::Trigger { name: Trigger::TimerReset }));

        assert!(GlobalCli::try_parse_from(args(&["taskaid", "rows", "7"])).is_err());
        assert!(GlobalCli::try_parse_from(args(&["taskaid"])).expect("parse").command.is_none());
    }
}
