use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{
  Deserialize,
  Serialize
};

/// Inbound actions raised by the desktop
/// shell (tray menu, global hotkeys).
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Trigger {
  QuickAdd,
  TimerStart,
  TimerPause,
  TimerToggle,
  TimerReset
}

impl Trigger {
  pub const ALL: [Trigger; 5] = [
    Trigger::QuickAdd,
    Trigger::TimerStart,
    Trigger::TimerPause,
    Trigger::TimerToggle,
    Trigger::TimerReset
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      | Trigger::QuickAdd => "quick-add",
      | Trigger::TimerStart => {
        "timer-start"
      }
      | Trigger::TimerPause => {
        "timer-pause"
      }
      | Trigger::TimerToggle => {
        "timer-toggle"
      }
      | Trigger::TimerReset => {
        "timer-reset"
      }
    }
  }
}

impl fmt::Display for Trigger {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Trigger {
  type Err = anyhow::Error;

  /// Accepts both the bare name and the
  /// shell's `trigger-` channel form.
  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let name = s.trim();
    let name = name
      .strip_prefix("trigger-")
      .unwrap_or(name);
    Trigger::ALL
      .into_iter()
      .find(|trigger| {
        trigger.as_str() == name
      })
      .ok_or_else(|| {
        anyhow!("unknown trigger: {s}")
      })
  }
}

/// Signals sent back to the desktop
/// shell.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Outbound {
  TimerCompleted
}

impl Outbound {
  pub fn as_str(self) -> &'static str {
    match self {
      | Outbound::TimerCompleted => {
        "timer-completed"
      }
    }
  }
}

/// Everything the event loop applies to
/// the state, one at a time.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum AppEvent {
  Tick,
  Trigger(Trigger),
  Shutdown
}
