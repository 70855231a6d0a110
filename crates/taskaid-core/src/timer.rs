use std::time::Duration;

use chrono::NaiveDate;
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  info
};

use crate::ticker::{
  TickDriver,
  TickHandle
};

/// Cadence of the tick driver.
pub const TICK_PERIOD: Duration =
  Duration::from_secs(1);

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum TimerPhase {
  Idle,
  Running,
  Paused
}

/// What a single tick did to the timer.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum TickOutcome {
  NotRunning,
  /// Less than a whole second since the
  /// last accepted tick; nothing moved.
  Absorbed,
  Advanced {
    elapsed_seconds: u64
  },
  Completed {
    credited_seconds: u32
  }
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
  #[serde(
    rename = "duration",
    alias = "durationSeconds"
  )]
  pub duration_seconds:   u32,
  #[serde(
    rename = "remaining",
    alias = "remainingSeconds"
  )]
  pub remaining_seconds:  u32,
  pub running:            bool,
  #[serde(
    rename = "lastTick",
    alias = "lastTickEpochMs"
  )]
  pub last_tick_ms:       Option<i64>,
  pub done_today_seconds: u64,
  pub done_today_date:    NaiveDate
}

impl TimerState {
  pub fn new(
    duration_seconds: u32,
    today: NaiveDate
  ) -> Self {
    let duration_seconds =
      duration_seconds.max(1);
    Self {
      duration_seconds,
      remaining_seconds: duration_seconds,
      running: false,
      last_tick_ms: None,
      done_today_seconds: 0,
      done_today_date: today
    }
  }

  pub fn phase(&self) -> TimerPhase {
    if self.running {
      TimerPhase::Running
    } else if self.remaining_seconds
      == self.duration_seconds
    {
      TimerPhase::Idle
    } else {
      TimerPhase::Paused
    }
  }

  /// Returns false when the timer was
  /// already running.
  pub fn start(
    &mut self,
    now_ms: i64
  ) -> bool {
    if self.running {
      return false;
    }
    self.running = true;
    self.last_tick_ms = Some(now_ms);
    true
  }

  /// Returns false when the timer was not
  /// running.
  pub fn pause(&mut self) -> bool {
    if !self.running {
      return false;
    }
    self.running = false;
    self.last_tick_ms = None;
    true
  }

  pub fn reset(&mut self) {
    self.running = false;
    self.remaining_seconds =
      self.duration_seconds;
    self.last_tick_ms = None;
  }

  /// Re-arms a timer that was running when
  /// the document was saved. Time spent
  /// while the app was closed is not
  /// counted.
  pub fn resume(
    &mut self,
    now_ms: i64
  ) -> bool {
    if !self.running {
      self.last_tick_ms = None;
      return false;
    }
    self.last_tick_ms = Some(now_ms);
    true
  }

  pub fn tick(
    &mut self,
    now_ms: i64
  ) -> TickOutcome {
    if !self.running {
      return TickOutcome::NotRunning;
    }

    let Some(last) = self.last_tick_ms
    else {
      self.last_tick_ms = Some(now_ms);
      return TickOutcome::Absorbed;
    };

    let delta = (now_ms - last)
      .div_euclid(1000);
    if delta <= 0 {
      return TickOutcome::Absorbed;
    }

    let elapsed = delta as u64;
    self.last_tick_ms = Some(now_ms);
    self.remaining_seconds = self
      .remaining_seconds
      .saturating_sub(
        u32::try_from(elapsed)
          .unwrap_or(u32::MAX)
      );

    if self.remaining_seconds > 0 {
      return TickOutcome::Advanced {
        elapsed_seconds: elapsed
      };
    }

    self.running = false;
    self.last_tick_ms = None;
    self.remaining_seconds =
      self.duration_seconds;
    self.done_today_seconds = self
      .done_today_seconds
      .saturating_add(u64::from(
        self.duration_seconds
      ));
    TickOutcome::Completed {
      credited_seconds: self
        .duration_seconds
    }
  }

  /// Zeroes the daily total when the
  /// calendar day changed. Idempotent.
  pub fn refresh_day(
    &mut self,
    today: NaiveDate
  ) -> bool {
    if self.done_today_date == today {
      return false;
    }
    debug!(
      previous = %self.done_today_date,
      %today,
      dropped = self.done_today_seconds,
      "day rolled over"
    );
    self.done_today_date = today;
    self.done_today_seconds = 0;
    true
  }
}

/// Owns the scheduled tick for the timer.
/// At most one handle is live at a time.
pub struct TimerEngine {
  driver: Box<dyn TickDriver>,
  handle: Option<TickHandle>
}

impl TimerEngine {
  pub fn new(
    driver: Box<dyn TickDriver>
  ) -> Self {
    Self {
      driver,
      handle: None
    }
  }

  pub fn is_ticking(&self) -> bool {
    self.handle.is_some()
  }

  /// Starts the tick loop unless one is
  /// already active.
  pub fn ensure_ticking(
    &mut self
  ) -> bool {
    if self.handle.is_some() {
      return false;
    }
    info!(
      period_ms =
        TICK_PERIOD.as_millis() as u64,
      "starting tick loop"
    );
    self.handle =
      Some(self.driver.spawn(TICK_PERIOD));
    true
  }

  pub fn stop_ticking(&mut self) -> bool {
    match self.handle.take() {
      | Some(handle) => {
        handle.cancel();
        info!("stopped tick loop");
        true
      }
      | None => false
    }
  }
}

impl Drop for TimerEngine {
  fn drop(&mut self) {
    self.stop_ticking();
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    TickOutcome,
    TimerEngine,
    TimerPhase,
    TimerState
  };
  use crate::testing::ManualTickDriver;

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 17)
      .expect("valid date")
  }

  #[test]
  fn start_and_pause_are_idempotent() {
    let mut timer =
      TimerState::new(1500, today());
    assert_eq!(
      timer.phase(),
      TimerPhase::Idle
    );
    assert!(timer.start(1_000));
    assert!(!timer.start(9_000));
    assert_eq!(
      timer.last_tick_ms,
      Some(1_000)
    );

    assert!(timer.pause());
    assert!(!timer.pause());
    assert_eq!(timer.last_tick_ms, None);
  }

  #[test]
  fn sub_second_ticks_are_absorbed() {
    let mut timer =
      TimerState::new(1500, today());
    timer.start(10_000);

    for now in [10_000, 10_400, 10_999] {
      assert_eq!(
        timer.tick(now),
        TickOutcome::Absorbed
      );
      assert_eq!(
        timer.last_tick_ms,
        Some(10_000)
      );
      assert_eq!(
        timer.remaining_seconds,
        1500
      );
    }

    assert_eq!(
      timer.tick(11_000),
      TickOutcome::Advanced {
        elapsed_seconds: 1
      }
    );
    assert_eq!(
      timer.remaining_seconds,
      1499
    );
  }

  #[test]
  fn backwards_clock_is_absorbed() {
    let mut timer =
      TimerState::new(60, today());
    timer.start(50_000);
    assert_eq!(
      timer.tick(20_000),
      TickOutcome::Absorbed
    );
    assert_eq!(
      timer.last_tick_ms,
      Some(50_000)
    );
  }

  #[test]
  fn late_tick_counts_every_missed_second()
  {
    let mut timer =
      TimerState::new(1500, today());
    timer.start(0);
    assert_eq!(
      timer.tick(61_500),
      TickOutcome::Advanced {
        elapsed_seconds: 61
      }
    );
    assert_eq!(
      timer.remaining_seconds,
      1500 - 61
    );
    assert_eq!(
      timer.phase(),
      TimerPhase::Running
    );
    timer.pause();
    assert_eq!(
      timer.phase(),
      TimerPhase::Paused
    );
  }

  #[test]
  fn completion_credits_full_duration() {
    let mut timer =
      TimerState::new(1500, today());
    timer.done_today_seconds = 300;
    timer.start(0);

    assert_eq!(
      timer.tick(1_500_000),
      TickOutcome::Completed {
        credited_seconds: 1500
      }
    );
    assert!(!timer.running);
    assert_eq!(
      timer.remaining_seconds,
      1500
    );
    assert_eq!(
      timer.done_today_seconds,
      1800
    );
    assert_eq!(timer.last_tick_ms, None);
    assert_eq!(
      timer.phase(),
      TimerPhase::Idle
    );
  }

  #[test]
  fn overshoot_still_credits_duration_once()
  {
    let mut timer =
      TimerState::new(10, today());
    timer.start(0);
    timer.tick(4_000);
    assert_eq!(
      timer.tick(3_600_000),
      TickOutcome::Completed {
        credited_seconds: 10
      }
    );
    assert_eq!(
      timer.done_today_seconds,
      10
    );
    assert_eq!(
      timer.tick(3_700_000),
      TickOutcome::NotRunning
    );
  }

  #[test]
  fn completion_saturates_daily_total() {
    let mut timer =
      TimerState::new(60, today());
    timer.done_today_seconds = u64::MAX;
    timer.start(0);
    assert_eq!(
      timer.tick(61_000),
      TickOutcome::Completed {
        credited_seconds: 60
      }
    );
    assert_eq!(
      timer.done_today_seconds,
      u64::MAX
    );
  }

  #[test]
  fn refresh_day_is_idempotent() {
    let mut timer = TimerState::new(
      60,
      NaiveDate::from_ymd_opt(2026, 10, 16)
        .expect("valid date")
    );
    timer.done_today_seconds = 3600;

    assert!(timer.refresh_day(today()));
    assert_eq!(
      timer.done_today_seconds,
      0
    );
    timer.done_today_seconds = 60;
    assert!(!timer.refresh_day(today()));
    assert_eq!(
      timer.done_today_seconds,
      60
    );
  }

  #[test]
  fn reset_restores_duration() {
    let mut timer =
      TimerState::new(1500, today());
    timer.start(0);
    timer.tick(100_000);
    timer.reset();
    assert!(!timer.running);
    assert_eq!(
      timer.remaining_seconds,
      1500
    );
    assert_eq!(timer.last_tick_ms, None);
  }

  #[test]
  fn engine_keeps_a_single_tick_handle() {
    let driver =
      ManualTickDriver::default();
    let mut engine = TimerEngine::new(
      Box::new(driver.clone())
    );

    assert!(engine.ensure_ticking());
    assert!(!engine.ensure_ticking());
    assert_eq!(driver.active(), 1);
    assert_eq!(driver.spawned(), 1);

    assert!(engine.stop_ticking());
    assert!(!engine.stop_ticking());
    assert_eq!(driver.active(), 0);

    engine.ensure_ticking();
    drop(engine);
    assert_eq!(driver.active(), 0);
    assert_eq!(driver.spawned(), 2);
  }
}
