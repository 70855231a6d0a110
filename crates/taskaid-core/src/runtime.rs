use std::ops::ControlFlow;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::event::{AppEvent, Trigger};

/// When [`run_event_loop`] returns on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Until {
  /// As soon as the timer stops ticking.
  TimerStopped,
  /// Only on shutdown or when every sender is gone.
  Closed,
}

/// Applies events to the app one at a time. Returns after a shutdown
/// event has been handled, when the channel closes, or per `until`.
#[tracing::instrument(skip(app, events))]
pub async fn run_event_loop(app: &mut App, events: &mut UnboundedReceiver<AppEvent>, until: Until) {
  if until == Until::TimerStopped && !app.is_ticking() {
    debug!("timer not ticking; nothing to wait for");
    return;
  }

  while let Some(event) = events.recv().await {
    if let ControlFlow::Break(()) = app.handle(event) {
      return;
    }
    if until == Until::TimerStopped && !app.is_ticking() {
      debug!("timer stopped; leaving event loop");
      return;
    }
  }
  debug!("event channel closed");
}

/// Sends [`AppEvent::Shutdown`] on SIGINT or SIGTERM.
pub fn install_signal_handlers(events: UnboundedSender<AppEvent>) {
  tokio::spawn(async move {
    wait_for_shutdown_signal().await;
    warn!("received shutdown signal; stopping");
    let _ = events.send(AppEvent::Shutdown);
  });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
  use tokio::signal::unix::{SignalKind, signal};

  let mut sigint = match signal(SignalKind::interrupt()) {
    Ok(stream) => stream,
    Err(error) => {
      error!(%error, "failed to register SIGINT handler; falling back to ctrl_c");
      let _ = tokio::signal::ctrl_c().await;
      return;
    }
  };

  let mut sigterm = match signal(SignalKind::terminate()) {
    Ok(stream) => stream,
    Err(error) => {
      error!(%error, "failed to register SIGTERM handler; falling back to ctrl_c");
      let _ = tokio::signal::ctrl_c().await;
      return;
    }
  };

  tokio::select! {
    _ = sigint.recv() => {}
    _ = sigterm.recv() => {}
  }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
  if let Err(error) = tokio::signal::ctrl_c().await {
    error!(%error, "failed waiting for ctrl_c signal");
  }
}

/// Forwards one trigger per input line. Unknown names are logged and
/// skipped; end of input requests shutdown.
pub fn spawn_trigger_reader<R>(input: R, events: UnboundedSender<AppEvent>)
where
  R: AsyncRead + Unpin + Send + 'static,
{
  tokio::spawn(async move {
    let mut lines = BufReader::new(input).lines();
    loop {
      match lines.next_line().await {
        Ok(Some(line)) => {
          let line = line.trim();
          if line.is_empty() || line.starts_with('#') {
            continue;
          }
          match line.parse::<Trigger>() {
            Ok(trigger) => {
              debug!(%trigger, "trigger received");
              if events.send(AppEvent::Trigger(trigger)).is_err() {
                return;
              }
            }
            Err(err) => warn!(input = %line, error = %err, "ignoring unknown trigger"),
          }
        }
        Ok(None) => {
          info!("trigger input closed");
          break;
        }
        Err(err) => {
          error!(error = %err, "failed reading triggers");
          break;
        }
      }
    }
    let _ = events.send(AppEvent::Shutdown);
  });
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use chrono::NaiveDate;
  use tokio::sync::mpsc;

  use super::{Until, run_event_loop, spawn_trigger_reader};
  use crate::app::{App, AppParts};
  use crate::event::{AppEvent, Outbound};
  use crate::state::StateDefaults;
  use crate::storage::{MemoryStore, Storage};
  use crate::testing::{ManualClock, RecordingShell, RecordingView};
  use crate::ticker::TokioTickDriver;

  fn app(events: mpsc::UnboundedSender<AppEvent>, clock: ManualClock, shell: RecordingShell) -> App {
    App::start(AppParts {
      storage: Storage::new(Box::new(MemoryStore::default())),
      driver: Box::new(TokioTickDriver::new(tokio::runtime::Handle::current(), events)),
      clock: Box::new(clock),
      shell: Box::new(shell),
      view: Box::new(RecordingView::default()),
      defaults: StateDefaults {
        timer_seconds: 3,
        page_size: 10,
      },
    })
  }

  fn morning() -> ManualClock {
    ManualClock::at(
      NaiveDate::from_ymd_opt(2026, 10, 17)
        .and_then(|d| d.and_hms_opt(9, 0, 0))
        .expect("valid time"),
    )
  }

  #[tokio::test(start_paused = true)]
  async fn tick_driver_runs_timer_to_completion() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let clock = morning();
    let shell = RecordingShell::default();
    let mut app = app(tx.clone(), clock.clone(), shell.clone());

    app.start_timer();
    assert!(app.is_ticking());

    let ticker = {
      let clock = clock.clone();
      tokio::spawn(async move {
        loop {
          tokio::time::sleep(Duration::from_millis(250)).await;
          clock.advance(Duration::from_millis(250));
        }
      })
    };

    run_event_loop(&mut app, &mut rx, Until::TimerStopped).await;
    ticker.abort();

    assert!(!app.is_ticking());
    assert!(!app.state().timer.running);
    assert_eq!(app.state().timer.remaining_seconds, 3);
    assert_eq!(app.state().timer.done_today_seconds, 3);
    assert_eq!(shell.signals(), vec![Outbound::TimerCompleted]);
  }

  #[tokio::test(start_paused = true)]
  async fn triggers_from_input_then_shutdown() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let shell = RecordingShell::default();
    let mut app = app(tx.clone(), morning(), shell.clone());

    let input: &[u8] = b"timer-start\nbogus\n# comment\ntrigger-timer-pause\nquick-add\n";
    spawn_trigger_reader(input, tx);

    run_event_loop(&mut app, &mut rx, Until::Closed).await;

    assert!(!app.state().timer.running);
    assert!(!app.is_ticking());
    assert_eq!(shell.forms(), vec![None]);
  }
}
