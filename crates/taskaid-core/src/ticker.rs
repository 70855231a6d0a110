use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{
  Instant,
  MissedTickBehavior
};
use tracing::{
  debug,
  trace
};

use crate::event::AppEvent;

/// Schedules a repeating tick.
pub trait TickDriver {
  fn spawn(
    &self,
    period: Duration
  ) -> TickHandle;
}

/// A scheduled tick; cancelled explicitly
/// or when dropped.
pub struct TickHandle {
  cancel: Option<Box<dyn FnOnce()>>
}

impl TickHandle {
  pub fn new(
    cancel: impl FnOnce() + 'static
  ) -> Self {
    Self {
      cancel: Some(Box::new(cancel))
    }
  }

  pub fn cancel(mut self) {
    if let Some(cancel) =
      self.cancel.take()
    {
      cancel();
    }
  }
}

impl Drop for TickHandle {
  fn drop(&mut self) {
    if let Some(cancel) =
      self.cancel.take()
    {
      cancel();
    }
  }
}

/// Ticks from a tokio task, delivered to
/// the event loop as [`AppEvent::Tick`].
#[derive(Clone)]
pub struct TokioTickDriver {
  runtime: Handle,
  events:  UnboundedSender<AppEvent>
}

impl TokioTickDriver {
  pub fn new(
    runtime: Handle,
    events: UnboundedSender<AppEvent>
  ) -> Self {
    Self {
      runtime,
      events
    }
  }
}

impl TickDriver for TokioTickDriver {
  fn spawn(
    &self,
    period: Duration
  ) -> TickHandle {
    let events = self.events.clone();
    let task =
      self.runtime.spawn(async move {
        let mut interval =
          tokio::time::interval_at(
            Instant::now() + period,
            period
          );
        interval.set_missed_tick_behavior(
          MissedTickBehavior::Delay
        );
        loop {
          interval.tick().await;
          trace!("tick");
          if events
            .send(AppEvent::Tick)
            .is_err()
          {
            debug!(
              "event loop gone; stopping \
               tick task"
            );
            break;
          }
        }
      });

    TickHandle::new(move || task.abort())
  }
}
