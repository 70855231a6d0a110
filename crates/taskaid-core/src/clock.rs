use chrono::{
  DateTime,
  Datelike,
  Local,
  NaiveDate,
  NaiveDateTime,
  Utc
};

/// Wall-clock source for the timer and the
/// day-rollover check.
pub trait Clock {
  /// Milliseconds since the unix epoch.
  fn now_ms(&self) -> i64;

  /// Local wall-clock time, used for "today"
  /// and for due-date comparisons.
  fn local_now(&self) -> NaiveDateTime;

  fn today(&self) -> NaiveDate {
    self.local_now().date()
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now_ms(&self) -> i64 {
    Utc::now().timestamp_millis()
  }

  fn local_now(&self) -> NaiveDateTime {
    Local::now().naive_local()
  }
}

/// Formats a date the way the persisted
/// document stores it.
pub fn iso_date(date: NaiveDate) -> String {
  date.format("%Y-%m-%d").to_string()
}

pub fn parse_iso_date(
  raw: &str
) -> Option<NaiveDate> {
  NaiveDate::parse_from_str(
    raw.trim(),
    "%Y-%m-%d"
  )
  .ok()
}

pub fn first_of_month(
  date: NaiveDate
) -> NaiveDate {
  date.with_day0(0).unwrap_or(date)
}

/// Moves a first-of-month date by `offset`
/// months, staying on day one.
pub fn shift_month(
  month: NaiveDate,
  offset: i32
) -> NaiveDate {
  let index = month.year() * 12
    + month.month0() as i32
    + offset;
  let year = index.div_euclid(12);
  let month0 = index.rem_euclid(12) as u32;
  NaiveDate::from_ymd_opt(
    year,
    month0 + 1,
    1
  )
  .unwrap_or(month)
}

pub(crate) fn utc_from_ms(
  ms: i64
) -> NaiveDateTime {
  DateTime::<Utc>::from_timestamp_millis(
    ms
  )
  .unwrap_or_default()
  .naive_utc()
}
