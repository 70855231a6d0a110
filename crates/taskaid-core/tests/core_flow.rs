use std::time::Duration;

use chrono::NaiveDate;
use serde_json::json;
use taskaid_core::app::{App, AppParts};
use taskaid_core::event::{Outbound, Trigger};
use taskaid_core::state::{STORAGE_KEY, StateDefaults, Upsert};
use taskaid_core::storage::{FileStore, MemoryStore, Storage};
use taskaid_core::task::{TaskDraft, TaskValidationError};
use taskaid_core::testing::{ManualClock, ManualTickDriver, RecordingShell, RecordingView};
use taskaid_core::timer::{TickOutcome, TimerPhase};
use tempfile::tempdir;

struct Harness {
    app: App,
    clock: ManualClock,
    driver: ManualTickDriver,
    shell: RecordingShell,
    view: RecordingView,
}

fn morning() -> ManualClock {
    ManualClock::at(
        NaiveDate::from_ymd_opt(2026, 10, 17)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .expect("valid time"),
    )
}

fn harness_with(storage: Storage, clock: ManualClock) -> Harness {
    let driver = ManualTickDriver::default();
    let shell = RecordingShell::default();
    let view = RecordingView::default();
    let app = App::start(AppParts {
        storage,
        driver: Box::new(driver.clone()),
        clock: Box::new(clock.clone()),
        shell: Box::new(shell.clone()),
        view: Box::new(view.clone()),
        defaults: StateDefaults::default(),
    });
    Harness {
        app,
        clock,
        driver,
        shell,
        view,
    }
}

fn harness() -> Harness {
    harness_with(Storage::new(Box::new(MemoryStore::default())), morning())
}

fn draft(name: &str, date: &str) -> TaskDraft {
    TaskDraft {
        name: name.to_string(),
        due_date: date.to_string(),
        ..TaskDraft::default()
    }
}

#[test]
fn focus_session_completes_and_credits_duration() {
    let mut h = harness();
    assert_eq!(h.app.state().timer.duration_seconds, 1500);

    h.app.start_timer();
    assert_eq!(h.driver.active(), 1);

    h.clock.advance(Duration::from_secs(1500));
    assert_eq!(
        h.app.tick(),
        TickOutcome::Completed {
            credited_seconds: 1500
        }
    );

    let timer = &h.app.state().timer;
    assert!(!timer.running);
    assert_eq!(timer.remaining_seconds, 1500);
    assert_eq!(timer.done_today_seconds, 1500);
    assert_eq!(h.driver.active(), 0);
    assert_eq!(h.shell.signals(), vec![Outbound::TimerCompleted]);
    assert_eq!(h.shell.notifications()[0].title, "Timer Completed!");

    let last = h.view.last().expect("rendered");
    assert_eq!(last.timer.display, "25:00");
    assert_eq!(last.timer.done_today, "0:25:00 Done Today");
    assert_eq!(last.timer.toggle_label, "Start Timer");
}

#[test]
fn only_whole_second_ticks_persist_and_render() {
    let mut h = harness();
    h.app.start_timer();
    let frames = h.view.frames();

    h.clock.advance_ms(400);
    assert_eq!(h.app.tick(), TickOutcome::Absorbed);
    assert_eq!(h.view.frames(), frames);
    h.clock.advance_ms(700);
    assert_eq!(h.app.tick(), TickOutcome::Advanced { elapsed_seconds: 1 });
    assert_eq!(h.app.state().timer.remaining_seconds, 1499);
    assert_eq!(h.view.frames(), frames + 1);
    assert_eq!(h.view.last().expect("rendered").timer.display, "24:59");
}

#[test]
fn reset_while_running_cancels_the_tick_loop() {
    let mut h = harness();
    h.app.start_timer();
    h.app.start_timer();
    assert_eq!(h.driver.spawned(), 1);

    h.clock.advance(Duration::from_secs(90));
    h.app.tick();
    assert_eq!(h.app.state().timer.phase(), TimerPhase::Running);

    h.app.reset_timer();
    assert!(!h.app.state().timer.running);
    assert_eq!(h.app.state().timer.remaining_seconds, 1500);
    assert_eq!(h.app.state().timer.last_tick_ms, None);
    assert_eq!(h.driver.active(), 0);
    assert!(!h.app.is_ticking());
}

#[test]
fn pause_and_toggle_keep_remaining_time() {
    let mut h = harness();
    h.app.toggle_timer();
    h.clock.advance(Duration::from_secs(60));
    h.app.tick();
    h.app.toggle_timer();

    assert_eq!(h.app.state().timer.phase(), TimerPhase::Paused);
    assert_eq!(h.driver.active(), 0);

    h.clock.advance(Duration::from_secs(600));
    assert_eq!(h.app.tick(), TickOutcome::NotRunning);
    assert_eq!(h.app.state().timer.remaining_seconds, 1440);

    h.app.toggle_timer();
    assert_eq!(h.driver.active(), 1);
    assert_eq!(h.driver.spawned(), 2);
}

#[test]
fn empty_name_is_rejected_with_a_message() {
    let mut h = harness();
    let before = h.app.state().tasks.clone();

    let err = h.app.save_task(draft("  ", "2026-10-20")).expect_err("rejected");
    assert_eq!(err, TaskValidationError::MissingRequired);
    assert_eq!(h.app.state().tasks, before);
    assert_eq!(
        h.shell.last_toast().as_deref(),
        Some("Please complete required fields.")
    );
}

#[test]
fn task_crud_toasts_and_keeps_creation_stamp() {
    let mut h = harness();
    let count = h.app.state().tasks.len();

    assert_eq!(h.app.save_task(draft("Review PR", "2026-10-20")), Ok(Upsert::Added));
    assert_eq!(h.shell.last_toast().as_deref(), Some("Task added."));
    let added = h.app.state().tasks.last().cloned().expect("task");
    assert_eq!(added.reminder_label, "Reminder set");

    h.clock.advance(Duration::from_secs(3600));
    let mut edit = TaskDraft::from_task(&added);
    edit.due_time = "14:30".to_string();
    assert_eq!(h.app.save_task(edit), Ok(Upsert::Updated));
    assert_eq!(h.shell.last_toast().as_deref(), Some("Task updated."));

    let updated = h.app.state().task(&added.id).cloned().expect("task");
    assert_eq!(updated.created_at, added.created_at);
    assert_eq!(h.app.state().tasks.len(), count + 1);

    assert!(h.app.delete_task(&added.id));
    assert!(!h.app.delete_task(&added.id));
    assert_eq!(h.shell.last_toast().as_deref(), Some("Task deleted."));
    assert_eq!(h.app.state().tasks.len(), count);
}

#[test]
fn day_rollover_resets_daily_total_once() {
    let store = MemoryStore::default();
    store.insert_raw(
        STORAGE_KEY,
        &json!({
            "timer": {"duration": 1500, "remaining": 1500, "running": false,
                      "doneTodaySeconds": 4200, "doneTodayDate": "2026-10-16"}
        })
        .to_string(),
    );
    let mut h = harness_with(Storage::new(Box::new(store)), morning());
    assert_eq!(h.app.state().timer.done_today_seconds, 4200);

    h.app.render();
    assert_eq!(h.app.state().timer.done_today_seconds, 0);
    assert_eq!(
        h.app.state().timer.done_today_date,
        NaiveDate::from_ymd_opt(2026, 10, 17).expect("date")
    );
    assert_eq!(
        h.view.last().expect("rendered").timer.done_today,
        "0:00:00 Done Today"
    );
}

#[test]
fn absorbed_tick_leaves_stored_document_alone() {
    let store = MemoryStore::default();
    let mut h = harness_with(Storage::new(Box::new(store.clone())), morning());
    h.app.start_timer();
    let saved = store.raw(STORAGE_KEY);

    h.clock.advance_ms(999);
    assert_eq!(h.app.tick(), TickOutcome::Absorbed);
    assert_eq!(store.raw(STORAGE_KEY), saved);
}

#[test]
fn running_timer_crossing_midnight_starts_a_new_daily_total() {
    let late = ManualClock::at(
        NaiveDate::from_ymd_opt(2026, 10, 17)
            .and_then(|d| d.and_hms_opt(23, 59, 0))
            .expect("valid time"),
    );
    let store = MemoryStore::default();
    store.insert_raw(
        STORAGE_KEY,
        &json!({
            "timer": {"duration": 1500, "remaining": 1500, "running": false,
                      "doneTodaySeconds": 3000, "doneTodayDate": "2026-10-17"}
        })
        .to_string(),
    );
    let mut h = harness_with(Storage::new(Box::new(store)), late);
    h.app.start_timer();

    h.clock.advance(Duration::from_secs(30));
    h.app.tick();
    assert_eq!(h.app.state().timer.done_today_seconds, 3000);

    h.clock.advance(Duration::from_secs(60));
    assert_eq!(h.app.tick(), TickOutcome::Advanced { elapsed_seconds: 60 });
    let timer = &h.app.state().timer;
    assert_eq!(timer.done_today_seconds, 0);
    assert_eq!(
        timer.done_today_date,
        NaiveDate::from_ymd_opt(2026, 10, 18).expect("date")
    );
    assert_eq!(timer.remaining_seconds, 1410);
    assert!(timer.running);
}

#[test]
fn huge_stored_daily_total_does_not_break_completion() {
    let store = MemoryStore::default();
    store.insert_raw(
        STORAGE_KEY,
        &json!({
            "timer": {"duration": 60, "remaining": 60,
                      "doneTodaySeconds": u64::MAX, "doneTodayDate": "2026-10-17"}
        })
        .to_string(),
    );
    let mut h = harness_with(Storage::new(Box::new(store)), morning());
    assert_eq!(h.app.state().timer.done_today_seconds, u64::MAX);

    h.app.start_timer();
    h.clock.advance(Duration::from_secs(61));
    assert_eq!(h.app.tick(), TickOutcome::Completed { credited_seconds: 60 });
    assert_eq!(h.app.state().timer.done_today_seconds, u64::MAX);
    assert!(!h.app.state().timer.running);
}

#[test]
fn triggers_map_to_actions() {
    let mut h = harness();
    h.app.trigger(Trigger::TimerStart);
    assert!(h.app.state().timer.running);
    h.app.trigger(Trigger::TimerToggle);
    assert!(!h.app.state().timer.running);
    h.app.trigger(Trigger::TimerToggle);
    h.app.trigger(Trigger::TimerPause);
    assert!(!h.app.state().timer.running);
    h.app.trigger(Trigger::TimerReset);
    assert_eq!(h.app.state().timer.phase(), TimerPhase::Idle);

    h.app.trigger(Trigger::QuickAdd);
    assert_eq!(h.shell.forms(), vec![None]);

    let id = h.app.state().tasks[0].id.clone();
    assert!(h.app.edit_task(&id));
    assert_eq!(h.shell.forms().last(), Some(&Some(id)));
}

#[test]
fn running_timer_resumes_after_restart_without_crediting_downtime() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("store.json");
    let open = || Storage::new(Box::new(FileStore::open(&path).expect("open store")));

    let clock = morning();
    let mut first = harness_with(open(), clock.clone());
    first.app.start_timer();
    clock.advance(Duration::from_secs(100));
    first.app.tick();
    first.app.shutdown();
    assert_eq!(first.driver.active(), 0);
    drop(first);

    let stored: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("read store")).expect("json");
    assert_eq!(stored[STORAGE_KEY]["timer"]["running"], true);
    assert!(stored[STORAGE_KEY]["timer"]["lastTick"].is_null());

    clock.advance(Duration::from_secs(3600));
    let mut second = harness_with(open(), clock.clone());
    assert!(second.app.is_ticking());
    assert_eq!(second.driver.active(), 1);
    assert_eq!(second.app.state().timer.remaining_seconds, 1400);

    clock.advance(Duration::from_secs(2));
    second.app.tick();
    assert_eq!(second.app.state().timer.remaining_seconds, 1398);
}

#[test]
fn table_navigation_clamps_pages() {
    let mut h = harness();
    for n in 0..8 {
        h.app
            .save_task(draft(&format!("Errand {n}"), "2026-11-01"))
            .expect("valid");
    }
    assert!(h.app.set_page_size(5));
    assert!(!h.app.set_page_size(7));
    assert_eq!(h.app.state().pagination.page_size, 5);

    h.app.change_page(1);
    h.app.change_page(1);
    h.app.change_page(5);
    let view = h.view.last().expect("rendered");
    assert_eq!(view.table.page, 3);
    assert_eq!(view.table.summary, "11 - 12 of 12");

    h.app.set_search("errand 7");
    let view = h.view.last().expect("rendered");
    assert_eq!(h.app.state().pagination.page, 1);
    assert_eq!(view.table.summary, "1 - 1 of 1");

    h.app.change_page(-3);
    assert_eq!(h.app.state().pagination.page, 1);
}

#[test]
fn calendar_and_settings_actions() {
    let mut h = harness();
    h.app.change_month(1);
    assert_eq!(
        h.view.last().expect("rendered").calendar.title,
        "November 2026"
    );
    h.app.change_month(-13);
    assert_eq!(
        h.view.last().expect("rendered").calendar.title,
        "October 2025"
    );

    let date = NaiveDate::from_ymd_opt(2025, 1, 14).expect("date");
    h.app.select_date(date);
    let view = h.view.last().expect("rendered");
    assert_eq!(view.calendar.title, "January 2025");
    assert_eq!(view.daily.label, "Tuesday, Jan 14");
    assert_eq!(view.daily.count_label, "1 Task planned");

    h.app.toggle_theme();
    h.app.toggle_helper();
    let view = h.view.last().expect("rendered");
    assert_eq!(view.theme.as_str(), "dark");
    assert!(view.helper_mode);

    h.app.sync_calendar();
    assert_eq!(h.shell.last_toast().as_deref(), Some("Calendar sync coming soon."));
    h.app.open_filters();
    assert_eq!(h.shell.last_toast().as_deref(), Some("Filters coming soon."));
}

#[test]
fn forget_restores_defaults() {
    let store = MemoryStore::default();
    let mut h = harness_with(Storage::new(Box::new(store.clone())), morning());
    h.app.toggle_theme();
    h.app.start_timer();
    assert!(store.raw(STORAGE_KEY).is_some());

    h.app.forget();
    assert!(store.raw(STORAGE_KEY).is_none());
    assert_eq!(h.app.state().settings.theme.as_str(), "light");
    assert!(!h.app.state().timer.running);
    assert_eq!(h.driver.active(), 0);
}

#[test]
fn notification_failure_does_not_break_completion() {
    let shell = RecordingShell::failing_notifications();
    let clock = morning();
    let driver = ManualTickDriver::default();
    let mut app = App::start(AppParts {
        storage: Storage::new(Box::new(MemoryStore::default())),
        driver: Box::new(driver.clone()),
        clock: Box::new(clock.clone()),
        shell: Box::new(shell.clone()),
        view: Box::new(RecordingView::default()),
        defaults: StateDefaults {
            timer_seconds: 60,
            page_size: 10,
        },
    });

    app.start_timer();
    clock.advance(Duration::from_secs(61));
    assert!(matches!(app.tick(), TickOutcome::Completed { .. }));
    assert!(shell.notifications().is_empty());
    assert_eq!(shell.signals(), vec![Outbound::TimerCompleted]);
    assert_eq!(app.state().timer.done_today_seconds, 60);
}
