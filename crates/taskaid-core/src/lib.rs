pub mod app;
pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod event;
pub mod render;
pub mod runtime;
pub mod shell;
pub mod state;
pub mod storage;
pub mod task;
pub mod testing;
pub mod ticker;
pub mod timer;
pub mod view;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::app::{
  App,
  AppParts
};
use crate::cli::Command;
use crate::clock::SystemClock;
use crate::commands::EventChannel;
use crate::render::{
  Layout,
  Renderer
};
use crate::shell::TerminalShell;
use crate::state::StateDefaults;
use crate::storage::{
  Storage,
  StoreBackend
};
use crate::ticker::TokioTickDriver;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting taskaid"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.taskaidrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let backend = StoreBackend::from_config(
    &cfg, &data_dir
  )?;
  let storage = Storage::open(&backend)
    .with_context(|| {
      format!(
        "failed to open storage in {}",
        data_dir.display()
      )
    })?;

  let defaults = StateDefaults {
    timer_seconds: cfg.timer_seconds()?,
    page_size:     cfg.rows_per_page()?
  };

  let command =
    cli.command.unwrap_or(Command::Show);
  let layout = if cli.compact
    || commands::is_long_running(
      &command
    ) {
    Layout::Compact
  } else {
    Layout::Dashboard
  };
  let renderer =
    Renderer::new(&cfg, layout)?;
  let color =
    cfg.get_bool("color").unwrap_or(true);

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;
  let mut events = EventChannel::new();

  let mut app = App::start(AppParts {
    storage,
    driver: Box::new(
      TokioTickDriver::new(
        runtime.handle().clone(),
        events.sender.clone()
      )
    ),
    clock: Box::new(SystemClock),
    shell: Box::new(TerminalShell::new(
      color
    )),
    view: Box::new(renderer),
    defaults
  });

  commands::dispatch(
    &mut app,
    &runtime,
    &mut events,
    command
  )?;

  info!("done");
  Ok(())
}
