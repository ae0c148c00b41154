pub mod cli;
pub mod commands;
pub mod config;
pub mod control;
pub mod coordinator;
pub mod placement;
pub mod render;
pub mod reorder;
pub mod replica;
pub mod settings;
pub mod store;
pub mod task;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::info;

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let cli = cli::GlobalCli::parse_from(raw_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        "starting overlist CLI"
    );

    let mut cfg = config::Config::load(cli.rcfile.as_deref())?;
    cfg.apply_overrides(cli.rc_overrides.into_iter().map(|kv| (kv.key, kv.value)));

    let data_dir = config::resolve_data_dir(&cfg, cli.data.as_deref())
        .context("failed to resolve data directory")?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let bus = store::StoreBus::open(&data_dir.join("store.json"));
    let coordinator = coordinator::Coordinator::new(bus.clone());
    coordinator.install();

    let mut renderer = render::Renderer::new(&cfg)?;
    let words = cli::command_words(&cli.rest);

    commands::dispatch(&bus, &coordinator, &cfg, &mut renderer, &words)?;

    info!("done");
    Ok(())
}
