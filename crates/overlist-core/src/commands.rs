use anyhow::{anyhow, bail};
use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::placement::Viewport;
use crate::render::Renderer;
use crate::replica::{Replica, SurfaceKind};
use crate::settings::{CornerPosition, SettingsPatch};
use crate::store::StoreBus;

/// Viewport assumed for the terminal surface; placement still clamps.
const CLI_VIEWPORT: Viewport = Viewport {
    width: 1280.0,
    height: 800.0,
};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add",
        "list",
        "done",
        "delete",
        "move",
        "clear-done",
        "panel",
        "settings",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(bus, coordinator, _cfg, renderer, words))]
pub fn dispatch(
    bus: &StoreBus,
    coordinator: &Coordinator,
    _cfg: &Config,
    renderer: &mut Renderer,
    words: &[String],
) -> anyhow::Result<()> {
    let (command, args) = match words.split_first() {
        Some((command, args)) => (command.as_str(), args),
        None => ("list", &[][..]),
    };

    let known = known_command_names();
    let command = expand_command_abbrev(command, &known)
        .ok_or_else(|| anyhow!("unknown or ambiguous command: {command}"))?;

    debug!(command, args = ?args, "dispatching command");

    // The terminal acts as one more surface: a replica mounted for the
    // duration of the command, writing through the shared bus like any
    // other surface would.
    let mut surface = Replica::new(SurfaceKind::ControlPanel, bus.clone(), CLI_VIEWPORT);
    surface.mount();

    match command {
        "add" => cmd_add(&mut surface, args),
        "list" => cmd_list(&surface, renderer),
        "done" => cmd_done(&mut surface, args),
        "delete" => cmd_delete(&mut surface, args),
        "move" => cmd_move(&mut surface, args),
        "clear-done" => cmd_clear_done(&mut surface),
        "panel" => cmd_panel(&mut surface, args),
        "settings" => cmd_settings(&surface, coordinator, renderer, args),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(surface, args))]
fn cmd_add(surface: &mut Replica, args: &[String]) -> anyhow::Result<()> {
    let text = args.join(" ");
    if !surface.add_task(&text, Utc::now()) {
        bail!("task text is empty");
    }
    info!(count = surface.tasks().len(), "task added");
    println!("Added task {}.", surface.tasks().len());
    Ok(())
}

#[instrument(skip(surface, renderer))]
fn cmd_list(surface: &Replica, renderer: &mut Renderer) -> anyhow::Result<()> {
    renderer.print_task_table(surface.tasks(), Utc::now())
}

#[instrument(skip(surface, args))]
fn cmd_done(surface: &mut Replica, args: &[String]) -> anyhow::Result<()> {
    let idx = parse_index(args.first(), surface.tasks().len())?;
    let id = surface.tasks()[idx].id.clone();
    surface.toggle_task(&id);
    let task = &surface.tasks()[idx];
    println!(
        "Task {} is now {}.",
        idx + 1,
        if task.done { "done" } else { "not done" }
    );
    Ok(())
}

#[instrument(skip(surface, args))]
fn cmd_delete(surface: &mut Replica, args: &[String]) -> anyhow::Result<()> {
    let idx = parse_index(args.first(), surface.tasks().len())?;
    let id = surface.tasks()[idx].id.clone();
    surface.delete_task(&id);
    println!("Deleted task {}.", idx + 1);
    Ok(())
}

#[instrument(skip(surface, args))]
fn cmd_move(surface: &mut Replica, args: &[String]) -> anyhow::Result<()> {
    let len = surface.tasks().len();
    let from = parse_index(args.first(), len)?;
    let to = parse_index(args.get(1), len)?;

    // 1-based final position to insertion slot over the unmodified list.
    let slot = if to > from { to + 1 } else { to };
    surface.move_task(from, slot);
    println!("Moved task {} to position {}.", from + 1, to + 1);
    Ok(())
}

#[instrument(skip(surface))]
fn cmd_clear_done(surface: &mut Replica) -> anyhow::Result<()> {
    let removed = surface.clear_done();
    println!("Cleared {removed} done task(s).");
    Ok(())
}

#[instrument(skip(surface, args))]
fn cmd_panel(surface: &mut Replica, args: &[String]) -> anyhow::Result<()> {
    match args.first().map(String::as_str) {
        Some("open") => surface.set_panel_open(true),
        Some("close") => surface.set_panel_open(false),
        Some("toggle") | None => surface.toggle_panel(),
        Some(other) => bail!("expected open|close|toggle, got: {other}"),
    }
    println!(
        "Panel is {}.",
        if surface.panel_open() { "open" } else { "closed" }
    );
    Ok(())
}

#[instrument(skip(surface, coordinator, renderer, args))]
fn cmd_settings(
    surface: &Replica,
    coordinator: &Coordinator,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    match args.split_first() {
        None => renderer.print_settings(
            &coordinator.get_settings(),
            surface.panel_open(),
            surface.control_position(),
        ),
        Some((verb, pairs)) if verb == "set" => {
            let patch = parse_settings_patch(pairs)?;
            let settings = coordinator.set_settings(patch);
            renderer.print_settings(&settings, surface.panel_open(), surface.control_position())
        }
        Some((other, _)) => Err(anyhow!("expected `settings` or `settings set`, got: {other}")),
    }
}

fn cmd_help() -> anyhow::Result<()> {
    println!("usage: overlist [flags] <command> [args]");
    println!();
    println!("  add <text>...          add a task");
    println!("  list                   show the task list (default)");
    println!("  done <n>               toggle task n done/not done");
    println!("  delete <n>             delete task n");
    println!("  move <from> <to>       move task to a new position");
    println!("  clear-done             drop every done task");
    println!("  panel [open|close|toggle]");
    println!("  settings               show settings");
    println!("  settings set k=v ...   update settings (enabled, position)");
    Ok(())
}

fn parse_index(arg: Option<&String>, len: usize) -> anyhow::Result<usize> {
    let raw = arg.ok_or_else(|| anyhow!("missing task number"))?;
    let number: usize = raw
        .parse()
        .map_err(|_| anyhow!("invalid task number: {raw}"))?;
    if number == 0 || number > len {
        bail!("task number {number} out of range (1..={len})");
    }
    Ok(number - 1)
}

fn parse_settings_patch(pairs: &[String]) -> anyhow::Result<SettingsPatch> {
    if pairs.is_empty() {
        bail!("settings set expects key=value pairs");
    }

    let mut patch = SettingsPatch::default();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("expected key=value, got: {pair}"))?;
        match key {
            "enabled" => {
                patch.enabled = Some(match value {
                    "true" | "on" | "1" => true,
                    "false" | "off" | "0" => false,
                    other => bail!("invalid enabled value: {other}"),
                });
            }
            "position" => {
                patch.position = Some(parse_position(value)?);
            }
            other => bail!("unknown settings key: {other}"),
        }
    }
    Ok(patch)
}

fn parse_position(value: &str) -> anyhow::Result<CornerPosition> {
    match value {
        "top-right" => Ok(CornerPosition::TopRight),
        "bottom-right" => Ok(CornerPosition::BottomRight),
        "bottom-left" => Ok(CornerPosition::BottomLeft),
        "top-left" => Ok(CornerPosition::TopLeft),
        other => Err(anyhow!("invalid position: {other}")),
    }
}
