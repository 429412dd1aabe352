//! `cutter` is the command line client for `cardboard`'s IPC socket. It parses `argv[1..]` into a
//! [`CommandData`], sends it over the socket, prints any response message, and exits with a
//! status reflecting what happened.

use anyhow::{bail, Context, Result};
use cardboard_ipc::{CommandData, ConfigCommand, FocusDirection};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "cutter", about = "Control a running cardboard instance")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Terminate the compositor.
    Quit {
        #[arg(default_value_t = 0)]
        code: i32,
    },
    /// Move focus relative to the currently focused view.
    Focus { direction: Direction },
    /// Fork and exec a detached child process.
    Exec {
        #[arg(trailing_var_arg = true, required = true)]
        argv: Vec<String>,
    },
    /// Register a keybinding: `<modifier+...+key> <subcommand...>`.
    Bind {
        pattern: String,
        #[arg(trailing_var_arg = true, required = true)]
        rest: Vec<String>,
    },
    /// Switch or move the focused view to a workspace by index.
    Workspace {
        #[command(subcommand)]
        action: WorkspaceAction,
    },
    /// Swap the focused view between tiled and floating.
    ToggleFloating,
    /// Swap the focused view/column with an adjacent one.
    Move { dx: i32, dy: i32 },
    /// Resize the focused view.
    Resize { w: i32, h: i32 },
    /// Pull the next column's first tile into the focused column.
    InsertIntoColumn,
    /// Split the last tile of the focused column off into its own column.
    PopFromColumn,
    /// Step the focused view's width through a predefined ratio list.
    CycleWidth,
    /// Change running configuration.
    Config {
        #[command(subcommand)]
        setting: ConfigSetting,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Direction {
    Left,
    Right,
    Up,
    Down,
    Cycle,
}

impl From<Direction> for FocusDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Left => FocusDirection::Left,
            Direction::Right => FocusDirection::Right,
            Direction::Up => FocusDirection::Up,
            Direction::Down => FocusDirection::Down,
            Direction::Cycle => FocusDirection::Cycle,
        }
    }
}

#[derive(Debug, Subcommand)]
enum WorkspaceAction {
    Switch { n: usize },
    Move { n: usize },
}

#[derive(Debug, Subcommand)]
enum ConfigSetting {
    MouseMod { mods: u32 },
    Gap { px: i32 },
    FocusColor { r: f32, g: f32, b: f32, a: f32 },
}

/// Parses a `modifier+...+key` pattern into a modifier mask and the bare key name.
///
/// Recognized modifier names: `shift`, `ctrl`/`control`, `alt`, `super`/`logo`, `caps`,
/// `mod2`, `mod3`, `mod5`.
fn parse_bind_pattern(pattern: &str) -> Result<(u32, String)> {
    let mut parts: Vec<&str> = pattern.split('+').collect();
    let key = parts
        .pop()
        .filter(|key| !key.is_empty())
        .context("empty keybinding pattern")?
        .to_string();

    let mut mods = 0u32;
    for part in parts {
        mods |= match part.to_ascii_lowercase().as_str() {
            "shift" => 1 << 0,
            "ctrl" | "control" => 1 << 2,
            "alt" => 1 << 3,
            "super" | "logo" => 1 << 6,
            "caps" => 1 << 1,
            "mod2" => 1 << 4,
            "mod3" => 1 << 5,
            "mod5" => 1 << 7,
            other => bail!("unknown modifier {other:?} in bind pattern {pattern:?}"),
        };
    }
    Ok((mods, key))
}

/// Parses a command out of a raw argv slice (no leading binary name). Used both for the
/// top-level command and, recursively, for `bind`'s inner command.
fn parse_command(args: &[String]) -> Result<CommandData> {
    let cli = Cli::try_parse_from(std::iter::once(&"cutter".to_string()).chain(args))?;
    command_data_from(cli.command)
}

fn command_data_from(command: Command) -> Result<CommandData> {
    Ok(match command {
        Command::Quit { code } => CommandData::Quit { code },
        Command::Focus { direction } => CommandData::Focus {
            direction: direction.into(),
        },
        Command::Exec { argv } => CommandData::Exec { argv },
        Command::Bind { pattern, rest } => {
            let (mods, key) = parse_bind_pattern(&pattern)?;
            let inner = parse_command(&rest)?;
            CommandData::Bind {
                mods,
                key,
                inner: Box::new(inner),
            }
        }
        Command::Workspace {
            action: WorkspaceAction::Switch { n },
        } => CommandData::WorkspaceSwitch { n },
        Command::Workspace {
            action: WorkspaceAction::Move { n },
        } => CommandData::WorkspaceMove { n },
        Command::ToggleFloating => CommandData::ToggleFloating,
        Command::Move { dx, dy } => CommandData::Move { dx, dy },
        Command::Resize { w, h } => CommandData::Resize { w, h },
        Command::InsertIntoColumn => CommandData::InsertIntoColumn,
        Command::PopFromColumn => CommandData::PopFromColumn,
        Command::CycleWidth => CommandData::CycleWidth,
        Command::Config {
            setting: ConfigSetting::MouseMod { mods },
        } => CommandData::Config(ConfigCommand::MouseMod { mods }),
        Command::Config {
            setting: ConfigSetting::Gap { px },
        } => CommandData::Config(ConfigCommand::Gap { px }),
        Command::Config {
            setting: ConfigSetting::FocusColor { r, g, b, a },
        } => CommandData::Config(ConfigCommand::FocusColor { r, g, b, a }),
    })
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_command(&args).context("cutter: failed to parse command")?;

    let (_, mut stream) = cardboard_ipc::connect().context("cutter: failed to connect")?;
    let message =
        cardboard_ipc::send_command(&mut stream, &command).context("cutter: request failed")?;
    if !message.is_empty() {
        println!("{message}");
    }
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}
