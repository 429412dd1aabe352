//! The server binary's own command line. Deliberately thin: the rich command surface (`focus`,
//! `exec`, `bind`, `workspace`, ...) belongs to `cutter`, a separate process that turns its
//! `argv` into a [`cardboard_ipc::CommandData`] and sends it over the IPC socket.

use std::path::PathBuf;

#[derive(Debug, clap::Parser)]
pub struct Cli {
    /// Configuration file to load instead of the default `$XDG_CONFIG_HOME/cardboard/config.toml`.
    #[arg(short, long, value_name = "PATH")]
    pub config_path: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, clap::Subcommand)]
pub enum Command {
    /// Parse the configuration file and report any errors, without starting the compositor.
    CheckConfiguration,
}
