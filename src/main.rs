#![allow(clippy::too_many_lines)]

#[macro_use]
extern crate tracing;

mod cli;

use std::str::FromStr;

use calloop::signals::{Signal, Signals};
use calloop::EventLoop;
use clap::Parser;

use cardboard::backend::headless::HeadlessBackend;
use cardboard::state::State;
use cardboard::utils::geometry::Size;

/// Size registered for the one output this crate's own binary brings up at startup. There is no
/// real display-server backend in scope to report an actual monitor size, so this is a fixed
/// stand-in; a concrete backend would call [`State::add_output`] with whatever it actually
/// enumerates instead.
const PLACEHOLDER_OUTPUT_SIZE: (i32, i32) = (1920, 1080);

fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::from_str("error,cardboard=info").unwrap());
    tracing_subscriber::fmt().compact().with_env_filter(filter).init();

    let cli = cli::Cli::parse();
    let config_path = cli
        .config_path
        .or_else(cardboard_config::default_config_path)
        .unwrap_or_default();

    if matches!(cli.command, Some(cli::Command::CheckConfiguration)) {
        return check_configuration(&config_path);
    }

    info!(
        version = std::env!("CARGO_PKG_VERSION"),
        git_hash = option_env!("GIT_HASH").unwrap_or("unknown"),
        "starting cardboard"
    );

    let config = cardboard_config::Config::load(&config_path)?;

    let mut event_loop: EventLoop<'static, State<HeadlessBackend>> = EventLoop::try_new()?;
    let loop_handle = event_loop.handle();

    install_signal_handlers(&loop_handle)?;

    let mut state = State::new(HeadlessBackend::new(), config, event_loop.get_signal());
    state.add_output(Size::from(PLACEHOLDER_OUTPUT_SIZE));

    let socket_path = cardboard_ipc::socket_path()?;
    state.insert_sources(&loop_handle, socket_path)?;

    if let Some(script) = cardboard_config::config_script_path() {
        if let Err(err) = cardboard::utils::spawn(&[script.to_string_lossy().into_owned()]) {
            warn!(?err, "failed to launch configuration script");
        }
    }

    event_loop.run(None, &mut state, |_state| {})?;

    let exit_code = state.exit_code;
    std::mem::drop(state);
    info!("shutting down");
    std::process::exit(exit_code);
}

fn check_configuration(config_path: &std::path::Path) -> anyhow::Result<()> {
    match cardboard_config::Config::load(config_path) {
        Ok(_) => {
            println!("There are no issues with your configuration");
            Ok(())
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

/// Registers SIGINT/SIGHUP/SIGTERM as orderly-shutdown triggers, SIGCHLD as a reap trigger, and
/// ignores SIGPIPE outright (we never want a client closing its socket mid-write to kill us).
fn install_signal_handlers(loop_handle: &calloop::LoopHandle<'static, State<HeadlessBackend>>) -> anyhow::Result<()> {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }

    let signals = Signals::new([Signal::SIGINT, Signal::SIGHUP, Signal::SIGTERM, Signal::SIGCHLD])?;
    loop_handle
        .insert_source(signals, |event, _, state| match event.signal() {
            Signal::SIGCHLD => reap_children(),
            _ => {
                state.run_command(cardboard_ipc::CommandData::Quit { code: 0 });
            }
        })
        .map_err(|err| anyhow::anyhow!("failed to install signal source: {err}"))?;

    Ok(())
}

fn reap_children() {
    loop {
        let mut status = 0;
        let pid = unsafe { libc::waitpid(-1, &mut status, libc::WNOHANG) };
        if pid <= 0 {
            break;
        }
    }
}
