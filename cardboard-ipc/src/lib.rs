//! Wire types and framing for the `cardboard` IPC socket.
//!
//! ## Interacting with the IPC
//!
//! 1. Use the `cutter` command line tool, which is a CLI wrapper around this crate.
//! 2. Make programmatic use of it directly: open a [`UnixStream`] with [`connect`], encode a
//!    [`CommandData`] with [`encode`], write the resulting frame, then read a response frame
//!    back with [`read_frame`].
//!
//! The wire format is a 4-byte little-endian length header followed by that many bytes of
//! [`bincode`]-encoded payload. There is no out-of-band framing: a connection is good for exactly
//! one request and one response, after which the server closes it.

use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Overrides the default socket path when set.
pub const SOCKET_ENV: &str = "CARDBOARD_SOCKET";

/// Upper bound on a single frame's payload, inherited from the reference implementation. Servers
/// must reject (or close the connection on) any frame claiming to be larger than this.
pub const MAX_MESSAGE_SIZE: usize = 1 << 16;

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("no $HOME or $CARDBOARD_SOCKET to derive a socket path from")]
    NoSocketPath,
    #[error("i/o error talking to the compositor: {0}")]
    Io(#[from] io::Error),
    #[error("frame of {0} bytes exceeds the maximum message size of {MAX_MESSAGE_SIZE}")]
    FrameTooLarge(usize),
    #[error("failed to encode command: {0}")]
    Encode(#[from] bincode::Error),
}

/// Resolves the socket path the same way the server does: `$CARDBOARD_SOCKET` if set, otherwise
/// `/tmp/cardboard-$WAYLAND_DISPLAY`.
pub fn socket_path() -> Result<PathBuf, IpcError> {
    if let Ok(path) = std::env::var(SOCKET_ENV) {
        return Ok(PathBuf::from(path));
    }
    let wayland_display = std::env::var("WAYLAND_DISPLAY").unwrap_or_default();
    Ok(PathBuf::from(format!("/tmp/cardboard-{wayland_display}")))
}

/// Connects to the compositor's IPC socket, returning the path used and the open stream.
pub fn connect() -> Result<(PathBuf, UnixStream), IpcError> {
    let path = socket_path()?;
    let stream = UnixStream::connect(&path)?;
    Ok((path, stream))
}

/// Encodes a single length-prefixed frame: `[i32 len_le][payload]`.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, IpcError> {
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(IpcError::FrameTooLarge(payload.len()));
    }
    let mut framed = Vec::with_capacity(4 + payload.len());
    framed.extend_from_slice(&(payload.len() as i32).to_le_bytes());
    framed.extend_from_slice(payload);
    Ok(framed)
}

/// Reads one length-prefixed frame from `reader`. An empty payload (zero-length frame) is valid
/// and represents a command with no response message.
pub fn read_frame(reader: &mut impl Read) -> Result<Vec<u8>, IpcError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = i32::from_le_bytes(len_buf);
    if len < 0 || len as usize > MAX_MESSAGE_SIZE {
        return Err(IpcError::FrameTooLarge(len.max(0) as usize));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}

/// Encodes a [`CommandData`] into its wire frame.
pub fn encode_command(command: &CommandData) -> Result<Vec<u8>, IpcError> {
    let payload = bincode::serialize(command)?;
    encode_frame(&payload)
}

/// Decodes a [`CommandData`] from a frame's payload, as returned by [`read_frame`].
pub fn decode_command(payload: &[u8]) -> Result<CommandData, IpcError> {
    bincode::deserialize(payload).map_err(IpcError::from)
}

/// Sends `command` over `stream` and waits for the (possibly empty) response message.
pub fn send_command(stream: &mut UnixStream, command: &CommandData) -> Result<String, IpcError> {
    let frame = encode_command(command)?;
    stream.write_all(&frame)?;
    let response = read_frame(stream)?;
    if response.is_empty() {
        return Ok(String::new());
    }
    Ok(String::from_utf8_lossy(&response).into_owned())
}

/// Direction for `Focus` and tile/column navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusDirection {
    Left,
    Right,
    Up,
    Down,
    Cycle,
}

/// Sub-commands that adjust running configuration, mirroring the options a config script can set
/// at startup through `ConfigGap`/`ConfigMouseMod`/`ConfigFocusColor`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ConfigCommand {
    MouseMod { mods: u32 },
    Gap { px: i32 },
    FocusColor { r: f32, g: f32, b: f32, a: f32 },
}

/// The sum type dispatched by the command engine. Every variant round-trips through
/// [`bincode`] unchanged; this is the single wire contract shared by the server, `cutter`, and a
/// config script invoking commands through its own client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandData {
    Quit {
        code: i32,
    },
    Focus {
        direction: FocusDirection,
    },
    Exec {
        argv: Vec<String>,
    },
    Bind {
        mods: u32,
        key: String,
        inner: Box<CommandData>,
    },
    Close,
    WorkspaceSwitch {
        n: usize,
    },
    WorkspaceMove {
        n: usize,
    },
    ToggleFloating,
    Move {
        dx: i32,
        dy: i32,
    },
    Resize {
        w: i32,
        h: i32,
    },
    InsertIntoColumn,
    PopFromColumn,
    Config(ConfigCommand),
    CycleWidth,
}
