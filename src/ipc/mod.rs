//! The compositor's command IPC: a `UnixListener` serving one request/one response per
//! connection, dispatched straight into the command engine. See `cardboard-ipc` for the wire
//! format both this server and `cutter` speak.

use std::io::{self, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::time::{Duration, Instant};

use cardboard_ipc::{decode_command, encode_frame, read_frame, CommandData, IpcError};

use crate::command::CommandResult;

/// Non-blocking I/O retry budget for a single connection. A client that connects but never sends
/// (or never drains) its frame within this window is dropped; requests are a few dozen bytes, so
/// this only ever bites a client that is stuck or malicious.
const IO_RETRY_BUDGET: Duration = Duration::from_millis(200);

/// Binds a fresh listening socket at `socket_path`, replacing a stale one left behind by an
/// unclean shutdown. The listener itself is non-blocking so it can sit behind a level-triggered
/// `calloop` source; each accepted connection additionally gets its own non-blocking + `CLOEXEC`
/// fd once accepted.
pub fn bind(socket_path: &Path) -> io::Result<UnixListener> {
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    let listener = UnixListener::bind(socket_path)?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

/// Accepts and serves every connection currently pending on `listener`, dispatching each
/// decoded [`CommandData`] through `dispatch`. Call once per readiness notification; with a
/// level-triggered source, a connection arriving between calls is still picked up on the next
/// one.
pub fn drain(listener: &UnixListener, mut dispatch: impl FnMut(CommandData) -> CommandResult) {
    loop {
        match listener.accept() {
            Ok((stream, _addr)) => {
                if let Err(err) = handle_one(stream, &mut dispatch) {
                    tracing::warn!(?err, "IPC connection failed");
                }
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
            Err(err) => {
                tracing::warn!(?err, "failed to accept IPC connection");
                break;
            }
        }
    }
}

/// `accept` already happened; from here: `CLOEXEC` + non-blocking on the client fd → read the
/// request frame → decode → dispatch → if the result carries a message, frame and send it back →
/// close. A malformed frame, an oversized one, or one that never fully arrives gets a fixed error
/// message instead of a decoded command — this is the only response a client can get without a
/// live command having run.
fn handle_one(
    mut stream: UnixStream,
    dispatch: &mut impl FnMut(CommandData) -> CommandResult,
) -> io::Result<()> {
    set_cloexec(&stream)?;
    stream.set_nonblocking(true)?;

    let message = match read_frame_with_retry(&mut stream) {
        Ok(payload) => match decode_command(&payload) {
            Ok(command) => dispatch(command).message.unwrap_or_default(),
            Err(_) => "Unable to receive data".to_string(),
        },
        Err(_) => "Unable to receive data".to_string(),
    };

    write_response(&mut stream, &message)
}

fn set_cloexec(stream: &UnixStream) -> io::Result<()> {
    let fd = stream.as_raw_fd();
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn read_frame_with_retry(stream: &mut UnixStream) -> Result<Vec<u8>, IpcError> {
    let deadline = Instant::now() + IO_RETRY_BUDGET;
    loop {
        match read_frame(stream) {
            Ok(payload) => return Ok(payload),
            Err(IpcError::Io(err)) if err.kind() == io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Err(IpcError::Io(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "client did not send a frame in time",
                    )));
                }
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(err) => return Err(err),
        }
    }
}

fn write_response(stream: &mut UnixStream, message: &str) -> io::Result<()> {
    let frame = encode_frame(message.as_bytes()).unwrap_or_else(|_| encode_frame(b"").unwrap());
    let deadline = Instant::now() + IO_RETRY_BUDGET;
    let mut written = 0;
    while written < frame.len() {
        match stream.write(&frame[written..]) {
            Ok(n) => written += n,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "client did not drain the response in time",
                    ));
                }
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_dispatches_a_decoded_command_and_returns_its_message() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("cardboard-test.sock");
        let listener = bind(&socket_path).unwrap();

        let mut client = UnixStream::connect(&socket_path).unwrap();
        client
            .write_all(&cardboard_ipc::encode_command(&CommandData::Quit { code: 3 }).unwrap())
            .unwrap();

        let mut seen = None;
        drain(&listener, |command| {
            seen = Some(command.clone());
            CommandResult::message("bye")
        });
        assert_eq!(seen, Some(CommandData::Quit { code: 3 }));

        let response = read_frame(&mut client).unwrap();
        assert_eq!(response, b"bye");
    }

    #[test]
    fn a_garbage_frame_gets_the_fixed_error_message_instead_of_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("cardboard-test-garbage.sock");
        let listener = bind(&socket_path).unwrap();

        let mut client = UnixStream::connect(&socket_path).unwrap();
        client
            .write_all(&encode_frame(&[0xFF, 0xFF, 0xFF]).unwrap())
            .unwrap();

        let mut called = false;
        drain(&listener, |_| {
            called = true;
            CommandResult::empty()
        });
        assert!(!called);

        let response = read_frame(&mut client).unwrap();
        assert_eq!(response, b"Unable to receive data");
    }

    #[test]
    fn no_pending_connection_is_a_silent_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("cardboard-test-empty.sock");
        let listener = bind(&socket_path).unwrap();

        let mut called = false;
        drain(&listener, |_| {
            called = true;
            CommandResult::empty()
        });
        assert!(!called);
    }
}
