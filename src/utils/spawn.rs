//! Detached process spawning for the `Exec` command.
//!
//! credits: <http://www.lubutu.com/code/spawning-in-unix>
//!
//! We fork once, `setsid()` in the child so it survives us exiting, `execvp` the requested
//! argv, and report back only whether the `exec` call itself failed: the parent never blocks on
//! the child's lifetime, it just waits for either a written `errno` or the pipe closing on
//! successful exec.

use std::ffi::CString;
use std::io;
use std::os::fd::RawFd;

/// Forks, execs `argv[0]` with the rest as arguments, and returns the `errno` from `execvp` if
/// it failed. `Ok(())` means the exec call was issued; it does not guarantee the program ran to
/// completion, only that the `exec(3)` syscall itself succeeded.
pub fn spawn(argv: &[String]) -> io::Result<()> {
    let Some((program, args)) = argv.split_first() else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "exec requires at least one argument",
        ));
    };

    let program = CString::new(program.as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "argv[0] contains a NUL byte"))?;
    let args: Vec<CString> = args
        .iter()
        .map(|arg| CString::new(arg.as_bytes()))
        .collect::<Result<_, _>>()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "argument contains a NUL byte"))?;

    let mut fds = [0 as RawFd; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
        return Err(io::Error::last_os_error());
    }
    let [read_fd, write_fd] = fds;

    match unsafe { libc::fork() } {
        -1 => {
            let err = io::Error::last_os_error();
            unsafe {
                libc::close(read_fd);
                libc::close(write_fd);
            }
            Err(err)
        }
        0 => {
            unsafe {
                libc::close(read_fd);
                libc::fcntl(write_fd, libc::F_SETFD, libc::FD_CLOEXEC);
                libc::setsid();
            }

            let mut argv_ptrs: Vec<*const libc::c_char> =
                std::iter::once(program.as_ptr())
                    .chain(args.iter().map(|arg| arg.as_ptr()))
                    .chain(std::iter::once(std::ptr::null()))
                    .collect();

            unsafe {
                libc::execvp(program.as_ptr(), argv_ptrs.as_mut_ptr());
                // execvp only returns on failure.
                let errno = *libc::__errno_location();
                libc::write(
                    write_fd,
                    (&errno as *const i32).cast(),
                    std::mem::size_of::<i32>(),
                );
                libc::_exit(127);
            }
        }
        _child_pid => {
            unsafe { libc::close(write_fd) };

            let mut errno: i32 = 0;
            let n = unsafe {
                libc::read(
                    read_fd,
                    (&mut errno as *mut i32).cast(),
                    std::mem::size_of::<i32>(),
                )
            };
            unsafe { libc::close(read_fd) };

            if n == std::mem::size_of::<i32>() as isize {
                Err(io::Error::from_raw_os_error(errno))
            } else {
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawning_true_succeeds() {
        spawn(&["/bin/true".to_string()]).unwrap();
    }

    #[test]
    fn spawning_nonexistent_binary_reports_enoent() {
        let err = spawn(&["/nonexistent/cardboard-test-binary".to_string()]).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    }

    #[test]
    fn empty_argv_is_rejected() {
        assert!(spawn(&[]).is_err());
    }
}
