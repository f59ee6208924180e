//! Raw terminal mode for live sessions.
//!
//! While a [`RawModeGuard`] is alive, stdin delivers bytes unbuffered and
//! unechoed (Ctrl+C arrives as `0x03` instead of raising SIGINT) and bracketed
//! paste is on. Output post-processing stays enabled so remote `\n` still
//! returns the carriage.

use std::io::{self, Write};

use libc::{self, c_int};
use tracing::debug;

const BRACKETED_PASTE_ON: &str = "\x1b[?2004h";
const BRACKETED_PASTE_OFF: &str = "\x1b[?2004l";

pub fn stdin_is_terminal() -> bool {
    // SAFETY: `isatty` only inspects the descriptor and has no memory effects.
    unsafe { libc::isatty(libc::STDIN_FILENO) == 1 }
}

#[cfg(unix)]
fn get_termios(fd: c_int) -> io::Result<libc::termios> {
    // SAFETY: `termios` is plain old data; all-zero is a valid value.
    let mut termios = unsafe { std::mem::zeroed::<libc::termios>() };
    // SAFETY: `termios` is a valid, writable struct for `tcgetattr` to fill.
    let result = unsafe { libc::tcgetattr(fd, &mut termios) };
    if result != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(termios)
}

#[cfg(unix)]
fn set_termios(fd: c_int, termios: &libc::termios) -> io::Result<()> {
    // SAFETY: `termios` points to a fully initialized struct for the call.
    let result = unsafe { libc::tcsetattr(fd, libc::TCSANOW, termios) };
    if result != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(unix)]
pub struct RawModeGuard {
    fd: c_int,
    original: libc::termios,
    restored: bool,
}

#[cfg(unix)]
impl RawModeGuard {
    /// Switches stdin to raw mode. Fails when stdin is not a terminal.
    pub fn enable() -> io::Result<Self> {
        let fd = libc::STDIN_FILENO;
        let original = get_termios(fd)?;
        let mut raw = original;
        // SAFETY: `raw` is an initialized copy of the current settings.
        unsafe {
            libc::cfmakeraw(&mut raw);
        }
        raw.c_oflag |= libc::OPOST | libc::ONLCR;
        set_termios(fd, &raw)?;
        write_control(BRACKETED_PASTE_ON);
        debug!("terminal raw mode enabled");

        Ok(Self {
            fd,
            original,
            restored: false,
        })
    }

    /// Restores the saved terminal settings. Safe to call more than once.
    pub fn restore(&mut self) -> io::Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        write_control(BRACKETED_PASTE_OFF);
        // Drop unread input so it does not leak to the shell.
        // SAFETY: `fd` is stdin, which outlives the guard.
        let _ = unsafe { libc::tcflush(self.fd, libc::TCIFLUSH) };
        set_termios(self.fd, &self.original)?;
        debug!("terminal raw mode restored");
        Ok(())
    }
}

#[cfg(unix)]
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

fn write_control(sequence: &str) {
    let mut stdout = io::stdout();
    let _ = stdout.write_all(sequence.as_bytes());
    let _ = stdout.flush();
}
