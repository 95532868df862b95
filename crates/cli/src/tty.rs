//! Terminal raw-mode configuration.
//!
//! Puts stdin into noncanonical, no-echo, one-byte-at-a-time mode so
//! guest console input flows through unprocessed, and restores the
//! original settings when the guard drops. Declared against `<termios.h>`
//! directly, the same way the core declares its `<fenv.h>` calls.

use std::io;

// Linux termios flag values.
const ICANON: u32 = 0x0002;
const ECHO: u32 = 0x0008;
const ISIG: u32 = 0x0001;
const IEXTEN: u32 = 0x8000;
const BRKINT: u32 = 0x0002;
const ICRNL: u32 = 0x0100;
const INPCK: u32 = 0x0010;
const ISTRIP: u32 = 0x0020;
const IXON: u32 = 0x0400;
const CSIZE: u32 = 0x0030;
const PARENB: u32 = 0x0100;
const CS8: u32 = 0x0030;
const OPOST: u32 = 0x0001;
const VTIME: usize = 5;
const VMIN: usize = 6;
const TCSAFLUSH: i32 = 2;
const STDIN_FD: i32 = 0;

/// Mirror of `struct termios` (glibc layout).
#[repr(C)]
#[derive(Clone, Copy)]
struct Termios {
    c_iflag: u32,
    c_oflag: u32,
    c_cflag: u32,
    c_lflag: u32,
    c_line: u8,
    c_cc: [u8; 32],
    c_ispeed: u32,
    c_ospeed: u32,
}

unsafe extern "C" {
    fn tcgetattr(fd: i32, termios: *mut Termios) -> i32;
    fn tcsetattr(fd: i32, actions: i32, termios: *const Termios) -> i32;
}

/// Raw-mode guard: restores the saved terminal state on drop.
pub struct RawMode {
    saved: Termios,
}

impl RawMode {
    /// Switches stdin into raw mode.
    ///
    /// # Errors
    ///
    /// Fails when stdin is not a terminal or the attributes cannot be
    /// changed.
    pub fn enter() -> io::Result<Self> {
        let mut saved = Termios {
            c_iflag: 0,
            c_oflag: 0,
            c_cflag: 0,
            c_lflag: 0,
            c_line: 0,
            c_cc: [0; 32],
            c_ispeed: 0,
            c_ospeed: 0,
        };
        // SAFETY: tcgetattr writes a complete Termios for a valid fd.
        if unsafe { tcgetattr(STDIN_FD, &mut saved) } != 0 {
            return Err(io::Error::last_os_error());
        }

        let mut raw = saved;
        raw.c_lflag &= !(ECHO | ICANON | IEXTEN | ISIG);
        raw.c_iflag &= !(BRKINT | ICRNL | INPCK | ISTRIP | IXON);
        raw.c_cflag &= !(CSIZE | PARENB);
        raw.c_cflag |= CS8;
        raw.c_oflag &= !OPOST;
        raw.c_cc[VMIN] = 1;
        raw.c_cc[VTIME] = 0;

        // SAFETY: raw was fully initialised from the kernel's own state.
        if unsafe { tcsetattr(STDIN_FD, TCSAFLUSH, &raw) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { saved })
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        // SAFETY: restoring the attributes captured in enter().
        unsafe {
            let _ = tcsetattr(STDIN_FD, TCSAFLUSH, &self.saved);
        }
    }
}
