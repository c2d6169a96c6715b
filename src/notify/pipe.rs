use std::{
    fmt,
    fs::File,
    io::{self, Write},
    os::fd::{BorrowedFd, RawFd},
    sync::{Mutex, PoisonError},
};

use crate::notify::{Client, Message, NOTIFY_PIPE};

/// Writes status reports to a descriptor inherited from the supervisor.
pub struct Pipe {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl Pipe {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    /// Present when `NOTIFY_PIPE` names an open descriptor.
    ///
    /// The inherited descriptor is duplicated, never adopted: dropping the
    /// client closes only the copy, and a stale number fails the duplication
    /// instead of being reported as present.
    pub fn open() -> Option<Self> {
        let fd = std::env::var(NOTIFY_PIPE).ok()?.trim().parse::<RawFd>().ok()?;
        if fd < 0 {
            return None;
        }
        // SAFETY: the borrow lives only for the `dup` call below, which does
        // not close or otherwise take over the descriptor. A number that is
        // not open makes `dup` fail with EBADF.
        let inherited = unsafe { BorrowedFd::borrow_raw(fd) };
        let owned = inherited.try_clone_to_owned().ok()?;
        Some(Self::new(File::from(owned)))
    }
}

impl Client for Pipe {
    fn name(&self) -> &'static str {
        "pipe"
    }

    fn send(&self, message: &Message) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(message.encode().as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}

impl fmt::Debug for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipe").finish_non_exhaustive()
    }
}
