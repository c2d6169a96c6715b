use std::io::{self, Write};

use crate::notify::{Client, Message};

/// Fallback transport: writes status reports to standard error.
///
/// Always present, so a process without a supervisor channel still reports
/// somewhere a human can see it.
#[derive(Debug, Default, Clone, Copy)]
pub struct Console;

impl Console {
    pub fn new() -> Self {
        Self
    }

    pub fn open() -> Option<Self> {
        Some(Self)
    }
}

impl Client for Console {
    fn name(&self) -> &'static str {
        "console"
    }

    fn send(&self, message: &Message) -> io::Result<()> {
        info!(%message, "notify");
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "notify: {message}")
    }
}
