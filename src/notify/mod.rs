//! Readiness notification.
//!
//! A supervised process reports its state (ready, reloading, stopping, ...)
//! to whatever supervises it. Several transports exist; [`open`] probes them in
//! priority order ([`Pipe`], then [`Socket`], then [`Console`]) and caches the
//! first one that is present for the rest of the process's lifetime.
//!
//! ```rust,no_run
//! use task_container::notify::{self, Client};
//!
//! fn main() -> std::io::Result<()> {
//!     let client = notify::open();
//!     client.ready()?;
//!     Ok(())
//! }
//! ```

mod console;
#[cfg(unix)]
mod pipe;
#[cfg(unix)]
mod socket;

use std::{
    fmt, io,
    sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError},
};

pub use console::Console;
#[cfg(unix)]
pub use pipe::Pipe;
#[cfg(unix)]
pub use socket::Socket;

/// Environment variable naming an inherited descriptor to write messages to.
pub const NOTIFY_PIPE: &str = "NOTIFY_PIPE";
/// Environment variable naming a datagram socket to send messages to.
pub const NOTIFY_SOCKET: &str = "NOTIFY_SOCKET";

/// A status report: ordered `KEY=value` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    fields: Vec<(String, String)>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, replacing an earlier one with the same key.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        let key = key.into();
        let value = value.to_string();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.fields.push((key, value)),
        }
        self
    }

    pub fn ready() -> Self {
        Self::new().with("READY", 1)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_ready(&self) -> bool {
        self.get("READY") == Some("1")
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Wire form: one `KEY=value` line per field.
    pub fn encode(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{k}={v}\n"))
            .collect()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

/// A readiness transport.
pub trait Client: Send + Sync + 'static {
    /// Short transport name, for logs.
    fn name(&self) -> &'static str;

    fn send(&self, message: &Message) -> io::Result<()>;

    fn ready(&self) -> io::Result<()> {
        self.send(&Message::ready())
    }

    fn status(&self, text: &str) -> io::Result<()> {
        self.send(&Message::new().with("STATUS", text))
    }

    fn reloading(&self) -> io::Result<()> {
        self.send(&Message::new().with("RELOADING", 1).with("READY", 0))
    }

    fn restarting(&self) -> io::Result<()> {
        self.send(
            &Message::new()
                .with("READY", 0)
                .with("STATUS", "Restarting..."),
        )
    }

    fn stopping(&self) -> io::Result<()> {
        self.send(&Message::new().with("STOPPING", 1))
    }

    fn error(&self, text: &str) -> io::Result<()> {
        self.send(&Message::new().with("STATUS", text).with("ERROR", 1))
    }
}

type Probe = Box<dyn Fn() -> Option<Arc<dyn Client>> + Send + Sync>;

/// Picks the first available transport and remembers it.
///
/// Probes run in the order they were added, at most until one reports
/// present. [`Console`] is used when none does, so [`Selector::open`] always
/// yields a client.
pub struct Selector {
    probes: Vec<Probe>,
    client: Mutex<Option<Arc<dyn Client>>>,
}

impl Selector {
    /// A selector without probes. It falls back to [`Console`].
    pub fn new() -> Self {
        Self {
            probes: Vec::new(),
            client: Mutex::new(None),
        }
    }

    /// Probes the process environment: pipe, then socket, then console.
    pub fn standard() -> Self {
        let selector = Self::new();
        #[cfg(unix)]
        let selector = selector
            .with_probe(|| Pipe::open().map(|pipe| Arc::new(pipe) as Arc<dyn Client>))
            .with_probe(|| Socket::open().map(|socket| Arc::new(socket) as Arc<dyn Client>));
        selector.with_probe(|| Console::open().map(|console| Arc::new(console) as Arc<dyn Client>))
    }

    pub fn with_probe<F>(mut self, probe: F) -> Self
    where
        F: Fn() -> Option<Arc<dyn Client>> + Send + Sync + 'static,
    {
        self.probes.push(Box::new(probe));
        self
    }

    /// The cached client, probing for one on first use.
    pub fn open(&self) -> Arc<dyn Client> {
        let mut cached = self.cached();
        if let Some(client) = cached.as_ref() {
            return client.clone();
        }

        let client = self
            .probes
            .iter()
            .find_map(|probe| probe())
            .unwrap_or_else(|| Arc::new(Console::new()));
        info!(transport = client.name(), "selected notification client");

        *cached = Some(client.clone());
        client
    }

    /// Forgets the cached client; the next `open` probes again.
    pub fn reset(&self) {
        self.cached().take();
    }

    fn cached(&self) -> MutexGuard<'_, Option<Arc<dyn Client>>> {
        self.client.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::standard()
    }
}

static SELECTOR: LazyLock<Selector> = LazyLock::new(Selector::standard);

/// The process-wide notification client.
///
/// Selected on first use and shared by every caller afterwards.
pub fn open() -> Arc<dyn Client> {
    SELECTOR.open()
}

/// Drops the process-wide client so the next [`open`] selects again.
pub fn reset() {
    SELECTOR.reset();
}
