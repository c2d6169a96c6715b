//! Channels connect a monitoring task to the child it watches.
//!
//! A [`Channel`] pairs one pollable [`Handle`] with message delivery and the
//! two control operations the group broadcasts. The group only ever waits on
//! handles; reading messages and stopping the child is up to the channel.

pub mod child;

use std::{
    collections::VecDeque,
    fmt,
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::Notify;

/// A readiness source the group can multiplex over.
///
/// Readiness is level-triggered: a source stays readable for as long as a
/// message is pending or the source is closed.
#[async_trait]
pub trait Pollable: Send + Sync + 'static {
    fn is_readable(&self) -> bool;

    /// Completes once the source is readable.
    async fn readable(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle#{}", self.0)
    }
}

/// Identity of a pollable source, stable for the lifetime of its channel.
///
/// Clones share the identity; two handles built from the same source with
/// separate [`Handle::new`] calls do not.
#[derive(Clone)]
pub struct Handle {
    id: HandleId,
    source: Arc<dyn Pollable>,
}

impl Handle {
    pub fn new(source: Arc<dyn Pollable>) -> Self {
        Self {
            id: HandleId::next(),
            source,
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn is_readable(&self) -> bool {
        self.source.is_readable()
    }

    pub fn readable(&self) -> BoxFuture<'_, ()> {
        self.source.readable()
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Handle {}

impl Hash for Handle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.id).finish()
    }
}

/// Contract between the group and whatever carries a child's messages.
#[async_trait]
pub trait Channel: Send {
    type Message: Send;
    type Output: Send;

    fn handle(&self) -> Handle;

    /// Next pending message, if any. Never blocks.
    fn receive(&mut self) -> Option<Self::Message>;

    /// Ask the child to stop gracefully.
    fn interrupt(&mut self);

    /// Ask the child to stop now.
    fn terminate(&mut self);

    /// Blocks until the child has concluded.
    async fn wait(&mut self) -> Self::Output;
}

/// Pollable FIFO: readable while it holds a message or once it is closed.
pub struct Mailbox<M> {
    state: Mutex<MailboxState<M>>,
    changed: Notify,
}

struct MailboxState<M> {
    queue: VecDeque<M>,
    closed: bool,
}

impl<M: Send + 'static> Mailbox<M> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MailboxState {
                queue: VecDeque::new(),
                closed: false,
            }),
            changed: Notify::new(),
        }
    }

    /// Queues a message. Returns `false` if the mailbox is already closed.
    pub fn push(&self, message: M) -> bool {
        {
            let mut state = self.state();
            if state.closed {
                return false;
            }
            state.queue.push_back(message);
        }
        self.changed.notify_waiters();
        true
    }

    pub fn pop(&self) -> Option<M> {
        self.state().queue.pop_front()
    }

    /// Marks the sender side as gone. Pending messages can still be popped.
    pub fn close(&self) {
        self.state().closed = true;
        self.changed.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn len(&self) -> usize {
        self.state().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().queue.is_empty()
    }

    /// Completes once the mailbox is closed.
    pub async fn closed(&self) {
        loop {
            let changed = self.changed.notified();
            if self.is_closed() {
                return;
            }
            changed.await;
        }
    }

    fn state(&self) -> MutexGuard<'_, MailboxState<M>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<M: Send + 'static> Default for Mailbox<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<M: Send + 'static> Pollable for Mailbox<M> {
    fn is_readable(&self) -> bool {
        let state = self.state();
        state.closed || !state.queue.is_empty()
    }

    async fn readable(&self) {
        loop {
            // Register interest before checking so a push in between is not lost.
            let changed = self.changed.notified();
            if self.is_readable() {
                return;
            }
            changed.await;
        }
    }
}

impl<M> fmt::Debug for Mailbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Mailbox")
            .field("pending", &state.queue.len())
            .field("closed", &state.closed)
            .finish()
    }
}
