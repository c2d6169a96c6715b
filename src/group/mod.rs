pub mod builder;
mod select;

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use indexmap::IndexMap;
use thiserror::Error;
use tokio::time::Instant;

use crate::{
    channel::{Channel, Handle, HandleId},
    group::builder::DEFAULT_GRACEFUL_TIMEOUT,
    task::{Signal, Suspender, Task, TaskId},
    TaskError, TaskResult,
};

#[derive(Debug, Error)]
pub enum GroupError {
    /// The message handler passed to [`Group::wait_for`] failed.
    #[error("message handler failed: {0}")]
    Handler(#[source] TaskError),
    /// `wait_for` was called from a task nobody can resume any more.
    #[error("wait_for called from a task without a resumer")]
    Detached,
    /// Another task registered the same handle while this one was waiting.
    #[error("{0} was taken over by another task")]
    Displaced(HandleId),
}

/// How [`Group::stop`] treats the graceful phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Graceful {
    /// Use the group's configured graceful timeout.
    Default,
    /// Skip straight to terminate.
    Disabled,
    Timeout(Duration),
}

impl Graceful {
    fn resolve(self, default: Duration) -> Option<Duration> {
        match self {
            Graceful::Default => Some(default),
            Graceful::Disabled => None,
            Graceful::Timeout(timeout) => Some(timeout),
        }
    }
}

impl From<bool> for Graceful {
    fn from(enabled: bool) -> Self {
        if enabled {
            Graceful::Default
        } else {
            Graceful::Disabled
        }
    }
}

impl From<Duration> for Graceful {
    fn from(timeout: Duration) -> Self {
        Graceful::Timeout(timeout)
    }
}

impl From<Option<Duration>> for Graceful {
    fn from(timeout: Option<Duration>) -> Self {
        timeout.map_or(Graceful::Disabled, Graceful::Timeout)
    }
}

struct Entry {
    handle: Handle,
    task: Task,
}

#[derive(Default)]
struct State {
    /// Tasks suspended inside `wait_for`, in registration order.
    running: IndexMap<HandleId, Entry>,
    /// Armed between `suspend` and `resume`.
    queue: Option<Vec<Task>>,
}

struct Inner {
    state: Mutex<State>,
    graceful_timeout: Duration,
}

/// Cooperative scheduler for the tasks watching a set of children.
///
/// The group owns no children. It keeps track of which task is waiting on
/// which [`Handle`], performs the one blocking multiplex-wait over all of
/// them, and resumes tasks when their handle turns readable or when a
/// control signal is broadcast. Clones share the same state, so tasks can
/// hold a clone while the owner drives it.
///
/// Every task resumed by the group runs to its next suspension point before
/// the group moves on. A task that never reaches one stalls the whole group,
/// and a task that ignores both [`Signal::Interrupt`] and
/// [`Signal::Terminate`] makes [`Group::stop`] wait forever.
#[derive(Clone)]
pub struct Group {
    inner: Arc<Inner>,
}

impl Group {
    pub fn new() -> Self {
        Self::with_graceful_timeout(DEFAULT_GRACEFUL_TIMEOUT)
    }

    pub(crate) fn with_graceful_timeout(graceful_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                graceful_timeout,
            }),
        }
    }

    /// Whether any task is currently waiting on a child.
    pub fn is_running(&self) -> bool {
        !self.state().running.is_empty()
    }

    pub fn any(&self) -> bool {
        self.is_running()
    }

    pub fn is_empty(&self) -> bool {
        self.state().running.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state().running.len()
    }

    pub fn graceful_timeout(&self) -> Duration {
        self.inner.graceful_timeout
    }

    /// Waits on `channel` from inside a task until the child concludes.
    ///
    /// The calling task is registered under the channel's handle and
    /// suspended. Each time it is resumed it reacts to the signal:
    /// `Interrupt` and `Terminate` are forwarded to the channel, otherwise
    /// the next pending message goes to `on_message`. When there is neither a
    /// signal nor a message the child is joined through [`Channel::wait`].
    ///
    /// The handle is removed again on every way out, including a failing
    /// handler and the task future being dropped.
    pub async fn wait_for<C, F>(
        &self,
        suspender: &mut Suspender,
        channel: &mut C,
        mut on_message: F,
    ) -> Result<C::Output, GroupError>
    where
        C: Channel,
        F: FnMut(C::Message) -> TaskResult + Send,
    {
        let task = suspender.task().ok_or(GroupError::Detached)?;
        let registration = Registration::new(self, channel.handle(), task);

        while registration.is_current() {
            match suspender.suspend().await {
                Signal::Interrupt => channel.interrupt(),
                Signal::Terminate => channel.terminate(),
                Signal::Ready => match channel.receive() {
                    Some(message) => on_message(message).map_err(GroupError::Handler)?,
                    None => return Ok(channel.wait().await),
                },
            }
        }

        Err(GroupError::Displaced(registration.id))
    }

    /// Lets children make progress for at most `duration`.
    ///
    /// Tasks deferred before the call are started first. Tasks that defer
    /// during the call stay queued until the next `sleep` or `wait`.
    pub async fn sleep(&self, duration: Duration) {
        self.resume().await;
        self.suspend();
        self.wait_for_children(Some(duration)).await;
    }

    /// Starts any deferred tasks and waits until no task is left.
    pub async fn wait(&self) {
        self.resume().await;
        while self.is_running() {
            self.wait_for_children(None).await;
        }
    }

    /// Resumes every running task with [`Signal::Interrupt`].
    pub async fn interrupt(&self) {
        self.broadcast(Signal::Interrupt).await;
    }

    /// Resumes every running task with [`Signal::Terminate`].
    pub async fn terminate(&self) {
        self.broadcast(Signal::Terminate).await;
    }

    /// Stops every child: interrupt, wait up to the graceful deadline,
    /// terminate whatever is left, then wait for all of them.
    ///
    /// Missing the deadline is not an error, it only ends the graceful phase.
    pub async fn stop(&self, graceful: impl Into<Graceful>) {
        if let Some(timeout) = graceful.into().resolve(self.inner.graceful_timeout) {
            debug!(?timeout, "stopping group gracefully");
            let start = Instant::now();

            self.interrupt().await;

            while self.any() {
                match timeout
                    .checked_sub(start.elapsed())
                    .filter(|remaining| !remaining.is_zero())
                {
                    Some(remaining) => self.wait_for_children(Some(remaining)).await,
                    None => {
                        debug!(remaining = self.len(), "graceful deadline exceeded");
                        self.wait_for_children(Some(Duration::ZERO)).await;
                        break;
                    }
                }
            }
        }

        self.terminate().await;
        self.wait().await;
    }

    /// Arms the deferred-start queue.
    ///
    /// Until the matching [`resume`](Self::resume), tasks calling
    /// [`defer`](Self::defer) park instead of running, so the owner can finish
    /// its own bookkeeping before they compete for scheduling.
    pub fn suspend(&self) {
        self.state().queue.get_or_insert_with(Vec::new);
    }

    /// Parks the calling task if the deferred-start queue is armed.
    pub async fn defer(&self, suspender: &mut Suspender) {
        if self.enqueue(suspender) {
            suspender.suspend().await;
        }
    }

    /// Disarms the queue and resumes every deferred task once, in order.
    pub async fn resume(&self) {
        let Some(queue) = self.take_queue() else {
            return;
        };

        debug!(deferred = queue.len(), "starting deferred tasks");
        for task in queue {
            if let Err(error) = task.resume(Signal::Ready).await {
                error!(%error, "deferred task completed before it was started");
            }
        }
    }

    /// One multiplex-wait over every registered handle. Each task whose
    /// handle is readable is resumed with [`Signal::Ready`].
    pub(crate) async fn wait_for_children(&self, duration: Option<Duration>) {
        let handles = self.handles();
        if handles.is_empty() {
            return;
        }

        for id in select::ready(&handles, duration).await {
            // An earlier resumption may have unregistered it.
            if let Some(task) = self.task_for(id) {
                self.resume_entry(id, &task, Signal::Ready).await;
            }
        }
    }

    async fn broadcast(&self, signal: Signal) {
        let running = self.snapshot();
        debug!(%signal, running = running.len(), "broadcasting to running tasks");

        for (id, task) in running {
            if self.is_registered(id, task.id()) {
                self.resume_entry(id, &task, signal).await;
            }
        }
    }

    async fn resume_entry(&self, id: HandleId, task: &Task, signal: Signal) {
        if let Err(error) = task.resume(signal).await {
            error!(%error, %id, "registered task completed without unregistering");
            self.unregister(id, task.id());
        }
    }

    fn enqueue(&self, suspender: &Suspender) -> bool {
        let mut state = self.state();
        match (state.queue.as_mut(), suspender.task()) {
            (Some(queue), Some(task)) => {
                queue.push(task);
                true
            }
            _ => false,
        }
    }

    fn take_queue(&self) -> Option<Vec<Task>> {
        self.state().queue.take()
    }

    fn handles(&self) -> Vec<Handle> {
        self.state()
            .running
            .values()
            .map(|entry| entry.handle.clone())
            .collect()
    }

    fn snapshot(&self) -> Vec<(HandleId, Task)> {
        self.state()
            .running
            .iter()
            .map(|(id, entry)| (*id, entry.task.clone()))
            .collect()
    }

    fn task_for(&self, id: HandleId) -> Option<Task> {
        self.state().running.get(&id).map(|entry| entry.task.clone())
    }

    fn is_registered(&self, id: HandleId, task: TaskId) -> bool {
        self.state()
            .running
            .get(&id)
            .is_some_and(|entry| entry.task.id() == task)
    }

    fn register(&self, handle: Handle, task: Task) {
        self.state()
            .running
            .insert(handle.id(), Entry { handle, task });
    }

    fn unregister(&self, id: HandleId, task: TaskId) {
        let mut state = self.state();
        if state
            .running
            .get(&id)
            .is_some_and(|entry| entry.task.id() == task)
        {
            state.running.shift_remove(&id);
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Group {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("Group")
            .field("running", &state.running.keys().collect::<Vec<_>>())
            .field("deferred", &state.queue.as_ref().map(Vec::len))
            .field("graceful_timeout", &self.inner.graceful_timeout)
            .finish()
    }
}

/// Keeps a task registered for as long as it is alive.
struct Registration<'a> {
    group: &'a Group,
    id: HandleId,
    task: TaskId,
}

impl<'a> Registration<'a> {
    fn new(group: &'a Group, handle: Handle, task: Task) -> Self {
        let id = handle.id();
        let task_id = task.id();
        group.register(handle, task);
        Self {
            group,
            id,
            task: task_id,
        }
    }

    fn is_current(&self) -> bool {
        self.group.is_registered(self.id, self.task)
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.group.unregister(self.id, self.task);
    }
}
