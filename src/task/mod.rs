use std::{
    fmt,
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Value a task is resumed with.
///
/// A task decides for itself how to react: the group never raises a signal
/// as a failure inside the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Nothing to act on: a message may be available now.
    Ready,
    /// Graceful stop requested.
    Interrupt,
    /// Hard stop requested.
    Terminate,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::Interrupt => write!(f, "interrupt"),
            Self::Terminate => write!(f, "terminate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ResumeError {
    /// The task body already returned. Resuming it is a programming error.
    #[error("{0} has already completed")]
    Completed(TaskId),
}

/// One step of the rendezvous: the signal plus a baton the task holds while it
/// runs. The resumer gets control back when the baton is dropped.
struct Resumption {
    signal: Signal,
    baton: oneshot::Sender<()>,
}

/// Resumer side of a cooperative task.
///
/// A task runs only between a [`Task::resume`] and its next suspension, so at
/// most one of the tasks driven by the same owner is ever making progress.
/// Cloning the handle does not clone the task.
#[derive(Debug, Clone)]
pub struct Task {
    id: TaskId,
    tx: mpsc::Sender<Resumption>,
}

impl Task {
    /// Creates a task on the tokio runtime. The body does not run until the
    /// first [`resume`](Self::resume).
    pub fn spawn<F, Fut>(body: F) -> Self
    where
        F: FnOnce(Suspender) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = TaskId::next();
        let (tx, rx) = mpsc::channel(1);
        let mut suspender = Suspender {
            id,
            rx,
            current: tx.downgrade(),
            baton: None,
        };

        tokio::spawn(async move {
            if suspender.start().await {
                body(suspender).await;
            }
        });

        Self { id, tx }
    }

    /// Spawns the task and runs it up to its first suspension point.
    pub async fn start<F, Fut>(body: F) -> Result<Self, ResumeError>
    where
        F: FnOnce(Suspender) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = Self::spawn(body);
        task.resume(Signal::Ready).await?;
        Ok(task)
    }

    /// Runs the task until it suspends again or completes.
    pub async fn resume(&self, signal: Signal) -> Result<(), ResumeError> {
        let (baton, released) = oneshot::channel();
        self.tx
            .send(Resumption { signal, baton })
            .await
            .map_err(|_| ResumeError::Completed(self.id))?;
        // Err means the body finished and dropped the baton, which also hands
        // control back.
        let _ = released.await;
        Ok(())
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn is_completed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Task side of the rendezvous, handed to the task body.
// Field order matters: `rx` must be dropped before `baton` so a resumer that
// wakes on the released baton already observes the task as completed.
pub struct Suspender {
    id: TaskId,
    rx: mpsc::Receiver<Resumption>,
    current: mpsc::WeakSender<Resumption>,
    baton: Option<oneshot::Sender<()>>,
}

impl Suspender {
    async fn start(&mut self) -> bool {
        match self.rx.recv().await {
            Some(resumption) => {
                self.baton = Some(resumption.baton);
                true
            }
            None => false,
        }
    }

    /// Hands control back to the resumer and waits for the next signal.
    ///
    /// Once every [`Task`] handle is gone nobody can resume the task again, so
    /// this returns [`Signal::Terminate`] to let the body wind down.
    pub async fn suspend(&mut self) -> Signal {
        drop(self.baton.take());
        match self.rx.recv().await {
            Some(Resumption { signal, baton }) => {
                self.baton = Some(baton);
                signal
            }
            None => Signal::Terminate,
        }
    }

    /// Resumer handle of the running task, `None` once it can no longer be resumed.
    pub fn task(&self) -> Option<Task> {
        self.current.upgrade().map(|tx| Task { id: self.id, tx })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }
}

impl fmt::Debug for Suspender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suspender")
            .field("id", &self.id)
            .field("running", &self.baton.is_some())
            .finish()
    }
}
