use std::{fmt, future::Future, io, sync::Arc};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    channel::{Channel, Handle, Mailbox},
    notify::{Client, Message},
    TaskResult,
};

/// How a [`Child`] concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Completed,
    Failed(String),
    /// Stopped by [`Channel::terminate`].
    Terminated,
    Panicked,
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Completed)
    }

    pub fn was_terminated(&self) -> bool {
        matches!(self, ExitStatus::Terminated)
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Terminated => write!(f, "terminated"),
            Self::Panicked => write!(f, "panicked"),
        }
    }
}

/// A supervised child running as a tokio task.
///
/// The body gets an [`Instance`] to send messages back and to notice a
/// graceful interrupt. [`Channel::interrupt`] cancels the instance token,
/// [`Channel::terminate`] aborts the task outright.
pub struct Child<M> {
    mailbox: Arc<Mailbox<M>>,
    handle: Handle,
    token: CancellationToken,
    join: Option<JoinHandle<TaskResult>>,
    status: Option<ExitStatus>,
}

impl<M: Send + 'static> Child<M> {
    pub fn spawn<F, Fut>(body: F) -> Self
    where
        F: FnOnce(Instance<M>) -> Fut,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        let mailbox = Arc::new(Mailbox::new());
        let token = CancellationToken::new();
        let instance = Instance {
            mailbox: mailbox.clone(),
            token: token.clone(),
        };

        let run = body(instance);
        let closer = CloseOnDrop(mailbox.clone());
        let join = tokio::spawn(async move {
            // Dropped on return and on abort alike, so the handle turns readable.
            let _closer = closer;
            run.await
        });

        Self {
            handle: Handle::new(mailbox.clone()),
            mailbox,
            token,
            join: Some(join),
            status: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// The exit status, once [`Channel::wait`] has observed it.
    pub fn status(&self) -> Option<&ExitStatus> {
        self.status.as_ref()
    }
}

#[async_trait]
impl<M: Send + 'static> Channel for Child<M> {
    type Message = M;
    type Output = ExitStatus;

    fn handle(&self) -> Handle {
        self.handle.clone()
    }

    fn receive(&mut self) -> Option<M> {
        self.mailbox.pop()
    }

    fn interrupt(&mut self) {
        self.token.cancel();
    }

    fn terminate(&mut self) {
        if let Some(join) = &self.join {
            join.abort();
        }
    }

    async fn wait(&mut self) -> ExitStatus {
        if let Some(join) = self.join.take() {
            let status = match join.await {
                Ok(Ok(())) => ExitStatus::Completed,
                Ok(Err(error)) => ExitStatus::Failed(format!("{error:#}")),
                Err(error) if error.is_cancelled() => ExitStatus::Terminated,
                Err(_) => ExitStatus::Panicked,
            };
            self.status = Some(status);
        }
        self.status.clone().unwrap_or(ExitStatus::Terminated)
    }
}

impl<M> fmt::Debug for Child<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Child")
            .field("handle", &self.handle)
            .field("interrupted", &self.token.is_cancelled())
            .field("status", &self.status)
            .finish()
    }
}

/// The child's view of its own channel.
#[derive(Clone)]
pub struct Instance<M> {
    mailbox: Arc<Mailbox<M>>,
    token: CancellationToken,
}

impl<M: Send + 'static> Instance<M> {
    /// Sends a message to the supervising task.
    pub fn send(&self, message: impl Into<M>) {
        self.mailbox.push(message.into());
    }

    /// Completes once the supervisor asked for a graceful stop.
    pub async fn interrupted(&self) {
        self.token.cancelled().await;
    }

    pub fn is_interrupted(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// A child reports readiness the same way a separate process would.
impl Client for Instance<Message> {
    fn name(&self) -> &'static str {
        "instance"
    }

    fn send(&self, message: &Message) -> io::Result<()> {
        if self.mailbox.push(message.clone()) {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "supervisor channel closed",
            ))
        }
    }
}

struct CloseOnDrop<M: Send + 'static>(Arc<Mailbox<M>>);

impl<M: Send + 'static> Drop for CloseOnDrop<M> {
    fn drop(&mut self) {
        self.0.close();
    }
}
