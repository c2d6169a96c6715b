use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use task_container::{Channel, Group, Handle, Mailbox, Task};

pub type Log = Arc<Mutex<Vec<String>>>;

#[allow(unused)]
pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

#[allow(unused)]
pub fn events(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[allow(unused)]
pub fn record(log: &Log, event: impl Into<String>) {
    log.lock().unwrap().push(event.into());
}

/// What a scripted child does when it receives a control signal.
#[derive(Debug, Clone, Copy)]
#[allow(unused)]
pub enum Reaction {
    Ignore,
    Finish,
    FinishAfter(Duration),
}

/// A channel whose child is scripted: it finishes (closes its mailbox)
/// according to its reactions and records every call in a shared log.
pub struct ScriptedChannel {
    pub name: String,
    mailbox: Arc<Mailbox<String>>,
    handle: Handle,
    log: Log,
    on_interrupt: Reaction,
    on_terminate: Reaction,
}

#[allow(unused)]
impl ScriptedChannel {
    pub fn new(name: &str, log: &Log) -> Self {
        let mailbox = Arc::new(Mailbox::new());
        Self {
            name: name.to_string(),
            handle: Handle::new(mailbox.clone()),
            mailbox,
            log: log.clone(),
            on_interrupt: Reaction::Finish,
            on_terminate: Reaction::Finish,
        }
    }

    pub fn on_interrupt(mut self, reaction: Reaction) -> Self {
        self.on_interrupt = reaction;
        self
    }

    pub fn on_terminate(mut self, reaction: Reaction) -> Self {
        self.on_terminate = reaction;
        self
    }

    pub fn mailbox(&self) -> Arc<Mailbox<String>> {
        self.mailbox.clone()
    }

    fn react(&self, reaction: Reaction) {
        match reaction {
            Reaction::Ignore => {}
            Reaction::Finish => self.mailbox.close(),
            Reaction::FinishAfter(delay) => {
                let mailbox = self.mailbox.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    mailbox.close();
                });
            }
        }
    }
}

#[async_trait]
impl Channel for ScriptedChannel {
    type Message = String;
    type Output = String;

    fn handle(&self) -> Handle {
        self.handle.clone()
    }

    fn receive(&mut self) -> Option<String> {
        self.mailbox.pop()
    }

    fn interrupt(&mut self) {
        record(&self.log, format!("{}:interrupt", self.name));
        self.react(self.on_interrupt);
    }

    fn terminate(&mut self) {
        record(&self.log, format!("{}:terminate", self.name));
        self.react(self.on_terminate);
    }

    async fn wait(&mut self) -> String {
        self.mailbox.closed().await;
        format!("{} done", self.name)
    }
}

/// Starts a task that waits on `channel` through `group`, logging every
/// message and the final result. Returns once the task is registered.
#[allow(unused)]
pub async fn watch(group: &Group, mut channel: ScriptedChannel, log: &Log) -> Task {
    let group = group.clone();
    let log = log.clone();
    Task::start(move |mut suspender| async move {
        let name = channel.name.clone();
        let result = group
            .wait_for(&mut suspender, &mut channel, |message| {
                record(&log, format!("{name}:message:{message}"));
                Ok(())
            })
            .await;
        match result {
            Ok(output) => record(&log, format!("{name}:exit:{output}")),
            Err(error) => record(&log, format!("{name}:error:{error}")),
        }
    })
    .await
    .unwrap()
}

/// Asserts `start.elapsed()` is `expected`, give or take the millisecond
/// rounding the paused clock applies to timer deadlines.
#[allow(unused)]
#[track_caller]
pub fn assert_elapsed(start: tokio::time::Instant, expected: Duration) {
    let elapsed = start.elapsed();
    assert!(
        elapsed >= expected && elapsed <= expected + Duration::from_millis(5),
        "expected about {expected:?} to have elapsed, got {elapsed:?}"
    );
}
