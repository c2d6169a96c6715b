//! # task-container
//!
//! `task-container` is the scheduling core of a process supervisor.
//! A [`Group`] drives a set of cooperatively scheduled monitoring tasks, one per
//! supervised child, and coordinates their graceful interrupt, hard termination
//! and join. The [`notify`] module picks the readiness transport a supervised
//! process uses to tell its supervisor it is ready.
//!
//! ## Quick example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use task_container::{Child, Group, Task};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let group = Group::new();
//!
//!     let watcher = group.clone();
//!     Task::start(move |mut suspender| async move {
//!         let mut child = Child::<String>::spawn(|instance| async move {
//!             instance.send("hello");
//!             instance.interrupted().await;
//!             Ok(())
//!         });
//!         let status = watcher
//!             .wait_for(&mut suspender, &mut child, |message| {
//!                 println!("child says {message}");
//!                 Ok(())
//!             })
//!             .await;
//!         println!("child exited: {status:?}");
//!     })
//!     .await?;
//!
//!     group.sleep(Duration::from_millis(100)).await;
//!     group.stop(Duration::from_secs(1)).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Scheduling model
//!
//! Exactly one logical unit runs at a time: either the owner driving the
//! group, or the one task it resumed. Tasks give control back only at
//! suspension points inside [`Group::wait_for`] and [`Group::defer`].
//!
//! | Group method             | Purpose                                                   |
//! | ------------------------ | --------------------------------------------------------- |
//! | `wait_for(s, ch, f)`     | Register the calling task and pump `ch` until it concludes |
//! | `sleep(d)`               | Let children progress for at most `d`                      |
//! | `wait()`                 | Block until every registered task has finished             |
//! | `interrupt()`            | Ask every child to stop gracefully                         |
//! | `terminate()`            | Ask every child to stop now                                |
//! | `stop(graceful)`         | Interrupt, wait up to a deadline, terminate, join          |
//!
//! ## License
//!
//! [MIT](./LICENSE)

#[macro_use]
mod log;

pub mod channel;
pub mod group;
pub mod notify;
pub mod task;

pub use channel::{
    child::{Child, ExitStatus, Instance},
    Channel, Handle, HandleId, Mailbox, Pollable,
};
pub use group::{builder::GroupBuilder, Graceful, Group, GroupError};
pub use task::{ResumeError, Signal, Suspender, Task, TaskId};

pub type TaskError = anyhow::Error;

pub type TaskResult = Result<(), TaskError>;
