mod common;

use std::time::Duration;

use task_container::{
    notify::{Client, Message},
    Channel, Child, ExitStatus, Group, Task,
};
use tokio::time::{pause, Instant};

use common::{assert_elapsed, events, new_log, record, Log};

/// Starts a task that waits on `child`, logging messages and the exit status.
async fn supervise<M>(group: &Group, mut child: Child<M>, log: &Log) -> Task
where
    M: std::fmt::Display + Send + 'static,
{
    let group = group.clone();
    let log = log.clone();
    Task::start(move |mut suspender| async move {
        let status = group
            .wait_for(&mut suspender, &mut child, |message| {
                record(&log, format!("message:{message}"));
                Ok(())
            })
            .await;
        match status {
            Ok(status) => record(&log, format!("exit:{status}")),
            Err(error) => record(&log, format!("error:{error}")),
        }
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn test_child_messages_arrive_in_order() {
    pause();
    let group = Group::new();
    let log = new_log();

    let child = Child::<String>::spawn(|instance| async move {
        instance.send("one");
        instance.send("two");
        Ok(())
    });
    supervise(&group, child, &log).await;

    group.wait().await;

    assert_eq!(
        events(&log),
        vec!["message:one", "message:two", "exit:completed"]
    );
}

#[tokio::test]
async fn test_child_honours_interrupt() {
    pause();
    let group = Group::new();
    let log = new_log();

    let child = Child::<String>::spawn(|instance| async move {
        instance.interrupted().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        instance.send("bye");
        Ok(())
    });
    supervise(&group, child, &log).await;

    let start = Instant::now();
    group.stop(Duration::from_secs(1)).await;

    assert_elapsed(start, Duration::from_millis(100));
    assert_eq!(events(&log), vec!["message:bye", "exit:completed"]);
}

#[tokio::test]
async fn test_child_ignoring_interrupt_is_terminated() {
    pause();
    let group = Group::new();
    let log = new_log();

    let child = Child::<String>::spawn(|_instance| async move {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    });
    supervise(&group, child, &log).await;

    let start = Instant::now();
    group.stop(Duration::from_millis(500)).await;

    assert_elapsed(start, Duration::from_millis(500));
    assert_eq!(events(&log), vec!["exit:terminated"]);
    assert!(group.is_empty());
}

#[tokio::test]
async fn test_failing_child_reports_reason() {
    pause();
    let group = Group::new();
    let log = new_log();

    let child = Child::<String>::spawn(|_instance| async move {
        Err(anyhow::anyhow!("boom"))
    });
    supervise(&group, child, &log).await;

    group.wait().await;

    assert_eq!(events(&log), vec!["exit:failed: boom"]);
}

#[tokio::test]
async fn test_child_reports_readiness_through_client() {
    pause();
    let group = Group::new();
    let log = new_log();

    let child = Child::<Message>::spawn(|instance| async move {
        instance.ready()?;
        instance.status("serving")?;
        instance.interrupted().await;
        Ok(())
    });
    supervise(&group, child, &log).await;

    group.sleep(Duration::from_millis(10)).await;
    group.sleep(Duration::from_millis(10)).await;
    assert_eq!(
        events(&log),
        vec!["message:READY=1", "message:STATUS=serving"]
    );

    group.stop(true).await;
    assert_eq!(events(&log).last().unwrap(), "exit:completed");
}

#[tokio::test]
async fn test_child_channel_without_group() {
    let mut child = Child::<String>::spawn(|instance| async move {
        instance.send("hello");
        instance.interrupted().await;
        Ok(())
    });

    child.handle().readable().await;
    assert_eq!(child.receive(), Some("hello".to_string()));
    assert!(!child.is_finished());

    child.interrupt();
    assert_eq!(child.wait().await, ExitStatus::Completed);
    assert_eq!(child.status(), Some(&ExitStatus::Completed));
    assert!(child.handle().is_readable());
}
