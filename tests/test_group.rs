mod common;

use std::time::Duration;

use task_container::{Group, GroupError, Task};
use tokio::time::{pause, Instant};

use common::{assert_elapsed, events, new_log, record, watch, Reaction, ScriptedChannel};

#[tokio::test]
async fn test_empty_group_has_nothing_running() {
    let group = Group::new();

    assert!(group.is_empty());
    assert!(!group.any());
    assert!(!group.is_running());
    assert_eq!(group.len(), 0);

    // Nothing to wait for, both return right away.
    group.wait().await;
    group.sleep(Duration::from_secs(3600)).await;
}

#[tokio::test]
async fn test_running_follows_registrations() {
    pause();
    let group = Group::new();
    let log = new_log();

    let a = ScriptedChannel::new("a", &log);
    let a_mailbox = a.mailbox();
    watch(&group, a, &log).await;
    assert!(group.any());
    assert!(!group.is_empty());
    assert_eq!(group.len(), 1);

    watch(&group, ScriptedChannel::new("b", &log), &log).await;
    assert_eq!(group.len(), 2);

    a_mailbox.close();
    group.sleep(Duration::from_millis(100)).await;

    assert_eq!(group.len(), 1);
    assert!(group.is_running());
    assert_eq!(events(&log), vec!["a:exit:a done"]);
}

#[tokio::test]
async fn test_messages_reach_the_handler() {
    pause();
    let group = Group::new();
    let log = new_log();

    let a = ScriptedChannel::new("a", &log);
    let mailbox = a.mailbox();
    watch(&group, a, &log).await;

    mailbox.push("hello".to_string());
    group.sleep(Duration::from_millis(100)).await;
    mailbox.push("world".to_string());
    group.sleep(Duration::from_millis(100)).await;

    assert_eq!(events(&log), vec!["a:message:hello", "a:message:world"]);
    assert_eq!(group.len(), 1, "a message alone does not end the wait");

    mailbox.close();
    group.wait().await;
    assert!(group.is_empty());
}

#[tokio::test]
async fn test_interrupt_then_terminate() {
    pause();
    let group = Group::new();
    let log = new_log();

    for name in ["a", "b"] {
        let channel = ScriptedChannel::new(name, &log)
            .on_interrupt(Reaction::Ignore)
            .on_terminate(Reaction::Finish);
        watch(&group, channel, &log).await;
    }

    group.interrupt().await;
    assert_eq!(events(&log), vec!["a:interrupt", "b:interrupt"]);
    assert_eq!(group.len(), 2, "interrupted tasks stay registered");

    group.terminate().await;
    assert_eq!(
        events(&log),
        vec!["a:interrupt", "b:interrupt", "a:terminate", "b:terminate"]
    );

    group.wait().await;
    assert!(group.is_empty());
    assert!(events(&log).contains(&"a:exit:a done".to_string()));
    assert!(events(&log).contains(&"b:exit:b done".to_string()));

    let start = Instant::now();
    group.wait().await;
    assert_elapsed(start, Duration::ZERO);
}

#[tokio::test]
async fn test_broadcast_follows_registration_order() {
    pause();
    let group = Group::new();
    let log = new_log();

    for name in ["c", "a", "b"] {
        let channel = ScriptedChannel::new(name, &log).on_interrupt(Reaction::Ignore);
        watch(&group, channel, &log).await;
    }

    group.interrupt().await;
    group.interrupt().await;

    assert_eq!(
        events(&log),
        vec![
            "c:interrupt",
            "a:interrupt",
            "b:interrupt",
            "c:interrupt",
            "a:interrupt",
            "b:interrupt",
        ]
    );
    group.stop(false).await;
}

#[tokio::test]
async fn test_failing_handler_unregisters() {
    pause();
    let group = Group::new();
    let log = new_log();

    let mut channel = ScriptedChannel::new("a", &log);
    let mailbox = channel.mailbox();

    let watcher = group.clone();
    let outcome = log.clone();
    Task::start(move |mut suspender| async move {
        let result = watcher
            .wait_for(&mut suspender, &mut channel, |message| {
                Err(anyhow::anyhow!("cannot handle {message}"))
            })
            .await;
        match result {
            Err(GroupError::Handler(error)) => record(&outcome, error.to_string()),
            other => record(&outcome, format!("unexpected: {other:?}")),
        }
    })
    .await
    .unwrap();
    assert_eq!(group.len(), 1);

    mailbox.push("boom".to_string());
    group.sleep(Duration::from_millis(10)).await;

    assert!(group.is_empty());
    assert_eq!(events(&log), vec!["cannot handle boom"]);
}

#[tokio::test]
async fn test_sleep_is_bounded() {
    pause();
    let group = Group::new();
    let log = new_log();
    watch(&group, ScriptedChannel::new("a", &log), &log).await;

    let start = Instant::now();
    group.sleep(Duration::from_millis(250)).await;

    assert_elapsed(start, Duration::from_millis(250));
    assert_eq!(group.len(), 1);
    assert!(events(&log).is_empty());
    group.stop(false).await;
}

#[tokio::test]
async fn test_sleep_returns_early_when_a_child_is_ready() {
    pause();
    let group = Group::new();
    let log = new_log();

    let a = ScriptedChannel::new("a", &log);
    let mailbox = a.mailbox();
    watch(&group, a, &log).await;

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        mailbox.push("ping".to_string());
    });

    let start = Instant::now();
    group.sleep(Duration::from_secs(1)).await;

    assert_elapsed(start, Duration::from_millis(50));
    assert_eq!(events(&log), vec!["a:message:ping"]);
    group.stop(false).await;
}
