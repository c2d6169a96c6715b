use std::time::Duration;

use futures::future::select_all;

use crate::channel::{Handle, HandleId};

/// Waits until at least one handle is readable or `timeout` expires, then
/// reports every readable handle in the order given.
///
/// `None` waits without bound; a zero timeout only polls. An empty result
/// means the timeout expired.
pub(crate) async fn ready(handles: &[Handle], timeout: Option<Duration>) -> Vec<HandleId> {
    if handles.is_empty() {
        return Vec::new();
    }

    let ready = readable_now(handles);
    if !ready.is_empty() {
        return ready;
    }

    let any = select_all(handles.iter().map(Handle::readable));
    match timeout {
        Some(timeout) if timeout.is_zero() => return Vec::new(),
        Some(timeout) => {
            if tokio::time::timeout(timeout, any).await.is_err() {
                return Vec::new();
            }
        }
        None => {
            let _ = any.await;
        }
    }

    readable_now(handles)
}

fn readable_now(handles: &[Handle]) -> Vec<HandleId> {
    handles
        .iter()
        .filter(|handle| handle.is_readable())
        .map(Handle::id)
        .collect()
}
