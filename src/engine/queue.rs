// src/engine/queue.rs

//! Runnable queue shared between the runtime loop and the worker pool.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tracing::debug;

use crate::engine::cancel::CancelToken;
use crate::types::InstanceId;

/// Immutable snapshot of an eligible leaf, handed to whoever runs it.
#[derive(Debug, Clone)]
pub struct RunnableTask {
    pub instance_id: InstanceId,
    pub task_url: String,
    pub command: String,
    pub cancel: CancelToken,
}

impl RunnableTask {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[derive(Debug, Default)]
struct QueueShared {
    items: Mutex<VecDeque<RunnableTask>>,
    notify: Notify,
    closed: AtomicBool,
}

/// FIFO of runnable leaves.
///
/// The runtime loop pushes, workers pop. Waiting consumers are woken through
/// [`Notify`]; nobody polls.
#[derive(Debug, Clone, Default)]
pub struct RunnableQueue {
    shared: Arc<QueueShared>,
}

impl RunnableQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<RunnableTask>> {
        self.shared
            .items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, task: RunnableTask) {
        if self.is_closed() {
            debug!(task = %task.task_url, "queue closed; dropping runnable task");
            return;
        }
        self.items().push_back(task);
        self.shared.notify.notify_one();
    }

    /// Take the oldest task without waiting.
    pub fn try_pop(&self) -> Option<RunnableTask> {
        self.items().pop_front()
    }

    /// Wait for the next task. Returns `None` once the queue is closed and
    /// drained.
    pub async fn pop(&self) -> Option<RunnableTask> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            // Register interest before checking, so a push between the
            // check and the await is not lost.
            notified.as_mut().enable();

            if let Some(task) = self.try_pop() {
                return Some(task);
            }
            if self.is_closed() {
                return None;
            }
            notified.await;
        }
    }

    /// Drop every queued task of `instance`. Returns how many were removed.
    pub fn discard_instance(&self, instance: InstanceId) -> usize {
        let mut items = self.items();
        let before = items.len();
        items.retain(|t| t.instance_id != instance);
        before - items.len()
    }

    /// Stop accepting tasks and wake every waiting consumer.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Urls currently queued, oldest first.
    pub fn queued_urls(&self) -> Vec<String> {
        self.items().iter().map(|t| t.task_url.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn task(instance: InstanceId, url: &str) -> RunnableTask {
        RunnableTask {
            instance_id: instance,
            task_url: url.to_string(),
            command: "true".to_string(),
            cancel: CancelToken::new(),
        }
    }

    #[test]
    fn fifo_and_discard_by_instance() {
        let queue = RunnableQueue::new();
        let a = InstanceId::new();
        let b = InstanceId::new();
        queue.push(task(a, "/f/1"));
        queue.push(task(b, "/g/1"));
        queue.push(task(a, "/f/2"));

        assert_eq!(queue.discard_instance(a), 2);
        assert_eq!(queue.queued_urls(), vec!["/g/1".to_string()]);
        assert_eq!(queue.try_pop().map(|t| t.task_url), Some("/g/1".to_string()));
        assert!(queue.try_pop().is_none());
    }

    #[tokio::test]
    async fn pop_waits_for_push() {
        let queue = RunnableQueue::new();
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::task::yield_now().await;
        queue.push(task(InstanceId::new(), "/f/late"));

        let got = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("consumer should wake")
            .expect("consumer should not panic");
        assert_eq!(got.map(|t| t.task_url), Some("/f/late".to_string()));
    }

    #[tokio::test]
    async fn close_releases_waiters() {
        let queue = RunnableQueue::new();
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::task::yield_now().await;
        queue.close();

        let got = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("consumer should wake")
            .expect("consumer should not panic");
        assert!(got.is_none());

        queue.push(task(InstanceId::new(), "/f/after-close"));
        assert!(queue.is_empty());
    }
}
