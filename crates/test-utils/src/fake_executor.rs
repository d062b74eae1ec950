use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use batchflow::engine::{RunnableTask, TaskOutcome};
use batchflow::exec::ExecutorBackend;

/// A fake executor that:
/// - records which task urls were "run", in start order
/// - reports a scripted outcome per url (default: success)
/// - optionally keeps selected tasks running until their instance is
///   cancelled.
#[derive(Default)]
pub struct FakeExecutor {
    outcomes: HashMap<String, TaskOutcome>,
    hanging: HashSet<String>,
    delay: Duration,
    executed: Arc<Mutex<Vec<String>>>,
}

impl FakeExecutor {
    pub fn new(executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            executed,
            ..Self::default()
        }
    }

    pub fn with_outcome(mut self, url: &str, outcome: TaskOutcome) -> Self {
        self.outcomes.insert(url.to_string(), outcome);
        self
    }

    pub fn hang_until_cancelled(mut self, url: &str) -> Self {
        self.hanging.insert(url.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn execute<'a>(
        &'a self,
        task: &'a RunnableTask,
    ) -> Pin<Box<dyn Future<Output = TaskOutcome> + Send + 'a>> {
        Box::pin(async move {
            self.executed.lock().unwrap().push(task.task_url.clone());

            if self.hanging.contains(&task.task_url) {
                task.cancel.cancelled().await;
                return TaskOutcome::Cancelled;
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            self.outcomes
                .get(&task.task_url)
                .copied()
                .unwrap_or(TaskOutcome::Success)
        })
    }
}
