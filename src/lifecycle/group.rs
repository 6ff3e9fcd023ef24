//! Supervised task group.
//!
//! Every long-running task of the server (listeners, reconciliation peer,
//! metrics exporter) runs inside one [`TaskGroup`]. The group shares a
//! single cancellation token: stopping the group cancels every task, and
//! the first task to fail (error or panic) cancels the others.
//!
//! ```text
//! spawn("hkp") ─┐
//! spawn("hkps")─┼─► TaskTracker ──► wait(): first failure, after all exit
//! spawn("recon")┘        │
//!                        └── CancellationToken ◄── stop() / first failure
//! ```

use std::error::Error as StdError;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use futures_util::FutureExt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Observable state of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Stopped,
    Failed,
}

/// The first error reported by a task of the group.
#[derive(Debug, Clone, Error)]
#[error("task {task} failed: {source}")]
pub struct TaskFailure {
    pub task: String,
    #[source]
    pub source: Arc<dyn StdError + Send + Sync>,
}

#[derive(Debug, Error)]
#[error("panicked: {0}")]
struct Panicked(String);

pub struct TaskGroup {
    token: CancellationToken,
    tracker: TaskTracker,
    states: Arc<DashMap<String, TaskState>>,
    failure: Arc<OnceLock<TaskFailure>>,
}

impl TaskGroup {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            states: Arc::new(DashMap::new()),
            failure: Arc::new(OnceLock::new()),
        }
    }

    /// Token cancelled when the group stops.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Run `task` in the group. It receives the group's token and must
    /// return once that token is cancelled.
    pub fn spawn<F, Fut, E>(&self, name: &str, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: StdError + Send + Sync + 'static,
    {
        let name = name.to_string();
        self.states.insert(name.clone(), TaskState::Pending);

        let fut = task(self.token.clone());
        let token = self.token.clone();
        let states = Arc::clone(&self.states);
        let failure = Arc::clone(&self.failure);

        self.tracker.spawn(async move {
            states.insert(name.clone(), TaskState::Running);
            tracing::debug!(task = %name, "Task started");

            let source: Arc<dyn StdError + Send + Sync> =
                match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(Ok(())) => {
                        states.insert(name.clone(), TaskState::Stopped);
                        tracing::debug!(task = %name, "Task stopped");
                        return;
                    }
                    Ok(Err(e)) => Arc::new(e),
                    Err(panic) => Arc::new(Panicked(panic_message(panic.as_ref()))),
                };

            states.insert(name.clone(), TaskState::Failed);
            tracing::error!(task = %name, error = %source, "Task failed, stopping task group");
            let _ = failure.set(TaskFailure { task: name, source });
            token.cancel();
        });
    }

    /// Block until every task has exited. Returns the first failure, if any.
    pub async fn wait(&self) -> Result<(), TaskFailure> {
        self.tracker.close();
        self.tracker.wait().await;
        match self.failure.get() {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }

    /// Cancel every task and wait for them to exit. Safe to call repeatedly.
    pub async fn stop(&self) -> Result<(), TaskFailure> {
        if !self.token.is_cancelled() {
            tracing::info!(tasks = self.tracker.len(), "Stopping task group");
        }
        self.token.cancel();
        self.wait().await
    }

    /// Task states, sorted by task name.
    pub fn states(&self) -> Vec<(String, TaskState)> {
        let mut states: Vec<_> = self
            .states
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }

    pub fn state(&self, name: &str) -> Option<TaskState> {
        self.states.get(name).map(|entry| *entry.value())
    }
}

impl Default for TaskGroup {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
