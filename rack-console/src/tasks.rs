//! Background tasks of the console binary
//!
//! ```text
//! realtime_listener  Listener  websocket change feed
//! refresh_worker     Worker    debounced / stale catalog refresh
//! session_watcher    Listener  logs session snapshots and navigation
//! catalog_watcher    Listener  logs catalog revisions
//! ```
//!
//! All of them hang off one root [`CancellationToken`]. Shutdown cancels it,
//! then gives each task [`SHUTDOWN_GRACE`] to return before aborting it.

use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Owns a loop that does work (refresh worker)
    Worker,
    /// Follows an event source
    Listener,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Worker => write!(f, "worker"),
            TaskKind::Listener => write!(f, "listener"),
        }
    }
}

struct RegisteredTask {
    name: &'static str,
    kind: TaskKind,
    handle: JoinHandle<()>,
}

pub struct BackgroundTasks {
    tasks: Vec<RegisteredTask>,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token cancelled together with this registry
    pub fn child_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Spawn `task` with its own child token. A panic is logged, not propagated.
    pub fn spawn<F, Fut>(&mut self, name: &'static str, kind: TaskKind, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = self.child_token();
        let future = task(token.clone());
        let handle = tokio::spawn(async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(()) if !token.is_cancelled() => {
                    tracing::warn!(task = name, %kind, "Background task stopped on its own");
                }
                Ok(()) => {}
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(task = name, %kind, panic = %message, "Background task panicked");
                }
            }
        });
        self.register(name, kind, handle);
    }

    /// Track a task spawned elsewhere (the realtime listener)
    pub fn register(&mut self, name: &'static str, kind: TaskKind, handle: JoinHandle<()>) {
        tracing::debug!(task = name, %kind, "Registered background task");
        self.tasks.push(RegisteredTask { name, kind, handle });
    }

    pub fn log_summary(&self) {
        let names: Vec<_> = self
            .tasks
            .iter()
            .map(|t| format!("{}({})", t.name, t.kind))
            .collect();
        tracing::info!(count = self.tasks.len(), tasks = %names.join(", "), "Background tasks running");
    }

    /// Cancel every task and wait for it, aborting any that outlive the grace period
    pub async fn shutdown(self) {
        self.shutdown_with_grace(SHUTDOWN_GRACE).await;
    }

    async fn shutdown_with_grace(self, grace: Duration) -> usize {
        tracing::info!("Stopping {} background tasks", self.tasks.len());
        self.shutdown.cancel();

        let mut aborted = 0;
        for mut task in self.tasks {
            match tokio::time::timeout(grace, &mut task.handle).await {
                Ok(Ok(())) => tracing::debug!(task = task.name, "Task stopped"),
                Ok(Err(e)) => tracing::error!(task = task.name, error = %e, "Task failed"),
                Err(_) => {
                    tracing::warn!(task = task.name, "Task ignored cancellation, aborting");
                    task.handle.abort();
                    aborted += 1;
                }
            }
        }
        tracing::info!("Background tasks stopped");
        aborted
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_shutdown_cancels_spawned_tasks() {
        let mut tasks = BackgroundTasks::new();
        let stopped = Arc::new(AtomicBool::new(false));

        let flag = stopped.clone();
        tasks.spawn("catalog_watcher", TaskKind::Listener, move |token| async move {
            token.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        });
        let external = tasks.child_token();
        tasks.register(
            "realtime_listener",
            TaskKind::Listener,
            tokio::spawn(async move { external.cancelled().await }),
        );

        assert_eq!(tasks.shutdown_with_grace(Duration::from_secs(1)).await, 0);
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_task_is_aborted_after_grace() {
        let mut tasks = BackgroundTasks::new();
        tasks.spawn("refresh_worker", TaskKind::Worker, |_| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        assert_eq!(tasks.shutdown_with_grace(Duration::from_secs(1)).await, 1);
    }

    #[tokio::test]
    async fn test_panicking_task_is_contained() {
        let mut tasks = BackgroundTasks::new();
        tasks.spawn("session_watcher", TaskKind::Listener, |_| async {
            panic!("boom");
        });
        tokio::task::yield_now().await;
        assert_eq!(tasks.shutdown_with_grace(Duration::from_secs(1)).await, 0);
    }
}
