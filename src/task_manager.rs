//! Manages the lifecycle of all spawned tasks in the application.
use futures::future::join_all;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// A centralized manager for all spawned tasks.
///
/// Tasks are expected to stop on their own once the shutdown signal is
/// observed. Calls to WeCom are not cancellable, so a task still retrying
/// when the grace period ends is aborted instead.
#[derive(Clone, Debug)]
pub struct TaskManager {
    handles: Arc<Mutex<Vec<(&'static str, JoinHandle<()>)>>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl TaskManager {
    pub fn new(shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            handles: Arc::new(Mutex::new(Vec::new())),
            shutdown_rx,
        }
    }

    /// Spawns a new task and adds its handle to the manager.
    pub fn spawn<F>(&self, name: &'static str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        debug!(task_name = name, "Spawning task");
        let handle = tokio::spawn(future);
        match self.handles.lock() {
            Ok(mut handles) => handles.push((name, handle)),
            Err(_) => error!(
                task_name = name,
                "Task registry poisoned; task will not be awaited at shutdown."
            ),
        }
    }

    /// Returns a clone of the shutdown receiver.
    pub fn get_shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Waits up to `grace` for all managed tasks to complete, then aborts the
    /// ones still running.
    pub async fn shutdown(self, grace: Duration) {
        let handles: Vec<_> = match self.handles.lock() {
            Ok(mut handles) => handles.drain(..).collect(),
            Err(_) => {
                error!("Task registry poisoned; tasks will be dropped.");
                return;
            }
        };
        info!(
            "TaskManager shutting down. Waiting for {} tasks to complete...",
            handles.len()
        );

        let (names, handles): (Vec<&'static str>, Vec<JoinHandle<()>>) =
            handles.into_iter().unzip();
        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();

        match timeout(grace, join_all(handles)).await {
            Ok(results) => {
                let mut panicked = 0;
                for (name, result) in names.iter().zip(results) {
                    match result {
                        Ok(()) => debug!(task_name = name, "Task shut down gracefully."),
                        Err(e) => {
                            error!(task_name = name, error = %e, "Task panicked during shutdown.");
                            panicked += 1;
                        }
                    }
                }
                if panicked == 0 {
                    info!("All tasks shut down gracefully.");
                } else {
                    error!("{} tasks panicked during shutdown.", panicked);
                }
            }
            Err(_) => {
                for (name, abort) in names.iter().zip(aborts) {
                    if !abort.is_finished() {
                        warn!(task_name = name, "Task still running after {:?}, aborting.", grace);
                        abort.abort();
                    }
                }
            }
        }
    }
}
