use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::debug;

use crate::error::ConfigError;

/// Fixed number of slots; each slot runs one job at a time.
///
/// The coordinator waits for a free slot before starting the next job, so
/// at most `workers` jobs are ever running. Results come back in
/// submission order regardless of which job finishes first.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self, ConfigError> {
        if workers == 0 {
            return Err(ConfigError::InvalidWorkerCount(workers));
        }
        Ok(Self { workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `job` over every task, at most `workers` at a time.
    ///
    /// A job that panics shows up as `Err(JoinError)` in its slot of the
    /// returned vector; its siblings are unaffected.
    pub async fn run<T, R, F, Fut>(&self, tasks: Vec<T>, job: F) -> Vec<Result<R, JoinError>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let slots = Arc::new(Semaphore::new(self.workers));
        let job = Arc::new(job);
        let mut handles = Vec::with_capacity(tasks.len());

        for (index, task) in tasks.into_iter().enumerate() {
            let permit = Arc::clone(&slots)
                .acquire_owned()
                .await
                .expect("worker pool semaphore is never closed");
            debug!("Slot acquired for task {}", index);

            let job = Arc::clone(&job);
            handles.push(tokio::spawn(async move {
                let result = (*job)(task).await;
                drop(permit);
                result
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await);
        }
        results
    }
}
