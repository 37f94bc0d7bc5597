use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum JobFailure<E> {
    #[error("{0}")]
    Failed(E),
    #[error("job panicked: {0}")]
    Panicked(String),
}

pub type JobResult<T, E> = Result<T, JobFailure<E>>;

/// Runs independent jobs with at most `limit` of them in flight.
///
/// Admission is a counting semaphore: each job holds a permit for exactly as long as it
/// runs, and the permit is returned when the job's task ends, whether it succeeded,
/// failed or panicked. A failing job never cancels its siblings.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    limit: usize,
}

impl WorkerPool {
    /// A limit of zero is raised to one.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Runs every job and returns their outcomes in submission order once all have finished.
    pub async fn run<I, Fut, T, E>(&self, jobs: I) -> Vec<JobResult<T, E>>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.limit));
        let handles: Vec<JoinHandle<Result<T, E>>> = jobs
            .into_iter()
            .map(|job| {
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await;
                    job.await
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(match handle.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(JobFailure::Failed(e)),
                Err(join_error) => Err(JobFailure::Panicked(join_error.to_string())),
            });
        }
        results
    }
}
