//! Request Rate Limiter
//!
//! A throttled FIFO task queue with a single worker. Tasks start strictly in
//! submission order, one at a time, spaced by at least `1000 / R` ms. Each
//! task's result goes back to its own caller only, so a failing task never
//! affects the ones queued behind it.

use std::collections::VecDeque;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, warn};

use crate::config::LimiterConfig;

/// Errors returned to the submitter of a task
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SubmitError<E> {
    /// The task ran and failed
    #[error("{0}")]
    Task(E),

    /// The task panicked or the worker went away before it completed
    #[error("Task aborted before completion")]
    Aborted,
}

type Job = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

struct QueueState {
    jobs: VecDeque<Job>,
    draining: bool,
    last_start: Option<Instant>,
}

struct Shared {
    queue: Mutex<QueueState>,
    delay: Duration,
    cooldown: Duration,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Throttled single-worker task queue
///
/// Cloning is cheap; clones share the same queue and budget.
#[derive(Clone)]
pub struct RateLimiter {
    shared: Arc<Shared>,
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_second` task starts per second
    pub fn new(requests_per_second: u32) -> Self {
        Self::with_config(&LimiterConfig::new(requests_per_second))
    }

    pub fn with_config(config: &LimiterConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(QueueState {
                    jobs: VecDeque::new(),
                    draining: false,
                    last_start: None,
                }),
                delay: config.delay(),
                cooldown: config.cooldown(),
            }),
        }
    }

    /// Minimum spacing between task starts
    pub fn delay(&self) -> Duration {
        self.shared.delay
    }

    /// Number of tasks waiting to start
    pub fn queue_len(&self) -> usize {
        self.shared.lock().jobs.len()
    }

    /// Queue a task
    ///
    /// The task is enqueued before this function returns, so submission order
    /// is call order even if the returned futures are awaited in another
    /// order. Must be called from within a Tokio runtime.
    ///
    /// # Arguments
    /// * `task` - Zero-argument closure producing the future to run
    ///
    /// # Returns
    /// A future resolving to the task's value, or to [`SubmitError::Task`]
    /// with its error
    pub fn submit<F, Fut, T, E>(&self, task: F) -> impl Future<Output = Result<T, SubmitError<E>>> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let cooldown = self.shared.cooldown;

        let job: Job = Box::new(move || -> Pin<Box<dyn Future<Output = ()> + Send>> {
            Box::pin(async move {
                let result = task().await;
                let throttled = match &result {
                    Err(err) if !cooldown.is_zero() => {
                        Some(err.to_string()).filter(|message| looks_rate_limited(message))
                    }
                    _ => None,
                };
                if let Some(message) = throttled {
                    warn!("Rate limited by node, holding queue for {:?}: {}", cooldown, message);
                    sleep(cooldown).await;
                }
                let _ = result_tx.send(result);
            })
        });

        self.enqueue(job);

        async move {
            match result_rx.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(SubmitError::Task(err)),
                Err(_) => Err(SubmitError::Aborted),
            }
        }
    }

    fn enqueue(&self, job: Job) {
        let start_worker = {
            let mut state = self.shared.lock();
            state.jobs.push_back(job);
            !std::mem::replace(&mut state.draining, true)
        };

        if start_worker {
            tokio::spawn(drain(Arc::clone(&self.shared)));
        }
    }
}

/// The single worker: runs queued jobs until the queue is empty
async fn drain(shared: Arc<Shared>) {
    loop {
        let (job, last_start) = {
            let mut state = shared.lock();
            match state.jobs.pop_front() {
                Some(job) => (job, state.last_start),
                None => {
                    state.draining = false;
                    return;
                }
            }
        };

        // A restarted worker still honors the spacing since the previous start
        if let Some(last) = last_start {
            let ready_at = last + shared.delay;
            if ready_at > Instant::now() {
                sleep_until(ready_at).await;
            }
        }
        shared.lock().last_start = Some(Instant::now());

        if let Err(err) = tokio::spawn(job()).await {
            warn!("Rate-limited task did not complete: {}", err);
        }

        let pending = shared.lock().jobs.len();
        if pending > 0 {
            debug!("{} requests pending, waiting {:?}", pending, shared.delay);
            sleep(shared.delay).await;
        }
    }
}

/// Whether an error message reports node-side throttling
pub fn looks_rate_limited(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("rate limit")
        || lower.contains("too many requests")
        || lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|token| token == "429")
}
