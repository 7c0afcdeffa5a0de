//! Bounded fan-out of independent jobs.
//!
//! Runs a batch of futures on a [`JoinSet`], at most `max_concurrency` at a
//! time, and reports how each one ended: completed, panicked, or abandoned
//! because the batch was cancelled or ran past its deadline. A job never
//! affects its siblings.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};

/// Why a batch stopped before all its jobs completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    TimedOut(Duration),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("scan was cancelled"),
            Self::TimedOut(timeout) => write!(f, "scan timed out after {timeout:?}"),
        }
    }
}

/// How a job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEnd<T> {
    Completed(T),
    /// The job panicked, with the panic payload when it was a string
    Panicked(String),
    /// The job was aborted, or never started, when the batch stopped
    Abandoned(StopReason),
}

/// Outcome of one job, in completion order
#[derive(Debug, Clone)]
pub struct JobReport<K, T> {
    pub key: K,
    pub end: JobEnd<T>,
    /// Time between the job starting and ending, zero if it never started
    pub elapsed: Duration,
}

/// Runs batches of jobs with bounded concurrency
#[derive(Debug, Clone)]
pub struct ParallelRunner {
    max_concurrency: usize,
    timeout: Option<Duration>,
    started: Option<Instant>,
    cancellation: CancellationToken,
}

impl ParallelRunner {
    pub fn new(max_concurrency: usize, cancellation: CancellationToken) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            timeout: None,
            started: None,
            cancellation,
        }
    }

    /// Abandon the jobs still running `timeout` after a batch starts
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Measure the timeout from `started` rather than from each batch's start
    ///
    /// Batches run by the same runner then share one deadline.
    pub fn measured_from(mut self, started: Instant) -> Self {
        self.started = Some(started);
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Run every job and report each one exactly once
    ///
    /// Jobs start in iteration order as permits free up. Reports come back
    /// in completion order, followed by the jobs abandoned when the batch
    /// stopped.
    pub async fn run<K, T, I, Fut>(&self, jobs: I) -> Vec<JobReport<K, T>>
    where
        K: Send + 'static,
        T: Send + 'static,
        I: IntoIterator<Item = (K, Fut)>,
        Fut: Future<Output = T> + Send + 'static,
    {
        let deadline = self
            .timeout
            .map(|timeout| self.started.unwrap_or_else(Instant::now) + timeout);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks: JoinSet<(T, Duration)> = JoinSet::new();
        let mut running: HashMap<Id, (K, Instant)> = HashMap::new();
        let mut reports = Vec::new();
        let mut unstarted = Vec::new();
        let mut stop = None;

        let mut queue = jobs.into_iter();
        while let Some((key, job)) = queue.next() {
            let acquired = tokio::select! {
                biased;
                reason = self.stopped(deadline) => Err(reason),
                permit = Arc::clone(&semaphore).acquire_owned() => Ok(permit),
            };
            let permit = match acquired {
                Ok(Ok(permit)) => permit,
                // The semaphore is never closed.
                Ok(Err(_)) => break,
                Err(reason) => {
                    stop = Some(reason);
                    unstarted.push(key);
                    unstarted.extend(queue.by_ref().map(|(key, _)| key));
                    break;
                }
            };

            let start = Instant::now();
            let handle = tasks.spawn(
                async move {
                    let _permit = permit;
                    let started = Instant::now();
                    let output = job.await;
                    (output, started.elapsed())
                }
                .in_current_span(),
            );
            running.insert(handle.id(), (key, start));
        }

        if stop.is_none() {
            loop {
                tokio::select! {
                    biased;
                    joined = tasks.join_next_with_id() => match joined {
                        Some(joined) => reports.extend(collect(&mut running, joined)),
                        None => break,
                    },
                    reason = self.stopped(deadline) => {
                        stop = Some(reason);
                        break;
                    }
                }
            }
        }

        if let Some(reason) = stop {
            if !tasks.is_empty() {
                warn!(%reason, abandoned = tasks.len(), "abandoning running jobs");
            }
            tasks.abort_all();
            while let Some(joined) = tasks.join_next_with_id().await {
                let Some(mut report) = collect(&mut running, joined) else {
                    continue;
                };
                if let JobEnd::Abandoned(_) = report.end {
                    report.end = JobEnd::Abandoned(reason);
                }
                reports.push(report);
            }
            reports.extend(
                unstarted
                    .into_iter()
                    .map(|key| abandoned(key, reason, Duration::ZERO)),
            );
        }

        debug!(jobs = reports.len(), "batch finished");
        reports
    }

    /// Resolves once the batch must stop
    async fn stopped(&self, deadline: Option<Instant>) -> StopReason {
        match (deadline, self.timeout) {
            (Some(deadline), Some(timeout)) => tokio::select! {
                () = self.cancellation.cancelled() => StopReason::Cancelled,
                () = sleep_until(deadline) => StopReason::TimedOut(timeout),
            },
            _ => {
                self.cancellation.cancelled().await;
                StopReason::Cancelled
            }
        }
    }
}

fn abandoned<K, T>(key: K, reason: StopReason, elapsed: Duration) -> JobReport<K, T> {
    JobReport {
        key,
        end: JobEnd::Abandoned(reason),
        elapsed,
    }
}

fn collect<K, T>(
    running: &mut HashMap<Id, (K, Instant)>,
    joined: Result<(Id, (T, Duration)), JoinError>,
) -> Option<JobReport<K, T>> {
    let id = match &joined {
        Ok((id, _)) => *id,
        Err(err) => err.id(),
    };
    let Some((key, start)) = running.remove(&id) else {
        warn!(%id, "finished task was not registered");
        return None;
    };

    let report = match joined {
        Ok((_, (output, elapsed))) => JobReport {
            key,
            end: JobEnd::Completed(output),
            elapsed,
        },
        Err(err) if err.is_panic() => JobReport {
            key,
            end: JobEnd::Panicked(panic_message(err)),
            elapsed: start.elapsed(),
        },
        Err(_) => abandoned(key, StopReason::Cancelled, start.elapsed()),
    };
    Some(report)
}

fn panic_message(err: JoinError) -> String {
    let payload = err.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
