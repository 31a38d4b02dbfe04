use crate::ffmpeg::FfmpegError;
use crate::jobs::TranscodeJob;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

/// How a batch of jobs is scheduled. Jobs are independent by construction
/// (distinct destinations, no cross-job reads), so the pool needs no
/// synchronization beyond handing out indices and collecting results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStrategy {
    Sequential,
    /// Bounded pool with the given number of worker threads.
    WorkerPool(usize),
}

impl ExecStrategy {
    /// A pool sized to the host's core count.
    pub fn parallel() -> Self {
        let n = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        ExecStrategy::WorkerPool(n)
    }
}

#[derive(Debug)]
pub struct JobOutcome {
    pub destination: std::path::PathBuf,
    pub result: Result<(), FfmpegError>,
}

/// Run every job in the batch, never aborting siblings on failure, and
/// return one outcome per job in dispatch order.
pub fn run_batch<F>(jobs: &[TranscodeJob], strategy: ExecStrategy, run_job: F) -> Vec<JobOutcome>
where
    F: Fn(&TranscodeJob) -> Result<(), FfmpegError> + Sync,
{
    match strategy {
        ExecStrategy::Sequential => jobs
            .iter()
            .map(|job| JobOutcome {
                destination: job.destination.clone(),
                result: run_job(job),
            })
            .collect(),
        ExecStrategy::WorkerPool(workers) => run_pool(jobs, workers.max(1), &run_job),
    }
}

fn run_pool<F>(jobs: &[TranscodeJob], workers: usize, run_job: &F) -> Vec<JobOutcome>
where
    F: Fn(&TranscodeJob) -> Result<(), FfmpegError> + Sync,
{
    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<(usize, Result<(), FfmpegError>)>();

    thread::scope(|scope| {
        for _ in 0..workers.min(jobs.len()) {
            let tx = tx.clone();
            let next = &next;
            scope.spawn(move || {
                loop {
                    let i = next.fetch_add(1, Ordering::Relaxed);
                    let Some(job) = jobs.get(i) else { break };
                    let result = run_job(job);
                    if tx.send((i, result)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(tx);

    let mut results: Vec<Option<Result<(), FfmpegError>>> =
        (0..jobs.len()).map(|_| None).collect();
    for (i, result) in rx {
        results[i] = Some(result);
    }

    jobs.iter()
        .zip(results)
        .map(|(job, result)| JobOutcome {
            destination: job.destination.clone(),
            // Every index was handed out exactly once inside the scope.
            result: result.unwrap_or_else(|| {
                Err(FfmpegError::CommandFailed(
                    job.destination.display().to_string(),
                    "worker exited without reporting a result".to_string(),
                ))
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    fn job(n: usize) -> TranscodeJob {
        TranscodeJob {
            source: PathBuf::from("/in/a.flac"),
            destination: PathBuf::from(format!("/out/{:02}.mp3", n)),
            start_seconds: None,
            duration_seconds: None,
            tags: BTreeMap::new(),
            bitrate_kbps: 192,
        }
    }

    #[test]
    fn sequential_runs_every_job_in_order() {
        let jobs: Vec<_> = (1..=4).map(job).collect();
        let seen = Mutex::new(Vec::new());
        let outcomes = run_batch(&jobs, ExecStrategy::Sequential, |j| {
            seen.lock().unwrap().push(j.destination.clone());
            Ok(())
        });
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes.iter().all(|o| o.result.is_ok()));
        assert_eq!(
            *seen.lock().unwrap(),
            jobs.iter().map(|j| j.destination.clone()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn pool_runs_every_job_exactly_once() {
        let jobs: Vec<_> = (1..=20).map(job).collect();
        let count = AtomicUsize::new(0);
        let outcomes = run_batch(&jobs, ExecStrategy::WorkerPool(4), |_| {
            count.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });
        assert_eq!(count.load(Ordering::Relaxed), 20);
        assert_eq!(outcomes.len(), 20);
        // Outcomes come back in dispatch order regardless of completion order.
        for (i, outcome) in outcomes.iter().enumerate() {
            assert_eq!(outcome.destination, jobs[i].destination);
        }
    }

    #[test]
    fn one_failure_does_not_abort_siblings() {
        let jobs: Vec<_> = (1..=6).map(job).collect();
        let outcomes = run_batch(&jobs, ExecStrategy::WorkerPool(3), |j| {
            if j.destination.ends_with("03.mp3") {
                Err(FfmpegError::TranscodeFailed {
                    destination: j.destination.display().to_string(),
                })
            } else {
                Ok(())
            }
        });
        let failed: Vec<_> = outcomes.iter().filter(|o| o.result.is_err()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].destination, PathBuf::from("/out/03.mp3"));
        assert_eq!(outcomes.iter().filter(|o| o.result.is_ok()).count(), 5);
    }

    #[test]
    fn pool_with_more_workers_than_jobs() {
        let jobs: Vec<_> = (1..=2).map(job).collect();
        let outcomes = run_batch(&jobs, ExecStrategy::WorkerPool(8), |_| Ok(()));
        assert_eq!(outcomes.len(), 2);
    }
}
