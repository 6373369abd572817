//! Parallel batch executor.
//!
//! The settings snapshot is written once, one task per input is handed to a
//! pool of workers (by default separate OS processes), results are slotted back
//! by input index and the snapshot is deleted once every worker has finished.
//! A failing item only ever affects its own slot.
pub mod process;
pub mod protocol;
pub mod snapshot;
pub mod worker;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::params::ProcessingSettings;
use crate::error::Result;
use crate::io::decode::DecodeLimits;
use crate::types::BatchMode;

pub use process::{ProcessWorker, ProcessWorkerFactory, WORKER_FLAG};
pub use protocol::{ItemResult, TaskOutput, TaskReply, TaskRequest};
pub use snapshot::{BatchSnapshot, SettingsSnapshot};
pub use worker::{WorkerContext, run_worker};

/// Runs tasks one at a time to completion.
pub trait Worker {
    fn process(&mut self, request: &TaskRequest) -> Result<TaskReply>;
}

/// Creates workers for the executor's dispatch slots. A worker whose
/// `process` returns `Err` is discarded and replaced on the next task.
pub trait WorkerFactory: Sync {
    type Worker: Worker;

    fn spawn(&self, slot: usize) -> Result<Self::Worker>;
}

/// Runs workers on executor threads inside this process. Each worker still
/// gets its own [`WorkerContext`].
#[derive(Debug, Clone, Default)]
pub struct InProcessWorkerFactory {
    pub limits: DecodeLimits,
}

impl Worker for WorkerContext {
    fn process(&mut self, request: &TaskRequest) -> Result<TaskReply> {
        Ok(self.handle(request))
    }
}

impl WorkerFactory for InProcessWorkerFactory {
    type Worker = WorkerContext;

    fn spawn(&self, _slot: usize) -> Result<WorkerContext> {
        Ok(WorkerContext::with_limits(self.limits))
    }
}

/// Logical core count, at least 1.
pub fn default_worker_count() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

#[derive(Debug, Clone)]
pub struct BatchJob {
    pub inputs: Vec<PathBuf>,
    pub settings: ProcessingSettings,
    pub mode: BatchMode,
    pub output_dir: Option<PathBuf>,
    /// `None` uses [`default_worker_count`].
    pub workers: Option<usize>,
}

impl BatchJob {
    pub fn new(inputs: Vec<PathBuf>, settings: ProcessingSettings, mode: BatchMode) -> Self {
        Self {
            inputs,
            settings,
            mode,
            output_dir: None,
            workers: None,
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }
}

/// Progress notification sent after each completed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub index: usize,
    pub success: bool,
}

/// Ordered outcome of a batch: `items[i]` belongs to `inputs[i]`.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub inputs: Vec<PathBuf>,
    pub items: Vec<ItemResult>,
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedItem {
    pub index: usize,
    pub input: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub started_at: String,
    pub elapsed_secs: f64,
    pub failures: Vec<FailedItem>,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    pub fn summary(&self) -> BatchSummary {
        let failures = self
            .items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                item.error().map(|error| FailedItem {
                    index,
                    input: self.inputs[index].clone(),
                    error: error.to_string(),
                })
            })
            .collect();
        BatchSummary {
            total: self.len(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            started_at: self.started_at.to_rfc3339(),
            elapsed_secs: self.elapsed.as_secs_f64(),
            failures,
        }
    }
}

type ProgressFn = Box<dyn Fn(&Progress) + Send + Sync>;

pub struct BatchExecutor<F: WorkerFactory> {
    factory: F,
    cancel: Option<Arc<AtomicBool>>,
    progress: Option<ProgressFn>,
}

impl<F: WorkerFactory> BatchExecutor<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            cancel: None,
            progress: None,
        }
    }

    /// Cooperative cancellation, checked before each dispatch. Items not yet
    /// dispatched when it is set come back as failures.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn with_progress(mut self, f: impl Fn(&Progress) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.load(Ordering::SeqCst))
    }

    /// Pull indices from `next` until exhausted, running each on this slot's
    /// worker and sending `(index, result)` back. A worker that errors or
    /// panics is dropped and respawned for the next item.
    fn dispatch_loop(
        &self,
        slot: usize,
        inputs: &[PathBuf],
        snapshot: &std::path::Path,
        next: &AtomicUsize,
        tx: mpsc::Sender<(usize, ItemResult)>,
    ) {
        let mut worker: Option<F::Worker> = None;
        loop {
            if self.cancelled() {
                debug!("Slot {} stopping: batch cancelled", slot);
                break;
            }
            let index = next.fetch_add(1, Ordering::SeqCst);
            if index >= inputs.len() {
                break;
            }

            if worker.is_none() {
                match self.factory.spawn(slot) {
                    Ok(w) => worker = Some(w),
                    Err(e) => {
                        warn!("Slot {} could not start a worker: {}", slot, e);
                        if tx.send((index, ItemResult::failure(e))).is_err() {
                            break;
                        }
                        continue;
                    }
                }
            }
            let Some(w) = worker.as_mut() else { continue };

            let request = TaskRequest {
                index,
                input: inputs[index].clone(),
                snapshot: snapshot.to_path_buf(),
            };
            let result = match panic::catch_unwind(AssertUnwindSafe(|| w.process(&request))) {
                Ok(Ok(reply)) => reply.result,
                Ok(Err(e)) => {
                    warn!("Worker in slot {} lost on item {}: {}", slot, index, e);
                    worker = None;
                    ItemResult::failure(e)
                }
                Err(payload) => {
                    let reason = panic_reason(&*payload);
                    warn!("Worker in slot {} panicked on item {}: {}", slot, index, reason);
                    worker = None;
                    ItemResult::failure(format!("worker panicked: {}", reason))
                }
            };
            if tx.send((index, result)).is_err() {
                break;
            }
        }
    }

    /// Run the whole job. Always returns one slot per input, in input order.
    pub fn run(&self, job: &BatchJob) -> BatchResult {
        let started_at = Local::now();
        let clock = Instant::now();
        let total = job.inputs.len();
        let mut slots: Vec<Option<ItemResult>> = vec![None; total];

        let finish = |slots: Vec<Option<ItemResult>>, missing: &str| BatchResult {
            inputs: job.inputs.clone(),
            items: slots
                .into_iter()
                .map(|s| s.unwrap_or_else(|| ItemResult::failure(missing)))
                .collect(),
            started_at,
            elapsed: clock.elapsed(),
        };

        if total == 0 {
            return finish(slots, "");
        }

        let payload = snapshot::BatchSnapshot {
            settings: job.settings.clone(),
            mode: job.mode,
            output_dir: job.output_dir.clone(),
        };
        let snapshot = match SettingsSnapshot::create(&payload) {
            Ok(s) => s,
            Err(e) => {
                warn!("Settings snapshot could not be written: {}", e);
                return finish(slots, &format!("settings snapshot unavailable: {}", e));
            }
        };

        let workers = job.workers.unwrap_or_else(default_worker_count).clamp(1, total);
        info!(
            "Batch of {} items ({}) on {} workers",
            total, job.mode, workers
        );

        let next = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel::<(usize, ItemResult)>();
        thread::scope(|scope| {
            for slot in 0..workers {
                let tx = tx.clone();
                let next = &next;
                let inputs = job.inputs.as_slice();
                let path = snapshot.path();
                scope.spawn(move || self.dispatch_loop(slot, inputs, path, next, tx));
            }
            drop(tx);

            let mut completed = 0;
            for (index, result) in rx {
                completed += 1;
                let success = result.is_success();
                if !success {
                    debug!("Item {} failed: {:?}", index, result.error());
                }
                slots[index] = Some(result);
                if let Some(progress) = &self.progress {
                    progress(&Progress {
                        completed,
                        total,
                        index,
                        success,
                    });
                }
            }
        });
        snapshot.release();

        let missing = if self.cancelled() {
            "cancelled"
        } else {
            "no result received"
        };
        let result = finish(slots, missing);
        info!(
            "Batch complete: {} succeeded, {} failed in {:.2}s",
            result.succeeded(),
            result.failed(),
            result.elapsed.as_secs_f64()
        );
        result
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
