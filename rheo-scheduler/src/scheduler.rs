// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rheo_core::{Cancel, CancelRef, Task};

use crate::periodic::PeriodicTask;

/// A single-threaded timeline for delayed and periodic work.
///
/// Tasks scheduled on one worker never run concurrently with each other.
/// Disposing the worker cancels everything still outstanding.
pub trait Worker: Send + Sync {
    /// Run `task` after `delay`. The returned handle cancels just this
    /// task.
    fn schedule(&self, task: Task, delay: Duration) -> CancelRef;

    /// The worker's current wall-clock time since the Unix epoch.
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }

    /// Cancel all outstanding tasks and refuse new ones.
    fn dispose(&self);

    /// Whether the worker has been disposed.
    fn is_disposed(&self) -> bool;
}

/// Shared handle to a [`Worker`].
pub type WorkerRef = Arc<dyn Worker>;

/// Run `task` every `period`, first after `initial`, re-anchoring the
/// schedule when the clock regresses or the task overruns.
///
/// Each firing computes `target_time = start_time + count * period` and
/// sleeps the remainder. A clock that jumped backwards or a consumer that
/// fell behind would otherwise produce a burst of zero-delay firings, so
/// both cases re-anchor `start_time` and fall back to a plain `period`
/// delay.
pub fn schedule_periodically(
    worker: WorkerRef,
    task: Task,
    initial: Duration,
    period: Duration,
) -> CancelRef {
    PeriodicTask::start(worker, task, initial, period)
}

/// A factory of [`Worker`]s plus the direct-schedule conveniences built on
/// top of transient workers.
pub trait Scheduler: Send + Sync + 'static {
    /// Create a fresh worker on this scheduler's resources.
    fn create_worker(&self) -> WorkerRef;

    /// The scheduler's current wall-clock time since the Unix epoch.
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }

    /// Run `task` once after `delay` on a transient worker that is
    /// disposed when the task finishes.
    fn schedule_direct(&self, task: Task, delay: Duration) -> CancelRef {
        let worker = self.create_worker();
        let for_task = Arc::clone(&worker);
        worker.schedule(
            Arc::new(move || {
                task();
                for_task.dispose();
            }),
            delay,
        );
        Arc::new(WorkerCancel { worker })
    }

    /// Run `task` periodically on a transient worker.
    fn schedule_periodically_direct(
        &self,
        task: Task,
        initial: Duration,
        period: Duration,
    ) -> CancelRef {
        let worker = self.create_worker();
        let gate = Arc::new(PeriodicDirectGate {
            disposed: AtomicBool::new(false),
            worker: Arc::clone(&worker),
        });
        let for_task = Arc::clone(&gate);
        schedule_periodically(
            worker,
            Arc::new(move || {
                if !for_task.disposed.load(Ordering::Acquire) {
                    task();
                }
            }),
            initial,
            period,
        );
        gate
    }
}

/// Shared handle to a [`Scheduler`].
pub type SchedulerRef = Arc<dyn Scheduler>;

struct WorkerCancel {
    worker: WorkerRef,
}

impl Cancel for WorkerCancel {
    fn dispose(&self) {
        self.worker.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.worker.is_disposed()
    }
}

struct PeriodicDirectGate {
    disposed: AtomicBool,
    worker: WorkerRef,
}

impl Cancel for PeriodicDirectGate {
    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        self.worker.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}
