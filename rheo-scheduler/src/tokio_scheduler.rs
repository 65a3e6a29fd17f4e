// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rheo_core::{Cancel, CancelRef, FlagCancel, Task};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use crate::scheduler::{Scheduler, Worker, WorkerRef};

/// A [`Scheduler`] whose workers run their delayed tasks on a Tokio
/// runtime.
///
/// Only the timer is async: a worker task sleeps on the Tokio clock and
/// then runs the closure synchronously on the runtime thread.
#[derive(Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Bind to the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics outside a Tokio runtime context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handle: Handle::current(),
        }
    }

    /// Bind to an explicit runtime handle.
    #[must_use]
    pub fn with_handle(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TokioScheduler {
    fn create_worker(&self) -> WorkerRef {
        Arc::new(TokioWorker {
            inner: Arc::new(WorkerInner {
                handle: self.handle.clone(),
                tasks: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                disposed: AtomicBool::new(false),
            }),
        })
    }
}

struct WorkerInner {
    handle: Handle,
    tasks: Mutex<HashMap<u64, AbortHandle>>,
    next_id: AtomicU64,
    disposed: AtomicBool,
}

struct TokioWorker {
    inner: Arc<WorkerInner>,
}

impl Worker for TokioWorker {
    fn schedule(&self, task: Task, delay: Duration) -> CancelRef {
        let inner = &self.inner;
        if inner.disposed.load(Ordering::Acquire) {
            let dead = FlagCancel::new();
            dead.dispose();
            return Arc::new(dead);
        }

        let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
        let gate = Arc::new(FlagCancel::new());

        let run_gate = Arc::clone(&gate);
        let run_inner = Arc::clone(inner);
        let join = inner.handle.spawn(async move {
            if delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }
            let live = !run_gate.is_disposed() && !run_inner.disposed.load(Ordering::Acquire);
            if live {
                task();
            }
            run_inner.tasks.lock().remove(&id);
        });

        let abort = join.abort_handle();
        {
            let mut tasks = inner.tasks.lock();
            if inner.disposed.load(Ordering::Acquire) {
                drop(tasks);
                gate.dispose();
                abort.abort();
                let dead = FlagCancel::new();
                dead.dispose();
                return Arc::new(dead);
            }
            tasks.insert(id, abort.clone());
        }

        Arc::new(TaskCancel {
            id,
            gate,
            abort,
            inner: Arc::clone(inner),
        })
    }

    fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let aborts: Vec<AbortHandle> = self.inner.tasks.lock().drain().map(|(_, a)| a).collect();
        for abort in aborts {
            abort.abort();
        }
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

struct TaskCancel {
    id: u64,
    gate: Arc<FlagCancel>,
    abort: AbortHandle,
    inner: Arc<WorkerInner>,
}

impl Cancel for TaskCancel {
    fn dispose(&self) {
        self.gate.dispose();
        self.abort.abort();
        self.inner.tasks.lock().remove(&self.id);
    }

    fn is_disposed(&self) -> bool {
        self.gate.is_disposed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn scheduled_task_runs_after_delay() {
        let scheduler = TokioScheduler::new();
        let worker = scheduler.create_worker();
        let fired = Arc::new(AtomicUsize::new(0));

        let task_fired = Arc::clone(&fired);
        worker.schedule(
            Arc::new(move || {
                task_fired.fetch_add(1, Ordering::SeqCst);
            }),
            Duration::from_millis(10),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        worker.dispose();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn disposed_task_never_fires() {
        let scheduler = TokioScheduler::new();
        let worker = scheduler.create_worker();
        let fired = Arc::new(AtomicUsize::new(0));

        let task_fired = Arc::clone(&fired);
        let handle = worker.schedule(
            Arc::new(move || {
                task_fired.fetch_add(1, Ordering::SeqCst);
            }),
            Duration::from_millis(50),
        );
        handle.dispose();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn worker_dispose_cancels_outstanding_tasks() {
        let scheduler = TokioScheduler::new();
        let worker = scheduler.create_worker();
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let task_fired = Arc::clone(&fired);
            worker.schedule(
                Arc::new(move || {
                    task_fired.fetch_add(1, Ordering::SeqCst);
                }),
                Duration::from_millis(50),
            );
        }
        worker.dispose();
        assert!(worker.is_disposed());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn periodic_direct_fires_repeatedly_until_disposed() {
        let scheduler = TokioScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let task_fired = Arc::clone(&fired);
        let handle = scheduler.schedule_periodically_direct(
            Arc::new(move || {
                task_fired.fetch_add(1, Ordering::SeqCst);
            }),
            Duration::from_millis(10),
            Duration::from_millis(10),
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.dispose();
        let seen = fired.load(Ordering::SeqCst);
        assert!(seen >= 3, "expected several periodic firings, saw {seen}");

        tokio::time::sleep(Duration::from_millis(100)).await;
        let after = fired.load(Ordering::SeqCst);
        assert!(after <= seen + 1, "periodic task kept firing after dispose");
    }
}
