// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! A virtual-time scheduler for deterministic timing tests.

use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rheo_core::{Cancel, CancelRef, Task};
use rheo_scheduler::{Scheduler, Worker, WorkerRef};

struct ScheduledTask {
    due: Duration,
    sequence: u64,
    task: Task,
    gate: Arc<TaskGate>,
}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.sequence == other.sequence
    }
}

impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; invert so the earliest task pops first
        other
            .due
            .cmp(&self.due)
            .then(other.sequence.cmp(&self.sequence))
    }
}

struct Timeline {
    now: Mutex<Duration>,
    queue: Mutex<BinaryHeap<ScheduledTask>>,
    sequence: AtomicU64,
}

/// A scheduler whose clock only moves when the test advances it.
///
/// Tasks run inline on the advancing thread, in due order with FIFO
/// tie-breaking, and may schedule further tasks while running (periodic
/// rescheduling works within a single `advance_by`).
pub struct ManualScheduler {
    timeline: Arc<Timeline>,
}

impl ManualScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            timeline: Arc::new(Timeline {
                now: Mutex::new(Duration::ZERO),
                queue: Mutex::new(BinaryHeap::new()),
                sequence: AtomicU64::new(0),
            }),
        })
    }

    /// The current virtual time.
    pub fn now(&self) -> Duration {
        *self.timeline.now.lock()
    }

    /// Move the clock forward by `delta`, running every task that comes
    /// due on the way, at its own due time.
    pub fn advance_by(&self, delta: Duration) {
        let target = *self.timeline.now.lock() + delta;
        loop {
            let next = {
                let mut queue = self.timeline.queue.lock();
                match queue.peek() {
                    Some(scheduled) if scheduled.due <= target => queue.pop(),
                    _ => None,
                }
            };
            let Some(next) = next else {
                break;
            };
            *self.timeline.now.lock() = next.due;
            if !next.gate.disposed.load(Ordering::Acquire) {
                (next.task)();
            }
        }
        *self.timeline.now.lock() = target;
    }

    /// Run everything already due without moving the clock.
    pub fn trigger_actions(&self) {
        self.advance_by(Duration::ZERO);
    }

    /// Number of tasks still waiting on the timeline.
    pub fn pending_tasks(&self) -> usize {
        self.timeline.queue.lock().len()
    }
}

impl Scheduler for ManualScheduler {
    fn create_worker(&self) -> WorkerRef {
        Arc::new(ManualWorker {
            timeline: Arc::clone(&self.timeline),
            disposed: AtomicBool::new(false),
            gates: Mutex::new(Vec::new()),
        })
    }

    fn now(&self) -> Duration {
        *self.timeline.now.lock()
    }
}

struct TaskGate {
    disposed: AtomicBool,
}

struct GateCancel {
    gate: Arc<TaskGate>,
}

impl Cancel for GateCancel {
    fn dispose(&self) {
        self.gate.disposed.store(true, Ordering::Release);
    }

    fn is_disposed(&self) -> bool {
        self.gate.disposed.load(Ordering::Acquire)
    }
}

struct ManualWorker {
    timeline: Arc<Timeline>,
    disposed: AtomicBool,
    gates: Mutex<Vec<Arc<TaskGate>>>,
}

impl Worker for ManualWorker {
    fn schedule(&self, task: Task, delay: Duration) -> CancelRef {
        let gate = Arc::new(TaskGate {
            disposed: AtomicBool::new(self.disposed.load(Ordering::Acquire)),
        });
        if !gate.disposed.load(Ordering::Acquire) {
            let due = *self.timeline.now.lock() + delay;
            let sequence = self.timeline.sequence.fetch_add(1, Ordering::Relaxed);
            self.timeline.queue.lock().push(ScheduledTask {
                due,
                sequence,
                task,
                gate: Arc::clone(&gate),
            });
            self.gates.lock().push(Arc::clone(&gate));
        }
        Arc::new(GateCancel { gate })
    }

    fn now(&self) -> Duration {
        *self.timeline.now.lock()
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        for gate in self.gates.lock().drain(..) {
            gate.disposed.store(true, Ordering::Release);
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}
