// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rheo_core::{Cancel, CancelRef, SerialCancel, Task};

use crate::scheduler::WorkerRef;

struct PeriodicState {
    last_now: i64,
    start_time: i64,
    count: i64,
}

/// The self-rescheduling task behind [`schedule_periodically`].
///
/// Timeline arithmetic runs in signed milliseconds. For each firing:
/// `target_time = start_time + count * period`. A regressed clock
/// (`now < last_now`) and an overrun (`now > target_time`) both fall back
/// to a plain `period` delay and adjust `start_time` by the observed
/// skew, so the next targets line up with the new timebase instead of
/// firing in a burst.
///
/// [`schedule_periodically`]: crate::schedule_periodically
pub(crate) struct PeriodicTask {
    worker: WorkerRef,
    task: Task,
    period: i64,
    state: Mutex<PeriodicState>,
    slot: Arc<SerialCancel>,
    this: Weak<Self>,
}

impl PeriodicTask {
    pub(crate) fn start(
        worker: WorkerRef,
        task: Task,
        initial: Duration,
        period: Duration,
    ) -> CancelRef {
        let now = as_millis(worker.now());
        let initial_ms = as_millis(initial);
        let slot = Arc::new(SerialCancel::new());
        let periodic = Arc::new_cyclic(|this: &Weak<PeriodicTask>| Self {
            worker,
            task,
            period: as_millis(period),
            state: Mutex::new(PeriodicState {
                last_now: now,
                start_time: now + initial_ms,
                count: 0,
            }),
            slot: Arc::clone(&slot),
            this: this.clone(),
        });
        let first = Arc::clone(&periodic);
        let handle = periodic
            .worker
            .schedule(Arc::new(move || first.run()), initial);
        slot.replace(handle);
        slot
    }

    fn run(&self) {
        if self.slot.is_disposed() {
            return;
        }
        (self.task)();
        if self.slot.is_disposed() {
            return;
        }

        let t = as_millis(self.worker.now());
        let delay = {
            let mut state = self.state.lock();
            state.count += 1;
            let c = state.count;
            let target_time = state.start_time + c * self.period;

            let delay;
            if t < state.last_now {
                // clock regressed: avoid scheduling far in the future
                delay = self.period;
                state.start_time -= state.last_now - c * self.period;
            } else if t > target_time {
                // running behind: avoid a burst of zero-delay firings
                delay = self.period;
                state.start_time += t - c * self.period;
            } else {
                delay = target_time - t;
            }
            state.last_now = t;
            delay
        };

        let Some(next) = self.this.upgrade() else {
            return;
        };
        let handle = self.worker.schedule(
            Arc::new(move || next.run()),
            Duration::from_millis(delay.max(0) as u64),
        );
        self.slot.replace(handle);
    }
}

fn as_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
