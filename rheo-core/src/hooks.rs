// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Process-wide sink for orphan errors.
//!
//! An orphan error is one with no subscriber left to receive it: an error
//! arriving after cancellation, after a terminal, or from a stale inner
//! subscription. Such errors must not vanish silently, so they are routed
//! here. The sink is injectable for tests and embedders; the default logs
//! through `tracing`.

use std::sync::Arc;

use parking_lot::RwLock;
use rheo_error::FlowError;

type ErrorSink = Arc<dyn Fn(FlowError) + Send + Sync>;

static ERROR_HOOK: RwLock<Option<ErrorSink>> = RwLock::new(None);

/// Install a process-wide orphan error sink, replacing any previous one.
pub fn set_error_hook(sink: impl Fn(FlowError) + Send + Sync + 'static) {
    *ERROR_HOOK.write() = Some(Arc::new(sink));
}

/// Restore the default sink (a `tracing` error event).
pub fn reset_error_hook() {
    *ERROR_HOOK.write() = None;
}

/// Deliver an orphan error to the installed sink.
pub fn on_error(error: FlowError) {
    let sink = ERROR_HOOK.read().clone();
    match sink {
        Some(sink) => sink(error),
        None => tracing::error!(%error, "orphan stream error"),
    }
}
