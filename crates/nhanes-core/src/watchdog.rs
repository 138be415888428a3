//! Runs a job on a worker thread with an optional deadline.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, bounded};
use tracing::warn;

use crate::error::PipelineError;

/// Extracts a message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs `job` on a named worker thread and waits up to `timeout` for it.
///
/// A panic in the job becomes [`PipelineError::Panicked`]. When the deadline
/// passes the worker is left detached and [`PipelineError::Timeout`] is
/// returned; its eventual result is discarded.
pub fn run_with_timeout<T, F>(
    name: &str,
    timeout: Option<Duration>,
    job: F,
) -> Result<T, PipelineError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (sender, receiver) = bounded(1);
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let outcome = catch_unwind(AssertUnwindSafe(job));
            // The receiver is gone after a timeout.
            let _ = sender.send(outcome);
        })
        .map_err(|err| PipelineError::configuration(format!("failed to spawn worker: {err}")))?;

    let received = match timeout {
        Some(limit) => receiver.recv_timeout(limit).map_err(|err| match err {
            RecvTimeoutError::Timeout => {
                warn!(worker = name, seconds = limit.as_secs(), "worker timed out, detaching");
                PipelineError::Timeout(limit)
            }
            RecvTimeoutError::Disconnected => {
                PipelineError::Panicked("worker exited without a result".to_string())
            }
        })?,
        None => receiver
            .recv()
            .map_err(|_| PipelineError::Panicked("worker exited without a result".to_string()))?,
    };
    received.map_err(|payload| PipelineError::Panicked(panic_message(payload.as_ref())))
}
