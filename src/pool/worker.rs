//! Per-slot worker thread: serve one request at a time, convert every
//! failure into an error response, never die from a task.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam_channel::Receiver;

use super::protocol::{
    ComputeRequest, ComputeResponse, TaskPayload, TaskRequest, TaskResult,
    ACTION_COMPUTE_SPECTROGRAM,
};
use super::PoolShared;
use crate::error::TaskError;
use crate::spectrogram::compute_spectrogram;

pub(crate) fn worker_loop(slot: usize, shared: Arc<PoolShared>, requests: Receiver<TaskRequest>) {
    while let Ok(request) = requests.recv() {
        serve(request);
        shared.release(slot);
    }
    // Sender dropped: the pool is tearing down.
    tracing::debug!(slot, "worker exiting");
}

fn serve(request: TaskRequest) {
    let TaskRequest {
        action,
        payload,
        reply,
    } = request;

    let result = match (action, payload) {
        (ACTION_COMPUTE_SPECTROGRAM, Some(TaskPayload::ComputeSpectrogram(task))) => {
            run_compute(task)
        }
        (ACTION_COMPUTE_SPECTROGRAM, None) => Err(TaskError::Protocol(format!(
            "missing payload for action `{ACTION_COMPUTE_SPECTROGRAM}`"
        ))),
        (other, _) => Err(TaskError::Protocol(format!("unknown action tag `{other}`"))),
    };

    // The caller may have dropped its pending handle; an undeliverable
    // response is not an error.
    let _ = reply.send(result);
}

fn run_compute(task: ComputeRequest) -> TaskResult {
    let ComputeRequest {
        samples,
        start,
        length,
        options,
    } = task;

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        compute_spectrogram(&samples, start, length, &options)
    }));

    match outcome {
        Ok(Ok(result)) => Ok(ComputeResponse {
            result,
            input: samples,
        }),
        Ok(Err(err)) => Err(TaskError::Validation(err)),
        Err(panic) => {
            let message = panic_message(panic);
            tracing::error!(%message, "spectrogram computation panicked");
            Err(TaskError::Computation(message))
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
