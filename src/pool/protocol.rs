//! Typed request/response contract crossing the worker boundary.
//!
//! Buffers cross by move: the request owns the sample buffer, and the
//! success response owns both the spectrogram and the echoed input buffer.
//! Each request carries a one-shot reply channel that receives exactly one
//! response (success or error, never both) and is then torn down.

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::TaskError;
use crate::spectrogram::{SpectrogramOptions, SpectrogramResult};

/// Action tag for a spectrogram computation request.
pub const ACTION_COMPUTE_SPECTROGRAM: &str = "compute-spectrogram";

/// One unit of work: an action tag, its payload, and the reply channel.
///
/// Workers answer a request whose tag they do not recognize (or whose
/// payload is missing) with [`TaskError::Protocol`] instead of dying.
pub struct TaskRequest {
    pub action: &'static str,
    pub payload: Option<TaskPayload>,
    pub(crate) reply: Sender<TaskResult>,
}

impl TaskRequest {
    pub(crate) fn new(
        action: &'static str,
        payload: Option<TaskPayload>,
    ) -> (Self, Receiver<TaskResult>) {
        let (reply, rx) = bounded(1);
        (
            Self {
                action,
                payload,
                reply,
            },
            rx,
        )
    }
}

pub enum TaskPayload {
    ComputeSpectrogram(ComputeRequest),
}

/// Inputs for one spectrogram computation. `samples` is moved in; the
/// sender's buffer is gone the instant the request is submitted.
pub struct ComputeRequest {
    pub samples: Vec<f32>,
    pub start: usize,
    pub length: usize,
    pub options: SpectrogramOptions,
}

/// Successful computation: the result plus the input buffer, whose
/// ownership round-trips back to the original caller.
#[derive(Debug)]
pub struct ComputeResponse {
    pub result: SpectrogramResult,
    pub input: Vec<f32>,
}

pub type TaskResult = Result<ComputeResponse, TaskError>;
