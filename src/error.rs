use thiserror::Error;

/// Validation failures raised synchronously before any computation begins.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpectrogramError {
    /// The hop must divide the window exactly so that overlapping windows
    /// tile the sample range. The message text is load-bearing: existing
    /// consumers match on it.
    #[error("Window step size must be evenly divisible by the window size")]
    StepNotDivisible,

    #[error("window size and window step size must be non-zero")]
    EmptyWindow,

    #[error("scale size must be non-zero")]
    EmptyScale,

    #[error(
        "invalid frequency range: min {min} Hz, max {max} Hz \
         (expected 0 <= min < max <= {nyquist} Hz)"
    )]
    InvalidFrequencyRange { min: f64, max: f64, nyquist: f64 },
}

/// Failure of a task dispatched across the worker boundary.
///
/// Every dispatched task resolves with either a result or one of these;
/// there is no silent-failure path. Pool bookkeeping violations (releasing
/// a slot the pool does not own) are panics, not `TaskError`s.
#[derive(Error, Debug)]
pub enum TaskError {
    /// The engine rejected the options before computing.
    #[error(transparent)]
    Validation(#[from] SpectrogramError),

    /// The engine failed (or panicked) mid-computation; caught at the
    /// worker boundary and carried back as the response's error.
    #[error("computation failed: {0}")]
    Computation(String),

    /// Unrecognized action tag or malformed request envelope.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The pool was torn down before the task completed.
    #[error("worker pool shut down before the task completed")]
    PoolShutDown,
}
