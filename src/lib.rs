//! Sonograph: parallel spectrogram computation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       caller threads                        │
//! │        dispatch(samples, …) → PendingTask → wait()          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 WorkerPool (fixed slot table)               │
//! │        idle slot → hand off │ all busy → FIFO backlog       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  TaskRequest {action, payload}
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │         worker threads (one per slot, catch_unwind)         │
//! │        Spectrogram Engine → Frequency Scale Mapper          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine ([`compute_spectrogram`]) is a pure function with no
//! concurrency awareness: sliding Hann-windowed FFT, per-bin magnitudes,
//! remapped onto a linear or mel frequency scale. The pool owns a fixed set
//! of worker threads and drives tasks through an ownership-transferring
//! request/response protocol: sample buffers are moved into the request and
//! handed back in the response, never copied.

pub mod error;
pub mod pool;
pub mod scale;
pub mod spectrogram;

pub use error::{SpectrogramError, TaskError};
pub use pool::protocol::{ComputeResponse, ACTION_COMPUTE_SPECTROGRAM};
pub use pool::{default_worker_count, PendingTask, WorkerPool};
pub use scale::FrequencyScale;
pub use spectrogram::{
    compute_spectrogram, ResolvedOptions, SpectrogramOptions, SpectrogramResult,
};
