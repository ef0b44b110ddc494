//! Fixed-size worker pool with a FIFO backlog.
//!
//! Each slot is one worker thread plus a busy flag. Slot state machine:
//! `Idle → Busy → Idle`, no terminal state while the pool lives. Submitting
//! a task hands it to an idle slot or appends it to the backlog; releasing
//! a slot hands it straight to the oldest queued task, so a slot is never
//! visibly idle while a backlog exists. At most one task is ever in flight
//! per slot, and queued tasks are served strictly in arrival order.
//!
//! The pool is lifetime-scoped: dropping it fails queued tasks with
//! [`TaskError::PoolShutDown`], closes the request channels, and joins the
//! worker threads, so tests get deterministic teardown.

pub mod protocol;
mod worker;

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::error::TaskError;
use crate::spectrogram::SpectrogramOptions;
use protocol::{
    ComputeRequest, TaskPayload, TaskRequest, TaskResult, ACTION_COMPUTE_SPECTROGRAM,
};

const FALLBACK_WORKER_COUNT: usize = 4;

/// Worker count used by [`WorkerPool::new`]: detected hardware parallelism,
/// falling back to 4 when undetectable.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|v| v.get())
        .unwrap_or(FALLBACK_WORKER_COUNT)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Idle,
    Busy,
}

struct PoolState {
    slots: Vec<SlotState>,
    backlog: VecDeque<TaskRequest>,
    /// Per-slot request channels; cleared on shutdown to disconnect the
    /// workers.
    request_txs: Vec<Sender<TaskRequest>>,
}

pub(crate) struct PoolShared {
    state: Mutex<PoolState>,
}

impl PoolShared {
    /// Hand the request to an idle slot, or append it to the FIFO backlog.
    fn submit(&self, request: TaskRequest) {
        let mut state = self.state.lock();
        match state.slots.iter().position(|s| *s == SlotState::Idle) {
            Some(slot) => {
                state.slots[slot] = SlotState::Busy;
                state.request_txs[slot]
                    .send(request)
                    .expect("worker request channel closed while pool is live");
            }
            None => state.backlog.push_back(request),
        }
    }

    /// Return `slot` to the pool. If a backlog exists the slot stays busy
    /// and is handed straight to the oldest queued task.
    ///
    /// # Panics
    ///
    /// Releasing a slot this pool does not own, or one that is already
    /// idle, is a fatal integrity violation.
    pub(crate) fn release(&self, slot: usize) {
        let mut state = self.state.lock();
        match state.slots.get(slot) {
            None => panic!("released slot {slot} is not owned by this pool"),
            Some(SlotState::Idle) => panic!("slot {slot} released while idle"),
            Some(SlotState::Busy) => {}
        }
        if let Some(next) = state.backlog.pop_front() {
            state.request_txs[slot]
                .send(next)
                .expect("worker request channel closed while pool is live");
        } else {
            state.slots[slot] = SlotState::Idle;
        }
    }
}

/// A fixed set of worker threads that computes spectrograms off the
/// caller's thread.
///
/// ```no_run
/// use sonograph::{SpectrogramOptions, WorkerPool};
///
/// let pool = WorkerPool::new();
/// let samples = vec![0.0f32; 44100];
/// let pending = pool.dispatch(samples, 0, 44100, SpectrogramOptions::new(44100));
/// let response = pending.wait().unwrap();
/// assert_eq!(response.input.len(), 44100); // input buffer round-trips back
/// ```
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Pool sized to [`default_worker_count`].
    pub fn new() -> Self {
        Self::with_workers(default_worker_count())
    }

    /// Pool with a fixed number of workers; the count never changes after
    /// construction.
    pub fn with_workers(count: usize) -> Self {
        let count = count.max(1);
        let mut request_txs = Vec::with_capacity(count);
        let mut request_rxs: Vec<Receiver<TaskRequest>> = Vec::with_capacity(count);
        for _ in 0..count {
            let (tx, rx) = unbounded();
            request_txs.push(tx);
            request_rxs.push(rx);
        }

        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState {
                slots: vec![SlotState::Idle; count],
                backlog: VecDeque::new(),
                request_txs,
            }),
        });

        let handles = request_rxs
            .into_iter()
            .enumerate()
            .map(|(slot, rx)| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("sonograph-worker-{slot}"))
                    .spawn(move || worker::worker_loop(slot, shared, rx))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        tracing::debug!(workers = count, "worker pool started");
        Self { shared, handles }
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Dispatch one spectrogram computation. Takes ownership of `samples`;
    /// the buffer comes back inside the successful response.
    ///
    /// Returns immediately; the task runs as soon as a slot is free, and
    /// queued tasks are served in arrival order.
    pub fn dispatch(
        &self,
        samples: Vec<f32>,
        start: usize,
        length: usize,
        options: SpectrogramOptions,
    ) -> PendingTask {
        self.submit(
            ACTION_COMPUTE_SPECTROGRAM,
            Some(TaskPayload::ComputeSpectrogram(ComputeRequest {
                samples,
                start,
                length,
                options,
            })),
        )
    }

    /// Lower-level entry: submit a raw protocol request. [`Self::dispatch`]
    /// is this with the compute action and payload filled in.
    pub fn submit(&self, action: &'static str, payload: Option<TaskPayload>) -> PendingTask {
        let (request, rx) = TaskRequest::new(action, payload);
        self.shared.submit(request);
        PendingTask { rx }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            // Dropping the senders disconnects idle workers; busy workers
            // finish their in-flight task first.
            state.request_txs.clear();
            for task in state.backlog.drain(..) {
                let _ = task.reply.send(Err(TaskError::PoolShutDown));
            }
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Handle to one dispatched task; resolves exactly once.
pub struct PendingTask {
    rx: Receiver<TaskResult>,
}

impl PendingTask {
    /// Block until the task's single response arrives.
    pub fn wait(self) -> TaskResult {
        self.rx
            .recv()
            .unwrap_or(Err(TaskError::PoolShutDown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_round_trip() {
        let pool = WorkerPool::with_workers(2);
        let samples = vec![0.5f32; 8192];
        let options = SpectrogramOptions {
            window_size: Some(1024),
            ..SpectrogramOptions::new(44100)
        };
        let response = pool.dispatch(samples, 0, 8192, options).wait().unwrap();
        assert!(response.result.window_count > 0);
        assert_eq!(response.input, vec![0.5f32; 8192]);
    }

    #[test]
    fn test_default_pool_has_at_least_one_worker() {
        assert!(default_worker_count() >= 1);
        let pool = WorkerPool::with_workers(0);
        assert_eq!(pool.worker_count(), 1);
    }

    #[test]
    #[should_panic(expected = "released while idle")]
    fn test_double_release_is_fatal() {
        let pool = WorkerPool::with_workers(1);
        pool.shared.release(0);
    }

    #[test]
    #[should_panic(expected = "is not owned by this pool")]
    fn test_releasing_foreign_slot_is_fatal() {
        let pool = WorkerPool::with_workers(1);
        pool.shared.release(7);
    }
}
