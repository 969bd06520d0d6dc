use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Lifecycle of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    /// Both workers are moving frames.
    Streaming,
    /// The producer reached the end of its input; the consumer is emptying the queue.
    Draining,
    /// The codec is finalizing, or the decoded output is being flushed.
    Finalizing,
    Done,
    Failed,
}

impl PipelineState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => PipelineState::Streaming,
            2 => PipelineState::Draining,
            3 => PipelineState::Finalizing,
            4 => PipelineState::Done,
            5 => PipelineState::Failed,
            _ => PipelineState::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            PipelineState::Idle => 0,
            PipelineState::Streaming => 1,
            PipelineState::Draining => 2,
            PipelineState::Finalizing => 3,
            PipelineState::Done => 4,
            PipelineState::Failed => 5,
        }
    }

    /// True once the run has ended, successfully or not.
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

/// Point-in-time view of a run's counters.
///
/// Produced counters are written only by the producer worker and consumed
/// counters only by the consumer; a snapshot may mix values from slightly
/// different moments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// Frames handed to the queue.
    pub frames_produced: u64,
    /// Frames taken off the queue and fully handled.
    pub frames_consumed: u64,
    /// Encode: input bytes packed. Decode: raw bytes read from the codec.
    pub bytes_read: u64,
    /// Encode: frame bytes written to the codec. Decode: payload bytes written.
    pub bytes_written: u64,
    pub state: PipelineState,
}

impl ProgressSnapshot {
    /// Frames currently queued or in hand between the workers.
    pub fn in_flight(&self) -> u64 {
        self.frames_produced.saturating_sub(self.frames_consumed)
    }
}

/// Shared read-only handle onto a run's progress.
///
/// Cloning is cheap; all clones observe the same run.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    frames_produced: AtomicU64,
    frames_consumed: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    state: AtomicU8,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let c = &self.inner;
        ProgressSnapshot {
            frames_produced: c.frames_produced.load(Ordering::Relaxed),
            frames_consumed: c.frames_consumed.load(Ordering::Relaxed),
            bytes_read: c.bytes_read.load(Ordering::Relaxed),
            bytes_written: c.bytes_written.load(Ordering::Relaxed),
            state: self.state(),
        }
    }

    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub(crate) fn reset(&self) {
        let c = &self.inner;
        c.frames_produced.store(0, Ordering::Relaxed);
        c.frames_consumed.store(0, Ordering::Relaxed);
        c.bytes_read.store(0, Ordering::Relaxed);
        c.bytes_written.store(0, Ordering::Relaxed);
        self.set_state(PipelineState::Idle);
    }

    pub(crate) fn set_state(&self, state: PipelineState) {
        self.inner.state.store(state.as_u8(), Ordering::Release);
    }

    /// One frame queued, carrying `bytes` read from the input side.
    pub(crate) fn record_produced(&self, bytes: u64) {
        self.inner.frames_produced.fetch_add(1, Ordering::Relaxed);
        self.record_read(bytes);
    }

    pub(crate) fn record_read(&self, bytes: u64) {
        self.inner.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    /// One frame handled, having written `bytes` to the output side.
    pub(crate) fn record_consumed(&self, bytes: u64) {
        self.inner.frames_consumed.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }
}
