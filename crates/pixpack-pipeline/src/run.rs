//! Two-worker supervision shared by the encode and decode pipelines.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, Scope, ScopedJoinHandle, Thread};
use std::time::Duration;

use tracing::debug;

use crate::cancel::{CancelGuard, CancelToken};
use crate::error::{PipelineError, Result};
use crate::progress::{Progress, ProgressSnapshot};
use crate::queue::FrameQueue;

/// State shared by the two workers of one run.
pub(crate) struct RunContext<T> {
    pub(crate) queue: Arc<FrameQueue<T>>,
    failed: AtomicBool,
    cancel: CancelToken,
    _cancel_hook: CancelGuard,
}

impl<T: Send + 'static> RunContext<T> {
    pub(crate) fn new(queue_depth: usize, cancel: &CancelToken) -> Self {
        let queue = Arc::new(FrameQueue::new(queue_depth));
        let hook_queue = Arc::clone(&queue);
        let cancel_hook = cancel.on_cancel(move || hook_queue.close());
        Self {
            queue,
            failed: AtomicBool::new(false),
            cancel: cancel.clone(),
            _cancel_hook: cancel_hook,
        }
    }
}

impl<T> RunContext<T> {
    /// Mark the run failed and release the other worker.
    pub(crate) fn fail(&self) {
        self.failed.store(true, Ordering::Release);
        self.queue.close();
    }

    /// True if this worker should stop instead of continuing normally.
    pub(crate) fn should_stop(&self) -> bool {
        self.failed.load(Ordering::Acquire) || self.cancel.is_cancelled()
    }

    /// Error reported by a worker that stops because of [`Self::should_stop`].
    pub(crate) fn stop_reason(&self) -> PipelineError {
        if self.cancel.is_cancelled() {
            PipelineError::Cancelled
        } else {
            PipelineError::Aborted
        }
    }

    /// A cancelled run reports `Cancelled`, whatever the killed codec said.
    fn attribute(&self, err: PipelineError) -> PipelineError {
        match err {
            PipelineError::WorkerPanicked(_) => err,
            _ if self.cancel.is_cancelled() => PipelineError::Cancelled,
            _ => err,
        }
    }
}

/// Run `producer` and `consumer` on two scoped threads until both finish.
///
/// With an observer, the calling thread wakes every `interval` (and whenever
/// a worker exits) to report progress, and reports once more after both
/// workers are done. The first real error wins; a worker that merely stopped
/// because its peer failed never masks the cause.
pub(crate) fn run_pair<T, P, C, PR, CR>(
    ctx: &RunContext<T>,
    progress: &Progress,
    interval: Duration,
    observer: Option<&mut dyn FnMut(&ProgressSnapshot)>,
    producer: P,
    consumer: C,
) -> Result<(PR, CR)>
where
    T: Send,
    P: FnOnce() -> Result<PR> + Send,
    C: FnOnce() -> Result<CR> + Send,
    PR: Send,
    CR: Send,
{
    let main = thread::current();
    thread::scope(|scope| {
        let producer = spawn_worker(scope, "producer", ctx, &main, producer)?;
        let consumer = match spawn_worker(scope, "consumer", ctx, &main, consumer) {
            Ok(handle) => handle,
            Err(err) => {
                ctx.fail();
                let _ = producer.join();
                return Err(err);
            }
        };

        if let Some(observer) = observer {
            loop {
                let done = producer.is_finished() && consumer.is_finished();
                observer(&progress.snapshot());
                if done {
                    break;
                }
                thread::park_timeout(interval);
            }
        }

        let produced = join_worker(producer, "producer");
        let consumed = join_worker(consumer, "consumer");
        combine(produced, consumed).map_err(|err| ctx.attribute(err))
    })
}

fn spawn_worker<'scope, 'env, T, F, R>(
    scope: &'scope Scope<'scope, 'env>,
    name: &'static str,
    ctx: &'scope RunContext<T>,
    main: &Thread,
    work: F,
) -> Result<ScopedJoinHandle<'scope, Result<R>>>
where
    T: Send,
    F: FnOnce() -> Result<R> + Send + 'scope,
    R: Send + 'scope,
{
    let main = main.clone();
    thread::Builder::new()
        .name(format!("pixpack-{name}"))
        .spawn_scoped(scope, move || {
            let _exit = WorkerExit { ctx, main };
            let result = work();
            if let Err(err) = &result {
                debug!(worker = name, error = %err, "worker stopped");
                ctx.fail();
            }
            result
        })
        .map_err(|source| PipelineError::Spawn { name, source })
}

/// Wakes the supervising thread on worker exit, and fails the run if the
/// worker is unwinding.
struct WorkerExit<'a, T> {
    ctx: &'a RunContext<T>,
    main: Thread,
}

impl<T> Drop for WorkerExit<'_, T> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.ctx.fail();
        }
        self.main.unpark();
    }
}

fn join_worker<R>(handle: ScopedJoinHandle<'_, Result<R>>, name: &'static str) -> Result<R> {
    handle
        .join()
        .map_err(|_| PipelineError::WorkerPanicked(name))?
}

fn combine<PR, CR>(produced: Result<PR>, consumed: Result<CR>) -> Result<(PR, CR)> {
    match (produced, consumed) {
        (Ok(p), Ok(c)) => Ok((p, c)),
        (Err(err), Ok(_)) | (Ok(_), Err(err)) => Err(err),
        (Err(p), Err(c)) => Err(if p.is_follow_on() { c } else { p }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follow_on_error_never_wins() {
        let result: Result<((), ())> = combine(
            Err(PipelineError::Aborted),
            Err(PipelineError::InputTruncated {
                expected: 2,
                actual: 1,
            }),
        );
        assert!(matches!(
            result,
            Err(PipelineError::InputTruncated { .. })
        ));

        let result: Result<((), ())> =
            combine(Err(PipelineError::Cancelled), Err(PipelineError::Aborted));
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }

    #[test]
    fn cancelled_run_reports_cancelled_over_codec_error() {
        let token = CancelToken::new();
        let ctx = RunContext::<u32>::new(1, &token);
        let progress = Progress::new();
        let cancel = token.clone();

        let result = run_pair(
            &ctx,
            &progress,
            Duration::from_millis(10),
            None,
            || -> Result<()> { Ok(()) },
            move || -> Result<()> {
                cancel.cancel();
                Err(PipelineError::Sink(pixpack_transport::TransportError::Closed))
            },
        );
        assert!(matches!(result, Err(PipelineError::Cancelled)));

        let result: Result<((), ())> = combine(
            Err(PipelineError::Source(pixpack_transport::TransportError::Closed)),
            Err(PipelineError::Cancelled),
        )
        .map_err(|err| ctx.attribute(err));
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }

    #[test]
    fn panicking_worker_releases_peer() {
        let token = CancelToken::new();
        let ctx = RunContext::<u32>::new(1, &token);
        let progress = Progress::new();

        let result = run_pair(
            &ctx,
            &progress,
            Duration::from_millis(10),
            None,
            || -> Result<()> { panic!("producer exploded") },
            || {
                while ctx.queue.pop().is_some() {}
                Ok(())
            },
        );
        assert!(matches!(
            result,
            Err(PipelineError::WorkerPanicked("producer"))
        ));
    }

    #[test]
    fn observer_sees_final_progress() {
        let token = CancelToken::new();
        let ctx = RunContext::<u32>::new(2, &token);
        let progress = Progress::new();
        let mut calls = 0;
        let mut observer = |_: &ProgressSnapshot| calls += 1;

        let (sent, received) = run_pair(
            &ctx,
            &progress,
            Duration::from_millis(5),
            Some(&mut observer),
            || {
                for i in 0..10 {
                    ctx.queue.push(i);
                    progress.record_produced(1);
                }
                ctx.queue.close();
                Ok(10)
            },
            || {
                let mut n = 0;
                while ctx.queue.pop().is_some() {
                    n += 1;
                    progress.record_consumed(1);
                }
                Ok(n)
            },
        )
        .unwrap();

        assert_eq!((sent, received), (10, 10));
        assert!(calls >= 1);
        assert_eq!(progress.snapshot().frames_consumed, 10);
    }

    #[test]
    fn cancel_closes_queue() {
        let token = CancelToken::new();
        let ctx = RunContext::<u32>::new(1, &token);
        token.cancel();

        assert!(ctx.queue.is_closed());
        assert!(ctx.should_stop());
        assert!(matches!(ctx.stop_reason(), PipelineError::Cancelled));
    }
}
