use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

type Hook = Box<dyn Fn() + Send + Sync>;

/// Cooperative cancellation shared between a caller and running pipelines.
///
/// Cancelling sets a flag the workers poll and runs every registered hook
/// once. Pipelines register a hook that closes their queue, so blocked
/// workers wake up immediately. Callers can register their own, e.g. to
/// kill a codec process.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    next_id: AtomicU64,
    hooks: Mutex<Vec<(u64, Hook)>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Only the first call runs the hooks.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("cancellation requested");
        let hooks = self.hooks();
        for (_, hook) in hooks.iter() {
            hook();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Run `hook` on cancellation while the returned guard is alive.
    ///
    /// If the token is already cancelled the hook runs immediately.
    pub fn on_cancel<F>(&self, hook: F) -> CancelGuard
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut hooks = self.hooks();
        if self.is_cancelled() {
            drop(hooks);
            hook();
            return CancelGuard {
                token: self.clone(),
                id: None,
            };
        }
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        hooks.push((id, Box::new(hook)));
        CancelGuard {
            token: self.clone(),
            id: Some(id),
        }
    }

    fn hooks(&self) -> MutexGuard<'_, Vec<(u64, Hook)>> {
        self.inner
            .hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .field("hooks", &self.hooks().len())
            .finish()
    }
}

/// Unregisters a cancellation hook when dropped.
#[must_use = "the hook is removed as soon as the guard is dropped"]
pub struct CancelGuard {
    token: CancelToken,
    id: Option<u64>,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            self.token.hooks().retain(|(hook_id, _)| *hook_id != id);
        }
    }
}

impl fmt::Debug for CancelGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelGuard").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let hook_count = Arc::clone(&count);
        (count, move || {
            hook_count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn hooks_run_once() {
        let token = CancelToken::new();
        let (count, hook) = counter();
        let _guard = token.on_cancel(hook);

        assert!(!token.is_cancelled());
        token.cancel();
        token.cancel();

        assert!(token.is_cancelled());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_guard_unregisters() {
        let token = CancelToken::new();
        let (count, hook) = counter();
        drop(token.on_cancel(hook));

        token.cancel();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn late_registration_runs_immediately() {
        let token = CancelToken::new();
        token.cancel();

        let (count, hook) = counter();
        let _guard = token.on_cancel(hook);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clones_share_flag() {
        let token = CancelToken::new();
        let other = token.clone();
        other.cancel();
        assert!(token.is_cancelled());
        assert!(format!("{token:?}").contains("cancelled: true"));
    }
}
