//! Per-request instrumentation hook
//!
//! Every backend call reports `(op, byte_size, elapsed_micros, success)`
//! exactly once, including on failure. The hook is observational only;
//! it must never be used for control flow.

use std::time::Instant;

/// Kind of object-store operation being measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    List,
    Create,
    Info,
    Delete,
    Copy,
    Read,
    Write,
}

/// Callback invoked once per backend call with
/// `(op, byte_size, elapsed_micros, success)`
pub type RequestHook = dyn Fn(OpKind, u64, u64, bool) + Send + Sync;

/// Scope guard that reports one backend call to the hook on drop
///
/// Success defaults to false, so early returns and `?` propagation
/// report a failed call without any extra bookkeeping at the call site.
pub struct OpGuard<'a> {
    hook: Option<&'a RequestHook>,
    op: OpKind,
    size: u64,
    success: bool,
    start: Instant,
}

impl<'a> OpGuard<'a> {
    pub fn new(hook: Option<&'a RequestHook>, op: OpKind) -> Self {
        Self {
            hook,
            op,
            size: 0,
            success: false,
            start: Instant::now(),
        }
    }

    pub fn with_size(hook: Option<&'a RequestHook>, op: OpKind, size: u64) -> Self {
        let mut guard = Self::new(hook, op);
        guard.size = size;
        guard
    }

    /// Record the byte size once it is known (e.g. after a read returns)
    pub fn set_size(&mut self, size: u64) {
        self.size = size;
    }

    pub fn set_success(&mut self, success: bool) {
        self.success = success;
    }
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        if let Some(hook) = self.hook {
            let elapsed = self.start.elapsed().as_micros() as u64;
            hook(self.op, self.size, elapsed, self.success);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_guard_reports_on_drop() {
        let calls = Arc::new(AtomicU64::new(0));
        let calls_clone = calls.clone();
        let hook = move |op: OpKind, size: u64, _micros: u64, success: bool| {
            assert_eq!(op, OpKind::Write);
            assert_eq!(size, 128);
            assert!(success);
            calls_clone.fetch_add(1, Ordering::SeqCst);
        };

        {
            let mut guard = OpGuard::with_size(Some(&hook), OpKind::Write, 128);
            guard.set_success(true);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_defaults_to_failure() {
        let failed = Arc::new(AtomicU64::new(0));
        let failed_clone = failed.clone();
        let hook = move |_op: OpKind, _size: u64, _micros: u64, success: bool| {
            if !success {
                failed_clone.fetch_add(1, Ordering::SeqCst);
            }
        };

        // Simulates an early return through `?`: the guard drops
        // before set_success is ever called.
        {
            let _guard = OpGuard::new(Some(&hook), OpKind::Read);
        }
        assert_eq!(failed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_without_hook_is_noop() {
        let _guard = OpGuard::new(None, OpKind::Delete);
    }
}
