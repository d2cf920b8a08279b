//! Per-mounted-volume state

use crate::cache::{ForgetList, NodeCache};
use crate::context::{Finalizer, FuseContext, Payload};
use crate::ioq::Ioq;
use crate::provider::VolumeParams;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tracing::debug;

/// Protocol negotiation state, set exactly once.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Negotiation {
    Unset,
    Ready { major: u32, minor: u32 },
    Denied,
}

/// Outcome of waiting for negotiation to complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadyWait {
    Ready,
    Denied,
    Cancelled,
}

/// Publishes the negotiation outcome once and wakes blocked exchanges.
#[derive(Debug)]
pub(crate) struct ReadyGate {
    state: Mutex<Negotiation>,
    cvar: Condvar,
}

impl ReadyGate {
    fn new() -> Self {
        Self {
            state: Mutex::new(Negotiation::Unset),
            cvar: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Negotiation> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn publish(&self, major: u32, minor: u32) {
        let mut state = self.lock();
        if matches!(*state, Negotiation::Unset) {
            debug!(major, minor, "protocol version negotiated");
            *state = Negotiation::Ready { major, minor };
            self.cvar.notify_all();
        } else {
            debug_assert!(false, "negotiation published twice");
        }
    }

    pub(crate) fn deny(&self) {
        let mut state = self.lock();
        if matches!(*state, Negotiation::Unset) {
            debug!("protocol negotiation denied");
            *state = Negotiation::Denied;
            self.cvar.notify_all();
        }
    }

    pub(crate) fn negotiated(&self) -> Option<(u32, u32)> {
        match *self.lock() {
            Negotiation::Ready { major, minor } => Some((major, minor)),
            _ => None,
        }
    }

    /// Blocks until negotiation completes or the token is cancelled.
    pub(crate) fn wait_ready(&self, cancel: &CancelToken) -> ReadyWait {
        let mut state = self.lock();
        loop {
            if cancel.is_cancelled() {
                return ReadyWait::Cancelled;
            }
            match *state {
                Negotiation::Ready { .. } => return ReadyWait::Ready,
                Negotiation::Denied => return ReadyWait::Denied,
                Negotiation::Unset => {
                    state = self
                        .cvar
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }
}

/// Cancels a readiness wait from outside the blocked exchange.
#[derive(Debug, Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    gate: Arc<ReadyGate>,
}

impl CancelToken {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        // take the gate lock so a waiter between its check and the wait
        // cannot miss the wakeup
        let _state = self.gate.lock();
        self.gate.cvar.notify_all();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Per-mounted-volume state: the transaction queue, the node cache
/// handle, the negotiated-protocol gate and the token generator.
///
/// Creating an instance posts the protocol handshake; it is transmitted
/// by the first channel exchange that asks for a request.
pub struct FuseInstance {
    volume_params: VolumeParams,
    ioq: Ioq,
    cache: Arc<dyn NodeCache>,
    unique: AtomicU64,
    gate: Arc<ReadyGate>,
}

impl FuseInstance {
    #[must_use]
    pub fn new(volume_params: VolumeParams, cache: Arc<dyn NodeCache>) -> Self {
        let instance = Self {
            volume_params,
            ioq: Ioq::new(),
            cache,
            unique: AtomicU64::new(1),
            gate: Arc::new(ReadyGate::new()),
        };

        let ctx = FuseContext::internal(instance.next_token(), Payload::Init, None);
        instance.ioq.post_pending(ctx);
        instance
    }

    pub(crate) fn next_token(&self) -> u64 {
        self.unique.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn ioq(&self) -> &Ioq {
        &self.ioq
    }

    pub(crate) fn gate(&self) -> &ReadyGate {
        &self.gate
    }

    pub(crate) fn negotiated(&self) -> Option<(u32, u32)> {
        self.gate.negotiated()
    }

    #[must_use]
    pub fn volume_params(&self) -> &VolumeParams {
        &self.volume_params
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        CancelToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            gate: Arc::clone(&self.gate),
        }
    }

    /// Posts forget notifications for the given node references.
    ///
    /// Typically driven by the external cache expiration schedule. The
    /// entries are drained across later channel exchanges; whatever is
    /// left when the context dies goes back to the cache.
    pub fn post_forget(&self, nodeids: Vec<u64>) {
        if nodeids.is_empty() {
            return;
        }
        debug!(count = nodeids.len(), "posting forget");

        let cache = Arc::clone(&self.cache);
        let fini: Finalizer = Box::new(move |payload| {
            if let Payload::Forget { list } = payload {
                let remaining = list.take_remaining();
                if !remaining.is_empty() {
                    cache.release_forget(&remaining);
                }
            }
        });

        let ctx = FuseContext::internal(
            self.next_token(),
            Payload::Forget {
                list: ForgetList::new(nodeids),
            },
            Some(fini),
        );
        self.ioq.post_pending(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NodeCache;

    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingCache {
        released: StdMutex<Vec<u64>>,
    }

    impl NodeCache for RecordingCache {
        fn release_forget(&self, nodeids: &[u64]) {
            self.released
                .lock()
                .unwrap()
                .extend_from_slice(nodeids);
        }
    }

    fn test_instance() -> (FuseInstance, Arc<RecordingCache>) {
        let cache = Arc::new(RecordingCache::default());
        let instance = FuseInstance::new(
            VolumeParams {
                sector_size: 512,
                sectors_per_allocation_unit: 8,
            },
            Arc::<RecordingCache>::clone(&cache),
        );
        (instance, cache)
    }

    #[test]
    fn gate_publishes_once() {
        let gate = ReadyGate::new();
        assert_eq!(gate.negotiated(), None);
        gate.publish(7, 31);
        assert_eq!(gate.negotiated(), Some((7, 31)));
        gate.deny();
        assert_eq!(gate.negotiated(), Some((7, 31)));
    }

    #[test]
    fn wait_ready_observes_denial() {
        let gate = ReadyGate::new();
        gate.deny();
        let token = CancelToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            gate: Arc::new(ReadyGate::new()),
        };
        assert_eq!(gate.wait_ready(&token), ReadyWait::Denied);
    }

    #[test]
    fn wait_ready_is_cancellable() {
        let (instance, _cache) = test_instance();
        let token = instance.cancel_token();
        let waiter = token.clone();

        crossbeam_utils::thread::scope(|scope| {
            let gate = instance.gate();
            let handle = scope.spawn(move |_| gate.wait_ready(&waiter));
            std::thread::sleep(Duration::from_millis(20));
            token.cancel();
            assert_eq!(handle.join().unwrap(), ReadyWait::Cancelled);
        })
        .unwrap();
    }

    #[test]
    fn tokens_strictly_increase() {
        let (instance, _cache) = test_instance();
        let a = instance.next_token();
        let b = instance.next_token();
        let c = instance.next_token();
        assert!(a < b && b < c);
    }

    #[test]
    fn dropping_undrained_forget_releases_entries() {
        let (instance, cache) = test_instance();
        instance.post_forget(vec![4, 5, 6]);
        drop(instance);
        assert_eq!(*cache.released.lock().unwrap(), vec![4, 5, 6]);
    }

    #[test]
    fn empty_forget_list_is_ignored() {
        let (instance, cache) = test_instance();
        instance.post_forget(Vec::new());
        drop(instance);
        assert!(cache.released.lock().unwrap().is_empty());
    }
}
