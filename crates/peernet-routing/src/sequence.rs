//! Sequence registry (spec §4.H)
//!
//! Every outbound request that expects a correlated reply — a bootstrap
//! FIND_SELF, an information request fan-out, a block-transfer session —
//! registers a [`Sequence`] keyed by `(remote public key, sequence number)`.
//! The registry does not know what a sequence number *means*; that's carried
//! in [`SequenceData`], so `peernet-transport`'s block-transfer state can
//! ride the same registry without this crate depending on transport.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::trace;

use peernet_core::identity::NodeId;

use crate::information_request::InformationRequest;

/// Default time a sequence is allowed to sit unanswered before the sweeper
/// reclaims it (spec §4.H).
pub const DEFAULT_SEQUENCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Whether replies are expected from one side only or from both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceDirection {
    Unidirectional,
    Bidirectional,
}

/// Payload a sequence carries, tagged by what registered it. `Opaque` lets a
/// crate this one doesn't depend on (`peernet-transport`) store its own
/// state under the same registry instead of duplicating sequence bookkeeping.
pub enum SequenceData {
    BootstrapFindSelf,
    InformationRequest(Arc<InformationRequest>),
    Opaque(Arc<dyn Any + Send + Sync>),
}

/// A single in-flight correlation between a sent packet and its expected
/// reply.
pub struct Sequence {
    pub sequence_number: u32,
    pub remote_public_key: NodeId,
    pub created_at: Instant,
    pub timeout: Duration,
    pub direction: SequenceDirection,
    pub data: SequenceData,
    /// Extra cleanup to run on timeout, for a `SequenceData::Opaque` payload
    /// this crate can't interpret on its own — e.g. `peernet-node` tearing
    /// down a block-transfer channel (spec §4.H). Set after registration via
    /// [`Sequence::set_on_terminate`], since the payload the closure needs to
    /// capture (a channel keyed by this sequence's own number) often can't
    /// exist before the sequence number is allocated.
    on_terminate: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
    terminated: AtomicBool,
}

impl Sequence {
    fn new(
        sequence_number: u32,
        remote_public_key: NodeId,
        timeout: Duration,
        direction: SequenceDirection,
        data: SequenceData,
    ) -> Self {
        Self {
            sequence_number,
            remote_public_key,
            created_at: Instant::now(),
            timeout,
            direction,
            data,
            on_terminate: Mutex::new(None),
            terminated: AtomicBool::new(false),
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) >= self.timeout
    }

    /// Attach (or replace) the cleanup closure [`run_terminate_effect`](Self::run_terminate_effect)
    /// invokes on timeout, in addition to whatever `SequenceData` itself
    /// implies (e.g. `InformationRequest::done()`).
    pub fn set_on_terminate(&self, effect: impl Fn() + Send + Sync + 'static) {
        *self.on_terminate.lock().unwrap() = Some(Box::new(effect));
    }

    /// Mark this sequence terminated, returning `true` only the first time
    /// (exactly-once semantics, spec §4.H/§4.F `onTerminate`).
    pub fn mark_terminated(&self) -> bool {
        self.terminated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Run this sequence's timeout effect (spec §4.H "a background sweeper
    /// fires onTerminate"): `InformationRequest::done()` for an
    /// information-request sequence (spec §4.F "On sequence timeout the
    /// sequence's Terminate invokes Done() to unblock consumers"), plus
    /// whatever [`set_on_terminate`](Self::set_on_terminate) closure was
    /// attached. The caller must have already won `mark_terminated()` so
    /// this runs at most once per sequence.
    pub fn run_terminate_effect(&self) {
        if let SequenceData::InformationRequest(ir) = &self.data {
            ir.done();
        }
        if let Some(effect) = self.on_terminate.lock().unwrap().as_ref() {
            effect();
        }
    }
}

/// Process-wide table of in-flight sequences, keyed by `(remote, sequence
/// number)` (spec §4.H).
#[derive(Default)]
pub struct SequenceRegistry {
    sequences: DashMap<(NodeId, u32), Arc<Sequence>>,
    next_bi: DashMap<NodeId, AtomicU32>,
}

impl SequenceRegistry {
    pub fn new() -> Self {
        Self {
            sequences: DashMap::new(),
            next_bi: DashMap::new(),
        }
    }

    /// Register a sequence number chosen by the caller (e.g. echoed from an
    /// inbound packet), unidirectional by default.
    pub fn register_sequence(
        &self,
        remote: NodeId,
        sequence_number: u32,
        data: SequenceData,
    ) -> Arc<Sequence> {
        self.register(
            remote,
            sequence_number,
            DEFAULT_SEQUENCE_TIMEOUT,
            SequenceDirection::Unidirectional,
            data,
        )
    }

    /// Allocate a fresh, locally-chosen bidirectional sequence number for
    /// `remote` (`NewSequenceBi` in the original source) and register it.
    pub fn new_sequence_bi(&self, remote: NodeId, data: SequenceData) -> Arc<Sequence> {
        let counter = self
            .next_bi
            .entry(remote)
            .or_insert_with(|| AtomicU32::new(rand::random()));
        let sequence_number = counter.fetch_add(1, Ordering::SeqCst);
        drop(counter);
        self.register(
            remote,
            sequence_number,
            DEFAULT_SEQUENCE_TIMEOUT,
            SequenceDirection::Bidirectional,
            data,
        )
    }

    /// Register a sequence with an explicit timeout/direction
    /// (`RegisterSequenceBi` in the original source, generalized).
    pub fn register(
        &self,
        remote: NodeId,
        sequence_number: u32,
        timeout: Duration,
        direction: SequenceDirection,
        data: SequenceData,
    ) -> Arc<Sequence> {
        let sequence = Arc::new(Sequence::new(
            sequence_number,
            remote,
            timeout,
            direction,
            data,
        ));
        self.sequences
            .insert((remote, sequence_number), sequence.clone());
        sequence
    }

    pub fn lookup(&self, remote: &NodeId, sequence_number: u32) -> Option<Arc<Sequence>> {
        self.sequences
            .get(&(*remote, sequence_number))
            .map(|e| e.clone())
    }

    /// Terminate and remove a sequence, invoking the caller-supplied
    /// `on_terminate` exactly once (spec §4.H). Returns `false` if the
    /// sequence was already terminated by a concurrent caller.
    pub fn terminate(
        &self,
        remote: &NodeId,
        sequence_number: u32,
        on_terminate: impl FnOnce(&Sequence),
    ) -> bool {
        let Some((_, sequence)) = self.sequences.remove(&(*remote, sequence_number)) else {
            return false;
        };
        if sequence.mark_terminated() {
            on_terminate(&sequence);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// One pass of the background timeout sweeper, mirroring
    /// `peerlist::autoping::tick` — the caller drives this from its own
    /// interval rather than this crate spawning a task.
    pub fn sweep_once(&self, now: Instant) -> Vec<(NodeId, u32)> {
        let expired: Vec<(NodeId, u32)> = self
            .sequences
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| *entry.key())
            .collect();

        for key in &expired {
            if let Some((_, sequence)) = self.sequences.remove(key) {
                if sequence.mark_terminated() {
                    sequence.run_terminate_effect();
                    trace!(remote = %key.0, sequence_number = key.1, "sequence timed out");
                }
            }
        }

        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote() -> NodeId {
        NodeId::from_bytes([7u8; 32])
    }

    #[test]
    fn register_then_lookup() {
        let registry = SequenceRegistry::new();
        registry.register_sequence(remote(), 42, SequenceData::BootstrapFindSelf);
        assert!(registry.lookup(&remote(), 42).is_some());
    }

    #[test]
    fn terminate_is_exactly_once() {
        let registry = SequenceRegistry::new();
        registry.register_sequence(remote(), 1, SequenceData::BootstrapFindSelf);

        let mut calls = 0;
        let first = registry.terminate(&remote(), 1, |_| calls += 1);
        assert!(first);
        assert_eq!(calls, 1);

        // Already removed: second terminate is a no-op.
        let second = registry.terminate(&remote(), 1, |_| calls += 1);
        assert!(!second);
        assert_eq!(calls, 1);
    }

    #[test]
    fn new_sequence_bi_allocates_distinct_numbers() {
        let registry = SequenceRegistry::new();
        let a = registry.new_sequence_bi(remote(), SequenceData::BootstrapFindSelf);
        let b = registry.new_sequence_bi(remote(), SequenceData::BootstrapFindSelf);
        assert_ne!(a.sequence_number, b.sequence_number);
    }

    #[test]
    fn sweep_removes_expired_sequences() {
        let registry = SequenceRegistry::new();
        registry.register(
            remote(),
            5,
            Duration::from_secs(0),
            SequenceDirection::Unidirectional,
            SequenceData::BootstrapFindSelf,
        );

        let expired = registry.sweep_once(Instant::now() + Duration::from_millis(1));
        assert_eq!(expired, vec![(remote(), 5)]);
        assert!(registry.is_empty());
    }

    #[test]
    fn sweep_runs_information_request_done_on_timeout() {
        let registry = SequenceRegistry::new();
        let (ir, mut rx) = InformationRequest::new(1);
        let ir = Arc::new(ir);
        registry.register(
            remote(),
            9,
            Duration::from_secs(0),
            SequenceDirection::Unidirectional,
            SequenceData::InformationRequest(ir.clone()),
        );

        let expired = registry.sweep_once(Instant::now() + Duration::from_millis(1));
        assert_eq!(expired, vec![(remote(), 9)]);

        // done() closed the channel: a pending recv now returns None instead
        // of blocking forever (spec §4.F "Terminate invokes Done() to
        // unblock consumers").
        assert!(rx.try_recv().is_err());
        assert!(ir.is_terminated());
    }

    #[test]
    fn sweep_runs_on_terminate_closure_exactly_once() {
        let registry = SequenceRegistry::new();
        let sequence = registry.register(
            remote(),
            11,
            Duration::from_secs(0),
            SequenceDirection::Bidirectional,
            SequenceData::Opaque(Arc::new(())),
        );

        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let calls_clone = calls.clone();
        sequence.set_on_terminate(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        let first = registry.sweep_once(Instant::now() + Duration::from_millis(1));
        assert_eq!(first, vec![(remote(), 11)]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // sequence already removed: a second sweep finds nothing left to
        // terminate, so the closure does not fire again.
        let second = registry.sweep_once(Instant::now() + Duration::from_secs(100));
        assert!(second.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
