use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::Mutex;
use time::OffsetDateTime;
use tracing::debug;

use super::ResourceId;

/// Field type for snapshots with no editable surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoField {}

/// Optimistic-edit support for a snapshot type: which field keys exist and
/// what value type overlays them.
pub trait EditOverlay {
    type Field: Clone + Eq + Hash + Send + 'static;
    type Value: Clone + Send + 'static;

    /// Whether the confirmed snapshot carries this field.
    fn contains_field(&self, field: &Self::Field) -> bool;
}

/// Last-known-good server state, tagged with its fetch time and the sequence
/// number of the request that produced it.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub value: T,
    pub fetched_at: OffsetDateTime,
    pub seq: u64,
}

struct ViewState<T: EditOverlay> {
    snapshot: Option<Snapshot<T>>,
    edits: HashMap<T::Field, T::Value>,
    error: Option<String>,
    issued: u64,
    applied: u64,
}

/// Owns exactly one resource's snapshot plus its in-flight optimistic edits.
///
/// Fetches are identified by a per-view monotonic sequence number. A response
/// is applied only if its sequence is higher than everything applied so far;
/// the discard rule replaces locking for overlapping in-flight requests.
pub struct ResourceView<T: EditOverlay> {
    id: ResourceId,
    state: Mutex<ViewState<T>>,
}

impl<T: EditOverlay> ResourceView<T> {
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            state: Mutex::new(ViewState {
                snapshot: None,
                edits: HashMap::new(),
                error: None,
                issued: 0,
                applied: 0,
            }),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Hands out the sequence number for the next outstanding fetch.
    pub fn begin_fetch(&self) -> u64 {
        let mut state = self.state.lock();
        state.issued += 1;
        state.issued
    }

    /// Replaces the snapshot wholesale and reconciles edits. Returns false
    /// when the response is stale (an out-of-order arrival) and was dropped.
    pub fn apply_ok(&self, seq: u64, value: T) -> bool {
        let mut state = self.state.lock();
        if seq <= state.applied {
            debug!(resource = %self.id, seq, applied = state.applied, "dropping stale response");
            return false;
        }
        state.applied = seq;
        state.snapshot = Some(Snapshot {
            value,
            fetched_at: OffsetDateTime::now_utc(),
            seq,
        });
        state.error = None;
        Self::reconcile_locked(&mut state);
        true
    }

    /// Records a fetch failure. The previous snapshot is retained (shown as
    /// stale), and the same staleness rule applies: a slow failure cannot
    /// clobber the outcome of a newer request.
    pub fn apply_err(&self, seq: u64, message: String) -> bool {
        let mut state = self.state.lock();
        if seq <= state.applied {
            debug!(resource = %self.id, seq, applied = state.applied, "dropping stale error");
            return false;
        }
        state.applied = seq;
        state.error = Some(message);
        true
    }

    /// Error signal from a mutation round-trip; not sequence-guarded because
    /// mutations are serialized by the coordinator.
    pub fn set_error(&self, message: String) {
        self.state.lock().error = Some(message);
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    /// Local-only overlay; never contacts the server.
    pub fn apply_optimistic_edit(&self, field: T::Field, value: T::Value) {
        self.state.lock().edits.insert(field, value);
    }

    /// The unconfirmed overlay value for a field, if one is pending.
    pub fn pending_edit(&self, field: &T::Field) -> Option<T::Value> {
        self.state.lock().edits.get(field).cloned()
    }

    pub fn pending_edit_count(&self) -> usize {
        self.state.lock().edits.len()
    }

    /// Server-wins: drops every edit whose field is present in the current
    /// snapshot. Idempotent; invoked after every successful read and after
    /// every mutation round-trip.
    pub fn reconcile(&self) {
        let mut state = self.state.lock();
        Self::reconcile_locked(&mut state);
    }

    fn reconcile_locked(state: &mut ViewState<T>) {
        if let Some(snapshot) = state.snapshot.as_ref() {
            let value = &snapshot.value;
            state.edits.retain(|field, _| !value.contains_field(field));
        }
    }
}

impl<T: EditOverlay + Clone> ResourceView<T> {
    pub fn snapshot(&self) -> Option<Snapshot<T>> {
        self.state.lock().snapshot.clone()
    }

    /// Runs a projection over the current snapshot without cloning it.
    pub fn with_snapshot<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        let state = self.state.lock();
        f(state.snapshot.as_ref().map(|s| &s.value))
    }
}
