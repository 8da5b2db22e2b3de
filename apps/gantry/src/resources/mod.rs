pub mod events;
pub mod view;

use std::fmt;

use gantry_proto::{
    ConfigDetail, DatasetSnapshot, EventRecord, MdSessionStatus, MetricsSnapshot,
    MulticastMembership, OverviewSnapshot, PdSummary, SimulationState, TimeSyncStatus,
};

pub use events::{EventFilter, SeverityFilter};
pub use view::{EditOverlay, NoField, ResourceView, Snapshot};

/// Key for one monitored resource. Datasets and MD sessions are watched per
/// id; everything else is a singleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceId {
    Overview,
    PdStatus,
    MdSession(u32),
    Dataset(u32),
    Multicast,
    Events,
    Metrics,
    LogTail,
    SimState,
    TimeSync,
    ConfigDetail,
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Overview => write!(f, "overview"),
            ResourceId::PdStatus => write!(f, "pd-status"),
            ResourceId::MdSession(id) => write!(f, "md-session/{id}"),
            ResourceId::Dataset(id) => write!(f, "dataset/{id}"),
            ResourceId::Multicast => write!(f, "multicast"),
            ResourceId::Events => write!(f, "events"),
            ResourceId::Metrics => write!(f, "metrics"),
            ResourceId::LogTail => write!(f, "log-tail"),
            ResourceId::SimState => write!(f, "sim-state"),
            ResourceId::TimeSync => write!(f, "time-sync"),
            ResourceId::ConfigDetail => write!(f, "config-detail"),
        }
    }
}

/// Type-erased handle the mutation coordinator uses to push an error signal
/// into a view and to force a reconciliation after a round-trip.
pub trait MutationTarget: Send + Sync {
    fn set_error(&self, message: String);
    fn reconcile_now(&self);
}

impl<T> MutationTarget for ResourceView<T>
where
    T: EditOverlay + Send,
{
    fn set_error(&self, message: String) {
        ResourceView::set_error(self, message);
    }

    fn reconcile_now(&self) {
        self.reconcile();
    }
}

/// Dataset elements are the one editable surface: the field is the element
/// index, the overlay value its raw byte sequence.
impl EditOverlay for DatasetSnapshot {
    type Field = usize;
    type Value = Vec<u8>;

    fn contains_field(&self, field: &usize) -> bool {
        *field < self.values.len()
    }
}

macro_rules! read_only_snapshot {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl EditOverlay for $ty {
                type Field = NoField;
                type Value = NoField;

                fn contains_field(&self, field: &NoField) -> bool {
                    match *field {}
                }
            }
        )+
    };
}

read_only_snapshot!(
    OverviewSnapshot,
    Vec<PdSummary>,
    MdSessionStatus,
    Vec<MulticastMembership>,
    Vec<EventRecord>,
    MetricsSnapshot,
    String,
    SimulationState,
    TimeSyncStatus,
    ConfigDetail,
);
