use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tracing::info;

use gantry_proto::{
    ConfigDetail, DatasetSnapshot, EventRecord, MdSessionStatus, MetricsSnapshot,
    MulticastMembership, OverviewSnapshot, PdSummary, SimulationState, TimeSyncStatus,
};

use crate::auth::{AuthError, SessionStore};
use crate::client::{ApiClient, TransportError};
use crate::config::Config;
use crate::mutate::{Mutation, MutationCoordinator, MutationError};
use crate::poll::{CancelHandle, FetchFn, PollScheduler};
use crate::resources::{EditOverlay, ResourceId, ResourceView};

// Observed cadences of the simulator dashboard; not synchronized on purpose.
pub const PD_CADENCE: Duration = Duration::from_secs(4);
pub const OVERVIEW_CADENCE: Duration = Duration::from_secs(5);
pub const EVENTS_CADENCE: Duration = Duration::from_secs(5);
pub const METRICS_CADENCE: Duration = Duration::from_secs(5);
pub const MD_CADENCE: Duration = Duration::from_secs(5);
pub const LOG_CADENCE: Duration = Duration::from_secs(7);

type Watched<T> = Mutex<HashMap<u32, (Arc<ResourceView<T>>, CancelHandle)>>;

/// Wires the transport, session store, scheduler, and per-resource views
/// into one operational console. Nothing polls until `start_polling`, and
/// `start_polling` refuses to run unauthenticated.
pub struct Console {
    api: Arc<ApiClient>,
    session: Arc<SessionStore>,
    scheduler: Arc<PollScheduler>,
    mutations: MutationCoordinator,
    event_window: usize,
    log_window: usize,

    pub overview: Arc<ResourceView<OverviewSnapshot>>,
    pub pd: Arc<ResourceView<Vec<PdSummary>>>,
    pub events: Arc<ResourceView<Vec<EventRecord>>>,
    pub metrics: Arc<ResourceView<MetricsSnapshot>>,
    pub log_tail: Arc<ResourceView<String>>,
    pub multicast: Arc<ResourceView<Vec<MulticastMembership>>>,
    pub sim: Arc<ResourceView<SimulationState>>,
    pub time_sync: Arc<ResourceView<TimeSyncStatus>>,
    pub config_detail: Arc<ResourceView<ConfigDetail>>,

    datasets: Watched<DatasetSnapshot>,
    md_sessions: Watched<MdSessionStatus>,
}

impl Console {
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        let api = Arc::new(ApiClient::new(config)?);
        let session = Arc::new(SessionStore::new(Arc::clone(&api)));
        let scheduler = Arc::new(PollScheduler::new());
        let mutations = MutationCoordinator::new(
            Arc::clone(&session),
            Arc::clone(&api),
            Arc::clone(&scheduler),
        );

        let overview: Arc<ResourceView<OverviewSnapshot>> =
            Arc::new(ResourceView::new(ResourceId::Overview));
        let pd: Arc<ResourceView<Vec<PdSummary>>> =
            Arc::new(ResourceView::new(ResourceId::PdStatus));
        let events: Arc<ResourceView<Vec<EventRecord>>> =
            Arc::new(ResourceView::new(ResourceId::Events));
        let metrics: Arc<ResourceView<MetricsSnapshot>> =
            Arc::new(ResourceView::new(ResourceId::Metrics));
        let log_tail: Arc<ResourceView<String>> =
            Arc::new(ResourceView::new(ResourceId::LogTail));
        let multicast: Arc<ResourceView<Vec<MulticastMembership>>> =
            Arc::new(ResourceView::new(ResourceId::Multicast));
        let sim: Arc<ResourceView<SimulationState>> =
            Arc::new(ResourceView::new(ResourceId::SimState));
        let time_sync: Arc<ResourceView<TimeSyncStatus>> =
            Arc::new(ResourceView::new(ResourceId::TimeSync));
        let config_detail: Arc<ResourceView<ConfigDetail>> =
            Arc::new(ResourceView::new(ResourceId::ConfigDetail));

        mutations.register_target(ResourceId::PdStatus, pd.clone());
        mutations.register_target(ResourceId::Multicast, multicast.clone());
        mutations.register_target(ResourceId::SimState, sim.clone());
        mutations.register_target(ResourceId::TimeSync, time_sync.clone());
        mutations.register_target(ResourceId::Events, events.clone());

        Ok(Self {
            api,
            session,
            scheduler,
            mutations,
            event_window: config.event_window,
            log_window: config.log_window,
            overview,
            pd,
            events,
            metrics,
            log_tail,
            multicast,
            sim,
            time_sync,
            config_detail,
            datasets: Mutex::new(HashMap::new()),
            md_sessions: Mutex::new(HashMap::new()),
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn scheduler(&self) -> &Arc<PollScheduler> {
        &self.scheduler
    }

    /// Registers every standing resource at its cadence. On-demand resources
    /// get a driver with no timer plus one immediate fetch, matching the
    /// load-on-mount behavior of the dashboard panels.
    pub fn start_polling(&self) -> Result<(), AuthError> {
        if !self.session.is_authenticated() {
            return Err(AuthError::NotAuthenticated);
        }

        self.scheduler.schedule(
            ResourceId::Overview,
            Some(OVERVIEW_CADENCE),
            json_fetch(&self.api, &self.overview, "/api/ui/overview".to_string()),
        );
        self.scheduler.schedule(
            ResourceId::PdStatus,
            Some(PD_CADENCE),
            json_fetch(&self.api, &self.pd, "/api/pd/status".to_string()),
        );
        self.scheduler.schedule(
            ResourceId::Events,
            Some(EVENTS_CADENCE),
            json_fetch(
                &self.api,
                &self.events,
                format!("/api/diag/events?max={}", self.event_window),
            ),
        );
        self.scheduler.schedule(
            ResourceId::Metrics,
            Some(METRICS_CADENCE),
            json_fetch(&self.api, &self.metrics, "/api/diag/metrics".to_string()),
        );
        self.scheduler.schedule(
            ResourceId::LogTail,
            Some(LOG_CADENCE),
            text_fetch(
                &self.api,
                &self.log_tail,
                format!("/api/diag/log/export?max={}", self.log_window),
            ),
        );

        for (id, fetch) in [
            (
                ResourceId::Multicast,
                json_fetch(
                    &self.api,
                    &self.multicast,
                    "/api/network/multicast".to_string(),
                ),
            ),
            (
                ResourceId::SimState,
                json_fetch(&self.api, &self.sim, "/api/sim/state".to_string()),
            ),
            (
                ResourceId::TimeSync,
                json_fetch(&self.api, &self.time_sync, "/api/time/sync".to_string()),
            ),
            (
                ResourceId::ConfigDetail,
                json_fetch(
                    &self.api,
                    &self.config_detail,
                    "/api/config/detail".to_string(),
                ),
            ),
        ] {
            self.scheduler.schedule(id, None, fetch);
            self.scheduler.refresh_now(id);
        }

        info!("resource polling started");
        Ok(())
    }

    pub fn stop_polling(&self) {
        self.scheduler.shutdown();
        self.datasets.lock().clear();
        self.md_sessions.lock().clear();
    }

    pub fn refresh(&self, id: ResourceId) -> bool {
        self.scheduler.refresh_now(id)
    }

    /// On-demand dataset view; created lazily with one immediate fetch.
    pub fn watch_dataset(
        &self,
        data_set_id: u32,
    ) -> Result<Arc<ResourceView<DatasetSnapshot>>, AuthError> {
        if !self.session.is_authenticated() {
            return Err(AuthError::NotAuthenticated);
        }
        let id = ResourceId::Dataset(data_set_id);
        let view = {
            let mut watched = self.datasets.lock();
            if let Some((view, _)) = watched.get(&data_set_id) {
                Arc::clone(view)
            } else {
                let view = Arc::new(ResourceView::new(id));
                let handle = self.scheduler.schedule(
                    id,
                    None,
                    json_fetch(&self.api, &view, format!("/api/datasets/{data_set_id}")),
                );
                self.mutations.register_target(id, view.clone());
                watched.insert(data_set_id, (Arc::clone(&view), handle));
                view
            }
        };
        self.scheduler.refresh_now(id);
        Ok(view)
    }

    pub fn unwatch_dataset(&self, data_set_id: u32) {
        if let Some((_, handle)) = self.datasets.lock().remove(&data_set_id) {
            self.scheduler.cancel(handle);
            self.mutations.unregister_target(ResourceId::Dataset(data_set_id));
        }
    }

    /// MD session view, polled at the dashboard's 5 s cadence.
    pub fn watch_md_session(
        &self,
        session_id: u32,
    ) -> Result<Arc<ResourceView<MdSessionStatus>>, AuthError> {
        if !self.session.is_authenticated() {
            return Err(AuthError::NotAuthenticated);
        }
        let id = ResourceId::MdSession(session_id);
        let view = {
            let mut watched = self.md_sessions.lock();
            if let Some((view, _)) = watched.get(&session_id) {
                Arc::clone(view)
            } else {
                let view = Arc::new(ResourceView::new(id));
                let handle = self.scheduler.schedule(
                    id,
                    Some(MD_CADENCE),
                    json_fetch(&self.api, &view, format!("/api/md/session/{session_id}")),
                );
                self.mutations.register_target(id, view.clone());
                watched.insert(session_id, (Arc::clone(&view), handle));
                view
            }
        };
        Ok(view)
    }

    pub fn unwatch_md_session(&self, session_id: u32) {
        if let Some((_, handle)) = self.md_sessions.lock().remove(&session_id) {
            self.scheduler.cancel(handle);
            self.mutations
                .unregister_target(ResourceId::MdSession(session_id));
        }
    }

    pub async fn perform(&self, mutation: Mutation) -> Result<serde_json::Value, MutationError> {
        self.mutations.perform(mutation).await
    }

    /// Clears the session and tears down every poll loop.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.stop_polling();
        self.session.logout().await
    }
}

/// Fetch closure for a JSON resource. Holds only a weak reference to the
/// view: a fetch that outlives its panel completes, then drops its result.
fn json_fetch<T>(api: &Arc<ApiClient>, view: &Arc<ResourceView<T>>, path: String) -> FetchFn
where
    T: EditOverlay + DeserializeOwned + Send + 'static,
{
    let api = Arc::clone(api);
    let view = Arc::downgrade(view);
    Arc::new(move || {
        let api = Arc::clone(&api);
        let view = Weak::clone(&view);
        let path = path.clone();
        let fetch: BoxFuture<'static, ()> = Box::pin(async move {
            let Some(seq) = view.upgrade().map(|v| v.begin_fetch()) else {
                return;
            };
            let result = api.get::<T>(&path).await;
            let Some(view) = view.upgrade() else {
                return;
            };
            match result {
                Ok(value) => {
                    view.apply_ok(seq, value);
                }
                Err(err) => {
                    view.apply_err(seq, err.to_string());
                }
            }
        });
        fetch
    })
}

/// Fetch closure for the plain-text log tail.
fn text_fetch(
    api: &Arc<ApiClient>,
    view: &Arc<ResourceView<String>>,
    path: String,
) -> FetchFn {
    let api = Arc::clone(api);
    let view = Arc::downgrade(view);
    Arc::new(move || {
        let api = Arc::clone(&api);
        let view = Weak::clone(&view);
        let path = path.clone();
        let fetch: BoxFuture<'static, ()> = Box::pin(async move {
            let Some(seq) = view.upgrade().map(|v| v.begin_fetch()) else {
                return;
            };
            let result = api.get_text(&path).await;
            let Some(view) = view.upgrade() else {
                return;
            };
            match result {
                Ok(text) => {
                    view.apply_ok(seq, text);
                }
                Err(err) => {
                    view.apply_err(seq, err.to_string());
                }
            }
        });
        fetch
    })
}
