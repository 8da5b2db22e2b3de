use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use gantry_proto::{RedundancySettings, Role, Severity, StressSettings, TimeSyncOffsets};

use crate::auth::{Action, SessionStore};
use crate::client::{ApiClient, TransportError};
use crate::poll::PollScheduler;
use crate::resources::{MutationTarget, ResourceId};

/// One user intent, with its payload. Each maps to a guarded action, an
/// endpoint, a body, and the set of resources it is documented to affect.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    TogglePd {
        com_id: u32,
        enabled: bool,
    },
    SetDatasetElement {
        data_set_id: u32,
        element: usize,
        raw: Vec<u8>,
    },
    ClearDatasetElement {
        data_set_id: u32,
        element: usize,
    },
    ClearDataset {
        data_set_id: u32,
    },
    LockDataset {
        data_set_id: u32,
        locked: bool,
    },
    JoinMulticast {
        interface: String,
        group: String,
        nic: Option<String>,
    },
    LeaveMulticast {
        interface: String,
        group: String,
    },
    SendMdRequest {
        com_id: u32,
    },
    ApplyStress(StressSettings),
    ApplyRedundancy(RedundancySettings),
    ApplyTimeOffsets(TimeSyncOffsets),
    RegisterInstance {
        name: String,
        path: String,
    },
    ActivateInstance {
        name: String,
    },
    RaiseDiagnosticEvent {
        severity: Severity,
        component: String,
        message: String,
    },
}

impl Mutation {
    pub fn action(&self) -> Action {
        match self {
            Mutation::TogglePd { .. } => Action::TogglePdTelegram,
            Mutation::SetDatasetElement { .. }
            | Mutation::ClearDatasetElement { .. }
            | Mutation::ClearDataset { .. } => Action::EditDataset,
            Mutation::LockDataset { .. } => Action::LockDataset,
            Mutation::JoinMulticast { .. } => Action::JoinMulticast,
            Mutation::LeaveMulticast { .. } => Action::LeaveMulticast,
            Mutation::SendMdRequest { .. } => Action::SendMdRequest,
            Mutation::ApplyStress(_) => Action::AdjustStress,
            Mutation::ApplyRedundancy(_) => Action::AdjustRedundancy,
            Mutation::ApplyTimeOffsets(_) => Action::AdjustTimeOffsets,
            Mutation::RegisterInstance { .. } => Action::RegisterInstance,
            Mutation::ActivateInstance { .. } => Action::ActivateInstance,
            Mutation::RaiseDiagnosticEvent { .. } => Action::RaiseDiagnosticEvent,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Mutation::TogglePd { com_id, .. } => format!("/api/pd/{com_id}/enable"),
            Mutation::SetDatasetElement {
                data_set_id,
                element,
                ..
            }
            | Mutation::ClearDatasetElement {
                data_set_id,
                element,
            } => format!("/api/datasets/{data_set_id}/elements/{element}"),
            Mutation::ClearDataset { data_set_id } => {
                format!("/api/datasets/{data_set_id}/clear_all")
            }
            Mutation::LockDataset { data_set_id, .. } => {
                format!("/api/datasets/{data_set_id}/lock")
            }
            Mutation::JoinMulticast { .. } => "/api/network/multicast/join".to_string(),
            Mutation::LeaveMulticast { .. } => "/api/network/multicast/leave".to_string(),
            Mutation::SendMdRequest { com_id } => format!("/api/md/{com_id}/request"),
            Mutation::ApplyStress(_) => "/api/sim/stress".to_string(),
            Mutation::ApplyRedundancy(_) => "/api/sim/redundancy".to_string(),
            Mutation::ApplyTimeOffsets(_) => "/api/sim/time".to_string(),
            Mutation::RegisterInstance { .. } => "/api/sim/instances/register".to_string(),
            Mutation::ActivateInstance { .. } => "/api/sim/instances/activate".to_string(),
            Mutation::RaiseDiagnosticEvent { .. } => "/api/diag/event".to_string(),
        }
    }

    pub fn body(&self) -> serde_json::Value {
        match self {
            Mutation::TogglePd { enabled, .. } => json!({ "enabled": enabled }),
            Mutation::SetDatasetElement { raw, .. } => json!({ "raw": raw }),
            Mutation::ClearDatasetElement { .. } => json!({ "clear": true }),
            Mutation::ClearDataset { .. } => json!({}),
            Mutation::LockDataset { locked, .. } => json!({ "locked": locked }),
            Mutation::JoinMulticast {
                interface,
                group,
                nic,
            } => {
                let mut body = json!({ "interface": interface, "group": group });
                if let Some(nic) = nic {
                    body["nic"] = json!(nic);
                }
                body
            }
            Mutation::LeaveMulticast { interface, group } => {
                json!({ "interface": interface, "group": group })
            }
            Mutation::SendMdRequest { .. } => json!({}),
            Mutation::ApplyStress(settings) => {
                serde_json::to_value(settings).expect("stress settings serialize")
            }
            Mutation::ApplyRedundancy(settings) => {
                serde_json::to_value(settings).expect("redundancy settings serialize")
            }
            Mutation::ApplyTimeOffsets(offsets) => {
                serde_json::to_value(offsets).expect("time offsets serialize")
            }
            Mutation::RegisterInstance { name, path } => {
                json!({ "name": name, "path": path })
            }
            Mutation::ActivateInstance { name } => json!({ "name": name }),
            Mutation::RaiseDiagnosticEvent {
                severity,
                component,
                message,
            } => json!({
                "severity": severity.to_string(),
                "component": component,
                "message": message,
            }),
        }
    }

    /// The resources this mutation is documented to affect; only these are
    /// re-fetched after a successful round-trip.
    pub fn affected(&self) -> Vec<ResourceId> {
        match self {
            Mutation::TogglePd { .. } => vec![ResourceId::PdStatus],
            Mutation::SetDatasetElement { data_set_id, .. }
            | Mutation::ClearDatasetElement { data_set_id, .. }
            | Mutation::ClearDataset { data_set_id }
            | Mutation::LockDataset { data_set_id, .. } => {
                vec![ResourceId::Dataset(*data_set_id)]
            }
            Mutation::JoinMulticast { .. } | Mutation::LeaveMulticast { .. } => {
                vec![ResourceId::Multicast]
            }
            // The response already carries the created session's status; the
            // caller decides which session to start watching.
            Mutation::SendMdRequest { .. } => vec![],
            Mutation::ApplyStress(_)
            | Mutation::ApplyRedundancy(_)
            | Mutation::RegisterInstance { .. }
            | Mutation::ActivateInstance { .. } => vec![ResourceId::SimState],
            Mutation::ApplyTimeOffsets(_) => {
                vec![ResourceId::SimState, ResourceId::TimeSync]
            }
            Mutation::RaiseDiagnosticEvent { .. } => vec![ResourceId::Events],
        }
    }
}

#[derive(Debug, Error)]
pub enum MutationError {
    /// Local, synchronous rejection; the request never reaches the network.
    #[error("action '{action}' requires the {required} role")]
    Forbidden { action: Action, required: Role },
    #[error(transparent)]
    Failed(#[from] TransportError),
}

/// Applies user mutations: capability check first, then the write, then a
/// targeted re-sync of exactly the affected resources.
pub struct MutationCoordinator {
    session: Arc<SessionStore>,
    api: Arc<ApiClient>,
    scheduler: Arc<PollScheduler>,
    targets: Mutex<HashMap<ResourceId, Arc<dyn MutationTarget>>>,
}

impl MutationCoordinator {
    pub fn new(
        session: Arc<SessionStore>,
        api: Arc<ApiClient>,
        scheduler: Arc<PollScheduler>,
    ) -> Self {
        Self {
            session,
            api,
            scheduler,
            targets: Mutex::new(HashMap::new()),
        }
    }

    pub fn register_target(&self, id: ResourceId, target: Arc<dyn MutationTarget>) {
        self.targets.lock().insert(id, target);
    }

    pub fn unregister_target(&self, id: ResourceId) {
        self.targets.lock().remove(&id);
    }

    /// Returns the server's response body so callers can use mutation echoes
    /// (e.g. the session status returned by an MD request).
    pub async fn perform(&self, mutation: Mutation) -> Result<serde_json::Value, MutationError> {
        let action = mutation.action();
        if !self.session.allows(action) {
            return Err(MutationError::Forbidden {
                action,
                required: action.required_role(),
            });
        }

        let path = mutation.path();
        match self.api.post_value(&path, &mutation.body()).await {
            Ok(response) => {
                info!(%action, %path, "mutation applied");
                for id in mutation.affected() {
                    if let Some(target) = self.target(id) {
                        target.reconcile_now();
                    }
                    self.scheduler.refresh_now(id);
                }
                Ok(response)
            }
            Err(err) => {
                // No optimistic state is committed; the views keep showing
                // the pre-mutation snapshot with the error signal set.
                warn!(%action, %path, error = %err, "mutation failed");
                let message = err.to_string();
                for id in mutation.affected() {
                    if let Some(target) = self.target(id) {
                        target.set_error(message.clone());
                        target.reconcile_now();
                    }
                }
                Err(err.into())
            }
        }
    }

    fn target(&self, id: ResourceId) -> Option<Arc<dyn MutationTarget>> {
        self.targets.lock().get(&id).cloned()
    }
}
