pub mod capability;
pub mod error;

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use gantry_proto::{Identity, LoginRequest, Role, ThemeUpdate};

use crate::client::ApiClient;

pub use capability::{Action, CapabilitySet};
pub use error::AuthError;

#[derive(Debug, Default)]
struct SessionState {
    identity: Option<Identity>,
    capabilities: CapabilitySet,
}

/// Process-wide session and capability store. The only shared mutable state
/// in the client; every consumer holds a reference to the same store and no
/// resource is read or mutated while it is unauthenticated.
#[derive(Debug)]
pub struct SessionStore {
    api: Arc<ApiClient>,
    state: RwLock<SessionState>,
}

impl SessionStore {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            state: RwLock::new(SessionState {
                identity: None,
                capabilities: CapabilitySet::for_role(None),
            }),
        }
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.state.read().identity.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().identity.is_some()
    }

    /// Single startup probe for an existing cookie session. A server
    /// rejection leaves the store unauthenticated and is not an error; only
    /// a transport-level failure is reported.
    pub async fn probe(&self) -> Result<Option<Identity>, AuthError> {
        match self.api.get::<Identity>("/api/auth/session").await {
            Ok(identity) => {
                info!(username = %identity.username, role = %identity.role, "resumed session");
                self.replace_identity(Some(identity.clone()));
                Ok(Some(identity))
            }
            Err(err) if err.is_unauthorized() => {
                debug!("no existing session");
                self.replace_identity(None);
                Ok(None)
            }
            Err(err) => {
                warn!(error = %err, "session probe failed");
                self.replace_identity(None);
                Err(err.into())
            }
        }
    }

    /// Atomic: identity and capability table change together, and only on a
    /// fully successful login. Rejection messages pass through verbatim.
    pub async fn login(&self, username: &str, password: &str) -> Result<Identity, AuthError> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        match self.api.post::<Identity, _>("/api/auth/login", &request).await {
            Ok(identity) => {
                info!(username = %identity.username, role = %identity.role, "login succeeded");
                self.replace_identity(Some(identity.clone()));
                Ok(identity)
            }
            Err(err) => {
                if let Some(status) = err.status() {
                    if status.is_client_error() {
                        return Err(AuthError::Rejected(err.to_string()));
                    }
                }
                Err(err.into())
            }
        }
    }

    /// Clears the local identity even when the server call fails; a dead
    /// session must not keep gating decisions alive client-side.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let result = self
            .api
            .post::<serde_json::Value, _>("/api/auth/logout", &serde_json::json!({}))
            .await;
        self.replace_identity(None);
        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                warn!(error = %err, "logout request failed; local session cleared anyway");
                Err(err.into())
            }
        }
    }

    /// Theme is the one mutable identity field; the local copy adopts the
    /// server-confirmed value, not the requested one.
    pub async fn update_theme(&self, theme: &str) -> Result<String, AuthError> {
        if !self.is_authenticated() {
            return Err(AuthError::NotAuthenticated);
        }
        let confirmed: ThemeUpdate = self
            .api
            .post("/api/ui/theme", &serde_json::json!({ "theme": theme }))
            .await?;
        let mut state = self.state.write();
        if let Some(identity) = state.identity.as_mut() {
            identity.theme = confirmed.theme.clone();
        }
        Ok(confirmed.theme)
    }

    /// Viewer is satisfied by any authenticated identity, Developer by
    /// Developer or Admin, Admin only by Admin.
    pub fn has_capability(&self, required: Role) -> bool {
        self.state
            .read()
            .identity
            .as_ref()
            .map(|identity| identity.role.satisfies(required))
            .unwrap_or(false)
    }

    /// One predicate call against the precomputed capability table.
    pub fn allows(&self, action: Action) -> bool {
        self.state.read().capabilities.allows(action)
    }

    fn replace_identity(&self, identity: Option<Identity>) {
        let mut state = self.state.write();
        state.capabilities = CapabilitySet::for_role(identity.as_ref().map(|i| i.role));
        state.identity = identity;
    }

    #[cfg(test)]
    pub(crate) fn force_identity(&self, identity: Option<Identity>) {
        self.replace_identity(identity);
    }
}
