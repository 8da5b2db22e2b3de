use thiserror::Error;

use crate::client::TransportError;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Login rejected; carries the server's message verbatim for inline
    /// display on the login form.
    #[error("{0}")]
    Rejected(String),
    #[error("not authenticated")]
    NotAuthenticated,
    #[error(transparent)]
    Transport(#[from] TransportError),
}
