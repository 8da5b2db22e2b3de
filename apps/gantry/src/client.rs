use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::config::Config;

/// Uniform transport failure. Non-2xx responses carry the server's `error`
/// string verbatim; the client never substitutes its own wording for it.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{message}")]
    Server { status: StatusCode, message: String },
    #[error("config error: {0}")]
    Config(String),
}

impl TransportError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TransportError::Server { status, .. } => Some(*status),
            TransportError::Http(err) => err.status(),
            TransportError::Config(_) => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Authenticated JSON client for the simulator API. The session credential is
/// a cookie, so one client (and its jar) is shared by every component.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Arc<Url>,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        // Conservative timeouts and no proxy so a dead local simulator fails
        // fast instead of hanging every panel.
        let http = Client::builder()
            .cookie_store(true)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .no_proxy()
            .build()?;
        Ok(Self {
            http,
            base: Arc::new(config.base_url.clone()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, TransportError> {
        self.base
            .join(path)
            .map_err(|err| TransportError::Config(format!("invalid api path '{path}': {err}")))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        let response = self.http.get(self.url(path)?).send().await?;
        decode_json(response).await
    }

    pub async fn get_text(&self, path: &str) -> Result<String, TransportError> {
        let response = self.http.get(self.url(path)?).send().await?;
        if !response.status().is_success() {
            return Err(error_signal(response).await);
        }
        Ok(response.text().await?)
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self.http.post(self.url(path)?).json(body).send().await?;
        decode_json(response).await
    }

    /// POST whose response the caller only relays (mutation echoes).
    pub async fn post_value<B>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<serde_json::Value, TransportError>
    where
        B: Serialize + ?Sized,
    {
        self.post(path, body).await
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    if !response.status().is_success() {
        return Err(error_signal(response).await);
    }
    Ok(response.json().await?)
}

async fn error_signal(response: Response) -> TransportError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.error)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    TransportError::Server { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_displays_message_verbatim() {
        let err = TransportError::Server {
            status: StatusCode::BAD_REQUEST,
            message: "raw payload length mismatch".to_string(),
        };
        assert_eq!(err.to_string(), "raw payload length mismatch");
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn unauthorized_is_detected() {
        let err = TransportError::Server {
            status: StatusCode::UNAUTHORIZED,
            message: "invalid credentials".to_string(),
        };
        assert!(err.is_unauthorized());
    }
}
