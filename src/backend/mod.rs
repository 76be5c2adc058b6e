pub mod http;

use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use crate::models::chat::{ OutgoingMessage, ReplyMessage };
use self::http::HttpBackend;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")] Transport(String),
    #[error("backend returned {status}: {body}")] Status {
        status: StatusCode,
        body: String,
    },
    #[error("malformed response: {0}")] Malformed(String),
    #[error("no response within {0:?}")] Timeout(Duration),
}

/// The remote collaborator that answers a single user message.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send(&self, message: &OutgoingMessage) -> Result<ReplyMessage, BackendError>;

    fn endpoint(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub endpoint: url::Url,
    pub request_timeout: Duration,
}

pub fn new_backend(config: &BackendConfig) -> Result<Arc<dyn ChatBackend>, BackendError> {
    let client = HttpBackend::from_config(config)?;
    Ok(Arc::new(client))
}
