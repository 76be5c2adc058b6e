use async_trait::async_trait;
use log::{ debug, error };
use reqwest::Client as HttpClient;
use reqwest::header::{ ACCEPT, CONTENT_TYPE };
use super::{ BackendConfig, BackendError, ChatBackend };
use crate::models::chat::{ OutgoingMessage, ReplyMessage };

#[derive(Debug)]
pub struct HttpBackend {
    http: HttpClient,
    endpoint: url::Url,
}

impl HttpBackend {
    pub fn new(endpoint: url::Url) -> Self {
        Self {
            http: HttpClient::new(),
            endpoint,
        }
    }

    /// The exchange deadline is enforced by the conversation store, the
    /// client-level timeout here only bounds connection setup.
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let http = HttpClient::builder()
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn send(&self, message: &OutgoingMessage) -> Result<ReplyMessage, BackendError> {
        debug!("POST {} (message {})", self.endpoint, message.id);
        let resp = self.http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(message)
            .send().await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!("API request failed: {} {}", status, body);
            return Err(BackendError::Status { status, body });
        }

        let body_text = resp.text().await.map_err(|e| BackendError::Transport(e.to_string()))?;
        let reply: ReplyMessage = serde_json
            ::from_str(&body_text)
            .map_err(|e| BackendError::Malformed(format!("{}: {}", e, body_text)))?;
        debug!("Response from server: {:?}", reply);
        Ok(reply)
    }

    fn endpoint(&self) -> String {
        self.endpoint.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Role;
    use axum::{ http::StatusCode, routing::post, Json, Router };
    use serde_json::{ json, Value };
    use tokio::net::TcpListener;

    async fn spawn_stub(app: Router) -> url::Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        url::Url::parse(&format!("http://{}/", addr)).unwrap()
    }

    fn outgoing(content: &str) -> OutgoingMessage {
        OutgoingMessage {
            id: "u1".to_string(),
            role: Role::User,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn posts_json_and_parses_reply() {
        let app = Router::new().route(
            "/",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["role"], "user");
                assert_eq!(body["id"], "u1");
                Json(
                    json!({
                        "id": "a1",
                        "role": "assistant",
                        "content": format!("echo: {}", body["content"].as_str().unwrap_or("")),
                        "created_at": "2024-11-30-12:00:00",
                    })
                )
            })
        );
        let backend = HttpBackend::new(spawn_stub(app).await);

        let reply = backend.send(&outgoing("hello")).await.unwrap();
        assert_eq!(reply.id, "a1");
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.content, "echo: hello");
        assert_eq!(reply.created_at.as_deref(), Some("2024-11-30-12:00:00"));
    }

    #[tokio::test]
    async fn non_success_status_carries_body_text() {
        let app = Router::new().route(
            "/",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") })
        );
        let backend = HttpBackend::new(spawn_stub(app).await);

        match backend.send(&outgoing("hello")).await {
            Err(BackendError::Status { status, body }) => {
                assert_eq!(status.as_u16(), 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_fields_are_malformed() {
        let app = Router::new().route(
            "/",
            post(|| async { Json(json!({ "role": "assistant" })) })
        );
        let backend = HttpBackend::new(spawn_stub(app).await);

        let err = backend.send(&outgoing("hello")).await.unwrap_err();
        assert!(matches!(err, BackendError::Malformed(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let backend = HttpBackend::new(url::Url::parse(&format!("http://{}/", addr)).unwrap());

        let err = backend.send(&outgoing("hello")).await.unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)), "got {:?}", err);
    }
}
