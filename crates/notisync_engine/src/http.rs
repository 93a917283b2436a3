//! HTTP implementation of the notification API.
//!
//! The HTTP client is abstracted behind [`HttpClient`] so the endpoint
//! mapping and status handling can be exercised without a network. The
//! production client is [`ReqwestClient`].

use crate::api::NotificationApi;
use crate::config::EngineConfig;
use crate::credentials::CredentialSource;
use crate::error::{NotifyError, NotifyResult};
use async_trait::async_trait;
use notisync_protocol::{NotificationId, NotificationRecord, ProtocolError, UnreadCountResponse};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// HTTP method used by the notification endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
}

/// An authenticated request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Absolute endpoint URL.
    pub url: Url,
    /// Bearer token for the `Authorization` header.
    pub bearer: String,
}

/// A raw response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

/// HTTP client abstraction.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends `request`. Only failures to obtain a response are errors.
    async fn execute(&self, request: HttpRequest) -> NotifyResult<HttpResponse>;
}

/// [`HttpClient`] backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a client with a per-request timeout.
    pub fn new(timeout: Duration) -> NotifyResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(&self, request: HttpRequest) -> NotifyResult<HttpResponse> {
        let builder = match request.method {
            Method::Get => self.client.get(request.url),
            Method::Post => self.client.post(request.url),
        };
        let response = builder.bearer_auth(request.bearer).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(HttpResponse { status, body })
    }
}

/// The notification REST endpoints.
pub struct RestApi<C: HttpClient = ReqwestClient> {
    api_base: Url,
    client: C,
    credentials: Arc<dyn CredentialSource>,
}

impl RestApi<ReqwestClient> {
    /// Creates an API client from the engine configuration.
    pub fn from_config(
        config: &EngineConfig,
        credentials: Arc<dyn CredentialSource>,
    ) -> NotifyResult<Self> {
        let client = ReqwestClient::new(config.request_timeout)?;
        Ok(Self::new(config.api_base.clone(), client, credentials))
    }
}

impl<C: HttpClient> RestApi<C> {
    /// Creates an API client rooted at `api_base`.
    pub fn new(api_base: Url, client: C, credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            api_base,
            client,
            credentials,
        }
    }

    /// Returns the API base URL.
    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    async fn call(&self, method: Method, path: &str) -> NotifyResult<Vec<u8>> {
        let bearer = self
            .credentials
            .bearer_token()
            .ok_or(NotifyError::MissingCredential)?;
        let url = self.api_base.join(path)?;
        debug!(?method, %url, "api request");

        let result = self
            .client
            .execute(HttpRequest {
                method,
                url,
                bearer,
            })
            .await
            .and_then(|response| match response.status {
                200..=299 => Ok(response.body),
                401 | 403 => Err(NotifyError::AuthenticationFailed(format!(
                    "{path} returned {}",
                    response.status
                ))),
                status => Err(NotifyError::ServerError {
                    status,
                    message: String::from_utf8_lossy(&response.body).into_owned(),
                }),
            });

        result.inspect_err(|err| {
            if err.is_auth_failure() {
                warn!(error = %err, path, "api rejected credential");
                self.credentials.on_rejected();
            }
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> NotifyResult<T> {
        let body = self.call(Method::Get, path).await?;
        serde_json::from_slice(&body).map_err(|e| NotifyError::Protocol(ProtocolError::from(e)))
    }

    async fn post(&self, path: &str) -> NotifyResult<()> {
        self.call(Method::Post, path).await.map(|_| ())
    }
}

#[async_trait]
impl<C: HttpClient> NotificationApi for RestApi<C> {
    async fn list_all(&self) -> NotifyResult<Vec<NotificationRecord>> {
        self.get_json("notifications/").await
    }

    async fn list_recent(&self) -> NotifyResult<Vec<NotificationRecord>> {
        self.get_json("notifications/recent/").await
    }

    async fn unread_count(&self) -> NotifyResult<u32> {
        let response: UnreadCountResponse = self.get_json("notifications/unread_count/").await?;
        Ok(response.unread_count)
    }

    async fn mark_read(&self, id: NotificationId) -> NotifyResult<()> {
        self.post(&format!("notifications/{id}/mark_as_read/")).await
    }

    async fn mark_all_read(&self) -> NotifyResult<()> {
        self.post("notifications/mark_all_as_read/").await
    }
}

impl<C: HttpClient> std::fmt::Debug for RestApi<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestApi")
            .field("api_base", &self.api_base.as_str())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::SharedToken;
    use parking_lot::Mutex;

    /// Answers every request with a fixed response and records it.
    struct TestClient {
        status: u16,
        body: &'static str,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl TestClient {
        fn new(status: u16, body: &'static str) -> Self {
            Self {
                status,
                body,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HttpClient for TestClient {
        async fn execute(&self, request: HttpRequest) -> NotifyResult<HttpResponse> {
            self.requests.lock().push(request);
            Ok(HttpResponse {
                status: self.status,
                body: self.body.as_bytes().to_vec(),
            })
        }
    }

    fn api(client: TestClient, token: &Arc<SharedToken>) -> RestApi<TestClient> {
        let base = Url::parse("http://localhost:8000/api/").unwrap();
        RestApi::new(base, client, Arc::clone(token) as Arc<dyn CredentialSource>)
    }

    #[tokio::test]
    async fn lists_notifications() {
        let token = Arc::new(SharedToken::new("abc"));
        let body = r#"[{"id":3,"notification_type":"document_processed","title":"Done",
            "message":"Scan finished","is_read":false,"created_at":"2024-03-01T08:15:00Z",
            "document_id":12,"document_title":"Deed","time_since":"2 minutes"}]"#;
        let api = api(TestClient::new(200, body), &token);

        let records = api.list_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, NotificationId(3));
        assert_eq!(records[0].document_title.as_deref(), Some("Deed"));

        let request = api.client.requests.lock()[0].clone();
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.url.as_str(), "http://localhost:8000/api/notifications/");
        assert_eq!(request.bearer, "abc");
    }

    #[tokio::test]
    async fn reads_unread_count() {
        let token = Arc::new(SharedToken::new("abc"));
        let api = api(TestClient::new(200, r#"{"unread_count":4}"#), &token);
        assert_eq!(api.unread_count().await.unwrap(), 4);
        assert_eq!(
            api.client.requests.lock()[0].url.path(),
            "/api/notifications/unread_count/"
        );
    }

    #[tokio::test]
    async fn mark_endpoints_post() {
        let token = Arc::new(SharedToken::new("abc"));
        let api = api(TestClient::new(200, r#"{"status":"ok"}"#), &token);

        api.mark_read(NotificationId(17)).await.unwrap();
        api.mark_all_read().await.unwrap();

        let requests = api.client.requests.lock().clone();
        assert!(requests.iter().all(|r| r.method == Method::Post));
        assert_eq!(requests[0].url.path(), "/api/notifications/17/mark_as_read/");
        assert_eq!(requests[1].url.path(), "/api/notifications/mark_all_as_read/");
    }

    #[tokio::test]
    async fn rejected_credential_is_reported() {
        let token = Arc::new(SharedToken::new("stale"));
        let api = api(TestClient::new(401, r#"{"detail":"expired"}"#), &token);

        let err = api.unread_count().await.unwrap_err();
        assert!(matches!(err, NotifyError::AuthenticationFailed(_)));
        assert_eq!(token.rejection_count(), 1);
    }

    #[tokio::test]
    async fn server_errors_and_bad_bodies() {
        let token = Arc::new(SharedToken::new("abc"));

        let api_500 = api(TestClient::new(500, "boom"), &token);
        let err = api_500.list_recent().await.unwrap_err();
        assert!(matches!(err, NotifyError::ServerError { status: 500, .. }));
        assert!(err.is_retryable());

        let api_garbage = api(TestClient::new(200, "<html>"), &token);
        assert!(matches!(
            api_garbage.list_recent().await,
            Err(NotifyError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn missing_credential_skips_request() {
        let token = Arc::new(SharedToken::empty());
        let api = api(TestClient::new(200, "[]"), &token);

        assert!(matches!(
            api.list_all().await,
            Err(NotifyError::MissingCredential)
        ));
        assert!(api.client.requests.lock().is_empty());
    }
}
