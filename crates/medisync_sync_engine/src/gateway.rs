//! Remote gateway: the REST endpoints of one entity type.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use async_trait::async_trait;
use medisync_model::{RecordKey, SyncRecord, SyncStatus};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;

/// Remote CRUD operations for one entity type.
///
/// Each call yields the decoded payload or a classified [`SyncError`]
/// (transient, rejected, or not found). Records returned by the gateway
/// carry status `SYNCED`.
#[async_trait]
pub trait RemoteGateway<R: SyncRecord>: Send + Sync {
    /// Lists the whole remote collection.
    async fn list(&self) -> SyncResult<Vec<R>>;

    /// Lists the records belonging to one patient.
    async fn list_by_parent(&self, parent: RecordKey) -> SyncResult<Vec<R>>;

    /// Fetches one record; `None` if the remote answers 404.
    async fn get(&self, key: RecordKey) -> SyncResult<Option<R>>;

    /// Creates a record and returns the remote representation with the
    /// remote-assigned key.
    async fn create(&self, record: &R) -> SyncResult<R>;

    /// Replaces the record stored under `key`.
    async fn update(&self, key: RecordKey, record: &R) -> SyncResult<R>;

    /// Deletes the record stored under `key`.
    async fn delete(&self, key: RecordKey) -> SyncResult<()>;
}

/// [`RemoteGateway`] speaking JSON to a conventional REST resource.
///
/// | Operation        | Request                           |
/// |------------------|-----------------------------------|
/// | `list`           | `GET {path}`                      |
/// | `list_by_parent` | `GET {path}?patientId={parent}`   |
/// | `get`            | `GET {path}/{id}`                 |
/// | `create`         | `POST {path}` (body without `id`) |
/// | `update`         | `PUT {path}/{id}`                 |
/// | `delete`         | `DELETE {path}/{id}`              |
///
/// `path` is the entity kind's resource path under the configured base URL.
pub struct RestGateway<R, C: HttpClient> {
    root: String,
    bearer_token: Option<String>,
    client: Arc<C>,
    _record: PhantomData<fn() -> R>,
}

impl<R: SyncRecord, C: HttpClient> RestGateway<R, C> {
    /// Creates a gateway for `R` using the base URL and token in `config`.
    pub fn new(config: &SyncConfig, client: Arc<C>) -> Self {
        Self {
            root: format!("{}{}", config.api_root(), R::KIND.resource_path()),
            bearer_token: config.auth_token.clone(),
            client,
            _record: PhantomData,
        }
    }

    /// Returns the collection URL.
    pub fn collection_url(&self) -> &str {
        &self.root
    }

    fn item_url(&self, key: RecordKey) -> String {
        format!("{}/{}", self.root, key)
    }

    async fn call(
        &self,
        method: HttpMethod,
        url: String,
        body: Option<Vec<u8>>,
        key: Option<RecordKey>,
    ) -> SyncResult<HttpResponse> {
        let mut request =
            HttpRequest::new(method, url).with_bearer_token(self.bearer_token.clone());
        if let Some(body) = body {
            request = request.with_body(body);
        }

        let response = self.client.send(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(SyncError::from_status(response.status, response.text(), key))
        }
    }

    fn encode(record: &R, include_key: bool) -> SyncResult<Vec<u8>> {
        let mut value = serde_json::to_value(record)
            .map_err(|e| SyncError::Protocol(format!("failed to encode {}: {}", R::KIND, e)))?;
        if !include_key {
            if let Some(object) = value.as_object_mut() {
                object.remove("id");
            }
        }
        serde_json::to_vec(&value).map_err(|e| SyncError::Protocol(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(response: &HttpResponse) -> SyncResult<T> {
        serde_json::from_slice(&response.body)
            .map_err(|e| SyncError::Protocol(format!("failed to decode {}: {}", R::KIND, e)))
    }
}

#[async_trait]
impl<R: SyncRecord, C: HttpClient> RemoteGateway<R> for RestGateway<R, C> {
    async fn list(&self) -> SyncResult<Vec<R>> {
        let response = self
            .call(HttpMethod::Get, self.root.clone(), None, None)
            .await?;
        Self::decode(&response)
    }

    async fn list_by_parent(&self, parent: RecordKey) -> SyncResult<Vec<R>> {
        let url = format!("{}?patientId={}", self.root, parent);
        let response = self.call(HttpMethod::Get, url, None, None).await?;
        Self::decode(&response)
    }

    async fn get(&self, key: RecordKey) -> SyncResult<Option<R>> {
        match self
            .call(HttpMethod::Get, self.item_url(key), None, Some(key))
            .await
        {
            Ok(response) => Self::decode(&response).map(Some),
            Err(SyncError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create(&self, record: &R) -> SyncResult<R> {
        let body = Self::encode(record, false)?;
        let response = self
            .call(HttpMethod::Post, self.root.clone(), Some(body), None)
            .await?;
        Self::decode(&response)
    }

    async fn update(&self, key: RecordKey, record: &R) -> SyncResult<R> {
        let body = Self::encode(record, true)?;
        let response = self
            .call(HttpMethod::Put, self.item_url(key), Some(body), Some(key))
            .await?;
        if response.body.is_empty() {
            // Some endpoints answer 204; the pushed payload is then authoritative.
            return Ok(record.clone().with_status(SyncStatus::Synced));
        }
        Self::decode(&response)
    }

    async fn delete(&self, key: RecordKey) -> SyncResult<()> {
        self.call(HttpMethod::Delete, self.item_url(key), None, Some(key))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureClass;
    use medisync_model::{Diagnosis, Patient};
    use parking_lot::Mutex;

    struct TestClient {
        response: Mutex<Option<SyncResult<HttpResponse>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl TestClient {
        fn replying(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Some(Ok(HttpResponse::new(status, body.as_bytes())))),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing(err: SyncError) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Some(Err(err))),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn last_request(&self) -> HttpRequest {
            self.requests.lock().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl HttpClient for TestClient {
        async fn send(&self, request: HttpRequest) -> SyncResult<HttpResponse> {
            self.requests.lock().push(request);
            self.response
                .lock()
                .take()
                .unwrap_or_else(|| Err(SyncError::Protocol("no response set".into())))
        }
    }

    fn config() -> SyncConfig {
        SyncConfig::new("https://api.example.com/v1/").with_auth_token("t0k")
    }

    #[tokio::test]
    async fn create_strips_key_and_sends_token() {
        let client = TestClient::replying(201, r#"{"id": 41, "firstName": "Ada", "lastName": "Lovelace"}"#);
        let gateway: RestGateway<Patient, _> = RestGateway::new(&config(), Arc::clone(&client));

        let local = Patient::new(-3, "Ada", "Lovelace").with_status(SyncStatus::PendingCreate);
        let created = gateway.create(&local).await.unwrap();

        assert_eq!(created.id, 41);
        assert_eq!(created.status(), SyncStatus::Synced);

        let request = client.last_request();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url, "https://api.example.com/v1/patients");
        assert_eq!(request.bearer_token.as_deref(), Some("t0k"));
        let body: serde_json::Value = serde_json::from_slice(&request.body.unwrap()).unwrap();
        assert!(body.get("id").is_none());
        assert_eq!(body["lastName"], "Lovelace");
    }

    #[tokio::test]
    async fn list_by_parent_uses_query() {
        let client = TestClient::replying(
            200,
            r#"[{"id": 1, "patientId": 5, "code": "E11", "description": "Diabetes"}]"#,
        );
        let gateway: RestGateway<Diagnosis, _> = RestGateway::new(&config(), Arc::clone(&client));

        let rows = gateway.list_by_parent(5).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            client.last_request().url,
            "https://api.example.com/v1/diagnoses?patientId=5"
        );
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let client = TestClient::replying(404, "not found");
        let gateway: RestGateway<Patient, _> = RestGateway::new(&config(), client);
        assert!(gateway.get(9).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn status_codes_are_classified() {
        let gateway: RestGateway<Patient, _> =
            RestGateway::new(&config(), TestClient::replying(422, "lastName required"));
        let err = gateway.create(&Patient::new(-1, "A", "")).await.unwrap_err();
        assert_eq!(err.failure_class(), FailureClass::Rejected);

        let gateway: RestGateway<Patient, _> =
            RestGateway::new(&config(), TestClient::replying(404, ""));
        let err = gateway.delete(3).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound { key: Some(3) }));

        let gateway: RestGateway<Patient, _> =
            RestGateway::new(&config(), TestClient::replying(502, "bad gateway"));
        let err = gateway.list().await.unwrap_err();
        assert_eq!(err.failure_class(), FailureClass::Transient);
    }

    #[tokio::test]
    async fn transport_failure_passes_through() {
        let gateway: RestGateway<Patient, _> = RestGateway::new(
            &config(),
            TestClient::failing(SyncError::transport_retryable("connection refused")),
        );
        let err = gateway.update(1, &Patient::new(1, "A", "B")).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn update_with_empty_body_returns_pushed_record() {
        let client = TestClient::replying(204, "");
        let gateway: RestGateway<Patient, _> = RestGateway::new(&config(), Arc::clone(&client));
        let record = Patient::new(8, "Alan", "Turing");
        let updated = gateway.update(8, &record).await.unwrap();
        assert_eq!(updated, record);
        assert_eq!(client.last_request().url, "https://api.example.com/v1/patients/8");
    }

    #[tokio::test]
    async fn malformed_body_is_protocol_error() {
        let gateway: RestGateway<Patient, _> =
            RestGateway::new(&config(), TestClient::replying(200, "<html>"));
        assert!(matches!(
            gateway.list().await,
            Err(SyncError::Protocol(_))
        ));
    }
}
