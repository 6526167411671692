//! API client for the Goli REST API.
//!
//! Every request picks up its Authorization header from the
//! [`SessionManager`] at send time, and every response passes through the
//! session manager's interceptor before the body is touched, so a
//! server-side session invalidation is handled uniformly no matter which
//! resource call observed it.

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::multipart;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::auth::{AuthScheme, SessionManager};
use crate::models::{
    Job, JobQuery, NewJob, NewUser, Pipeline, RunParams, ServerConfig, ServerConfigUpdate, User,
    UserUpdate,
};

use super::ApiError;

/// Multipart field name the server expects for pipeline uploads
const UPLOAD_FIELD: &str = "yaml_file";

#[derive(Debug, serde::Deserialize)]
struct SetupStatus {
    #[serde(default)]
    setup_complete: bool,
}

/// Client for the `/api/v1` resources.
///
/// Clone is cheap - the HTTP connection pool and session manager are
/// shared. `with_scheme` clones the client for the provisioning phase,
/// threading the setup-key scheme through explicitly instead of a silent
/// fallback.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    session: Arc<SessionManager>,
    scheme: AuthScheme,
}

impl ApiClient {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self {
            http: session.http().clone(),
            session,
            scheme: AuthScheme::Bearer,
        }
    }

    /// A clone of this client that authorizes with the given scheme.
    pub fn with_scheme(&self, scheme: AuthScheme) -> Self {
        Self {
            http: self.http.clone(),
            session: self.session.clone(),
            scheme,
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.session.config().api_url(path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self
            .http
            .get(self.url(path)?)
            .headers(self.session.auth_headers(self.scheme));
        let response = self.session.dispatch(request).await?;
        Self::parse_body(response)
            .await
            .with_context(|| format!("GET {}", path))
    }

    async fn get_json_query<T: DeserializeOwned, Q: Serialize>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T> {
        let request = self
            .http
            .get(self.url(path)?)
            .query(query)
            .headers(self.session.auth_headers(self.scheme));
        let response = self.session.dispatch(request).await?;
        Self::parse_body(response)
            .await
            .with_context(|| format!("GET {}", path))
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let request = self
            .http
            .post(self.url(path)?)
            .headers(self.session.auth_headers(self.scheme))
            .json(body);
        let response = self.session.dispatch(request).await?;
        Self::parse_body(response)
            .await
            .with_context(|| format!("POST {}", path))
    }

    /// Check the status before parsing, so error bodies never masquerade
    /// as parse failures.
    async fn parse_body<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await.map_err(ApiError::Network)?;
        if !status.is_success() {
            return Err(ApiError::from_status(status, &body).into());
        }
        serde_json::from_str(&body).map_err(|e| ApiError::MalformedResponse(e.to_string()).into())
    }

    /// Non-2xx check for calls whose success body is discarded.
    async fn ensure_success(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body).into());
        }
        Ok(())
    }

    // ===== Jobs =====

    /// List jobs, most recent first. The server returns `null` instead of
    /// an empty array when no jobs exist.
    pub async fn list_jobs(&self, query: &JobQuery) -> Result<Vec<Job>> {
        let jobs: Option<Vec<Job>> = self.get_json_query("jobs", query).await?;
        Ok(jobs.unwrap_or_default())
    }

    pub async fn get_job(&self, id: i64) -> Result<Job> {
        self.get_json(&format!("jobs/{}", id)).await
    }

    pub async fn create_job(&self, new_job: &NewJob) -> Result<Job> {
        self.post_json("jobs", new_job).await
    }

    // ===== Pipelines =====

    pub async fn list_pipelines(&self) -> Result<Vec<Pipeline>> {
        let pipelines: Option<Vec<Pipeline>> = self.get_json("pipelines").await?;
        Ok(pipelines.unwrap_or_default())
    }

    pub async fn get_pipeline(&self, id: i64) -> Result<Pipeline> {
        self.get_json(&format!("pipelines/{}", id)).await
    }

    /// Upload a pipeline definition as a YAML file.
    pub async fn upload_pipeline(&self, file_name: &str, yaml: Vec<u8>) -> Result<Pipeline> {
        let part = multipart::Part::bytes(yaml)
            .file_name(file_name.to_string())
            .mime_str("application/x-yaml")
            .context("Invalid upload mime type")?;
        let form = multipart::Form::new().part(UPLOAD_FIELD, part);

        let request = self
            .http
            .post(self.url("pipelines/upload")?)
            .headers(self.session.auth_headers(self.scheme))
            .multipart(form);
        let response = self.session.dispatch(request).await?;
        Self::parse_body(response).await.context("POST pipelines/upload")
    }

    /// Trigger a pipeline run; returns the job created for it.
    pub async fn run_pipeline(&self, id: i64, params: &RunParams) -> Result<Job> {
        self.post_json(&format!("pipelines/{}/run", id), params).await
    }

    // ===== Users =====

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let users: Option<Vec<User>> = self.get_json("users").await?;
        Ok(users.unwrap_or_default())
    }

    pub async fn create_user(&self, new_user: &NewUser) -> Result<User> {
        self.post_json("users", new_user).await
    }

    pub async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<User> {
        let request = self
            .http
            .put(self.url(&format!("users/{}", id))?)
            .headers(self.session.auth_headers(self.scheme))
            .json(update);
        let response = self.session.dispatch(request).await?;
        Self::parse_body(response)
            .await
            .with_context(|| format!("PUT users/{}", id))
    }

    pub async fn delete_user(&self, id: i64) -> Result<()> {
        let request = self
            .http
            .delete(self.url(&format!("users/{}", id))?)
            .headers(self.session.auth_headers(self.scheme));
        let response = self.session.dispatch(request).await?;
        Self::ensure_success(response)
            .await
            .with_context(|| format!("DELETE users/{}", id))?;
        debug!(user_id = id, "User deleted");
        Ok(())
    }

    // ===== Server config =====

    pub async fn get_config(&self) -> Result<ServerConfig> {
        self.get_json("config").await
    }

    pub async fn update_config(&self, update: &ServerConfigUpdate) -> Result<()> {
        let request = self
            .http
            .post(self.url("config")?)
            .headers(self.session.auth_headers(self.scheme))
            .json(update);
        let response = self.session.dispatch(request).await?;
        Self::ensure_success(response).await.context("POST config")
    }

    // ===== Setup =====

    /// Whether initial provisioning has been completed. Unauthenticated,
    /// but still routed through the session interceptor like every other
    /// response.
    pub async fn setup_status(&self) -> Result<bool> {
        let request = self.http.get(self.url("setup/status")?);
        let response = self.session.dispatch(request).await?;
        let status: SetupStatus = Self::parse_body(response).await.context("GET setup/status")?;
        Ok(status.setup_complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::CredentialStore;
    use crate::auth::{MemoryStore, Slot};
    use crate::config::ClientConfig;
    use crate::models::JobStatus;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(uri: &str, token: Option<&str>) -> ApiClient {
        let store = Arc::new(MemoryStore::new());
        if let Some(token) = token {
            store.put(Slot::BearerToken, token).unwrap();
        }
        let config = ClientConfig::new(Url::parse(uri).unwrap());
        let session = Arc::new(SessionManager::new(config, store).unwrap());
        ApiClient::new(session)
    }

    #[tokio::test]
    async fn list_jobs_sends_bearer_and_tolerates_null_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/jobs"))
            .and(header("authorization", "Bearer abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), Some("abc"));
        let jobs = client.list_jobs(&JobQuery::default()).await.unwrap();
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn list_jobs_threads_query_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/jobs"))
            .and(query_param("status", "failed"))
            .and(query_param("limit", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "id": 1,
                "name": "deploy",
                "status": "failed",
                "created_at": "2025-06-01T12:00:00Z"
            }])))
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), Some("abc"));
        let query = JobQuery {
            status: Some(JobStatus::Failed),
            limit: Some(10),
            ..Default::default()
        };
        let jobs = client.list_jobs(&query).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn with_scheme_switches_to_setup_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/config"))
            .and(header("authorization", "Goli-Auth-Key prov"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "port": "8080",
                "setup_complete": false
            })))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        store.put(Slot::SetupKey, "prov").unwrap();
        let config = ClientConfig::new(Url::parse(&server.uri()).unwrap());
        let session = Arc::new(SessionManager::new(config, store).unwrap());

        let client = ApiClient::new(session).with_scheme(AuthScheme::SetupKey);
        let server_config = client.get_config().await.unwrap();
        assert_eq!(server_config.port.as_deref(), Some("8080"));
        assert!(!server_config.setup_complete);
    }

    #[tokio::test]
    async fn rejected_request_carries_body_description() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/jobs/42"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({"description": "Job not found"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), Some("abc"));
        let err = client.get_job(42).await.unwrap_err();
        match err.downcast_ref::<ApiError>() {
            Some(ApiError::RequestRejected {
                status,
                description,
            }) => {
                assert_eq!(status.as_u16(), 404);
                assert_eq!(description, "Job not found");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_success_body_is_not_a_crash() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/pipelines/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), Some("abc"));
        let err = client.get_pipeline(1).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn auth_failure_on_resource_call_clears_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/pipelines"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({"description": "Session expired"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), Some("stale"));
        let mut logout_rx = client.session().subscribe_logout();

        let err = client.list_pipelines().await.unwrap_err();
        match err.downcast_ref::<ApiError>() {
            Some(ApiError::AuthenticationFailed(desc)) => assert_eq!(desc, "Session expired"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!client.session().has_session());
        logout_rx.recv().await.unwrap();
    }

    #[tokio::test]
    async fn delete_user_surfaces_rejection_description() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/users/9"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({"description": "User not found"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), Some("abc"));
        let err = client.delete_user(9).await.unwrap_err();
        match err.downcast_ref::<ApiError>() {
            Some(ApiError::RequestRejected {
                status,
                description,
            }) => {
                assert_eq!(status.as_u16(), 404);
                assert_eq!(description, "User not found");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn update_config_ignores_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/config"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"description": "Config updated"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), Some("abc"));
        let update = crate::models::ServerConfigUpdate {
            smtp_host: Some("mail.example.com".into()),
            ..Default::default()
        };
        client.update_config(&update).await.unwrap();
    }

    #[tokio::test]
    async fn setup_status_requires_no_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/setup/status"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"setup_complete": true})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), None);
        assert!(client.setup_status().await.unwrap());
    }

    #[tokio::test]
    async fn run_pipeline_returns_created_job() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/pipelines/5/run"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 11,
                "pipeline_id": 5,
                "name": "release",
                "status": "pending",
                "created_at": "2025-06-01T12:00:00Z"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), Some("abc"));
        let job = client.run_pipeline(5, &RunParams::new()).await.unwrap();
        assert_eq!(job.pipeline_id, Some(5));
        assert_eq!(job.status, JobStatus::Pending);
    }
}
