//! Session lifecycle management.
//!
//! The [`SessionManager`] owns the credential store, decides which
//! authorization scheme an outgoing request carries, and reacts to
//! server-reported session invalidation: any 401/403 observed through
//! [`SessionManager::dispatch`] while a bearer token is stored clears the
//! token and emits a single auto-logout notification, regardless of how
//! many in-flight requests fail at once.

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::api::error::{description_from_body, ApiError};
use crate::config::ClientConfig;
use crate::models::User;

use super::store::{CredentialStore, Slot};

/// Capacity of the auto-logout broadcast. The signal carries no payload and
/// fires at most once per stored token, so a small buffer suffices.
const LOGOUT_CHANNEL_CAPACITY: usize = 4;

/// Authorization scheme attached to an outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>` - normal authenticated operation
    Bearer,
    /// `Authorization: Goli-Auth-Key <key>` - initial provisioning only
    SetupKey,
}

impl AuthScheme {
    fn slot(&self) -> Slot {
        match self {
            AuthScheme::Bearer => Slot::BearerToken,
            AuthScheme::SetupKey => Slot::SetupKey,
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            AuthScheme::Bearer => "Bearer",
            AuthScheme::SetupKey => "Goli-Auth-Key",
        }
    }
}

/// Login request payload.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Optional hint for the preferred 2FA delivery channel ("email"/"sms")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

/// 2FA verification payload.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TwoFactorPayload {
    pub username: String,
    pub channel: String,
    pub code: String,
}

/// Result of a successful login request.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// A session was issued and the token stored.
    LoggedIn { user: Option<User> },
    /// A second factor is required; a code was sent over `channels`.
    TwoFactorRequired { channels: Vec<String> },
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    two_fa_required: bool,
    #[serde(default)]
    channels: Vec<String>,
    #[serde(default)]
    user: Option<User>,
}

#[derive(Debug, Deserialize)]
struct SetupVerifyResponse {
    #[serde(default)]
    auth_key: Option<String>,
}

/// Owns the credential/token lifecycle and request authorization.
pub struct SessionManager {
    http: Client,
    config: ClientConfig,
    store: Arc<dyn CredentialStore>,
    logout_tx: broadcast::Sender<()>,
}

impl SessionManager {
    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;
        let (logout_tx, _) = broadcast::channel(LOGOUT_CHANNEL_CAPACITY);
        Ok(Self {
            http,
            config,
            store,
            logout_tx,
        })
    }

    /// The underlying HTTP client. Clone is cheap - reqwest shares the
    /// connection pool internally.
    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether a bearer token is currently stored. Validity is only
    /// discovered reactively, from server responses.
    pub fn has_session(&self) -> bool {
        self.store.get(Slot::BearerToken).is_some()
    }

    /// Subscribe to the auto-logout notification.
    ///
    /// Fires (without payload) when a 401/403 response invalidates a stored
    /// token; consumers are expected to return to a login surface.
    pub fn subscribe_logout(&self) -> broadcast::Receiver<()> {
        self.logout_tx.subscribe()
    }

    /// Authorization headers for the given scheme.
    ///
    /// A pure read of the credential store: no side effects, never fails.
    /// With no stored credential the map is empty and the server rejects
    /// the request, which then flows through the normal 401 path.
    pub fn auth_headers(&self, scheme: AuthScheme) -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        if let Some(credential) = self.store.get(scheme.slot()) {
            match header::HeaderValue::from_str(&format!("{} {}", scheme.prefix(), credential)) {
                Ok(value) => {
                    headers.insert(header::AUTHORIZATION, value);
                }
                Err(_) => {
                    warn!("Stored credential is not a valid header value, omitting");
                }
            }
        }
        headers
    }

    /// Execute a request and intercept authorization failures.
    ///
    /// On 401/403 the stored bearer token (if any) is cleared and the
    /// auto-logout notification emitted exactly once per token; the call
    /// then fails with [`ApiError::AuthenticationFailed`]. Any other
    /// response is returned to the caller unchanged.
    pub async fn dispatch(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(ApiError::Network)?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            // De-duplicate on "token already absent": only the request that
            // actually clears the slot emits the notification.
            if self.store.take(Slot::BearerToken).is_some() {
                debug!(%status, "Session invalidated by server, emitting auto-logout");
                let _ = self.logout_tx.send(());
            }
            return Err(ApiError::AuthenticationFailed(description_from_body(&body)).into());
        }
        Ok(response)
    }

    /// Authenticate with username and password.
    ///
    /// On success either stores the issued token or reports that a second
    /// factor is required. No state is mutated on failure.
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome> {
        let response = self
            .http
            .post(self.config.api_url("auth/login")?)
            .json(credentials)
            .send()
            .await
            .map_err(ApiError::Network)?;

        let session = Self::parse_session_response(response).await?;
        if session.two_fa_required {
            return Ok(LoginOutcome::TwoFactorRequired {
                channels: session.channels,
            });
        }
        let token = session
            .token
            .ok_or_else(|| ApiError::MalformedResponse("Login response carried no token".into()))?;
        self.store.put(Slot::BearerToken, &token)?;
        Ok(LoginOutcome::LoggedIn { user: session.user })
    }

    /// Verify a submitted 2FA code; stores the issued token on success.
    pub async fn verify_two_factor(&self, payload: &TwoFactorPayload) -> Result<User> {
        let response = self
            .http
            .post(self.config.api_url("auth/2fa/verify")?)
            .json(payload)
            .send()
            .await
            .map_err(ApiError::Network)?;

        let session = Self::parse_session_response(response).await?;
        // Validate the whole response before mutating any state
        let token = session.token.ok_or_else(|| {
            ApiError::MalformedResponse("2FA verification response carried no token".into())
        })?;
        let user = session.user.ok_or_else(|| {
            ApiError::MalformedResponse("2FA verification response carried no user".into())
        })?;
        self.store.put(Slot::BearerToken, &token)?;
        Ok(user)
    }

    /// End the session.
    ///
    /// Notifies the server on a best-effort basis (failure is logged, never
    /// propagated), then unconditionally clears the stored token so local
    /// state is consistent even when the server is unreachable.
    pub async fn logout(&self) {
        if self.store.get(Slot::BearerToken).is_some() {
            let request = match self.config.api_url("auth/logout") {
                Ok(url) => self
                    .http
                    .post(url)
                    .headers(self.auth_headers(AuthScheme::Bearer)),
                Err(err) => {
                    warn!(error = %err, "Failed to build logout URL");
                    self.store.take(Slot::BearerToken);
                    return;
                }
            };
            match request.send().await {
                Ok(response) if !response.status().is_success() => {
                    warn!(status = %response.status(), "Server rejected logout notification");
                }
                Ok(_) => debug!("Server session deleted"),
                Err(err) => warn!(error = %err, "Failed to notify server of logout"),
            }
        }
        self.store.take(Slot::BearerToken);
    }

    /// Verify the one-time setup password; stores the returned provisioning
    /// key on success. A previously stored key is untouched on failure.
    pub async fn verify_setup_password(&self, password: &str) -> Result<()> {
        let response = self
            .http
            .post(self.config.api_url("setup/verify")?)
            .json(&serde_json::json!({ "setup_password": password }))
            .send()
            .await
            .map_err(ApiError::Network)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ApiError::from_status(status, &body).into());
        }
        let parsed: SetupVerifyResponse = serde_json::from_str(&body)
            .map_err(|e| ApiError::MalformedResponse(e.to_string()))?;
        let auth_key = parsed.auth_key.ok_or_else(|| {
            ApiError::MalformedResponse("Setup verification response carried no auth key".into())
        })?;
        self.store.put(Slot::SetupKey, &auth_key)?;
        Ok(())
    }

    async fn parse_session_response(response: Response) -> Result<SessionResponse> {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ApiError::from_status(status, &body).into());
        }
        serde_json::from_str(&body)
            .map_err(|e| ApiError::MalformedResponse(e.to_string()).into())
    }
}
