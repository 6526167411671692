use serde::{Deserialize, Serialize};

/// Server configuration as returned by GET /config.
///
/// Secrets (auth key, SMTP password, registry token) come back verbatim;
/// this endpoint is admin-only on the server side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default)]
    pub auth_key: Option<String>,
    #[serde(default)]
    pub setup_complete: bool,
    #[serde(default)]
    pub gh_username: Option<String>,
    #[serde(default)]
    pub gh_access_token: Option<String>,
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default)]
    pub smtp_port: Option<String>,
    #[serde(default)]
    pub smtp_user: Option<String>,
    #[serde(default)]
    pub smtp_pass: Option<String>,
    #[serde(default)]
    pub smtp_from: Option<String>,
    #[serde(default)]
    pub smtp_from_name: Option<String>,
}

/// Partial update for POST /config; unset fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_complete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gh_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gh_access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtp_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtp_port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtp_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtp_pass: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtp_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtp_from_name: Option<String>,
}
