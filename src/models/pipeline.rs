use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Raw YAML or JSON pipeline definition as uploaded.
    pub definition: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parsed form of a pipeline definition, as the server echoes it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<PipelineStep>,
    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStep {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Step executor kind: "docker", "script", ...
    #[serde(rename = "type")]
    pub kind: String,
    /// Executor action: "run", "pull", "start", "stop", ...
    pub action: String,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
    /// "continue", "stop" or "rollback"
    #[serde(default)]
    pub on_failure: Option<String>,
    #[serde(default)]
    pub retry: Option<i32>,
}

/// Variable overrides passed to POST /pipelines/{id}/run.
pub type RunParams = HashMap<String, serde_json::Value>;
