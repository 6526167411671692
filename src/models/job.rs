use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether the job has reached a final state and will not change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed | JobStatus::Cancelled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Success => write!(f, "success"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    #[serde(default)]
    pub pipeline_id: Option<i64>,
    pub name: String,
    pub status: JobStatus,
    #[serde(default)]
    pub triggered_by: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub logs: Option<String>,
    pub created_at: DateTime<Utc>,
    // GET /jobs/{id} omits this entirely for stepless jobs
    #[serde(default)]
    pub steps: Vec<JobStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStep {
    pub id: i64,
    pub job_id: i64,
    pub step_name: String,
    pub step_order: i32,
    pub status: JobStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub logs: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request body for POST /jobs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewJob {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
}

/// Query parameters for GET /jobs. The server defaults to the 50 most
/// recent jobs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_without_steps_gets_empty_vec() {
        let json = r#"{
            "id": 7,
            "name": "deploy",
            "status": "running",
            "created_at": "2025-06-01T12:00:00Z"
        }"#;
        let job: Job = serde_json::from_str(json).unwrap();
        assert!(job.steps.is_empty());
        assert_eq!(job.status, JobStatus::Running);
        assert!(!job.status.is_terminal());
    }

    #[test]
    fn job_query_skips_unset_fields() {
        let q = JobQuery { status: Some(JobStatus::Failed), ..Default::default() };
        let s = serde_json::to_string(&q).unwrap();
        assert_eq!(s, r#"{"status":"failed"}"#);
    }
}
