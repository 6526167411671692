use serde::{Deserialize, Serialize};

use super::Job;

/// Message kind broadcast when a job or job step changes state.
pub const KIND_JOB_UPDATE: &str = "job_update";

/// Message kind broadcast with aggregate queue/runner statistics.
pub const KIND_STATS_UPDATE: &str = "stats_update";

/// An envelope pushed over the event channel.
///
/// The server broadcasts `{"type": ..., "data": ...}` frames. Routing and
/// interpretation of `data` is up to the consumer; typed accessors are
/// provided for the known kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ChannelMessage {
    /// Decode the payload of a `job_update` message.
    ///
    /// Returns `None` for other kinds or when the payload does not match
    /// the `Job` shape.
    pub fn as_job_update(&self) -> Option<Job> {
        if self.kind != KIND_JOB_UPDATE {
            return None;
        }
        serde_json::from_value(self.data.clone()).ok()
    }

    pub fn is_stats_update(&self) -> bool {
        self.kind == KIND_STATS_UPDATE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_update_payload_decodes() {
        let json = r#"{
            "type": "job_update",
            "data": {
                "id": 3,
                "name": "nightly",
                "status": "success",
                "created_at": "2025-06-01T12:00:00Z"
            }
        }"#;
        let msg: ChannelMessage = serde_json::from_str(json).unwrap();
        let job = msg.as_job_update().expect("job payload");
        assert_eq!(job.id, 3);
        assert!(job.status.is_terminal());
    }

    #[test]
    fn unknown_kind_is_preserved_but_untyped() {
        let msg: ChannelMessage =
            serde_json::from_str(r#"{"type": "runner_online", "data": {"id": "r1"}}"#).unwrap();
        assert_eq!(msg.kind, "runner_online");
        assert!(msg.as_job_update().is_none());
        assert!(!msg.is_stats_update());
    }
}
