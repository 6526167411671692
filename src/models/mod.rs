//! Data models for Goli resources.
//!
//! Serde representations of the server's JSON contracts:
//!
//! - `Job`, `JobStep`, `JobStatus`: job execution records
//! - `Pipeline`, `PipelineDefinition`, `PipelineStep`: pipeline definitions
//! - `User`, `NewUser`, `UserUpdate`: account management
//! - `ChannelMessage`: envelopes pushed over the event channel

pub mod job;
pub mod message;
pub mod pipeline;
pub mod server_config;
pub mod user;

pub use job::{Job, JobQuery, JobStatus, JobStep, NewJob};
pub use message::{ChannelMessage, KIND_JOB_UPDATE, KIND_STATS_UPDATE};
pub use pipeline::{Pipeline, PipelineDefinition, PipelineStep, RunParams};
pub use server_config::{ServerConfig, ServerConfigUpdate};
pub use user::{NewUser, User, UserUpdate};
