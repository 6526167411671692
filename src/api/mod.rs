//! REST API client module for the Goli pipeline service.
//!
//! `ApiClient` issues the versioned `/api/v1` calls for jobs, pipelines,
//! users, and server configuration. Authorization headers come from the
//! session manager per request; responses pass through its interceptor so
//! session invalidation is detected uniformly.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
