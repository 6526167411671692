//! Client library for the Goli pipeline/job execution service.
//!
//! Three cooperating pieces:
//!
//! - [`auth::SessionManager`] owns the credential/token lifecycle: it
//!   attaches the right authorization scheme to outgoing requests and
//!   reacts to server-reported session invalidation by clearing the token
//!   and emitting a single auto-logout notification.
//! - [`api::ApiClient`] issues the `/api/v1` REST calls for jobs,
//!   pipelines, users, and server configuration.
//! - [`channel::EventChannel`] keeps a self-reconnecting WebSocket stream
//!   of job/pipeline status updates alive for the lifetime of the
//!   application.
//!
//! ```no_run
//! use std::sync::Arc;
//! use goli_client::auth::{Credentials, FileStore, SessionManager};
//! use goli_client::api::ApiClient;
//! use goli_client::channel::EventChannel;
//! use goli_client::config::ClientConfig;
//! use goli_client::models::JobQuery;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ClientConfig::new("https://goli.example.com".parse()?);
//! let store = Arc::new(FileStore::open_default()?);
//! let session = Arc::new(SessionManager::new(config.clone(), store)?);
//!
//! session
//!     .login(&Credentials {
//!         username: "admin".into(),
//!         password: "hunter2".into(),
//!         channel: None,
//!     })
//!     .await?;
//!
//! let client = ApiClient::new(session.clone());
//! let jobs = client.list_jobs(&JobQuery::default()).await?;
//!
//! let _events = EventChannel::open(
//!     &config,
//!     Arc::new(|msg| println!("{}: {}", msg.kind, msg.data)),
//! )?;
//! # Ok(())
//! # }
//! ```
//!
//! The library installs no tracing subscriber; embedding applications
//! control their own logging.

pub mod api;
pub mod auth;
pub mod channel;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthScheme, Credentials, LoginOutcome, SessionManager};
pub use channel::{ChannelHandle, ChannelState, EventChannel};
pub use config::ClientConfig;
