//! OpenStack API interaction module
//!
//! This module provides the core functionality for talking to OpenStack
//! service APIs: Keystone authentication, the HTTP client, and the combined
//! client used by the resource providers.
//!
//! # Module Structure
//!
//! - [`auth`] - Keystone v3 password authentication and catalog lookup
//! - [`client`] - Main OpenStack client for making API requests
//! - [`http`] - HTTP utilities for REST API calls
//!
//! # Example
//!
//! ```ignore
//! use osops::openstack::client::OsClient;
//!
//! async fn example(settings: osops::config::AuthSettings) -> anyhow::Result<()> {
//!     let client = OsClient::new(settings)?;
//!     let url = client.service_url("volumev3", "volumes/detail").await?;
//!     let volumes = client.get(&url).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
