//! OCI Chart Catalog Client
//!
//! A Rust client for reading Helm chart catalogs published to OCI registries.
//! Repositories are registered once, refreshed on demand into an in-memory
//! snapshot, and read back as a [`Catalog`] (latest version plus every known
//! version, newest first).
//!
//! # Example
//!
//! ```no_run
//! use chart_client::{ChartClientTrait, OciChartClient, RepositoryEntry};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OciChartClient::new(Duration::from_secs(30))?;
//!
//! client.register(RepositoryEntry {
//!     name: "default.charts".to_string(),
//!     url: "oci://ghcr.io/org/charts/nginx".to_string(),
//!     insecure: false,
//! }, Duration::from_secs(60)).await?;
//!
//! client.refresh("default.charts", Duration::from_secs(60)).await?;
//! let catalog = client.fetch_catalog("default.charts").await?;
//! println!("latest: {}", catalog.latest.version());
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Anonymous pulls**: Bearer token challenges are answered anonymously
//! - **Helm tags**: `_` in tags is mapped back to `+` build metadata
//! - **Snapshots**: Versions already seen are not downloaded again

pub mod client;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod chart_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use chart_trait::ChartClientTrait;
pub use client::OciChartClient;
pub use common::reference::{oci_entry_name, OciReference};
pub use error::ChartError;
pub use models::*;
#[cfg(feature = "test-util")]
pub use mock::MockChartClient;
