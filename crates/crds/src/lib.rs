//! ChartSync CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the chart catalog controller.

pub mod component;
pub mod condition;
pub mod filter;
pub mod references;
pub mod repository;

pub use component::*;
pub use condition::*;
pub use filter::*;
pub use references::*;
pub use repository::*;

/// API group shared by every ChartSync resource
pub const API_GROUP: &str = "catalog.microscaler.io";

/// Label placed on every `Component` naming the `Repository` it came from
pub const COMPONENT_REPOSITORY_LABEL: &str = "catalog.microscaler.io/repository";

/// Chart annotation carrying a human readable component name
pub const DISPLAY_NAME_ANNOTATION: &str = "catalog.microscaler.io/displayname";
