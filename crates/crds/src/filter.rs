//! Filter conditions attached to a `Repository`
//!
//! Operators use these to decide which charts, and which versions of a chart,
//! are mirrored into `Component` resources. The matching logic itself lives in
//! the controller; this module only carries the declarative shape.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// What to do with versions matched by a filter condition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperation {
    /// Retain matching versions
    #[default]
    Keep,

    /// Drop matching versions (or the whole chart when no version condition is set)
    Ignore,
}

/// Filter applied to a single chart, selected by chart name
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FilterCond {
    /// Chart (entry) name this condition applies to
    pub name: String,

    /// Keep or ignore the matched versions
    #[serde(default)]
    pub operation: FilterOperation,

    /// Retain deprecated versions as well
    #[serde(default)]
    pub keep_deprecated: bool,

    /// Version-level condition; absent means the operation applies to the whole chart
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versioned_filter_cond: Option<VersionedFilterCond>,
}

/// Version-level matching criteria. A version matches when any configured
/// criterion matches it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VersionedFilterCond {
    /// Exact version strings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<String>,

    /// Semantic version requirement (e.g., ">=1.2.0, <2.0.0")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_constraint: Option<String>,

    /// Regular expression matched against the version string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regexp: Option<String>,
}
