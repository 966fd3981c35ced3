//! Version filter engine.
//!
//! Decides which versions of a chart become part of its `Component`, based on
//! the `Repository`'s filter conditions. Pure: the same conditions and version
//! list always give the same answer.

use chart_client::ChartVersion;
use crds::{FilterCond, FilterOperation, VersionedFilterCond};
use regex::Regex;
use std::collections::HashMap;
use tracing::warn;

/// Select versions of `entry_name` to retain.
///
/// Returns the retained indices into `versions` (in source order) and whether
/// the chart itself is kept. A chart with no condition keeps every
/// non-deprecated version. `ignore` without a version condition drops the
/// chart: `(vec![], false)`.
pub fn match_versions(
    conditions: &HashMap<String, FilterCond>,
    entry_name: &str,
    versions: &[ChartVersion],
) -> (Vec<usize>, bool) {
    let Some(cond) = conditions.get(entry_name) else {
        let retained = versions
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.deprecated())
            .map(|(i, _)| i)
            .collect();
        return (retained, true);
    };

    let matcher = cond
        .versioned_filter_cond
        .as_ref()
        .map(|v| VersionMatcher::new(entry_name, v));
    if matcher.is_none() && cond.operation == FilterOperation::Ignore {
        return (Vec::new(), false);
    }

    let retained = versions
        .iter()
        .enumerate()
        .filter(|(_, v)| cond.keep_deprecated || !v.deprecated())
        .filter(|(_, v)| match (&matcher, cond.operation) {
            (None, _) => true,
            (Some(m), FilterOperation::Keep) => m.matches(v.version()),
            (Some(m), FilterOperation::Ignore) => !m.matches(v.version()),
        })
        .map(|(i, _)| i)
        .collect();
    (retained, true)
}

/// Compiled form of a `VersionedFilterCond`. Invalid expressions never match.
struct VersionMatcher<'a> {
    versions: &'a [String],
    constraint: Option<Vec<semver::VersionReq>>,
    regexp: Option<Regex>,
}

impl<'a> VersionMatcher<'a> {
    fn new(entry_name: &str, cond: &'a VersionedFilterCond) -> Self {
        let constraint = cond.version_constraint.as_deref().and_then(|c| {
            let parsed = parse_constraint(c);
            if parsed.is_none() {
                warn!("Ignoring invalid version constraint {:?} in filter for {}", c, entry_name);
            }
            parsed
        });
        let regexp = cond.regexp.as_deref().and_then(|r| match Regex::new(r) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("Ignoring invalid regexp {:?} in filter for {}: {}", r, entry_name, e);
                None
            }
        });
        Self {
            versions: &cond.versions,
            constraint,
            regexp,
        }
    }

    fn matches(&self, version: &str) -> bool {
        if self.versions.iter().any(|v| v == version) {
            return true;
        }
        if let Some(alternatives) = &self.constraint {
            let parsed = semver::Version::parse(version.trim_start_matches('v'));
            if parsed.is_ok_and(|v| alternatives.iter().any(|req| req.matches(&v))) {
                return true;
            }
        }
        self.regexp.as_ref().is_some_and(|re| re.is_match(version))
    }
}

/// Parse a Helm-style constraint: `||` separates alternatives, comparators
/// inside one alternative are separated by commas or whitespace.
fn parse_constraint(raw: &str) -> Option<Vec<semver::VersionReq>> {
    raw.split("||")
        .map(|alternative| {
            let mut comparators: Vec<String> = Vec::new();
            let mut pending_op = String::new();
            for token in alternative.split([',', ' ', '\t']).filter(|t| !t.is_empty()) {
                if token.chars().all(|c| matches!(c, '>' | '<' | '=' | '~' | '^')) {
                    pending_op.push_str(token);
                } else {
                    let version = token.trim_start_matches('v');
                    // A bare version is an exact match, as in Helm
                    if pending_op.is_empty()
                        && version.starts_with(|c: char| c.is_ascii_digit())
                        && !version.contains(['x', 'X', '*'])
                    {
                        pending_op.push('=');
                    }
                    comparators.push(format!("{}{}", pending_op, version));
                    pending_op.clear();
                }
            }
            if comparators.is_empty() || !pending_op.is_empty() {
                return None;
            }
            semver::VersionReq::parse(&comparators.join(", ")).ok()
        })
        .collect()
}
