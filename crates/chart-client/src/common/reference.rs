//! OCI references
//!
//! Parses `oci://registry[:port]/path/to/chart[:tag|@digest]` into the pieces
//! the distribution API needs, and derives the chart (entry) name.

use crate::error::ChartError;

const OCI_SCHEME: &str = "oci://";

/// A parsed OCI repository reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OciReference {
    /// Registry host, with port when given
    pub registry: String,
    /// Repository path inside the registry
    pub repository: String,
    /// Tag or digest pinned in the URL, if any
    pub pinned: Option<String>,
}

impl OciReference {
    /// Parse an `oci://` URL
    pub fn parse(url: &str) -> Result<Self, ChartError> {
        let rest = url
            .strip_prefix(OCI_SCHEME)
            .ok_or_else(|| ChartError::InvalidReference(format!("{} is not an oci:// URL", url)))?
            .trim_end_matches('/');

        let (registry, path) = rest
            .split_once('/')
            .ok_or_else(|| ChartError::InvalidReference(format!("{} has no repository path", url)))?;
        if registry.is_empty() {
            return Err(ChartError::InvalidReference(format!("{} has no registry host", url)));
        }

        let (repository, pinned) = split_pinned(path);
        if repository.is_empty() || repository.split('/').any(str::is_empty) {
            return Err(ChartError::InvalidReference(format!("{} has an empty path segment", url)));
        }

        Ok(Self {
            registry: registry.to_string(),
            repository: repository.to_string(),
            pinned: pinned.map(str::to_string),
        })
    }

    /// Registry base URL
    pub fn base_url(&self, insecure: bool) -> String {
        let scheme = if insecure { "http" } else { "https" };
        format!("{}://{}", scheme, self.registry)
    }

    /// Token scope for pulling this repository
    pub fn pull_scope(&self) -> String {
        format!("repository:{}:pull", self.repository)
    }

    /// Chart name: last segment of the repository path
    pub fn entry_name(&self) -> &str {
        self.repository.rsplit('/').next().unwrap_or(&self.repository)
    }
}

/// Split a `:tag` or `@digest` suffix off the last path segment.
fn split_pinned(path: &str) -> (&str, Option<&str>) {
    let last_start = path.rfind('/').map_or(0, |i| i + 1);
    let last = &path[last_start..];
    let cut = last.find('@').or_else(|| last.find(':'));
    match cut {
        Some(i) => (&path[..last_start + i], Some(&last[i + 1..])),
        None => (path, None),
    }
}

/// Entry name for a catalog URL.
///
/// Stable for a given URL. Falls back to the last path segment when the URL
/// does not parse as an OCI reference, so a name is always produced.
pub fn oci_entry_name(url: &str) -> String {
    if let Ok(reference) = OciReference::parse(url) {
        return reference.entry_name().to_string();
    }
    let trimmed = url.trim_start_matches(OCI_SCHEME).trim_end_matches('/');
    let (path, _) = split_pinned(trimmed);
    path.rsplit('/').next().unwrap_or(path).to_string()
}

/// Helm pushes `+` build metadata as `_` because `+` is not allowed in tags.
pub fn tag_to_version(tag: &str) -> String {
    tag.replace('_', "+")
}
