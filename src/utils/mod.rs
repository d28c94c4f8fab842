pub mod download;
pub mod extract;
pub mod install;
pub mod mirror;
pub mod probe;
pub mod registry;
pub mod version;

use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};
use mirror::Registry;
use registry::{RegistryClient, Transport};
use version::{ConcreteVersion, Tier, VersionExpr, VersionSpec};

/// Resolves a user expression to one concrete version.
///
/// Exact versions are taken as given. Wildcards and regexes pick the first
/// match in index order, trying the node index before the io.js one.
pub fn resolve_version<T: Transport>(
    client: &RegistryClient<T>,
    registry: Registry,
    root: &Path,
    raw: &str,
) -> Result<ConcreteVersion> {
    let expr = VersionExpr::parse(raw)?;
    match &expr {
        VersionExpr::Exact(version) => return Ok(version.clone()),
        VersionExpr::Global => return probe::global_node_version(root),
        VersionExpr::Latest => return client.fetch_latest(&registry.latest_url()),
        VersionExpr::Wildcard { .. } | VersionExpr::Regex(_) => {}
    }

    let spec = VersionSpec::compile(&expr, || client.fetch_latest(&registry.latest_url()))?;
    for tier in [Tier::Node, Tier::IoJs] {
        let url = registry.index_url(tier);
        let versions = client.fetch_versions(&url)?;
        if let Some(found) = spec.filter(versions.iter().map(|d| d.node.as_str())).first() {
            debug!(expr = raw, version = %found, %url, "expression resolved");
            return ConcreteVersion::parse(found);
        }
    }

    Err(Error::NotFound {
        version: raw.to_string(),
        url: registry.index_url(Tier::Node),
    })
}
