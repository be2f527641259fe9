//! `depot delete`: remove one archive and cascade index cleanup.

use anyhow::{Context, Result};
use depot_registry::{ProviderPath, Registry};

/// Delete the archive for `version`/`arch` from `provider`.
pub fn run(registry: &Registry, provider: &ProviderPath, version: &str, arch: &str) -> Result<()> {
    let outcome = registry
        .delete(provider, version, arch)
        .with_context(|| format!("deleting {provider} v{version} ({arch})"))?;

    println!("Removed {}", outcome.filename);
    if outcome.directory_removed {
        println!("Removed provider directory for {provider}");
    } else if outcome.version_removed {
        println!("Version {version} has no archives left and was unlisted");
    }
    Ok(())
}
