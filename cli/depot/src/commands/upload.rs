//! `depot upload`: store an archive and index it.

use std::path::Path;

use anyhow::{Context, Result};
use depot_registry::{ProviderPath, Registry};

/// Upload `file` to the provider at `host/namespace/type`.
pub fn run(registry: &Registry, provider: &ProviderPath, file: &Path) -> Result<()> {
    let outcome = registry
        .upload_file(provider, file)
        .with_context(|| format!("uploading {} to {provider}", file.display()))?;

    let action = if outcome.replaced { "Replaced" } else { "Uploaded" };
    println!(
        "{action} {provider} v{} ({}), {} bytes",
        outcome.version, outcome.arch, outcome.bytes
    );
    for hash in &outcome.hashes {
        println!("  {hash}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_indexes_archive() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::open(dir.path().join("providers")).unwrap();
        let provider = ProviderPath::new("h", "ns", "foo").unwrap();
        let file = dir.path().join("terraform-provider-foo_0.3.0_linux_amd64.zip");
        std::fs::write(&file, b"zip").unwrap();

        run(&registry, &provider, &file).unwrap();
        assert_eq!(registry.versions(&provider).unwrap(), vec!["0.3.0"]);
    }

    #[test]
    fn upload_reports_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::open(dir.path().join("providers")).unwrap();
        let provider = ProviderPath::new("h", "ns", "bar").unwrap();
        let file = dir.path().join("terraform-provider-foo_0.3.0_linux_amd64.zip");
        std::fs::write(&file, b"zip").unwrap();

        let err = run(&registry, &provider, &file).unwrap_err();
        assert!(format!("{err:#}").contains("does not match"));
    }
}
