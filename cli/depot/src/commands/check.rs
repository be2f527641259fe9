//! `depot check`: audit index documents against archive files.

use anyhow::{bail, Result};
use depot_registry::{format_report, ProviderPath, Registry};

/// Check one provider, or all of them. Fails if any is inconsistent.
pub fn run(registry: &Registry, provider: Option<&ProviderPath>) -> Result<()> {
    let reports = match provider {
        Some(provider) => vec![registry.check(provider)?],
        None => registry.check_all()?,
    };

    for report in &reports {
        print!("{}", format_report(report));
    }

    let failed = reports.iter().filter(|r| !r.is_consistent()).count();
    if failed > 0 {
        bail!("{failed} provider(s) inconsistent");
    }
    println!("Checked {} provider(s)", reports.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_passes_and_fails() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::open(dir.path()).unwrap();
        let provider = ProviderPath::new("h", "ns", "foo").unwrap();
        registry
            .upload(&provider, "terraform-provider-foo_1.0_linux_amd64.zip", &b"z"[..])
            .unwrap();
        run(&registry, None).unwrap();

        std::fs::write(
            registry
                .provider_dir(&provider)
                .join("terraform-provider-foo_9.0_linux_amd64.zip"),
            b"orphan",
        )
        .unwrap();
        assert!(run(&registry, Some(&provider)).is_err());
    }
}
