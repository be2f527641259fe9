//! `depot list`: show providers, versions and archives.

use anyhow::Result;
use depot_registry::{ErrorKind, ProviderPath, Registry};

/// List every provider, or the versions and archives of one.
pub fn run(registry: &Registry, provider: Option<&ProviderPath>) -> Result<()> {
    print!("{}", render(registry, provider)?);
    Ok(())
}

fn render(registry: &Registry, provider: Option<&ProviderPath>) -> Result<String> {
    let providers = match provider {
        Some(provider) => vec![provider.clone()],
        None => registry.providers()?,
    };
    if providers.is_empty() {
        return Ok(format!(
            "No providers under {}\n",
            registry.root().display()
        ));
    }

    let mut out = String::new();
    for provider in &providers {
        out.push_str(&format!("{provider}\n"));
        for version in registry.versions(provider)? {
            let archives = match registry.archives(provider, &version) {
                Ok(archives) => archives,
                // Listed without a `<version>.json`; `depot check` explains.
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    out.push_str(&format!("  {version} (missing archive index)\n"));
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            out.push_str(&format!("  {version}\n"));
            for (arch, entry) in archives.iter() {
                out.push_str(&format!("    {arch:<16} {}\n", entry.filename));
            }
        }
    }
    Ok(out)
}
