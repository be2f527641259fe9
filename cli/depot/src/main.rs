//! Depot CLI: operate a provider archive registry from the command line.

mod commands;
mod settings;

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use depot_registry::{ProviderPath, Registry};
use tracing_subscriber::EnvFilter;

use settings::Settings;

#[derive(Parser)]
#[command(name = "depot", version, about = "Private provider archive registry")]
struct Cli {
    /// Configuration file (default: ./depot.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory to store providers in (overrides registry.root)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,
    /// Debug logging
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

/// `<host> <namespace> <type>` positional triple.
#[derive(Args)]
struct ProviderArgs {
    /// Registry host name (e.g. registry.example.com)
    host: String,
    /// Provider namespace
    namespace: String,
    /// Provider type; uploaded archive names must match it
    #[arg(value_name = "TYPE")]
    provider_type: String,
}

impl ProviderArgs {
    fn to_path(&self) -> anyhow::Result<ProviderPath> {
        Ok(ProviderPath::new(
            &self.host,
            &self.namespace,
            &self.provider_type,
        )?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Upload an archive named <prefix>-<type>_<version>_<arch>.zip
    Upload {
        #[command(flatten)]
        provider: ProviderArgs,
        /// Archive file to upload
        file: PathBuf,
    },
    /// Delete the archive for one version and arch
    Delete {
        #[command(flatten)]
        provider: ProviderArgs,
        /// Version (e.g. 1.2.3)
        version: String,
        /// OS/arch key (e.g. linux_amd64)
        arch: String,
    },
    /// List providers, versions and archives
    List {
        /// Restrict to one provider: <host> <namespace> <type>
        #[arg(num_args = 3, value_names = ["HOST", "NAMESPACE", "TYPE"])]
        provider: Vec<String>,
    },
    /// Check index documents against archive files
    Check {
        /// Restrict to one provider: <host> <namespace> <type>
        #[arg(num_args = 3, value_names = ["HOST", "NAMESPACE", "TYPE"])]
        provider: Vec<String>,
    },
    /// Print the effective configuration
    Config,
}

fn main() {
    let cli = Cli::parse();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let settings = Settings::resolve(cli.config.as_deref(), &cwd)?.with_root(cli.dir);
    init_tracing(&settings, cli.debug);

    if let Commands::Config = cli.command {
        print!("{}", settings.to_toml()?);
        return Ok(());
    }

    let registry = Registry::new(settings.registry).context("opening registry")?;
    tracing::debug!(root = %registry.root().display(), "registry opened");

    match cli.command {
        Commands::Upload { provider, file } => {
            commands::upload::run(&registry, &provider.to_path()?, &file)
        }
        Commands::Delete {
            provider,
            version,
            arch,
        } => commands::delete::run(&registry, &provider.to_path()?, &version, &arch),
        Commands::List { provider } => {
            let provider = optional_provider(&provider)?;
            commands::list::run(&registry, provider.as_ref())
        }
        Commands::Check { provider } => {
            let provider = optional_provider(&provider)?;
            commands::check::run(&registry, provider.as_ref())
        }
        Commands::Config => Ok(()),
    }
}

/// `--debug` wins, then `RUST_LOG`, then the configured level.
fn init_tracing(settings: &Settings, debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log.level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn optional_provider(parts: &[String]) -> anyhow::Result<Option<ProviderPath>> {
    match parts {
        [] => Ok(None),
        [host, namespace, provider_type] => {
            Ok(Some(ProviderPath::new(host, namespace, provider_type)?))
        }
        _ => anyhow::bail!("expected <host> <namespace> <type>"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_upload() {
        let cli = Cli::try_parse_from([
            "depot",
            "--dir",
            "/srv/providers",
            "upload",
            "registry.example.com",
            "acme",
            "foo",
            "terraform-provider-foo_1.0_linux_amd64.zip",
        ])
        .unwrap();
        assert_eq!(cli.dir, Some(PathBuf::from("/srv/providers")));
        match cli.command {
            Commands::Upload { provider, file } => {
                assert_eq!(
                    provider.to_path().unwrap().to_string(),
                    "registry.example.com/acme/foo"
                );
                assert_eq!(file, PathBuf::from("terraform-provider-foo_1.0_linux_amd64.zip"));
            }
            _ => panic!("expected upload"),
        }
    }

    #[test]
    fn list_takes_optional_triple() {
        let cli = Cli::try_parse_from(["depot", "list"]).unwrap();
        match cli.command {
            Commands::List { provider } => {
                assert!(optional_provider(&provider).unwrap().is_none())
            }
            _ => panic!("expected list"),
        }

        let cli = Cli::try_parse_from(["depot", "check", "h", "ns", "foo", "--debug"]).unwrap();
        assert!(cli.debug);
        match cli.command {
            Commands::Check { provider } => {
                let provider = optional_provider(&provider).unwrap().unwrap();
                assert_eq!(provider.provider_type(), "foo");
            }
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn rejects_unsafe_provider_segments() {
        assert!(optional_provider(&["..".into(), "ns".into(), "foo".into()]).is_err());
    }
}
