//! Index-consistency engine for a private provider archive registry.
//!
//! Archives are stored per `<host>/<namespace>/<type>` directory next to two
//! tiers of JSON index documents: `index.json` listing versions, and one
//! `<version>.json` per version listing the archive for each `os_arch`.
//! [`Registry::upload`] and [`Registry::delete`] keep the documents and the
//! files in agreement, cascading removal up to the whole directory when the
//! last archive goes.
//!
//! HTTP routing and static file serving sit outside this crate; callers map
//! [`ErrorKind::status_code`] onto their responses.

pub mod check;
pub mod config;
pub mod error;
pub mod filename;
pub mod index;
pub mod integrity;
pub mod lock;
pub mod path;
pub mod registry;
pub mod store;
pub mod transfer;

// Re-exports for convenience.
pub use check::{format_report, CheckReport, Issue};
pub use config::RegistryConfig;
pub use error::{ErrorKind, RegistryError, Result};
pub use filename::{parse_archive_filename, parse_filename, ArchiveName, ParsedFilename};
pub use index::{ArchiveEntry, ArchiveIndex, VersionIndex};
pub use integrity::ContentHash;
pub use path::{resolve_path, ProviderPath};
pub use registry::{DeleteOutcome, Registry, UploadOutcome};
pub use store::MetadataStore;
