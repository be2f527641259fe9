//! Archive filename parsing.
//!
//! Archives are named `<prefix>-<name>_<version>_<arch>.zip`, e.g.
//! `terraform-provider-external_2.2.2_linux_amd64.zip`. The name and arch
//! are `[A-Za-z0-9_]+`, the version is dot-separated digits. Because names
//! and arches may both contain underscores, the version is taken to be the
//! rightmost segment that can be one, which gives the name the longest match.

use std::fmt;

use crate::error::{RegistryError, Result};

/// The only archive extension the registry stores.
pub const ARCHIVE_EXTENSION: &str = ".zip";

/// Components of a well-formed archive filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    /// Provider name, expected to equal the upload path's type.
    pub provider: String,
    /// Version string (`1.2.3`).
    pub version: String,
    /// `os_arch` key (`linux_amd64`).
    pub arch: String,
    /// Trailing extension including the leading dot, possibly empty.
    pub extension: String,
}

impl ArchiveName {
    /// Whether the extension is `.zip`.
    pub fn is_zip(&self) -> bool {
        self.extension == ARCHIVE_EXTENSION
    }
}

/// Why a filename failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// Does not start with `<prefix>-`.
    MissingPrefix,
    /// Fewer than the three `_`-separated parts.
    MissingSegments,
    /// No segment is a valid version followed by an arch.
    MissingVersion,
    /// Provider name contains characters outside `[A-Za-z0-9_]`.
    InvalidName,
    /// Arch contains characters outside `[A-Za-z0-9_]`.
    InvalidArch,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            InvalidReason::MissingPrefix => "missing archive prefix",
            InvalidReason::MissingSegments => "expected <name>_<version>_<arch>",
            InvalidReason::MissingVersion => "no version segment found",
            InvalidReason::InvalidName => "provider name must be [A-Za-z0-9_]+",
            InvalidReason::InvalidArch => "arch must be [A-Za-z0-9_]+",
        };
        f.write_str(text)
    }
}

/// Result of structurally parsing a filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedFilename {
    Parsed(ArchiveName),
    Invalid(InvalidReason),
}

/// Parse `filename` against `<prefix>-<name>_<version>_<arch><ext>`.
///
/// Only the structure is checked here; the extension is returned as-is.
pub fn parse_filename(prefix: &str, filename: &str) -> ParsedFilename {
    let Some(rest) = filename
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
    else {
        return ParsedFilename::Invalid(InvalidReason::MissingPrefix);
    };

    let (stem, extension) = split_extension(rest);
    let segments: Vec<&str> = stem.split('_').collect();
    if segments.len() < 3 {
        return ParsedFilename::Invalid(InvalidReason::MissingSegments);
    }

    // Version sits between a non-empty name and a non-empty arch.
    let candidates: Vec<usize> = (1..segments.len() - 1)
        .rev()
        .filter(|&i| is_version(segments[i]))
        .collect();
    let Some(&rightmost) = candidates.first() else {
        return ParsedFilename::Invalid(InvalidReason::MissingVersion);
    };

    let split_at = |i: usize| (segments[..i].join("_"), segments[i + 1..].join("_"));
    let found = candidates.iter().find_map(|&i| {
        let (provider, arch) = split_at(i);
        (is_word(&provider) && is_word(&arch)).then_some((i, provider, arch))
    });
    let Some((split, provider, arch)) = found else {
        let (provider, _) = split_at(rightmost);
        let reason = if is_word(&provider) {
            InvalidReason::InvalidArch
        } else {
            InvalidReason::InvalidName
        };
        return ParsedFilename::Invalid(reason);
    };

    ParsedFilename::Parsed(ArchiveName {
        provider,
        version: segments[split].to_string(),
        arch,
        extension: extension.to_string(),
    })
}

/// Parse and validate an uploaded filename for a provider of type `expected_type`.
///
/// Checks run in order: structure, provider name, extension.
pub fn parse_archive_filename(
    prefix: &str,
    filename: &str,
    expected_type: &str,
) -> Result<ArchiveName> {
    let name = match parse_filename(prefix, filename) {
        ParsedFilename::Parsed(name) => name,
        ParsedFilename::Invalid(reason) => {
            return Err(RegistryError::MalformedFilename {
                filename: filename.to_string(),
                reason: reason.to_string(),
            })
        }
    };

    if name.provider != expected_type {
        return Err(RegistryError::NameMismatch {
            expected: expected_type.to_string(),
            found: name.provider,
        });
    }

    if !name.is_zip() {
        return Err(RegistryError::UnsupportedMediaType {
            filename: filename.to_string(),
            extension: name.extension,
        });
    }

    Ok(name)
}

/// Whether `filename` is a stored archive: well-formed and ending in `.zip`.
pub fn is_archive_filename(prefix: &str, filename: &str) -> bool {
    matches!(parse_filename(prefix, filename), ParsedFilename::Parsed(name) if name.is_zip())
}

/// Whether `s` is dot-separated decimal components (`1`, `1.2`, `0.12.31`).
pub fn is_version(s: &str) -> bool {
    !s.is_empty()
        && s
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

fn is_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split trailing `.ext` groups (`.zip`, `.tar.gz`) off the stem.
///
/// An extension group is alphanumeric; the dots inside the version are
/// always followed by `_<arch>` and so are never taken.
fn split_extension(s: &str) -> (&str, &str) {
    let mut stem = s;
    while let Some(dot) = stem.rfind('.') {
        let tail = &stem[dot + 1..];
        if tail.is_empty() || !tail.chars().all(|c| c.is_ascii_alphanumeric()) {
            break;
        }
        stem = &stem[..dot];
    }
    (stem, &s[stem.len()..])
}
