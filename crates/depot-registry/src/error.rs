//! Registry error types.

use std::path::PathBuf;

/// Errors that can occur during registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Uploaded filename does not follow `<prefix>-<name>_<version>_<arch>.zip`.
    #[error("malformed archive filename '{filename}': {reason}")]
    MalformedFilename { filename: String, reason: String },

    /// Provider name in the filename differs from the target path's type.
    #[error("provider name '{found}' does not match upload path type '{expected}'")]
    NameMismatch { expected: String, found: String },

    /// Archive is not a `.zip`.
    #[error("unsupported archive format '{extension}' for '{filename}', expected .zip")]
    UnsupportedMediaType { filename: String, extension: String },

    /// A path segment would escape its directory or contains unsafe characters.
    #[error("invalid path segment '{segment}': {reason}")]
    InvalidSegment { segment: String, reason: String },

    /// No archive is indexed for this version/arch.
    #[error("no archive for {provider} version {version} arch {arch}")]
    ArchiveNotFound {
        provider: String,
        version: String,
        arch: String,
    },

    /// The version has no archive index.
    #[error("version {version} not found for {provider}")]
    VersionNotFound { provider: String, version: String },

    /// The indexed archive file is not present on disk.
    #[error("archive file '{filename}' not found under {provider}")]
    ArchiveFileMissing { provider: String, filename: String },

    /// An index document exists but does not have the expected shape.
    #[error("corrupt index document {path}: {source}")]
    CorruptIndex {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Writing a document or archive failed.
    #[error("failed to write {path}: {source}")]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading, listing or removing on-disk state failed.
    #[error("storage I/O error at {path}: {source}")]
    StorageIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid registry configuration.
    #[error("invalid configuration: {detail}")]
    Config { detail: String },
}

/// Classification of a [`RegistryError`], used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedFilename,
    NameMismatch,
    UnsupportedMediaType,
    InvalidSegment,
    NotFound,
    CorruptIndex,
    StorageWrite,
    StorageIo,
    Config,
}

impl ErrorKind {
    /// HTTP status code the transport layer answers with.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::MalformedFilename | ErrorKind::NameMismatch | ErrorKind::InvalidSegment => {
                400
            }
            ErrorKind::UnsupportedMediaType => 415,
            ErrorKind::NotFound => 404,
            ErrorKind::CorruptIndex
            | ErrorKind::StorageWrite
            | ErrorKind::StorageIo
            | ErrorKind::Config => 500,
        }
    }

    /// Whether this is a caller error detected before any mutation.
    pub fn is_validation(self) -> bool {
        matches!(
            self,
            ErrorKind::MalformedFilename
                | ErrorKind::NameMismatch
                | ErrorKind::UnsupportedMediaType
                | ErrorKind::InvalidSegment
        )
    }
}

impl RegistryError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::MalformedFilename { .. } => ErrorKind::MalformedFilename,
            RegistryError::NameMismatch { .. } => ErrorKind::NameMismatch,
            RegistryError::UnsupportedMediaType { .. } => ErrorKind::UnsupportedMediaType,
            RegistryError::InvalidSegment { .. } => ErrorKind::InvalidSegment,
            RegistryError::ArchiveNotFound { .. }
            | RegistryError::VersionNotFound { .. }
            | RegistryError::ArchiveFileMissing { .. } => ErrorKind::NotFound,
            RegistryError::CorruptIndex { .. } => ErrorKind::CorruptIndex,
            RegistryError::StorageWrite { .. } => ErrorKind::StorageWrite,
            RegistryError::StorageIo { .. } => ErrorKind::StorageIo,
            RegistryError::Config { .. } => ErrorKind::Config,
        }
    }

    /// Shorthand for `self.kind().status_code()`.
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RegistryError::StorageWrite {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RegistryError::StorageIo {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        let err = RegistryError::NameMismatch {
            expected: "foo".into(),
            found: "bar".into(),
        };
        assert_eq!(err.status_code(), 400);

        let err = RegistryError::UnsupportedMediaType {
            filename: "x.tar.gz".into(),
            extension: ".tar.gz".into(),
        };
        assert_eq!(err.status_code(), 415);

        let err = RegistryError::ArchiveFileMissing {
            provider: "h/n/t".into(),
            filename: "f.zip".into(),
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.status_code(), 404);

        let err = RegistryError::io("/tmp/x", std::io::Error::other("boom"));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn validation_kinds() {
        assert!(ErrorKind::MalformedFilename.is_validation());
        assert!(ErrorKind::InvalidSegment.is_validation());
        assert!(!ErrorKind::NotFound.is_validation());
        assert!(!ErrorKind::StorageWrite.is_validation());
    }

    #[test]
    fn messages_name_the_offender() {
        let err = RegistryError::MalformedFilename {
            filename: "junk.zip".into(),
            reason: "missing prefix".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("junk.zip"));
        assert!(msg.contains("missing prefix"));
    }
}
