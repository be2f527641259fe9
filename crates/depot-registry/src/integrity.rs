//! Archive hashing.
//!
//! Uploaded archives are hashed with SHA-256 while they stream to disk. The
//! digest is recorded in the archive index as `zh:<hex>`, the zip-hash scheme
//! provider mirrors publish.

use std::io::{self, Read, Write};

use sha2::{Digest, Sha256};

/// Scheme prefix for a SHA-256 of the zip file.
pub const ZIP_HASH_SCHEME: &str = "zh:";

/// Lowercase hex SHA-256 of an archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash everything `reader` yields.
    pub fn read_from(reader: &mut impl Read) -> io::Result<Self> {
        let mut writer = HashingWriter::new(io::sink());
        io::copy(reader, &mut writer)?;
        Ok(writer.finish().1)
    }

    pub fn hex(&self) -> &str {
        &self.0
    }

    pub fn into_hex(self) -> String {
        self.0
    }

    /// `zh:<hex>` form stored in archive entries.
    pub fn zip_hash(&self) -> String {
        format!("{ZIP_HASH_SCHEME}{}", self.0)
    }

    /// Parse a `zh:<hex>` string. Other schemes yield `None`.
    pub fn parse_zip_hash(s: &str) -> Option<Self> {
        let hex = s.strip_prefix(ZIP_HASH_SCHEME)?;
        (hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()))
            .then(|| ContentHash(hex.to_ascii_lowercase()))
    }
}

/// Writer adapter that hashes and counts every byte passed through.
pub struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        HashingWriter {
            inner,
            hasher: Sha256::new(),
            written: 0,
        }
    }

    /// Return the inner writer, the digest and the byte count.
    pub fn finish(self) -> (W, ContentHash, u64) {
        let hash = ContentHash(format!("{:x}", self.hasher.finalize()));
        (self.inner, hash, self.written)
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
