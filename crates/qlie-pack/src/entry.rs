//! PACK archive entry.

use std::path::PathBuf;

/// An entry (file) within a PACK archive.
///
/// This is the decoded table row: metadata only, not the file data itself.
/// Use [`PackArchive::read_entry`](crate::PackArchive::read_entry) to get
/// the contents.
#[derive(Debug, Clone)]
pub struct PackEntry {
    /// Entry name before codepage conversion, exactly as stored (decrypted).
    ///
    /// The keyed cipher hashes these raw bytes, so they must be kept even
    /// after conversion to UTF-8.
    pub raw_name: Vec<u8>,
    /// Entry name converted from CP932 to UTF-8.
    pub name: String,
    /// Offset of the payload within the archive.
    pub offset: u64,
    /// Payload size as stored (possibly compressed/encrypted).
    pub compressed_size: u32,
    /// Size after decompression.
    pub original_size: u32,
    /// Whether the payload is compressed.
    pub is_compressed: bool,
    /// Whether the payload is encrypted.
    pub is_encrypted: bool,
    /// Decryption seed (shared per archive for version 3).
    pub seed: u32,
}

/// A file produced by extraction: either a leaf blob or a piece of a nested
/// container. Ownership passes to the output sink on emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub name: String,
    pub data: Vec<u8>,
}

impl OutputFile {
    /// Get the relative output path for writing to disk.
    ///
    /// Names use Windows separators; normalize for the local platform.
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(self.name.replace('\\', "/"))
    }
}
