//! PACK archive reader.
//!
//! Layout: payloads first, then the file table, then a 0x1c-byte trailer
//! holding the version magic, entry count and table offset. The table is
//! decoded from a private scratch region so that name decryption never
//! disturbs payload offsets.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use qlie_common::{text, BinaryReader};

use crate::classify;
use crate::crypto::{self, EncryptionMode};
use crate::decompress;
use crate::entry::{OutputFile, PackEntry};
use crate::keys::KeyMaterial;
use crate::{Error, Result};

/// Size of the trailing magic + header region.
const TRAILER_LEN: usize = 0x1C;

/// Trailing version magics, in version order.
const VERSION_MAGICS: [&[u8; 16]; 3] = [
    b"FilePackVer1.0\x00\x00",
    b"FilePackVer2.0\x00\x00",
    b"FilePackVer3.0\x00\x00",
];

/// Fixed per-entry bytes following the variable-length name.
const ENTRY_FIXED_LEN: usize = 28;

/// Bytes of the seed-derivation window.
const SEED_WINDOW_LEN: usize = 256;

/// A PACK archive opened for reading.
pub struct PackArchive {
    /// Memory-mapped file data.
    mmap: Mmap,
    /// Archive file name.
    name: String,
    /// Detected format version (always 3 once opened).
    version: u32,
    /// Decoded file table, in on-disk order.
    entries: Vec<PackEntry>,
}

impl PackArchive {
    /// Open a PACK archive and decode its file table.
    ///
    /// Versions 1 and 2 are recognized but rejected with
    /// [`Error::UnsupportedVersion`]; their table layout is not known.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let version = sniff_version(&mmap)?;
        if version != 3 {
            return Err(Error::UnsupportedVersion(version));
        }

        let entries = parse_table(&mmap)?;

        Ok(Self {
            mmap,
            name,
            version,
            entries,
        })
    }

    /// Get the archive file name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the detected format version.
    #[inline]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Get the decoded file table, in on-disk order.
    #[inline]
    pub fn entries(&self) -> &[PackEntry] {
        &self.entries
    }

    /// Get the number of entries.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Read one entry's payload, decrypted and decompressed.
    ///
    /// Key material is validated against its mode before any payload bytes
    /// are touched.
    pub fn read_entry(&self, entry: &PackEntry, keys: &KeyMaterial) -> Result<Vec<u8>> {
        let offset = entry.offset as usize;
        let end = offset
            .checked_add(entry.compressed_size as usize)
            .filter(|&e| e <= self.mmap.len())
            .ok_or_else(|| {
                Error::InvalidTable(format!(
                    "entry {:?} extends past the end of the archive",
                    entry.name
                ))
            })?;

        let mut data = self.mmap[offset..end].to_vec();

        if entry.is_encrypted {
            keys.validate()?;
            match keys.mode() {
                EncryptionMode::Basic => crypto::decrypt_basic(&mut data, entry.seed),
                mode => crypto::decrypt_keyed(
                    &mut data,
                    entry.seed,
                    mode,
                    &entry.raw_name,
                    keys.key1(),
                    keys.key2(),
                ),
            }
        }

        if entry.is_compressed {
            return decompress::decompress(&data, entry.original_size as usize);
        }

        if data.len() < entry.original_size as usize {
            return Err(Error::SizeMismatch {
                declared: data.len() as u64,
                expected: entry.original_size as u64,
            });
        }
        data.truncate(entry.original_size as usize);
        Ok(data)
    }

    /// Read one entry and classify the result into output files.
    ///
    /// Nested containers are unpacked recursively; anything unrecognized
    /// comes back as a single leaf file.
    pub fn extract_entry(&self, entry: &PackEntry, keys: &KeyMaterial) -> Result<Vec<OutputFile>> {
        let data = self.read_entry(entry, keys)?;
        let mut out = Vec::new();
        classify::classify(&entry.name, data, &mut out);
        Ok(out)
    }

    /// Parallel extraction of all entries.
    ///
    /// Entries share no mutable state, so cross-entry parallelism is safe;
    /// the callback receives results in whatever order workers finish.
    #[cfg(feature = "parallel")]
    pub fn extract_parallel<F>(&self, keys: &KeyMaterial, mut callback: F)
    where
        F: FnMut(&PackEntry, Result<Vec<OutputFile>>) + Send,
    {
        use rayon::prelude::*;
        use std::sync::Mutex;

        let callback = Mutex::new(&mut callback);

        self.entries.par_iter().for_each(|entry| {
            let result = self.extract_entry(entry, keys);
            callback.lock().unwrap()(entry, result);
        });
    }
}

impl std::fmt::Debug for PackArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackArchive")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Match the trailing magic against the known format versions.
fn sniff_version(data: &[u8]) -> Result<u32> {
    if data.len() < TRAILER_LEN {
        return Err(Error::NotPackArchive);
    }

    let magic = &data[data.len() - TRAILER_LEN..data.len() - TRAILER_LEN + 16];
    for (i, candidate) in VERSION_MAGICS.iter().enumerate() {
        if magic == *candidate {
            return Ok(i as u32 + 1);
        }
    }
    Err(Error::NotPackArchive)
}

/// Decode the version-3 file table.
fn parse_table(data: &[u8]) -> Result<Vec<PackEntry>> {
    let trailer_start = data.len() - TRAILER_LEN;
    let mut trailer = BinaryReader::new_at(data, trailer_start + 16);
    let file_count = trailer.read_u32()? as usize;
    let table_offset = trailer.read_u64()? as usize;

    if table_offset > trailer_start {
        return Err(Error::InvalidTable(format!(
            "table offset {table_offset:#x} past trailer at {trailer_start:#x}"
        )));
    }
    let table = &data[table_offset..trailer_start];

    let seed = derive_shared_seed(table, file_count)?;

    let mut reader = BinaryReader::new(table);
    let mut entries = Vec::with_capacity(file_count);
    let mut payload_total: u64 = 0;

    for _ in 0..file_count {
        let name_len = reader.read_u16()? as usize;
        let mut raw_name = reader.read_bytes(name_len)?.to_vec();
        crypto::crypt_name(&mut raw_name, seed);
        let name = text::decode_cp932(&raw_name);

        let offset = reader.read_u64()?;
        let compressed_size = reader.read_u32()?;
        let original_size = reader.read_u32()?;
        let is_compressed = reader.read_u32()? > 0;
        let is_encrypted = reader.read_u32()? > 0;
        // Versions with a per-entry seed field are not supported; for
        // version 3 this slot is unused and the shared seed applies.
        reader.skip(4);

        payload_total += compressed_size as u64;
        entries.push(PackEntry {
            raw_name,
            name,
            offset,
            compressed_size,
            original_size,
            is_compressed,
            is_encrypted,
            seed,
        });
    }

    if payload_total > data.len() as u64 {
        return Err(Error::InvalidTable(format!(
            "payload sizes sum to {payload_total} bytes in a {} byte archive",
            data.len()
        )));
    }

    Ok(entries)
}

/// Locate the seed window in the undecrypted table and derive the 28-bit
/// seed shared by every version-3 entry.
fn derive_shared_seed(table: &[u8], file_count: usize) -> Result<u32> {
    let mut reader = BinaryReader::new(table);
    for _ in 0..file_count {
        let name_len = reader.read_u16()? as usize;
        reader.skip(name_len + ENTRY_FIXED_LEN);
    }
    reader.skip(28);
    let block_len = reader.read_u32()? as usize;
    reader.skip(block_len);
    reader.skip(36);

    let window = reader.read_bytes(SEED_WINDOW_LEN)?;
    Ok(crypto::derive_table_seed(window) & 0x0FFF_FFFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{derive_table_seed, encrypt_basic};
    use std::path::PathBuf;

    struct FixtureEntry {
        name: &'static [u8],
        stored: Vec<u8>,
        original_size: u32,
        is_compressed: bool,
        is_encrypted: bool,
    }

    /// Assemble a minimal version-3 archive: payloads, table, trailer.
    fn build_archive(entries: &[FixtureEntry]) -> (Vec<u8>, u32) {
        // Seed window: arbitrary but fixed content.
        let window: Vec<u8> = (0..SEED_WINDOW_LEN).map(|i| (i * 7 + 3) as u8).collect();
        let seed = derive_table_seed(&window) & 0x0FFF_FFFF;

        let mut payloads = Vec::new();
        let mut rows = Vec::new();
        for entry in entries {
            let offset = payloads.len() as u64;
            payloads.extend_from_slice(&entry.stored);

            let mut name = entry.name.to_vec();
            crypto::crypt_name(&mut name, seed);

            let mut row = Vec::new();
            row.extend_from_slice(&(name.len() as u16).to_le_bytes());
            row.extend_from_slice(&name);
            row.extend_from_slice(&offset.to_le_bytes());
            row.extend_from_slice(&(entry.stored.len() as u32).to_le_bytes());
            row.extend_from_slice(&entry.original_size.to_le_bytes());
            row.extend_from_slice(&u32::to_le_bytes(entry.is_compressed as u32));
            row.extend_from_slice(&u32::to_le_bytes(entry.is_encrypted as u32));
            row.extend_from_slice(&[0u8; 4]); // per-entry seed slot, unused
            rows.push(row);
        }

        let table_offset = payloads.len() as u64;
        let mut archive = payloads;
        for row in rows {
            archive.extend_from_slice(&row);
        }
        archive.extend_from_slice(&[0u8; 28]);
        archive.extend_from_slice(&0u32.to_le_bytes()); // variable block length
        archive.extend_from_slice(&[0u8; 36]);
        archive.extend_from_slice(&window);

        archive.extend_from_slice(b"FilePackVer3.0\x00\x00");
        archive.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        archive.extend_from_slice(&table_offset.to_le_bytes());
        (archive, seed)
    }

    fn write_archive(test: &str, bytes: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "qlie-pack-{}-{}.pack",
            test,
            std::process::id()
        ));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    /// One compressed block: identity dictionary, all literal symbols.
    fn compress_stored(data: &[u8]) -> Vec<u8> {
        let mut out = b"1PC\xff".to_vec();
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&[0xFF, 0xFF]);
        out.extend_from_slice(&(data.len() as u16).to_le_bytes());
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn test_sniff_version() {
        let (archive, _) = build_archive(&[]);
        assert_eq!(sniff_version(&archive).unwrap(), 3);

        let mut v1 = archive.clone();
        let at = v1.len() - TRAILER_LEN..v1.len() - TRAILER_LEN + 16;
        v1[at].copy_from_slice(b"FilePackVer1.0\x00\x00");
        assert_eq!(sniff_version(&v1).unwrap(), 1);

        assert!(matches!(
            sniff_version(&[0u8; 64]),
            Err(Error::NotPackArchive)
        ));
        assert!(matches!(sniff_version(&[]), Err(Error::NotPackArchive)));
    }

    #[test]
    fn test_unsupported_version_is_fatal() {
        let (mut archive, _) = build_archive(&[]);
        let start = archive.len() - TRAILER_LEN;
        archive[start..start + 16].copy_from_slice(b"FilePackVer2.0\x00\x00");
        let path = write_archive("v2", &archive);

        assert!(matches!(
            PackArchive::open(&path),
            Err(Error::UnsupportedVersion(2))
        ));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_plain_entry_round_trip() {
        let payload = b"hello from inside the archive".to_vec();
        let (archive, _) = build_archive(&[FixtureEntry {
            name: b"data\\greeting.txt",
            stored: payload.clone(),
            original_size: payload.len() as u32,
            is_compressed: false,
            is_encrypted: false,
        }]);
        let path = write_archive("plain", &archive);

        let pack = PackArchive::open(&path).unwrap();
        assert_eq!(pack.version(), 3);
        assert_eq!(pack.entry_count(), 1);

        let entry = &pack.entries()[0];
        assert_eq!(entry.name, "data\\greeting.txt");
        assert!(!entry.is_encrypted);

        let data = pack.read_entry(entry, &KeyMaterial::basic()).unwrap();
        assert_eq!(data, payload);

        let files = pack.extract_entry(entry, &KeyMaterial::basic()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].data, payload);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_compressed_entry() {
        let original = b"abcabcabc-compress-me".to_vec();
        let (archive, _) = build_archive(&[FixtureEntry {
            name: b"script.s",
            stored: compress_stored(&original),
            original_size: original.len() as u32,
            is_compressed: true,
            is_encrypted: false,
        }]);
        let path = write_archive("compressed", &archive);

        let pack = PackArchive::open(&path).unwrap();
        let data = pack
            .read_entry(&pack.entries()[0], &KeyMaterial::basic())
            .unwrap();
        assert_eq!(data, original);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_encrypted_entry_basic_mode() {
        // Seed is derived from the fixed window, so precompute it to build
        // the ciphertext.
        let (_, seed) = build_archive(&[]);

        let original = (0u8..64).collect::<Vec<u8>>();
        let mut stored = original.clone();
        encrypt_basic(&mut stored, seed);

        let (archive, _) = build_archive(&[FixtureEntry {
            name: b"secret.bin",
            stored,
            original_size: original.len() as u32,
            is_compressed: false,
            is_encrypted: true,
        }]);
        let path = write_archive("encrypted", &archive);

        let pack = PackArchive::open(&path).unwrap();
        let data = pack
            .read_entry(&pack.entries()[0], &KeyMaterial::basic())
            .unwrap();
        assert_eq!(data, original);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_encrypted_entry_wrong_seed_garbles() {
        let (_, seed) = build_archive(&[]);

        let original = (0u8..64).collect::<Vec<u8>>();
        let mut stored = original.clone();
        // Off-by-one seed: decryption with the archive's real seed must not
        // reproduce the original bytes.
        encrypt_basic(&mut stored, seed.wrapping_add(1));

        let (archive, _) = build_archive(&[FixtureEntry {
            name: b"secret.bin",
            stored,
            original_size: original.len() as u32,
            is_compressed: false,
            is_encrypted: true,
        }]);
        let path = write_archive("wrong-seed", &archive);

        let pack = PackArchive::open(&path).unwrap();
        let data = pack
            .read_entry(&pack.entries()[0], &KeyMaterial::basic())
            .unwrap();
        assert_ne!(data, original);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_encrypted_entry_requires_keys() {
        let original = vec![0u8; 32];
        let (archive, _) = build_archive(&[FixtureEntry {
            name: b"locked.bin",
            stored: original.clone(),
            original_size: original.len() as u32,
            is_compressed: false,
            is_encrypted: true,
        }]);
        let path = write_archive("needs-keys", &archive);

        let pack = PackArchive::open(&path).unwrap();
        let keys = KeyMaterial::with_file_key(Vec::new());
        assert!(matches!(
            pack.read_entry(&pack.entries()[0], &keys),
            Err(Error::MissingKeyMaterial(_))
        ));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_entry_past_end_is_table_fault() {
        let (mut archive, _) = build_archive(&[FixtureEntry {
            name: b"a",
            stored: vec![1, 2, 3, 4],
            original_size: 4,
            is_compressed: false,
            is_encrypted: false,
        }]);
        // Corrupt the stored size field: name row starts right after the
        // 4-byte payload; offset(8) follows len(2)+name(1).
        let size_at = 4 + 2 + 1 + 8;
        archive[size_at..size_at + 4].copy_from_slice(&u32::MAX.to_le_bytes());

        let path = write_archive("oob", &archive);
        match PackArchive::open(&path) {
            Err(Error::InvalidTable(_)) => {}
            other => panic!("expected InvalidTable, got {other:?}"),
        }
        std::fs::remove_file(path).ok();
    }
}
