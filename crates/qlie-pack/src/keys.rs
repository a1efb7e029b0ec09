//! External key material for the keyed payload cipher.
//!
//! Two buffers can parameterize decryption: `key1`, the raw contents of a
//! user-supplied key file, and `key2`, 256 bytes embedded in the game
//! executable behind a fixed signature. The selected [`EncryptionMode`]
//! decides which buffers must be present; that is validated up front, before
//! any payload bytes are touched.

use memchr::memmem;

use crate::crypto::EncryptionMode;
use crate::{Error, Result};

/// Signature preceding the embedded key in the game executable.
const EXE_KEY_SIGNATURE: &[u8] = b"\x05TIcon\x00";

/// Length of the executable-embedded key.
const EXE_KEY_LEN: usize = 256;

/// Immutable key material plus the encryption mode it implies.
#[derive(Debug, Clone, Default)]
pub struct KeyMaterial {
    mode: EncryptionMode,
    key1: Vec<u8>,
    key2: Vec<u8>,
}

impl KeyMaterial {
    /// No external keys; entries decrypt with the basic cipher.
    pub fn basic() -> Self {
        Self::default()
    }

    /// Use the contents of a key file (`--fkey`).
    pub fn with_file_key(key1: Vec<u8>) -> Self {
        Self {
            mode: EncryptionMode::WithFileKey,
            key1,
            key2: Vec::new(),
        }
    }

    /// Use a key file plus the key embedded in the game executable
    /// (`--game-exe`).
    ///
    /// The executable image is scanned backwards for the key signature; the
    /// 256 bytes starting at the signature's final byte form `key2`. A
    /// missing signature is a configuration fault.
    pub fn with_game_exe(key1: Vec<u8>, exe_image: &[u8]) -> Result<Self> {
        let key2 = extract_exe_key(exe_image)?;
        Ok(Self {
            mode: EncryptionMode::WithExecutableKey,
            key1,
            key2,
        })
    }

    /// The encryption mode implied by the loaded keys.
    #[inline]
    pub fn mode(&self) -> EncryptionMode {
        self.mode
    }

    #[inline]
    pub fn key1(&self) -> &[u8] {
        &self.key1
    }

    #[inline]
    pub fn key2(&self) -> &[u8] {
        &self.key2
    }

    /// Validate that every buffer the mode requires is present.
    pub fn validate(&self) -> Result<()> {
        match self.mode {
            EncryptionMode::Basic => Ok(()),
            EncryptionMode::WithFileKey => {
                if self.key1.is_empty() {
                    return Err(Error::MissingKeyMaterial("file key (key1) is empty"));
                }
                Ok(())
            }
            EncryptionMode::WithExecutableKey => {
                if self.key1.is_empty() {
                    return Err(Error::MissingKeyMaterial(
                        "executable-key mode also requires a file key (key1)",
                    ));
                }
                if self.key2.is_empty() {
                    return Err(Error::MissingKeyMaterial("executable key (key2) is empty"));
                }
                Ok(())
            }
        }
    }
}

/// Locate the embedded key in an executable image.
fn extract_exe_key(exe_image: &[u8]) -> Result<Vec<u8>> {
    let pos = memmem::rfind(exe_image, EXE_KEY_SIGNATURE).ok_or(Error::KeyNotFound)?;

    // The key starts at the signature's last byte (the NUL is shared).
    let start = pos + EXE_KEY_SIGNATURE.len() - 1;
    let end = start + EXE_KEY_LEN;
    if end > exe_image.len() {
        return Err(Error::KeyNotFound);
    }
    Ok(exe_image[start..end].to_vec())
}
