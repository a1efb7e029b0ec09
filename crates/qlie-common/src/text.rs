//! Legacy text-encoding conversion.
//!
//! PACK archives store entry names in CP932 (Windows Shift-JIS). Conversion
//! to UTF-8 is delegated to `encoding_rs`; undecodable sequences are replaced
//! rather than rejected, since a garbled name must not abort extraction.

use encoding_rs::SHIFT_JIS;

/// Decode CP932 bytes to a UTF-8 string.
///
/// Invalid sequences are replaced with U+FFFD.
pub fn decode_cp932(bytes: &[u8]) -> String {
    let (decoded, _, _) = SHIFT_JIS.decode(bytes);
    decoded.into_owned()
}
