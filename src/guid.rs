//! Client GUID generation.
//!
//! An SRS GUID is the URL-safe base64 encoding of 16 random bytes with
//! trailing `=` padding removed, which works out to exactly 22 ASCII bytes.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

/// Length in bytes of a wire-format GUID.
pub const GUID_LEN: usize = 22;

/// Generate a new, random 22-character client GUID.
pub fn make_short_guid() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    let guid = URL_SAFE_NO_PAD.encode(bytes);
    debug_assert_eq!(guid.len(), GUID_LEN);
    guid
}
