//! HMAC-SHA256 auth-frame signing, per spec.md §4.10.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes the hex-encoded signature over `call_id || "." || timestamp`.
pub fn sign(secret: &[u8], call_id: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(format!("{call_id}.{timestamp}").as_bytes());
    mac.finalize().into_bytes().iter().map(|b| format!("{b:02x}")).collect()
}
