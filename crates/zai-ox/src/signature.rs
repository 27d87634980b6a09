//! Request signing for the Z.ai backend.
//!
//! The backend checks `X-Signature` against a two-stage HMAC-SHA256: a key
//! derived from the current 5-minute window signs
//! `{t}|{base64(e)}|{r}`. Every encoding step is significant; the derived key
//! is used as its lowercase hex *text*, not as raw bytes.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// Static secret the window key is derived from
const SIGNING_SECRET: &[u8] = b"key-@@@@)))()((9))-xxxx&&&%%%%%";

/// Width of a signing window in milliseconds
pub const BUCKET_MS: i64 = 5 * 60 * 1000;

/// Signature plus the timestamp it was computed for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Lowercase hex HMAC
    pub signature: String,
    /// Millisecond timestamp, echoed back as `signature_timestamp`
    pub timestamp: i64,
}

/// Signing window a millisecond timestamp falls into (floor division)
#[must_use]
pub fn time_bucket(timestamp_ms: i64) -> i64 {
    timestamp_ms.div_euclid(BUCKET_MS)
}

/// Lowercase hex key for the window containing `timestamp_ms`
#[must_use]
pub fn intermediate_key(timestamp_ms: i64) -> String {
    hmac_hex(SIGNING_SECRET, time_bucket(timestamp_ms).to_string().as_bytes())
}

/// Sign transaction `t` and message `e` at millisecond timestamp `r`.
#[must_use]
pub fn sign(t: &str, e: &str, r: i64) -> Signature {
    let message = format!("{t}|{}|{r}", STANDARD.encode(e.as_bytes()));
    let key = intermediate_key(r);

    Signature {
        signature: hmac_hex(key.as_bytes(), message.as_bytes()),
        timestamp: r,
    }
}

/// Lowercase hex HMAC-SHA256 of `data` under `key`
#[allow(clippy::expect_used)]
fn hmac_hex(key: &[u8], data: &[u8]) -> String {
    // keys longer than the block size are hashed, shorter ones padded
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts keys of any length");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSACTION: &str = "requestId,eef12d6c-6dc9-47a0-aae8-b9f3454f98c5,timestamp,1761038714733,user_id,21ea9ec3-e492-4dbb-b522-fc0eaf64f0f6";
    const R: i64 = 1_761_038_714_733;

    #[test]
    fn golden_vector() {
        let sig = sign("hi", TRANSACTION, R);
        assert_eq!(
            sig.signature,
            "ccbe22917cc8197ce471f71b76f41eecfeafdfd45af043f074c56b81365a3a03"
        );
        assert_eq!(sig.timestamp, R);
    }

    #[test]
    fn golden_vector_with_arguments_swapped() {
        // t and e are not interchangeable: only e is base64 encoded
        let sig = sign(TRANSACTION, "hi", R);
        assert_eq!(
            sig.signature,
            "e1939c1a60c96c6ef2441cbbf09e72bc0d4895db7722410950be7822eb8ee71c"
        );
    }

    #[test]
    fn encodes_message_as_utf8_before_base64() {
        let sig = sign("t", "héllo 你好", 0);
        assert_eq!(
            sig.signature,
            "d52fcffff56c7bdedd6bd2a7e781a8d4143ab9ea102ef3d9e8f25e9759d82953"
        );
    }

    #[test]
    fn intermediate_key_for_known_window() {
        assert_eq!(time_bucket(R), 5_870_129);
        assert_eq!(
            intermediate_key(R),
            "ff9d452f4a51fa3ac447e49502dcada0538c4aaa1b8301d0118bc73fcafcc655"
        );
    }

    #[test]
    fn deterministic() {
        assert_eq!(sign("a", "b", R), sign("a", "b", R));
    }

    #[test]
    fn key_is_stable_inside_a_window() {
        assert_eq!(intermediate_key(R - 1), intermediate_key(R));
        assert_eq!(intermediate_key(R + 1), intermediate_key(R));

        let window_start = time_bucket(R) * BUCKET_MS;
        assert_eq!(intermediate_key(window_start), intermediate_key(window_start + BUCKET_MS - 1));
    }

    #[test]
    fn key_changes_across_window_boundary() {
        let window_start = time_bucket(R) * BUCKET_MS;
        assert_ne!(intermediate_key(window_start - 1), intermediate_key(window_start));
        assert_ne!(intermediate_key(R), intermediate_key(R + BUCKET_MS));
        assert_ne!(intermediate_key(R), intermediate_key(R - BUCKET_MS));
    }

    #[test]
    fn signature_depends_on_timestamp_inside_window() {
        // same key, different message suffix
        assert_ne!(sign("hi", "x", R).signature, sign("hi", "x", R + 1).signature);
    }

    #[test]
    fn hmac_accepts_any_key_length() {
        assert_eq!(hmac_hex(b"", b"x").len(), 64);

        // RFC 4231 test case 6: key longer than the block size
        assert_eq!(
            hmac_hex(&[0xaa; 131], b"Test Using Larger Than Block-Size Key - Hash Key First"),
            "60e431591ee0b67f0d8a26aacbf5b77f8e0bc6213728c5140546040f0ee37f54"
        );
    }
}
