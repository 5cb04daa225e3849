//! Base64 helpers for x402 header payloads.
//!
//! Both the V2 `Payment-Required` challenge header and the payment proof
//! headers carry base64-encoded JSON.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD as b64, URL_SAFE_NO_PAD as b64_url};
use std::borrow::Cow;
use std::fmt::Display;

/// Bytes holding base64 text.
///
/// ```rust
/// use x402_types::util::Base64Bytes;
///
/// let encoded = Base64Bytes::encode(b"hello world");
/// assert_eq!(encoded.to_string(), "aGVsbG8gd29ybGQ=");
/// assert_eq!(encoded.decode().unwrap(), b"hello world");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes<'a>(pub Cow<'a, [u8]>);

impl Base64Bytes<'_> {
    /// Decodes to raw bytes.
    ///
    /// Standard padded base64 is what the protocol specifies; unpadded
    /// URL-safe text is accepted as a fallback since some servers emit it.
    /// Surrounding whitespace is ignored.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        let trimmed = self.0.trim_ascii();
        b64.decode(trimmed).or_else(|err| {
            let unpadded = trimmed.strip_suffix(b"==").or(trimmed.strip_suffix(b"="));
            b64_url.decode(unpadded.unwrap_or(trimmed)).map_err(|_| err)
        })
    }

    pub fn encode<T: AsRef<[u8]>>(input: T) -> Base64Bytes<'static> {
        let encoded = b64.encode(input.as_ref());
        Base64Bytes(Cow::Owned(encoded.into_bytes()))
    }
}

impl AsRef<[u8]> for Base64Bytes<'_> {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl<'a> From<&'a [u8]> for Base64Bytes<'a> {
    fn from(slice: &'a [u8]) -> Self {
        Base64Bytes(Cow::Borrowed(slice))
    }
}

impl Display for Base64Bytes<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.0.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_accepts_url_safe_unpadded() {
        let raw = [0xfbu8, 0xff, 0xfe];
        let url_safe = b64_url.encode(raw);
        assert_eq!(
            Base64Bytes::from(url_safe.as_bytes()).decode().unwrap(),
            raw
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Base64Bytes::from(&b"%%% not base64 %%%"[..]).decode().is_err());
    }

    #[test]
    fn test_decode_ignores_surrounding_whitespace() {
        let decoded = Base64Bytes::from(&b"  e30=\n"[..]).decode().unwrap();
        assert_eq!(decoded, b"{}");
    }
}
