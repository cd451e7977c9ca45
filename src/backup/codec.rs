//! Payload compression for string-valued stores.
//!
//! Payloads are gzipped, then base64-encoded so the blob is a plain string.

use std::io::{self, Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// Gzip `bytes` and encode the result as base64.
///
/// # Errors
///
/// Returns an error if the encoder fails.
pub fn compress(bytes: &[u8]) -> io::Result<String> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    let gz = encoder.finish()?;
    Ok(STANDARD.encode(gz))
}

/// Reverse [`compress`].
///
/// # Errors
///
/// Returns [`io::ErrorKind::InvalidData`] if the blob is not valid base64 or not valid gzip.
pub fn decompress(blob: &str) -> io::Result<Vec<u8>> {
    let gz = STANDARD
        .decode(blob.trim())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut out = Vec::new();
    GzDecoder::new(gz.as_slice()).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::checksum;

    #[test]
    fn test_lossless() {
        let payload = br#"{"credit_history":[1,2,3],"currentUser":{"name":"Ana \"A\""}}"#;
        let blob = compress(payload).unwrap();
        let restored = decompress(&blob).unwrap();
        assert_eq!(restored, payload);
        assert_eq!(checksum(&restored), checksum(payload));
    }

    #[test]
    fn test_repetitive_payload_shrinks() {
        let payload = "{\"user_metrics\":\"".to_string() + &"x".repeat(10_000) + "\"}";
        let blob = compress(payload.as_bytes()).unwrap();
        assert!(blob.len() < payload.len() / 10);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = decompress("!!not base64!!").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let not_gzip = STANDARD.encode(b"plain text");
        assert!(decompress(&not_gzip).is_err());
    }
}
