//! Payload codec: JSON over optional transport compression.
//!
//! # Data Flow
//! ```text
//! Inbound:  bytes → decompress (per Content-Encoding) → serde_json → Value
//! Outbound: Value → serde_json → compress (effective encoding) → bytes
//! ```
//!
//! # Design Decisions
//! - `deflate` means zlib-wrapped deflate; raw deflate is accepted as a
//!   fallback and then becomes the effective encoding of the exchange
//! - Raw deflate is never advertised: its wire token is `deflate`
//! - Compression runs inline; payloads are expected to be small
//! - Inflated output is capped; a body that expands past the cap is
//!   rejected as too large, never buffered whole

use std::borrow::Cow;
use std::io::{Read, Write};

use flate2::read::{DeflateDecoder, MultiGzDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, GzEncoder, ZlibEncoder};
use flate2::Compression;
use serde_json::Value;
use thiserror::Error;

use crate::error::ErrorKind;

/// Wire token for gzip.
pub const ENC_GZIP: &str = "gzip";
/// Wire token for (zlib-wrapped or raw) deflate.
pub const ENC_DEFLATE: &str = "deflate";

/// Transport encoding of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Plain UTF-8 JSON text.
    #[default]
    Identity,
    Gzip,
    /// zlib-wrapped deflate (RFC 1950).
    Deflate,
    /// Headerless deflate (RFC 1951), reached only through the fallback.
    DeflateRaw,
}

impl Encoding {
    /// Parse a `Content-Encoding` header value. An absent header is identity.
    pub fn from_header(value: Option<&str>) -> Result<Self, CodecError> {
        let Some(raw) = value else {
            return Ok(Encoding::Identity);
        };
        let token = raw.trim();
        if token.is_empty() || token.eq_ignore_ascii_case("identity") {
            Ok(Encoding::Identity)
        } else if token.eq_ignore_ascii_case(ENC_GZIP) {
            Ok(Encoding::Gzip)
        } else if token.eq_ignore_ascii_case(ENC_DEFLATE) {
            Ok(Encoding::Deflate)
        } else {
            Err(CodecError::UnsupportedEncoding(token.to_string()))
        }
    }

    /// Token to put in `Content-Encoding`, `None` when uncompressed.
    pub fn header_value(self) -> Option<&'static str> {
        match self {
            Encoding::Identity => None,
            Encoding::Gzip => Some(ENC_GZIP),
            Encoding::Deflate | Encoding::DeflateRaw => Some(ENC_DEFLATE),
        }
    }

    pub fn is_compressed(self) -> bool {
        self != Encoding::Identity
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoding::Identity => f.write_str("identity"),
            Encoding::Gzip => f.write_str(ENC_GZIP),
            Encoding::Deflate => f.write_str(ENC_DEFLATE),
            Encoding::DeflateRaw => f.write_str("deflate_raw"),
        }
    }
}

/// Codec failures.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unsupported content encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("invalid {encoding} compression: {source}")]
    Compression {
        encoding: Encoding,
        #[source]
        source: std::io::Error,
    },

    #[error("payload expands beyond {limit} bytes")]
    TooLarge { limit: usize },

    #[error("invalid JSON payload: {0}")]
    MalformedPayload(#[source] serde_json::Error),

    #[error("failed to serialize JSON payload: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl CodecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodecError::UnsupportedEncoding(_) => ErrorKind::UnsupportedEncoding,
            CodecError::Compression { .. } => ErrorKind::CompressionError,
            CodecError::TooLarge { .. } => ErrorKind::PayloadTooLarge,
            CodecError::MalformedPayload(_) | CodecError::Serialize(_) => {
                ErrorKind::MalformedPayload
            }
        }
    }
}

/// A decoded payload together with the encoding that actually worked.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub value: Value,
    /// Equals the requested encoding except after a raw-deflate fallback.
    pub encoding: Encoding,
}

/// Undo transport compression, producing at most `limit` plain bytes.
///
/// Returns the plain bytes and the effective encoding.
pub fn decompress(
    buffer: &[u8],
    encoding: Encoding,
    limit: usize,
) -> Result<(Cow<'_, [u8]>, Encoding), CodecError> {
    match encoding {
        Encoding::Identity => {
            if buffer.len() > limit {
                return Err(CodecError::TooLarge { limit });
            }
            Ok((Cow::Borrowed(buffer), Encoding::Identity))
        }
        Encoding::Gzip => inflate(MultiGzDecoder::new(buffer), limit, encoding)
            .map(|plain| (Cow::Owned(plain), Encoding::Gzip)),
        Encoding::Deflate => match inflate(ZlibDecoder::new(buffer), limit, encoding) {
            Ok(plain) => Ok((Cow::Owned(plain), Encoding::Deflate)),
            Err(CodecError::Compression { source: zlib_err, .. }) => {
                tracing::debug!(error = %zlib_err, "zlib inflate failed, trying raw inflate");
                inflate(DeflateDecoder::new(buffer), limit, encoding)
                    .map(|plain| (Cow::Owned(plain), Encoding::DeflateRaw))
            }
            Err(e) => Err(e),
        },
        Encoding::DeflateRaw => inflate(DeflateDecoder::new(buffer), limit, encoding)
            .map(|plain| (Cow::Owned(plain), Encoding::DeflateRaw)),
    }
}

/// Decompress and parse a JSON payload of at most `limit` plain bytes.
pub fn decode(buffer: &[u8], encoding: Encoding, limit: usize) -> Result<Decoded, CodecError> {
    let (plain, effective) = decompress(buffer, encoding, limit)?;
    let value = serde_json::from_slice(&plain).map_err(CodecError::MalformedPayload)?;
    Ok(Decoded {
        value,
        encoding: effective,
    })
}

/// Serialize and compress a JSON payload.
pub fn encode(value: &Value, encoding: Encoding) -> Result<Vec<u8>, CodecError> {
    let text = serde_json::to_vec(value).map_err(CodecError::Serialize)?;
    compress(&text, encoding)
}

/// Apply transport compression to already serialized bytes.
pub fn compress(plain: &[u8], encoding: Encoding) -> Result<Vec<u8>, CodecError> {
    let result = match encoding {
        Encoding::Identity => return Ok(plain.to_vec()),
        Encoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(plain).and_then(|_| encoder.finish())
        }
        Encoding::Deflate => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(plain).and_then(|_| encoder.finish())
        }
        Encoding::DeflateRaw => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(plain).and_then(|_| encoder.finish())
        }
    };
    result.map_err(|source| CodecError::Compression { encoding, source })
}

fn inflate<R: Read>(reader: R, limit: usize, encoding: Encoding) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    reader
        .take((limit as u64).saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|source| CodecError::Compression { encoding, source })?;
    if out.len() > limit {
        return Err(CodecError::TooLarge { limit });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({"x": 1, "nested": {"list": [1, 2, 3], "text": "héllo"}, "flag": true})
    }

    #[test]
    fn test_round_trip_supported_encodings() {
        for encoding in [Encoding::Identity, Encoding::Gzip, Encoding::Deflate] {
            let bytes = encode(&sample(), encoding).unwrap();
            let decoded = decode(&bytes, encoding, usize::MAX).unwrap();
            assert_eq!(decoded.value, sample(), "{encoding}");
            assert_eq!(decoded.encoding, encoding);
        }
    }

    #[test]
    fn test_raw_deflate_fallback_marks_exchange() {
        let raw = encode(&sample(), Encoding::DeflateRaw).unwrap();
        let decoded = decode(&raw, Encoding::Deflate, usize::MAX).unwrap();
        assert_eq!(decoded.value, sample());
        assert_eq!(decoded.encoding, Encoding::DeflateRaw);
        assert_eq!(decoded.encoding.header_value(), Some("deflate"));
    }

    #[test]
    fn test_garbage_deflate_is_compression_error() {
        let err = decode(&[0xff, 0xff, 0xff, 0xff, 0x00], Encoding::Deflate, usize::MAX).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CompressionError);
    }

    #[test]
    fn test_garbage_gzip_is_compression_error() {
        let err = decode(b"{\"x\":1}", Encoding::Gzip, usize::MAX).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CompressionError);
    }

    #[test]
    fn test_bad_json_is_malformed_payload() {
        let bytes = compress(b"{not json", Encoding::Gzip).unwrap();
        let err = decode(&bytes, Encoding::Gzip, usize::MAX).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedPayload);
    }

    #[test]
    fn test_inflated_size_is_capped() {
        let bomb = json!({"padding": " ".repeat(1 << 20)});
        for encoding in [Encoding::Gzip, Encoding::Deflate, Encoding::DeflateRaw] {
            let bytes = encode(&bomb, encoding).unwrap();
            assert!(bytes.len() < 16 * 1024);
            let err = decode(&bytes, encoding, 16 * 1024).unwrap_err();
            assert!(matches!(err, CodecError::TooLarge { limit: 16384 }), "{encoding}");
            assert_eq!(err.kind(), ErrorKind::PayloadTooLarge);
        }

        let plain = serde_json::to_vec(&sample()).unwrap();
        let err = decode(&plain, Encoding::Identity, plain.len() - 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PayloadTooLarge);
        assert!(decode(&plain, Encoding::Identity, plain.len()).is_ok());
    }

    #[test]
    fn test_concatenated_gzip_members() {
        let mut bytes = compress(br#"{"a":"#, Encoding::Gzip).unwrap();
        bytes.extend(compress(br#"[1,2]}"#, Encoding::Gzip).unwrap());
        let decoded = decode(&bytes, Encoding::Gzip, usize::MAX).unwrap();
        assert_eq!(decoded.value, json!({"a": [1, 2]}));
    }

    #[test]
    fn test_header_parsing() {
        assert_eq!(Encoding::from_header(None).unwrap(), Encoding::Identity);
        assert_eq!(Encoding::from_header(Some("GZIP")).unwrap(), Encoding::Gzip);
        assert_eq!(Encoding::from_header(Some(" deflate ")).unwrap(), Encoding::Deflate);
        let err = Encoding::from_header(Some("br")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedEncoding);
    }

    #[test]
    fn test_identity_has_no_header() {
        assert_eq!(Encoding::Identity.header_value(), None);
        assert!(!Encoding::Identity.is_compressed());
    }
}
