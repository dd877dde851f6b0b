//! Pluggable decoding of pushed records.
//!
//! The daemon pushes each file's attributes as an opaque record. The enumerator
//! decodes every record on its own with a [`MessageCodec`], so a single corrupt
//! record never poisons the rest of its batch. [`JsonCodec`] is the default.
//!
//! ```rust
//! use daemon_enumerator::{FileInfo, JsonCodec, MessageCodec};
//!
//! let codec = JsonCodec;
//! let info = FileInfo::with_name("notes.txt");
//!
//! let bytes = codec.encode(&info).expect("encode");
//! let decoded: FileInfo = codec.decode(&bytes).expect("decode");
//! assert_eq!(decoded.name(), Some("notes.txt"));
//! ```

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Error type for codec operations.
#[derive(Debug)]
pub enum CodecError {
    /// Failed to encode a value to bytes.
    Encode(Box<dyn std::error::Error + Send + Sync>),
    /// Failed to decode bytes to a value.
    Decode(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Encode(e) => write!(f, "encode error: {}", e),
            CodecError::Decode(e) => write!(f, "decode error: {}", e),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CodecError::Encode(e) => Some(e.as_ref()),
            CodecError::Decode(e) => Some(e.as_ref()),
        }
    }
}

/// Serialization format for records carried in `Info` pushes.
///
/// Codecs are shared between the dispatch thread and consumers, hence the
/// `Send + Sync` bound.
pub trait MessageCodec: Clone + Send + Sync + 'static {
    /// Encode a serializable value to bytes.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Decode` if deserialization fails.
    fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, CodecError>;
}

/// JSON codec using serde_json.
#[derive(Clone, Default, Debug, Copy)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(msg).map_err(|e| CodecError::Encode(Box::new(e)))
    }

    fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(buf).map_err(|e| CodecError::Decode(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::{AttributeValue, FileInfo};

    #[test]
    fn test_decode_file_info_record() {
        let codec = JsonCodec;
        let record = br#"{"standard::name":"a.txt","xattr::tags":["x","y"]}"#;

        let info: FileInfo = codec.decode(record).expect("decode should succeed");

        assert_eq!(info.name(), Some("a.txt"));
        assert_eq!(
            info.get("xattr::tags"),
            Some(&AttributeValue::StringList(vec!["x".into(), "y".into()]))
        );
    }

    #[test]
    fn test_decode_rejects_non_object_record() {
        let codec = JsonCodec;

        let result: Result<FileInfo, CodecError> = codec.decode(b"[1, 2, 3]");
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_decode_error_display() {
        let codec = JsonCodec;

        let err = codec
            .decode::<FileInfo>(b"not valid json {")
            .expect_err("garbage must not decode");
        assert!(err.to_string().contains("decode error"));
    }

    #[test]
    fn test_encode_is_compact_json() {
        let codec = JsonCodec;
        let bytes = codec
            .encode(&FileInfo::with_name("b"))
            .expect("encode should succeed");
        assert_eq!(&bytes, br#"{"standard::name":"b"}"#);
    }
}
