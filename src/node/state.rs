//! Persisted node state container.
//!
//! Layout: a JSON object `{ "dspCode", "editorCode", "data"? }` compressed
//! with gzip. `data` carries the active script's opaque blob and is left out
//! when the blob is empty. The container has no version tag or magic number.

use crate::error::{Result, ScriptError};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Everything needed to rebuild a script node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub dsp_code: String,
    #[serde(default)]
    pub editor_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
}

impl PersistedState {
    pub fn new(dsp_code: impl Into<String>, editor_code: impl Into<String>, blob: Vec<u8>) -> Self {
        Self {
            dsp_code: dsp_code.into(),
            editor_code: editor_code.into(),
            data: (!blob.is_empty()).then_some(blob),
        }
    }

    /// Serialise and compress.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(self)
            .map_err(|e| ScriptError::Serialization(format!("Failed to serialize state: {}", e)))?;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        Ok(encoder.finish()?)
    }

    /// Decompress and deserialise.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut json = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut json)
            .map_err(|e| ScriptError::State(format!("Failed to decompress state: {}", e)))?;

        serde_json::from_slice(&json)
            .map_err(|e| ScriptError::State(format!("Failed to parse state: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names() {
        let state = PersistedState::new("dsp", "editor", vec![1, 2]);
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"dspCode\":\"dsp\""));
        assert!(json.contains("\"editorCode\":\"editor\""));
        assert!(json.contains("\"data\":[1,2]"));
    }

    #[test]
    fn test_empty_blob_omitted() {
        let state = PersistedState::new("dsp", "", Vec::new());
        assert_eq!(state.data, None);
        let json = serde_json::to_string(&state).unwrap();
        assert!(!json.contains("data"));
    }

    #[test]
    fn test_encode_decode() {
        let state = PersistedState::new("fn process(a, m) {}", "// notes", vec![0, 255, 7]);
        let bytes = state.encode().unwrap();
        // gzip magic
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
        assert_eq!(PersistedState::decode(&bytes).unwrap(), state);
    }

    #[test]
    fn test_corrupt_input() {
        let err = PersistedState::decode(b"not gzip").unwrap_err();
        assert!(matches!(err, ScriptError::State(_)));
    }
}
