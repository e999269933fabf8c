//! WAPP container format.
//!
//! A package is a single binary file: a fixed 12-byte header, a UTF-8 JSON
//! metadata document, and the guest module payload.
//!
//! ```text
//! offset 0     4 bytes    magic, b"WAPP"
//! offset 4     4 bytes    version, u32 LE, currently 1
//! offset 8     4 bytes    metadata length N, u32 LE
//! offset 12    N bytes    JSON metadata document
//! offset 12+N  remainder  guest module payload
//! ```
//!
//! Parsing is a pure function over the bytes; it never touches the
//! execution substrate and never exposes a partially parsed package.

use serde_json::{Map, Value};

use crate::error::PackageError;

/// Magic tag at the start of every package.
pub const MAGIC: [u8; 4] = *b"WAPP";

/// The only container version this host reads.
pub const VERSION: u32 = 1;

/// Fixed header size: magic + version + metadata length.
pub const HEADER_LEN: usize = 12;

/// Package metadata: a JSON object with all keys preserved as written.
///
/// Only `name` is interpreted by the host; everything else is carried for
/// tooling to inspect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    doc: Map<String, Value>,
}

impl Metadata {
    /// Empty metadata document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata carrying just a display name.
    pub fn named(name: impl Into<String>) -> Self {
        let mut metadata = Self::new();
        metadata.insert("name", Value::String(name.into()));
        metadata
    }

    fn decode(bytes: &[u8]) -> Result<Self, PackageError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| PackageError::BadMetadata(format!("invalid UTF-8: {e}")))?;
        let value: Value =
            serde_json::from_str(text).map_err(|e| PackageError::BadMetadata(e.to_string()))?;
        match value {
            Value::Object(doc) => Ok(Self { doc }),
            other => Err(PackageError::BadMetadata(format!(
                "top-level metadata must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Display name declared by the package, if any.
    ///
    /// Empty strings and non-string values count as absent.
    pub fn name(&self) -> Option<&str> {
        self.doc
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
    }

    /// Look up an arbitrary metadata key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.doc.get(key)
    }

    /// Set a key, replacing any existing value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.doc.insert(key.into(), value);
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// A parsed, immutable WAPP package.
#[derive(Debug, Clone)]
pub struct Package {
    metadata: Metadata,
    payload: Vec<u8>,
}

impl Package {
    /// Parse a package from raw file bytes.
    ///
    /// Validation short-circuits on the first violation, in field order:
    /// size, magic, version, metadata length, metadata document.
    pub fn parse(bytes: &[u8]) -> Result<Self, PackageError> {
        if bytes.len() < HEADER_LEN {
            return Err(PackageError::Truncated {
                len: bytes.len(),
                need: HEADER_LEN,
            });
        }

        let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if magic != MAGIC {
            return Err(PackageError::BadMagic(magic));
        }

        let version = le_u32(bytes, 4);
        if version != VERSION {
            return Err(PackageError::UnsupportedVersion(version));
        }

        let metadata_len = le_u32(bytes, 8) as usize;
        let need = HEADER_LEN.saturating_add(metadata_len);
        if bytes.len() < need {
            return Err(PackageError::Truncated {
                len: bytes.len(),
                need,
            });
        }

        let metadata = Metadata::decode(&bytes[HEADER_LEN..need])?;
        let payload = bytes[need..].to_vec();
        Ok(Self { metadata, payload })
    }

    /// Encode a package from its parts; the exact inverse of [`Package::parse`].
    pub fn encode(metadata: &Metadata, payload: &[u8]) -> Vec<u8> {
        let doc = serde_json::to_vec(&metadata.doc).expect("JSON object serialization cannot fail");
        let mut bytes = Vec::with_capacity(HEADER_LEN + doc.len() + payload.len());
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&(doc.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&doc);
        bytes.extend_from_slice(payload);
        bytes
    }

    /// Decoded metadata document.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Guest module payload, byte-for-byte as stored in the file.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Resolve the display title: the metadata `name` when present and
    /// non-empty, otherwise `fallback`.
    pub fn title_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.metadata.name().unwrap_or(fallback)
    }
}
