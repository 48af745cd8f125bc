use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::codec::mime_for_path;
use crate::errors::EditError;

/// An immutable image snapshot.
///
/// Every edit produces a new asset; the bytes are shared so history entries
/// can be cloned freely.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAsset {
    name: String,
    mime_type: String,
    bytes: Arc<[u8]>,
    modified_at: DateTime<Utc>,
}

impl ImageAsset {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::with_timestamp(name, mime_type, bytes, Utc::now())
    }

    pub fn with_timestamp(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
        modified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: Arc::from(bytes),
            modified_at,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, EditError> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|value| value.to_str())
            .filter(|value| !value.is_empty())
            .unwrap_or("image")
            .to_string();
        let mime = mime_for_path(path).unwrap_or("image/png");
        Ok(Self::new(name, mime, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.name,
        }
    }

    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }

    /// First 6 bytes of the SHA-256 of the payload, hex encoded.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        hex::encode(&hasher.finalize()[..6])
    }

    /// Natural pixel size, read from the encoded image header.
    pub fn dimensions(&self) -> Result<(u32, u32), EditError> {
        image::ImageReader::new(Cursor::new(self.bytes()))
            .with_guessed_format()
            .map_err(|err| EditError::Image(err.to_string()))?
            .into_dimensions()
            .map_err(|err| EditError::Image(err.to_string()))
    }
}

impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAsset")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .field("modified_at", &self.modified_at)
            .finish()
    }
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    let lowered = mime.trim().to_ascii_lowercase();
    if lowered.contains("jpeg") || lowered.contains("jpg") {
        return "jpg";
    }
    if lowered.contains("webp") {
        return "webp";
    }
    if lowered.contains("gif") {
        return "gif";
    }
    "png"
}
