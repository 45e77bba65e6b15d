//! Image payloads for the analysis gateway.
//!
//! Images travel to the model inline, base64-encoded, together with
//! their MIME type.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;
use thiserror::Error;

/// Problems turning user input into an image payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Failed to read image {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("Image is empty")]
    Empty,

    #[error("Malformed data URL: {0}")]
    MalformedDataUrl(&'static str),
}

/// An image ready to be sent to the model.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    mime_type: String,
    data: String,
}

impl std::fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("encoded_len", &self.data.len())
            .finish()
    }
}

impl ImagePayload {
    /// Wrap raw image bytes.
    pub fn new(bytes: &[u8], mime_type: impl Into<String>) -> Result<Self, PayloadError> {
        if bytes.is_empty() {
            return Err(PayloadError::Empty);
        }

        Ok(Self {
            mime_type: mime_type.into(),
            data: STANDARD.encode(bytes),
        })
    }

    /// Read an image file, inferring the MIME type from its extension.
    pub fn from_path(path: &Path) -> Result<Self, PayloadError> {
        let mime_type = mime_type_for(path)?;
        let bytes = std::fs::read(path).map_err(|source| PayloadError::Read {
            path: path.display().to_string(),
            source,
        })?;

        Self::new(&bytes, mime_type)
    }

    /// Parse a `data:<mime>;base64,<data>` URL, as produced by browser captures.
    pub fn from_data_url(url: &str) -> Result<Self, PayloadError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or(PayloadError::MalformedDataUrl("missing data: prefix"))?;
        let (header, data) = rest
            .split_once(',')
            .ok_or(PayloadError::MalformedDataUrl("missing comma"))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or(PayloadError::MalformedDataUrl("only base64 data URLs are supported"))?;

        if !mime_type.starts_with("image/") {
            return Err(PayloadError::UnsupportedType(mime_type.to_string()));
        }

        let data = data.trim();
        if data.is_empty() {
            return Err(PayloadError::Empty);
        }
        if STANDARD.decode(data).is_err() {
            return Err(PayloadError::MalformedDataUrl("invalid base64 data"));
        }

        Ok(Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }

    /// Parse user input that is either a data URL or a path to an image file.
    pub fn from_input(input: &str) -> Result<Self, PayloadError> {
        if input.starts_with("data:") {
            Self::from_data_url(input)
        } else {
            Self::from_path(Path::new(input))
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Base64-encoded image data.
    pub fn data(&self) -> &str {
        &self.data
    }
}

/// MIME type for an image path, based on the file extension.
pub fn mime_type_for(path: &Path) -> Result<&'static str, PayloadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "webp" => Ok("image/webp"),
        "heic" => Ok("image/heic"),
        "heif" => Ok("image/heif"),
        "gif" => Ok("image/gif"),
        _ => Err(PayloadError::UnsupportedType(path.display().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mime_type_for() {
        assert_eq!(mime_type_for(Path::new("work.JPG")).unwrap(), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("a/b/page.png")).unwrap(), "image/png");
        assert!(mime_type_for(Path::new("notes.txt")).is_err());
        assert!(mime_type_for(Path::new("noext")).is_err());
    }

    #[test]
    fn test_from_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("essay.jpeg");
        std::fs::write(&path, [0xFFu8, 0xD8, 0xFF, 0xE0]).unwrap();

        let payload = ImagePayload::from_path(&path).unwrap();
        assert_eq!(payload.mime_type(), "image/jpeg");
        assert_eq!(payload.data(), "/9j/4A==");
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = ImagePayload::from_path(Path::new("/nonexistent/essay.png")).unwrap_err();
        assert!(matches!(err, PayloadError::Read { .. }));
    }

    #[test]
    fn test_from_data_url() {
        let payload = ImagePayload::from_data_url("data:image/jpeg;base64,/9j/4A==").unwrap();
        assert_eq!(payload.mime_type(), "image/jpeg");
        assert_eq!(payload.data(), "/9j/4A==");

        assert!(ImagePayload::from_data_url("image/jpeg;base64,/9j/4A==").is_err());
        assert!(ImagePayload::from_data_url("data:image/jpeg,/9j/4A==").is_err());
        assert!(ImagePayload::from_data_url("data:text/plain;base64,aGk=").is_err());
        assert!(ImagePayload::from_data_url("data:image/png;base64,").is_err());
        assert!(ImagePayload::from_data_url("data:image/png;base64,!!!").is_err());
    }

    #[test]
    fn test_empty_bytes_rejected() {
        assert!(matches!(
            ImagePayload::new(&[], "image/png"),
            Err(PayloadError::Empty)
        ));
    }
}
