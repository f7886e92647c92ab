//! Image attachments sent along with chat messages.
//!
//! Images travel as self-describing data URIs. Only GIF, JPEG and PNG are
//! accepted, and a message carries at most [`MAX_IMAGES`] of them.

use std::fmt;
use std::path::Path;

use base64::Engine;
use thiserror::Error;

/// Maximum number of images on one outbound message
pub const MAX_IMAGES: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttachmentError {
    #[error("At most {MAX_IMAGES} images can be attached")]
    LimitReached,
    #[error("Unsupported image type (only GIF, JPEG and PNG are allowed)")]
    UnsupportedType,
    #[error("Malformed data URI")]
    MalformedDataUri,
    #[error("Could not read image: {0}")]
    Read(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Gif,
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            ImageFormat::Gif => "image/gif",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/gif" => Some(ImageFormat::Gif),
            "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
            "image/png" => Some(ImageFormat::Png),
            _ => None,
        }
    }

    /// Detect the format from the file signature
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else {
            None
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

// Image payloads are large; keep Debug output readable.
impl fmt::Debug for ImageAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAttachment")
            .field("format", &self.format)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ImageAttachment {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, AttachmentError> {
        let format = ImageFormat::sniff(&bytes).ok_or(AttachmentError::UnsupportedType)?;
        Ok(Self { format, bytes })
    }

    pub fn from_path(path: &Path) -> Result<Self, AttachmentError> {
        let bytes = std::fs::read(path)
            .map_err(|e| AttachmentError::Read(format!("{}: {}", path.display(), e)))?;
        Self::from_bytes(bytes)
    }

    /// Parse `data:<mime>;base64,<payload>`
    pub fn from_data_uri(uri: &str) -> Result<Self, AttachmentError> {
        let rest = uri
            .trim()
            .strip_prefix("data:")
            .ok_or(AttachmentError::MalformedDataUri)?;
        let (header, payload) = rest.split_once(',').ok_or(AttachmentError::MalformedDataUri)?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or(AttachmentError::MalformedDataUri)?;
        let format = ImageFormat::from_mime(mime).ok_or(AttachmentError::UnsupportedType)?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|_| AttachmentError::MalformedDataUri)?;
        Ok(Self { format, bytes })
    }

    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime(),
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    /// Short human description, e.g. `PNG 12.3 KB`
    pub fn describe(&self) -> String {
        let kind = match self.format {
            ImageFormat::Gif => "GIF",
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Png => "PNG",
        };
        format!("{} {:.1} KB", kind, self.bytes.len() as f64 / 1024.0)
    }
}

/// Images waiting to go out with the next message
#[derive(Debug, Clone, Default)]
pub struct AttachmentStaging {
    images: Vec<ImageAttachment>,
}

impl AttachmentStaging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, image: ImageAttachment) -> Result<(), AttachmentError> {
        if self.images.len() >= MAX_IMAGES {
            return Err(AttachmentError::LimitReached);
        }
        self.images.push(image);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Option<ImageAttachment> {
        if index < self.images.len() {
            Some(self.images.remove(index))
        } else {
            None
        }
    }

    pub fn images(&self) -> &[ImageAttachment] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn take(&mut self) -> Vec<ImageAttachment> {
        std::mem::take(&mut self.images)
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }
}
