// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The texture-decoding collaborator contract.

use crate::renderer::format::TextureUsageType;
use crate::renderer::texture::{ResourcePriority, TextureFormat};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Where the pixels of a texture come from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// An encoded image file on disk.
    Path(PathBuf),
    /// An encoded image already in memory (PNG, JPEG, ...).
    Encoded(Arc<[u8]>),
    /// Already-decoded, tightly packed RGBA8 pixels.
    Bitmap {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
        /// `width * height * 4` bytes, row-major.
        pixels: Arc<[u8]>,
    },
}

/// Per-load decoding options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureLoadOptions {
    /// Build a full mip chain after upload.
    pub generate_mipmaps: bool,
    /// Allow a lossy compressed format.
    pub allow_compression: bool,
    /// Flip rows so the first row is the bottom of the image.
    pub flip_vertically: bool,
    /// Multiply color channels by alpha.
    pub premultiply_alpha: bool,
    /// Store color in an sRGB format.
    pub srgb: bool,
    /// Downscale so neither edge exceeds this many pixels.
    pub max_dimension: Option<u32>,
    /// Cache priority of the resulting texture.
    pub priority: ResourcePriority,
}

impl TextureLoadOptions {
    /// The usual options for a texture of `usage`.
    pub fn for_usage(usage: TextureUsageType) -> Self {
        Self {
            generate_mipmaps: usage.generates_mipmaps_by_default(),
            allow_compression: usage.allows_compression(),
            flip_vertically: false,
            premultiply_alpha: false,
            srgb: usage == TextureUsageType::Color,
            max_dimension: None,
            priority: ResourcePriority::Normal,
        }
    }
}

impl Default for TextureLoadOptions {
    fn default() -> Self {
        Self::for_usage(TextureUsageType::Color)
    }
}

/// Pixels ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Format the pixels are laid out in.
    pub format: TextureFormat,
    /// Stride between rows, in bytes.
    pub bytes_per_row: u64,
    /// Row-major pixel data.
    pub pixels: Vec<u8>,
    /// Whether the source carried meaningful alpha.
    pub has_alpha: bool,
}

/// An error raised while turning an [`ImageSource`] into pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextureLoadError {
    /// The source could not be read or decoded.
    ImageCreationFailed(String),
    /// The target pixel format cannot be produced.
    UnsupportedFormat(String),
    /// The source decoded but its contents are unusable.
    InvalidImageData(String),
}

impl fmt::Display for TextureLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureLoadError::ImageCreationFailed(msg) => {
                write!(f, "Failed to create image: {msg}")
            }
            TextureLoadError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {msg}"),
            TextureLoadError::InvalidImageData(msg) => write!(f, "Invalid image data: {msg}"),
        }
    }
}

impl std::error::Error for TextureLoadError {}

/// Decodes image sources into uploadable pixels.
pub trait TextureDecoder: Send + Sync {
    /// Decodes `source` for `usage`, choosing a format from `supported_formats`.
    fn decode(
        &self,
        source: &ImageSource,
        usage: TextureUsageType,
        options: &TextureLoadOptions,
        supported_formats: &[TextureFormat],
    ) -> Result<DecodedImage, TextureLoadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_usage() {
        let color = TextureLoadOptions::for_usage(TextureUsageType::Color);
        assert!(color.generate_mipmaps && color.srgb && color.allow_compression);

        let mask = TextureLoadOptions::for_usage(TextureUsageType::Mask);
        assert!(!mask.generate_mipmaps && !mask.srgb && !mask.allow_compression);
    }
}
