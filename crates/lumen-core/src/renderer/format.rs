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

//! Pixel-format selection for decoded textures.

use crate::renderer::texture::TextureFormat;
use serde::{Deserialize, Serialize};

/// What a loaded texture is going to be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextureUsageType {
    /// Display-referred color imagery.
    #[default]
    Color,
    /// Tangent-space normal maps.
    Normal,
    /// Single-channel coverage masks.
    Mask,
    /// Arbitrary numeric data such as lookup tables.
    Data,
    /// Scene-referred high dynamic range imagery.
    Hdr,
    /// Depth buffers.
    Depth,
}

impl TextureUsageType {
    /// Candidate formats for this usage, best first.
    pub fn preferred_formats(self, srgb: bool) -> &'static [TextureFormat] {
        use TextureFormat::*;
        match self {
            TextureUsageType::Color if srgb => &[Rgba8UnormSrgb, Bgra8UnormSrgb],
            TextureUsageType::Color => &[Rgba8Unorm, Bgra8Unorm],
            TextureUsageType::Normal => &[Rg8Unorm, Rgba8Unorm],
            TextureUsageType::Mask => &[R8Unorm, Rgba8Unorm],
            TextureUsageType::Data => &[Rgba32Float, Rgba16Float, Rgba8Unorm],
            TextureUsageType::Hdr => &[Rgba16Float, Rgba32Float, Rg11b10Float],
            TextureUsageType::Depth => &[Depth32Float, Depth16Unorm],
        }
    }

    /// Whether `format` is acceptable for this usage at all.
    ///
    /// Single-channel color formats are reserved for masks, float formats for
    /// HDR and data, and depth formats for depth. A depth usage accepts nothing else.
    pub fn accepts(self, format: TextureFormat) -> bool {
        if format.is_depth() != (self == TextureUsageType::Depth) {
            return false;
        }
        if format.is_single_channel() && self != TextureUsageType::Mask {
            return false;
        }
        if format.is_float() && !matches!(self, TextureUsageType::Hdr | TextureUsageType::Data)
        {
            return false;
        }
        true
    }

    /// Whether textures of this usage get mipmaps unless told otherwise.
    pub fn generates_mipmaps_by_default(self) -> bool {
        matches!(self, TextureUsageType::Color | TextureUsageType::Normal)
    }

    /// Whether this usage tolerates lossy block compression.
    pub fn allows_compression(self) -> bool {
        matches!(self, TextureUsageType::Color | TextureUsageType::Normal)
    }
}

/// Picks the pixel format a texture of `usage` is stored in on this device.
///
/// Walks the usage's preferred list and takes the first candidate the device
/// supports and the usage accepts. Falls back to RGBA8 (the sRGB variant when
/// `srgb` is set).
pub fn select_pixel_format(
    usage: TextureUsageType,
    supported: &[TextureFormat],
    srgb: bool,
) -> TextureFormat {
    usage
        .preferred_formats(srgb)
        .iter()
        .copied()
        .find(|format| supported.contains(format) && usage.accepts(*format))
        .unwrap_or_else(|| TextureFormat::rgba8(srgb))
}

#[cfg(test)]
mod tests {
    use super::*;
    use TextureFormat::*;

    #[test]
    fn mask_prefers_single_channel() {
        assert_eq!(
            select_pixel_format(TextureUsageType::Mask, &[R8Unorm, Rgba8Unorm], false),
            R8Unorm
        );
    }

    #[test]
    fn mask_falls_back_to_rgba8_without_r8() {
        assert_eq!(
            select_pixel_format(TextureUsageType::Mask, &[Rgba8Unorm], false),
            Rgba8Unorm
        );
    }

    #[test]
    fn hdr_takes_half_float_when_available() {
        assert_eq!(
            select_pixel_format(TextureUsageType::Hdr, &[Rgba8Unorm, Rgba16Float], false),
            Rgba16Float
        );
    }

    #[test]
    fn color_fallback_respects_srgb() {
        assert_eq!(
            select_pixel_format(TextureUsageType::Color, &[], true),
            Rgba8UnormSrgb
        );
        assert_eq!(
            select_pixel_format(TextureUsageType::Color, &[Bgra8Unorm], false),
            Bgra8Unorm
        );
    }

    #[test]
    fn usage_rules() {
        assert!(!TextureUsageType::Color.accepts(R8Unorm));
        assert!(!TextureUsageType::Color.accepts(Rgba16Float));
        assert!(!TextureUsageType::Color.accepts(Depth32Float));
        assert!(TextureUsageType::Data.accepts(Rgba32Float));
        assert!(TextureUsageType::Depth.accepts(Depth16Unorm));
        assert!(!TextureUsageType::Depth.accepts(Rgba8Unorm));
    }

    #[test]
    fn preferred_lists_only_hold_accepted_formats() {
        for usage in [
            TextureUsageType::Color,
            TextureUsageType::Normal,
            TextureUsageType::Mask,
            TextureUsageType::Data,
            TextureUsageType::Hdr,
            TextureUsageType::Depth,
        ] {
            for srgb in [false, true] {
                for format in usage.preferred_formats(srgb) {
                    assert!(usage.accepts(*format), "{usage:?} rejects {format:?}");
                }
            }
        }
    }
}
