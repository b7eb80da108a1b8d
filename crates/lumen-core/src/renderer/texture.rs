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

//! Defines data structures related to GPU texture and sampler resources.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// An opaque handle to a texture owned by a [`GpuDevice`](crate::renderer::GpuDevice).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// An opaque handle to a sampler state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SamplerId(pub u64);

/// An opaque handle to a placement heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(pub u64);

/// An opaque handle to a command-submission queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueId(pub u64);

/// The block-compression family of a compressed format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionFamily {
    /// Adaptive scalable texture compression (mobile GPUs).
    Astc,
    /// BCn formats (desktop GPUs).
    Bc,
    /// Ericsson texture compression 2.
    Etc2,
}

/// The memory layout of texels in a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFormat {
    /// One 8-bit normalized channel.
    R8Unorm,
    /// Two 8-bit normalized channels.
    Rg8Unorm,
    /// Four 8-bit normalized channels.
    Rgba8Unorm,
    /// Four 8-bit normalized channels, sRGB encoded.
    Rgba8UnormSrgb,
    /// Four 8-bit normalized channels in BGRA order.
    Bgra8Unorm,
    /// Four 8-bit normalized channels in BGRA order, sRGB encoded.
    Bgra8UnormSrgb,
    /// 10-bit RGB with 2-bit alpha.
    Rgb10a2Unorm,
    /// One 16-bit float channel.
    R16Float,
    /// Two 16-bit float channels.
    Rg16Float,
    /// Four 16-bit float channels.
    Rgba16Float,
    /// One 32-bit float channel.
    R32Float,
    /// Four 32-bit float channels.
    Rgba32Float,
    /// Packed 11/11/10-bit float RGB.
    Rg11b10Float,
    /// 16-bit normalized depth.
    Depth16Unorm,
    /// 32-bit float depth.
    Depth32Float,
    /// 32-bit float depth with 8-bit stencil.
    Depth32FloatStencil8,
    /// ASTC 4x4 blocks.
    Astc4x4Unorm,
    /// ASTC 4x4 blocks, sRGB encoded.
    Astc4x4UnormSrgb,
    /// BC7 blocks.
    Bc7RgbaUnorm,
    /// BC7 blocks, sRGB encoded.
    Bc7RgbaUnormSrgb,
    /// ETC2 RGBA blocks.
    Etc2Rgba8Unorm,
    /// ETC2 RGBA blocks, sRGB encoded.
    Etc2Rgba8UnormSrgb,
}

impl TextureFormat {
    /// Every format the engine knows about.
    pub const ALL: [TextureFormat; 22] = [
        TextureFormat::R8Unorm,
        TextureFormat::Rg8Unorm,
        TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba8UnormSrgb,
        TextureFormat::Bgra8Unorm,
        TextureFormat::Bgra8UnormSrgb,
        TextureFormat::Rgb10a2Unorm,
        TextureFormat::R16Float,
        TextureFormat::Rg16Float,
        TextureFormat::Rgba16Float,
        TextureFormat::R32Float,
        TextureFormat::Rgba32Float,
        TextureFormat::Rg11b10Float,
        TextureFormat::Depth16Unorm,
        TextureFormat::Depth32Float,
        TextureFormat::Depth32FloatStencil8,
        TextureFormat::Astc4x4Unorm,
        TextureFormat::Astc4x4UnormSrgb,
        TextureFormat::Bc7RgbaUnorm,
        TextureFormat::Bc7RgbaUnormSrgb,
        TextureFormat::Etc2Rgba8Unorm,
        TextureFormat::Etc2Rgba8UnormSrgb,
    ];

    /// Returns the compression family, or `None` for uncompressed formats.
    pub fn compression_family(self) -> Option<CompressionFamily> {
        match self {
            TextureFormat::Astc4x4Unorm | TextureFormat::Astc4x4UnormSrgb => {
                Some(CompressionFamily::Astc)
            }
            TextureFormat::Bc7RgbaUnorm | TextureFormat::Bc7RgbaUnormSrgb => {
                Some(CompressionFamily::Bc)
            }
            TextureFormat::Etc2Rgba8Unorm | TextureFormat::Etc2Rgba8UnormSrgb => {
                Some(CompressionFamily::Etc2)
            }
            _ => None,
        }
    }

    /// Returns `true` for block-compressed formats.
    pub fn is_compressed(self) -> bool {
        self.compression_family().is_some()
    }

    /// Returns `true` for depth and depth/stencil formats.
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            TextureFormat::Depth16Unorm
                | TextureFormat::Depth32Float
                | TextureFormat::Depth32FloatStencil8
        )
    }

    /// Returns `true` for floating-point color formats. Depth formats are excluded.
    pub fn is_float(self) -> bool {
        matches!(
            self,
            TextureFormat::R16Float
                | TextureFormat::Rg16Float
                | TextureFormat::Rgba16Float
                | TextureFormat::R32Float
                | TextureFormat::Rgba32Float
                | TextureFormat::Rg11b10Float
        )
    }

    /// Returns `true` for sRGB-encoded formats.
    pub fn is_srgb(self) -> bool {
        matches!(
            self,
            TextureFormat::Rgba8UnormSrgb
                | TextureFormat::Bgra8UnormSrgb
                | TextureFormat::Astc4x4UnormSrgb
                | TextureFormat::Bc7RgbaUnormSrgb
                | TextureFormat::Etc2Rgba8UnormSrgb
        )
    }

    /// The number of color (or depth) channels.
    pub fn channel_count(self) -> u32 {
        match self {
            TextureFormat::R8Unorm
            | TextureFormat::R16Float
            | TextureFormat::R32Float
            | TextureFormat::Depth16Unorm
            | TextureFormat::Depth32Float => 1,
            TextureFormat::Rg8Unorm
            | TextureFormat::Rg16Float
            | TextureFormat::Depth32FloatStencil8 => 2,
            TextureFormat::Rg11b10Float => 3,
            _ => 4,
        }
    }

    /// Returns `true` for color formats with exactly one channel.
    pub fn is_single_channel(self) -> bool {
        !self.is_depth() && self.channel_count() == 1
    }

    /// Returns `true` if the format stores an alpha channel.
    pub fn has_alpha(self) -> bool {
        !self.is_depth() && self.channel_count() == 4
    }

    /// Bytes per texel for uncompressed formats, or bytes per 4x4 block for
    /// compressed ones.
    pub fn block_size(self) -> u32 {
        match self {
            TextureFormat::R8Unorm => 1,
            TextureFormat::Rg8Unorm | TextureFormat::R16Float | TextureFormat::Depth16Unorm => 2,
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::Rgb10a2Unorm
            | TextureFormat::Rg16Float
            | TextureFormat::R32Float
            | TextureFormat::Rg11b10Float
            | TextureFormat::Depth32Float => 4,
            TextureFormat::Rgba16Float | TextureFormat::Depth32FloatStencil8 => 8,
            TextureFormat::Rgba32Float
            | TextureFormat::Astc4x4Unorm
            | TextureFormat::Astc4x4UnormSrgb
            | TextureFormat::Bc7RgbaUnorm
            | TextureFormat::Bc7RgbaUnormSrgb
            | TextureFormat::Etc2Rgba8Unorm
            | TextureFormat::Etc2Rgba8UnormSrgb => 16,
        }
    }

    /// The byte length of one row of `width` texels (one row of blocks when compressed).
    pub fn bytes_per_row(self, width: u32) -> u64 {
        if self.is_compressed() {
            width.div_ceil(4) as u64 * self.block_size() as u64
        } else {
            width as u64 * self.block_size() as u64
        }
    }

    /// The tightly packed byte size of one `width` x `height` image.
    pub fn image_size(self, width: u32, height: u32) -> u64 {
        let rows = if self.is_compressed() {
            height.div_ceil(4)
        } else {
            height
        };
        self.bytes_per_row(width) * rows as u64
    }

    /// The RGBA8 fallback for this sRGB preference.
    pub fn rgba8(srgb: bool) -> Self {
        if srgb {
            TextureFormat::Rgba8UnormSrgb
        } else {
            TextureFormat::Rgba8Unorm
        }
    }
}

/// A set of flags describing how a texture may be used.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureUsage(u32);

impl TextureUsage {
    /// Sampled or read from shaders.
    pub const SHADER_READ: Self = Self(1 << 0);
    /// Written from shaders.
    pub const SHADER_WRITE: Self = Self(1 << 1);
    /// Bound as a color or depth attachment.
    pub const RENDER_TARGET: Self = Self(1 << 2);
    /// Source of a copy or mipmap blit.
    pub const COPY_SRC: Self = Self(1 << 3);
    /// Destination of a copy or upload.
    pub const COPY_DST: Self = Self(1 << 4);

    const NAMES: [(TextureUsage, &'static str); 5] = [
        (Self::SHADER_READ, "SHADER_READ"),
        (Self::SHADER_WRITE, "SHADER_WRITE"),
        (Self::RENDER_TARGET, "RENDER_TARGET"),
        (Self::COPY_SRC, "COPY_SRC"),
        (Self::COPY_DST, "COPY_DST"),
    ];

    /// An empty set of usages.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// The raw bit representation.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if every flag of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for TextureUsage {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for TextureUsage {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for TextureUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "TextureUsage({})", names.join(" | "))
    }
}

/// The dimensionality of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    /// A two-dimensional texture.
    D2,
    /// An array of two-dimensional slices.
    D2Array,
    /// A three-dimensional (volumetric) texture.
    D3,
    /// A cubemap (six 2D faces).
    Cube,
}

/// Everything needed to create a texture. Two descriptors that compare equal
/// describe interchangeable textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// The format of the texels in the texture.
    pub format: TextureFormat,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth for 3D textures, layer count for arrays, 1 otherwise.
    pub depth_or_array_layers: u32,
    /// The number of mipmap levels.
    pub mip_level_count: u32,
    /// Samples per texel (MSAA).
    pub sample_count: u32,
    /// The dimensionality of the texture.
    pub dimension: TextureDimension,
    /// How the texture may be used.
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// A single-level, single-sample 2D texture.
    pub fn new_2d(format: TextureFormat, width: u32, height: u32, usage: TextureUsage) -> Self {
        Self {
            format,
            width,
            height,
            depth_or_array_layers: 1,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            usage,
        }
    }

    /// Returns a copy with a full mip chain down to 1x1.
    pub fn with_full_mip_chain(mut self) -> Self {
        self.mip_level_count = Self::mip_chain_length(self.width, self.height);
        self
    }

    /// Returns a copy with `samples` samples per texel.
    pub fn with_sample_count(mut self, samples: u32) -> Self {
        self.sample_count = samples.max(1);
        self
    }

    /// The number of levels in a full mip chain for a `width` x `height` image.
    pub fn mip_chain_length(width: u32, height: u32) -> u32 {
        let largest = width.max(height).max(1);
        32 - largest.leading_zeros()
    }

    /// The tightly packed size of all levels, layers and samples.
    ///
    /// Devices may round this up; the pool accounts with the device-reported size.
    pub fn packed_byte_size(&self) -> u64 {
        let layers = match self.dimension {
            TextureDimension::Cube => 6 * self.depth_or_array_layers.max(1) as u64,
            _ => self.depth_or_array_layers.max(1) as u64,
        };
        let levels: u64 = (0..self.mip_level_count.max(1))
            .map(|level| {
                let w = (self.width >> level).max(1);
                let h = (self.height >> level).max(1);
                self.format.image_size(w, h)
            })
            .sum();
        levels * layers * self.sample_count.max(1) as u64
    }
}

/// A texture handle together with the descriptor it was created from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuTexture {
    /// The backend handle.
    pub id: TextureId,
    /// The creation descriptor.
    pub descriptor: TextureDescriptor,
}

impl GpuTexture {
    /// Width of the base level.
    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    /// Height of the base level.
    pub fn height(&self) -> u32 {
        self.descriptor.height
    }

    /// Texel format.
    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }
}

/// How reluctant caches should be to evict a resource.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum ResourcePriority {
    /// Evicted first.
    Low,
    /// The default.
    #[default]
    Normal,
    /// Evicted last.
    High,
}

/// The filtering mode for texture sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Point sampling.
    Nearest,
    /// Linear interpolation.
    Linear,
}

/// How coordinates outside `[0, 1]` are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    /// Clamp to the edge texel.
    ClampToEdge,
    /// Wrap around.
    Repeat,
    /// Wrap around, mirroring at each boundary.
    MirrorRepeat,
}

/// Describes a sampler state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDescriptor {
    /// A debug label.
    pub label: &'static str,
    /// Minification filter.
    pub min_filter: FilterMode,
    /// Magnification filter.
    pub mag_filter: FilterMode,
    /// Filter between mip levels, or `None` to sample the base level only.
    pub mip_filter: Option<FilterMode>,
    /// Addressing for all coordinates.
    pub address_mode: AddressMode,
}

impl SamplerDescriptor {
    /// Bilinear, clamped, base level only. The device default.
    pub const fn linear() -> Self {
        Self {
            label: "linear",
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            mip_filter: None,
            address_mode: AddressMode::ClampToEdge,
        }
    }

    /// Point sampling, clamped.
    pub const fn nearest() -> Self {
        Self {
            label: "nearest",
            min_filter: FilterMode::Nearest,
            mag_filter: FilterMode::Nearest,
            mip_filter: None,
            address_mode: AddressMode::ClampToEdge,
        }
    }

    /// Trilinear, clamped.
    pub const fn mipmapped() -> Self {
        Self {
            label: "mipmapped",
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            mip_filter: Some(FilterMode::Linear),
            address_mode: AddressMode::ClampToEdge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_covers_down_to_one_texel() {
        assert_eq!(TextureDescriptor::mip_chain_length(1, 1), 1);
        assert_eq!(TextureDescriptor::mip_chain_length(256, 256), 9);
        assert_eq!(TextureDescriptor::mip_chain_length(4096, 17), 13);
    }

    #[test]
    fn packed_size_of_rgba8_square() {
        let desc = TextureDescriptor::new_2d(
            TextureFormat::Rgba8Unorm,
            4096,
            4096,
            TextureUsage::SHADER_READ,
        );
        assert_eq!(desc.packed_byte_size(), 64 * 1024 * 1024);
    }

    #[test]
    fn compressed_sizes_round_up_to_blocks() {
        assert_eq!(TextureFormat::Bc7RgbaUnorm.image_size(5, 5), 4 * 16);
        assert_eq!(TextureFormat::Astc4x4Unorm.bytes_per_row(8), 32);
    }

    #[test]
    fn descriptors_differing_in_usage_are_distinct() {
        let a = TextureDescriptor::new_2d(TextureFormat::R8Unorm, 4, 4, TextureUsage::SHADER_READ);
        let b = TextureDescriptor {
            usage: TextureUsage::SHADER_READ | TextureUsage::RENDER_TARGET,
            ..a
        };
        assert_ne!(a, b);
    }

    #[test]
    fn usage_flags_compose() {
        let usage = TextureUsage::SHADER_READ | TextureUsage::COPY_DST;
        assert!(usage.contains(TextureUsage::COPY_DST));
        assert!(!usage.contains(TextureUsage::RENDER_TARGET));
        assert_eq!(format!("{usage:?}"), "TextureUsage(SHADER_READ | COPY_DST)");
    }

    #[test]
    fn format_classification() {
        assert!(TextureFormat::R8Unorm.is_single_channel());
        assert!(!TextureFormat::Depth32Float.is_single_channel());
        assert!(TextureFormat::Depth32Float.is_depth());
        assert!(!TextureFormat::Depth32Float.is_float());
        assert!(TextureFormat::Rgba16Float.is_float());
        assert!(TextureFormat::Bc7RgbaUnormSrgb.is_srgb());
        assert_eq!(
            TextureFormat::Etc2Rgba8Unorm.compression_family(),
            Some(CompressionFamily::Etc2)
        );
    }
}
