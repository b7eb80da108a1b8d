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

//! Effect parameters handed to the effect-renderer collaborator, and the GPU
//! uniform layouts they are packed into.

use crate::renderer::texture::GpuTexture;
use bytemuck::{Pod, Zeroable};

/// The largest blur radius, in pixels, any effect accepts.
pub const MAX_BLUR_RADIUS: f32 = 64.0;

/// The threadgroup edge compute effects are written for.
pub const THREADGROUP_SIZE: u32 = 32;

/// Fixed binding slots shared by every effect shader.
pub mod bindings {
    /// Vertex buffer slot for vertex data.
    pub const VERTEX_VERTICES: usize = 0;
    /// Vertex buffer slot for uniforms.
    pub const VERTEX_UNIFORMS: usize = 1;
    /// Vertex buffer slot for per-instance data.
    pub const VERTEX_INSTANCE_DATA: usize = 2;

    /// Fragment buffer slot for uniforms.
    pub const FRAGMENT_UNIFORMS: usize = 0;

    /// Texture slot for the color source.
    pub const TEXTURE_COLOR: usize = 0;
    /// Texture slot for a normal map.
    pub const TEXTURE_NORMAL: usize = 1;
    /// Texture slot for a depth map.
    pub const TEXTURE_DEPTH: usize = 2;
    /// Texture slot for a mask or blend overlay.
    pub const TEXTURE_MASK: usize = 3;
    /// Texture slot for a lookup table.
    pub const TEXTURE_LUT: usize = 4;

    /// Sampler slot for the bilinear sampler.
    pub const SAMPLER_LINEAR: usize = 0;
    /// Sampler slot for the nearest sampler.
    pub const SAMPLER_NEAREST: usize = 1;
    /// Sampler slot for the trilinear sampler.
    pub const SAMPLER_MIPMAPPED: usize = 2;
}

/// Tonal and color adjustments. All fields are neutral at their defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAdjustment {
    /// Additive brightness, `-1..=1`.
    pub brightness: f32,
    /// Contrast multiplier, `1` is neutral.
    pub contrast: f32,
    /// Saturation multiplier, `1` is neutral.
    pub saturation: f32,
    /// Hue rotation in degrees.
    pub hue: f32,
    /// Gamma exponent, `1` is neutral.
    pub gamma: f32,
    /// Exposure in stops.
    pub exposure: f32,
    /// Highlight recovery, `-1..=1`.
    pub highlights: f32,
    /// Shadow lift, `-1..=1`.
    pub shadows: f32,
    /// White point shift, `-1..=1`.
    pub whites: f32,
    /// Black point shift, `-1..=1`.
    pub blacks: f32,
    /// Local contrast, `-1..=1`.
    pub clarity: f32,
    /// Saturation weighted toward muted colors, `-1..=1`.
    pub vibrance: f32,
}

impl Default for ColorAdjustment {
    fn default() -> Self {
        Self {
            brightness: 0.0,
            contrast: 1.0,
            saturation: 1.0,
            hue: 0.0,
            gamma: 1.0,
            exposure: 0.0,
            highlights: 0.0,
            shadows: 0.0,
            whites: 0.0,
            blacks: 0.0,
            clarity: 0.0,
            vibrance: 0.0,
        }
    }
}

/// GPU layout of [`ColorAdjustment`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ColorAdjustmentUniforms {
    /// `[brightness, contrast, saturation, hue]`
    pub basic: [f32; 4],
    /// `[gamma, exposure, highlights, shadows]`
    pub tone: [f32; 4],
    /// `[whites, blacks, clarity, vibrance]`
    pub range: [f32; 4],
}

impl From<&ColorAdjustment> for ColorAdjustmentUniforms {
    fn from(a: &ColorAdjustment) -> Self {
        Self {
            basic: [a.brightness, a.contrast, a.saturation, a.hue],
            tone: [a.gamma, a.exposure, a.highlights, a.shadows],
            range: [a.whites, a.blacks, a.clarity, a.vibrance],
        }
    }
}

/// A separable Gaussian blur.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurParameters {
    radius: f32,
}

impl BlurParameters {
    /// A blur of `radius` pixels, clamped to `0..=MAX_BLUR_RADIUS`.
    pub fn new(radius: f32) -> Self {
        let radius = if radius.is_nan() { 0.0 } else { radius };
        Self {
            radius: radius.clamp(0.0, MAX_BLUR_RADIUS),
        }
    }

    /// The clamped radius.
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Packs the parameters for a `width` x `height` source.
    pub fn uniforms(&self, width: u32, height: u32) -> BlurUniforms {
        BlurUniforms {
            texel_size: [1.0 / width.max(1) as f32, 1.0 / height.max(1) as f32],
            radius: self.radius,
            sigma: (self.radius / 3.0).max(f32::EPSILON),
        }
    }
}

/// GPU layout of [`BlurParameters`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BlurUniforms {
    /// Reciprocal source size.
    pub texel_size: [f32; 2],
    /// Kernel radius in pixels.
    pub radius: f32,
    /// Gaussian standard deviation.
    pub sigma: f32,
}

/// Photoshop-style blend modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum BlendMode {
    /// Source over.
    #[default]
    Normal = 0,
    /// Multiply.
    Multiply = 1,
    /// Screen.
    Screen = 2,
    /// Overlay.
    Overlay = 3,
    /// Soft light.
    SoftLight = 4,
    /// Hard light.
    HardLight = 5,
    /// Color dodge.
    ColorDodge = 6,
    /// Color burn.
    ColorBurn = 7,
    /// Darken.
    Darken = 8,
    /// Lighten.
    Lighten = 9,
    /// Difference.
    Difference = 10,
    /// Exclusion.
    Exclusion = 11,
    /// Linear add.
    Add = 12,
}

/// Blends an overlay texture over the source.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendParameters {
    /// The texture composited on top.
    pub overlay: GpuTexture,
    /// How the overlay combines with the source.
    pub mode: BlendMode,
    /// Overlay opacity, `0..=1`.
    pub opacity: f32,
}

impl BlendParameters {
    /// Packs the parameters for the GPU.
    pub fn uniforms(&self) -> BlendUniforms {
        BlendUniforms {
            opacity: self.opacity.clamp(0.0, 1.0),
            mode: self.mode as u32,
            _padding: [0; 2],
        }
    }
}

/// GPU layout of [`BlendParameters`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BlendUniforms {
    /// Overlay opacity.
    pub opacity: f32,
    /// [`BlendMode`] discriminant.
    pub mode: u32,
    _padding: [u32; 2],
}

/// One step of an image-processing chain.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectOperation {
    /// Tonal and color adjustment.
    ColorAdjust(ColorAdjustment),
    /// Gaussian blur.
    Blur(BlurParameters),
    /// Overlay blend.
    Blend(BlendParameters),
}

impl EffectOperation {
    /// A short name for logs and pass labels.
    pub fn label(&self) -> &'static str {
        match self {
            EffectOperation::ColorAdjust(_) => "color_adjust",
            EffectOperation::Blur(_) => "blur",
            EffectOperation::Blend(_) => "blend",
        }
    }
}

/// The compiled-pipeline cache collaborator.
pub trait PipelineCache: Send + Sync {
    /// Bytes held by cached pipelines.
    fn memory_usage(&self) -> u64;
    /// Drops pipelines that have not been used recently.
    fn perform_maintenance(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blur_radius_is_clamped() {
        assert_eq!(BlurParameters::new(200.0).radius(), MAX_BLUR_RADIUS);
        assert_eq!(BlurParameters::new(-3.0).radius(), 0.0);
        assert_eq!(BlurParameters::new(f32::NAN).radius(), 0.0);
        assert_eq!(BlurParameters::new(12.5).radius(), 12.5);
    }

    #[test]
    fn uniform_layouts_are_16_byte_multiples() {
        assert_eq!(std::mem::size_of::<ColorAdjustmentUniforms>(), 48);
        assert_eq!(std::mem::size_of::<BlurUniforms>(), 16);
        assert_eq!(std::mem::size_of::<BlendUniforms>(), 16);
    }

    #[test]
    fn color_uniforms_pack_in_order() {
        let adjustment = ColorAdjustment {
            brightness: 0.1,
            vibrance: 0.9,
            ..ColorAdjustment::default()
        };
        let uniforms = ColorAdjustmentUniforms::from(&adjustment);
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&uniforms));
        assert_eq!(floats[0], 0.1);
        assert_eq!(floats[1], 1.0);
        assert_eq!(floats[11], 0.9);
    }
}
