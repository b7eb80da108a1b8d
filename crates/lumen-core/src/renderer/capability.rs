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

//! Feature tiers and the capability matrix derived from them.
//!
//! Everything a device can do is a pure function of the highest feature tier it
//! belongs to, plus a handful of numeric limits read from its profile.

use crate::renderer::device::DeviceProfile;
use crate::renderer::texture::{CompressionFamily, TextureFormat};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed platform limit for 2D texture edges.
pub const MAX_TEXTURE_DIMENSION_2D: u32 = 16384;
/// Fixed platform limit for 3D texture edges.
pub const MAX_TEXTURE_DIMENSION_3D: u32 = 2048;
/// Fixed platform limit for cubemap faces.
pub const MAX_TEXTURE_DIMENSION_CUBE: u32 = 16384;
/// The smallest threadgroup size the compute paths are written for.
pub const MIN_THREADS_PER_THREADGROUP: u32 = 32;

/// A GPU feature family. Families are cumulative; `Desktop2` is the desktop line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureTier {
    /// Oldest supported mobile family.
    Family4,
    /// Mobile family 5.
    Family5,
    /// Mobile family 6.
    Family6,
    /// Mobile family 7.
    Family7,
    /// Mobile family 8.
    Family8,
    /// Newest mobile family.
    Family9,
    /// Desktop family 2.
    Desktop2,
}

impl FeatureTier {
    /// The order tiers are probed in during detection.
    pub const DETECTION_ORDER: [FeatureTier; 7] = [
        FeatureTier::Family9,
        FeatureTier::Family8,
        FeatureTier::Family7,
        FeatureTier::Family6,
        FeatureTier::Family5,
        FeatureTier::Family4,
        FeatureTier::Desktop2,
    ];

    /// The numeric family for mobile tiers, `None` for the desktop tier.
    pub fn family(self) -> Option<u8> {
        match self {
            FeatureTier::Family4 => Some(4),
            FeatureTier::Family5 => Some(5),
            FeatureTier::Family6 => Some(6),
            FeatureTier::Family7 => Some(7),
            FeatureTier::Family8 => Some(8),
            FeatureTier::Family9 => Some(9),
            FeatureTier::Desktop2 => None,
        }
    }

    /// Returns `true` for the desktop tier.
    pub fn is_desktop(self) -> bool {
        self == FeatureTier::Desktop2
    }

    fn family_at_least(self, family: u8) -> bool {
        self.family().is_some_and(|f| f >= family)
    }

    /// The score bonus a device on this tier earns during selection.
    ///
    /// Rank bonus, plus 50 for Family7 and above or the desktop tier.
    pub fn selection_bonus(self) -> u64 {
        let rank = match self {
            FeatureTier::Family4 => 40,
            FeatureTier::Family5 => 55,
            FeatureTier::Family6 | FeatureTier::Desktop2 => 70,
            FeatureTier::Family7 => 80,
            FeatureTier::Family8 => 90,
            FeatureTier::Family9 => 100,
        };
        let modern = if self.is_desktop() || self.family_at_least(7) {
            50
        } else {
            0
        };
        rank + modern
    }
}

/// Argument-buffer support level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ArgumentBuffersTier {
    /// Basic argument buffers.
    #[default]
    Tier1,
    /// Bindless argument buffers.
    Tier2,
}

impl ArgumentBuffersTier {
    /// The score bonus this tier earns during selection.
    pub fn selection_bonus(self) -> u64 {
        match self {
            ArgumentBuffersTier::Tier1 => 15,
            ArgumentBuffersTier::Tier2 => 30,
        }
    }
}

/// The class of host the device lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HostClass {
    /// Phones and tablets.
    Mobile,
    /// Laptops and desktops.
    #[default]
    Desktop,
}

/// Which block-compression families the device can sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompressionSupport {
    /// ASTC.
    pub astc: bool,
    /// BCn.
    pub bc: bool,
    /// ETC2.
    pub etc2: bool,
}

impl CompressionSupport {
    /// Returns `true` if formats of `family` can be sampled.
    pub fn supports(&self, family: CompressionFamily) -> bool {
        match family {
            CompressionFamily::Astc => self.astc,
            CompressionFamily::Bc => self.bc,
            CompressionFamily::Etc2 => self.etc2,
        }
    }
}

/// Boolean capabilities, each a pure function of the feature tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilityFlags {
    /// Dispatches whose grid is not a multiple of the threadgroup size.
    pub non_uniform_threadgroups: bool,
    /// Textures that are both read and written by one shader.
    pub read_write_textures: bool,
    /// Integer atomics on textures and buffers.
    pub atomics: bool,
    /// Atomics on 32-bit floats.
    pub float32_atomics: bool,
    /// SIMD-group reduction intrinsics.
    pub simd_reduction: bool,
    /// Queryable GPU counter sets.
    pub counter_sampling: bool,
    /// Sampleable compressed formats.
    pub compression: CompressionSupport,
}

impl CapabilityFlags {
    /// The capability table.
    pub fn for_tier(tier: FeatureTier) -> Self {
        let desktop = tier.is_desktop();
        Self {
            non_uniform_threadgroups: desktop || tier.family_at_least(4),
            read_write_textures: desktop || tier.family_at_least(4),
            atomics: desktop || tier.family_at_least(6),
            counter_sampling: desktop || tier.family_at_least(6),
            simd_reduction: tier.family_at_least(8),
            float32_atomics: tier.family_at_least(9),
            compression: CompressionSupport {
                astc: !desktop,
                etc2: !desktop,
                bc: desktop,
            },
        }
    }
}

/// Numeric device limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Threads per compute threadgroup.
    pub max_threads_per_threadgroup: u32,
    /// Largest buffer, in bytes.
    pub max_buffer_length: u64,
    /// Largest 2D texture edge.
    pub max_texture_dimension_2d: u32,
    /// Largest 3D texture edge.
    pub max_texture_dimension_3d: u32,
    /// Largest cubemap face edge.
    pub max_texture_dimension_cube: u32,
    /// Recommended working-set size, in bytes.
    pub recommended_max_working_set_size: u64,
    /// Samplers per argument buffer.
    pub max_argument_buffer_sampler_count: u32,
}

/// Stable identity of the selected hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareIdentity {
    /// Adapter name.
    pub name: String,
    /// Registry id, stable across runs.
    pub registry_id: u64,
}

/// Why a device cannot run the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    /// The device belongs to none of the known tiers.
    NoKnownTier,
    /// The device's tier is below the minimum.
    TierTooLow(FeatureTier),
    /// Threadgroups are smaller than [`MIN_THREADS_PER_THREADGROUP`].
    ThreadgroupTooSmall(u32),
}

impl fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityError::NoKnownTier => {
                write!(f, "device reports no supported feature tier")
            }
            CapabilityError::TierTooLow(tier) => {
                write!(f, "feature tier {tier:?} is not supported on this host")
            }
            CapabilityError::ThreadgroupTooSmall(threads) => write!(
                f,
                "{threads} threads per threadgroup, at least {MIN_THREADS_PER_THREADGROUP} required"
            ),
        }
    }
}

impl std::error::Error for CapabilityError {}

/// What the selected device can do. Computed once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityMatrix {
    /// The highest tier the device belongs to.
    pub tier: FeatureTier,
    /// Tier-derived feature flags.
    pub flags: CapabilityFlags,
    /// Argument-buffer support level.
    pub argument_buffers_tier: ArgumentBuffersTier,
    /// Numeric limits.
    pub limits: DeviceLimits,
    /// Hardware identity.
    pub identity: HardwareIdentity,
    /// Integrated, power-efficient adapter.
    pub is_low_power: bool,
    /// External or hot-pluggable adapter.
    pub is_removable: bool,
    /// CPU and GPU share memory.
    pub has_unified_memory: bool,
    /// Host class the device was found on.
    pub host: HostClass,
}

impl CapabilityMatrix {
    /// Returns the highest tier `profile` belongs to, probing in [`FeatureTier::DETECTION_ORDER`].
    pub fn detect_tier(profile: &DeviceProfile) -> Option<FeatureTier> {
        FeatureTier::DETECTION_ORDER
            .into_iter()
            .find(|tier| profile.supports_tier(*tier))
    }

    /// Builds and validates the matrix for `profile`.
    pub fn detect(profile: &DeviceProfile) -> Result<Self, CapabilityError> {
        let tier = Self::detect_tier(profile).ok_or(CapabilityError::NoKnownTier)?;
        let matrix = Self {
            tier,
            flags: CapabilityFlags::for_tier(tier),
            argument_buffers_tier: profile.argument_buffers_tier,
            limits: DeviceLimits {
                max_threads_per_threadgroup: profile.max_threads_per_threadgroup,
                max_buffer_length: profile.max_buffer_length,
                max_texture_dimension_2d: MAX_TEXTURE_DIMENSION_2D,
                max_texture_dimension_3d: MAX_TEXTURE_DIMENSION_3D,
                max_texture_dimension_cube: MAX_TEXTURE_DIMENSION_CUBE,
                recommended_max_working_set_size: profile.recommended_max_working_set_size,
                max_argument_buffer_sampler_count: profile.max_argument_buffer_sampler_count,
            },
            identity: HardwareIdentity {
                name: profile.name.clone(),
                registry_id: profile.registry_id,
            },
            is_low_power: profile.is_low_power,
            is_removable: profile.is_removable,
            has_unified_memory: profile.has_unified_memory,
            host: profile.host,
        };
        matrix.validate()?;
        Ok(matrix)
    }

    /// Checks the matrix against the engine's minimum requirements.
    ///
    /// Any Family tier is accepted. The desktop tier is accepted only on
    /// desktop hosts.
    pub fn validate(&self) -> Result<(), CapabilityError> {
        if self.tier.is_desktop() && self.host == HostClass::Mobile {
            return Err(CapabilityError::TierTooLow(self.tier));
        }
        if self.limits.max_threads_per_threadgroup < MIN_THREADS_PER_THREADGROUP {
            return Err(CapabilityError::ThreadgroupTooSmall(
                self.limits.max_threads_per_threadgroup,
            ));
        }
        Ok(())
    }

    /// Returns `true` if textures of `format` can be created and sampled.
    pub fn supports_format(&self, format: TextureFormat) -> bool {
        match format.compression_family() {
            Some(family) => self.flags.compression.supports(family),
            None => true,
        }
    }

    /// Every format this device can create.
    pub fn supported_formats(&self) -> Vec<TextureFormat> {
        TextureFormat::ALL
            .into_iter()
            .filter(|format| self.supports_format(*format))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(tiers: Vec<FeatureTier>, host: HostClass) -> DeviceProfile {
        DeviceProfile {
            name: "test".into(),
            registry_id: 1,
            supported_tiers: tiers,
            argument_buffers_tier: ArgumentBuffersTier::Tier2,
            is_low_power: false,
            is_removable: false,
            has_unified_memory: true,
            recommended_max_working_set_size: 1 << 30,
            max_threads_per_threadgroup: 1024,
            max_buffer_length: 1 << 30,
            max_argument_buffer_sampler_count: 16,
            host,
            supports_heaps: true,
        }
    }

    #[test]
    fn capability_table_is_exhaustive() {
        use FeatureTier::*;
        // (tier, non-uniform, rw textures, atomics, counters, simd, f32 atomics, astc, etc2, bc)
        let table = [
            (Family4, true, true, false, false, false, false, true, true, false),
            (Family5, true, true, false, false, false, false, true, true, false),
            (Family6, true, true, true, true, false, false, true, true, false),
            (Family7, true, true, true, true, false, false, true, true, false),
            (Family8, true, true, true, true, true, false, true, true, false),
            (Family9, true, true, true, true, true, true, true, true, false),
            (Desktop2, true, true, true, true, false, false, false, false, true),
        ];
        for (tier, nu, rw, at, cs, simd, f32a, astc, etc2, bc) in table {
            let f = CapabilityFlags::for_tier(tier);
            assert_eq!(f.non_uniform_threadgroups, nu, "{tier:?}");
            assert_eq!(f.read_write_textures, rw, "{tier:?}");
            assert_eq!(f.atomics, at, "{tier:?}");
            assert_eq!(f.counter_sampling, cs, "{tier:?}");
            assert_eq!(f.simd_reduction, simd, "{tier:?}");
            assert_eq!(f.float32_atomics, f32a, "{tier:?}");
            assert_eq!(f.compression.astc, astc, "{tier:?}");
            assert_eq!(f.compression.etc2, etc2, "{tier:?}");
            assert_eq!(f.compression.bc, bc, "{tier:?}");
        }
    }

    #[test]
    fn selection_bonus_includes_modern_bump() {
        assert_eq!(FeatureTier::Family4.selection_bonus(), 40);
        assert_eq!(FeatureTier::Family6.selection_bonus(), 70);
        assert_eq!(FeatureTier::Family7.selection_bonus(), 130);
        assert_eq!(FeatureTier::Family9.selection_bonus(), 150);
        assert_eq!(FeatureTier::Desktop2.selection_bonus(), 120);
    }

    #[test]
    fn detection_takes_the_highest_family() {
        let p = profile(
            vec![FeatureTier::Family5, FeatureTier::Family8, FeatureTier::Desktop2],
            HostClass::Desktop,
        );
        assert_eq!(CapabilityMatrix::detect_tier(&p), Some(FeatureTier::Family8));
    }

    #[test]
    fn texture_limits_are_platform_constants() {
        let m = CapabilityMatrix::detect(&profile(vec![FeatureTier::Family7], HostClass::Mobile))
            .unwrap();
        assert_eq!(m.limits.max_texture_dimension_2d, 16384);
        assert_eq!(m.limits.max_texture_dimension_3d, 2048);
        assert_eq!(m.limits.max_texture_dimension_cube, 16384);
    }

    #[test]
    fn validation_rejects_unknown_tiers_and_small_threadgroups() {
        assert_eq!(
            CapabilityMatrix::detect(&profile(vec![], HostClass::Desktop)),
            Err(CapabilityError::NoKnownTier)
        );

        let mut small = profile(vec![FeatureTier::Family9], HostClass::Mobile);
        small.max_threads_per_threadgroup = 16;
        assert_eq!(
            CapabilityMatrix::detect(&small),
            Err(CapabilityError::ThreadgroupTooSmall(16))
        );

        assert_eq!(
            CapabilityMatrix::detect(&profile(vec![FeatureTier::Desktop2], HostClass::Mobile)),
            Err(CapabilityError::TierTooLow(FeatureTier::Desktop2))
        );
    }

    #[test]
    fn compressed_formats_follow_tier() {
        let mobile =
            CapabilityMatrix::detect(&profile(vec![FeatureTier::Family6], HostClass::Mobile))
                .unwrap();
        assert!(mobile.supports_format(TextureFormat::Astc4x4Unorm));
        assert!(!mobile.supports_format(TextureFormat::Bc7RgbaUnorm));

        let desktop =
            CapabilityMatrix::detect(&profile(vec![FeatureTier::Desktop2], HostClass::Desktop))
                .unwrap();
        assert!(desktop.supported_formats().contains(&TextureFormat::Bc7RgbaUnorm));
        assert!(!desktop.supports_format(TextureFormat::Etc2Rgba8Unorm));
        assert!(desktop.supports_format(TextureFormat::Rgba16Float));
    }
}
