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

//! Ready-made device profiles for the headless backend.

use lumen_core::renderer::{ArgumentBuffersTier, DeviceProfile, FeatureTier, HostClass};

const GIB: u64 = 1024 * 1024 * 1024;

fn families_up_to(top: u8) -> Vec<FeatureTier> {
    [
        FeatureTier::Family4,
        FeatureTier::Family5,
        FeatureTier::Family6,
        FeatureTier::Family7,
        FeatureTier::Family8,
        FeatureTier::Family9,
    ]
    .into_iter()
    .filter(|t| t.family().is_some_and(|f| f <= top))
    .collect()
}

/// A modern integrated GPU with unified memory, Family4 through Family9.
pub fn integrated_family9() -> DeviceProfile {
    DeviceProfile {
        name: "Headless Integrated (Family9)".to_string(),
        registry_id: 0x1000,
        supported_tiers: families_up_to(9),
        argument_buffers_tier: ArgumentBuffersTier::Tier2,
        is_low_power: false,
        is_removable: false,
        has_unified_memory: true,
        recommended_max_working_set_size: 8 * GIB,
        max_threads_per_threadgroup: 1024,
        max_buffer_length: 4 * GIB,
        max_argument_buffer_sampler_count: 1024,
        host: HostClass::Desktop,
        supports_heaps: true,
    }
}

/// A discrete desktop GPU on the desktop tier.
pub fn discrete_desktop() -> DeviceProfile {
    DeviceProfile {
        name: "Headless Discrete (Desktop2)".to_string(),
        registry_id: 0x2000,
        supported_tiers: vec![FeatureTier::Desktop2],
        argument_buffers_tier: ArgumentBuffersTier::Tier2,
        is_low_power: false,
        is_removable: false,
        has_unified_memory: false,
        recommended_max_working_set_size: 8 * GIB,
        max_threads_per_threadgroup: 1024,
        max_buffer_length: 2 * GIB,
        max_argument_buffer_sampler_count: 128,
        host: HostClass::Desktop,
        supports_heaps: true,
    }
}

/// A power-efficient desktop GPU without heap support.
pub fn low_power_desktop() -> DeviceProfile {
    DeviceProfile {
        name: "Headless Low Power (Desktop2)".to_string(),
        registry_id: 0x3000,
        supported_tiers: vec![FeatureTier::Desktop2],
        argument_buffers_tier: ArgumentBuffersTier::Tier1,
        is_low_power: true,
        is_removable: false,
        has_unified_memory: false,
        recommended_max_working_set_size: 3 * GIB / 2,
        max_threads_per_threadgroup: 1024,
        max_buffer_length: GIB,
        max_argument_buffer_sampler_count: 16,
        host: HostClass::Desktop,
        supports_heaps: false,
    }
}

/// An external, hot-pluggable desktop GPU.
pub fn external_desktop() -> DeviceProfile {
    DeviceProfile {
        name: "Headless External (Desktop2)".to_string(),
        registry_id: 0x4000,
        is_removable: true,
        ..discrete_desktop()
    }
}

/// A mid-range phone GPU, Family4 through Family6.
pub fn mobile_family6() -> DeviceProfile {
    DeviceProfile {
        name: "Headless Mobile (Family6)".to_string(),
        registry_id: 0x5000,
        supported_tiers: families_up_to(6),
        argument_buffers_tier: ArgumentBuffersTier::Tier1,
        is_low_power: true,
        is_removable: false,
        has_unified_memory: true,
        recommended_max_working_set_size: 2 * GIB,
        max_threads_per_threadgroup: 512,
        max_buffer_length: GIB,
        max_argument_buffer_sampler_count: 16,
        host: HostClass::Mobile,
        supports_heaps: true,
    }
}

/// A device that belongs to no supported tier.
pub fn legacy() -> DeviceProfile {
    DeviceProfile {
        name: "Headless Legacy".to_string(),
        registry_id: 0x6000,
        supported_tiers: Vec::new(),
        argument_buffers_tier: ArgumentBuffersTier::Tier1,
        is_low_power: true,
        is_removable: false,
        has_unified_memory: true,
        recommended_max_working_set_size: GIB / 2,
        max_threads_per_threadgroup: 256,
        max_buffer_length: GIB / 4,
        max_argument_buffer_sampler_count: 16,
        host: HostClass::Mobile,
        supports_heaps: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::renderer::CapabilityMatrix;

    #[test]
    fn profiles_detect_their_advertised_tier() {
        assert_eq!(
            CapabilityMatrix::detect(&integrated_family9()).map(|m| m.tier),
            Ok(FeatureTier::Family9)
        );
        assert_eq!(
            CapabilityMatrix::detect(&mobile_family6()).map(|m| m.tier),
            Ok(FeatureTier::Family6)
        );
        assert_eq!(
            CapabilityMatrix::detect(&discrete_desktop()).map(|m| m.tier),
            Ok(FeatureTier::Desktop2)
        );
        assert!(CapabilityMatrix::detect(&legacy()).is_err());
    }
}
