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

//! The device contract implemented by GPU backends.

use crate::renderer::capability::{ArgumentBuffersTier, FeatureTier, HostClass};
use crate::renderer::command::CommandBuffer;
use crate::renderer::error::ResourceError;
use crate::renderer::texture::{
    HeapId, QueueId, SamplerDescriptor, SamplerId, TextureDescriptor, TextureId,
};
use std::fmt::Debug;
use std::sync::Arc;

/// Static facts a device reports about itself.
///
/// This is the raw input to capability detection; the engine never reads it
/// directly after a [`CapabilityMatrix`](crate::renderer::CapabilityMatrix) exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProfile {
    /// Human-readable adapter name.
    pub name: String,
    /// A registry id that is stable across runs.
    pub registry_id: u64,
    /// Every feature tier the device reports membership of.
    pub supported_tiers: Vec<FeatureTier>,
    /// Argument-buffer support level.
    pub argument_buffers_tier: ArgumentBuffersTier,
    /// Integrated, power-efficient adapter.
    pub is_low_power: bool,
    /// External or hot-pluggable adapter.
    pub is_removable: bool,
    /// CPU and GPU share one memory pool.
    pub has_unified_memory: bool,
    /// The working-set size the driver recommends staying under.
    pub recommended_max_working_set_size: u64,
    /// The maximum threads in one compute threadgroup.
    pub max_threads_per_threadgroup: u32,
    /// The largest single buffer allocation.
    pub max_buffer_length: u64,
    /// The largest sampler count in one argument buffer.
    pub max_argument_buffer_sampler_count: u32,
    /// The host platform class.
    pub host: HostClass,
    /// Placement heaps are available.
    pub supports_heaps: bool,
}

impl DeviceProfile {
    /// Returns `true` if the device reports membership of `tier`.
    pub fn supports_tier(&self, tier: FeatureTier) -> bool {
        self.supported_tiers.contains(&tier)
    }
}

/// The size and alignment a device needs for a heap placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeAndAlign {
    /// Bytes the placement occupies.
    pub size: u64,
    /// Required alignment of the placement offset.
    pub align: u64,
}

/// A trait representing a GPU device that can create resources and command buffers.
///
/// All methods take `&self`; implementations handle their own synchronization.
pub trait GpuDevice: Send + Sync + Debug {
    /// Returns the static profile used for selection and capability detection.
    fn profile(&self) -> &DeviceProfile;

    /// Creates a command-submission queue.
    fn new_command_queue(&self, label: &str) -> Result<QueueId, ResourceError>;

    /// Creates a sampler state object.
    fn new_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError>;

    /// Creates a placement heap of `size` bytes.
    fn new_heap(&self, size: u64) -> Result<HeapId, ResourceError>;

    /// Releases a placement heap. Textures placed in it must already be destroyed.
    fn destroy_heap(&self, heap: HeapId);

    /// The size and alignment a texture with `descriptor` needs inside a heap.
    fn heap_texture_size_and_align(&self, descriptor: &TextureDescriptor) -> SizeAndAlign;

    /// Allocates a texture with its own dedicated memory.
    fn new_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Places a texture in `heap` at byte `offset`.
    fn new_texture_in_heap(
        &self,
        heap: HeapId,
        descriptor: &TextureDescriptor,
        offset: u64,
    ) -> Result<TextureId, ResourceError>;

    /// Releases a texture.
    fn destroy_texture(&self, texture: TextureId);

    /// Uploads tightly packed texel rows into one mip level.
    fn write_texture(
        &self,
        texture: TextureId,
        mip_level: u32,
        data: &[u8],
        bytes_per_row: u64,
    ) -> Result<(), ResourceError>;

    /// Creates a command buffer that submits to `queue`.
    fn new_command_buffer(&self, queue: QueueId) -> Result<Box<dyn CommandBuffer>, ResourceError>;
}

/// Enumerates the devices available to the process.
pub trait DeviceProvider: Send + Sync {
    /// Returns every usable device, in platform enumeration order.
    fn enumerate_devices(&self) -> Vec<Arc<dyn GpuDevice>>;
}
