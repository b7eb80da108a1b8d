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

use super::command_buffer::{CommandLog, HeadlessCommandBuffer};
use lumen_core::renderer::{
    CommandBuffer, DeviceProfile, DeviceProvider, GpuDevice, HeapId, QueueId, ResourceError,
    SamplerDescriptor, SamplerId, SizeAndAlign, TextureDescriptor, TextureId,
    MAX_TEXTURE_DIMENSION_2D,
};
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Alignment, and size granularity, of every heap placement.
pub const HEAP_PLACEMENT_ALIGNMENT: u64 = 4096;

#[derive(Debug)]
enum Placement {
    Direct { bytes: u64 },
    Heap { heap: HeapId, range: Range<u64> },
}

#[derive(Debug)]
struct TextureRecord {
    descriptor: TextureDescriptor,
    placement: Placement,
    contents: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct DeviceState {
    textures: HashMap<TextureId, TextureRecord>,
    heaps: HashMap<HeapId, u64>,
    allocated_bytes: u64,
    textures_created: u64,
    queues: usize,
    samplers: usize,
    uploads: u64,
}

/// A GPU device that lives entirely in host memory.
pub struct HeadlessDevice {
    profile: DeviceProfile,
    memory_budget: Option<u64>,
    next_id: AtomicU64,
    lost: AtomicBool,
    fail_commits: Arc<AtomicBool>,
    refuse_command_buffers: AtomicBool,
    state: Mutex<DeviceState>,
    log: Arc<CommandLog>,
}

impl fmt::Debug for HeadlessDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessDevice")
            .field("name", &self.profile.name)
            .field("lost", &self.lost.load(Ordering::Relaxed))
            .finish()
    }
}

impl HeadlessDevice {
    /// Creates a device reporting `profile`, with no memory limit.
    pub fn new(profile: DeviceProfile) -> Self {
        Self {
            profile,
            memory_budget: None,
            next_id: AtomicU64::new(1),
            lost: AtomicBool::new(false),
            fail_commits: Arc::new(AtomicBool::new(false)),
            refuse_command_buffers: AtomicBool::new(false),
            state: Mutex::new(DeviceState::default()),
            log: Arc::new(CommandLog::default()),
        }
    }

    /// Limits the bytes of textures and heaps the device will hand out.
    pub fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.memory_budget = Some(bytes);
        self
    }

    /// Simulates device removal: every later creation call fails.
    pub fn lose_device(&self) {
        log::warn!("Headless device '{}' marked as lost.", self.profile.name);
        self.lost.store(true, Ordering::Release);
    }

    /// Makes every later commit report an execution error.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::Release);
    }

    /// Makes command buffer creation fail with a backend error while the
    /// device itself stays usable.
    pub fn set_refuse_command_buffers(&self, refuse: bool) {
        self.refuse_command_buffers.store(refuse, Ordering::Release);
    }

    /// The log of executed command buffers.
    pub fn command_log(&self) -> Arc<CommandLog> {
        Arc::clone(&self.log)
    }

    /// Textures currently alive.
    pub fn live_texture_count(&self) -> usize {
        self.state.lock().unwrap().textures.len()
    }

    /// Textures ever created, including destroyed ones.
    pub fn textures_created(&self) -> u64 {
        self.state.lock().unwrap().textures_created
    }

    /// Bytes held by live dedicated textures and heaps.
    pub fn allocated_bytes(&self) -> u64 {
        self.state.lock().unwrap().allocated_bytes
    }

    /// Queues created so far.
    pub fn queue_count(&self) -> usize {
        self.state.lock().unwrap().queues
    }

    /// Samplers created so far.
    pub fn sampler_count(&self) -> usize {
        self.state.lock().unwrap().samplers
    }

    /// Level uploads performed so far.
    pub fn upload_count(&self) -> u64 {
        self.state.lock().unwrap().uploads
    }

    /// The descriptor of a live texture.
    pub fn texture_descriptor(&self, texture: TextureId) -> Option<TextureDescriptor> {
        self.state
            .lock()
            .unwrap()
            .textures
            .get(&texture)
            .map(|r| r.descriptor)
    }

    /// The last base-level upload to a live texture.
    pub fn texture_contents(&self, texture: TextureId) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .textures
            .get(&texture)
            .and_then(|r| r.contents.clone())
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn ensure_alive(&self) -> Result<(), ResourceError> {
        if self.lost.load(Ordering::Acquire) {
            Err(ResourceError::DeviceLost)
        } else {
            Ok(())
        }
    }

    fn validate_descriptor(descriptor: &TextureDescriptor) -> Result<(), ResourceError> {
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(ResourceError::Backend("zero-sized texture".to_string()));
        }
        if descriptor.width > MAX_TEXTURE_DIMENSION_2D || descriptor.height > MAX_TEXTURE_DIMENSION_2D
        {
            return Err(ResourceError::Unsupported(format!(
                "{}x{} exceeds the maximum texture dimension",
                descriptor.width, descriptor.height
            )));
        }
        Ok(())
    }

    fn reserve(&self, state: &mut DeviceState, bytes: u64) -> Result<(), ResourceError> {
        if let Some(budget) = self.memory_budget {
            if state.allocated_bytes + bytes > budget {
                return Err(ResourceError::OutOfMemory { requested: bytes });
            }
        }
        state.allocated_bytes += bytes;
        Ok(())
    }
}

impl GpuDevice for HeadlessDevice {
    fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    fn new_command_queue(&self, label: &str) -> Result<QueueId, ResourceError> {
        self.ensure_alive()?;
        let id = QueueId(self.next_id());
        self.state.lock().unwrap().queues += 1;
        log::debug!("Headless queue '{label}' created: {id:?}");
        Ok(id)
    }

    fn new_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        self.ensure_alive()?;
        let id = SamplerId(self.next_id());
        self.state.lock().unwrap().samplers += 1;
        log::debug!("Headless sampler '{}' created: {id:?}", descriptor.label);
        Ok(id)
    }

    fn new_heap(&self, size: u64) -> Result<HeapId, ResourceError> {
        self.ensure_alive()?;
        if !self.profile.supports_heaps {
            return Err(ResourceError::Unsupported("placement heaps".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        self.reserve(&mut state, size)?;
        let id = HeapId(self.next_id());
        state.heaps.insert(id, size);
        Ok(id)
    }

    fn destroy_heap(&self, heap: HeapId) {
        let mut state = self.state.lock().unwrap();
        let occupied = state
            .textures
            .values()
            .any(|r| matches!(&r.placement, Placement::Heap { heap: h, .. } if *h == heap));
        if occupied {
            log::error!("Heap {heap:?} destroyed while textures are still placed in it.");
        }
        if let Some(size) = state.heaps.remove(&heap) {
            state.allocated_bytes -= size;
        }
    }

    fn heap_texture_size_and_align(&self, descriptor: &TextureDescriptor) -> SizeAndAlign {
        SizeAndAlign {
            size: descriptor
                .packed_byte_size()
                .div_ceil(HEAP_PLACEMENT_ALIGNMENT)
                * HEAP_PLACEMENT_ALIGNMENT,
            align: HEAP_PLACEMENT_ALIGNMENT,
        }
    }

    fn new_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        self.ensure_alive()?;
        Self::validate_descriptor(descriptor)?;
        let bytes = self.heap_texture_size_and_align(descriptor).size;
        let mut state = self.state.lock().unwrap();
        self.reserve(&mut state, bytes)?;
        let id = TextureId(self.next_id());
        state.textures.insert(
            id,
            TextureRecord {
                descriptor: *descriptor,
                placement: Placement::Direct { bytes },
                contents: None,
            },
        );
        state.textures_created += 1;
        Ok(id)
    }

    fn new_texture_in_heap(
        &self,
        heap: HeapId,
        descriptor: &TextureDescriptor,
        offset: u64,
    ) -> Result<TextureId, ResourceError> {
        self.ensure_alive()?;
        Self::validate_descriptor(descriptor)?;
        let size = self.heap_texture_size_and_align(descriptor).size;
        let mut state = self.state.lock().unwrap();
        let heap_size = *state
            .heaps
            .get(&heap)
            .ok_or_else(|| ResourceError::Backend(format!("unknown heap {heap:?}")))?;
        if offset % HEAP_PLACEMENT_ALIGNMENT != 0 || offset + size > heap_size {
            return Err(ResourceError::HeapOverflow { heap, offset, size });
        }
        let range = offset..offset + size;
        let overlaps = state.textures.values().any(|r| match &r.placement {
            Placement::Heap { heap: h, range: other } => {
                *h == heap && other.start < range.end && range.start < other.end
            }
            Placement::Direct { .. } => false,
        });
        if overlaps {
            return Err(ResourceError::Backend(format!(
                "placement {range:?} overlaps a live texture in heap {heap:?}"
            )));
        }
        let id = TextureId(self.next_id());
        state.textures.insert(
            id,
            TextureRecord {
                descriptor: *descriptor,
                placement: Placement::Heap { heap, range },
                contents: None,
            },
        );
        state.textures_created += 1;
        Ok(id)
    }

    fn destroy_texture(&self, texture: TextureId) {
        let mut state = self.state.lock().unwrap();
        match state.textures.remove(&texture) {
            Some(TextureRecord {
                placement: Placement::Direct { bytes },
                ..
            }) => state.allocated_bytes -= bytes,
            Some(_) => {}
            None => log::warn!("Destroying unknown texture {texture:?}"),
        }
    }

    fn write_texture(
        &self,
        texture: TextureId,
        mip_level: u32,
        data: &[u8],
        bytes_per_row: u64,
    ) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        let mut state = self.state.lock().unwrap();
        let record = state
            .textures
            .get_mut(&texture)
            .ok_or(ResourceError::InvalidHandle(texture))?;
        let desc = record.descriptor;
        if mip_level >= desc.mip_level_count {
            return Err(ResourceError::Backend(format!(
                "mip level {mip_level} out of range for {texture:?}"
            )));
        }
        let height = (desc.height >> mip_level).max(1) as u64;
        let width = (desc.width >> mip_level).max(1);
        if bytes_per_row < desc.format.bytes_per_row(width)
            || (data.len() as u64) < bytes_per_row * height
        {
            return Err(ResourceError::Backend(format!(
                "upload of {} bytes is too small for level {mip_level} of {texture:?}",
                data.len()
            )));
        }
        if mip_level == 0 {
            record.contents = Some(data.to_vec());
        }
        state.uploads += 1;
        Ok(())
    }

    fn new_command_buffer(&self, _queue: QueueId) -> Result<Box<dyn CommandBuffer>, ResourceError> {
        self.ensure_alive()?;
        if self.refuse_command_buffers.load(Ordering::Acquire) {
            return Err(ResourceError::Backend("command buffer allocation refused".into()));
        }
        Ok(Box::new(HeadlessCommandBuffer::new(
            Arc::clone(&self.log),
            Arc::clone(&self.fail_commits),
        )))
    }
}

/// Offers a fixed list of headless devices, in order.
#[derive(Debug, Default)]
pub struct HeadlessProvider {
    devices: Vec<Arc<HeadlessDevice>>,
}

impl HeadlessProvider {
    /// A provider enumerating `devices` in the given order.
    pub fn new(devices: Vec<Arc<HeadlessDevice>>) -> Self {
        Self { devices }
    }
}

impl DeviceProvider for HeadlessProvider {
    fn enumerate_devices(&self) -> Vec<Arc<dyn GpuDevice>> {
        self.devices
            .iter()
            .map(|d| Arc::clone(d) as Arc<dyn GpuDevice>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::profiles;
    use super::*;
    use lumen_core::renderer::{TextureFormat, TextureUsage};

    fn desc(size: u32) -> TextureDescriptor {
        TextureDescriptor::new_2d(
            TextureFormat::Rgba8Unorm,
            size,
            size,
            TextureUsage::SHADER_READ,
        )
    }

    #[test]
    fn heap_sizes_are_page_aligned() {
        let device = HeadlessDevice::new(profiles::integrated_family9());
        let sa = device.heap_texture_size_and_align(&desc(4096));
        assert_eq!(sa.size, 64 * 1024 * 1024);
        assert_eq!(sa.align, HEAP_PLACEMENT_ALIGNMENT);

        let small = device.heap_texture_size_and_align(&desc(1));
        assert_eq!(small.size, HEAP_PLACEMENT_ALIGNMENT);
    }

    #[test]
    fn overlapping_heap_placements_are_rejected() {
        let device = HeadlessDevice::new(profiles::integrated_family9());
        let heap = device.new_heap(1 << 20).unwrap();
        let first = device.new_texture_in_heap(heap, &desc(64), 0).unwrap();
        assert!(device.new_texture_in_heap(heap, &desc(64), 0).is_err());

        device.destroy_texture(first);
        assert!(device.new_texture_in_heap(heap, &desc(64), 0).is_ok());
    }

    #[test]
    fn placements_past_the_end_overflow() {
        let device = HeadlessDevice::new(profiles::integrated_family9());
        let heap = device.new_heap(16 * 1024).unwrap();
        assert!(matches!(
            device.new_texture_in_heap(heap, &desc(64), 0),
            Err(ResourceError::HeapOverflow { .. })
        ));
    }

    #[test]
    fn budget_limits_direct_allocations() {
        let device = HeadlessDevice::new(profiles::discrete_desktop()).with_memory_budget(8192);
        let a = device.new_texture(&desc(32)).unwrap();
        assert!(device.new_texture(&desc(32)).is_ok());
        assert_eq!(
            device.new_texture(&desc(32)),
            Err(ResourceError::OutOfMemory { requested: 4096 })
        );
        device.destroy_texture(a);
        assert!(device.new_texture(&desc(32)).is_ok());
    }

    #[test]
    fn lost_device_refuses_work() {
        let device = HeadlessDevice::new(profiles::integrated_family9());
        device.lose_device();
        assert_eq!(
            device.new_command_queue("probe"),
            Err(ResourceError::DeviceLost)
        );
        assert!(device.new_command_buffer(QueueId(0)).is_err());
    }

    #[test]
    fn uploads_are_size_checked() {
        let device = HeadlessDevice::new(profiles::integrated_family9());
        let tex = device.new_texture(&desc(2)).unwrap();
        assert!(device.write_texture(tex, 0, &[0u8; 8], 8).is_err());
        device.write_texture(tex, 0, &[7u8; 16], 8).unwrap();
        assert_eq!(device.texture_contents(tex), Some(vec![7u8; 16]));
    }
}
