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

//! How pooled textures get their memory.

use super::heap::{HeapAllocation, HeapStatistics};
use crate::error::AllocationError;
use lumen_core::renderer::{GpuDevice, ResourceError, TextureDescriptor, TextureId};
use std::fmt;

/// Where a pooled texture's memory lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backing {
    /// A range carved from the pool's heap.
    Heap {
        /// Byte offset in the heap.
        offset: u64,
        /// Bytes carved.
        size: u64,
    },
    /// A dedicated device allocation.
    Direct {
        /// Bytes allocated.
        size: u64,
    },
}

impl Backing {
    /// Bytes this backing occupies.
    pub fn size(&self) -> u64 {
        match self {
            Backing::Heap { size, .. } | Backing::Direct { size } => *size,
        }
    }
}

/// A freshly created texture and its backing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// The texture handle.
    pub texture: TextureId,
    /// Where its memory lives.
    pub backing: Backing,
}

fn allocation_failed(
    descriptor: &TextureDescriptor,
    requested: u64,
    reason: impl Into<String>,
) -> AllocationError {
    AllocationError::AllocationFailed {
        width: descriptor.width,
        height: descriptor.height,
        format: descriptor.format,
        requested,
        reason: reason.into(),
    }
}

fn min_limit(capacity: u64, limit: Option<u64>) -> u64 {
    limit.map_or(capacity, |limit| limit.min(capacity))
}

fn direct_allocation(
    device: &dyn GpuDevice,
    descriptor: &TextureDescriptor,
    size: u64,
) -> Result<Allocation, AllocationError> {
    device
        .new_texture(descriptor)
        .map(|texture| Allocation {
            texture,
            backing: Backing::Direct { size },
        })
        .map_err(|e| allocation_failed(descriptor, size, e.to_string()))
}

/// Decides where new pooled textures live. Chosen once per pool.
pub trait AllocationStrategy: Send + fmt::Debug {
    /// A short name for logs and statistics.
    fn name(&self) -> &'static str;

    /// Creates a texture for `descriptor`.
    ///
    /// `pool_bytes` is what the pool already holds, live and idle.
    fn allocate(
        &mut self,
        device: &dyn GpuDevice,
        descriptor: &TextureDescriptor,
        pool_bytes: u64,
    ) -> Result<Allocation, AllocationError>;

    /// Destroys a texture created by [`AllocationStrategy::allocate`].
    fn free(&mut self, device: &dyn GpuDevice, texture: TextureId, backing: Backing);

    /// The upper bound on pool memory, if any.
    fn capacity(&self) -> Option<u64>;

    /// Tightens the bound below what the strategy was built with. `None`
    /// restores the original bound.
    fn set_memory_limit(&mut self, limit: Option<u64>);

    /// Heap counters, for heap-backed strategies.
    fn heap_statistics(&self) -> Option<HeapStatistics> {
        None
    }

    /// Releases strategy-owned device objects. Every texture must be freed first.
    fn teardown(&mut self, _device: &dyn GpuDevice) {}
}

/// Carves textures from one placement heap.
///
/// When the heap cannot place a texture (full or fragmented), the texture is
/// allocated directly instead, but only while the pool as a whole stays within
/// the heap's capacity.
#[derive(Debug)]
pub struct HeapStrategy {
    heap: HeapAllocation,
    limit: Option<u64>,
}

impl HeapStrategy {
    /// Creates a heap of `capacity` bytes on `device`.
    pub fn new(device: &dyn GpuDevice, capacity: u64) -> Result<Self, ResourceError> {
        let id = device.new_heap(capacity)?;
        log::info!("Texture pool heap created: {} MiB", capacity / (1024 * 1024));
        Ok(Self {
            heap: HeapAllocation::new(id, capacity),
            limit: None,
        })
    }
}

impl AllocationStrategy for HeapStrategy {
    fn name(&self) -> &'static str {
        "heap"
    }

    fn allocate(
        &mut self,
        device: &dyn GpuDevice,
        descriptor: &TextureDescriptor,
        pool_bytes: u64,
    ) -> Result<Allocation, AllocationError> {
        let placement = device.heap_texture_size_and_align(descriptor);
        let size = placement.size;
        let capacity = min_limit(self.heap.capacity(), self.limit);
        if pool_bytes + size > capacity {
            return Err(allocation_failed(
                descriptor,
                size,
                format!("pool would hold {} of {capacity} heap bytes", pool_bytes + size),
            ));
        }

        if let Some(offset) = self.heap.carve(size, placement.align) {
            match device.new_texture_in_heap(self.heap.id(), descriptor, offset) {
                Ok(texture) => {
                    return Ok(Allocation {
                        texture,
                        backing: Backing::Heap { offset, size },
                    })
                }
                Err(e) => {
                    log::warn!("Heap placement at {offset} failed ({e}), allocating directly.");
                    self.heap.release(offset, size);
                }
            }
        } else {
            log::debug!("Heap has no {size}-byte range free, allocating directly.");
        }
        direct_allocation(device, descriptor, size)
    }

    fn free(&mut self, device: &dyn GpuDevice, texture: TextureId, backing: Backing) {
        device.destroy_texture(texture);
        if let Backing::Heap { offset, size } = backing {
            self.heap.release(offset, size);
        }
    }

    fn capacity(&self) -> Option<u64> {
        Some(min_limit(self.heap.capacity(), self.limit))
    }

    fn set_memory_limit(&mut self, limit: Option<u64>) {
        self.limit = limit;
    }

    fn heap_statistics(&self) -> Option<HeapStatistics> {
        Some(self.heap.statistics())
    }

    fn teardown(&mut self, device: &dyn GpuDevice) {
        device.destroy_heap(self.heap.id());
    }
}

/// Gives every texture its own allocation, up to an optional memory cap.
#[derive(Debug, Default)]
pub struct DirectStrategy {
    memory_cap: Option<u64>,
    limit: Option<u64>,
}

impl DirectStrategy {
    /// A strategy refusing allocations that would take the pool past `memory_cap`.
    pub fn new(memory_cap: Option<u64>) -> Self {
        Self {
            memory_cap,
            limit: None,
        }
    }
}

impl AllocationStrategy for DirectStrategy {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn allocate(
        &mut self,
        device: &dyn GpuDevice,
        descriptor: &TextureDescriptor,
        pool_bytes: u64,
    ) -> Result<Allocation, AllocationError> {
        let size = device.heap_texture_size_and_align(descriptor).size;
        if let Some(cap) = self.capacity() {
            if pool_bytes + size > cap {
                return Err(allocation_failed(
                    descriptor,
                    size,
                    format!("pool would hold {} of {cap} capped bytes", pool_bytes + size),
                ));
            }
        }
        direct_allocation(device, descriptor, size)
    }

    fn free(&mut self, device: &dyn GpuDevice, texture: TextureId, _backing: Backing) {
        device.destroy_texture(texture);
    }

    fn capacity(&self) -> Option<u64> {
        match (self.memory_cap, self.limit) {
            (Some(cap), limit) => Some(min_limit(cap, limit)),
            (None, limit) => limit,
        }
    }

    fn set_memory_limit(&mut self, limit: Option<u64>) {
        self.limit = limit;
    }
}
