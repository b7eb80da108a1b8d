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

//! Texture recycling under a memory budget.
//!
//! Released textures wait in idle buckets keyed by their exact descriptor and are
//! handed out again before anything new is allocated. Idle textures age out
//! during maintenance and are evicted by priority when memory pressure rises.

mod heap;
mod strategy;

pub use heap::{HeapAllocation, HeapStatistics};
pub use strategy::{Allocation, AllocationStrategy, Backing, DirectStrategy, HeapStrategy};

use crate::device_context::DeviceContext;
use crate::error::AllocationError;
use lumen_core::config::EngineConfiguration;
use lumen_core::platform::MemoryPressure;
use lumen_core::renderer::{GpuTexture, ResourcePriority, TextureDescriptor, TextureId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Default time an idle texture survives maintenance.
pub const DEFAULT_MAX_IDLE_AGE: Duration = Duration::from_secs(30);

/// Construction parameters of a [`ResourcePool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Size of the placement heap. `None` allocates every texture directly.
    pub heap_size: Option<u64>,
    /// Upper bound on pool memory when allocating directly.
    pub memory_cap: Option<u64>,
    /// Idle textures at least this old are evicted by maintenance.
    pub max_idle_age: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            heap_size: None,
            memory_cap: None,
            max_idle_age: DEFAULT_MAX_IDLE_AGE,
        }
    }
}

impl PoolConfig {
    /// Derives the pool parameters from the engine configuration.
    ///
    /// With heaps enabled the heap is as large as the configured memory cap, or
    /// half the device working set when there is no cap.
    pub fn from_configuration(configuration: &EngineConfiguration, working_set: u64) -> Self {
        let heap_size = configuration
            .features
            .heap_usage
            .then(|| configuration.memory_cap_bytes.unwrap_or(working_set / 2));
        Self {
            heap_size,
            memory_cap: configuration.memory_cap_bytes,
            max_idle_age: DEFAULT_MAX_IDLE_AGE,
        }
    }
}

/// A texture checked out of a [`ResourcePool`].
///
/// Owned by exactly one caller until handed back with [`ResourcePool::release`].
#[derive(Debug, PartialEq, Eq)]
pub struct PooledTexture {
    texture: GpuTexture,
    priority: ResourcePriority,
}

impl PooledTexture {
    /// The texture.
    pub fn texture(&self) -> &GpuTexture {
        &self.texture
    }

    /// The backend handle.
    pub fn id(&self) -> TextureId {
        self.texture.id
    }

    /// The descriptor it was acquired with.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.texture.descriptor
    }

    /// The eviction priority it will carry once idle.
    pub fn priority(&self) -> ResourcePriority {
        self.priority
    }
}

/// What one eviction pass removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaintenanceReport {
    /// Idle textures destroyed.
    pub evicted: usize,
    /// Bytes returned to the device or heap.
    pub freed_bytes: u64,
}

impl MaintenanceReport {
    fn merge(&mut self, other: MaintenanceReport) {
        self.evicted += other.evicted;
        self.freed_bytes += other.freed_bytes;
    }
}

/// A snapshot of pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatistics {
    /// Textures currently checked out.
    pub live_count: usize,
    /// Textures waiting for reuse.
    pub idle_count: usize,
    /// Bytes of checked-out textures.
    pub live_bytes: u64,
    /// Bytes of idle textures.
    pub idle_bytes: u64,
    /// Textures created since construction.
    pub allocations: u64,
    /// Acquisitions served from the idle set.
    pub reuse_hits: u64,
    /// Idle textures destroyed since construction.
    pub evictions: u64,
    /// Name of the allocation strategy.
    pub strategy: &'static str,
    /// Heap counters, when heap-backed.
    pub heap: Option<HeapStatistics>,
}

#[derive(Debug)]
struct IdleEntry {
    texture: GpuTexture,
    backing: Backing,
    priority: ResourcePriority,
    released_at: Instant,
}

#[derive(Debug)]
struct PoolState {
    strategy: Box<dyn AllocationStrategy>,
    idle: HashMap<TextureDescriptor, Vec<IdleEntry>>,
    live: HashMap<TextureId, Backing>,
    live_bytes: u64,
    idle_bytes: u64,
    pressure: MemoryPressure,
    allocations: u64,
    reuse_hits: u64,
    evictions: u64,
}

impl PoolState {
    fn idle_count(&self) -> usize {
        self.idle.values().map(Vec::len).sum()
    }
}

/// Recycles device textures.
///
/// Every allocation goes through one [`AllocationStrategy`], picked at
/// construction. All bookkeeping sits behind a single mutex, so the pool can be
/// shared between threads behind an `Arc`.
#[derive(Debug)]
pub struct ResourcePool {
    context: Arc<DeviceContext>,
    max_idle_age: Duration,
    state: Mutex<PoolState>,
}

impl ResourcePool {
    /// Creates a pool on `context`.
    ///
    /// A heap is created when `config.heap_size` is set and the device supports
    /// heaps. If heap creation fails the pool allocates directly instead.
    pub fn new(context: Arc<DeviceContext>, config: PoolConfig) -> Self {
        let strategy: Box<dyn AllocationStrategy> = match config.heap_size {
            Some(size) if context.supports_heaps() => {
                match HeapStrategy::new(context.device().as_ref(), size) {
                    Ok(strategy) => Box::new(strategy),
                    Err(e) => {
                        log::warn!("Heap of {size} bytes unavailable ({e}), allocating directly.");
                        Box::new(DirectStrategy::new(config.memory_cap))
                    }
                }
            }
            Some(_) => {
                log::info!("Device has no heap support, allocating textures directly.");
                Box::new(DirectStrategy::new(config.memory_cap))
            }
            None => Box::new(DirectStrategy::new(config.memory_cap)),
        };
        Self::with_strategy(context, strategy, config.max_idle_age)
    }

    /// Creates a pool around an explicit allocation strategy.
    pub fn with_strategy(
        context: Arc<DeviceContext>,
        strategy: Box<dyn AllocationStrategy>,
        max_idle_age: Duration,
    ) -> Self {
        log::debug!("Resource pool using the {} strategy", strategy.name());
        Self {
            context,
            max_idle_age,
            state: Mutex::new(PoolState {
                strategy,
                idle: HashMap::new(),
                live: HashMap::new(),
                live_bytes: 0,
                idle_bytes: 0,
                pressure: MemoryPressure::Normal,
                allocations: 0,
                reuse_hits: 0,
                evictions: 0,
            }),
        }
    }

    /// The device context the pool allocates on.
    pub fn context(&self) -> &Arc<DeviceContext> {
        &self.context
    }

    /// Checks out a texture matching `descriptor` exactly.
    ///
    /// An idle texture with an equal descriptor is reused without allocating.
    /// Otherwise a new one is created; if the pool is at capacity, idle
    /// textures are evicted first to make room.
    ///
    /// ## Errors
    /// [`AllocationError::AllocationFailed`] when neither the heap nor a
    /// direct allocation can hold the texture within the budget.
    pub fn acquire(
        &self,
        descriptor: &TextureDescriptor,
        priority: ResourcePriority,
    ) -> Result<PooledTexture, AllocationError> {
        let mut state = self.state.lock().unwrap();

        if let Some(entry) = state.idle.get_mut(descriptor).and_then(Vec::pop) {
            let size = entry.backing.size();
            state.idle_bytes -= size;
            state.live_bytes += size;
            state.live.insert(entry.texture.id, entry.backing);
            state.reuse_hits += 1;
            if state.idle.get(descriptor).is_some_and(Vec::is_empty) {
                state.idle.remove(descriptor);
            }
            log::trace!("Reused idle texture {:?}", entry.texture.id);
            return Ok(PooledTexture {
                texture: entry.texture,
                priority,
            });
        }

        let device = self.context.device().as_ref();
        if let Some(capacity) = state.strategy.capacity() {
            let size = device.heap_texture_size_and_align(descriptor).size;
            let needed = state.live_bytes + state.idle_bytes + size;
            if needed > capacity && state.idle_bytes > 0 {
                let target = capacity.saturating_sub(state.live_bytes + size);
                let report = self.evict_to(&mut state, target);
                log::debug!(
                    "Evicted {} idle textures ({} bytes) to make room",
                    report.evicted,
                    report.freed_bytes
                );
            }
        }

        let pool_bytes = state.live_bytes + state.idle_bytes;
        let allocation = state
            .strategy
            .allocate(device, descriptor, pool_bytes)
            .inspect_err(|e| log::warn!("Texture allocation failed: {e}"))?;
        state.allocations += 1;
        state.live_bytes += allocation.backing.size();
        state.live.insert(allocation.texture, allocation.backing);

        Ok(PooledTexture {
            texture: GpuTexture {
                id: allocation.texture,
                descriptor: *descriptor,
            },
            priority,
        })
    }

    /// Returns a texture to the idle set. The memory stays allocated.
    ///
    /// ## Errors
    /// [`AllocationError::UnknownResource`] when the texture was not checked out
    /// of this pool.
    pub fn release(&self, texture: PooledTexture) -> Result<(), AllocationError> {
        let mut state = self.state.lock().unwrap();
        let id = texture.id();
        let backing = state
            .live
            .remove(&id)
            .ok_or(AllocationError::UnknownResource(id))?;
        let size = backing.size();
        state.live_bytes -= size;
        state.idle_bytes += size;
        state
            .idle
            .entry(texture.texture.descriptor)
            .or_default()
            .push(IdleEntry {
                texture: texture.texture,
                backing,
                priority: texture.priority,
                released_at: Instant::now(),
            });
        Ok(())
    }

    /// Evicts aged idle textures, and more by priority under elevated pressure.
    ///
    /// Textures idle for at least the configured age are destroyed. When the
    /// recorded pressure is above normal, idle memory is then cut to the
    /// pressure's reduction factor of what it was when the pass started.
    pub fn perform_maintenance(&self) -> MaintenanceReport {
        let mut state = self.state.lock().unwrap();
        let idle_before = state.idle_bytes;
        let now = Instant::now();
        let max_age = self.max_idle_age;

        let expired: Vec<IdleEntry> = state
            .idle
            .values_mut()
            .flat_map(|bucket| {
                let (old, young): (Vec<_>, Vec<_>) = bucket
                    .drain(..)
                    .partition(|e| now.saturating_duration_since(e.released_at) >= max_age);
                *bucket = young;
                old
            })
            .collect();
        state.idle.retain(|_, bucket| !bucket.is_empty());
        let mut report = self.destroy(&mut state, expired);

        if state.pressure.is_elevated() {
            let target = scaled(idle_before, state.pressure.cache_reduction_factor());
            report.merge(self.evict_to(&mut state, target));
        }
        if report.evicted > 0 {
            log::debug!(
                "Pool maintenance evicted {} textures ({} bytes)",
                report.evicted,
                report.freed_bytes
            );
        }
        report
    }

    /// Records the memory pressure and evicts idle textures down to its
    /// reduction factor right away.
    pub fn set_memory_pressure(&self, pressure: MemoryPressure) -> MaintenanceReport {
        let mut state = self.state.lock().unwrap();
        state.pressure = pressure;
        let target = scaled(state.idle_bytes, pressure.cache_reduction_factor());
        let report = self.evict_to(&mut state, target);
        if pressure.is_elevated() {
            log::warn!(
                "Memory pressure {pressure:?}: evicted {} idle textures, {} idle bytes remain",
                report.evicted,
                state.idle_bytes
            );
        }
        report
    }

    /// Lowers the pool's memory bound to `limit` until it is cleared with
    /// `None`. Idle textures over the new bound are evicted right away.
    ///
    /// The limit only ever tightens the bound the pool was built with.
    pub fn set_memory_limit(&self, limit: Option<u64>) -> MaintenanceReport {
        let mut state = self.state.lock().unwrap();
        state.strategy.set_memory_limit(limit);
        let Some(capacity) = state.strategy.capacity() else {
            return MaintenanceReport::default();
        };
        let target = capacity.saturating_sub(state.live_bytes);
        let report = self.evict_to(&mut state, target);
        log::info!(
            "Pool memory bound is now {capacity} bytes, evicted {} idle textures",
            report.evicted
        );
        report
    }

    /// The upper bound on pool memory, if any.
    pub fn capacity(&self) -> Option<u64> {
        self.state.lock().unwrap().strategy.capacity()
    }

    /// The last recorded memory pressure.
    pub fn memory_pressure(&self) -> MemoryPressure {
        self.state.lock().unwrap().pressure
    }

    /// Bytes held by the pool, live and idle.
    pub fn memory_usage(&self) -> u64 {
        let state = self.state.lock().unwrap();
        state.live_bytes + state.idle_bytes
    }

    /// Bytes held by idle textures.
    pub fn idle_memory(&self) -> u64 {
        self.state.lock().unwrap().idle_bytes
    }

    /// Destroys every idle texture.
    pub fn clear_idle(&self) -> MaintenanceReport {
        let mut state = self.state.lock().unwrap();
        self.evict_to(&mut state, 0)
    }

    /// A snapshot of the pool counters.
    pub fn statistics(&self) -> PoolStatistics {
        let state = self.state.lock().unwrap();
        PoolStatistics {
            live_count: state.live.len(),
            idle_count: state.idle_count(),
            live_bytes: state.live_bytes,
            idle_bytes: state.idle_bytes,
            allocations: state.allocations,
            reuse_hits: state.reuse_hits,
            evictions: state.evictions,
            strategy: state.strategy.name(),
            heap: state.strategy.heap_statistics(),
        }
    }

    /// Evicts idle textures, lowest priority and oldest first, until idle memory
    /// is at most `target` bytes.
    fn evict_to(&self, state: &mut PoolState, target: u64) -> MaintenanceReport {
        if state.idle_bytes <= target {
            return MaintenanceReport::default();
        }
        let mut candidates: Vec<IdleEntry> = state.idle.drain().flat_map(|(_, v)| v).collect();
        candidates.sort_by_key(|e| (e.priority, e.released_at));

        let mut remaining = state.idle_bytes;
        let mut victims = Vec::new();
        let mut kept = Vec::new();
        for entry in candidates {
            if remaining > target {
                remaining -= entry.backing.size();
                victims.push(entry);
            } else {
                kept.push(entry);
            }
        }
        for entry in kept {
            state
                .idle
                .entry(entry.texture.descriptor)
                .or_default()
                .push(entry);
        }
        self.destroy(state, victims)
    }

    fn destroy(&self, state: &mut PoolState, entries: Vec<IdleEntry>) -> MaintenanceReport {
        let device = self.context.device().as_ref();
        let mut report = MaintenanceReport::default();
        for entry in entries {
            let size = entry.backing.size();
            state.strategy.free(device, entry.texture.id, entry.backing);
            state.idle_bytes -= size;
            state.evictions += 1;
            report.evicted += 1;
            report.freed_bytes += size;
        }
        report
    }
}

fn scaled(bytes: u64, factor: f64) -> u64 {
    (bytes as f64 * factor).floor() as u64
}

impl Drop for ResourcePool {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        let device = self.context.device().as_ref();
        for entry in state.idle.drain().flat_map(|(_, v)| v) {
            state.strategy.free(device, entry.texture.id, entry.backing);
        }
        state.idle_bytes = 0;
        if state.live.is_empty() {
            state.strategy.teardown(device);
        } else {
            log::warn!(
                "Resource pool dropped with {} textures still checked out",
                state.live.len()
            );
        }
    }
}
