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

use lumen_core::platform::MemoryPressure;
use lumen_core::renderer::{GpuDevice, GpuTexture, ResourcePriority};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// A cache entry as seen from outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedTexture {
    /// The texture.
    pub texture: GpuTexture,
    /// Eviction priority.
    pub priority: ResourcePriority,
    /// Bytes the texture occupies.
    pub bytes: u64,
}

#[derive(Debug)]
struct Entry {
    cached: CachedTexture,
    last_used: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, Entry>,
    bytes: u64,
}

/// Loaded textures by key, each tagged with an eviction priority.
///
/// The cache owns its textures and destroys them on eviction, removal or drop.
#[derive(Debug)]
pub struct TextureCache {
    device: Arc<dyn GpuDevice>,
    state: Mutex<CacheState>,
}

impl TextureCache {
    /// An empty cache whose textures live on `device`.
    pub fn new(device: Arc<dyn GpuDevice>) -> Self {
        Self {
            device,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Stores `texture` under `key` and returns the texture the key now maps to.
    ///
    /// An existing entry wins: callers may already hold its texture, so the
    /// new one is destroyed instead and the cached one is returned.
    pub fn insert(
        &self,
        key: impl Into<String>,
        texture: GpuTexture,
        priority: ResourcePriority,
    ) -> GpuTexture {
        let key = key.into();
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.entries.get_mut(&key) {
            existing.last_used = Instant::now();
            let cached = existing.cached.texture.clone();
            if cached.id != texture.id {
                log::debug!("Texture '{key}' is already cached, discarding the new upload");
                self.device.destroy_texture(texture.id);
            }
            return cached;
        }

        let bytes = texture.descriptor.packed_byte_size();
        state.bytes += bytes;
        state.entries.insert(
            key,
            Entry {
                cached: CachedTexture {
                    texture: texture.clone(),
                    priority,
                    bytes,
                },
                last_used: Instant::now(),
            },
        );
        texture
    }

    /// Looks up `key` and marks it as recently used.
    pub fn get(&self, key: &str) -> Option<GpuTexture> {
        let mut state = self.state.lock().unwrap();
        let entry = state.entries.get_mut(key)?;
        entry.last_used = Instant::now();
        Some(entry.cached.texture.clone())
    }

    /// Whether `key` is cached.
    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().unwrap().entries.contains_key(key)
    }

    /// Removes and destroys the texture under `key`.
    pub fn remove(&self, key: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.entries.remove(key) {
            Some(entry) => {
                state.bytes -= entry.cached.bytes;
                self.device.destroy_texture(entry.cached.texture.id);
                true
            }
            None => false,
        }
    }

    /// Every entry, in no particular order.
    pub fn entries(&self) -> Vec<(String, CachedTexture)> {
        let state = self.state.lock().unwrap();
        state
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.cached.clone()))
            .collect()
    }

    /// The number of cached textures.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes held by cached textures.
    pub fn memory_usage(&self) -> u64 {
        self.state.lock().unwrap().bytes
    }

    /// Shrinks the cache to the pressure's reduction factor of its current size.
    ///
    /// Low-priority textures go first, then normal, then high. Within a
    /// priority the least recently used goes first.
    ///
    /// ## Returns
    /// The number of textures evicted.
    pub fn set_memory_pressure(&self, pressure: MemoryPressure) -> usize {
        let mut state = self.state.lock().unwrap();
        let target = (state.bytes as f64 * pressure.cache_reduction_factor()).floor() as u64;
        if state.bytes <= target {
            return 0;
        }

        let mut order: Vec<(ResourcePriority, Instant, String)> = state
            .entries
            .iter()
            .map(|(key, e)| (e.cached.priority, e.last_used, key.clone()))
            .collect();
        order.sort();

        let mut evicted = 0;
        for (_, _, key) in order {
            if state.bytes <= target {
                break;
            }
            if let Some(entry) = state.entries.remove(&key) {
                state.bytes -= entry.cached.bytes;
                self.device.destroy_texture(entry.cached.texture.id);
                evicted += 1;
            }
        }
        log::debug!(
            "Texture cache evicted {evicted} entries for {pressure:?}, {} bytes remain",
            state.bytes
        );
        evicted
    }

    /// Evicts every texture whose priority is in `priorities`.
    pub fn clear_priorities(&self, priorities: &[ResourcePriority]) -> usize {
        let mut state = self.state.lock().unwrap();
        let doomed: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, e)| priorities.contains(&e.cached.priority))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            if let Some(entry) = state.entries.remove(key) {
                state.bytes -= entry.cached.bytes;
                self.device.destroy_texture(entry.cached.texture.id);
            }
        }
        doomed.len()
    }

    /// Evicts everything.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        for (_, entry) in state.entries.drain() {
            self.device.destroy_texture(entry.cached.texture.id);
        }
        state.bytes = 0;
    }
}

impl Drop for TextureCache {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::renderer::{TextureDescriptor, TextureFormat, TextureId, TextureUsage};
    use lumen_infra::graphics::headless::profiles;
    use lumen_infra::HeadlessDevice;

    fn setup() -> (Arc<HeadlessDevice>, TextureCache) {
        let device = Arc::new(HeadlessDevice::new(profiles::integrated_family9()));
        let cache = TextureCache::new(Arc::clone(&device) as Arc<dyn GpuDevice>);
        (device, cache)
    }

    /// Creates a live 64 KiB texture on `device`.
    fn texture(device: &HeadlessDevice) -> GpuTexture {
        let descriptor = TextureDescriptor::new_2d(
            TextureFormat::Rgba8Unorm,
            128,
            128,
            TextureUsage::SHADER_READ,
        );
        GpuTexture {
            id: device.new_texture(&descriptor).unwrap(),
            descriptor,
        }
    }

    #[test]
    fn an_existing_key_keeps_its_texture() {
        let (device, cache) = setup();
        let first = cache.insert("a", texture(&device), ResourcePriority::Normal);
        let second = texture(&device);
        let kept = cache.insert("a", second.clone(), ResourcePriority::Normal);

        assert_eq!(kept, first);
        assert_eq!(cache.get("a"), Some(first.clone()));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.memory_usage(), 64 * 1024);
        assert!(device.texture_descriptor(first.id).is_some());
        assert!(device.texture_descriptor(second.id).is_none());
        assert_eq!(device.live_texture_count(), 1);
    }

    #[test]
    fn reinserting_the_cached_texture_is_harmless() {
        let (device, cache) = setup();
        let first = cache.insert("a", texture(&device), ResourcePriority::Normal);
        assert_eq!(cache.insert("a", first.clone(), ResourcePriority::High), first);
        assert!(device.texture_descriptor(first.id).is_some());
    }

    #[test]
    fn pressure_evicts_by_priority_then_age() {
        let (device, cache) = setup();
        cache.insert("high", texture(&device), ResourcePriority::High);
        cache.insert("old-low", texture(&device), ResourcePriority::Low);
        cache.insert("normal", texture(&device), ResourcePriority::Normal);
        cache.insert("new-low", texture(&device), ResourcePriority::Low);
        cache.get("old-low");
        cache.get("new-low");

        assert_eq!(cache.set_memory_pressure(MemoryPressure::Urgent), 2);
        assert!(cache.contains("high"));
        assert!(cache.contains("normal"));

        assert_eq!(cache.set_memory_pressure(MemoryPressure::Warning), 1);
        assert!(cache.contains("high"));
        assert_eq!(device.live_texture_count(), 1);
    }

    #[test]
    fn clearing_by_priority_keeps_the_rest() {
        let (device, cache) = setup();
        cache.insert("low", texture(&device), ResourcePriority::Low);
        cache.insert("normal", texture(&device), ResourcePriority::Normal);
        cache.insert("high", texture(&device), ResourcePriority::High);

        let cleared = cache.clear_priorities(&[ResourcePriority::Low, ResourcePriority::Normal]);
        assert_eq!(cleared, 2);
        assert_eq!(cache.entries().len(), 1);
        assert!(cache.get("high").is_some());
        assert!(!cache.remove("low"));
    }

    #[test]
    fn dropping_the_cache_destroys_its_textures() {
        let (device, cache) = setup();
        cache.insert("a", texture(&device), ResourcePriority::Normal);
        cache.insert("b", texture(&device), ResourcePriority::Low);
        drop(cache);
        assert_eq!(device.live_texture_count(), 0);
        assert!(device.texture_descriptor(TextureId(1)).is_none());
    }
}
