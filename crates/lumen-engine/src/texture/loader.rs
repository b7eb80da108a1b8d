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

use super::cache::TextureCache;
use crate::error::EngineError;
use lumen_core::decode::{ImageSource, TextureDecoder, TextureLoadError, TextureLoadOptions};
use lumen_core::renderer::{
    GpuTexture, ResourcePriority, TextureDescriptor, TextureUsage, TextureUsageType,
};
use lumen_gpu::{DeviceContext, RenderContext};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// One texture to load.
#[derive(Debug, Clone)]
pub struct TextureLoadRequest {
    /// Cache key.
    pub key: String,
    /// Where the pixels come from.
    pub source: ImageSource,
    /// What the texture is for.
    pub usage: TextureUsageType,
    /// Decoding options.
    pub options: TextureLoadOptions,
}

impl TextureLoadRequest {
    /// A request with the default options for `usage`.
    pub fn new(key: impl Into<String>, source: ImageSource, usage: TextureUsageType) -> Self {
        Self {
            key: key.into(),
            source,
            usage,
            options: TextureLoadOptions::for_usage(usage),
        }
    }

    /// Replaces the decoding options.
    pub fn with_options(mut self, options: TextureLoadOptions) -> Self {
        self.options = options;
        self
    }
}

enum Pending {
    Cached(GpuTexture),
    Spawned {
        key: String,
        priority: ResourcePriority,
        task: JoinHandle<Result<GpuTexture, EngineError>>,
    },
    SameAs(usize),
}

/// Decodes and uploads textures off the async runtime, then caches them.
///
/// Each load runs on tokio's blocking pool: decoding, the upload and, when
/// requested, mipmap generation, which waits for the GPU.
pub struct TextureLoader {
    context: Arc<DeviceContext>,
    decoder: Arc<dyn TextureDecoder>,
    cache: Arc<TextureCache>,
}

impl TextureLoader {
    /// Creates a loader filling `cache`.
    pub fn new(
        context: Arc<DeviceContext>,
        decoder: Arc<dyn TextureDecoder>,
        cache: Arc<TextureCache>,
    ) -> Self {
        Self {
            context,
            decoder,
            cache,
        }
    }

    /// The cache loaded textures go into.
    pub fn cache(&self) -> &Arc<TextureCache> {
        &self.cache
    }

    /// Loads one texture, or returns the cached one for the same key.
    ///
    /// When another load cached the key first, that texture is returned and
    /// this upload is discarded.
    pub async fn load(&self, request: TextureLoadRequest) -> Result<GpuTexture, EngineError> {
        if let Some(texture) = self.cache.get(&request.key) {
            log::trace!("Texture '{}' served from cache", request.key);
            return Ok(texture);
        }
        let key = request.key.clone();
        let priority = request.options.priority;
        let texture = self.spawn(request).await?;
        Ok(self.cache.insert(key, texture, priority))
    }

    /// Loads several textures in parallel. Results are in request order.
    ///
    /// Requests sharing a key are uploaded once and share the result.
    pub async fn load_all(
        &self,
        requests: Vec<TextureLoadRequest>,
    ) -> Vec<Result<GpuTexture, EngineError>> {
        let mut first_by_key: HashMap<String, usize> = HashMap::new();
        let mut pending = Vec::with_capacity(requests.len());
        for (index, request) in requests.into_iter().enumerate() {
            if let Some(&first) = first_by_key.get(&request.key) {
                pending.push(Pending::SameAs(first));
                continue;
            }
            first_by_key.insert(request.key.clone(), index);
            match self.cache.get(&request.key) {
                Some(texture) => pending.push(Pending::Cached(texture)),
                None => {
                    let key = request.key.clone();
                    let priority = request.options.priority;
                    let context = Arc::clone(&self.context);
                    let decoder = Arc::clone(&self.decoder);
                    let task = tokio::task::spawn_blocking(move || {
                        upload(&context, decoder.as_ref(), &request)
                    });
                    pending.push(Pending::Spawned {
                        key,
                        priority,
                        task,
                    });
                }
            }
        }

        let mut results: Vec<Result<GpuTexture, EngineError>> = Vec::with_capacity(pending.len());
        for entry in pending {
            let result = match entry {
                Pending::Cached(texture) => Ok(texture),
                Pending::Spawned {
                    key,
                    priority,
                    task,
                } => flatten(task.await).map(|texture| self.cache.insert(key, texture, priority)),
                Pending::SameAs(first) => results[first].clone(),
            };
            results.push(result);
        }
        results
    }

    async fn spawn(&self, request: TextureLoadRequest) -> Result<GpuTexture, EngineError> {
        let context = Arc::clone(&self.context);
        let decoder = Arc::clone(&self.decoder);
        flatten(
            tokio::task::spawn_blocking(move || upload(&context, decoder.as_ref(), &request))
                .await,
        )
    }
}

fn flatten(
    joined: Result<Result<GpuTexture, EngineError>, tokio::task::JoinError>,
) -> Result<GpuTexture, EngineError> {
    joined.map_err(|e| EngineError::Internal(format!("texture load task failed: {e}")))?
}

fn upload(
    context: &Arc<DeviceContext>,
    decoder: &dyn TextureDecoder,
    request: &TextureLoadRequest,
) -> Result<GpuTexture, EngineError> {
    let decoded = decoder.decode(
        &request.source,
        request.usage,
        &request.options,
        context.supported_formats(),
    )?;

    let mut descriptor = TextureDescriptor::new_2d(
        decoded.format,
        decoded.width,
        decoded.height,
        TextureUsage::SHADER_READ | TextureUsage::COPY_DST,
    );
    if request.options.generate_mipmaps {
        descriptor = descriptor.with_full_mip_chain();
    }

    let device = context.device();
    let id = device
        .new_texture(&descriptor)
        .map_err(|e| TextureLoadError::ImageCreationFailed(e.to_string()))?;
    let texture = GpuTexture { id, descriptor };

    let uploaded = device
        .write_texture(id, 0, &decoded.pixels, decoded.bytes_per_row)
        .map_err(|e| EngineError::from(TextureLoadError::InvalidImageData(e.to_string())))
        .and_then(|()| {
            if descriptor.mip_level_count > 1 {
                generate_mipmaps(context, &texture)
            } else {
                Ok(())
            }
        });
    if let Err(e) = uploaded {
        log::warn!("Texture '{}' failed to upload: {e}", request.key);
        device.destroy_texture(id);
        return Err(e);
    }

    log::debug!(
        "Loaded texture '{}': {}x{} {:?}, {} mip level(s)",
        request.key,
        decoded.width,
        decoded.height,
        decoded.format,
        descriptor.mip_level_count
    );
    Ok(texture)
}

fn generate_mipmaps(context: &Arc<DeviceContext>, texture: &GpuTexture) -> Result<(), EngineError> {
    let mut ctx = RenderContext::new(Arc::clone(context));
    ctx.begin_frame("mipmaps")?;
    ctx.begin_copy_pass(Some("mipmaps"))?;
    ctx.generate_mipmaps(texture.id)?;
    ctx.end_frame_and_wait()?;
    Ok(())
}
