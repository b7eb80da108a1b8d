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

use lumen_core::decode::{ImageSource, TextureDecoder, TextureLoadError};
use lumen_core::renderer::{
    GpuDevice, ResourcePriority, TextureDescriptor, TextureFormat, TextureUsageType,
};
use lumen_core::EngineConfiguration;
use lumen_engine::{EngineError, EngineEvent, RenderEngine, TextureLoadRequest};
use lumen_gpu::DeviceContext;
use lumen_infra::graphics::headless::profiles;
use lumen_infra::{HeadlessDevice, ImageTextureDecoder, RecordedCommand};
use std::sync::Arc;

fn loader_engine(configuration: EngineConfiguration) -> (Arc<HeadlessDevice>, RenderEngine) {
    let device = Arc::new(HeadlessDevice::new(profiles::integrated_family9()));
    let context = DeviceContext::with_device(Arc::clone(&device) as Arc<dyn GpuDevice>).unwrap();
    let engine = RenderEngine::builder(Arc::new(context))
        .with_configuration(configuration)
        .with_texture_decoder(Arc::new(ImageTextureDecoder::new()) as Arc<dyn TextureDecoder>)
        .build()
        .unwrap();
    (device, engine)
}

fn bitmap(width: u32, height: u32) -> ImageSource {
    let pixels: Vec<u8> = (0..width * height)
        .flat_map(|i| [(i % 256) as u8, 64, 128, 255])
        .collect();
    ImageSource::Bitmap {
        width,
        height,
        pixels: pixels.into(),
    }
}

#[tokio::test]
async fn color_bitmap_is_uploaded_with_mipmaps_and_cached() {
    let (device, engine) = loader_engine(EngineConfiguration::preview());

    let texture = engine
        .load_texture(TextureLoadRequest::new(
            "albedo",
            bitmap(64, 32),
            TextureUsageType::Color,
        ))
        .await
        .unwrap();

    assert_eq!(texture.format(), TextureFormat::Rgba8UnormSrgb);
    assert_eq!((texture.width(), texture.height()), (64, 32));
    assert_eq!(
        texture.descriptor.mip_level_count,
        TextureDescriptor::mip_chain_length(64, 32)
    );
    assert_eq!(device.upload_count(), 1);
    assert_eq!(
        device
            .command_log()
            .count(|c| *c == RecordedCommand::GenerateMipmaps(texture.id)),
        1
    );
    assert!(engine.texture_cache().contains("albedo"));

    let again = engine
        .load_texture(TextureLoadRequest::new(
            "albedo",
            bitmap(64, 32),
            TextureUsageType::Color,
        ))
        .await
        .unwrap();
    assert_eq!(again.id, texture.id);
    assert_eq!(device.upload_count(), 1);
}

#[tokio::test]
async fn low_quality_skips_mipmaps() {
    let (device, engine) = loader_engine(EngineConfiguration::low_power());

    let texture = engine
        .load_texture(TextureLoadRequest::new(
            "thumb",
            bitmap(64, 64),
            TextureUsageType::Color,
        ))
        .await
        .unwrap();

    assert_eq!(texture.descriptor.mip_level_count, 1);
    assert_eq!(
        device
            .command_log()
            .count(|c| matches!(c, RecordedCommand::GenerateMipmaps(_))),
        0
    );
}

#[tokio::test]
async fn mask_uses_a_single_channel_format_and_honours_options() {
    let (_device, engine) = loader_engine(EngineConfiguration::preview());

    let request = TextureLoadRequest::new("mask", bitmap(64, 32), TextureUsageType::Mask);
    let mut options = request.options;
    options.max_dimension = Some(16);
    options.priority = ResourcePriority::High;

    let texture = engine
        .load_texture(request.with_options(options))
        .await
        .unwrap();

    assert_eq!(texture.format(), TextureFormat::R8Unorm);
    assert_eq!((texture.width(), texture.height()), (16, 8));
    let entries = engine.texture_cache().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].1.priority, ResourcePriority::High);
}

#[tokio::test]
async fn malformed_bitmap_is_reported() {
    let (device, engine) = loader_engine(EngineConfiguration::preview());
    let events = engine.subscribe();

    let source = ImageSource::Bitmap {
        width: 8,
        height: 8,
        pixels: vec![0u8; 10].into(),
    };
    let result = engine
        .load_texture(TextureLoadRequest::new("broken", source, TextureUsageType::Color))
        .await;

    assert!(matches!(
        result,
        Err(EngineError::TextureLoad(TextureLoadError::ImageCreationFailed(_)))
    ));
    assert!(engine.texture_cache().is_empty());
    assert_eq!(device.live_texture_count(), 0);
    assert_eq!(engine.statistics().errors, 1);
    assert!(matches!(
        events.try_recv(),
        Ok(EngineEvent::Error { pass: None, .. })
    ));
}

#[tokio::test]
async fn lost_device_fails_the_upload() {
    let (device, engine) = loader_engine(EngineConfiguration::preview());
    device.lose_device();

    let result = engine
        .load_texture(TextureLoadRequest::new(
            "late",
            bitmap(8, 8),
            TextureUsageType::Color,
        ))
        .await;

    assert!(matches!(
        result,
        Err(EngineError::TextureLoad(TextureLoadError::ImageCreationFailed(_)))
    ));
    assert!(engine.texture_cache().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn batch_loads_keep_request_order() {
    let (_device, engine) = loader_engine(EngineConfiguration::preview());
    let requests = vec![
        TextureLoadRequest::new("a", bitmap(16, 16), TextureUsageType::Color),
        TextureLoadRequest::new(
            "b",
            ImageSource::Encoded(vec![1u8, 2, 3].into()),
            TextureUsageType::Color,
        ),
        TextureLoadRequest::new("c", bitmap(32, 32), TextureUsageType::Normal),
    ];

    let results = engine.load_textures(requests).await.unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().width(), 16);
    assert!(results[1].is_err());
    assert_eq!(results[2].as_ref().unwrap().width(), 32);
    assert_eq!(engine.texture_cache().len(), 2);
    assert_eq!(engine.statistics().errors, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn duplicate_keys_share_one_live_texture() {
    let (device, engine) = loader_engine(EngineConfiguration::preview());
    let requests = vec![
        TextureLoadRequest::new("dup", bitmap(16, 16), TextureUsageType::Color),
        TextureLoadRequest::new("dup", bitmap(16, 16), TextureUsageType::Color),
    ];

    let results = engine.load_textures(requests).await.unwrap();

    let first = results[0].as_ref().unwrap();
    let second = results[1].as_ref().unwrap();
    assert_eq!(first, second);
    assert!(device.texture_descriptor(first.id).is_some());
    assert_eq!(device.upload_count(), 1);
    assert_eq!(engine.texture_cache().len(), 1);
    assert_eq!(engine.texture_cache().get("dup").as_ref(), Some(first));
}

#[tokio::test]
async fn a_racing_load_returns_the_cached_texture() {
    let (device, engine) = loader_engine(EngineConfiguration::preview());
    let request = TextureLoadRequest::new("shared", bitmap(8, 8), TextureUsageType::Color);

    let (a, b) = tokio::join!(
        engine.load_texture(request.clone()),
        engine.load_texture(request)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a, b);
    assert!(device.texture_descriptor(a.id).is_some());
    assert_eq!(engine.texture_cache().len(), 1);
    assert_eq!(device.live_texture_count(), 1);
}

#[tokio::test]
async fn loading_needs_a_decoder() {
    let device = Arc::new(HeadlessDevice::new(profiles::integrated_family9()));
    let context = DeviceContext::with_device(device as Arc<dyn GpuDevice>).unwrap();
    let engine = RenderEngine::builder(Arc::new(context)).build().unwrap();

    let result = engine
        .load_texture(TextureLoadRequest::new(
            "none",
            bitmap(4, 4),
            TextureUsageType::Color,
        ))
        .await;
    assert_eq!(result, Err(EngineError::NoTextureDecoder));
}
