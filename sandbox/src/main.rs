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

// Lumen sandbox
// Runs a short editing session on the headless backend and prints the statistics.
//
// Usage: sandbox [configuration.json]

use anyhow::{Context, Result};
use lumen_core::decode::{ImageSource, TextureDecoder};
use lumen_core::effect::{
    BlendMode, BlendParameters, BlurParameters, ColorAdjustment, EffectOperation,
};
use lumen_core::platform::HardwareMonitor;
use lumen_core::renderer::{ComputePipelineId, RenderPipelineId, TextureUsageType};
use lumen_core::EngineConfiguration;
use lumen_engine::{
    EffectPipelines, EngineEvent, PipelineEffectRenderer, RenderEngine, TextureLoadRequest,
};
use lumen_gpu::DeviceContext;
use lumen_infra::graphics::headless::profiles;
use lumen_infra::{HeadlessDevice, HeadlessProvider, ImageTextureDecoder, SysinfoMonitor};
use std::sync::Arc;

const PIPELINES: EffectPipelines = EffectPipelines {
    color_adjust: RenderPipelineId(1),
    blend: RenderPipelineId(2),
    blur: ComputePipelineId(3),
};

fn load_configuration() -> Result<EngineConfiguration> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading configuration '{path}'"))?;
            EngineConfiguration::from_json_str(&json)
                .with_context(|| format!("parsing configuration '{path}'"))
        }
        None => Ok(EngineConfiguration::preview()),
    }
}

fn gradient(width: u32, height: u32) -> ImageSource {
    let pixels: Vec<u8> = (0..height)
        .flat_map(|y| {
            (0..width).flat_map(move |x| {
                [
                    (x * 255 / width.max(1)) as u8,
                    (y * 255 / height.max(1)) as u8,
                    128,
                    255,
                ]
            })
        })
        .collect();
    ImageSource::Bitmap {
        width,
        height,
        pixels: pixels.into(),
    }
}

fn log_events(events: &flume::Receiver<EngineEvent>) {
    for event in events.try_iter() {
        match &event {
            EngineEvent::Error { pass, error } => {
                log::warn!("[{}] {pass:?}: {error}", event.kind())
            }
            other => log::info!("[{}] {other:?}", other.kind()),
        }
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = load_configuration()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(configuration.worker_threads.max(1))
        .build()
        .context("starting the tokio runtime")?;

    let provider = HeadlessProvider::new(vec![
        Arc::new(HeadlessDevice::new(profiles::low_power_desktop())),
        Arc::new(HeadlessDevice::new(profiles::integrated_family9())),
    ]);
    let context =
        DeviceContext::shared(|| DeviceContext::new(&provider)).context("no usable GPU")?;

    let engine = RenderEngine::builder(Arc::clone(&context))
        .with_configuration(configuration)
        .with_effect_renderer(Arc::new(PipelineEffectRenderer::new(PIPELINES)))
        .with_texture_decoder(Arc::new(ImageTextureDecoder::new()) as Arc<dyn TextureDecoder>)
        .with_hardware_monitor(Arc::new(SysinfoMonitor::new()) as Arc<dyn HardwareMonitor>)
        .build()?;
    let events = engine.subscribe();

    engine.poll_hardware();

    let photo = runtime.block_on(engine.load_texture(TextureLoadRequest::new(
        "photo",
        gradient(1024, 768),
        TextureUsageType::Color,
    )))?;
    let overlay = runtime.block_on(engine.load_texture(TextureLoadRequest::new(
        "overlay",
        gradient(1024, 768),
        TextureUsageType::Color,
    )))?;
    log_events(&events);

    let operations = [
        EffectOperation::ColorAdjust(ColorAdjustment {
            exposure: 0.3,
            contrast: 1.1,
            ..ColorAdjustment::default()
        }),
        EffectOperation::Blur(BlurParameters::new(6.0)),
        EffectOperation::Blend(BlendParameters {
            overlay,
            mode: BlendMode::Screen,
            opacity: 0.5,
        }),
    ];
    for _ in 0..3 {
        let output = engine.process_image(&photo, &operations)?;
        engine.release_texture(output)?;
    }
    log_events(&events);

    engine.handle_low_memory_warning();
    engine.probe_device()?;
    if let Some(statistics) = engine.refresh_statistics() {
        println!("{}", serde_json::to_string_pretty(&statistics)?);
    }
    log_events(&events);

    log::info!("Pool after the session: {:?}", engine.pool().statistics());
    Ok(())
}
