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

use super::{RenderEngine, Signals};
use crate::effect::EffectRenderer;
use crate::error::EngineError;
use crate::statistics::{StatisticsTracker, DEFAULT_REFRESH_INTERVAL};
use crate::texture::{TextureCache, TextureLoader};
use crate::watchdog::TimeoutWatchdog;
use lumen_core::decode::TextureDecoder;
use lumen_core::effect::PipelineCache;
use lumen_core::event::EventBus;
use lumen_core::platform::HardwareMonitor;
use lumen_core::EngineConfiguration;
use lumen_gpu::{DeviceContext, PoolConfig, ResourcePool};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// Assembles a [`RenderEngine`] from a device context and optional collaborators.
///
/// Everything except the device context has a default: the preview
/// configuration, a pool derived from it, no collaborators and a one-second
/// statistics interval.
pub struct RenderEngineBuilder {
    context: Arc<DeviceContext>,
    configuration: EngineConfiguration,
    pool_config: Option<PoolConfig>,
    effect_renderer: Option<Arc<dyn EffectRenderer>>,
    pipeline_cache: Option<Arc<dyn PipelineCache>>,
    hardware_monitor: Option<Arc<dyn HardwareMonitor>>,
    decoder: Option<Arc<dyn TextureDecoder>>,
    statistics_interval: Duration,
}

impl RenderEngineBuilder {
    /// A builder for an engine on `context`.
    pub fn new(context: Arc<DeviceContext>) -> Self {
        Self {
            context,
            configuration: EngineConfiguration::preview(),
            pool_config: None,
            effect_renderer: None,
            pipeline_cache: None,
            hardware_monitor: None,
            decoder: None,
            statistics_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }

    /// Sets the base configuration.
    pub fn with_configuration(mut self, configuration: EngineConfiguration) -> Self {
        self.configuration = configuration;
        self
    }

    /// Overrides the pool parameters derived from the configuration.
    pub fn with_pool_config(mut self, pool_config: PoolConfig) -> Self {
        self.pool_config = Some(pool_config);
        self
    }

    /// Installs the renderer [`RenderEngine::process_image`] encodes with.
    pub fn with_effect_renderer(mut self, renderer: Arc<dyn EffectRenderer>) -> Self {
        self.effect_renderer = Some(renderer);
        self
    }

    /// Installs the pipeline cache included in memory accounting and maintenance.
    pub fn with_pipeline_cache(mut self, cache: Arc<dyn PipelineCache>) -> Self {
        self.pipeline_cache = Some(cache);
        self
    }

    /// Installs the source of thermal and host memory readings.
    pub fn with_hardware_monitor(mut self, monitor: Arc<dyn HardwareMonitor>) -> Self {
        self.hardware_monitor = Some(monitor);
        self
    }

    /// Installs the decoder texture loads go through.
    pub fn with_texture_decoder(mut self, decoder: Arc<dyn TextureDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Sets the minimum time between statistics snapshots.
    pub fn with_statistics_interval(mut self, interval: Duration) -> Self {
        self.statistics_interval = interval;
        self
    }

    /// Builds the engine and starts its timeout watchdog.
    ///
    /// ## Errors
    /// [`EngineError::Internal`] when the watchdog thread cannot be started.
    pub fn build(self) -> Result<RenderEngine, EngineError> {
        let watchdog = TimeoutWatchdog::spawn()
            .map_err(|e| EngineError::Internal(format!("cannot start the timeout watchdog: {e}")))?;

        let pool_config = self.pool_config.unwrap_or_else(|| {
            PoolConfig::from_configuration(
                &self.configuration,
                self.context.recommended_max_working_set_size(),
            )
        });
        let pool = ResourcePool::new(Arc::clone(&self.context), pool_config);
        let texture_cache = Arc::new(TextureCache::new(Arc::clone(self.context.device())));
        let loader = self.decoder.map(|decoder| {
            TextureLoader::new(
                Arc::clone(&self.context),
                decoder,
                Arc::clone(&texture_cache),
            )
        });

        log::info!(
            "Render engine ready: {:?} quality, {:?} mode, render timeout {:?}",
            self.configuration.quality,
            self.configuration.mode,
            self.configuration.render_timeout()
        );

        Ok(RenderEngine {
            context: self.context,
            pool,
            texture_cache,
            loader,
            effect_renderer: self.effect_renderer,
            pipeline_cache: self.pipeline_cache,
            hardware_monitor: self.hardware_monitor,
            signals: RwLock::new(Signals::new(self.configuration)),
            active_passes: Mutex::new(Vec::new()),
            tracker: Arc::new(StatisticsTracker::new(self.statistics_interval)),
            events: Arc::new(EventBus::new()),
            watchdog,
        })
    }
}
