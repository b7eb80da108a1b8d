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

//! The render orchestrator.

mod builder;

pub use builder::RenderEngineBuilder;

use crate::effect::EffectRenderer;
use crate::error::EngineError;
use crate::event::EngineEvent;
use crate::statistics::{DroppedFlag, ResourceSample, StatisticsTracker};
use crate::texture::{TextureCache, TextureLoadRequest, TextureLoader};
use crate::watchdog::{DeadlineId, TimeoutWatchdog};
use lumen_core::effect::{EffectOperation, PipelineCache};
use lumen_core::event::EventBus;
use lumen_core::platform::{HardwareMonitor, MemoryPressure, ThermalState};
use lumen_core::renderer::{GpuTexture, ResourcePriority, TextureDescriptor, TextureUsage};
use lumen_core::telemetry::FrameStatistics;
use lumen_core::EngineConfiguration;
use lumen_gpu::{
    DeviceContext, ErrorHook, MaintenanceReport, PooledTexture, RenderContext, RenderContextError,
    ResourcePool,
};
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

/// The environmental signals the engine adapts to, and what they produced.
#[derive(Debug)]
struct Signals {
    base: EngineConfiguration,
    effective: EngineConfiguration,
    thermal: ThermalState,
    pressure: MemoryPressure,
}

impl Signals {
    fn new(base: EngineConfiguration) -> Self {
        Self {
            effective: base.clone(),
            base,
            thermal: ThermalState::default(),
            pressure: MemoryPressure::default(),
        }
    }

    /// Derives the effective configuration from the base and current signals.
    /// Returns whether the memory cap changed.
    fn recompute(&mut self) -> bool {
        let features = self.base.features;
        let mut adapted = self.base.clone();
        if features.adaptive_quality && features.thermal_throttling {
            adapted = adapted.adapt_to_thermal_state(self.thermal);
        }
        if features.adaptive_quality && features.memory_pressure_handling {
            adapted = adapted.adapt_to_memory_pressure(self.pressure);
        }
        if adapted != self.effective {
            log::info!(
                "Configuration adapted to {:?}/{:?}: quality {:?} -> {:?}, mode {:?} -> {:?}",
                self.thermal,
                self.pressure,
                self.effective.quality,
                adapted.quality,
                self.effective.mode,
                adapted.mode
            );
        }
        let cap_changed = adapted.memory_cap_bytes != self.effective.memory_cap_bytes;
        self.effective = adapted;
        cap_changed
    }

    /// The pool limit the effective cap asks for, `None` when it is the base cap.
    fn memory_limit(&self) -> Option<u64> {
        self.effective
            .memory_cap_bytes
            .filter(|_| self.effective.memory_cap_bytes != self.base.memory_cap_bytes)
    }
}

/// Runs render passes against one device and keeps the process inside its
/// thermal and memory limits.
///
/// The engine owns the resource pool, the texture cache and the timeout
/// watchdog. Every pass gets its own [`RenderContext`], so passes may run
/// concurrently from several threads without a global render lock.
///
/// Observers follow the engine through [`RenderEngine::subscribe`].
pub struct RenderEngine {
    context: Arc<DeviceContext>,
    pool: ResourcePool,
    texture_cache: Arc<TextureCache>,
    loader: Option<TextureLoader>,
    effect_renderer: Option<Arc<dyn EffectRenderer>>,
    pipeline_cache: Option<Arc<dyn PipelineCache>>,
    hardware_monitor: Option<Arc<dyn HardwareMonitor>>,
    signals: RwLock<Signals>,
    active_passes: Mutex<Vec<String>>,
    tracker: Arc<StatisticsTracker>,
    events: Arc<EventBus<EngineEvent>>,
    watchdog: TimeoutWatchdog,
}

impl fmt::Debug for RenderEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderEngine")
            .field("context", &self.context)
            .field("signals", &self.signals)
            .field("active_passes", &self.active_passes)
            .finish_non_exhaustive()
    }
}

impl RenderEngine {
    /// Starts building an engine on `context`.
    pub fn builder(context: Arc<DeviceContext>) -> RenderEngineBuilder {
        RenderEngineBuilder::new(context)
    }

    /// The device context every pass records on.
    pub fn device_context(&self) -> &Arc<DeviceContext> {
        &self.context
    }

    /// The pool intermediate textures come from.
    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    /// The cache loaded textures live in.
    pub fn texture_cache(&self) -> &Arc<TextureCache> {
        &self.texture_cache
    }

    /// The configuration in force, after thermal and memory adaptation.
    pub fn configuration(&self) -> EngineConfiguration {
        self.signals.read().unwrap().effective.clone()
    }

    /// The configuration the engine was built with.
    pub fn base_configuration(&self) -> EngineConfiguration {
        self.signals.read().unwrap().base.clone()
    }

    /// The last recorded thermal state.
    pub fn thermal_state(&self) -> ThermalState {
        self.signals.read().unwrap().thermal
    }

    /// The last recorded memory pressure.
    pub fn memory_pressure(&self) -> MemoryPressure {
        self.signals.read().unwrap().pressure
    }

    /// Registers an observer. Events published from now on are queued on the
    /// returned receiver; dropping it unsubscribes.
    pub fn subscribe(&self) -> flume::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Names of the passes currently running, in start order.
    pub fn active_passes(&self) -> Vec<String> {
        self.active_passes.lock().unwrap().clone()
    }

    /// The last statistics snapshot, with up-to-date cumulative counters.
    pub fn statistics(&self) -> FrameStatistics {
        self.tracker.latest()
    }

    /// Runs `operation` as a named pass on a fresh frame.
    ///
    /// The frame is committed when `operation` succeeds and thrown away when it
    /// fails. Observers see `WillBeginPass`, then `Error` on failure, then
    /// `DidCompletePass` in every case. A pass that outlives the configured
    /// render timeout is reported with `RenderTimeoutExpired` but keeps running.
    /// A pass longer than the processing mode's frame budget, or one that times
    /// out, counts as a dropped frame.
    ///
    /// ## Errors
    /// - [`EngineError::ThermalStateUnsupported`] above the serious thermal state.
    /// - [`EngineError::MemoryPressureCritical`] under critical memory pressure.
    /// - Whatever `operation` or the frame commit fails with.
    pub fn perform_render<T, F>(&self, name: &str, operation: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut RenderContext) -> Result<T, EngineError>,
    {
        if let Err(e) = self.check_conditions() {
            log::warn!("Pass '{name}' refused: {e}");
            self.report(Some(name), e.clone());
            return Err(e);
        }

        let configuration = self.configuration();
        let budget = configuration.mode.target_frame_time();
        let dropped = Arc::new(DroppedFlag::default());
        let started = Instant::now();
        self.active_passes.lock().unwrap().push(name.to_owned());
        self.events.publish(EngineEvent::WillBeginPass {
            name: name.to_owned(),
        });
        let deadline = self.arm_timeout(name, configuration.render_timeout(), &dropped);

        let mut ctx =
            RenderContext::new(Arc::clone(&self.context)).with_error_hook(self.error_hook(name));
        let result = record_frame(&mut ctx, name, operation);

        self.watchdog.cancel(deadline);
        {
            let mut active = self.active_passes.lock().unwrap();
            if let Some(index) = active.iter().position(|pass| pass == name) {
                active.remove(index);
            }
        }
        let duration = started.elapsed();
        self.tracker.record_pass(duration, result.is_ok(), budget, &dropped);
        match &result {
            Ok(_) => log::debug!("Pass '{name}' completed in {duration:?}"),
            Err(e) => {
                log::error!("Pass '{name}' failed after {duration:?}: {e}");
                self.report(Some(name), e.clone());
            }
        }
        self.events.publish(EngineEvent::DidCompletePass {
            name: name.to_owned(),
            duration,
        });
        result
    }

    /// Applies `operations` to `source` in order and returns the result in a
    /// pooled texture the caller must hand back with
    /// [`RenderEngine::release_texture`].
    ///
    /// Each step renders into a pooled texture shaped like `source`. A step's
    /// input goes back to the pool as soon as the step is recorded. `source`
    /// itself is never released.
    ///
    /// ## Errors
    /// [`EngineError::EmptyPipeline`] without operations,
    /// [`EngineError::NoEffectRenderer`] when none is installed, otherwise the
    /// first failing step's error. All pooled textures are returned on failure.
    pub fn process_image(
        &self,
        source: &GpuTexture,
        operations: &[EffectOperation],
    ) -> Result<PooledTexture, EngineError> {
        if operations.is_empty() {
            return Err(EngineError::EmptyPipeline);
        }
        let renderer = self
            .effect_renderer
            .as_ref()
            .ok_or(EngineError::NoEffectRenderer)?;

        let descriptor = TextureDescriptor::new_2d(
            source.format(),
            source.width(),
            source.height(),
            TextureUsage::SHADER_READ | TextureUsage::SHADER_WRITE | TextureUsage::RENDER_TARGET,
        );
        let mut output: Option<PooledTexture> = None;
        let result = self.perform_render("process_image", |ctx| {
            for operation in operations {
                let target = self.pool.acquire(&descriptor, ResourcePriority::Normal)?;
                let input = output.take();
                let encoded = renderer.encode(
                    ctx,
                    operation,
                    input.as_ref().map_or(source, PooledTexture::texture),
                    target.texture(),
                );
                if let Some(consumed) = input {
                    self.return_to_pool(consumed);
                }
                if let Err(e) = encoded {
                    log::error!("Effect '{}' failed: {e}", operation.label());
                    self.return_to_pool(target);
                    return Err(e.into());
                }
                output = Some(target);
            }
            Ok(())
        });

        match (result, output) {
            (Ok(()), Some(texture)) => Ok(texture),
            (Ok(()), None) => Err(EngineError::EmptyPipeline),
            (Err(e), leftover) => {
                if let Some(texture) = leftover {
                    self.return_to_pool(texture);
                }
                Err(e)
            }
        }
    }

    /// Hands a texture from [`RenderEngine::process_image`] back to the pool.
    pub fn release_texture(&self, texture: PooledTexture) -> Result<(), EngineError> {
        self.pool.release(texture).map_err(EngineError::from)
    }

    /// Loads a texture through the installed decoder, honouring the current
    /// quality level, and caches it.
    ///
    /// The texture is capped at the quality's maximum size. Mipmaps and
    /// compression are only produced when the configuration allows them.
    ///
    /// ## Errors
    /// [`EngineError::NoTextureDecoder`] without a decoder, otherwise the
    /// decode or upload error.
    pub async fn load_texture(
        &self,
        request: TextureLoadRequest,
    ) -> Result<GpuTexture, EngineError> {
        let loader = self.loader.as_ref().ok_or(EngineError::NoTextureDecoder)?;
        let request = self.constrain(request);
        loader.load(request).await.inspect_err(|e| {
            log::error!("Texture load failed: {e}");
            self.report(None, e.clone());
        })
    }

    /// Loads several textures in parallel. Results are in request order.
    pub async fn load_textures(
        &self,
        requests: Vec<TextureLoadRequest>,
    ) -> Result<Vec<Result<GpuTexture, EngineError>>, EngineError> {
        let loader = self.loader.as_ref().ok_or(EngineError::NoTextureDecoder)?;
        let requests = requests.into_iter().map(|r| self.constrain(r)).collect();
        let results = loader.load_all(requests).await;
        for error in results.iter().filter_map(|r| r.as_ref().err()) {
            self.report(None, error.clone());
        }
        Ok(results)
    }

    /// Records `pressure`, trims the pool and texture cache to match and adapts
    /// the configuration.
    ///
    /// Observers get `MemoryPressureDetected` above the warning level.
    pub fn set_memory_pressure(&self, pressure: MemoryPressure) {
        let report = self.pool.set_memory_pressure(pressure);
        let evicted = self.texture_cache.set_memory_pressure(pressure);
        if report.evicted > 0 || evicted > 0 {
            log::info!(
                "Memory pressure {pressure:?}: evicted {} pooled ({} bytes), {evicted} cached",
                report.evicted,
                report.freed_bytes
            );
        }
        if pressure > MemoryPressure::Warning {
            log::warn!("Memory pressure is {pressure:?}");
            self.events
                .publish(EngineEvent::MemoryPressureDetected(pressure));
        }
        self.adapt_to_memory_pressure(pressure);
    }

    /// Responds to a low-memory warning from the host.
    ///
    /// Forces urgent pressure, drops low and normal priority cached textures and
    /// runs pool and pipeline-cache maintenance before returning.
    pub fn handle_low_memory_warning(&self) {
        log::warn!("Low memory warning received");
        self.set_memory_pressure(MemoryPressure::Urgent);
        let cleared = self
            .texture_cache
            .clear_priorities(&[ResourcePriority::Low, ResourcePriority::Normal]);
        let report = self.perform_maintenance();
        log::info!(
            "Low memory handling dropped {cleared} cached texture(s) and {} pooled texture(s)",
            report.evicted
        );
    }

    /// Runs pool and pipeline-cache maintenance.
    pub fn perform_maintenance(&self) -> MaintenanceReport {
        let report = self.pool.perform_maintenance();
        if let Some(pipeline_cache) = &self.pipeline_cache {
            pipeline_cache.perform_maintenance();
        }
        report
    }

    /// Records `state` and adapts the configuration when thermal throttling is on.
    ///
    /// ## Returns
    /// The configuration now in force.
    pub fn adapt_to_thermal_state(&self, state: ThermalState) -> EngineConfiguration {
        let mut signals = self.signals.write().unwrap();
        if signals.thermal != state {
            log::info!("Thermal state {:?} -> {state:?}", signals.thermal);
        }
        signals.thermal = state;
        let limit = signals.recompute().then(|| signals.memory_limit());
        let effective = signals.effective.clone();
        drop(signals);
        self.apply_memory_limit(limit);
        effective
    }

    /// Records `pressure` and adapts the configuration when memory pressure
    /// handling is on. A lowered memory cap becomes the pool's memory limit;
    /// trimming by pressure happens in [`RenderEngine::set_memory_pressure`].
    ///
    /// ## Returns
    /// The configuration now in force.
    pub fn adapt_to_memory_pressure(&self, pressure: MemoryPressure) -> EngineConfiguration {
        let mut signals = self.signals.write().unwrap();
        signals.pressure = pressure;
        let limit = signals.recompute().then(|| signals.memory_limit());
        let effective = signals.effective.clone();
        drop(signals);
        self.apply_memory_limit(limit);
        effective
    }

    fn apply_memory_limit(&self, limit: Option<Option<u64>>) {
        if let Some(limit) = limit {
            self.pool.set_memory_limit(limit);
        }
    }

    /// Reads the hardware monitor, if any, and reacts to what it reports.
    ///
    /// The thermal state is always taken over. Host memory pressure is applied
    /// only when it is higher than the engine's own.
    ///
    /// ## Returns
    /// The thermal state read, or `None` without a monitor.
    pub fn poll_hardware(&self) -> Option<ThermalState> {
        let monitor = self.hardware_monitor.as_ref()?;
        let thermal = monitor.thermal_state();
        self.adapt_to_thermal_state(thermal);

        let host_pressure =
            MemoryPressure::from_usage_ratio(1.0 - monitor.system_memory().available_ratio());
        if host_pressure > self.memory_pressure() {
            self.set_memory_pressure(host_pressure);
        }
        Some(thermal)
    }

    /// Takes a statistics snapshot if the refresh interval has elapsed.
    ///
    /// Memory usage covers the pool, the texture cache and the pipeline cache,
    /// measured against the memory cap or the device working set. The pressure
    /// derived from it replaces the current one. Observers get
    /// `StatisticsUpdated`.
    pub fn refresh_statistics(&self) -> Option<FrameStatistics> {
        let usage = self.memory_usage();
        let budget = self.memory_budget();
        let pressure = if budget == 0 {
            MemoryPressure::Normal
        } else {
            MemoryPressure::from_usage_ratio(usage as f64 / budget as f64)
        };
        let thermal = match &self.hardware_monitor {
            Some(monitor) => {
                let state = monitor.thermal_state();
                self.adapt_to_thermal_state(state);
                state
            }
            None => self.thermal_state(),
        };

        let sample = ResourceSample {
            memory_usage_bytes: usage,
            thermal_state: thermal,
            memory_pressure: pressure,
            active_passes: self.active_passes.lock().unwrap().len(),
        };
        let statistics = self.tracker.refresh(Instant::now(), sample)?;
        if pressure != self.memory_pressure() {
            self.set_memory_pressure(pressure);
        }
        log::debug!(
            "Statistics: {:.1} fps, {} bytes in use, {} error(s)",
            statistics.fps,
            statistics.memory_usage_bytes,
            statistics.errors
        );
        self.events
            .publish(EngineEvent::StatisticsUpdated(statistics));
        Some(statistics)
    }

    /// Bytes held by the pool, the texture cache and the pipeline cache.
    pub fn memory_usage(&self) -> u64 {
        self.pool.memory_usage()
            + self.texture_cache.memory_usage()
            + self
                .pipeline_cache
                .as_ref()
                .map_or(0, |cache| cache.memory_usage())
    }

    /// Checks that the device still accepts work.
    ///
    /// ## Errors
    /// [`EngineError::Device`] with `DeviceLost`, also published to observers.
    pub fn probe_device(&self) -> Result<(), EngineError> {
        self.context.probe().map_err(|e| {
            let error = EngineError::from(e);
            self.report(None, error.clone());
            error
        })
    }

    fn memory_budget(&self) -> u64 {
        self.signals
            .read()
            .unwrap()
            .base
            .memory_cap_bytes
            .unwrap_or_else(|| self.context.recommended_max_working_set_size())
    }

    fn check_conditions(&self) -> Result<(), EngineError> {
        let signals = self.signals.read().unwrap();
        if signals.thermal.exceeds_serious() {
            return Err(EngineError::ThermalStateUnsupported(signals.thermal));
        }
        if signals.pressure == MemoryPressure::Critical {
            return Err(EngineError::MemoryPressureCritical);
        }
        Ok(())
    }

    fn constrain(&self, mut request: TextureLoadRequest) -> TextureLoadRequest {
        let configuration = self.configuration();
        let cap = configuration.quality.max_texture_size();
        let options = &mut request.options;
        options.max_dimension = Some(options.max_dimension.map_or(cap, |max| max.min(cap)));
        options.generate_mipmaps &= configuration.quality.generates_mipmaps();
        options.allow_compression &= configuration.features.compression;
        request
    }

    fn arm_timeout(&self, name: &str, timeout: Duration, dropped: &Arc<DroppedFlag>) -> DeadlineId {
        let dropped = Arc::clone(dropped);
        let tracker = Arc::clone(&self.tracker);
        let events = Arc::clone(&self.events);
        let pass = name.to_owned();
        self.watchdog.arm(timeout, move || {
            log::warn!("Pass '{pass}' is still running after {timeout:?}");
            tracker.record_timeout(&dropped);
            events.publish(EngineEvent::Error {
                pass: Some(pass.clone()),
                error: EngineError::RenderTimeoutExpired { pass, timeout },
            });
        })
    }

    fn error_hook(&self, name: &str) -> ErrorHook {
        let tracker = Arc::clone(&self.tracker);
        let events = Arc::clone(&self.events);
        let pass = name.to_owned();
        Arc::new(move |e: RenderContextError| {
            tracker.record_error();
            events.publish(EngineEvent::Error {
                pass: Some(pass.clone()),
                error: EngineError::Render(e),
            });
        })
    }

    fn report(&self, pass: Option<&str>, error: EngineError) {
        self.tracker.record_error();
        self.events.publish(EngineEvent::Error {
            pass: pass.map(str::to_owned),
            error,
        });
    }

    fn return_to_pool(&self, texture: PooledTexture) {
        if let Err(e) = self.pool.release(texture) {
            log::error!("Failed to return an intermediate texture: {e}");
        }
    }
}

fn record_frame<T, F>(ctx: &mut RenderContext, name: &str, operation: F) -> Result<T, EngineError>
where
    F: FnOnce(&mut RenderContext) -> Result<T, EngineError>,
{
    let result = ctx
        .begin_managed_frame(name)
        .map_err(EngineError::from)
        .and_then(|()| operation(ctx))
        .and_then(|value| {
            ctx.end_managed_frame()?;
            Ok(value)
        });
    if result.is_err() {
        ctx.abort_frame();
    }
    result
}
