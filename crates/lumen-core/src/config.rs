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

//! Engine configuration: quality levels, processing modes, feature toggles and the
//! pure adaptation functions that react to thermal and memory signals.

use crate::platform::{MemoryPressure, ThermalState};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default advisory time limit for a single render pass.
pub const DEFAULT_RENDER_TIMEOUT_MS: u64 = 5_000;

const MIB: u64 = 1024 * 1024;

/// The output quality the engine renders at.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    /// Smallest textures, no mipmaps, no multisampling.
    Low,
    /// Balanced default.
    #[default]
    Medium,
    /// Large textures and 4x multisampling.
    High,
    /// Device maximums.
    Ultra,
}

impl QualityLevel {
    /// The largest texture edge, in pixels, this level allows.
    pub fn max_texture_size(self) -> u32 {
        match self {
            QualityLevel::Low => 2048,
            QualityLevel::Medium => 4096,
            QualityLevel::High => 8192,
            QualityLevel::Ultra => 16384,
        }
    }

    /// The maximum number of composited layers.
    pub fn max_layer_count(self) -> u32 {
        match self {
            QualityLevel::Low => 16,
            QualityLevel::Medium => 32,
            QualityLevel::High => 64,
            QualityLevel::Ultra => 128,
        }
    }

    /// Whether textures get a full mip chain at this level.
    pub fn generates_mipmaps(self) -> bool {
        !matches!(self, QualityLevel::Low)
    }

    /// The maximum MSAA sample count.
    pub fn max_sample_count(self) -> u32 {
        match self {
            QualityLevel::Low => 1,
            QualityLevel::Medium => 2,
            QualityLevel::High => 4,
            QualityLevel::Ultra => 8,
        }
    }

    /// One level lower, saturating at [`QualityLevel::Low`].
    pub fn lowered(self) -> Self {
        match self {
            QualityLevel::Low | QualityLevel::Medium => QualityLevel::Low,
            QualityLevel::High => QualityLevel::Medium,
            QualityLevel::Ultra => QualityLevel::High,
        }
    }

    /// Returns `self` unless it is above `cap`.
    pub fn capped_at(self, cap: QualityLevel) -> Self {
        self.min(cap)
    }
}

/// How the engine paces its work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Interactive preview at 60 fps.
    #[default]
    Realtime,
    /// Interactive at 30 fps with higher fidelity.
    HighQuality,
    /// Offline export; one second per frame is acceptable.
    Export,
    /// Low-priority work at 10 fps.
    Background,
}

impl ProcessingMode {
    /// The frame-time budget for this mode.
    pub fn target_frame_time(self) -> Duration {
        match self {
            ProcessingMode::Realtime => Duration::from_secs_f64(1.0 / 60.0),
            ProcessingMode::HighQuality => Duration::from_secs_f64(1.0 / 30.0),
            ProcessingMode::Export => Duration::from_secs(1),
            ProcessingMode::Background => Duration::from_millis(100),
        }
    }
}

/// Independent switches for optional engine behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureToggles {
    /// Prefer block-compressed texture formats where the device allows.
    pub compression: bool,
    /// Back pooled textures with a placement heap.
    pub heap_usage: bool,
    /// Compile shaders off the render thread.
    pub async_shader_compilation: bool,
    /// Allow the engine to lower quality on its own.
    pub adaptive_quality: bool,
    /// React to thermal state changes.
    pub thermal_throttling: bool,
    /// React to memory pressure changes.
    pub memory_pressure_handling: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            compression: false,
            heap_usage: true,
            async_shader_compilation: true,
            adaptive_quality: true,
            thermal_throttling: true,
            memory_pressure_handling: true,
        }
    }
}

/// The full set of knobs the engine runs with.
///
/// A configuration is plain data. It changes only through the `adapt_*` functions
/// below, which return a new value and leave `self` untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfiguration {
    /// Output quality.
    pub quality: QualityLevel,
    /// Frame pacing.
    pub mode: ProcessingMode,
    /// Optional behaviour switches.
    pub features: FeatureToggles,
    /// Number of worker threads for decode and background work.
    pub worker_threads: usize,
    /// Upper bound on pooled GPU memory, if any.
    pub memory_cap_bytes: Option<u64>,
    /// Advisory per-pass time limit, in milliseconds.
    pub render_timeout_ms: u64,
}

impl Default for EngineConfiguration {
    fn default() -> Self {
        Self::preview()
    }
}

impl EngineConfiguration {
    /// Interactive editing: realtime pacing, medium quality, adaptive.
    pub fn preview() -> Self {
        Self {
            quality: QualityLevel::Medium,
            mode: ProcessingMode::Realtime,
            features: FeatureToggles::default(),
            worker_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            memory_cap_bytes: None,
            render_timeout_ms: DEFAULT_RENDER_TIMEOUT_MS,
        }
    }

    /// Final export: ultra quality, never degraded, single worker.
    pub fn export() -> Self {
        Self {
            quality: QualityLevel::Ultra,
            mode: ProcessingMode::Export,
            features: FeatureToggles {
                adaptive_quality: false,
                ..FeatureToggles::default()
            },
            worker_threads: 1,
            ..Self::preview()
        }
    }

    /// Battery saving: low quality, background pacing, compressed and capped.
    pub fn low_power() -> Self {
        Self {
            quality: QualityLevel::Low,
            mode: ProcessingMode::Background,
            features: FeatureToggles {
                heap_usage: true,
                compression: true,
                ..FeatureToggles::default()
            },
            memory_cap_bytes: Some(256 * MIB),
            ..Self::preview()
        }
    }

    /// The advisory per-pass time limit.
    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    /// Returns the configuration to use under `state`.
    ///
    /// | state    | effect                                            |
    /// |----------|---------------------------------------------------|
    /// | nominal  | unchanged                                         |
    /// | fair     | quality capped at high                            |
    /// | serious  | quality capped at medium, no async shader compile |
    /// | critical | quality low, background mode                      |
    pub fn adapt_to_thermal_state(&self, state: ThermalState) -> Self {
        let mut adapted = self.clone();
        match state {
            ThermalState::Nominal => {}
            ThermalState::Fair => {
                adapted.quality = self.quality.capped_at(QualityLevel::High);
            }
            ThermalState::Serious => {
                adapted.quality = self.quality.capped_at(QualityLevel::Medium);
                adapted.features.async_shader_compilation = false;
            }
            ThermalState::Critical => {
                adapted.quality = QualityLevel::Low;
                adapted.mode = ProcessingMode::Background;
            }
        }
        adapted
    }

    /// Returns the configuration to use under memory `pressure`.
    ///
    /// Warning lowers quality one level. Urgent caps it at medium and turns
    /// compression on. Critical drops to low quality, turns compression on and
    /// scales any memory cap by the critical reduction factor.
    pub fn adapt_to_memory_pressure(&self, pressure: MemoryPressure) -> Self {
        let mut adapted = self.clone();
        match pressure {
            MemoryPressure::Normal => {}
            MemoryPressure::Warning => {
                adapted.quality = self.quality.lowered();
            }
            MemoryPressure::Urgent => {
                adapted.quality = self.quality.capped_at(QualityLevel::Medium);
                adapted.features.compression = true;
            }
            MemoryPressure::Critical => {
                adapted.quality = QualityLevel::Low;
                adapted.features.compression = true;
                adapted.memory_cap_bytes = self.memory_cap_bytes.map(|cap| {
                    (cap as f64 * MemoryPressure::Critical.cache_reduction_factor()) as u64
                });
            }
        }
        adapted
    }

    /// Parses a configuration from JSON. Missing fields take preview defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::Parse)
    }

    /// Serializes the configuration to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)
    }
}

/// An error raised while loading or saving a configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The input was not a valid configuration document.
    Parse(serde_json::Error),
    /// The configuration could not be written out.
    Serialize(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(e) => write!(f, "Invalid engine configuration: {e}"),
            ConfigError::Serialize(e) => write!(f, "Failed to serialize configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Parse(e) | ConfigError::Serialize(e) => Some(e),
        }
    }
}
