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

//! Adaptive render orchestration for the lumen GPU core.
//!
//! [`RenderEngine`] runs named passes on fresh frames, refuses work when the
//! device is too hot or memory is critical, reports passes that overrun their
//! time limit, and trims its pool and caches as memory pressure rises.
//! [`RenderEngine::process_image`] chains effect operations through pooled
//! intermediates, and the texture loader decodes and uploads images on tokio's
//! blocking pool.

#![warn(missing_docs)]

pub mod effect;
pub mod engine;
pub mod error;
pub mod event;
pub mod statistics;
pub mod texture;
pub mod watchdog;

pub use effect::{EffectPipelines, EffectRenderer, PipelineEffectRenderer};
pub use engine::{RenderEngine, RenderEngineBuilder};
pub use error::{EffectError, EngineError};
pub use event::EngineEvent;
pub use statistics::{DroppedFlag, ResourceSample, StatisticsTracker};
pub use texture::{CachedTexture, TextureCache, TextureLoadRequest, TextureLoader};
pub use watchdog::{DeadlineId, TimeoutWatchdog};
