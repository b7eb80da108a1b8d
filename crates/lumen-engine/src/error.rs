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

//! The engine-level error taxonomy.

use lumen_core::decode::TextureLoadError;
use lumen_core::platform::ThermalState;
use lumen_gpu::{AllocationError, DeviceError, RenderContextError};
use std::time::Duration;
use thiserror::Error;

/// A failure inside an effect renderer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EffectError {
    /// The renderer has no implementation for this operation.
    #[error("unsupported effect '{0}'")]
    Unsupported(&'static str),
    /// The parameters cannot be rendered as given.
    #[error("invalid effect parameters: {0}")]
    InvalidParameters(String),
    /// Recording failed.
    #[error(transparent)]
    Render(#[from] RenderContextError),
}

/// Anything a render pass, image chain or texture load can fail with.
///
/// Cloneable so the same error can be returned to the caller and published to
/// observers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// The device is too hot to render.
    #[error("rendering is suspended in thermal state {0:?}")]
    ThermalStateUnsupported(ThermalState),
    /// Memory pressure is critical.
    #[error("rendering is suspended under critical memory pressure")]
    MemoryPressureCritical,
    /// A pass overran its advisory time limit. It was not cancelled.
    #[error("pass '{pass}' exceeded its {timeout:?} time limit")]
    RenderTimeoutExpired {
        /// The pass name.
        pass: String,
        /// The limit that expired.
        timeout: Duration,
    },
    /// The device failed.
    #[error(transparent)]
    Device(#[from] DeviceError),
    /// A pooled texture could not be allocated or returned.
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    /// Command recording failed.
    #[error(transparent)]
    Render(#[from] RenderContextError),
    /// A texture could not be decoded or uploaded.
    #[error(transparent)]
    TextureLoad(#[from] TextureLoadError),
    /// An effect could not be encoded.
    #[error(transparent)]
    Effect(#[from] EffectError),
    /// A render operation reported its own failure.
    #[error("render operation failed: {0}")]
    Operation(String),
    /// Image processing was requested without an effect renderer.
    #[error("no effect renderer is installed")]
    NoEffectRenderer,
    /// A texture load was requested without a texture decoder.
    #[error("no texture decoder is installed")]
    NoTextureDecoder,
    /// Image processing was requested with no operations.
    #[error("the effect chain is empty")]
    EmptyPipeline,
    /// An engine task failed unexpectedly.
    #[error("internal engine error: {0}")]
    Internal(String),
}
