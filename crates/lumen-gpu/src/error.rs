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

//! Errors raised by the GPU layer.

use lumen_core::renderer::{TextureFormat, TextureId};
use thiserror::Error;

/// A failure selecting or talking to the GPU device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The platform reported no usable device.
    #[error("no GPU device found")]
    NoDeviceFound,
    /// The submission queue could not be created.
    #[error("failed to create the command queue: {0}")]
    QueueCreationFailed(String),
    /// One of the standard samplers could not be created.
    #[error("failed to create the '{label}' sampler: {reason}")]
    SamplerCreationFailed {
        /// Which standard sampler failed.
        label: &'static str,
        /// Backend message.
        reason: String,
    },
    /// The device is below the minimum feature set.
    #[error("insufficient device capability: {0}")]
    InsufficientCapability(String),
    /// The device is alive but refused a command buffer.
    #[error("failed to create a command buffer: {0}")]
    CommandBufferCreationFailed(String),
    /// The device has been removed or reset.
    #[error("the GPU device was lost")]
    DeviceLost,
}

/// A failure acquiring or returning pooled memory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// Neither the heap nor a direct allocation could satisfy the request.
    #[error("failed to allocate a {width}x{height} {format:?} texture ({requested} bytes): {reason}")]
    AllocationFailed {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
        /// Requested format.
        format: TextureFormat,
        /// Bytes the allocation needed.
        requested: u64,
        /// Why it failed.
        reason: String,
    },
    /// The texture is not currently checked out of this pool.
    #[error("texture {0:?} is not checked out of this pool")]
    UnknownResource(TextureId),
}

/// A failure recording commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderContextError {
    /// The call needs an open pass of a different kind.
    #[error("no suitable encoder: {0}")]
    InvalidEncoder(String),
    /// Draw or dispatch without a pipeline.
    #[error("resource not bound: {0}")]
    ResourceNotBound(String),
    /// The call violates the frame/pass protocol or a slot limit.
    #[error("invalid render state: {0}")]
    InvalidRenderState(String),
    /// The GPU reported an execution failure.
    #[error("command buffer failed: {0}")]
    CommandBufferFailed(String),
    /// The device could not provide a command buffer.
    #[error(transparent)]
    Device(#[from] DeviceError),
}
