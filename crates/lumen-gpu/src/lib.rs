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

//! The hot path of the lumen GPU core.
//!
//! - [`DeviceContext`] picks one GPU for the process and owns its queue.
//! - [`ResourcePool`] recycles textures under a memory budget, optionally carving
//!   them from a single placement heap.
//! - [`RenderContext`] records one frame at a time and drops redundant state changes
//!   before they reach the backend.

pub mod device_context;
pub mod error;
pub mod render_context;
pub mod resource_pool;

pub use device_context::{device_score, select_device, DeviceContext, StandardSamplers};
pub use error::{AllocationError, DeviceError, RenderContextError};
pub use render_context::{ErrorHook, RenderContext, RenderCounters, RenderState};
pub use resource_pool::{
    AllocationStrategy, Backing, HeapStatistics, MaintenanceReport, PoolConfig, PoolStatistics,
    PooledTexture, ResourcePool,
};
