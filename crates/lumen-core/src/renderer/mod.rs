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

//! Contracts and value types for the GPU layer.
//!
//! Backends implement [`GpuDevice`] and [`CommandBuffer`]; everything else in this
//! module is plain data shared between the backend and the engine.

pub mod capability;
pub mod command;
pub mod device;
pub mod error;
pub mod format;
pub mod texture;

pub use capability::*;
pub use command::*;
pub use device::*;
pub use error::*;
pub use format::*;
pub use texture::*;
