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

//! Errors reported by GPU backends.

use crate::renderer::texture::{HeapId, TextureId};
use std::fmt;

/// An error raised by a [`GpuDevice`](crate::renderer::GpuDevice) implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// The device could not satisfy an allocation of `requested` bytes.
    OutOfMemory {
        /// The size of the failed allocation.
        requested: u64,
    },
    /// The placement does not fit inside the heap.
    HeapOverflow {
        /// The heap that was targeted.
        heap: HeapId,
        /// The requested byte offset.
        offset: u64,
        /// The requested size.
        size: u64,
    },
    /// The handle does not name a live resource.
    InvalidHandle(TextureId),
    /// The device does not support the requested operation.
    Unsupported(String),
    /// The device has been removed or reset.
    DeviceLost,
    /// Any other backend-specific failure.
    Backend(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::OutOfMemory { requested } => {
                write!(f, "Out of device memory allocating {requested} bytes")
            }
            ResourceError::HeapOverflow { heap, offset, size } => {
                write!(
                    f,
                    "Placement of {size} bytes at offset {offset} overflows heap {heap:?}"
                )
            }
            ResourceError::InvalidHandle(id) => write!(f, "Invalid texture handle: {id:?}"),
            ResourceError::Unsupported(what) => write!(f, "Unsupported operation: {what}"),
            ResourceError::DeviceLost => write!(f, "The GPU device was lost"),
            ResourceError::Backend(msg) => write!(f, "Backend error: {msg}"),
        }
    }
}

impl std::error::Error for ResourceError {}
