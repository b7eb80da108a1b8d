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

//! An in-memory GPU backend.
//!
//! The headless device allocates nothing on a real GPU. It tracks every resource
//! it hands out, checks heap placements for overlap, and logs the commands of
//! every submitted command buffer so callers can count exactly what reached the
//! backend.

mod command_buffer;
mod device;
pub mod profiles;

pub use command_buffer::{CommandLog, HeadlessCommandBuffer, RecordedCommand, SubmittedBuffer};
pub use device::{HeadlessDevice, HeadlessProvider, HEAP_PLACEMENT_ALIGNMENT};
