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

//! Foundational crate for the lumen GPU core.
//!
//! `lumen-core` holds the contracts every other crate builds on: the device and
//! command-buffer traits a backend implements, the capability tier table, texture
//! descriptors and pixel-format selection, render-state value types, the engine
//! configuration, platform pressure signals, and the collaborator traits for image
//! decoding and pipeline caching. It contains no GPU code of its own.

#![warn(missing_docs)]

pub mod config;
pub mod decode;
pub mod effect;
pub mod event;
pub mod platform;
pub mod renderer;
pub mod telemetry;

pub use config::{EngineConfiguration, FeatureToggles, ProcessingMode, QualityLevel};
pub use platform::{HardwareMonitor, MemoryPressure, SystemMemory, ThermalState};
