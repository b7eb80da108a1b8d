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

//! Notifications published to engine observers.

use crate::error::EngineError;
use lumen_core::platform::MemoryPressure;
use lumen_core::telemetry::FrameStatistics;
use std::time::Duration;

/// Something observers of a [`crate::RenderEngine`] may want to know.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A pass or background task failed, or a pass overran its time limit.
    Error {
        /// The pass concerned, if any.
        pass: Option<String>,
        /// What went wrong.
        error: EngineError,
    },
    /// A new statistics snapshot was taken.
    StatisticsUpdated(FrameStatistics),
    /// A pass is about to run.
    WillBeginPass {
        /// The pass name.
        name: String,
    },
    /// A pass finished, successfully or not.
    DidCompletePass {
        /// The pass name.
        name: String,
        /// Wall time the pass took.
        duration: Duration,
    },
    /// Memory pressure rose above the warning level.
    MemoryPressureDetected(MemoryPressure),
}

impl EngineEvent {
    /// A short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::Error { .. } => "error",
            EngineEvent::StatisticsUpdated(_) => "statistics_updated",
            EngineEvent::WillBeginPass { .. } => "will_begin_pass",
            EngineEvent::DidCompletePass { .. } => "did_complete_pass",
            EngineEvent::MemoryPressureDetected(_) => "memory_pressure_detected",
        }
    }
}
