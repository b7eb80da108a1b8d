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

use lumen_core::platform::{HardwareMonitor, SystemMemory, ThermalState};
use std::sync::Mutex;

/// A hardware monitor whose readings are set by the host application.
///
/// Useful where the platform delivers thermal and memory notifications itself,
/// and in tests.
#[derive(Debug, Default)]
pub struct ManualHardwareMonitor {
    thermal: Mutex<ThermalState>,
    memory: Mutex<SystemMemory>,
}

impl ManualHardwareMonitor {
    /// A monitor reporting nominal temperature and unknown memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reported thermal state.
    pub fn set_thermal_state(&self, state: ThermalState) {
        *self.thermal.lock().unwrap() = state;
    }

    /// Sets the reported memory snapshot.
    pub fn set_system_memory(&self, memory: SystemMemory) {
        *self.memory.lock().unwrap() = memory;
    }
}

impl HardwareMonitor for ManualHardwareMonitor {
    fn thermal_state(&self) -> ThermalState {
        *self.thermal.lock().unwrap()
    }

    fn system_memory(&self) -> SystemMemory {
        *self.memory.lock().unwrap()
    }
}
