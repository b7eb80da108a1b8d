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

//! sysinfo-based implementation of the HardwareMonitor trait.

use lumen_core::platform::{HardwareMonitor, SystemMemory, ThermalState};
use std::sync::{Arc, Mutex};
use sysinfo::{Components, System};

/// Maps the hottest CPU reading, in degrees Celsius, to a thermal state.
pub fn thermal_state_for_temperature(celsius: f32) -> ThermalState {
    if celsius > 90.0 {
        ThermalState::Critical
    } else if celsius > 80.0 {
        ThermalState::Serious
    } else if celsius > 60.0 {
        ThermalState::Fair
    } else {
        ThermalState::Nominal
    }
}

/// A hardware monitor that uses the `sysinfo` crate.
pub struct SysinfoMonitor {
    system: Arc<Mutex<System>>,
}

impl SysinfoMonitor {
    /// Creates a new SysinfoMonitor.
    pub fn new() -> Self {
        let mut system = System::new_all();
        system.refresh_all();
        Self {
            system: Arc::new(Mutex::new(system)),
        }
    }
}

impl HardwareMonitor for SysinfoMonitor {
    fn thermal_state(&self) -> ThermalState {
        let components = Components::new_with_refreshed_list();
        let mut max_temp = 0.0;

        for component in &components {
            let label = component.label().to_lowercase();
            if label.contains("cpu") || label.contains("core") || label.contains("gpu") {
                if let Some(temp) = component.temperature() {
                    max_temp = f32::max(max_temp, temp);
                }
            }
        }

        if max_temp == 0.0 {
            // No sensors exposed.
            return ThermalState::Nominal;
        }
        thermal_state_for_temperature(max_temp)
    }

    fn system_memory(&self) -> SystemMemory {
        match self.system.lock() {
            Ok(mut system) => {
                system.refresh_memory();
                SystemMemory {
                    total_bytes: system.total_memory(),
                    available_bytes: system.available_memory(),
                }
            }
            Err(_) => SystemMemory::default(),
        }
    }
}

impl Default for SysinfoMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_thresholds() {
        assert_eq!(thermal_state_for_temperature(45.0), ThermalState::Nominal);
        assert_eq!(thermal_state_for_temperature(60.5), ThermalState::Fair);
        assert_eq!(thermal_state_for_temperature(85.0), ThermalState::Serious);
        assert_eq!(thermal_state_for_temperature(95.0), ThermalState::Critical);
    }

    #[test]
    fn reports_host_memory() {
        let monitor = SysinfoMonitor::new();
        let memory = monitor.system_memory();
        assert!(memory.available_bytes <= memory.total_bytes);
    }
}
