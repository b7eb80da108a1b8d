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

//! Platform signals the engine adapts to: thermal state and memory pressure.

use serde::{Deserialize, Serialize};

/// Represents the thermal state of the host device.
///
/// Variants are ordered from coolest to hottest so they can be compared directly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum ThermalState {
    /// Running within normal temperature bounds.
    #[default]
    Nominal,
    /// Slightly elevated; no visible throttling yet.
    Fair,
    /// The system is throttling to shed heat.
    Serious,
    /// Critical temperature. New render work is refused.
    Critical,
}

impl ThermalState {
    /// Returns `true` when render work must be refused outright.
    pub fn exceeds_serious(self) -> bool {
        self > ThermalState::Serious
    }
}

/// Represents how strongly the process is being asked to give memory back.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum MemoryPressure {
    /// No pressure.
    #[default]
    Normal,
    /// Usage is climbing; trim caches lightly.
    Warning,
    /// Usage is high; trim caches aggressively.
    Urgent,
    /// Usage is at the limit. New render work is refused.
    Critical,
}

impl MemoryPressure {
    /// The fraction of idle cache memory that may be kept at this level.
    ///
    /// ## Returns
    /// `1.0` for normal, `0.75` for warning, `0.5` for urgent and `0.2` for critical.
    pub fn cache_reduction_factor(self) -> f64 {
        match self {
            MemoryPressure::Normal => 1.0,
            MemoryPressure::Warning => 0.75,
            MemoryPressure::Urgent => 0.5,
            MemoryPressure::Critical => 0.2,
        }
    }

    /// Derives a pressure level from a `used / total` ratio.
    pub fn from_usage_ratio(ratio: f64) -> Self {
        if ratio > 0.90 {
            MemoryPressure::Critical
        } else if ratio > 0.75 {
            MemoryPressure::Urgent
        } else if ratio > 0.60 {
            MemoryPressure::Warning
        } else {
            MemoryPressure::Normal
        }
    }

    /// Returns `true` for every level above [`MemoryPressure::Normal`].
    pub fn is_elevated(self) -> bool {
        self > MemoryPressure::Normal
    }
}

/// A snapshot of host memory, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemMemory {
    /// Total physical memory.
    pub total_bytes: u64,
    /// Memory still available to the process.
    pub available_bytes: u64,
}

impl SystemMemory {
    /// The fraction of memory still available, or `1.0` when the total is unknown.
    pub fn available_ratio(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        self.available_bytes as f64 / self.total_bytes as f64
    }
}

/// Trait for observing the physical state of the host platform.
pub trait HardwareMonitor: Send + Sync {
    /// Returns the current thermal state.
    fn thermal_state(&self) -> ThermalState;
    /// Returns the current host memory snapshot.
    fn system_memory(&self) -> SystemMemory;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thermal_states_are_ordered() {
        assert!(ThermalState::Nominal < ThermalState::Fair);
        assert!(ThermalState::Fair < ThermalState::Serious);
        assert!(ThermalState::Serious < ThermalState::Critical);
        assert!(!ThermalState::Serious.exceeds_serious());
        assert!(ThermalState::Critical.exceeds_serious());
    }

    #[test]
    fn reduction_factors_shrink_with_pressure() {
        assert_eq!(MemoryPressure::Normal.cache_reduction_factor(), 1.0);
        assert_eq!(MemoryPressure::Warning.cache_reduction_factor(), 0.75);
        assert_eq!(MemoryPressure::Urgent.cache_reduction_factor(), 0.5);
        assert_eq!(MemoryPressure::Critical.cache_reduction_factor(), 0.2);
    }

    #[test]
    fn usage_ratio_thresholds_are_exclusive() {
        assert_eq!(MemoryPressure::from_usage_ratio(0.0), MemoryPressure::Normal);
        assert_eq!(MemoryPressure::from_usage_ratio(0.60), MemoryPressure::Normal);
        assert_eq!(MemoryPressure::from_usage_ratio(0.61), MemoryPressure::Warning);
        assert_eq!(MemoryPressure::from_usage_ratio(0.75), MemoryPressure::Warning);
        assert_eq!(MemoryPressure::from_usage_ratio(0.76), MemoryPressure::Urgent);
        assert_eq!(MemoryPressure::from_usage_ratio(0.90), MemoryPressure::Urgent);
        assert_eq!(MemoryPressure::from_usage_ratio(0.95), MemoryPressure::Critical);
    }

    #[test]
    fn unknown_total_memory_reports_everything_available() {
        let memory = SystemMemory::default();
        assert_eq!(memory.available_ratio(), 1.0);
    }
}
