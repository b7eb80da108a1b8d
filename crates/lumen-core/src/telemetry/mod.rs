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

//! Frame statistics and the rolling sample storage they are folded from.

use crate::platform::{MemoryPressure, ThermalState};
use serde::{Deserialize, Serialize};

/// A fixed-size circular buffer for storing numerical samples.
#[derive(Debug, Clone)]
pub struct RingBuffer<T, const N: usize> {
    data: [T; N],
    index: usize,
    count: usize,
}

impl<T: Default + Copy, const N: usize> RingBuffer<T, N> {
    /// Creates a new, empty ring buffer.
    pub fn new() -> Self {
        Self {
            data: [T::default(); N],
            index: 0,
            count: 0,
        }
    }

    /// Pushes a new value into the buffer, overwriting the oldest if full.
    pub fn push(&mut self, value: T) {
        self.data[self.index] = value;
        self.index = (self.index + 1) % N;
        if self.count < N {
            self.count += 1;
        }
    }

    /// Returns the number of elements currently in the buffer.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Returns `true` when no samples are stored.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Forgets every sample.
    pub fn clear(&mut self) {
        self.index = 0;
        self.count = 0;
    }

    /// Returns an iterator over the values in chronological order (oldest to newest).
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let (left, right) = self.data.split_at(self.index);
        if self.count < N {
            // Not full yet: only the values before the write index are live.
            right[N - self.index..]
                .iter()
                .chain(left[..self.index].iter())
        } else {
            right.iter().chain(left.iter())
        }
    }
}

impl<T: Default + Copy, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingBuffer<f64, N> {
    /// The arithmetic mean of the stored values, or `0.0` when empty.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.iter().sum::<f64>() / self.count as f64
    }

    /// The largest stored value, or `0.0` when empty.
    pub fn max(&self) -> f64 {
        self.iter().copied().fold(0.0, f64::max)
    }
}

/// A snapshot of engine health, published once per statistics interval.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameStatistics {
    /// Successful passes since start.
    pub frames_rendered: u64,
    /// Mean pass duration over the last interval, in milliseconds.
    pub average_frame_time_ms: f64,
    /// Frames per second implied by the mean duration.
    pub fps: f64,
    /// Bytes held by the resource pool and texture cache.
    pub memory_usage_bytes: u64,
    /// Thermal state when the snapshot was taken.
    pub thermal_state: ThermalState,
    /// Pressure level derived from memory usage.
    pub memory_pressure: MemoryPressure,
    /// Passes that overran their time limit, since start.
    pub dropped_frames: u64,
    /// Failed passes, since start.
    pub errors: u64,
    /// Time-limit expiries, since start.
    pub timeouts: u64,
    /// Passes in flight when the snapshot was taken.
    pub active_passes: usize,
}
