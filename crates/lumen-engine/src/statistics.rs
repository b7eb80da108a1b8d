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

//! Frame timing and the statistics snapshots built from it.

use lumen_core::platform::{MemoryPressure, ThermalState};
use lumen_core::telemetry::{FrameStatistics, RingBuffer};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Frame-time samples kept between snapshots.
pub const FRAME_TIME_SAMPLES: usize = 60;

/// Minimum time between two snapshots.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Readings taken from the rest of the engine when a snapshot is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSample {
    /// Bytes held by the resource pool and texture cache.
    pub memory_usage_bytes: u64,
    /// Current thermal state.
    pub thermal_state: ThermalState,
    /// Pressure derived from memory usage.
    pub memory_pressure: MemoryPressure,
    /// Passes in flight.
    pub active_passes: usize,
}

/// Marks one pass as dropped so the timeout and the frame budget never count
/// it twice.
#[derive(Debug, Default)]
pub struct DroppedFlag(AtomicBool);

impl DroppedFlag {
    /// Whether the pass has been counted as dropped.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn claim(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }
}

#[derive(Debug, Default)]
struct Window {
    frame_times_ms: RingBuffer<f64, FRAME_TIME_SAMPLES>,
    last_refresh: Option<Instant>,
    latest: FrameStatistics,
}

/// Collects pass timings and cumulative counters from any thread.
#[derive(Debug)]
pub struct StatisticsTracker {
    frames_rendered: AtomicU64,
    dropped_frames: AtomicU64,
    errors: AtomicU64,
    timeouts: AtomicU64,
    interval: Duration,
    window: Mutex<Window>,
}

impl Default for StatisticsTracker {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_INTERVAL)
    }
}

impl StatisticsTracker {
    /// A tracker producing at most one snapshot per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            frames_rendered: AtomicU64::new(0),
            dropped_frames: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            interval,
            window: Mutex::new(Window::default()),
        }
    }

    /// Records how long a pass took. Only successful passes count as rendered
    /// frames. A pass longer than `budget` counts as dropped.
    pub fn record_pass(
        &self,
        duration: Duration,
        succeeded: bool,
        budget: Duration,
        dropped: &DroppedFlag,
    ) {
        if succeeded {
            self.frames_rendered.fetch_add(1, Ordering::Relaxed);
        }
        if duration > budget {
            self.drop_frame(dropped);
        }
        let mut window = self.window.lock().unwrap();
        window.frame_times_ms.push(duration.as_secs_f64() * 1000.0);
    }

    /// Counts a failed pass or task.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a pass that overran its time limit. It also counts as dropped.
    pub fn record_timeout(&self, dropped: &DroppedFlag) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
        self.drop_frame(dropped);
    }

    fn drop_frame(&self, dropped: &DroppedFlag) {
        if dropped.claim() {
            self.dropped_frames.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Failed passes so far.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Time-limit expiries so far.
    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    /// Builds a snapshot if the refresh interval has passed since the last one.
    ///
    /// The frame-time window is folded into the average and then cleared.
    pub fn refresh(&self, now: Instant, sample: ResourceSample) -> Option<FrameStatistics> {
        let mut window = self.window.lock().unwrap();
        if window
            .last_refresh
            .is_some_and(|last| now.saturating_duration_since(last) < self.interval)
        {
            return None;
        }

        let average = window.frame_times_ms.average();
        let statistics = FrameStatistics {
            average_frame_time_ms: average,
            fps: if average > 0.0 { 1000.0 / average } else { 0.0 },
            memory_usage_bytes: sample.memory_usage_bytes,
            thermal_state: sample.thermal_state,
            memory_pressure: sample.memory_pressure,
            active_passes: sample.active_passes,
            ..self.counters()
        };
        window.frame_times_ms.clear();
        window.last_refresh = Some(now);
        window.latest = statistics;
        Some(statistics)
    }

    /// The last snapshot, with its cumulative counters brought up to date.
    pub fn latest(&self) -> FrameStatistics {
        let latest = self.window.lock().unwrap().latest;
        FrameStatistics {
            frames_rendered: self.frames_rendered.load(Ordering::Relaxed),
            dropped_frames: self.dropped_frames.load(Ordering::Relaxed),
            errors: self.errors(),
            timeouts: self.timeouts(),
            ..latest
        }
    }

    fn counters(&self) -> FrameStatistics {
        FrameStatistics {
            frames_rendered: self.frames_rendered.load(Ordering::Relaxed),
            dropped_frames: self.dropped_frames.load(Ordering::Relaxed),
            errors: self.errors(),
            timeouts: self.timeouts(),
            ..FrameStatistics::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const BUDGET: Duration = Duration::from_millis(50);

    fn sample() -> ResourceSample {
        ResourceSample {
            memory_usage_bytes: 1024,
            thermal_state: ThermalState::Fair,
            memory_pressure: MemoryPressure::Normal,
            active_passes: 2,
        }
    }

    #[test]
    fn snapshot_folds_the_window() {
        let tracker = StatisticsTracker::default();
        for ms in [10, 20, 30] {
            tracker.record_pass(Duration::from_millis(ms), true, BUDGET, &DroppedFlag::default());
        }
        tracker.record_pass(Duration::from_millis(40), false, BUDGET, &DroppedFlag::default());
        tracker.record_error();

        let stats = tracker.refresh(Instant::now(), sample()).unwrap();
        assert_relative_eq!(stats.average_frame_time_ms, 25.0, epsilon = 1e-9);
        assert_relative_eq!(stats.fps, 40.0, epsilon = 1e-9);
        assert_eq!(stats.frames_rendered, 3);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.thermal_state, ThermalState::Fair);
        assert_eq!(stats.active_passes, 2);
    }

    #[test]
    fn refreshes_are_rate_limited_and_clear_the_window() {
        let tracker = StatisticsTracker::new(Duration::from_secs(1));
        let start = Instant::now();
        tracker.record_pass(Duration::from_millis(16), true, BUDGET, &DroppedFlag::default());
        assert!(tracker.refresh(start, sample()).is_some());
        assert!(tracker
            .refresh(start + Duration::from_millis(500), sample())
            .is_none());

        let later = tracker
            .refresh(start + Duration::from_secs(1), sample())
            .unwrap();
        assert_eq!(later.average_frame_time_ms, 0.0);
        assert_eq!(later.fps, 0.0);
        assert_eq!(later.frames_rendered, 1);
    }

    #[test]
    fn timeouts_count_as_dropped_frames() {
        let tracker = StatisticsTracker::default();
        tracker.record_timeout(&DroppedFlag::default());
        let latest = tracker.latest();
        assert_eq!(latest.timeouts, 1);
        assert_eq!(latest.dropped_frames, 1);
        assert_eq!(latest.errors, 0);
    }

    #[test]
    fn passes_over_budget_are_dropped() {
        let tracker = StatisticsTracker::default();
        tracker.record_pass(Duration::from_millis(49), true, BUDGET, &DroppedFlag::default());
        tracker.record_pass(Duration::from_millis(51), true, BUDGET, &DroppedFlag::default());
        tracker.record_pass(Duration::from_millis(80), false, BUDGET, &DroppedFlag::default());

        let latest = tracker.latest();
        assert_eq!(latest.frames_rendered, 2);
        assert_eq!(latest.dropped_frames, 2);
    }

    #[test]
    fn a_timed_out_pass_over_budget_is_dropped_once() {
        let tracker = StatisticsTracker::default();
        let dropped = DroppedFlag::default();
        tracker.record_timeout(&dropped);
        tracker.record_pass(Duration::from_millis(200), true, BUDGET, &dropped);

        assert!(dropped.is_set());
        let latest = tracker.latest();
        assert_eq!(latest.timeouts, 1);
        assert_eq!(latest.dropped_frames, 1);
    }

    #[test]
    fn only_the_newest_samples_are_averaged() {
        let tracker = StatisticsTracker::default();
        for _ in 0..FRAME_TIME_SAMPLES {
            tracker.record_pass(Duration::from_millis(100), true, BUDGET, &DroppedFlag::default());
        }
        for _ in 0..FRAME_TIME_SAMPLES {
            tracker.record_pass(Duration::from_millis(10), true, BUDGET, &DroppedFlag::default());
        }
        let stats = tracker.refresh(Instant::now(), sample()).unwrap();
        assert_relative_eq!(stats.average_frame_time_ms, 10.0, epsilon = 1e-9);
    }
}
