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

use lumen_core::renderer::{DeviceProfile, FeatureTier, GpuDevice};
use lumen_gpu::{device_score, select_device, DeviceContext, DeviceError};
use lumen_infra::graphics::headless::profiles;
use lumen_infra::{HeadlessDevice, HeadlessProvider};
use std::sync::Arc;

const GIB: u64 = 1024 * 1024 * 1024;

fn named(name: &str, profile: DeviceProfile) -> Arc<HeadlessDevice> {
    Arc::new(HeadlessDevice::new(DeviceProfile {
        name: name.to_string(),
        ..profile
    }))
}

fn as_dyn(devices: &[Arc<HeadlessDevice>]) -> Vec<Arc<dyn GpuDevice>> {
    devices
        .iter()
        .map(|d| Arc::clone(d) as Arc<dyn GpuDevice>)
        .collect()
}

#[test]
fn top_tier_device_reports_every_capability() {
    let device = named(
        "top",
        DeviceProfile {
            recommended_max_working_set_size: 2 * GIB,
            ..profiles::integrated_family9()
        },
    );
    let provider = HeadlessProvider::new(vec![device]);
    let context = DeviceContext::new(&provider).unwrap();
    let caps = context.capabilities();

    assert_eq!(caps.tier, FeatureTier::Family9);
    assert!(caps.flags.non_uniform_threadgroups);
    assert!(caps.flags.read_write_textures);
    assert!(caps.flags.atomics);
    assert!(caps.flags.counter_sampling);
    assert!(caps.flags.simd_reduction);
    assert!(caps.flags.float32_atomics);
    assert!(caps.flags.compression.astc);
    assert!(caps.flags.compression.etc2);
    assert_eq!(context.recommended_max_working_set_size(), 2147483648);
}

#[test]
fn detection_is_reproducible() {
    let device = named("same", profiles::integrated_family9());
    let first = DeviceContext::with_device(Arc::clone(&device) as Arc<dyn GpuDevice>).unwrap();
    let second = DeviceContext::with_device(device).unwrap();
    assert_eq!(first.capabilities(), second.capabilities());
    assert_eq!(first.supported_formats(), second.supported_formats());
}

#[test]
fn construction_creates_one_queue_and_the_standard_samplers() {
    let device = named("gpu", profiles::integrated_family9());
    let context = DeviceContext::with_device(Arc::clone(&device) as Arc<dyn GpuDevice>).unwrap();

    assert_eq!(device.queue_count(), 1);
    assert_eq!(device.sampler_count(), 3);
    assert_eq!(context.default_sampler(), context.samplers().linear);
    assert_ne!(context.samplers().linear, context.samplers().nearest);
}

#[test]
fn scores_follow_the_documented_weights() {
    // unified 1000 + not low-power 500 + fixed 200 + Family9 (100 + 50)
    // + Tier2 argument buffers 30 + 8192 MiB working set.
    assert_eq!(device_score(&profiles::integrated_family9()), 10072);
}

#[test]
fn highest_score_wins() {
    let devices = vec![
        named("low power", profiles::low_power_desktop()),
        named("integrated", profiles::integrated_family9()),
        named("discrete", profiles::discrete_desktop()),
    ];
    let chosen = select_device(as_dyn(&devices)).unwrap();
    assert_eq!(chosen.profile().name, "integrated");
}

#[test]
fn ties_go_to_the_first_enumerated() {
    let devices = vec![
        named("first", profiles::discrete_desktop()),
        named("second", profiles::discrete_desktop()),
    ];
    let chosen = select_device(as_dyn(&devices)).unwrap();
    assert_eq!(chosen.profile().name, "first");
}

#[test]
fn a_single_device_is_taken_without_scoring() {
    let devices = vec![named("only", profiles::legacy())];
    let chosen = select_device(as_dyn(&devices)).unwrap();
    assert_eq!(chosen.profile().name, "only");
}

#[test]
fn empty_provider_finds_no_device() {
    let provider = HeadlessProvider::new(Vec::new());
    assert_eq!(
        DeviceContext::new(&provider).unwrap_err(),
        DeviceError::NoDeviceFound
    );
}

#[test]
fn legacy_hardware_is_rejected() {
    let provider = HeadlessProvider::new(vec![named("old", profiles::legacy())]);
    assert!(matches!(
        DeviceContext::new(&provider),
        Err(DeviceError::InsufficientCapability(_))
    ));
}

#[test]
fn narrow_threadgroups_are_rejected() {
    let device = named(
        "narrow",
        DeviceProfile {
            max_threads_per_threadgroup: 16,
            ..profiles::integrated_family9()
        },
    );
    assert!(matches!(
        DeviceContext::with_device(device),
        Err(DeviceError::InsufficientCapability(_))
    ));
}

#[test]
fn probe_detects_a_lost_device() {
    let device = named("gpu", profiles::integrated_family9());
    let context = DeviceContext::with_device(Arc::clone(&device) as Arc<dyn GpuDevice>).unwrap();
    assert_eq!(context.probe(), Ok(()));

    device.lose_device();
    assert_eq!(context.probe(), Err(DeviceError::DeviceLost));
    assert!(matches!(
        context.make_command_buffer(),
        Err(DeviceError::DeviceLost)
    ));
}

#[test]
fn refused_command_buffers_are_not_a_lost_device() {
    let device = named("gpu", profiles::integrated_family9());
    let context = DeviceContext::with_device(Arc::clone(&device) as Arc<dyn GpuDevice>).unwrap();

    device.set_refuse_command_buffers(true);
    assert!(matches!(
        context.make_command_buffer(),
        Err(DeviceError::CommandBufferCreationFailed(_))
    ));
    assert_eq!(context.probe(), Ok(()));

    device.set_refuse_command_buffers(false);
    assert!(context.make_command_buffer().is_ok());
}

#[test]
fn shared_context_remembers_a_failed_construction() {
    let first = DeviceContext::shared(|| DeviceContext::new(&HeadlessProvider::new(Vec::new())));
    assert_eq!(first.unwrap_err(), DeviceError::NoDeviceFound);

    let second = DeviceContext::shared(|| panic!("construction must not be retried"));
    assert_eq!(second.unwrap_err(), DeviceError::NoDeviceFound);
}
