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

//! Device selection and the process-wide device context.

use crate::error::DeviceError;
use lumen_core::renderer::{
    CapabilityMatrix, CommandBuffer, DeviceProfile, DeviceProvider, GpuDevice, QueueId,
    ResourceError, SamplerDescriptor, SamplerId, TextureFormat,
};
use std::fmt;
use std::sync::{Arc, Mutex};

const MIB: u64 = 1024 * 1024;

/// Ranks a device for selection. Higher is better.
///
/// Unified memory is worth 1000, a non-low-power adapter 500 and a fixed one 200.
/// The feature tier and argument-buffer tier add their selection bonuses, and
/// the recommended working set adds one point per MiB.
pub fn device_score(profile: &DeviceProfile) -> u64 {
    let mut score = 0;
    if profile.has_unified_memory {
        score += 1000;
    }
    if !profile.is_low_power {
        score += 500;
    }
    if !profile.is_removable {
        score += 200;
    }
    if let Some(tier) = CapabilityMatrix::detect_tier(profile) {
        score += tier.selection_bonus();
    }
    score += profile.argument_buffers_tier.selection_bonus();
    score + profile.recommended_max_working_set_size / MIB
}

/// Picks the device to use from `devices`.
///
/// A single device is taken without scoring. Otherwise the highest
/// [`device_score`] wins and ties go to the first enumerated.
pub fn select_device(devices: Vec<Arc<dyn GpuDevice>>) -> Option<Arc<dyn GpuDevice>> {
    if devices.len() <= 1 {
        return devices.into_iter().next();
    }
    let mut best: Option<(u64, Arc<dyn GpuDevice>)> = None;
    for device in devices {
        let score = device_score(device.profile());
        log::debug!("GPU candidate '{}' scored {score}", device.profile().name);
        if best.as_ref().is_none_or(|(best_score, _)| score > *best_score) {
            best = Some((score, device));
        }
    }
    best.map(|(_, device)| device)
}

/// The samplers every effect can bind without creating its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardSamplers {
    /// Bilinear, clamped. The default sampler.
    pub linear: SamplerId,
    /// Point sampling, clamped.
    pub nearest: SamplerId,
    /// Trilinear, clamped.
    pub mipmapped: SamplerId,
}

/// The one GPU device the process renders with.
///
/// Construction selects the device, detects and validates its capabilities and
/// creates exactly one command queue plus the standard samplers. Nothing about
/// the context changes afterwards.
pub struct DeviceContext {
    device: Arc<dyn GpuDevice>,
    capabilities: CapabilityMatrix,
    supported_formats: Vec<TextureFormat>,
    queue: QueueId,
    samplers: StandardSamplers,
}

impl fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceContext")
            .field("device", &self.capabilities.identity.name)
            .field("tier", &self.capabilities.tier)
            .field("queue", &self.queue)
            .finish()
    }
}

static SHARED: Mutex<Option<Result<Arc<DeviceContext>, DeviceError>>> = Mutex::new(None);

impl DeviceContext {
    /// Selects a device from `provider` and builds a context for it.
    ///
    /// ## Errors
    /// [`DeviceError::NoDeviceFound`] when the provider enumerates nothing, or any
    /// error from [`DeviceContext::with_device`].
    pub fn new(provider: &dyn DeviceProvider) -> Result<Self, DeviceError> {
        let device =
            select_device(provider.enumerate_devices()).ok_or(DeviceError::NoDeviceFound)?;
        Self::with_device(device)
    }

    /// Builds a context for an already chosen device.
    pub fn with_device(device: Arc<dyn GpuDevice>) -> Result<Self, DeviceError> {
        let capabilities = CapabilityMatrix::detect(device.profile())
            .map_err(|e| DeviceError::InsufficientCapability(e.to_string()))?;

        let queue = device
            .new_command_queue("lumen.main")
            .map_err(|e| DeviceError::QueueCreationFailed(e.to_string()))?;

        let make_sampler = |descriptor: SamplerDescriptor| {
            device
                .new_sampler(&descriptor)
                .map_err(|e| DeviceError::SamplerCreationFailed {
                    label: descriptor.label,
                    reason: e.to_string(),
                })
        };
        let samplers = StandardSamplers {
            linear: make_sampler(SamplerDescriptor::linear())?,
            nearest: make_sampler(SamplerDescriptor::nearest())?,
            mipmapped: make_sampler(SamplerDescriptor::mipmapped())?,
        };

        log::info!(
            "Using GPU '{}' ({:?}, working set {} MiB, unified memory: {})",
            capabilities.identity.name,
            capabilities.tier,
            capabilities.limits.recommended_max_working_set_size / MIB,
            capabilities.has_unified_memory
        );

        Ok(Self {
            supported_formats: capabilities.supported_formats(),
            device,
            capabilities,
            queue,
            samplers,
        })
    }

    /// Returns the process-wide context, building it with `init` on first use.
    ///
    /// A failed construction is remembered: later calls return the same error
    /// without running `init` again. Prefer passing an explicit
    /// `Arc<DeviceContext>`; this accessor exists for application entry points.
    pub fn shared<F>(init: F) -> Result<Arc<DeviceContext>, DeviceError>
    where
        F: FnOnce() -> Result<DeviceContext, DeviceError>,
    {
        let mut shared = SHARED.lock().unwrap();
        shared
            .get_or_insert_with(|| {
                let result = init().map(Arc::new);
                if let Err(e) = &result {
                    log::error!("Shared device context construction failed: {e}");
                }
                result
            })
            .clone()
    }

    /// The underlying device.
    pub fn device(&self) -> &Arc<dyn GpuDevice> {
        &self.device
    }

    /// The capability matrix detected at construction.
    pub fn capabilities(&self) -> &CapabilityMatrix {
        &self.capabilities
    }

    /// Every texture format the device can create.
    pub fn supported_formats(&self) -> &[TextureFormat] {
        &self.supported_formats
    }

    /// The submission queue.
    pub fn queue(&self) -> QueueId {
        self.queue
    }

    /// The standard samplers.
    pub fn samplers(&self) -> StandardSamplers {
        self.samplers
    }

    /// The default bilinear sampler.
    pub fn default_sampler(&self) -> SamplerId {
        self.samplers.linear
    }

    /// The working-set size the driver recommends, in bytes.
    pub fn recommended_max_working_set_size(&self) -> u64 {
        self.capabilities.limits.recommended_max_working_set_size
    }

    /// Whether the device supports placement heaps.
    pub fn supports_heaps(&self) -> bool {
        self.device.profile().supports_heaps
    }

    /// Creates a command buffer on the main queue.
    ///
    /// ## Errors
    /// [`DeviceError::DeviceLost`] when the device is gone, otherwise
    /// [`DeviceError::CommandBufferCreationFailed`].
    pub fn make_command_buffer(&self) -> Result<Box<dyn CommandBuffer>, DeviceError> {
        self.device.new_command_buffer(self.queue).map_err(|e| match e {
            ResourceError::DeviceLost => self.lost(),
            e => {
                log::error!("Command buffer creation failed: {e}");
                DeviceError::CommandBufferCreationFailed(e.to_string())
            }
        })
    }

    /// Checks that the device still accepts work by creating a transient queue.
    ///
    /// ## Errors
    /// [`DeviceError::DeviceLost`] when the device is gone, otherwise
    /// [`DeviceError::QueueCreationFailed`].
    pub fn probe(&self) -> Result<(), DeviceError> {
        match self.device.new_command_queue("lumen.probe") {
            Ok(_) => Ok(()),
            Err(ResourceError::DeviceLost) => Err(self.lost()),
            Err(e) => {
                log::error!("Device probe failed: {e}");
                Err(DeviceError::QueueCreationFailed(e.to_string()))
            }
        }
    }

    fn lost(&self) -> DeviceError {
        log::error!("GPU '{}' was lost.", self.capabilities.identity.name);
        DeviceError::DeviceLost
    }
}
