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

//! Frame recording with redundant-state elimination.

mod state;

pub use state::{
    RenderState, StageBindings, MAX_BUFFER_SLOTS, MAX_SAMPLER_SLOTS, MAX_TEXTURE_SLOTS,
};

use crate::device_context::DeviceContext;
use crate::error::RenderContextError;
use lumen_core::effect::bindings;
use lumen_core::renderer::{
    BufferId, CommandBuffer, CommandBufferStatus, ComputePipelineId, CullMode,
    DepthStencilStateId, FillMode, PassKind, PrimitiveType, RenderPipelineId,
    RenderTargetDescriptor, SamplerId, ScissorRect, ShaderStage, TextureId, Viewport, Winding,
    MAX_COLOR_ATTACHMENTS,
};
use std::fmt;
use std::sync::Arc;

/// Largest inline constant payload accepted by [`RenderContext::set_bytes`].
pub const MAX_INLINE_BYTES: usize = 4096;

/// Receives command buffer failures reported after [`RenderContext::end_frame`].
pub type ErrorHook = Arc<dyn Fn(RenderContextError) + Send + Sync>;

/// What the context did with the calls it received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderCounters {
    /// Frames begun.
    pub frames: u64,
    /// Passes begun.
    pub passes: u64,
    /// State setters called.
    pub state_requests: u64,
    /// State setters that reached the command buffer.
    pub state_changes: u64,
    /// Draw calls recorded.
    pub draw_calls: u64,
    /// Compute dispatches recorded.
    pub dispatches: u64,
}

impl RenderCounters {
    /// State setters dropped because the value was already applied.
    pub fn suppressed(&self) -> u64 {
        self.state_requests - self.state_changes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Recording,
    Pass(PassKind),
}

/// Records the GPU work of one frame at a time.
///
/// A frame moves from idle to recording on [`RenderContext::begin_frame`], then
/// through any number of passes, and back to idle when it is ended or aborted.
/// Only one pass is open at a time: beginning a pass closes the current one.
///
/// Every state setter compares against the cached [`RenderState`] and only
/// reaches the command buffer when the value changed. The cache is cleared at
/// every pass boundary.
pub struct RenderContext {
    context: Arc<DeviceContext>,
    command_buffer: Option<Box<dyn CommandBuffer>>,
    phase: Phase,
    managed: bool,
    frame_label: String,
    state: RenderState,
    counters: RenderCounters,
    error_hook: Option<ErrorHook>,
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("phase", &self.phase)
            .field("frame", &self.frame_label)
            .field("counters", &self.counters)
            .finish()
    }
}

impl RenderContext {
    /// Creates an idle context recording on `context`'s queue.
    pub fn new(context: Arc<DeviceContext>) -> Self {
        Self {
            context,
            command_buffer: None,
            phase: Phase::Idle,
            managed: false,
            frame_label: String::new(),
            state: RenderState::default(),
            counters: RenderCounters::default(),
            error_hook: None,
        }
    }

    /// Routes asynchronous submission failures to `hook`.
    pub fn with_error_hook(mut self, hook: ErrorHook) -> Self {
        self.error_hook = Some(hook);
        self
    }

    /// The device context.
    pub fn device_context(&self) -> &Arc<DeviceContext> {
        &self.context
    }

    /// The cached state of the open pass.
    pub fn state(&self) -> &RenderState {
        &self.state
    }

    /// Counters since construction.
    pub fn counters(&self) -> RenderCounters {
        self.counters
    }

    /// Whether a frame is being recorded.
    pub fn is_recording(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// The kind of the open pass, if any.
    pub fn current_pass(&self) -> Option<PassKind> {
        match self.phase {
            Phase::Pass(kind) => Some(kind),
            _ => None,
        }
    }

    /// Starts recording a frame into a fresh command buffer.
    ///
    /// ## Errors
    /// [`RenderContextError::InvalidRenderState`] if a frame is already being
    /// recorded, [`RenderContextError::Device`] if no command buffer could be made.
    pub fn begin_frame(&mut self, label: &str) -> Result<(), RenderContextError> {
        if self.phase != Phase::Idle {
            return Err(RenderContextError::InvalidRenderState(format!(
                "begin_frame('{label}') while frame '{}' is being recorded",
                self.frame_label
            )));
        }
        self.command_buffer = Some(self.context.make_command_buffer()?);
        self.phase = Phase::Recording;
        self.frame_label = label.to_owned();
        self.counters.frames += 1;
        log::trace!("Frame '{label}' begun");
        Ok(())
    }

    /// Starts a frame whose lifetime belongs to the caller of this method.
    ///
    /// Until it is closed with [`RenderContext::end_managed_frame`] or
    /// [`RenderContext::abort_frame`], `begin_frame` and `end_frame` fail, so code
    /// recording into it cannot end it early.
    pub fn begin_managed_frame(&mut self, label: &str) -> Result<(), RenderContextError> {
        self.begin_frame(label)?;
        self.managed = true;
        Ok(())
    }

    /// Closes the open pass, commits the frame and returns immediately.
    ///
    /// Execution failures are reported later through the error hook as
    /// [`RenderContextError::CommandBufferFailed`].
    pub fn end_frame(&mut self) -> Result<(), RenderContextError> {
        self.check_unmanaged("end_frame")?;
        self.commit_frame()
    }

    /// Commits a frame started with [`RenderContext::begin_managed_frame`].
    pub fn end_managed_frame(&mut self) -> Result<(), RenderContextError> {
        self.managed = false;
        self.commit_frame()
    }

    /// Closes the open pass, commits the frame and blocks until the GPU is done.
    ///
    /// ## Errors
    /// [`RenderContextError::CommandBufferFailed`] when execution failed.
    pub fn end_frame_and_wait(&mut self) -> Result<(), RenderContextError> {
        self.check_unmanaged("end_frame_and_wait")?;
        let command_buffer = self.close_frame("end_frame_and_wait")?;
        match command_buffer.commit_and_wait() {
            CommandBufferStatus::Completed => Ok(()),
            CommandBufferStatus::Error(reason) => {
                log::error!("Command buffer '{}' failed: {reason}", self.frame_label);
                Err(RenderContextError::CommandBufferFailed(reason))
            }
        }
    }

    /// Throws the recorded frame away without submitting it. Does nothing when idle.
    pub fn abort_frame(&mut self) {
        if self.phase == Phase::Idle {
            return;
        }
        log::debug!("Frame '{}' aborted", self.frame_label);
        self.command_buffer = None;
        self.phase = Phase::Idle;
        self.managed = false;
        self.state.reset();
    }

    /// Opens a graphics pass, closing any open pass first.
    ///
    /// The viewport defaults to cover the first bound attachment.
    pub fn begin_render_pass(
        &mut self,
        target: &RenderTargetDescriptor,
    ) -> Result<(), RenderContextError> {
        self.check_frame("begin_render_pass")?;
        let colors = target.color_attachments.len();
        if colors > MAX_COLOR_ATTACHMENTS {
            return Err(RenderContextError::InvalidRenderState(format!(
                "{colors} color attachments, at most {MAX_COLOR_ATTACHMENTS} are supported"
            )));
        }
        let Some((width, height)) = target.first_attachment_size() else {
            return Err(RenderContextError::InvalidRenderState(
                "a render pass needs at least one attachment".into(),
            ));
        };

        self.open_pass(PassKind::Graphics, |cb| cb.begin_render_pass(target));
        self.set_viewport(Viewport::covering(width, height))
    }

    /// Opens a compute pass, closing any open pass first.
    pub fn begin_compute_pass(&mut self, label: Option<&str>) -> Result<(), RenderContextError> {
        self.check_frame("begin_compute_pass")?;
        self.open_pass(PassKind::Compute, |cb| cb.begin_compute_pass(label));
        Ok(())
    }

    /// Opens a copy pass, closing any open pass first.
    pub fn begin_copy_pass(&mut self, label: Option<&str>) -> Result<(), RenderContextError> {
        self.check_frame("begin_copy_pass")?;
        self.open_pass(PassKind::Copy, |cb| cb.begin_copy_pass(label));
        Ok(())
    }

    /// Closes the open pass, if any.
    pub fn end_current_encoder(&mut self) {
        if let Phase::Pass(_) = self.phase {
            if let Some(cb) = self.command_buffer.as_mut() {
                cb.end_pass();
            }
            self.phase = Phase::Recording;
            self.state.reset();
        }
    }

    /// Binds a render pipeline.
    pub fn set_render_pipeline(
        &mut self,
        pipeline: RenderPipelineId,
    ) -> Result<(), RenderContextError> {
        self.check_pass(PassKind::Graphics, "set_render_pipeline")?;
        let changed = RenderState::update(&mut self.state.render_pipeline, pipeline);
        self.apply(changed, |cb| cb.set_render_pipeline(pipeline));
        Ok(())
    }

    /// Binds a compute pipeline.
    pub fn set_compute_pipeline(
        &mut self,
        pipeline: ComputePipelineId,
    ) -> Result<(), RenderContextError> {
        self.check_pass(PassKind::Compute, "set_compute_pipeline")?;
        let changed = RenderState::update(&mut self.state.compute_pipeline, pipeline);
        self.apply(changed, |cb| cb.set_compute_pipeline(pipeline));
        Ok(())
    }

    /// Binds a depth/stencil state.
    pub fn set_depth_stencil_state(
        &mut self,
        depth_stencil: DepthStencilStateId,
    ) -> Result<(), RenderContextError> {
        self.check_pass(PassKind::Graphics, "set_depth_stencil_state")?;
        let changed = RenderState::update(&mut self.state.depth_stencil, depth_stencil);
        self.apply(changed, |cb| cb.set_depth_stencil_state(depth_stencil));
        Ok(())
    }

    /// Sets the cull mode.
    pub fn set_cull_mode(&mut self, mode: CullMode) -> Result<(), RenderContextError> {
        self.check_pass(PassKind::Graphics, "set_cull_mode")?;
        let changed = RenderState::update(&mut self.state.cull_mode, mode);
        self.apply(changed, |cb| cb.set_cull_mode(mode));
        Ok(())
    }

    /// Sets the front-facing winding.
    pub fn set_front_facing_winding(&mut self, winding: Winding) -> Result<(), RenderContextError> {
        self.check_pass(PassKind::Graphics, "set_front_facing_winding")?;
        let changed = RenderState::update(&mut self.state.front_facing, winding);
        self.apply(changed, |cb| cb.set_front_facing_winding(winding));
        Ok(())
    }

    /// Sets the triangle fill mode.
    pub fn set_triangle_fill_mode(&mut self, mode: FillMode) -> Result<(), RenderContextError> {
        self.check_pass(PassKind::Graphics, "set_triangle_fill_mode")?;
        let changed = RenderState::update(&mut self.state.fill_mode, mode);
        self.apply(changed, |cb| cb.set_triangle_fill_mode(mode));
        Ok(())
    }

    /// Sets the viewport.
    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<(), RenderContextError> {
        self.check_pass(PassKind::Graphics, "set_viewport")?;
        let changed = RenderState::update(&mut self.state.viewport, viewport);
        self.apply(changed, |cb| cb.set_viewport(viewport));
        Ok(())
    }

    /// Sets the scissor rectangle.
    pub fn set_scissor_rect(&mut self, rect: ScissorRect) -> Result<(), RenderContextError> {
        self.check_pass(PassKind::Graphics, "set_scissor_rect")?;
        let changed = RenderState::update(&mut self.state.scissor, rect);
        self.apply(changed, |cb| cb.set_scissor_rect(rect));
        Ok(())
    }

    /// Binds `buffer` at `offset` to `slot` of `stage`.
    pub fn set_buffer(
        &mut self,
        stage: ShaderStage,
        slot: usize,
        buffer: BufferId,
        offset: u64,
    ) -> Result<(), RenderContextError> {
        self.check_pass(stage.pass_kind(), "set_buffer")?;
        check_slot("buffer", slot, MAX_BUFFER_SLOTS)?;
        let changed =
            RenderState::update(&mut self.state.stage_mut(stage).buffers[slot], (buffer, offset));
        self.apply(changed, |cb| cb.set_buffer(stage, slot, buffer, offset));
        Ok(())
    }

    /// Copies `bytes` inline into `slot` of `stage`.
    ///
    /// Inline data is always recorded and replaces whatever buffer the slot held.
    pub fn set_bytes(
        &mut self,
        stage: ShaderStage,
        slot: usize,
        bytes: &[u8],
    ) -> Result<(), RenderContextError> {
        self.check_pass(stage.pass_kind(), "set_bytes")?;
        check_slot("buffer", slot, MAX_BUFFER_SLOTS)?;
        if bytes.len() > MAX_INLINE_BYTES {
            return Err(RenderContextError::InvalidRenderState(format!(
                "{} inline bytes, at most {MAX_INLINE_BYTES} are supported",
                bytes.len()
            )));
        }
        self.state.stage_mut(stage).buffers[slot] = None;
        if let Some(cb) = self.command_buffer.as_mut() {
            cb.set_bytes(stage, slot, bytes);
        }
        Ok(())
    }

    /// Copies a plain-data uniform block inline into `slot` of `stage`.
    pub fn set_uniforms<T: bytemuck::Pod>(
        &mut self,
        stage: ShaderStage,
        slot: usize,
        uniforms: &T,
    ) -> Result<(), RenderContextError> {
        self.set_bytes(stage, slot, bytemuck::bytes_of(uniforms))
    }

    /// Binds `texture` to `slot` of `stage`.
    pub fn set_texture(
        &mut self,
        stage: ShaderStage,
        slot: usize,
        texture: TextureId,
    ) -> Result<(), RenderContextError> {
        self.check_pass(stage.pass_kind(), "set_texture")?;
        check_slot("texture", slot, MAX_TEXTURE_SLOTS)?;
        let changed = RenderState::update(&mut self.state.stage_mut(stage).textures[slot], texture);
        self.apply(changed, |cb| cb.set_texture(stage, slot, texture));
        Ok(())
    }

    /// Binds `sampler` to `slot` of `stage`.
    pub fn set_sampler(
        &mut self,
        stage: ShaderStage,
        slot: usize,
        sampler: SamplerId,
    ) -> Result<(), RenderContextError> {
        self.check_pass(stage.pass_kind(), "set_sampler")?;
        check_slot("sampler", slot, MAX_SAMPLER_SLOTS)?;
        let changed = RenderState::update(&mut self.state.stage_mut(stage).samplers[slot], sampler);
        self.apply(changed, |cb| cb.set_sampler(stage, slot, sampler));
        Ok(())
    }

    /// Binds the device's standard samplers to their conventional slots.
    pub fn bind_standard_samplers(&mut self, stage: ShaderStage) -> Result<(), RenderContextError> {
        let samplers = self.context.samplers();
        self.set_sampler(stage, bindings::SAMPLER_LINEAR, samplers.linear)?;
        self.set_sampler(stage, bindings::SAMPLER_NEAREST, samplers.nearest)?;
        self.set_sampler(stage, bindings::SAMPLER_MIPMAPPED, samplers.mipmapped)
    }

    /// Draws non-indexed primitives with the bound render pipeline.
    ///
    /// ## Errors
    /// [`RenderContextError::ResourceNotBound`] without a render pipeline.
    pub fn draw(
        &mut self,
        primitive: PrimitiveType,
        vertex_start: u32,
        vertex_count: u32,
        instance_count: u32,
    ) -> Result<(), RenderContextError> {
        self.check_pass(PassKind::Graphics, "draw")?;
        if self.state.render_pipeline.is_none() {
            return Err(RenderContextError::ResourceNotBound(
                "draw without a render pipeline".into(),
            ));
        }
        if let Some(cb) = self.command_buffer.as_mut() {
            cb.draw_primitives(primitive, vertex_start, vertex_count, instance_count);
        }
        self.counters.draw_calls += 1;
        Ok(())
    }

    /// Runs the bound compute pipeline over a `grid` of threads.
    ///
    /// Devices with non-uniform threadgroup support get the exact grid; others
    /// get enough whole threadgroups to cover it.
    ///
    /// ## Errors
    /// [`RenderContextError::ResourceNotBound`] without a compute pipeline.
    pub fn dispatch(
        &mut self,
        grid: [u32; 3],
        threads_per_group: [u32; 3],
    ) -> Result<(), RenderContextError> {
        self.check_pass(PassKind::Compute, "dispatch")?;
        if self.state.compute_pipeline.is_none() {
            return Err(RenderContextError::ResourceNotBound(
                "dispatch without a compute pipeline".into(),
            ));
        }
        let exact = self.context.capabilities().flags.non_uniform_threadgroups;
        if let Some(cb) = self.command_buffer.as_mut() {
            if exact {
                cb.dispatch_threads(grid, threads_per_group);
            } else {
                let groups =
                    std::array::from_fn(|i| grid[i].div_ceil(threads_per_group[i].max(1)));
                cb.dispatch_threadgroups(groups, threads_per_group);
            }
        }
        self.counters.dispatches += 1;
        Ok(())
    }

    /// Copies `source` into `destination` in the open copy pass.
    pub fn copy_texture(
        &mut self,
        source: TextureId,
        destination: TextureId,
    ) -> Result<(), RenderContextError> {
        self.check_pass(PassKind::Copy, "copy_texture")?;
        if let Some(cb) = self.command_buffer.as_mut() {
            cb.copy_texture(source, destination);
        }
        Ok(())
    }

    /// Fills the mip chain of `texture` in the open copy pass.
    pub fn generate_mipmaps(&mut self, texture: TextureId) -> Result<(), RenderContextError> {
        self.check_pass(PassKind::Copy, "generate_mipmaps")?;
        if let Some(cb) = self.command_buffer.as_mut() {
            cb.generate_mipmaps(texture);
        }
        Ok(())
    }

    fn check_frame(&self, operation: &str) -> Result<(), RenderContextError> {
        if self.phase == Phase::Idle {
            Err(RenderContextError::InvalidRenderState(format!(
                "{operation} outside a frame"
            )))
        } else {
            Ok(())
        }
    }

    fn check_unmanaged(&self, operation: &str) -> Result<(), RenderContextError> {
        if self.managed {
            Err(RenderContextError::InvalidRenderState(format!(
                "{operation} on frame '{}', which is ended by its owner",
                self.frame_label
            )))
        } else {
            Ok(())
        }
    }

    fn check_pass(&self, kind: PassKind, operation: &str) -> Result<(), RenderContextError> {
        match self.phase {
            Phase::Pass(open) if open == kind => Ok(()),
            Phase::Pass(open) => Err(RenderContextError::InvalidEncoder(format!(
                "{operation} needs a {kind:?} pass, a {open:?} pass is open"
            ))),
            _ => Err(RenderContextError::InvalidEncoder(format!(
                "{operation} needs an open {kind:?} pass"
            ))),
        }
    }

    fn open_pass(&mut self, kind: PassKind, begin: impl FnOnce(&mut dyn CommandBuffer)) {
        self.end_current_encoder();
        if let Some(cb) = self.command_buffer.as_mut() {
            begin(cb.as_mut());
        }
        self.phase = Phase::Pass(kind);
        self.counters.passes += 1;
    }

    fn apply(&mut self, changed: bool, record: impl FnOnce(&mut dyn CommandBuffer)) {
        self.counters.state_requests += 1;
        if !changed {
            log::trace!("Redundant state change suppressed");
            return;
        }
        self.counters.state_changes += 1;
        if let Some(cb) = self.command_buffer.as_mut() {
            record(cb.as_mut());
        }
    }

    fn close_frame(
        &mut self,
        operation: &str,
    ) -> Result<Box<dyn CommandBuffer>, RenderContextError> {
        self.check_frame(operation)?;
        self.end_current_encoder();
        self.state.reset();
        self.phase = Phase::Idle;
        self.command_buffer.take().ok_or_else(|| {
            RenderContextError::InvalidRenderState(format!("{operation} without a command buffer"))
        })
    }

    fn commit_frame(&mut self) -> Result<(), RenderContextError> {
        let command_buffer = self.close_frame("end_frame")?;
        let label = self.frame_label.clone();
        let hook = self.error_hook.clone();
        command_buffer.commit(Box::new(move |status| {
            if let CommandBufferStatus::Error(reason) = status {
                log::error!("Command buffer '{label}' failed: {reason}");
                if let Some(hook) = hook {
                    hook(RenderContextError::CommandBufferFailed(reason));
                }
            }
        }));
        Ok(())
    }
}

fn check_slot(kind: &str, slot: usize, capacity: usize) -> Result<(), RenderContextError> {
    if slot < capacity {
        Ok(())
    } else {
        Err(RenderContextError::InvalidRenderState(format!(
            "{kind} slot {slot} is out of range (0..{capacity})"
        )))
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        if self.is_recording() {
            log::warn!("Render context dropped while recording '{}'", self.frame_label);
            self.abort_frame();
        }
    }
}
