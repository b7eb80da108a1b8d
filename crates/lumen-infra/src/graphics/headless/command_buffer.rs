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

use lumen_core::renderer::{
    BufferId, CommandBuffer, CommandBufferStatus, CompletionHandler, ComputePipelineId, CullMode,
    DepthStencilStateId, FillMode, PrimitiveType, RenderPipelineId, RenderTargetDescriptor,
    SamplerId, ScissorRect, ShaderStage, TextureId, Viewport, Winding,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// One command as the backend received it.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// A graphics pass was opened.
    BeginRenderPass {
        /// Pass label.
        label: Option<String>,
        /// Number of color attachments.
        color_attachments: usize,
        /// Whether a depth/stencil attachment was bound.
        has_depth_stencil: bool,
    },
    /// A compute pass was opened.
    BeginComputePass,
    /// A copy pass was opened.
    BeginCopyPass,
    /// The open pass was closed.
    EndPass,
    /// Render pipeline bound.
    SetRenderPipeline(RenderPipelineId),
    /// Compute pipeline bound.
    SetComputePipeline(ComputePipelineId),
    /// Depth/stencil state bound.
    SetDepthStencilState(DepthStencilStateId),
    /// Cull mode set.
    SetCullMode(CullMode),
    /// Front-facing winding set.
    SetFrontFacingWinding(Winding),
    /// Fill mode set.
    SetTriangleFillMode(FillMode),
    /// Viewport set.
    SetViewport(Viewport),
    /// Scissor set.
    SetScissorRect(ScissorRect),
    /// Buffer bound.
    SetBuffer {
        /// Stage.
        stage: ShaderStage,
        /// Slot.
        slot: usize,
        /// Buffer.
        buffer: BufferId,
        /// Byte offset.
        offset: u64,
    },
    /// Inline bytes bound.
    SetBytes {
        /// Stage.
        stage: ShaderStage,
        /// Slot.
        slot: usize,
        /// The bytes.
        bytes: Vec<u8>,
    },
    /// Texture bound.
    SetTexture {
        /// Stage.
        stage: ShaderStage,
        /// Slot.
        slot: usize,
        /// Texture.
        texture: TextureId,
    },
    /// Sampler bound.
    SetSampler {
        /// Stage.
        stage: ShaderStage,
        /// Slot.
        slot: usize,
        /// Sampler.
        sampler: SamplerId,
    },
    /// Non-indexed draw.
    Draw {
        /// Primitive topology.
        primitive: PrimitiveType,
        /// First vertex.
        vertex_start: u32,
        /// Vertex count.
        vertex_count: u32,
        /// Instance count.
        instance_count: u32,
    },
    /// Whole-threadgroup dispatch.
    DispatchThreadgroups {
        /// Threadgroup grid.
        groups: [u32; 3],
        /// Threadgroup size.
        threads_per_group: [u32; 3],
    },
    /// Exact-grid dispatch.
    DispatchThreads {
        /// Thread grid.
        threads: [u32; 3],
        /// Threadgroup size.
        threads_per_group: [u32; 3],
    },
    /// Texture copy.
    CopyTexture {
        /// Source.
        source: TextureId,
        /// Destination.
        destination: TextureId,
    },
    /// Mipmap generation.
    GenerateMipmaps(TextureId),
}

impl RecordedCommand {
    /// Returns `true` for commands that change cached pipeline or binding state.
    ///
    /// Inline bytes are not cached upstream and do not count.
    pub fn is_state_change(&self) -> bool {
        matches!(
            self,
            RecordedCommand::SetRenderPipeline(_)
                | RecordedCommand::SetComputePipeline(_)
                | RecordedCommand::SetDepthStencilState(_)
                | RecordedCommand::SetCullMode(_)
                | RecordedCommand::SetFrontFacingWinding(_)
                | RecordedCommand::SetTriangleFillMode(_)
                | RecordedCommand::SetViewport(_)
                | RecordedCommand::SetScissorRect(_)
                | RecordedCommand::SetBuffer { .. }
                | RecordedCommand::SetTexture { .. }
                | RecordedCommand::SetSampler { .. }
        )
    }
}

/// A command buffer as it was submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedBuffer {
    /// Every command, in recording order.
    pub commands: Vec<RecordedCommand>,
    /// The status reported to the submitter.
    pub status: CommandBufferStatus,
}

/// Shared log of every command buffer a headless device has executed.
#[derive(Debug, Default)]
pub struct CommandLog {
    submitted: Mutex<Vec<SubmittedBuffer>>,
}

impl CommandLog {
    fn push(&self, buffer: SubmittedBuffer) {
        self.submitted.lock().unwrap().push(buffer);
    }

    /// A copy of every submission so far.
    pub fn submissions(&self) -> Vec<SubmittedBuffer> {
        self.submitted.lock().unwrap().clone()
    }

    /// The number of submitted command buffers.
    pub fn submission_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    /// Every submitted command, flattened in submission order.
    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .flat_map(|b| b.commands.iter().cloned())
            .collect()
    }

    /// Counts submitted commands matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&RecordedCommand) -> bool) -> usize {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .flat_map(|b| b.commands.iter())
            .filter(|&c| predicate(c))
            .count()
    }

    /// Counts submitted state-changing commands.
    pub fn state_changes(&self) -> usize {
        self.count(RecordedCommand::is_state_change)
    }

    /// Forgets every submission.
    pub fn clear(&self) {
        self.submitted.lock().unwrap().clear();
    }
}

/// Records commands in memory and appends them to the device log on commit.
pub struct HeadlessCommandBuffer {
    commands: Vec<RecordedCommand>,
    log: Arc<CommandLog>,
    fail_commits: Arc<AtomicBool>,
}

impl HeadlessCommandBuffer {
    pub(crate) fn new(log: Arc<CommandLog>, fail_commits: Arc<AtomicBool>) -> Self {
        Self {
            commands: Vec::new(),
            log,
            fail_commits,
        }
    }

    fn submit(self) -> CommandBufferStatus {
        let status = if self.fail_commits.load(Ordering::Acquire) {
            CommandBufferStatus::Error("injected command buffer failure".to_string())
        } else {
            CommandBufferStatus::Completed
        };
        log::trace!(
            "Headless command buffer executed {} command(s).",
            self.commands.len()
        );
        self.log.push(SubmittedBuffer {
            commands: self.commands,
            status: status.clone(),
        });
        status
    }
}

impl CommandBuffer for HeadlessCommandBuffer {
    fn begin_render_pass(&mut self, target: &RenderTargetDescriptor) {
        self.commands.push(RecordedCommand::BeginRenderPass {
            label: target.label.clone(),
            color_attachments: target.color_attachments.len(),
            has_depth_stencil: target.depth_stencil.is_some(),
        });
    }

    fn begin_compute_pass(&mut self, _label: Option<&str>) {
        self.commands.push(RecordedCommand::BeginComputePass);
    }

    fn begin_copy_pass(&mut self, _label: Option<&str>) {
        self.commands.push(RecordedCommand::BeginCopyPass);
    }

    fn end_pass(&mut self) {
        self.commands.push(RecordedCommand::EndPass);
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineId) {
        self.commands.push(RecordedCommand::SetRenderPipeline(pipeline));
    }

    fn set_compute_pipeline(&mut self, pipeline: ComputePipelineId) {
        self.commands
            .push(RecordedCommand::SetComputePipeline(pipeline));
    }

    fn set_depth_stencil_state(&mut self, state: DepthStencilStateId) {
        self.commands
            .push(RecordedCommand::SetDepthStencilState(state));
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        self.commands.push(RecordedCommand::SetCullMode(mode));
    }

    fn set_front_facing_winding(&mut self, winding: Winding) {
        self.commands
            .push(RecordedCommand::SetFrontFacingWinding(winding));
    }

    fn set_triangle_fill_mode(&mut self, mode: FillMode) {
        self.commands.push(RecordedCommand::SetTriangleFillMode(mode));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.commands.push(RecordedCommand::SetViewport(viewport));
    }

    fn set_scissor_rect(&mut self, rect: ScissorRect) {
        self.commands.push(RecordedCommand::SetScissorRect(rect));
    }

    fn set_buffer(&mut self, stage: ShaderStage, slot: usize, buffer: BufferId, offset: u64) {
        self.commands.push(RecordedCommand::SetBuffer {
            stage,
            slot,
            buffer,
            offset,
        });
    }

    fn set_bytes(&mut self, stage: ShaderStage, slot: usize, bytes: &[u8]) {
        self.commands.push(RecordedCommand::SetBytes {
            stage,
            slot,
            bytes: bytes.to_vec(),
        });
    }

    fn set_texture(&mut self, stage: ShaderStage, slot: usize, texture: TextureId) {
        self.commands.push(RecordedCommand::SetTexture {
            stage,
            slot,
            texture,
        });
    }

    fn set_sampler(&mut self, stage: ShaderStage, slot: usize, sampler: SamplerId) {
        self.commands.push(RecordedCommand::SetSampler {
            stage,
            slot,
            sampler,
        });
    }

    fn draw_primitives(
        &mut self,
        primitive: PrimitiveType,
        vertex_start: u32,
        vertex_count: u32,
        instance_count: u32,
    ) {
        self.commands.push(RecordedCommand::Draw {
            primitive,
            vertex_start,
            vertex_count,
            instance_count,
        });
    }

    fn dispatch_threadgroups(&mut self, groups: [u32; 3], threads_per_group: [u32; 3]) {
        self.commands.push(RecordedCommand::DispatchThreadgroups {
            groups,
            threads_per_group,
        });
    }

    fn dispatch_threads(&mut self, threads: [u32; 3], threads_per_group: [u32; 3]) {
        self.commands.push(RecordedCommand::DispatchThreads {
            threads,
            threads_per_group,
        });
    }

    fn copy_texture(&mut self, source: TextureId, destination: TextureId) {
        self.commands.push(RecordedCommand::CopyTexture {
            source,
            destination,
        });
    }

    fn generate_mipmaps(&mut self, texture: TextureId) {
        self.commands.push(RecordedCommand::GenerateMipmaps(texture));
    }

    fn commit(self: Box<Self>, on_complete: CompletionHandler) {
        let status = self.submit();
        on_complete(status);
    }

    fn commit_and_wait(self: Box<Self>) -> CommandBufferStatus {
        self.submit()
    }
}
