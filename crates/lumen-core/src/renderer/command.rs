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

//! Command recording types and the [`CommandBuffer`] contract.
//!
//! A command buffer is a dumb recorder: it applies every call it receives. State
//! deduplication and pass bookkeeping live one level up, in the render context.

use crate::renderer::texture::{GpuTexture, SamplerId, TextureId};

/// The maximum number of color attachments in one graphics pass.
pub const MAX_COLOR_ATTACHMENTS: usize = 8;

/// An opaque handle to a compiled render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderPipelineId(pub u64);

/// An opaque handle to a compiled compute pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComputePipelineId(pub u64);

/// An opaque handle to a depth/stencil state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepthStencilStateId(pub u64);

/// An opaque handle to a GPU buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

/// The kind of pass an encoder records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Rasterization into attachments.
    Graphics,
    /// Compute dispatches.
    Compute,
    /// Copies and mipmap generation.
    Copy,
}

/// The shader stage a binding applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex stage of a graphics pass.
    Vertex,
    /// Fragment stage of a graphics pass.
    Fragment,
    /// Kernel stage of a compute pass.
    Compute,
}

impl ShaderStage {
    /// The pass kind this stage can be bound in.
    pub fn pass_kind(self) -> PassKind {
        match self {
            ShaderStage::Vertex | ShaderStage::Fragment => PassKind::Graphics,
            ShaderStage::Compute => PassKind::Compute,
        }
    }
}

/// What happens to an attachment's contents at the start of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadAction {
    /// Contents are undefined.
    DontCare,
    /// Previous contents are preserved.
    #[default]
    Load,
    /// Contents are cleared to the attachment's clear value.
    Clear,
}

/// What happens to an attachment's contents at the end of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreAction {
    /// Contents may be discarded.
    DontCare,
    /// Contents are written back.
    #[default]
    Store,
    /// Multisampled contents are resolved into the resolve texture.
    MultisampleResolve,
}

/// An RGBA clear value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClearColor {
    /// Red.
    pub r: f64,
    /// Green.
    pub g: f64,
    /// Blue.
    pub b: f64,
    /// Alpha.
    pub a: f64,
}

impl ClearColor {
    /// Opaque black.
    pub const BLACK: ClearColor = ClearColor {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
    /// Fully transparent.
    pub const TRANSPARENT: ClearColor = ClearColor {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };
}

/// A color attachment of a graphics pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorAttachment {
    /// The texture rendered into.
    pub texture: GpuTexture,
    /// Action at pass start.
    pub load_action: LoadAction,
    /// Action at pass end.
    pub store_action: StoreAction,
    /// Value used by [`LoadAction::Clear`].
    pub clear_color: ClearColor,
    /// Resolve target for [`StoreAction::MultisampleResolve`].
    pub resolve_texture: Option<GpuTexture>,
}

impl ColorAttachment {
    /// An attachment that clears to `clear_color` and stores the result.
    pub fn clear(texture: GpuTexture, clear_color: ClearColor) -> Self {
        Self {
            texture,
            load_action: LoadAction::Clear,
            store_action: StoreAction::Store,
            clear_color,
            resolve_texture: None,
        }
    }

    /// An attachment that preserves and stores its contents.
    pub fn load(texture: GpuTexture) -> Self {
        Self {
            texture,
            load_action: LoadAction::Load,
            store_action: StoreAction::Store,
            clear_color: ClearColor::TRANSPARENT,
            resolve_texture: None,
        }
    }
}

/// The depth/stencil attachment of a graphics pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthStencilAttachment {
    /// The depth (and optional stencil) texture.
    pub texture: GpuTexture,
    /// Depth action at pass start.
    pub depth_load_action: LoadAction,
    /// Depth action at pass end.
    pub depth_store_action: StoreAction,
    /// Depth clear value.
    pub clear_depth: f64,
    /// Stencil action at pass start.
    pub stencil_load_action: LoadAction,
    /// Stencil action at pass end.
    pub stencil_store_action: StoreAction,
    /// Stencil clear value.
    pub clear_stencil: u32,
}

/// The attachments of a graphics pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderTargetDescriptor {
    /// A debug label for the pass.
    pub label: Option<String>,
    /// Up to [`MAX_COLOR_ATTACHMENTS`] color attachments.
    pub color_attachments: Vec<ColorAttachment>,
    /// Optional depth/stencil attachment.
    pub depth_stencil: Option<DepthStencilAttachment>,
}

impl RenderTargetDescriptor {
    /// A pass with a single color attachment.
    pub fn single(attachment: ColorAttachment) -> Self {
        Self {
            label: None,
            color_attachments: vec![attachment],
            depth_stencil: None,
        }
    }

    /// The size of the first bound attachment, color before depth.
    pub fn first_attachment_size(&self) -> Option<(u32, u32)> {
        self.color_attachments
            .first()
            .map(|a| &a.texture)
            .or(self.depth_stencil.as_ref().map(|d| &d.texture))
            .map(|t| (t.width(), t.height()))
    }
}

/// Which faces are culled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    /// No culling.
    None,
    /// Cull front faces.
    Front,
    /// Cull back faces.
    Back,
}

/// The vertex winding that counts as front-facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Winding {
    /// Clockwise.
    Clockwise,
    /// Counter-clockwise.
    CounterClockwise,
}

/// How triangles are rasterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillMode {
    /// Filled.
    Fill,
    /// Wireframe.
    Lines,
}

/// How vertices are assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// Points.
    Point,
    /// Independent lines.
    Line,
    /// Connected lines.
    LineStrip,
    /// Independent triangles.
    Triangle,
    /// Connected triangles.
    TriangleStrip,
}

/// The rasterization viewport.
///
/// Equality is bitwise, so two viewports are equal exactly when every field has
/// the same bit pattern.
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
    /// Near depth.
    pub znear: f64,
    /// Far depth.
    pub zfar: f64,
}

impl Viewport {
    /// A viewport covering a `width` x `height` target with depth `[0, 1]`.
    pub fn covering(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f64,
            height: height as f64,
            znear: 0.0,
            zfar: 1.0,
        }
    }

    fn bits(&self) -> [u64; 6] {
        [
            self.x.to_bits(),
            self.y.to_bits(),
            self.width.to_bits(),
            self.height.to_bits(),
            self.znear.to_bits(),
            self.zfar.to_bits(),
        ]
    }
}

impl PartialEq for Viewport {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Viewport {}

/// A scissor rectangle, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScissorRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

/// The outcome of a submitted command buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandBufferStatus {
    /// All recorded work finished.
    Completed,
    /// Execution failed.
    Error(String),
}

/// Called once a committed command buffer finishes.
pub type CompletionHandler = Box<dyn FnOnce(CommandBufferStatus) + Send + 'static>;

/// Records GPU work for one frame.
///
/// Every call is applied as given. Calls outside an open pass of the right kind
/// are a caller bug; implementations may ignore or record them.
pub trait CommandBuffer: Send {
    /// Opens a graphics pass.
    fn begin_render_pass(&mut self, target: &RenderTargetDescriptor);
    /// Opens a compute pass.
    fn begin_compute_pass(&mut self, label: Option<&str>);
    /// Opens a copy pass.
    fn begin_copy_pass(&mut self, label: Option<&str>);
    /// Closes the open pass.
    fn end_pass(&mut self);

    /// Binds a render pipeline.
    fn set_render_pipeline(&mut self, pipeline: RenderPipelineId);
    /// Binds a compute pipeline.
    fn set_compute_pipeline(&mut self, pipeline: ComputePipelineId);
    /// Binds a depth/stencil state.
    fn set_depth_stencil_state(&mut self, state: DepthStencilStateId);
    /// Sets the cull mode.
    fn set_cull_mode(&mut self, mode: CullMode);
    /// Sets the front-facing winding.
    fn set_front_facing_winding(&mut self, winding: Winding);
    /// Sets the triangle fill mode.
    fn set_triangle_fill_mode(&mut self, mode: FillMode);
    /// Sets the viewport.
    fn set_viewport(&mut self, viewport: Viewport);
    /// Sets the scissor rectangle.
    fn set_scissor_rect(&mut self, rect: ScissorRect);

    /// Binds a buffer to `slot` of `stage`.
    fn set_buffer(&mut self, stage: ShaderStage, slot: usize, buffer: BufferId, offset: u64);
    /// Copies `bytes` inline into `slot` of `stage`.
    fn set_bytes(&mut self, stage: ShaderStage, slot: usize, bytes: &[u8]);
    /// Binds a texture to `slot` of `stage`.
    fn set_texture(&mut self, stage: ShaderStage, slot: usize, texture: TextureId);
    /// Binds a sampler to `slot` of `stage`.
    fn set_sampler(&mut self, stage: ShaderStage, slot: usize, sampler: SamplerId);

    /// Draws non-indexed primitives.
    fn draw_primitives(
        &mut self,
        primitive: PrimitiveType,
        vertex_start: u32,
        vertex_count: u32,
        instance_count: u32,
    );
    /// Dispatches whole threadgroups.
    fn dispatch_threadgroups(&mut self, groups: [u32; 3], threads_per_group: [u32; 3]);
    /// Dispatches an exact thread grid. Requires non-uniform threadgroup support.
    fn dispatch_threads(&mut self, threads: [u32; 3], threads_per_group: [u32; 3]);

    /// Copies the contents of `source` into `destination`.
    fn copy_texture(&mut self, source: TextureId, destination: TextureId);
    /// Fills every mip level below the base from the base level.
    fn generate_mipmaps(&mut self, texture: TextureId);

    /// Submits the recorded work. `on_complete` runs when the GPU finishes.
    fn commit(self: Box<Self>, on_complete: CompletionHandler);
    /// Submits the recorded work and blocks until it finishes.
    fn commit_and_wait(self: Box<Self>) -> CommandBufferStatus;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_equality_is_bitwise() {
        let a = Viewport::covering(10, 10);
        assert_eq!(a, Viewport::covering(10, 10));

        let nan = Viewport {
            x: f64::NAN,
            ..a
        };
        assert_eq!(nan, nan);

        let negative_zero = Viewport { x: -0.0, ..a };
        assert_ne!(negative_zero, a);
    }
}
