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

//! The effect-renderer collaborator and a pipeline-driven implementation of it.

use crate::error::EffectError;
use lumen_core::effect::{bindings, ColorAdjustmentUniforms, EffectOperation, THREADGROUP_SIZE};
use lumen_core::renderer::{
    ClearColor, ColorAttachment, ComputePipelineId, GpuTexture, PrimitiveType, RenderPipelineId,
    RenderTargetDescriptor, ShaderStage,
};
use lumen_gpu::RenderContext;

/// Encodes one effect operation into an open frame.
///
/// The frame belongs to the caller: implementations record passes into `ctx`
/// but must not begin or end frames, and attempts to do so fail with
/// `InvalidRenderState`.
pub trait EffectRenderer: Send + Sync {
    /// Records `operation`, reading `source` and writing `target`.
    fn encode(
        &self,
        ctx: &mut RenderContext,
        operation: &EffectOperation,
        source: &GpuTexture,
        target: &GpuTexture,
    ) -> Result<(), EffectError>;
}

/// Pipelines compiled elsewhere, one per effect kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectPipelines {
    /// Full-screen color adjustment.
    pub color_adjust: RenderPipelineId,
    /// Full-screen overlay blend.
    pub blend: RenderPipelineId,
    /// Blur kernel.
    pub blur: ComputePipelineId,
}

/// Records every effect as a full-screen quad, or a compute dispatch for blurs.
#[derive(Debug, Clone)]
pub struct PipelineEffectRenderer {
    pipelines: EffectPipelines,
}

impl PipelineEffectRenderer {
    /// Creates a renderer binding `pipelines`.
    pub fn new(pipelines: EffectPipelines) -> Self {
        Self { pipelines }
    }

    fn fullscreen_pass(
        ctx: &mut RenderContext,
        label: &str,
        pipeline: RenderPipelineId,
        source: &GpuTexture,
        target: &GpuTexture,
    ) -> Result<(), EffectError> {
        let mut pass = RenderTargetDescriptor::single(ColorAttachment::clear(
            target.clone(),
            ClearColor::TRANSPARENT,
        ));
        pass.label = Some(label.to_owned());
        ctx.begin_render_pass(&pass)?;
        ctx.set_render_pipeline(pipeline)?;
        ctx.set_texture(ShaderStage::Fragment, bindings::TEXTURE_COLOR, source.id)?;
        ctx.bind_standard_samplers(ShaderStage::Fragment)?;
        Ok(())
    }
}

impl EffectRenderer for PipelineEffectRenderer {
    fn encode(
        &self,
        ctx: &mut RenderContext,
        operation: &EffectOperation,
        source: &GpuTexture,
        target: &GpuTexture,
    ) -> Result<(), EffectError> {
        match operation {
            EffectOperation::ColorAdjust(adjustment) => {
                Self::fullscreen_pass(
                    ctx,
                    operation.label(),
                    self.pipelines.color_adjust,
                    source,
                    target,
                )?;
                let uniforms = ColorAdjustmentUniforms::from(adjustment);
                ctx.set_uniforms(ShaderStage::Fragment, bindings::FRAGMENT_UNIFORMS, &uniforms)?;
                ctx.draw(PrimitiveType::TriangleStrip, 0, 4, 1)?;
            }
            EffectOperation::Blend(blend) => {
                if !(0.0..=1.0).contains(&blend.opacity) {
                    return Err(EffectError::InvalidParameters(format!(
                        "blend opacity {} is outside 0..=1",
                        blend.opacity
                    )));
                }
                Self::fullscreen_pass(ctx, operation.label(), self.pipelines.blend, source, target)?;
                ctx.set_texture(ShaderStage::Fragment, bindings::TEXTURE_MASK, blend.overlay.id)?;
                ctx.set_uniforms(
                    ShaderStage::Fragment,
                    bindings::FRAGMENT_UNIFORMS,
                    &blend.uniforms(),
                )?;
                ctx.draw(PrimitiveType::TriangleStrip, 0, 4, 1)?;
            }
            EffectOperation::Blur(blur) => {
                let max_threads = ctx
                    .device_context()
                    .capabilities()
                    .limits
                    .max_threads_per_threadgroup;
                let rows = (max_threads / THREADGROUP_SIZE).clamp(1, THREADGROUP_SIZE);

                ctx.begin_compute_pass(Some(operation.label()))?;
                ctx.set_compute_pipeline(self.pipelines.blur)?;
                ctx.set_texture(ShaderStage::Compute, 0, source.id)?;
                ctx.set_texture(ShaderStage::Compute, 1, target.id)?;
                ctx.set_uniforms(
                    ShaderStage::Compute,
                    0,
                    &blur.uniforms(source.width(), source.height()),
                )?;
                ctx.dispatch(
                    [target.width(), target.height(), 1],
                    [THREADGROUP_SIZE, rows, 1],
                )?;
            }
        }
        ctx.end_current_encoder();
        Ok(())
    }
}
