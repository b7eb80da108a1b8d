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

//! The cached pipeline state of the open pass.

use lumen_core::renderer::{
    BufferId, ComputePipelineId, CullMode, DepthStencilStateId, FillMode, RenderPipelineId,
    SamplerId, ScissorRect, ShaderStage, TextureId, Viewport, Winding,
};

/// Buffer slots per shader stage.
pub const MAX_BUFFER_SLOTS: usize = 31;
/// Texture slots per shader stage.
pub const MAX_TEXTURE_SLOTS: usize = 31;
/// Sampler slots per shader stage.
pub const MAX_SAMPLER_SLOTS: usize = 16;

/// What is bound to one shader stage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StageBindings {
    /// Buffer and offset per slot.
    pub buffers: [Option<(BufferId, u64)>; MAX_BUFFER_SLOTS],
    /// Texture per slot.
    pub textures: [Option<TextureId>; MAX_TEXTURE_SLOTS],
    /// Sampler per slot.
    pub samplers: [Option<SamplerId>; MAX_SAMPLER_SLOTS],
}

/// The last value applied for every piece of pass state.
///
/// `None` means nothing has been applied since the last reset, so the next set
/// always reaches the command buffer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderState {
    /// Bound render pipeline.
    pub render_pipeline: Option<RenderPipelineId>,
    /// Bound compute pipeline.
    pub compute_pipeline: Option<ComputePipelineId>,
    /// Bound depth/stencil state.
    pub depth_stencil: Option<DepthStencilStateId>,
    /// Cull mode.
    pub cull_mode: Option<CullMode>,
    /// Front-facing winding.
    pub front_facing: Option<Winding>,
    /// Triangle fill mode.
    pub fill_mode: Option<FillMode>,
    /// Viewport.
    pub viewport: Option<Viewport>,
    /// Scissor rectangle.
    pub scissor: Option<ScissorRect>,
    /// Vertex stage bindings.
    pub vertex: StageBindings,
    /// Fragment stage bindings.
    pub fragment: StageBindings,
    /// Compute stage bindings.
    pub compute: StageBindings,
}

impl RenderState {
    /// Stores `value` in `slot`. Returns `true` when it differs from the cached one.
    pub fn update<T: PartialEq>(slot: &mut Option<T>, value: T) -> bool {
        if slot.as_ref() == Some(&value) {
            false
        } else {
            *slot = Some(value);
            true
        }
    }

    /// Forgets everything. Called at every pass boundary.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// The bindings of `stage`.
    pub fn stage_mut(&mut self, stage: ShaderStage) -> &mut StageBindings {
        match stage {
            ShaderStage::Vertex => &mut self.vertex,
            ShaderStage::Fragment => &mut self.fragment,
            ShaderStage::Compute => &mut self.compute,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_reports_changes_only() {
        let mut slot = None;
        assert!(RenderState::update(&mut slot, CullMode::Back));
        assert!(!RenderState::update(&mut slot, CullMode::Back));
        assert!(RenderState::update(&mut slot, CullMode::None));
        assert_eq!(slot, Some(CullMode::None));
    }

    #[test]
    fn viewports_compare_bitwise() {
        let mut slot = None;
        assert!(RenderState::update(&mut slot, Viewport::covering(64, 64)));
        assert!(!RenderState::update(&mut slot, Viewport::covering(64, 64)));
        let mut nudged = Viewport::covering(64, 64);
        nudged.znear = -0.0;
        assert!(RenderState::update(&mut slot, nudged));
    }

    #[test]
    fn reset_clears_every_stage() {
        let mut state = RenderState::default();
        state.stage_mut(ShaderStage::Fragment).textures[3] = Some(TextureId(9));
        state.stage_mut(ShaderStage::Compute).samplers[15] = Some(SamplerId(2));
        state.render_pipeline = Some(RenderPipelineId(1));
        state.reset();
        assert_eq!(state, RenderState::default());
    }
}
