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
    BufferId, ClearColor, ColorAttachment, ComputePipelineId, CullMode, GpuDevice, GpuTexture,
    PrimitiveType, RenderPipelineId, RenderTargetDescriptor, SamplerId, ShaderStage,
    TextureDescriptor, TextureFormat, TextureId, TextureUsage, Viewport,
};
use lumen_gpu::{DeviceContext, ErrorHook, RenderContext, RenderContextError};
use lumen_infra::graphics::headless::profiles;
use lumen_infra::{HeadlessDevice, RecordedCommand};
use std::sync::{Arc, Mutex};

fn setup() -> (Arc<HeadlessDevice>, RenderContext) {
    let device = Arc::new(HeadlessDevice::new(profiles::integrated_family9()));
    let context = DeviceContext::with_device(Arc::clone(&device) as Arc<dyn GpuDevice>).unwrap();
    (device, RenderContext::new(Arc::new(context)))
}

fn texture(id: u64, width: u32, height: u32) -> GpuTexture {
    GpuTexture {
        id: TextureId(id),
        descriptor: TextureDescriptor::new_2d(
            TextureFormat::Rgba8Unorm,
            width,
            height,
            TextureUsage::RENDER_TARGET | TextureUsage::SHADER_READ,
        ),
    }
}

fn target(width: u32, height: u32) -> RenderTargetDescriptor {
    RenderTargetDescriptor::single(ColorAttachment::clear(
        texture(100, width, height),
        ClearColor::BLACK,
    ))
}

#[test]
fn redundant_state_changes_reach_the_backend_once() {
    let (device, mut ctx) = setup();
    let viewport = Viewport {
        x: 8.0,
        y: 8.0,
        width: 120.0,
        height: 60.0,
        znear: 0.0,
        zfar: 1.0,
    };

    ctx.begin_frame("diff").unwrap();
    ctx.begin_render_pass(&target(256, 256)).unwrap();
    for _ in 0..2 {
        ctx.set_viewport(viewport).unwrap();
        ctx.set_render_pipeline(RenderPipelineId(7)).unwrap();
        ctx.set_cull_mode(CullMode::Back).unwrap();
        ctx.set_buffer(ShaderStage::Vertex, 0, BufferId(3), 64).unwrap();
        ctx.set_texture(ShaderStage::Fragment, 0, TextureId(11)).unwrap();
        ctx.set_sampler(ShaderStage::Fragment, 0, SamplerId(5)).unwrap();
    }
    ctx.end_frame().unwrap();

    let log = device.command_log();
    assert_eq!(
        log.count(|c| *c == RecordedCommand::SetViewport(viewport)),
        1
    );
    assert_eq!(
        log.count(|c| matches!(c, RecordedCommand::SetRenderPipeline(_))),
        1
    );
    assert_eq!(log.count(|c| matches!(c, RecordedCommand::SetCullMode(_))), 1);
    assert_eq!(log.count(|c| matches!(c, RecordedCommand::SetBuffer { .. })), 1);
    assert_eq!(log.count(|c| matches!(c, RecordedCommand::SetTexture { .. })), 1);
    assert_eq!(log.count(|c| matches!(c, RecordedCommand::SetSampler { .. })), 1);

    let counters = ctx.counters();
    assert_eq!(counters.suppressed(), 6);
    // Six distinct values plus the default viewport.
    assert_eq!(counters.state_changes, 7);
    assert_eq!(log.count(RecordedCommand::is_state_change), 7);
}

#[test]
fn default_viewport_covers_the_first_attachment() {
    let (device, mut ctx) = setup();
    ctx.begin_frame("viewport").unwrap();
    ctx.begin_render_pass(&target(320, 200)).unwrap();
    ctx.set_viewport(Viewport::covering(320, 200)).unwrap();
    ctx.end_frame().unwrap();

    let viewports: Vec<_> = device
        .command_log()
        .commands()
        .into_iter()
        .filter(|c| matches!(c, RecordedCommand::SetViewport(_)))
        .collect();
    assert_eq!(
        viewports,
        vec![RecordedCommand::SetViewport(Viewport::covering(320, 200))]
    );
}

#[test]
fn pass_boundaries_reset_the_cache() {
    let (device, mut ctx) = setup();
    ctx.begin_frame("passes").unwrap();
    ctx.begin_render_pass(&target(64, 64)).unwrap();
    ctx.set_render_pipeline(RenderPipelineId(1)).unwrap();
    ctx.begin_render_pass(&target(64, 64)).unwrap();
    ctx.set_render_pipeline(RenderPipelineId(1)).unwrap();
    ctx.end_frame().unwrap();

    let log = device.command_log();
    assert_eq!(
        log.count(|c| matches!(c, RecordedCommand::SetRenderPipeline(_))),
        2
    );
    assert_eq!(log.count(|c| *c == RecordedCommand::EndPass), 2);
}

#[test]
fn only_one_frame_is_recorded_at_a_time() {
    let (_device, mut ctx) = setup();
    assert!(matches!(
        ctx.end_frame(),
        Err(RenderContextError::InvalidRenderState(_))
    ));

    ctx.begin_frame("first").unwrap();
    assert!(matches!(
        ctx.begin_frame("second"),
        Err(RenderContextError::InvalidRenderState(_))
    ));
    ctx.end_frame().unwrap();
    assert!(matches!(
        ctx.end_frame(),
        Err(RenderContextError::InvalidRenderState(_))
    ));
    assert!(!ctx.is_recording());
}

#[test]
fn encoding_needs_a_matching_pass() {
    let (_device, mut ctx) = setup();
    assert!(matches!(
        ctx.set_render_pipeline(RenderPipelineId(1)),
        Err(RenderContextError::InvalidEncoder(_))
    ));

    ctx.begin_frame("encoders").unwrap();
    assert!(matches!(
        ctx.set_cull_mode(CullMode::None),
        Err(RenderContextError::InvalidEncoder(_))
    ));
    ctx.begin_render_pass(&target(32, 32)).unwrap();
    assert!(matches!(
        ctx.set_compute_pipeline(ComputePipelineId(1)),
        Err(RenderContextError::InvalidEncoder(_))
    ));
    assert!(matches!(
        ctx.set_texture(ShaderStage::Compute, 0, TextureId(1)),
        Err(RenderContextError::InvalidEncoder(_))
    ));
    assert!(matches!(
        ctx.copy_texture(TextureId(1), TextureId(2)),
        Err(RenderContextError::InvalidEncoder(_))
    ));
}

#[test]
fn draw_and_dispatch_need_a_pipeline() {
    let (_device, mut ctx) = setup();
    ctx.begin_frame("unbound").unwrap();
    ctx.begin_render_pass(&target(32, 32)).unwrap();
    assert!(matches!(
        ctx.draw(PrimitiveType::Triangle, 0, 3, 1),
        Err(RenderContextError::ResourceNotBound(_))
    ));
    ctx.begin_compute_pass(None).unwrap();
    assert!(matches!(
        ctx.dispatch([64, 64, 1], [8, 8, 1]),
        Err(RenderContextError::ResourceNotBound(_))
    ));
    assert_eq!(ctx.counters().draw_calls, 0);
    assert_eq!(ctx.counters().dispatches, 0);
}

#[test]
fn limits_are_enforced() {
    let (_device, mut ctx) = setup();
    ctx.begin_frame("limits").unwrap();

    let crowded = RenderTargetDescriptor {
        label: None,
        color_attachments: (0..9)
            .map(|i| ColorAttachment::load(texture(i, 16, 16)))
            .collect(),
        depth_stencil: None,
    };
    assert!(matches!(
        ctx.begin_render_pass(&crowded),
        Err(RenderContextError::InvalidRenderState(_))
    ));
    assert!(matches!(
        ctx.begin_render_pass(&RenderTargetDescriptor::default()),
        Err(RenderContextError::InvalidRenderState(_))
    ));

    ctx.begin_render_pass(&target(16, 16)).unwrap();
    assert!(matches!(
        ctx.set_texture(ShaderStage::Fragment, 31, TextureId(1)),
        Err(RenderContextError::InvalidRenderState(_))
    ));
    assert!(matches!(
        ctx.set_sampler(ShaderStage::Fragment, 16, SamplerId(1)),
        Err(RenderContextError::InvalidRenderState(_))
    ));
    assert!(matches!(
        ctx.set_bytes(ShaderStage::Vertex, 1, &[0u8; 4097]),
        Err(RenderContextError::InvalidRenderState(_))
    ));
    ctx.set_texture(ShaderStage::Fragment, 30, TextureId(1)).unwrap();
    ctx.set_sampler(ShaderStage::Fragment, 15, SamplerId(1)).unwrap();
}

#[test]
fn eight_attachments_are_accepted() {
    let (device, mut ctx) = setup();
    ctx.begin_frame("mrt").unwrap();
    let target = RenderTargetDescriptor {
        label: Some("mrt".into()),
        color_attachments: (0..8)
            .map(|i| ColorAttachment::load(texture(i, 16, 16)))
            .collect(),
        depth_stencil: None,
    };
    ctx.begin_render_pass(&target).unwrap();
    ctx.end_frame().unwrap();

    assert_eq!(
        device.command_log().commands()[0],
        RecordedCommand::BeginRenderPass {
            label: Some("mrt".into()),
            color_attachments: 8,
            has_depth_stencil: false,
        }
    );
}

#[test]
fn beginning_a_pass_closes_the_open_one() {
    let (device, mut ctx) = setup();
    ctx.begin_frame("switch").unwrap();
    ctx.begin_compute_pass(Some("blur")).unwrap();
    ctx.begin_copy_pass(None).unwrap();
    ctx.end_current_encoder();
    ctx.end_current_encoder();
    ctx.end_frame().unwrap();

    assert_eq!(
        device.command_log().commands(),
        vec![
            RecordedCommand::BeginComputePass,
            RecordedCommand::EndPass,
            RecordedCommand::BeginCopyPass,
            RecordedCommand::EndPass,
        ]
    );
}

#[test]
fn dispatch_uses_exact_grids_when_supported() {
    let (device, mut ctx) = setup();
    ctx.begin_frame("compute").unwrap();
    ctx.begin_compute_pass(None).unwrap();
    ctx.set_compute_pipeline(ComputePipelineId(2)).unwrap();
    ctx.dispatch([100, 30, 1], [32, 8, 1]).unwrap();
    ctx.end_frame().unwrap();

    assert_eq!(
        device
            .command_log()
            .count(|c| *c
                == RecordedCommand::DispatchThreads {
                    threads: [100, 30, 1],
                    threads_per_group: [32, 8, 1],
                }),
        1
    );
    assert_eq!(ctx.counters().dispatches, 1);
}

#[test]
fn copy_pass_records_copies_and_mipmaps() {
    let (device, mut ctx) = setup();
    ctx.begin_frame("copy").unwrap();
    ctx.begin_copy_pass(None).unwrap();
    ctx.copy_texture(TextureId(1), TextureId(2)).unwrap();
    ctx.generate_mipmaps(TextureId(2)).unwrap();
    ctx.end_frame_and_wait().unwrap();

    let log = device.command_log();
    assert_eq!(
        log.count(|c| *c
            == RecordedCommand::CopyTexture {
                source: TextureId(1),
                destination: TextureId(2),
            }),
        1
    );
    assert_eq!(
        log.count(|c| *c == RecordedCommand::GenerateMipmaps(TextureId(2))),
        1
    );
}

#[test]
fn standard_samplers_bind_to_their_slots() {
    let (device, mut ctx) = setup();
    let samplers = ctx.device_context().samplers();
    ctx.begin_frame("samplers").unwrap();
    ctx.begin_render_pass(&target(16, 16)).unwrap();
    ctx.bind_standard_samplers(ShaderStage::Fragment).unwrap();
    ctx.end_frame().unwrap();

    let bound: Vec<_> = device
        .command_log()
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            RecordedCommand::SetSampler { slot, sampler, .. } => Some((slot, sampler)),
            _ => None,
        })
        .collect();
    assert_eq!(
        bound,
        vec![
            (0, samplers.linear),
            (1, samplers.nearest),
            (2, samplers.mipmapped)
        ]
    );
}

#[test]
fn inline_bytes_are_always_recorded() {
    let (device, mut ctx) = setup();
    ctx.begin_frame("bytes").unwrap();
    ctx.begin_render_pass(&target(16, 16)).unwrap();
    ctx.set_uniforms(ShaderStage::Fragment, 0, &[1.0f32, 2.0, 3.0, 4.0])
        .unwrap();
    ctx.set_uniforms(ShaderStage::Fragment, 0, &[1.0f32, 2.0, 3.0, 4.0])
        .unwrap();
    ctx.end_frame().unwrap();

    assert_eq!(
        device
            .command_log()
            .count(|c| matches!(c, RecordedCommand::SetBytes { bytes, .. } if bytes.len() == 16)),
        2
    );
}

#[test]
fn submission_failures_reach_the_error_hook() {
    let (device, ctx) = setup();
    let errors: Arc<Mutex<Vec<RenderContextError>>> = Arc::default();
    let sink = Arc::clone(&errors);
    let hook: ErrorHook = Arc::new(move |e: RenderContextError| sink.lock().unwrap().push(e));
    let mut ctx = ctx.with_error_hook(hook);

    device.set_fail_commits(true);
    ctx.begin_frame("doomed").unwrap();
    ctx.end_frame().unwrap();

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0],
        RenderContextError::CommandBufferFailed(_)
    ));
}

#[test]
fn waiting_surfaces_submission_failures() {
    let (device, mut ctx) = setup();
    device.set_fail_commits(true);
    ctx.begin_frame("doomed").unwrap();
    assert!(matches!(
        ctx.end_frame_and_wait(),
        Err(RenderContextError::CommandBufferFailed(_))
    ));
    assert!(!ctx.is_recording());
}

#[test]
fn aborted_frames_are_never_submitted() {
    let (device, mut ctx) = setup();
    ctx.begin_frame("aborted").unwrap();
    ctx.begin_render_pass(&target(16, 16)).unwrap();
    ctx.abort_frame();
    ctx.abort_frame();

    assert_eq!(device.command_log().submission_count(), 0);
    ctx.begin_frame("next").unwrap();
    ctx.end_frame().unwrap();
    assert_eq!(device.command_log().submission_count(), 1);
}

#[test]
fn managed_frames_can_only_be_ended_by_their_owner() {
    let (device, mut ctx) = setup();
    ctx.begin_managed_frame("owned").unwrap();
    assert!(matches!(
        ctx.end_frame(),
        Err(RenderContextError::InvalidRenderState(_))
    ));
    assert!(matches!(
        ctx.begin_frame("nested"),
        Err(RenderContextError::InvalidRenderState(_))
    ));
    ctx.end_managed_frame().unwrap();
    assert_eq!(device.command_log().submission_count(), 1);
}

#[test]
fn dropping_a_recording_context_discards_the_frame() {
    let (device, mut ctx) = setup();
    ctx.begin_frame("dropped").unwrap();
    drop(ctx);
    assert_eq!(device.command_log().submission_count(), 0);
}
