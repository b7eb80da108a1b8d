use criterion::{criterion_group, criterion_main, Criterion};
use lumen_core::renderer::{
    BufferId, ClearColor, ColorAttachment, GpuDevice, GpuTexture, RenderPipelineId,
    RenderTargetDescriptor, SamplerId, ShaderStage, TextureDescriptor, TextureFormat, TextureId,
    TextureUsage, Viewport,
};
use lumen_gpu::{DeviceContext, RenderContext};
use lumen_infra::graphics::headless::profiles;
use lumen_infra::HeadlessDevice;
use std::hint::black_box;
use std::sync::Arc;

fn target() -> RenderTargetDescriptor {
    let texture = GpuTexture {
        id: TextureId(1),
        descriptor: TextureDescriptor::new_2d(
            TextureFormat::Rgba8Unorm,
            1920,
            1080,
            TextureUsage::RENDER_TARGET,
        ),
    };
    RenderTargetDescriptor::single(ColorAttachment::clear(texture, ClearColor::BLACK))
}

fn bench_state_cache(c: &mut Criterion) {
    let device = Arc::new(HeadlessDevice::new(profiles::integrated_family9()));
    let context = Arc::new(DeviceContext::with_device(device as Arc<dyn GpuDevice>).unwrap());
    let mut ctx = RenderContext::new(context);
    let target = target();

    let mut group = c.benchmark_group("Render state cache");

    // Same state every iteration: everything after the first pass-level set is suppressed.
    group.bench_function("Redundant sets (1000 layers)", |b| {
        b.iter(|| {
            ctx.begin_frame("bench").unwrap();
            ctx.begin_render_pass(&target).unwrap();
            for _ in 0..1000 {
                ctx.set_render_pipeline(RenderPipelineId(1)).unwrap();
                ctx.set_viewport(Viewport::covering(1920, 1080)).unwrap();
                ctx.set_buffer(ShaderStage::Vertex, 0, BufferId(1), 0).unwrap();
                ctx.set_texture(ShaderStage::Fragment, 0, TextureId(2)).unwrap();
                ctx.set_sampler(ShaderStage::Fragment, 0, SamplerId(1)).unwrap();
            }
            ctx.abort_frame();
            black_box(ctx.counters());
        });
    });

    group.bench_function("Changing sets (1000 layers)", |b| {
        b.iter(|| {
            ctx.begin_frame("bench").unwrap();
            ctx.begin_render_pass(&target).unwrap();
            for layer in 0..1000u64 {
                ctx.set_render_pipeline(RenderPipelineId(layer % 4)).unwrap();
                ctx.set_buffer(ShaderStage::Vertex, 0, BufferId(1), layer * 256)
                    .unwrap();
                ctx.set_texture(ShaderStage::Fragment, 0, TextureId(layer)).unwrap();
            }
            ctx.abort_frame();
            black_box(ctx.counters());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_state_cache);
criterion_main!(benches);
