use anyhow::{Context, Result};

use kiln_engine::backend::{
    BackendConfig, BackendPreference, FrameTargetDesc, ShaderDesc, TextureDesc, TextureKind,
};
use kiln_engine::batch::{QuadBatch, QuadBatchConfig, Sprite, SpriteVertex};
use kiln_engine::command::{BlendFactor, ClearFlags, RecorderConfig, RenderState};
use kiln_engine::device::{probe, GpuInit};
use kiln_engine::logging::{init_logging, LoggingConfig};
use kiln_engine::RenderContext;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;
const FRAMES: u32 = 3;
const SPRITES: u32 = 500;

/// Pixel coordinates (origin top-left) to clip space, column-major.
fn ortho(width: f32, height: f32) -> [f32; 16] {
    [
        2.0 / width, 0.0, 0.0, 0.0,
        0.0, -2.0 / height, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        -1.0, 1.0, 0.0, 1.0,
    ]
}

/// `KILN_BACKEND=wgpu|headless|auto`, auto when unset.
fn backend_preference() -> Result<BackendPreference> {
    match std::env::var("KILN_BACKEND").as_deref() {
        Err(_) | Ok("auto") => Ok(BackendPreference::Auto),
        Ok("wgpu") => Ok(BackendPreference::Wgpu),
        Ok("headless") => Ok(BackendPreference::Headless),
        Ok(other) => anyhow::bail!("unknown KILN_BACKEND '{other}'"),
    }
}

/// 8x8 checkerboard, white and light grey.
fn checker() -> Vec<u8> {
    (0..64)
        .flat_map(|i| {
            let v = if (i % 8 + i / 8) % 2 == 0 { 0xff } else { 0xc0 };
            [v, v, v, 0xff]
        })
        .collect()
}

fn sprite(i: u32, frame: u32) -> Sprite {
    let t = i as f32 * 0.37 + frame as f32 * 0.1;
    let x = WIDTH as f32 * (0.5 + 0.45 * t.cos());
    let y = HEIGHT as f32 * (0.5 + 0.45 * (t * 1.3).sin());
    let shade = (i * 37 % 256) as u8;
    Sprite::new([x, y], [12.0, 12.0], [shade, 255 - shade, 160, 200])
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let preference = backend_preference()?;
    let capabilities = match preference {
        BackendPreference::Headless => kiln_engine::backend::Capabilities::headless(),
        _ => probe(GpuInit::default()),
    };
    let config = BackendConfig {
        preference,
        target: FrameTargetDesc { width: WIDTH, height: HEIGHT, ..Default::default() },
    };
    let mut ctx = RenderContext::from_config(&config, capabilities, RecorderConfig::default())
        .context("failed to create render backend")?;
    log::info!("kiln studio running on the {} backend", ctx.kind());

    let dispatcher = ctx.dispatcher();
    let shader = dispatcher
        .shader_create(&ShaderDesc {
            label: Some("sprite"),
            source: include_str!("sprite.wgsl"),
            vertex_entry: "vs_main",
            fragment_entry: "fs_main",
            layout: SpriteVertex::layout(),
            uniform_size: 64,
            samplers: &[TextureKind::D2],
        })
        .context("failed to create sprite shader")?;
    let pixels = checker();
    let texture = dispatcher
        .texture_create(&TextureDesc {
            label: Some("checker"),
            kind: TextureKind::D2,
            width: 8,
            height: 8,
            pixels: Some(&pixels),
        })
        .context("failed to create sprite texture")?;

    let mut batch = QuadBatch::new(dispatcher, QuadBatchConfig { max_quads: 128, ..Default::default() })
        .context("failed to create quad batch")?;
    let setup = batch.setup();
    setup.add_shader(shader)?;
    setup.add_uniform_matrix4(0, &[ortho(WIDTH as f32, HEIGHT as f32)])?;
    setup.add_sampler2d(0, 0, texture)?;

    for frame in 0..FRAMES {
        ctx.begin_frame()?;

        let rec = ctx.recorder();
        rec.add_clearcolor(0.08, 0.09, 0.12, 1.0)?;
        rec.add_cleardepth(1.0)?;
        rec.add_clear(ClearFlags::COLOR | ClearFlags::DEPTH)?;
        rec.add_viewport(0, 0, WIDTH as i32, HEIGHT as i32)?;
        rec.add_state(RenderState::Blend, true)?;
        rec.add_blendfunc(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha)?;
        let report = ctx.flush();
        if !report.is_ok() {
            log::warn!("frame {frame}: {} state command(s) failed", report.errors.len());
        }

        let dispatcher = ctx.dispatcher();
        for i in 0..SPRITES {
            batch.push(dispatcher, &sprite(i, frame))?;
        }
        let report = batch.flush(dispatcher)?;
        for failure in &report.errors {
            log::warn!("frame {frame}: {failure}");
        }
        batch.setup().run_post_commands(dispatcher);

        ctx.end_frame()?;
        let stats = ctx.stats();
        log::info!(
            "frame {frame}: {} draw(s), {} vertices, {} indices, {} clear(s)",
            stats.draw_calls,
            stats.vertices,
            stats.indices,
            stats.clears
        );
    }

    let dispatcher = ctx.dispatcher();
    batch.destroy(dispatcher)?;
    dispatcher.texture_destroy(texture)?;
    dispatcher.shader_destroy(shader)?;

    println!("kiln studio: {} batch(es) drawn over {FRAMES} frame(s)", batch.flushes());
    Ok(())
}
