//! Singularity fly-through
//!
//! Controls:
//! - Click: capture the mouse and start the ambient audio
//! - Mouse: look around
//! - WASD / arrows: move
//! - Escape: release the mouse

use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use common::GraphicsContext;
use rand::{rngs::StdRng, SeedableRng};
use winit::{
    event::{DeviceEvent, ElementState, Event, KeyEvent, MouseButton, WindowEvent},
    event_loop::ControlFlow,
    keyboard::{KeyCode, PhysicalKey},
};

use singularity::audio::{AudioSystem, SpeakerAmbience};
use singularity::config::Args;
use singularity::frame::{FrameDriver, Viewport};
use singularity::hud::HudStatus;
use singularity::input::InputState;
use singularity::renderer::{RendererError, WgpuRenderer};
use singularity::snapshot::render_volume_snapshot;

fn release_pointer(renderer: &WgpuRenderer, input: &mut InputState) {
    if !input.pointer_locked() {
        return;
    }
    if let Err(e) = renderer.gfx().set_pointer_lock(false) {
        log::warn!("Could not release the mouse: {}", e);
    }
    input.set_pointer_locked(false);
    log::info!("Pointer released");
}

fn main() -> anyhow::Result<()> {
    common::init_logging();
    let args = Args::parse();
    let config = args.to_config();

    if let Some(path) = &args.snapshot {
        let started = Instant::now();
        let image = render_volume_snapshot(&config.spawn, &config, args.width, args.height, 0.0, 0.0);
        image
            .save(path)
            .with_context(|| format!("failed to write snapshot to {}", path.display()))?;
        log::info!(
            "Wrote {}x{} snapshot to {} in {:.2}s",
            args.width,
            args.height,
            path.display(),
            started.elapsed().as_secs_f32()
        );
        return Ok(());
    }

    let seed = args.seed.unwrap_or_else(rand::random);
    log::info!("Scene seed {}", seed);
    let mut rng = StdRng::seed_from_u64(seed);

    // winit errors are not always Send + Sync.
    let (gfx, event_loop) = pollster::block_on(GraphicsContext::new("Singularity", args.width, args.height))
        .map_err(|e| anyhow::anyhow!("graphics setup failed: {e}"))?;
    let mut renderer = WgpuRenderer::new(gfx, &config.volume)?;
    let mut driver = FrameDriver::new(config, &mut renderer, &mut rng)?;
    let mut input = InputState::new();
    let mut audio = AudioSystem::new(SpeakerAmbience::new(seed));

    let start = Instant::now();
    let mut last_time = start;
    let mut fps = 0.0_f32;

    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { event, .. } => {
                if renderer.handle_window_event(&event) {
                    return;
                }

                match event {
                    WindowEvent::CloseRequested => elwt.exit(),
                    WindowEvent::Resized(size) => renderer.resize(size),
                    WindowEvent::Focused(false) => release_pointer(&renderer, &mut input),
                    WindowEvent::MouseInput {
                        state: ElementState::Pressed,
                        button: MouseButton::Left,
                        ..
                    } => {
                        if !input.pointer_locked() {
                            match renderer.gfx().set_pointer_lock(true) {
                                Ok(()) => {
                                    log::info!("Pointer locked");
                                    input.set_pointer_locked(true);
                                }
                                Err(e) => log::warn!("Could not capture the mouse: {}", e),
                            }
                        }
                        audio.trigger();
                    }
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                physical_key: PhysicalKey::Code(key),
                                state,
                                ..
                            },
                        ..
                    } => {
                        if key == KeyCode::Escape && state == ElementState::Pressed {
                            release_pointer(&renderer, &mut input);
                        } else {
                            input.handle_key(key, state);
                        }
                    }
                    WindowEvent::RedrawRequested => {
                        let now = Instant::now();
                        let dt = (now - last_time).as_secs_f32().min(0.1);
                        last_time = now;
                        if dt > 0.0 {
                            fps = if fps == 0.0 { 1.0 / dt } else { fps * 0.9 + 0.1 / dt };
                        }

                        input.apply_look(&mut driver.world_mut().camera);

                        let size = renderer.gfx().size;
                        let viewport = Viewport::new(size.width, size.height);
                        let time = start.elapsed().as_secs_f32();

                        match driver.frame(&mut renderer, input.snapshot(), dt, time, viewport) {
                            Ok(report) => renderer.set_hud_status(HudStatus {
                                proximity: report.outcome.proximity,
                                capture_progress: report.capture_progress,
                                capturing: report.capturing,
                                fps,
                                pointer_locked: input.pointer_locked(),
                            }),
                            Err(RendererError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                                renderer.reconfigure()
                            }
                            Err(RendererError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                                log::error!("GPU out of memory, exiting");
                                elwt.exit();
                            }
                            Err(e) => log::warn!("Render error: {}", e),
                        }
                    }
                    _ => {}
                }
            }
            Event::DeviceEvent {
                event: DeviceEvent::MouseMotion { delta },
                ..
            } => input.handle_mouse_motion(delta.0, delta.1),
            Event::AboutToWait => {
                renderer.gfx().window.request_redraw();
            }
            _ => {}
        }
    })
    .map_err(|e| anyhow::anyhow!("event loop error: {e}"))
}
