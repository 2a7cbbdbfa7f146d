//! egui status bar drawn over the scene

use common::GraphicsContext;
use winit::event::WindowEvent;

/// Values shown in the status bar.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HudStatus {
    pub proximity: f32,
    pub capture_progress: f32,
    pub capturing: bool,
    pub fps: f32,
    pub pointer_locked: bool,
}

impl HudStatus {
    pub fn capture_label(&self) -> String {
        if self.capturing {
            format!("SWALLOWED {:>3.0}%", self.capture_progress * 100.0)
        } else {
            "FREE".to_string()
        }
    }
}

pub fn draw_status_bar(ctx: &egui::Context, status: &HudStatus) {
    egui::TopBottomPanel::top("status").show(ctx, |ui| {
        ui.horizontal(|ui| {
            ui.label(format!("Proximity: {:.2}", status.proximity));
            ui.separator();
            let color = if status.capturing {
                egui::Color32::from_rgb(255, 120, 40)
            } else {
                egui::Color32::GREEN
            };
            ui.label(egui::RichText::new(status.capture_label()).color(color));
            ui.separator();
            ui.label(format!("FPS: {:.0}", status.fps));
            if !status.pointer_locked {
                ui.separator();
                ui.label(egui::RichText::new("Click to look around").color(egui::Color32::YELLOW));
            }
        });
    });
}

pub struct Hud {
    ctx: egui::Context,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
}

impl Hud {
    pub fn new(gfx: &GraphicsContext) -> Self {
        let ctx = egui::Context::default();
        let state = egui_winit::State::new(
            ctx.clone(),
            egui::ViewportId::ROOT,
            &gfx.window,
            Some(gfx.window.scale_factor() as f32),
            None,
        );
        let renderer = egui_wgpu::Renderer::new(&gfx.device, gfx.config.format, None, 1);
        Self { ctx, state, renderer }
    }

    /// Returns true when egui consumed the event.
    pub fn on_window_event(&mut self, gfx: &GraphicsContext, event: &WindowEvent) -> bool {
        self.state.on_window_event(&gfx.window, event).consumed
    }

    /// Lay out the bar and record it into `encoder` on top of `view`.
    pub fn paint(
        &mut self,
        gfx: &GraphicsContext,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        status: &HudStatus,
    ) {
        let raw_input = self.state.take_egui_input(&gfx.window);
        let full_output = self.ctx.run(raw_input, |ctx| draw_status_bar(ctx, status));

        self.state.handle_platform_output(&gfx.window, full_output.platform_output);
        let tris = self.ctx.tessellate(full_output.shapes, full_output.pixels_per_point);
        for (id, image_delta) in &full_output.textures_delta.set {
            self.renderer.update_texture(&gfx.device, &gfx.queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [gfx.size.width, gfx.size.height],
            pixels_per_point: full_output.pixels_per_point,
        };
        self.renderer
            .update_buffers(&gfx.device, &gfx.queue, encoder, &tris, &screen_descriptor);
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("HUD Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.renderer.render(&mut render_pass, &tris, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.renderer.free_texture(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_label_shows_progress() {
        let mut status = HudStatus::default();
        assert_eq!(status.capture_label(), "FREE");
        status.capturing = true;
        status.capture_progress = 0.5;
        assert_eq!(status.capture_label(), "SWALLOWED  50%");
    }

    #[test]
    fn status_bar_lays_out_headless() {
        let ctx = egui::Context::default();
        let status = HudStatus {
            proximity: 0.4,
            capture_progress: 0.2,
            capturing: true,
            fps: 60.0,
            pointer_locked: false,
        };
        let output = ctx.run(egui::RawInput::default(), |ctx| draw_status_bar(ctx, &status));
        assert!(!output.shapes.is_empty());
    }
}
