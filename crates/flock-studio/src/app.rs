use anyhow::Result;
use winit::event::WindowEvent;
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowId;

use flock_engine::core::{App, AppControl, FrameCtx};
use flock_engine::paint::Color;
use flock_engine::render::{BatchRenderer, GpuBatchSurface, RibbonRenderer, TextureCache};

use crate::demo::{Demo, DemoConfig};

/// Windowed demo: GPU batch renderer for the swarm, ribbon renderer for the trail.
pub struct StudioApp {
    demo: Demo,
    batch: BatchRenderer,
    ribbon: RibbonRenderer,
    textures: TextureCache,
    clear: Color,
}

impl StudioApp {
    pub fn new(config: &DemoConfig, clear: Color) -> Result<Self> {
        Ok(Self {
            demo: Demo::new(config)?,
            batch: BatchRenderer::new(),
            ribbon: RibbonRenderer::new(),
            textures: TextureCache::new(),
            clear,
        })
    }
}

impl App for StudioApp {
    fn on_window_event(&mut self, _window_id: WindowId, event: &WindowEvent) -> AppControl {
        match event {
            WindowEvent::KeyboardInput { event, .. }
                if event.state.is_pressed() && event.logical_key == Key::Named(NamedKey::Escape) =>
            {
                AppControl::Exit
            }
            _ => AppControl::Continue,
        }
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if ctx.time.frame_index % 600 == 0 {
            log::debug!("frame {} (dt {:.4}s)", ctx.time.frame_index, ctx.time.dt);
        }
        self.demo.update(ctx.time.elapsed, ctx.window.viewport());
        self.batch.begin_frame();
        self.ribbon.begin_frame();

        let Self {
            demo,
            batch,
            ribbon,
            textures,
            clear,
        } = self;

        ctx.render(*clear, |rctx, target| {
            ribbon.render(rctx, target, textures, &demo.ribbon);
            demo.swarm.render(&mut GpuBatchSurface::new(batch, textures, rctx, target));
        })
    }
}
