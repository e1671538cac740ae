use std::path::Path;

use anyhow::{Context, Result};

use flock_engine::batch::RasterSurface;
use flock_engine::coords::Viewport;
use flock_engine::paint::Color;
use flock_engine::raster::{Pixmap, RasterOptions};

use crate::demo::{Demo, DemoConfig};

/// Parameters of a single software-rendered frame.
#[derive(Debug, Clone)]
pub struct OfflineFrame {
    pub viewport: Viewport,
    pub resolution: f32,
    pub round_pixels: bool,
    /// Animation time to render, in seconds.
    pub time: f32,
    pub clear: Color,
}

/// Renders one frame of the demo through the raster path and writes it as PNG.
///
/// The ribbon needs the GPU and is not part of the raster output.
pub fn render_png(config: &DemoConfig, frame: &OfflineFrame, path: &Path) -> Result<()> {
    anyhow::ensure!(frame.viewport.is_valid(), "invalid viewport {:?}", frame.viewport);
    let mut demo = Demo::new(config)?;
    demo.update(frame.time, frame.viewport);

    let width = (frame.viewport.width * frame.resolution).ceil() as u32;
    let height = (frame.viewport.height * frame.resolution).ceil() as u32;
    let mut pixmap = Pixmap::new(width, height);
    pixmap.clear(frame.clear);

    let options = RasterOptions {
        resolution: frame.resolution,
        round_pixels: frame.round_pixels,
    };
    demo.swarm.render(&mut RasterSurface::new(&mut pixmap, options));

    pixmap
        .save_png(path)
        .with_context(|| format!("failed to write raster frame to {}", path.display()))?;
    Ok(())
}
