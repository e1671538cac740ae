//! Flock studio: a sprite swarm and a ribbon trail on the flock engine.
//!
//! Opens a window by default. `--raster out.png` renders one frame through
//! the software raster path instead; the same path is used when the GPU
//! cannot be initialized.

mod app;
mod demo;
mod offline;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use winit::dpi::LogicalSize;

use flock_engine::coords::Viewport;
use flock_engine::device::GpuInit;
use flock_engine::logging::{init_logging, LoggingConfig};
use flock_engine::paint::{BlendMode, Color};
use flock_engine::window::{Runtime, RuntimeConfig};

use crate::app::StudioApp;
use crate::demo::DemoConfig;
use crate::offline::OfflineFrame;

const FALLBACK_PNG: &str = "flock-fallback.png";

#[derive(Debug, Copy, Clone, Default, ValueEnum)]
enum Blend {
    #[default]
    Normal,
    Add,
    Multiply,
    Screen,
}

impl From<Blend> for BlendMode {
    fn from(b: Blend) -> Self {
        match b {
            Blend::Normal => BlendMode::Normal,
            Blend::Add => BlendMode::Add,
            Blend::Multiply => BlendMode::Multiply,
            Blend::Screen => BlendMode::Screen,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "flock-studio", version, about = "Batched sprites and ribbon meshes")]
struct Args {
    /// Number of sprites in the swarm.
    #[arg(long, default_value_t = 3000)]
    sprites: usize,

    /// Number of points in the ribbon trail.
    #[arg(long, default_value_t = 48)]
    ribbon_points: usize,

    /// Narrow the ribbon towards its tail.
    #[arg(long)]
    taper: bool,

    /// Blend mode of the swarm.
    #[arg(long, value_enum, default_value_t = Blend::Normal)]
    blend: Blend,

    /// Render one frame with the raster backend to this PNG and exit.
    #[arg(long, value_name = "PNG")]
    raster: Option<PathBuf>,

    /// Logical width (window and raster output).
    #[arg(long, default_value_t = 960.0)]
    width: f32,

    /// Logical height (window and raster output).
    #[arg(long, default_value_t = 600.0)]
    height: f32,

    /// Device pixels per logical pixel for raster output.
    #[arg(long, default_value_t = 1.0)]
    resolution: f32,

    /// Truncate rotated sprite translations to whole pixels in raster output.
    #[arg(long)]
    round_pixels: bool,

    /// Animation time of the raster frame, in seconds.
    #[arg(long, default_value_t = 2.0)]
    time: f32,

    /// Debug-level engine logs.
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn demo_config(&self) -> DemoConfig {
        DemoConfig {
            sprites: self.sprites,
            ribbon_points: self.ribbon_points,
            taper: self.taper,
            blend: self.blend.into(),
        }
    }

    fn offline_frame(&self, clear: Color) -> OfflineFrame {
        OfflineFrame {
            viewport: Viewport::new(self.width, self.height),
            resolution: self.resolution,
            round_pixels: self.round_pixels,
            time: self.time,
            clear,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(if args.verbose {
        LoggingConfig::verbose()
    } else {
        LoggingConfig::default()
    });

    let clear = Color::from_srgb_u8(12, 14, 24, 255);
    let demo = args.demo_config();

    if let Some(path) = &args.raster {
        return offline::render_png(&demo, &args.offline_frame(clear), path);
    }

    let runtime = RuntimeConfig {
        title: "flock studio".to_string(),
        initial_size: LogicalSize::new(args.width as f64, args.height as f64),
    };
    let app = StudioApp::new(&demo, clear)?;

    if let Err(err) = Runtime::run(runtime, GpuInit::default(), app) {
        log::warn!("windowed run failed ({err:#}); writing a raster frame to {FALLBACK_PNG}");
        offline::render_png(&demo, &args.offline_frame(clear), Path::new(FALLBACK_PNG))?;
    }
    Ok(())
}
