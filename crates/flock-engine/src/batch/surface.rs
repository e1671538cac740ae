use super::BatchContainer;

/// Render surface a batch container delegates to once its preconditions hold.
///
/// Two implementations exist: the GPU batch renderer
/// (`render::GpuBatchSurface`) and the raster fallback
/// ([`RasterSurface`](super::RasterSurface)). The choice is made by whoever
/// composes the frame; the container does not know which one it gets.
pub trait BatchSurface {
    fn draw_batches(&mut self, container: &mut BatchContainer);
}
