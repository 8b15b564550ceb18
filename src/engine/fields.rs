//! Field state: every render target the solver and post pipeline touch.

use crate::config::FluidConfig;

use super::context::GpuContext;
use super::programs::Program;
use super::targets::{
    create_double_buffer, grid_resolution, resize_double_buffer, DoubleBuffer, RenderTarget,
};

/// Named simulation and post-processing targets.
///
/// Velocity, dye and pressure are double-buffered; divergence and curl are
/// recomputed from scratch each frame and need only a single target.
pub struct Fields {
    pub dye: DoubleBuffer<RenderTarget>,
    pub velocity: DoubleBuffer<RenderTarget>,
    pub divergence: RenderTarget,
    pub curl: RenderTarget,
    pub pressure: DoubleBuffer<RenderTarget>,
    pub bloom: RenderTarget,
    pub bloom_mips: Vec<RenderTarget>,
    pub sunrays: RenderTarget,
    pub sunrays_temp: RenderTarget,
}

/// Sizes of the bloom down-sampling chain: halve at each level, stopping
/// before a dimension would drop below 2 pixels.
pub fn bloom_mip_sizes(width: u32, height: u32, iterations: u32) -> Vec<(u32, u32)> {
    let mut sizes = Vec::new();
    for i in 0..iterations {
        let w = width >> (i + 1);
        let h = height >> (i + 1);
        if w < 2 || h < 2 {
            break;
        }
        sizes.push((w, h));
    }
    sizes
}

impl Fields {
    pub fn create(ctx: &GpuContext, config: &FluidConfig, surface: (u32, u32)) -> Self {
        let sim_res = grid_resolution(config.sim_resolution, surface.0, surface.1);
        let dye_res = grid_resolution(config.dye_resolution, surface.0, surface.1);

        let rgba = ctx.formats.rgba;
        let rg = ctx.formats.rg;
        let r = ctx.formats.r;
        let filter = ctx.field_filter();

        Self {
            dye: create_double_buffer(ctx, "Dye Target", dye_res.0, dye_res.1, rgba, filter),
            velocity: create_double_buffer(ctx, "Velocity Target", sim_res.0, sim_res.1, rg, filter),
            divergence: RenderTarget::new(ctx, "Divergence Target", sim_res.0, sim_res.1, r, wgpu::FilterMode::Nearest),
            curl: RenderTarget::new(ctx, "Curl Target", sim_res.0, sim_res.1, r, wgpu::FilterMode::Nearest),
            pressure: create_double_buffer(ctx, "Pressure Target", sim_res.0, sim_res.1, r, wgpu::FilterMode::Nearest),
            bloom: Self::bloom_target(ctx, config, surface),
            bloom_mips: Self::bloom_chain(ctx, config, surface),
            sunrays: Self::sunrays_target(ctx, config, surface, "Sunrays Target"),
            sunrays_temp: Self::sunrays_target(ctx, config, surface, "Sunrays Temp Target"),
        }
    }

    /// Rebuild targets after a resolution-affecting change. The dye and
    /// velocity read sides are preserved through the copy kernel; everything
    /// recomputed per frame is reallocated empty.
    pub fn reallocate(
        &mut self,
        ctx: &GpuContext,
        copy: Option<&Program>,
        config: &FluidConfig,
        surface: (u32, u32),
        encoder: &mut wgpu::CommandEncoder,
    ) {
        let sim_res = grid_resolution(config.sim_resolution, surface.0, surface.1);
        let dye_res = grid_resolution(config.dye_resolution, surface.0, surface.1);
        let r = ctx.formats.r;

        resize_double_buffer(ctx, copy, encoder, &mut self.dye, "Dye Target", dye_res.0, dye_res.1);
        resize_double_buffer(ctx, copy, encoder, &mut self.velocity, "Velocity Target", sim_res.0, sim_res.1);

        self.divergence = RenderTarget::new(ctx, "Divergence Target", sim_res.0, sim_res.1, r, wgpu::FilterMode::Nearest);
        self.curl = RenderTarget::new(ctx, "Curl Target", sim_res.0, sim_res.1, r, wgpu::FilterMode::Nearest);
        self.pressure = create_double_buffer(ctx, "Pressure Target", sim_res.0, sim_res.1, r, wgpu::FilterMode::Nearest);

        self.bloom = Self::bloom_target(ctx, config, surface);
        self.bloom_mips = Self::bloom_chain(ctx, config, surface);
        self.sunrays = Self::sunrays_target(ctx, config, surface, "Sunrays Target");
        self.sunrays_temp = Self::sunrays_target(ctx, config, surface, "Sunrays Temp Target");
    }

    fn bloom_target(ctx: &GpuContext, config: &FluidConfig, surface: (u32, u32)) -> RenderTarget {
        let res = grid_resolution(config.bloom_resolution, surface.0, surface.1);
        RenderTarget::new(ctx, "Bloom Target", res.0, res.1, ctx.formats.rgba, ctx.field_filter())
    }

    fn bloom_chain(ctx: &GpuContext, config: &FluidConfig, surface: (u32, u32)) -> Vec<RenderTarget> {
        let res = grid_resolution(config.bloom_resolution, surface.0, surface.1);
        bloom_mip_sizes(res.0, res.1, config.bloom_iterations)
            .into_iter()
            .map(|(w, h)| RenderTarget::new(ctx, "Bloom Mip Target", w, h, ctx.formats.rgba, ctx.field_filter()))
            .collect()
    }

    fn sunrays_target(ctx: &GpuContext, config: &FluidConfig, surface: (u32, u32), label: &str) -> RenderTarget {
        let res = grid_resolution(config.sunrays_resolution, surface.0, surface.1);
        RenderTarget::new(ctx, label, res.0, res.1, ctx.formats.r, ctx.field_filter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_halves_until_iteration_count() {
        assert_eq!(
            bloom_mip_sizes(256, 128, 3),
            vec![(128, 64), (64, 32), (32, 16)]
        );
    }

    #[test]
    fn chain_stops_below_two_pixels() {
        // 256x128 halves to 1 on the short axis after 7 levels.
        assert_eq!(bloom_mip_sizes(256, 128, 8).len(), 6);
        let last = *bloom_mip_sizes(256, 128, 8).last().unwrap();
        assert_eq!(last, (4, 2));
    }

    #[test]
    fn tiny_source_produces_empty_chain() {
        assert!(bloom_mip_sizes(2, 2, 8).is_empty());
    }
}
