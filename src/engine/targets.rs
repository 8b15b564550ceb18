//! Render-target management.
//!
//! A `RenderTarget` owns one GPU texture used both as a sampled image and as
//! a render-pass color attachment. Fields that are iteratively updated live
//! in a `DoubleBuffer` and ping-pong between its two targets.

use super::context::GpuContext;
use super::programs::{blit, Program};

/// One offscreen texture plus its attachment view.
pub struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub filter: wgpu::FilterMode,
}

impl RenderTarget {
    pub fn new(
        ctx: &GpuContext,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        filter: wgpu::FilterMode,
    ) -> Self {
        // wgpu zero-initializes textures, matching the cleared-at-creation
        // contract of every field.
        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            width,
            height,
            format,
            filter,
        }
    }

    pub fn texel_size(&self) -> [f32; 2] {
        [1.0 / self.width as f32, 1.0 / self.height as f32]
    }
}

/// Read/write pair with an O(1) role exchange.
///
/// Kernels write only into `write`; after each write pass the caller swaps so
/// the next pass reads the update.
pub struct DoubleBuffer<T> {
    pub read: T,
    pub write: T,
}

impl<T> DoubleBuffer<T> {
    pub fn new(read: T, write: T) -> Self {
        Self { read, write }
    }

    pub fn swap(&mut self) {
        std::mem::swap(&mut self.read, &mut self.write);
    }
}

impl DoubleBuffer<RenderTarget> {
    pub fn width(&self) -> u32 {
        self.read.width
    }

    pub fn height(&self) -> u32 {
        self.read.height
    }

    pub fn texel_size(&self) -> [f32; 2] {
        self.read.texel_size()
    }
}

pub fn create_double_buffer(
    ctx: &GpuContext,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    filter: wgpu::FilterMode,
) -> DoubleBuffer<RenderTarget> {
    DoubleBuffer::new(
        RenderTarget::new(ctx, label, width, height, format, filter),
        RenderTarget::new(ctx, label, width, height, format, filter),
    )
}

/// Resize a double buffer, preserving the read side's contents through the
/// copy kernel. No-op when the dimensions are unchanged.
///
/// The write side is reallocated empty: it is overwritten before use.
pub fn resize_double_buffer(
    ctx: &GpuContext,
    copy: Option<&Program>,
    encoder: &mut wgpu::CommandEncoder,
    target: &mut DoubleBuffer<RenderTarget>,
    label: &str,
    width: u32,
    height: u32,
) {
    if target.width() == width && target.height() == height {
        return;
    }

    let format = target.read.format;
    let filter = target.read.filter;
    let new_read = RenderTarget::new(ctx, label, width, height, format, filter);

    let mut preserved = false;
    if let Some(program) = copy {
        if let Some(pipeline) = program.pipeline(format, super::programs::BlendMode::Opaque) {
            let bind_group = program.bind_group(
                &ctx.device,
                None,
                &[(&target.read.view, ctx.sampler_for(filter))],
            );
            blit(encoder, "Resize Copy Pass", pipeline, &bind_group, &new_read.view, false);
            preserved = true;
        }
    }
    if !preserved {
        // The copy kernel failed to compile at startup; contents are lost
        // but the resize still succeeds.
        log::warn!("copy kernel unavailable, resize discards {label} contents");
    }

    target.read = new_read;
    target.write = RenderTarget::new(ctx, label, width, height, format, filter);
}

/// Derive simulation grid dimensions from a base resolution and the surface
/// aspect ratio: the larger screen axis receives `base * aspect`, keeping
/// cells square-ish regardless of aspect.
pub fn grid_resolution(base: u32, surface_width: u32, surface_height: u32) -> (u32, u32) {
    let mut aspect = surface_width as f32 / surface_height as f32;
    if aspect < 1.0 {
        aspect = 1.0 / aspect;
    }

    let min = base;
    let max = (base as f32 * aspect).round() as u32;

    if surface_width > surface_height {
        (max, min)
    } else {
        (min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_permutes_identities() {
        let mut buffer = DoubleBuffer::new(1u32, 2u32);
        buffer.swap();
        assert_eq!(buffer.read, 2);
        assert_eq!(buffer.write, 1);
        buffer.swap();
        assert_eq!(buffer.read, 1);
        assert_eq!(buffer.write, 2);
    }

    #[test]
    fn landscape_maps_larger_axis_to_width() {
        assert_eq!(grid_resolution(128, 2048, 1024), (256, 128));
    }

    #[test]
    fn portrait_maps_larger_axis_to_height() {
        assert_eq!(grid_resolution(128, 1024, 2048), (128, 256));
    }

    #[test]
    fn square_surface_is_square_grid() {
        assert_eq!(grid_resolution(128, 1000, 1000), (128, 128));
    }

    #[test]
    fn non_integer_aspect_rounds() {
        // 1920x1080 is a 16:9 aspect: 128 * 1.777... rounds to 228.
        assert_eq!(grid_resolution(128, 1920, 1080), (228, 128));
    }
}
