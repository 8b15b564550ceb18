//! Final composite: dye modulated by optional shading, sunrays and dithered
//! bloom, drawn over a black clear with premultiplied-style blending.

use bytemuck::{Pod, Zeroable};

use super::fields::Fields;
use super::FluidEngine;
use crate::error::EngineError;

/// The embedded 64x64 tiling noise texture used to mask bloom banding.
static DITHERING_PNG: &[u8] = include_bytes!("../../assets/dithering.png");

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct DisplayParams {
    texel_size: [f32; 2],
    dither_scale: [f32; 2],
}

/// Tiling factor so the noise stays 1:1 with screen pixels.
pub fn dither_scale(texture_size: (u32, u32), width: u32, height: u32) -> [f32; 2] {
    [
        width as f32 / texture_size.0 as f32,
        height as f32 / texture_size.1 as f32,
    ]
}

/// The one static texture asset, decoded from the embedded PNG at startup.
pub struct DitherTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl DitherTexture {
    pub fn load(ctx: &super::context::GpuContext) -> Result<Self, EngineError> {
        let image = image::load_from_memory(DITHERING_PNG)?.to_rgba8();
        let (width, height) = image.dimensions();

        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Dithering Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            texture,
            view,
            width,
            height,
        })
    }
}

impl FluidEngine {
    /// Run the enabled post passes, then draw the composite into `view`.
    pub(crate) fn render(
        &self,
        fields: &Fields,
        view: &wgpu::TextureView,
        encoder: &mut wgpu::CommandEncoder,
    ) {
        if self.config.bloom {
            self.apply_bloom(fields, encoder);
        }
        if self.config.sunrays {
            self.apply_sunrays(fields, encoder);
            self.blur_pass(encoder, &fields.sunrays, &fields.sunrays_temp, 1);
        }
        self.draw_display(fields, view, encoder);
    }

    fn draw_display(
        &self,
        fields: &Fields,
        view: &wgpu::TextureView,
        encoder: &mut wgpu::CommandEncoder,
    ) {
        let (width, height) = self.surface_size;
        let params = DisplayParams {
            texel_size: [1.0 / width as f32, 1.0 / height as f32],
            dither_scale: dither_scale((self.dither.width, self.dither.height), width, height),
        };

        // Every texture is bound regardless of the active variant; disabled
        // features simply never sample theirs.
        let field_sampler = self.ctx.sampler_for(self.ctx.field_filter());
        let uniforms = self.ctx.uniform_buffer(bytemuck::bytes_of(&params));
        let bind_group = self.programs.display.bind_group(
            &self.ctx.device,
            &uniforms,
            &[
                (&fields.dye.read.view, field_sampler),
                (&fields.bloom.view, field_sampler),
                (&fields.sunrays.view, field_sampler),
                (&self.dither.view, self.ctx.dither_sampler()),
            ],
        );

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Display Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        // A failed display variant still clears the frame to black.
        if let Some(pipeline) = self.programs.display.pipeline() {
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dither_tiles_at_screen_resolution() {
        let scale = dither_scale((64, 64), 1920, 1080);
        assert!((scale[0] - 30.0).abs() < 1e-6);
        assert!((scale[1] - 16.875).abs() < 1e-6);
    }

    #[test]
    fn embedded_png_decodes() {
        let image = image::load_from_memory(DITHERING_PNG).expect("embedded PNG must decode");
        assert_eq!(image.width(), 64);
        assert_eq!(image.height(), 64);
    }
}
