//! Splat injection: pointer motion and queued random requests become
//! localized Gaussian impulses in the velocity and dye fields.

use bytemuck::{Pod, Zeroable};
use rand::Rng;

use super::fields::Fields;
use super::pointer::generate_color;
use super::programs::BlendMode;
use super::FluidEngine;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct SplatParams {
    point: [f32; 2],
    aspect_ratio: f32,
    radius: f32,
    color: [f32; 3],
    _pad: f32,
}

/// Widen the radius on landscape surfaces so the splat reads circular.
pub fn correct_radius(radius: f32, aspect: f32) -> f32 {
    if aspect > 1.0 {
        radius * aspect
    } else {
        radius
    }
}

impl FluidEngine {
    /// Drain the pending random-splat requests and pointer motion collected
    /// since the last frame.
    pub(crate) fn apply_inputs(&mut self, fields: &mut Fields, encoder: &mut wgpu::CommandEncoder) {
        for count in std::mem::take(&mut self.splat_queue) {
            self.multiple_splats(count, fields, encoder);
        }

        let moved: Vec<_> = self
            .pointers
            .iter_mut()
            .filter(|p| p.moved)
            .map(|p| {
                p.moved = false;
                (p.texcoord, p.delta, p.color)
            })
            .collect();

        for (position, delta, color) in moved {
            let force = delta * self.config.splat_force;
            self.splat(fields, encoder, position.x, position.y, force.x, force.y, color);
        }
    }

    /// Expand one random request into `count` independent splats, colors
    /// intensified 10x over the ambient palette.
    fn multiple_splats(&self, count: u32, fields: &mut Fields, encoder: &mut wgpu::CommandEncoder) {
        let mut rng = rand::thread_rng();
        for _ in 0..count {
            let mut color = generate_color(&mut rng);
            for channel in &mut color {
                *channel *= 10.0;
            }
            let x = rng.gen::<f32>();
            let y = rng.gen::<f32>();
            let dx = 1000.0 * (rng.gen::<f32>() - 0.5);
            let dy = 1000.0 * (rng.gen::<f32>() - 0.5);
            self.splat(fields, encoder, x, y, dx, dy, color);
        }
    }

    /// Additively blend a Gaussian force impulse into velocity, then the
    /// supplied color into dye at the same location.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn splat(
        &self,
        fields: &mut Fields,
        encoder: &mut wgpu::CommandEncoder,
        x: f32,
        y: f32,
        dx: f32,
        dy: f32,
        color: [f32; 3],
    ) {
        let (width, height) = self.surface_size;
        let aspect = width as f32 / height as f32;
        let radius = correct_radius(self.config.splat_radius / 100.0, aspect);

        let velocity_params = SplatParams {
            point: [x, y],
            aspect_ratio: aspect,
            radius,
            color: [dx, dy, 0.0],
            _pad: 0.0,
        };
        self.dispatch(
            encoder,
            "Splat Velocity Pass",
            self.programs.splat.as_ref(),
            Some(bytemuck::bytes_of(&velocity_params)),
            &[(
                &fields.velocity.read.view,
                self.ctx.sampler_for(fields.velocity.read.filter),
            )],
            &fields.velocity.write.view,
            fields.velocity.write.format,
            BlendMode::Opaque,
        );
        fields.velocity.swap();

        let dye_params = SplatParams {
            point: [x, y],
            aspect_ratio: aspect,
            radius,
            color,
            _pad: 0.0,
        };
        self.dispatch(
            encoder,
            "Splat Dye Pass",
            self.programs.splat.as_ref(),
            Some(bytemuck::bytes_of(&dye_params)),
            &[(
                &fields.dye.read.view,
                self.ctx.sampler_for(fields.dye.read.filter),
            )],
            &fields.dye.write.view,
            fields.dye.write.format,
            BlendMode::Opaque,
        );
        fields.dye.swap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_widens_on_landscape_only() {
        assert!((correct_radius(0.0025, 2.0) - 0.005).abs() < 1e-7);
        assert!((correct_radius(0.0025, 1.0) - 0.0025).abs() < 1e-7);
        assert!((correct_radius(0.0025, 0.5) - 0.0025).abs() < 1e-7);
    }

    #[test]
    fn splat_params_layout_matches_shader() {
        // point(8) + aspect(4) + radius(4) + color(12) + pad(4) = 32 bytes.
        assert_eq!(std::mem::size_of::<SplatParams>(), 32);
    }
}
