//! The per-frame solve: a fixed-order sequence of kernel dispatches, each
//! stage reading the most recent `read` side of its inputs and swapping
//! immediately after writing.

use bytemuck::{Pod, Zeroable};

use super::fields::Fields;
use super::programs::BlendMode;
use super::FluidEngine;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct TexelParams {
    texel_size: [f32; 2],
    _pad: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct VorticityParams {
    texel_size: [f32; 2],
    curl: f32,
    dt: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct ClearParams {
    value: f32,
    _pad: [f32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct AdvectionParams {
    texel_size: [f32; 2],
    dye_texel_size: [f32; 2],
    dt: f32,
    dissipation: f32,
    _pad: [f32; 2],
}

impl FluidEngine {
    pub(crate) fn step(&self, dt: f32, fields: &mut Fields, encoder: &mut wgpu::CommandEncoder) {
        let texel_size = fields.velocity.texel_size();
        let texel_params = TexelParams {
            texel_size,
            _pad: [0.0; 2],
        };

        // Curl of the velocity field into its scratch target.
        self.dispatch(
            encoder,
            "Curl Pass",
            self.programs.curl.as_ref(),
            Some(bytemuck::bytes_of(&texel_params)),
            &[(
                &fields.velocity.read.view,
                self.ctx.sampler_for(fields.velocity.read.filter),
            )],
            &fields.curl.view,
            fields.curl.format,
            BlendMode::Opaque,
        );

        // Vorticity confinement feeds the curl back into velocity.
        let vorticity_params = VorticityParams {
            texel_size,
            curl: self.config.curl,
            dt,
        };
        self.dispatch(
            encoder,
            "Vorticity Pass",
            self.programs.vorticity.as_ref(),
            Some(bytemuck::bytes_of(&vorticity_params)),
            &[
                (
                    &fields.velocity.read.view,
                    self.ctx.sampler_for(fields.velocity.read.filter),
                ),
                (&fields.curl.view, self.ctx.sampler_for(fields.curl.filter)),
            ],
            &fields.velocity.write.view,
            fields.velocity.write.format,
            BlendMode::Opaque,
        );
        fields.velocity.swap();

        // Divergence is recomputed from scratch; no swap needed.
        self.dispatch(
            encoder,
            "Divergence Pass",
            self.programs.divergence.as_ref(),
            Some(bytemuck::bytes_of(&texel_params)),
            &[(
                &fields.velocity.read.view,
                self.ctx.sampler_for(fields.velocity.read.filter),
            )],
            &fields.divergence.view,
            fields.divergence.format,
            BlendMode::Opaque,
        );

        // Decay the previous pressure instead of resetting it, warm-starting
        // the relaxation from the prior frame's solution.
        let clear_params = ClearParams {
            value: self.config.pressure,
            _pad: [0.0; 3],
        };
        self.dispatch(
            encoder,
            "Pressure Decay Pass",
            self.programs.clear.as_ref(),
            Some(bytemuck::bytes_of(&clear_params)),
            &[(
                &fields.pressure.read.view,
                self.ctx.sampler_for(fields.pressure.read.filter),
            )],
            &fields.pressure.write.view,
            fields.pressure.write.format,
            BlendMode::Opaque,
        );
        fields.pressure.swap();

        // Jacobi relaxation; every iteration reads the just-swapped result.
        for _ in 0..self.config.pressure_iterations {
            self.dispatch(
                encoder,
                "Pressure Pass",
                self.programs.pressure.as_ref(),
                Some(bytemuck::bytes_of(&texel_params)),
                &[
                    (
                        &fields.pressure.read.view,
                        self.ctx.sampler_for(fields.pressure.read.filter),
                    ),
                    (
                        &fields.divergence.view,
                        self.ctx.sampler_for(fields.divergence.filter),
                    ),
                ],
                &fields.pressure.write.view,
                fields.pressure.write.format,
                BlendMode::Opaque,
            );
            fields.pressure.swap();
        }

        // Project out the divergent component.
        self.dispatch(
            encoder,
            "Gradient Subtract Pass",
            self.programs.gradient_subtract.as_ref(),
            Some(bytemuck::bytes_of(&texel_params)),
            &[
                (
                    &fields.pressure.read.view,
                    self.ctx.sampler_for(fields.pressure.read.filter),
                ),
                (
                    &fields.velocity.read.view,
                    self.ctx.sampler_for(fields.velocity.read.filter),
                ),
            ],
            &fields.velocity.write.view,
            fields.velocity.write.format,
            BlendMode::Opaque,
        );
        fields.velocity.swap();

        // Velocity advects itself, then the dye.
        let velocity_advection = AdvectionParams {
            texel_size,
            dye_texel_size: texel_size,
            dt,
            dissipation: self.config.velocity_dissipation,
            _pad: [0.0; 2],
        };
        let velocity_sampler = self.ctx.sampler_for(fields.velocity.read.filter);
        self.dispatch(
            encoder,
            "Velocity Advection Pass",
            self.programs.advection.as_ref(),
            Some(bytemuck::bytes_of(&velocity_advection)),
            &[
                (&fields.velocity.read.view, velocity_sampler),
                (&fields.velocity.read.view, velocity_sampler),
            ],
            &fields.velocity.write.view,
            fields.velocity.write.format,
            BlendMode::Opaque,
        );
        fields.velocity.swap();

        let dye_advection = AdvectionParams {
            texel_size,
            dye_texel_size: fields.dye.texel_size(),
            dt,
            dissipation: self.config.density_dissipation,
            _pad: [0.0; 2],
        };
        self.dispatch(
            encoder,
            "Dye Advection Pass",
            self.programs.advection.as_ref(),
            Some(bytemuck::bytes_of(&dye_advection)),
            &[
                (
                    &fields.velocity.read.view,
                    self.ctx.sampler_for(fields.velocity.read.filter),
                ),
                (
                    &fields.dye.read.view,
                    self.ctx.sampler_for(fields.dye.read.filter),
                ),
            ],
            &fields.dye.write.view,
            fields.dye.write.format,
            BlendMode::Opaque,
        );
        fields.dye.swap();
    }
}
