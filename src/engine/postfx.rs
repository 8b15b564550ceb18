//! Post-processing: bloom extraction/blur/accumulate and the sunrays
//! light-shaft passes.

use bytemuck::{Pod, Zeroable};

use super::fields::Fields;
use super::programs::BlendMode;
use super::targets::RenderTarget;
use super::FluidEngine;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct PrefilterParams {
    curve: [f32; 3],
    threshold: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct BloomBlurParams {
    texel_size: [f32; 2],
    _pad: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct BloomFinalParams {
    texel_size: [f32; 2],
    intensity: f32,
    _pad: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct SunraysParams {
    weight: f32,
    _pad: [f32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct BlurParams {
    direction: [f32; 2],
    _pad: [f32; 2],
}

/// Soft-knee prefilter coefficients: quadratic response within the knee,
/// linear above the threshold.
pub fn prefilter_curve(threshold: f32, soft_knee: f32) -> [f32; 3] {
    let knee = threshold * soft_knee + 0.0001;
    [threshold - knee, knee * 2.0, 0.25 / knee]
}

impl FluidEngine {
    /// Extract, blur down, accumulate up. Skipped entirely when the chain
    /// has fewer than two targets.
    pub(crate) fn apply_bloom(&self, fields: &Fields, encoder: &mut wgpu::CommandEncoder) {
        if fields.bloom_mips.len() < 2 {
            return;
        }

        let prefilter_params = PrefilterParams {
            curve: prefilter_curve(self.config.bloom_threshold, self.config.bloom_soft_knee),
            threshold: self.config.bloom_threshold,
        };
        self.dispatch(
            encoder,
            "Bloom Prefilter Pass",
            self.programs.bloom_prefilter.as_ref(),
            Some(bytemuck::bytes_of(&prefilter_params)),
            &[(
                &fields.dye.read.view,
                self.ctx.sampler_for(fields.dye.read.filter),
            )],
            &fields.bloom.view,
            fields.bloom.format,
            BlendMode::Opaque,
        );

        // Down-sampling chain.
        let mut last = &fields.bloom;
        for mip in &fields.bloom_mips {
            let params = BloomBlurParams {
                texel_size: last.texel_size(),
                _pad: [0.0; 2],
            };
            self.dispatch(
                encoder,
                "Bloom Downsample Pass",
                self.programs.bloom_blur.as_ref(),
                Some(bytemuck::bytes_of(&params)),
                &[(&last.view, self.ctx.sampler_for(last.filter))],
                &mip.view,
                mip.format,
                BlendMode::Opaque,
            );
            last = mip;
        }

        // Up-sampling accumulation, additively blended back up the chain.
        for mip in fields.bloom_mips.iter().rev().skip(1) {
            let params = BloomBlurParams {
                texel_size: last.texel_size(),
                _pad: [0.0; 2],
            };
            self.dispatch(
                encoder,
                "Bloom Upsample Pass",
                self.programs.bloom_blur.as_ref(),
                Some(bytemuck::bytes_of(&params)),
                &[(&last.view, self.ctx.sampler_for(last.filter))],
                &mip.view,
                mip.format,
                BlendMode::Additive,
            );
            last = mip;
        }

        let final_params = BloomFinalParams {
            texel_size: last.texel_size(),
            intensity: self.config.bloom_intensity,
            _pad: 0.0,
        };
        self.dispatch(
            encoder,
            "Bloom Final Pass",
            self.programs.bloom_final.as_ref(),
            Some(bytemuck::bytes_of(&final_params)),
            &[(&last.view, self.ctx.sampler_for(last.filter))],
            &fields.bloom.view,
            fields.bloom.format,
            BlendMode::Opaque,
        );
    }

    /// Mask pass into the dye write side (used purely as scratch, no swap),
    /// then the radial march into the sunrays target.
    pub(crate) fn apply_sunrays(&self, fields: &Fields, encoder: &mut wgpu::CommandEncoder) {
        self.dispatch(
            encoder,
            "Sunrays Mask Pass",
            self.programs.sunrays_mask.as_ref(),
            None,
            &[(
                &fields.dye.read.view,
                self.ctx.sampler_for(fields.dye.read.filter),
            )],
            &fields.dye.write.view,
            fields.dye.write.format,
            BlendMode::Opaque,
        );

        let params = SunraysParams {
            weight: self.config.sunrays_weight,
            _pad: [0.0; 3],
        };
        self.dispatch(
            encoder,
            "Sunrays Pass",
            self.programs.sunrays.as_ref(),
            Some(bytemuck::bytes_of(&params)),
            &[(
                &fields.dye.write.view,
                self.ctx.sampler_for(fields.dye.write.filter),
            )],
            &fields.sunrays.view,
            fields.sunrays.format,
            BlendMode::Opaque,
        );
    }

    /// Two-pass separable box blur, ping-ponging through `temp`.
    pub(crate) fn blur_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &RenderTarget,
        temp: &RenderTarget,
        iterations: u32,
    ) {
        let texel_size = target.texel_size();
        for _ in 0..iterations {
            let horizontal = BlurParams {
                direction: [texel_size[0], 0.0],
                _pad: [0.0; 2],
            };
            self.dispatch(
                encoder,
                "Blur Horizontal Pass",
                self.programs.blur.as_ref(),
                Some(bytemuck::bytes_of(&horizontal)),
                &[(&target.view, self.ctx.sampler_for(target.filter))],
                &temp.view,
                temp.format,
                BlendMode::Opaque,
            );

            let vertical = BlurParams {
                direction: [0.0, texel_size[1]],
                _pad: [0.0; 2],
            };
            self.dispatch(
                encoder,
                "Blur Vertical Pass",
                self.programs.blur.as_ref(),
                Some(bytemuck::bytes_of(&vertical)),
                &[(&temp.view, self.ctx.sampler_for(temp.filter))],
                &target.view,
                target.format,
                BlendMode::Opaque,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_matches_soft_knee_shape() {
        let curve = prefilter_curve(0.6, 0.7);
        let knee = 0.6 * 0.7 + 0.0001;
        assert!((curve[0] - (0.6 - knee)).abs() < 1e-6);
        assert!((curve[1] - knee * 2.0).abs() < 1e-6);
        assert!((curve[2] - 0.25 / knee).abs() < 1e-6);
    }

    #[test]
    fn zero_knee_stays_finite() {
        let curve = prefilter_curve(0.6, 0.0);
        assert!(curve[2].is_finite());
    }
}
