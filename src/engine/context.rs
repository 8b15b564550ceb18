//! GPU context and render-target format negotiation.
//!
//! Formats are negotiated once at startup by probing the adapter for
//! render-attachment support, walking each class down in channel count with
//! an always-supported 8-bit tail. Linear filterability is probed separately
//! and gates every quality feature that depends on it.

use wgpu::util::DeviceExt;

/// Capability probe for render-target formats.
///
/// Abstracted from `wgpu::Adapter` so the fallback chains can be exercised
/// without a GPU.
pub trait FormatProbe {
    /// Whether the format can be used as a render attachment.
    fn supports_render(&self, format: wgpu::TextureFormat) -> bool;
    /// Whether the format can be sampled with linear filtering.
    fn supports_filtering(&self, format: wgpu::TextureFormat) -> bool;
}

impl FormatProbe for wgpu::Adapter {
    fn supports_render(&self, format: wgpu::TextureFormat) -> bool {
        self.get_texture_format_features(format)
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
    }

    fn supports_filtering(&self, format: wgpu::TextureFormat) -> bool {
        self.get_texture_format_features(format)
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE)
    }
}

/// Formats resolved for the three render-target classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedFormats {
    /// Dye and bloom targets.
    pub rgba: wgpu::TextureFormat,
    /// Velocity targets.
    pub rg: wgpu::TextureFormat,
    /// Pressure, divergence, curl and sunrays targets.
    pub r: wgpu::TextureFormat,
    /// Whether the negotiated formats support linear filtering.
    pub linear_filtering: bool,
}

/// Walk a fallback chain, returning the first format the probe accepts as a
/// render attachment. The last entry is the 8-bit tail and is returned
/// unconditionally.
pub fn supported_format(
    probe: &dyn FormatProbe,
    candidates: &[wgpu::TextureFormat],
) -> wgpu::TextureFormat {
    for &format in &candidates[..candidates.len() - 1] {
        if probe.supports_render(format) {
            return format;
        }
    }
    candidates[candidates.len() - 1]
}

/// Negotiate all three format classes plus the filtering capability.
pub fn negotiate_formats(probe: &dyn FormatProbe) -> NegotiatedFormats {
    use wgpu::TextureFormat::{R16Float, R8Unorm, Rg16Float, Rg8Unorm, Rgba16Float, Rgba8Unorm};

    let rgba = supported_format(probe, &[Rgba16Float, Rg16Float, R16Float, Rgba8Unorm]);
    let rg = supported_format(probe, &[Rg16Float, R16Float, Rg8Unorm]);
    let r = supported_format(probe, &[R16Float, R8Unorm]);

    let linear_filtering = probe.supports_filtering(rgba)
        && probe.supports_filtering(rg)
        && probe.supports_filtering(r);

    NegotiatedFormats {
        rgba,
        rg,
        r,
        linear_filtering,
    }
}

/// Owned GPU handles plus the capabilities resolved at startup.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub formats: NegotiatedFormats,
    linear_sampler: wgpu::Sampler,
    nearest_sampler: wgpu::Sampler,
    dither_sampler: wgpu::Sampler,
}

impl GpuContext {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, probe: &dyn FormatProbe) -> Self {
        let formats = negotiate_formats(probe);
        log::info!(
            "negotiated render target formats: rgba={:?} rg={:?} r={:?} linear_filtering={}",
            formats.rgba,
            formats.rg,
            formats.r,
            formats.linear_filtering
        );

        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Linear Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let nearest_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Nearest Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        // The dithering texture tiles across the screen.
        let dither_filter = if formats.linear_filtering {
            wgpu::FilterMode::Linear
        } else {
            wgpu::FilterMode::Nearest
        };
        let dither_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Dither Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: dither_filter,
            min_filter: dither_filter,
            ..Default::default()
        });

        Self {
            device,
            queue,
            formats,
            linear_sampler,
            nearest_sampler,
            dither_sampler,
        }
    }

    /// Whether linear filtering of the negotiated formats is available.
    pub fn filtering(&self) -> bool {
        self.formats.linear_filtering
    }

    pub fn sampler_for(&self, filter: wgpu::FilterMode) -> &wgpu::Sampler {
        match filter {
            wgpu::FilterMode::Linear => &self.linear_sampler,
            wgpu::FilterMode::Nearest => &self.nearest_sampler,
        }
    }

    pub fn dither_sampler(&self) -> &wgpu::Sampler {
        &self.dither_sampler
    }

    /// Filter mode for field targets, honoring the filtering capability.
    pub fn field_filter(&self) -> wgpu::FilterMode {
        if self.filtering() {
            wgpu::FilterMode::Linear
        } else {
            wgpu::FilterMode::Nearest
        }
    }

    /// Small one-shot uniform buffer for a single kernel dispatch.
    pub fn uniform_buffer(&self, contents: &[u8]) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Kernel Params Buffer"),
                contents,
                usage: wgpu::BufferUsages::UNIFORM,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::TextureFormat::{R16Float, R8Unorm, Rg16Float, Rg8Unorm, Rgba16Float, Rgba8Unorm};

    struct MockProbe {
        renderable: Vec<wgpu::TextureFormat>,
        filterable: Vec<wgpu::TextureFormat>,
    }

    impl FormatProbe for MockProbe {
        fn supports_render(&self, format: wgpu::TextureFormat) -> bool {
            self.renderable.contains(&format)
        }
        fn supports_filtering(&self, format: wgpu::TextureFormat) -> bool {
            self.filterable.contains(&format)
        }
    }

    #[test]
    fn all_half_float_formats_accepted() {
        let probe = MockProbe {
            renderable: vec![Rgba16Float, Rg16Float, R16Float],
            filterable: vec![Rgba16Float, Rg16Float, R16Float],
        };
        let formats = negotiate_formats(&probe);
        assert_eq!(formats.rgba, Rgba16Float);
        assert_eq!(formats.rg, Rg16Float);
        assert_eq!(formats.r, R16Float);
        assert!(formats.linear_filtering);
    }

    #[test]
    fn fallback_terminates_at_single_channel() {
        // Rejects 4- and 2-channel, accepts 1-channel: the RGBA chain must
        // stop at R16Float without reaching the 8-bit tail.
        let probe = MockProbe {
            renderable: vec![R16Float],
            filterable: vec![],
        };
        let formats = negotiate_formats(&probe);
        assert_eq!(formats.rgba, R16Float);
        assert_eq!(formats.rg, R16Float);
        assert_eq!(formats.r, R16Float);
        assert!(!formats.linear_filtering);
    }

    #[test]
    fn fallback_reaches_eight_bit_tail() {
        // Nothing renderable at all: every chain lands on its 8-bit tail.
        let probe = MockProbe {
            renderable: vec![],
            filterable: vec![],
        };
        let formats = negotiate_formats(&probe);
        assert_eq!(formats.rgba, Rgba8Unorm);
        assert_eq!(formats.rg, Rg8Unorm);
        assert_eq!(formats.r, R8Unorm);
    }

    #[test]
    fn filtering_requires_every_class() {
        let probe = MockProbe {
            renderable: vec![Rgba16Float, Rg16Float, R16Float],
            filterable: vec![Rgba16Float, Rg16Float],
        };
        assert!(!negotiate_formats(&probe).linear_filtering);
    }
}
