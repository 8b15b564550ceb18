//! Kernel program cache.
//!
//! Every kernel is a full-screen render pipeline built from the shared
//! vertex stage concatenated ahead of its fragment source. A `Program` holds
//! one pipeline per (target format, blend mode) it is dispatched against;
//! the display kernel is a `DisplayMaterial` whose feature-flag set selects
//! a lazily compiled variant through a 3-bit index.
//!
//! Compile and link failures are trapped with validation error scopes,
//! logged with their full diagnostic text, and leave the program unusable:
//! later dispatches through it silently render nothing.

use super::context::GpuContext;

const FULLSCREEN_VS: &str = include_str!("../../shaders/fullscreen.wgsl");
const DISPLAY_FS: &str = include_str!("../../shaders/display.wgsl");

/// Blend state a kernel is dispatched with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Overwrite the destination.
    Opaque,
    /// `src + dst`, used by the bloom up-sampling accumulation.
    Additive,
    /// `src + dst * (1 - src.a)`, used by the final composite.
    PremultipliedOver,
}

impl BlendMode {
    fn state(self) -> Option<wgpu::BlendState> {
        match self {
            BlendMode::Opaque => None,
            BlendMode::Additive => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
            }),
            BlendMode::PremultipliedOver => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                    operation: wgpu::BlendOperation::Add,
                },
            }),
        }
    }
}

fn compose_source(header: &str, fragment: &str) -> String {
    format!("{header}{FULLSCREEN_VS}\n{fragment}")
}

/// Bind group layout for a kernel: optional uniform slot at binding 0, then
/// texture/sampler pairs at bindings (1, 2), (3, 4), ...
fn kernel_bind_group_layout(
    device: &wgpu::Device,
    label: &str,
    has_uniforms: bool,
    texture_count: u32,
    filterable: bool,
) -> wgpu::BindGroupLayout {
    let mut entries = Vec::new();
    if has_uniforms {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
    }
    for i in 0..texture_count {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 1 + i * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 2 + i * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(if filterable {
                wgpu::SamplerBindingType::Filtering
            } else {
                wgpu::SamplerBindingType::NonFiltering
            }),
            count: None,
        });
    }

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    })
}

fn kernel_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    label: &str,
    uniforms: Option<&wgpu::Buffer>,
    textures: &[(&wgpu::TextureView, &wgpu::Sampler)],
) -> wgpu::BindGroup {
    let mut entries = Vec::new();
    if let Some(buffer) = uniforms {
        entries.push(wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        });
    }
    for (i, (view, sampler)) in textures.iter().enumerate() {
        entries.push(wgpu::BindGroupEntry {
            binding: 1 + i as u32 * 2,
            resource: wgpu::BindingResource::TextureView(view),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: 2 + i as u32 * 2,
            resource: wgpu::BindingResource::Sampler(sampler),
        });
    }

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &entries,
    })
}

fn create_pipeline(
    device: &wgpu::Device,
    label: &str,
    module: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
    blend: BlendMode,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: blend.state(),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Pop the current validation error scope; logs and returns false on error.
fn finish_error_scope(device: &wgpu::Device, label: &str) -> bool {
    match pollster::block_on(device.pop_error_scope()) {
        None => true,
        Some(error) => {
            log::error!("kernel '{label}' failed to compile: {error}");
            false
        }
    }
}

/// One compiled kernel with pipelines for every target it writes.
pub struct Program {
    label: &'static str,
    layout: wgpu::BindGroupLayout,
    has_uniforms: bool,
    pipelines: Vec<(wgpu::TextureFormat, BlendMode, wgpu::RenderPipeline)>,
}

impl Program {
    /// Compile a kernel. Returns `None` (after logging the diagnostic) when
    /// the shader or any of its pipelines fails validation.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ctx: &GpuContext,
        label: &'static str,
        fragment_source: &str,
        header: &str,
        has_uniforms: bool,
        texture_count: u32,
        targets: &[(wgpu::TextureFormat, BlendMode)],
    ) -> Option<Self> {
        let device = &ctx.device;
        let layout = kernel_bind_group_layout(device, label, has_uniforms, texture_count, ctx.filtering());
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(compose_source(header, fragment_source).into()),
        });

        let mut pipelines: Vec<(wgpu::TextureFormat, BlendMode, wgpu::RenderPipeline)> = Vec::new();
        for &(format, blend) in targets {
            if pipelines.iter().any(|(f, b, _)| *f == format && *b == blend) {
                continue;
            }
            pipelines.push((format, blend, create_pipeline(device, label, &module, &pipeline_layout, format, blend)));
        }

        if !finish_error_scope(device, label) {
            return None;
        }

        Some(Self {
            label,
            layout,
            has_uniforms,
            pipelines,
        })
    }

    pub fn pipeline(&self, format: wgpu::TextureFormat, blend: BlendMode) -> Option<&wgpu::RenderPipeline> {
        self.pipelines
            .iter()
            .find(|(f, b, _)| *f == format && *b == blend)
            .map(|(_, _, pipeline)| pipeline)
    }

    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        uniforms: Option<&wgpu::Buffer>,
        textures: &[(&wgpu::TextureView, &wgpu::Sampler)],
    ) -> wgpu::BindGroup {
        debug_assert_eq!(self.has_uniforms, uniforms.is_some());
        kernel_bind_group(device, &self.layout, self.label, uniforms, textures)
    }
}

/// Record one full-screen pass into `encoder`.
pub fn blit(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
    target: &wgpu::TextureView,
    clear: bool,
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load: if clear {
                    wgpu::LoadOp::Clear(wgpu::Color::BLACK)
                } else {
                    wgpu::LoadOp::Load
                },
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.draw(0..3, 0..1);
}

/// Active feature flags of the display kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayFlags {
    pub shading: bool,
    pub bloom: bool,
    pub sunrays: bool,
}

impl DisplayFlags {
    /// Pack the flags into the variant slot index.
    pub fn index(self) -> usize {
        (self.shading as usize) | (self.bloom as usize) << 1 | (self.sunrays as usize) << 2
    }

    /// WGSL const declarations injected ahead of the display template.
    pub fn wgsl_header(self) -> String {
        format!(
            "const SHADING: bool = {};\nconst BLOOM: bool = {};\nconst SUNRAYS: bool = {};\n",
            self.shading, self.bloom, self.sunrays
        )
    }
}

enum Variant {
    Uncompiled,
    Failed,
    Ready(wgpu::RenderPipeline),
}

/// The display kernel: a fragment template compiled per feature-flag set.
///
/// The flag bitset indexes an 8-slot cache; each distinct combination is
/// compiled lazily on first selection and reused afterwards, so switching
/// variants is O(1) once compiled.
pub struct DisplayMaterial {
    layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
    variants: [Variant; 8],
    active: usize,
}

impl DisplayMaterial {
    pub fn new(ctx: &GpuContext, surface_format: wgpu::TextureFormat) -> Self {
        let layout = kernel_bind_group_layout(&ctx.device, "Display Bind Group Layout", true, 4, ctx.filtering());
        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Display Pipeline Layout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });

        Self {
            layout,
            pipeline_layout,
            format: surface_format,
            variants: std::array::from_fn(|_| Variant::Uncompiled),
            active: 0,
        }
    }

    /// Select (compiling if needed) the variant for the given flag set.
    pub fn set_keywords(&mut self, ctx: &GpuContext, flags: DisplayFlags) {
        let index = flags.index();
        if let Variant::Uncompiled = self.variants[index] {
            self.variants[index] = self.compile(ctx, flags);
        }
        self.active = index;
    }

    fn compile(&self, ctx: &GpuContext, flags: DisplayFlags) -> Variant {
        let device = &ctx.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Display Shader"),
            source: wgpu::ShaderSource::Wgsl(compose_source(&flags.wgsl_header(), DISPLAY_FS).into()),
        });
        let pipeline = create_pipeline(
            device,
            "Display Pipeline",
            &module,
            &self.pipeline_layout,
            self.format,
            BlendMode::PremultipliedOver,
        );
        if finish_error_scope(device, "display") {
            Variant::Ready(pipeline)
        } else {
            Variant::Failed
        }
    }

    /// Pipeline of the active variant, or `None` if it failed to compile.
    pub fn pipeline(&self) -> Option<&wgpu::RenderPipeline> {
        match &self.variants[self.active] {
            Variant::Ready(pipeline) => Some(pipeline),
            _ => None,
        }
    }

    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        uniforms: &wgpu::Buffer,
        textures: &[(&wgpu::TextureView, &wgpu::Sampler)],
    ) -> wgpu::BindGroup {
        kernel_bind_group(device, &self.layout, "Display Bind Group", Some(uniforms), textures)
    }
}

/// Every kernel of the engine, compiled once at startup.
pub struct Programs {
    pub blur: Option<Program>,
    pub copy: Option<Program>,
    pub clear: Option<Program>,
    pub bloom_prefilter: Option<Program>,
    pub bloom_blur: Option<Program>,
    pub bloom_final: Option<Program>,
    pub sunrays_mask: Option<Program>,
    pub sunrays: Option<Program>,
    pub splat: Option<Program>,
    pub advection: Option<Program>,
    pub divergence: Option<Program>,
    pub curl: Option<Program>,
    pub vorticity: Option<Program>,
    pub pressure: Option<Program>,
    pub gradient_subtract: Option<Program>,
    pub display: DisplayMaterial,
}

impl Programs {
    pub fn compile(ctx: &GpuContext, surface_format: wgpu::TextureFormat) -> Self {
        let rgba = ctx.formats.rgba;
        let rg = ctx.formats.rg;
        let r = ctx.formats.r;
        let opaque = BlendMode::Opaque;

        // The advection variant is fixed at startup by the filtering probe.
        let advection_header = format!("const MANUAL_FILTERING: bool = {};\n", !ctx.filtering());

        Self {
            blur: Program::new(ctx, "Blur Kernel", include_str!("../../shaders/blur.wgsl"), "", true, 1, &[(r, opaque)]),
            copy: Program::new(ctx, "Copy Kernel", include_str!("../../shaders/copy.wgsl"), "", false, 1, &[(rgba, opaque), (rg, opaque)]),
            clear: Program::new(ctx, "Clear Kernel", include_str!("../../shaders/clear.wgsl"), "", true, 1, &[(r, opaque)]),
            bloom_prefilter: Program::new(ctx, "Bloom Prefilter Kernel", include_str!("../../shaders/bloom_prefilter.wgsl"), "", true, 1, &[(rgba, opaque)]),
            bloom_blur: Program::new(ctx, "Bloom Blur Kernel", include_str!("../../shaders/bloom_blur.wgsl"), "", true, 1, &[(rgba, opaque), (rgba, BlendMode::Additive)]),
            bloom_final: Program::new(ctx, "Bloom Final Kernel", include_str!("../../shaders/bloom_final.wgsl"), "", true, 1, &[(rgba, opaque)]),
            sunrays_mask: Program::new(ctx, "Sunrays Mask Kernel", include_str!("../../shaders/sunrays_mask.wgsl"), "", false, 1, &[(rgba, opaque)]),
            sunrays: Program::new(ctx, "Sunrays Kernel", include_str!("../../shaders/sunrays.wgsl"), "", true, 1, &[(r, opaque)]),
            splat: Program::new(ctx, "Splat Kernel", include_str!("../../shaders/splat.wgsl"), "", true, 1, &[(rg, opaque), (rgba, opaque)]),
            advection: Program::new(ctx, "Advection Kernel", include_str!("../../shaders/advection.wgsl"), &advection_header, true, 2, &[(rg, opaque), (rgba, opaque)]),
            divergence: Program::new(ctx, "Divergence Kernel", include_str!("../../shaders/divergence.wgsl"), "", true, 1, &[(r, opaque)]),
            curl: Program::new(ctx, "Curl Kernel", include_str!("../../shaders/curl.wgsl"), "", true, 1, &[(r, opaque)]),
            vorticity: Program::new(ctx, "Vorticity Kernel", include_str!("../../shaders/vorticity.wgsl"), "", true, 2, &[(rg, opaque)]),
            pressure: Program::new(ctx, "Pressure Kernel", include_str!("../../shaders/pressure.wgsl"), "", true, 2, &[(r, opaque)]),
            gradient_subtract: Program::new(ctx, "Gradient Subtract Kernel", include_str!("../../shaders/gradient_subtract.wgsl"), "", true, 2, &[(rg, opaque)]),
            display: DisplayMaterial::new(ctx, surface_format),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_bitset_indexes_all_variants() {
        let mut seen = [false; 8];
        for shading in [false, true] {
            for bloom in [false, true] {
                for sunrays in [false, true] {
                    let flags = DisplayFlags { shading, bloom, sunrays };
                    let index = flags.index();
                    assert!(index < 8);
                    assert!(!seen[index], "index {index} assigned twice");
                    seen[index] = true;
                }
            }
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn wgsl_header_declares_each_flag() {
        let header = DisplayFlags { shading: true, bloom: false, sunrays: true }.wgsl_header();
        assert!(header.contains("const SHADING: bool = true;"));
        assert!(header.contains("const BLOOM: bool = false;"));
        assert!(header.contains("const SUNRAYS: bool = true;"));
    }

    #[test]
    fn composed_source_keeps_header_ahead_of_vertex_stage() {
        let source = compose_source("const MANUAL_FILTERING: bool = true;\n", "@fragment fn fs_main() {}");
        let header_at = source.find("MANUAL_FILTERING").unwrap();
        let vertex_at = source.find("vs_main").unwrap();
        assert!(header_at < vertex_at);
    }
}
