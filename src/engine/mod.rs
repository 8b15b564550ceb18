//! The fluid engine: a grid-based incompressible-flow solver running
//! entirely as a sequence of GPU kernels over double-buffered render
//! targets, composited through bloom and sunrays passes into the displayed
//! image.
//!
//! All state lives in one owned [`FluidEngine`] instance; multiple engines
//! can coexist on the same device.

pub mod compositor;
pub mod context;
pub mod fields;
pub mod pointer;
pub mod postfx;
pub mod programs;
pub mod splat;
pub mod stepper;
pub mod targets;

use glam::Vec2;
use rand::Rng;

use crate::config::FluidConfig;
use crate::error::EngineError;

use compositor::DitherTexture;
use context::{FormatProbe, GpuContext};
use fields::Fields;
use pointer::{generate_color, wrap, Pointer};
use programs::{blit, BlendMode, DisplayFlags, Program, Programs};

/// Longest simulation timestep; wall-clock frames slower than this are
/// clamped rather than integrated in one jump.
const MAX_DELTA_TIME: f32 = 0.016666;

/// Force quality features off when linear filtering is unavailable.
fn degrade_for_missing_filtering(config: &mut FluidConfig) {
    config.dye_resolution = config.dye_resolution.min(512);
    config.shading = false;
    config.bloom = false;
    config.sunrays = false;
}

/// One fluid simulation with all of its GPU state.
pub struct FluidEngine {
    ctx: GpuContext,
    programs: Programs,
    fields: Option<Fields>,
    dither: DitherTexture,
    pointers: Vec<Pointer>,
    splat_queue: Vec<u32>,
    config: FluidConfig,
    surface_size: (u32, u32),
    tracked_surface_size: (u32, u32),
    color_timer: f32,
    last_update: std::time::Instant,
    active: bool,
}

impl FluidEngine {
    /// Bring the engine up on an already-configured surface: negotiate
    /// formats, compile kernels, allocate every field target, and queue the
    /// initial burst of random splats.
    pub fn start(
        device: wgpu::Device,
        queue: wgpu::Queue,
        probe: &dyn FormatProbe,
        surface_format: wgpu::TextureFormat,
        surface_size: (u32, u32),
        mut config: FluidConfig,
    ) -> Result<Self, EngineError> {
        let ctx = GpuContext::new(device, queue, probe);
        if !ctx.filtering() {
            degrade_for_missing_filtering(&mut config);
        }

        let mut programs = Programs::compile(&ctx, surface_format);
        programs.display.set_keywords(
            &ctx,
            DisplayFlags {
                shading: config.shading,
                bloom: config.bloom,
                sunrays: config.sunrays,
            },
        );

        let fields = Fields::create(&ctx, &config, surface_size);
        let dither = DitherTexture::load(&ctx)?;

        let mut rng = rand::thread_rng();
        let pointer_color = if config.colorful {
            generate_color(&mut rng)
        } else {
            config.pointer_color
        };

        Ok(Self {
            ctx,
            programs,
            fields: Some(fields),
            dither,
            pointers: vec![Pointer::new(pointer_color)],
            splat_queue: vec![rng.gen_range(5..25)],
            config,
            surface_size,
            tracked_surface_size: surface_size,
            color_timer: 0.0,
            last_update: std::time::Instant::now(),
            active: true,
        })
    }

    /// Stop the engine and release every field target. Safe to call twice.
    pub fn destroy(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.fields = None;
        self.splat_queue.clear();
        log::info!("fluid engine destroyed");
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn config(&self) -> &FluidConfig {
        &self.config
    }

    /// Refresh the display kernel variant after a feature toggle changed.
    pub fn update_feature_flags(&mut self) {
        self.programs.display.set_keywords(
            &self.ctx,
            DisplayFlags {
                shading: self.config.shading,
                bloom: self.config.bloom,
                sunrays: self.config.sunrays,
            },
        );
    }

    /// Rebuild all render targets from the current configuration and surface
    /// size, preserving the dye and velocity read sides.
    pub fn reallocate_framebuffers(&mut self) {
        let Some(fields) = &mut self.fields else {
            return;
        };
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Reallocate Encoder"),
            });
        fields.reallocate(
            &self.ctx,
            self.programs.copy.as_ref(),
            &self.config,
            self.surface_size,
            &mut encoder,
        );
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Queue `count` randomly placed, colored and directed splats for the
    /// next frame. The sole programmatic input besides the pointer.
    pub fn inject_random_splats(&mut self, count: u32) {
        self.splat_queue.push(count);
    }

    /// Feed a pointer move event in physical surface pixels.
    pub fn pointer_move(&mut self, x: f32, y: f32) {
        let (width, height) = self.surface_size;
        if let Some(pointer) = self.pointers.first_mut() {
            pointer.update_move(Vec2::new(x, y), width, height);
        }
    }

    /// Record the live surface size; the mismatch with the cached size is
    /// picked up at the start of the next frame.
    pub fn resize_surface(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.surface_size = (width, height);
        }
    }

    /// Apply a new configuration snapshot, routing resolution changes to a
    /// reallocation and feature toggles to a kernel-variant refresh.
    pub fn apply_config(&mut self, new: FluidConfig) {
        let mut new = new;
        if !self.ctx.filtering() {
            degrade_for_missing_filtering(&mut new);
        }
        let delta = self.config.delta(&new);
        self.config = new;
        if delta.framebuffers {
            self.reallocate_framebuffers();
        }
        if delta.keywords {
            self.update_feature_flags();
        }
    }

    /// Run one frame: resize check, color cycling, input drain, solver step
    /// (unless paused), post-processing and composite into `view`. All
    /// kernel dispatches are recorded into a single encoder and submitted
    /// once; the calling thread never waits on their completion.
    pub fn frame(&mut self, view: &wgpu::TextureView) {
        if !self.active {
            return;
        }

        let dt = self.calc_delta_time();

        if self.surface_size != self.tracked_surface_size {
            self.tracked_surface_size = self.surface_size;
            self.reallocate_framebuffers();
        }

        self.update_colors(dt);

        let Some(mut fields) = self.fields.take() else {
            return;
        };

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Fluid Frame Encoder"),
            });

        self.apply_inputs(&mut fields, &mut encoder);
        if !self.config.paused {
            self.step(dt, &mut fields, &mut encoder);
        }
        self.render(&fields, view, &mut encoder);

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        self.fields = Some(fields);
    }

    fn calc_delta_time(&mut self) -> f32 {
        let now = std::time::Instant::now();
        let dt = now.duration_since(self.last_update).as_secs_f32();
        self.last_update = now;
        dt.min(MAX_DELTA_TIME)
    }

    fn update_colors(&mut self, dt: f32) {
        if !self.config.colorful {
            return;
        }
        self.color_timer += dt * self.config.color_update_speed;
        if self.color_timer >= 1.0 {
            self.color_timer = wrap(self.color_timer, 0.0, 1.0);
            let mut rng = rand::thread_rng();
            for pointer in &mut self.pointers {
                pointer.color = generate_color(&mut rng);
            }
        }
    }

    /// Record one kernel pass. Skips silently when the program or its
    /// pipeline for this target is unavailable.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn dispatch(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        label: &str,
        program: Option<&Program>,
        uniforms: Option<&[u8]>,
        textures: &[(&wgpu::TextureView, &wgpu::Sampler)],
        target: &wgpu::TextureView,
        format: wgpu::TextureFormat,
        blend: BlendMode,
    ) {
        let Some(program) = program else {
            return;
        };
        let Some(pipeline) = program.pipeline(format, blend) else {
            log::debug!("no pipeline for '{label}' targeting {format:?}");
            return;
        };
        let params = uniforms.map(|bytes| self.ctx.uniform_buffer(bytes));
        let bind_group = program.bind_group(&self.ctx.device, params.as_ref(), textures);
        blit(encoder, label, pipeline, &bind_group, target, false);
    }
}
