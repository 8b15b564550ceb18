//! # Dark Fluid: GPU Fluid Simulation Background Effect
//!
//! A real-time, GPU-resident incompressible-flow solver rendered as a
//! full-window background effect. Velocity, pressure and dye fields live in
//! double-buffered render targets and are advanced by a fixed sequence of
//! full-screen kernels each frame, then composited through bloom and
//! sunrays post passes into the displayed image.
//!
//! ## Architecture Overview
//!
//! - [`engine::FluidEngine`] - one owned instance holding all GPU state:
//!   negotiated formats, compiled kernels, field targets, pointer state
//! - [`engine::targets`] - render-target allocation, double buffering and
//!   aspect-aware resolution derivation
//! - [`engine::programs`] - the kernel cache: one pipeline per target
//!   format, feature-flag variants of the display kernel
//! - [`engine::stepper`] - the per-frame solve (curl, vorticity
//!   confinement, pressure projection, advection)
//! - [`engine::splat`] - pointer and random Gaussian impulse injection
//! - [`engine::postfx`] / [`engine::compositor`] - bloom, sunrays and the
//!   final composite
//! - [`app`] - winit host shell embedding the engine
//!
//! ## Dependencies
//!
//! - **Graphics**: `wgpu` (GPU abstraction), `winit` (windowing)
//! - **Math**: `glam` (vector math), `bytemuck` (uniform struct layout)
//! - **Serialization**: `serde` + `ron` (config overrides)
//! - **Diagnostics**: `log` + `env_logger`, `thiserror`

pub mod app;
pub mod config;
pub mod engine;
pub mod error;

pub use config::FluidConfig;
pub use engine::FluidEngine;
