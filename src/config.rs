//! Engine configuration.
//!
//! A flat value object supplied by the host and treated as immutable per
//! frame. The host applies changes by diffing the old and new snapshots and
//! routing the result to `reallocate_framebuffers` / `update_feature_flags`;
//! the engine never watches an external settings store.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluidConfig {
    /// Base resolution of the simulation grid (velocity, pressure).
    pub sim_resolution: u32,
    /// Base resolution of the dye field and display-quality targets.
    pub dye_resolution: u32,
    /// Exponential decay rate of the dye field.
    pub density_dissipation: f32,
    /// Exponential decay rate of the velocity field.
    pub velocity_dissipation: f32,
    /// Pressure retained between frames (warm start of the solver).
    pub pressure: f32,
    /// Jacobi relaxation sweeps per frame.
    pub pressure_iterations: u32,
    /// Vorticity confinement strength.
    pub curl: f32,
    /// Splat radius, as a fraction of the field height.
    pub splat_radius: f32,
    /// Force multiplier applied to pointer deltas.
    pub splat_force: f32,
    /// Screen-space relief shading in the final composite.
    pub shading: bool,
    /// Cycle pointer colors over time instead of using `pointer_color`.
    pub colorful: bool,
    /// Color cycling speed.
    pub color_update_speed: f32,
    /// Freeze the solver (inputs still accumulate).
    pub paused: bool,
    pub bloom: bool,
    pub bloom_iterations: u32,
    pub bloom_resolution: u32,
    pub bloom_intensity: f32,
    pub bloom_threshold: f32,
    pub bloom_soft_knee: f32,
    pub sunrays: bool,
    pub sunrays_resolution: u32,
    pub sunrays_weight: f32,
    /// Fixed pointer color used when `colorful` is off.
    pub pointer_color: [f32; 3],
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self {
            sim_resolution: 128,
            dye_resolution: 1024,
            density_dissipation: 2.0,
            velocity_dissipation: 0.1,
            pressure: 0.28,
            pressure_iterations: 8,
            curl: 30.0,
            splat_radius: 0.25,
            splat_force: 6000.0,
            shading: true,
            colorful: true,
            color_update_speed: 10.0,
            paused: false,
            bloom: false,
            bloom_iterations: 8,
            bloom_resolution: 256,
            bloom_intensity: 0.8,
            bloom_threshold: 0.6,
            bloom_soft_knee: 0.7,
            sunrays: false,
            sunrays_resolution: 196,
            sunrays_weight: 1.0,
            pointer_color: [0.0, 0.15, 0.3],
        }
    }
}

/// What a configuration change requires of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigDelta {
    /// Render targets must be reallocated.
    pub framebuffers: bool,
    /// The display kernel variant must be refreshed.
    pub keywords: bool,
}

impl FluidConfig {
    /// Classify the changes between `self` and `new`.
    pub fn delta(&self, new: &FluidConfig) -> ConfigDelta {
        ConfigDelta {
            framebuffers: self.sim_resolution != new.sim_resolution
                || self.dye_resolution != new.dye_resolution
                || self.bloom_resolution != new.bloom_resolution
                || self.bloom_iterations != new.bloom_iterations
                || self.sunrays_resolution != new.sunrays_resolution,
            keywords: self.shading != new.shading
                || self.bloom != new.bloom
                || self.sunrays != new.sunrays,
        }
    }

    /// Load overrides from a RON file.
    pub fn load(path: &std::path::Path) -> Result<Self, crate::error::ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = FluidConfig::default();
        assert_eq!(config.sim_resolution, 128);
        assert_eq!(config.dye_resolution, 1024);
        assert_eq!(config.pressure_iterations, 8);
        assert!((config.pressure - 0.28).abs() < f32::EPSILON);
        assert!((config.curl - 30.0).abs() < f32::EPSILON);
        assert!((config.splat_radius - 0.25).abs() < f32::EPSILON);
        assert!((config.splat_force - 6000.0).abs() < f32::EPSILON);
        assert!(config.shading);
        assert!(!config.bloom);
        assert!(!config.sunrays);
        assert!(!config.paused);
    }

    #[test]
    fn resolution_changes_require_reallocation() {
        let old = FluidConfig::default();
        let mut new = old.clone();
        new.dye_resolution = 512;
        let delta = old.delta(&new);
        assert!(delta.framebuffers);
        assert!(!delta.keywords);
    }

    #[test]
    fn toggle_changes_require_keyword_refresh() {
        let old = FluidConfig::default();
        let mut new = old.clone();
        new.bloom = true;
        new.sunrays = true;
        let delta = old.delta(&new);
        assert!(!delta.framebuffers);
        assert!(delta.keywords);
    }

    #[test]
    fn scalar_changes_require_nothing() {
        let old = FluidConfig::default();
        let mut new = old.clone();
        new.curl = 50.0;
        new.paused = true;
        assert_eq!(old.delta(&new), ConfigDelta::default());
    }
}
