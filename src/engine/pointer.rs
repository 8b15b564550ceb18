//! Pointer state and splat colors.

use glam::Vec2;
use rand::Rng;

/// One input pointer. A single implicit pointer exists from engine start;
/// it is mutated on every move event and never destroyed while the engine
/// is active.
pub struct Pointer {
    pub id: i32,
    /// Current position in texture coordinates.
    pub texcoord: Vec2,
    pub prev_texcoord: Vec2,
    /// Aspect-corrected motion since the last move.
    pub delta: Vec2,
    pub down: bool,
    pub moved: bool,
    pub color: [f32; 3],
}

impl Pointer {
    pub fn new(color: [f32; 3]) -> Self {
        Self {
            id: -1,
            texcoord: Vec2::ZERO,
            prev_texcoord: Vec2::ZERO,
            delta: Vec2::ZERO,
            down: false,
            moved: false,
            color,
        }
    }

    /// Feed a move event in physical pixels. Texture v and window y share
    /// the same downward direction, so the position maps without a flip.
    pub fn update_move(&mut self, position: Vec2, surface_width: u32, surface_height: u32) {
        let aspect = surface_width as f32 / surface_height as f32;
        self.prev_texcoord = self.texcoord;
        self.texcoord = Vec2::new(
            position.x / surface_width as f32,
            position.y / surface_height as f32,
        );
        self.delta = correct_delta(self.texcoord - self.prev_texcoord, aspect);
        self.moved = self.delta.x.abs() > 0.0 || self.delta.y.abs() > 0.0;
    }
}

/// Scale a texture-space delta so pointer speed reads the same along both
/// axes on non-square surfaces.
pub fn correct_delta(delta: Vec2, aspect: f32) -> Vec2 {
    let mut corrected = delta;
    if aspect < 1.0 {
        corrected.x *= aspect;
    }
    if aspect > 1.0 {
        corrected.y /= aspect;
    }
    corrected
}

/// Random splat color: uniform hue at full saturation, dimmed to sit below
/// the bloom threshold.
pub fn generate_color(rng: &mut impl Rng) -> [f32; 3] {
    let (r, g, b) = hsv_to_rgb(rng.gen::<f32>(), 1.0, 1.0);
    [r * 0.15, g * 0.15, b * 0.15]
}

pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    match (i as i32).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

/// Wrap `value` into `[min, max)`.
pub fn wrap(value: f32, min: f32, max: f32) -> f32 {
    let range = max - min;
    if range == 0.0 {
        return min;
    }
    (value - min) % range + min
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_shrinks_vertical_delta() {
        let delta = correct_delta(Vec2::new(0.1, 0.1), 2.0);
        assert!((delta.x - 0.1).abs() < 1e-6);
        assert!((delta.y - 0.05).abs() < 1e-6);
    }

    #[test]
    fn portrait_shrinks_horizontal_delta() {
        let delta = correct_delta(Vec2::new(0.1, 0.1), 0.5);
        assert!((delta.x - 0.05).abs() < 1e-6);
        assert!((delta.y - 0.1).abs() < 1e-6);
    }

    #[test]
    fn move_event_normalizes_and_flags() {
        let mut pointer = Pointer::new([0.0; 3]);
        pointer.update_move(Vec2::new(512.0, 256.0), 1024, 512);
        assert!((pointer.texcoord.x - 0.5).abs() < 1e-6);
        assert!((pointer.texcoord.y - 0.5).abs() < 1e-6);
        assert!(pointer.moved);

        pointer.moved = false;
        pointer.update_move(Vec2::new(512.0, 256.0), 1024, 512);
        assert!(!pointer.moved);
    }

    #[test]
    fn generated_colors_stay_in_palette_range() {
        let mut rng = rand::thread_rng();
        for _ in 0..64 {
            let c = generate_color(&mut rng);
            for channel in c {
                assert!((0.0..=0.15).contains(&channel));
            }
        }
    }

    #[test]
    fn hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), (1.0, 0.0, 0.0));
        let (r, g, b) = hsv_to_rgb(1.0 / 3.0, 1.0, 1.0);
        assert!(r < 1e-6 && (g - 1.0).abs() < 1e-6 && b < 1e-6);
    }

    #[test]
    fn wrap_keeps_value_in_range() {
        assert!((wrap(1.25, 0.0, 1.0) - 0.25).abs() < 1e-6);
        assert_eq!(wrap(0.5, 0.0, 0.0), 0.0);
    }
}
