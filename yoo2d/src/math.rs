use glam::{Mat2, Vec2 as GlamVec2};
use serde::{Deserialize, Serialize};

/// 2D vector type used throughout Yoo2D.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };
    pub const ONE: Self = Self { x: 1.0, y: 1.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn to_glam(&self) -> GlamVec2 {
        GlamVec2::new(self.x, self.y)
    }

    pub fn from_glam(v: GlamVec2) -> Self {
        Self::new(v.x, v.y)
    }

    /// Computes the dot product of two vectors.
    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y
    }

    /// Perpendicular vector (rotated a quarter turn counter-clockwise).
    pub fn perp(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Rotates the vector around the origin by `radians`.
    pub fn rotated(self, radians: f32) -> Self {
        Self::from_glam(Mat2::from_angle(radians) * self.to_glam())
    }

    /// Returns true when both components are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f32, f32)> for Vec2 {
    fn from(value: (f32, f32)) -> Self {
        Self {
            x: value.0,
            y: value.1,
        }
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl std::ops::Neg for Vec2 {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}

/// Axis-aligned rectangle described by its top-left corner and size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Corners in clockwise order starting at the top-left, rotated by
    /// `radians` around the rectangle's center.
    pub fn corners(&self, radians: f32) -> [Vec2; 4] {
        let c = self.center();
        [
            Vec2::new(self.x, self.y),
            Vec2::new(self.right(), self.y),
            Vec2::new(self.right(), self.bottom()),
            Vec2::new(self.x, self.bottom()),
        ]
        .map(|p| rotate_about(p, c, radians))
    }
}

/// Ellipse with an optional rotation in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    pub cx: f32,
    pub cy: f32,
    pub rx: f32,
    pub ry: f32,
    pub rotation: f32,
}

impl Ellipse {
    pub fn new(cx: f32, cy: f32, rx: f32, ry: f32, rotation: f32) -> Self {
        Self {
            cx,
            cy,
            rx,
            ry,
            rotation,
        }
    }
}

/// Rotates `point` around `center` by `radians`.
pub fn rotate_about(point: Vec2, center: Vec2, radians: f32) -> Vec2 {
    center + (point - center).rotated(radians)
}

/// Rounds `coord` to the nearest multiple of `grid`. A non-positive grid
/// leaves the coordinate untouched.
pub fn snap_to_grid(coord: f32, grid: f32) -> f32 {
    if grid <= 0.0 || !grid.is_finite() {
        return coord;
    }
    (coord / grid).round() * grid
}

/// Clamp that tolerates `low > high` by letting `low` win, which is what the
/// camera needs when the map is smaller than the viewport.
pub fn clamp_value(value: f32, low: f32, high: f32) -> f32 {
    if value < low {
        low
    } else if value > high {
        high
    } else {
        value
    }
}

/// Vertices of a regular polygon centered on the origin, rounded to whole
/// pixels.
pub fn regular_polygon(points: usize, radius: f32) -> Vec<Vec2> {
    (1..=points)
        .map(|i| {
            let angle = 2.0 * std::f32::consts::PI * i as f32 / points as f32;
            Vec2::new((radius * angle.cos()).round(), (radius * angle.sin()).round())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn rotated_quarter_turn() {
        let v = Vec2::new(1.0, 0.0).rotated(std::f32::consts::FRAC_PI_2);
        assert!(approx_eq(v.x, 0.0));
        assert!(approx_eq(v.y, 1.0));
    }

    #[test]
    fn rect_corners_without_rotation() {
        let corners = Rect::new(0.0, 0.0, 10.0, 4.0).corners(0.0);
        assert_eq!(corners[0], Vec2::new(0.0, 0.0));
        assert!(approx_eq(corners[2].x, 10.0));
        assert!(approx_eq(corners[2].y, 4.0));
    }

    #[test]
    fn rect_corners_half_turn_swap() {
        let corners = Rect::new(0.0, 0.0, 10.0, 4.0).corners(std::f32::consts::PI);
        assert!(approx_eq(corners[0].x, 10.0));
        assert!(approx_eq(corners[0].y, 4.0));
    }

    #[test]
    fn snap_to_grid_rounds_to_nearest_cell() {
        assert!(approx_eq(snap_to_grid(37.0, 16.0), 32.0));
        assert!(approx_eq(snap_to_grid(41.0, 16.0), 48.0));
        assert!(approx_eq(snap_to_grid(41.0, 0.0), 41.0));
    }

    #[test]
    fn clamp_value_prefers_low_bound_when_inverted() {
        assert!(approx_eq(clamp_value(5.0, 10.0, 0.0), 10.0));
        assert!(approx_eq(clamp_value(-350.0, -700.0, 0.0), -350.0));
        assert!(approx_eq(clamp_value(20.0, -700.0, 0.0), 0.0));
    }

    #[test]
    fn regular_polygon_has_requested_vertex_count() {
        let tri = regular_polygon(3, 25.0);
        assert_eq!(tri.len(), 3);
        // Last vertex sits on the positive x axis.
        assert!(approx_eq(tri[2].x, 25.0));
        assert!(approx_eq(tri[2].y, 0.0));
    }
}
