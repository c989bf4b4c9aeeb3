//! Geometry kernel: pure overlap and containment predicates.
//!
//! Every function here works on plain numeric structs ([`Rect`], [`Ellipse`],
//! vertex slices) and never touches entities, so callers can test shapes
//! without building a scene.

use crate::math::{Ellipse, Rect, Vec2};

/// True when two axis-aligned boxes share interior area.
///
/// Boxes that only touch along an edge or a corner do not overlap. The test
/// is symmetric in its arguments.
pub fn aabb_overlap(a: Rect, b: Rect) -> bool {
    !(b.x >= a.x + a.w || a.x >= b.x + b.w || b.y >= a.y + a.h || a.y >= b.y + b.h)
}

/// Strict interior containment: points on the boundary are outside.
pub fn point_in_rect(p: Vec2, r: Rect) -> bool {
    p.x > r.x && p.y > r.y && p.x < r.x + r.w && p.y < r.y + r.h
}

/// Point containment for a rotated ellipse, boundary inclusive.
///
/// An ellipse with a zero radius on either axis contains nothing.
pub fn point_in_ellipse(p: Vec2, e: Ellipse) -> bool {
    if e.rx == 0.0 || e.ry == 0.0 {
        return false;
    }
    let (sin, cos) = e.rotation.sin_cos();
    let dx = p.x - e.cx;
    let dy = p.y - e.cy;
    let tdx = cos * dx + sin * dy;
    let tdy = sin * dx - cos * dy;
    (tdx * tdx) / (e.rx * e.rx) + (tdy * tdy) / (e.ry * e.ry) <= 1.0
}

/// Even-odd ray casting. A horizontal ray is cast from `p` towards +x and
/// every edge (including the closing edge) it crosses flips the result.
///
/// Points exactly on a vertical right-hand edge report outside, points on a
/// vertical left-hand edge report inside.
pub fn point_in_polygon(p: Vec2, vertices: &[Vec2]) -> bool {
    let mut odd = false;
    let Some(mut j) = vertices.len().checked_sub(1) else {
        return false;
    };

    for (i, vi) in vertices.iter().enumerate() {
        let vj = vertices[j];
        let dy = vj.y - vi.y;
        if (vi.y > p.y) != (vj.y > p.y) && dy != 0.0 {
            let intercept = (vj.x - vi.x) * (p.y - vi.y) / dy + vi.x;
            if p.x < intercept {
                odd = !odd;
            }
        }
        j = i;
    }

    odd
}

/// Separating axis test over both polygons' edge normals.
///
/// Returns true (collision) only when no edge normal separates the
/// projections. Correct for convex polygons in any rotation; for concave
/// input the result is only a conservative approximation (it may report a
/// collision where the shapes do not actually touch). Touching projections
/// count as separated, matching [`aabb_overlap`].
pub fn separating_axis(poly_a: &[Vec2], poly_b: &[Vec2]) -> bool {
    if poly_a.is_empty() || poly_b.is_empty() {
        return false;
    }
    !has_separating_edge(poly_a, poly_a, poly_b) && !has_separating_edge(poly_b, poly_a, poly_b)
}

fn has_separating_edge(edges_of: &[Vec2], a: &[Vec2], b: &[Vec2]) -> bool {
    let n = edges_of.len();
    for i in 0..n {
        let edge = edges_of[(i + 1) % n] - edges_of[i];
        let axis = edge.perp();
        if axis.x == 0.0 && axis.y == 0.0 {
            continue;
        }
        let (min_a, max_a) = project(a, axis);
        let (min_b, max_b) = project(b, axis);
        if max_a <= min_b || max_b <= min_a {
            return true;
        }
    }
    false
}

fn project(poly: &[Vec2], axis: Vec2) -> (f32, f32) {
    poly.iter()
        .map(|v| v.dot(axis))
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), d| {
            (lo.min(d), hi.max(d))
        })
}

/// Circle-vs-circle overlap, boundary inclusive.
pub fn circles_overlap(a: Vec2, a_radius: f32, b: Vec2, b_radius: f32) -> bool {
    let d = a - b;
    d.dot(d) <= (a_radius + b_radius) * (a_radius + b_radius)
}

/// Bounding box (min corner and size) of a vertex list.
pub fn polygon_bounds(vertices: &[Vec2]) -> Rect {
    let Some(first) = vertices.first() else {
        return Rect::default();
    };
    let (mut min, mut max) = (*first, *first);
    for v in &vertices[1..] {
        min.x = min.x.min(v.x);
        min.y = min.y.min(v.y);
        max.x = max.x.max(v.x);
        max.y = max.y.max(v.y);
    }
    Rect::new(min.x, min.y, max.x - min.x, max.y - min.y)
}
