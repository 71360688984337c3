//! Geometry kernel for triangulation in the XZ plane.
//!
//! Everything here is pure. Collinear input produces non-finite
//! circumcircles; every comparison against a NaN or infinite radius is
//! false, so a degenerate triangle never claims a point during cavity
//! search.

mod frustum;
mod rect;

use glam::{Vec2, Vec3};

pub use frustum::{Frustum, Plane};
pub use rect::Rect;

/// Project a 3D position onto the XZ ground plane.
#[inline]
pub fn xz(p: Vec3) -> Vec2 {
	Vec2::new(p.x, p.z)
}

/// Line in implicit form `a*x + b*y = c`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Line {
	pub a: f32,
	pub b: f32,
	pub c: f32,
}

impl Line {
	/// Line through `p` and `q`.
	#[inline]
	pub fn from_points(p: Vec2, q: Vec2) -> Self {
		let a = q.y - p.y;
		let b = p.x - q.x;
		Self { a, b, c: a * p.x + b * p.y }
	}

	/// Perpendicular bisector of the segment `pq`.
	#[inline]
	pub fn bisector(p: Vec2, q: Vec2) -> Self {
		let line = Self::from_points(p, q);
		let mid = (p + q) * 0.5;
		let a = -line.b;
		let b = line.a;
		Self { a, b, c: a * mid.x + b * mid.y }
	}

	/// Intersection point of two lines.
	///
	/// Parallel lines divide by zero and yield non-finite components.
	#[inline]
	pub fn intersection(&self, other: &Line) -> Vec2 {
		let det = self.a * other.b - other.a * self.b;
		Vec2::new(
			(other.b * self.c - self.b * other.c) / det,
			(self.a * other.c - other.a * self.c) / det,
		)
	}
}

/// Circumcenter of the triangle `pqr`.
#[inline]
pub fn circumcenter(p: Vec2, q: Vec2, r: Vec2) -> Vec2 {
	Line::bisector(p, q).intersection(&Line::bisector(q, r))
}

/// Squared circumradius of the triangle `pqr`.
#[inline]
pub fn circumradius_sq(p: Vec2, q: Vec2, r: Vec2) -> f32 {
	circumcenter(p, q, r).distance_squared(p)
}

/// Strict point-in-circle test. Points exactly on the circle are outside.
#[inline]
pub fn point_in_circumcircle(point: Vec2, center: Vec2, radius_sq: f32) -> bool {
	point.distance_squared(center) < radius_sq
}

/// Twice the signed area of `abc`.
///
/// Negative for triangles that are counter-clockwise seen from above (+Y),
/// which is the winding every stored triangle uses.
#[inline]
pub fn orientation(a: Vec2, b: Vec2, c: Vec2) -> f32 {
	(b - a).perp_dot(c - a)
}

#[inline]
pub fn triangle_centroid(a: Vec2, b: Vec2, c: Vec2) -> Vec2 {
	(a + b + c) / 3.0
}

/// Cached circumcircle of a stored triangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Circumcircle {
	pub center: Vec2,
	pub radius_sq: f32,
}

impl Circumcircle {
	/// Circumcircle through three ground-plane points.
	#[inline]
	pub fn new(p: Vec2, q: Vec2, r: Vec2) -> Self {
		let center = circumcenter(p, q, r);
		Self {
			center,
			radius_sq: center.distance_squared(p),
		}
	}

	/// Circumcircle of three 3D corners, projected onto XZ.
	#[inline]
	pub fn from_corners(corners: [Vec3; 3]) -> Self {
		Self::new(xz(corners[0]), xz(corners[1]), xz(corners[2]))
	}

	#[inline]
	pub fn contains(&self, point: Vec2) -> bool {
		point_in_circumcircle(point, self.center, self.radius_sq)
	}
}
