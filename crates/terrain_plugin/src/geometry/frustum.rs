//! View frustum extracted from a view-projection matrix.

use glam::{Mat4, Vec3, Vec4};

use super::Rect;

/// Plane `normal . p + d = 0` with the inside on the positive side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
	pub normal: Vec3,
	pub d: f32,
}

impl Plane {
	fn from_row(row: Vec4) -> Self {
		let normal = row.truncate();
		let len = normal.length();
		if len > 0.0 {
			Self {
				normal: normal / len,
				d: row.w / len,
			}
		} else {
			Self { normal, d: row.w }
		}
	}

	#[inline]
	pub fn signed_distance(&self, p: Vec3) -> f32 {
		self.normal.dot(p) + self.d
	}
}

/// Six-plane view frustum (left, right, bottom, top, near, far).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
	pub planes: [Plane; 6],
}

impl Frustum {
	/// Extract the planes of an OpenGL-style clip volume (`-w <= z <= w`).
	pub fn from_view_projection(view_proj: &Mat4) -> Self {
		let r0 = view_proj.row(0);
		let r1 = view_proj.row(1);
		let r2 = view_proj.row(2);
		let r3 = view_proj.row(3);
		Self {
			planes: [
				Plane::from_row(r3 + r0),
				Plane::from_row(r3 - r0),
				Plane::from_row(r3 + r1),
				Plane::from_row(r3 - r1),
				Plane::from_row(r3 + r2),
				Plane::from_row(r3 - r2),
			],
		}
	}

	/// Conservative box test: false only when the box is fully outside a plane.
	pub fn intersects_aabb(&self, min: Vec3, max: Vec3) -> bool {
		self.planes.iter().all(|plane| {
			let positive = Vec3::select(plane.normal.cmpge(Vec3::ZERO), max, min);
			plane.signed_distance(positive) >= 0.0
		})
	}

	/// Test a ground rectangle extruded over `[min_height, max_height]`.
	#[inline]
	pub fn intersects_rect(&self, rect: &Rect, min_height: f32, max_height: f32) -> bool {
		self.intersects_aabb(
			Vec3::new(rect.min.x, min_height, rect.min.y),
			Vec3::new(rect.max.x, max_height, rect.max.y),
		)
	}
}
