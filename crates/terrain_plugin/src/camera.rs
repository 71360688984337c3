//! Camera state consumed by the visibility pass and the error metric.

use glam::{Mat4, Vec2, Vec3};

use crate::geometry::{xz, Frustum};

/// World position plus an OpenGL-style view-projection matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
	pub position: Vec3,
	pub view_projection: Mat4,
}

impl Camera {
	#[inline]
	pub fn new(position: Vec3, view_projection: Mat4) -> Self {
		Self {
			position,
			view_projection,
		}
	}

	/// Right-handed perspective camera at `eye` looking at `target`, +Y up.
	pub fn look_at(eye: Vec3, target: Vec3, fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
		let view = Mat4::look_at_rh(eye, target, Vec3::Y);
		let projection = Mat4::perspective_rh_gl(fov_y, aspect, near, far);
		Self::new(eye, projection * view)
	}

	/// Position on the ground plane.
	#[inline]
	pub fn ground(&self) -> Vec2 {
		xz(self.position)
	}

	#[inline]
	pub fn frustum(&self) -> Frustum {
		Frustum::from_view_projection(&self.view_projection)
	}
}
