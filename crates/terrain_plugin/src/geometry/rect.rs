//! Axis-aligned rectangle on the XZ ground plane.

use glam::Vec2;

/// Axis-aligned rectangle in world XZ coordinates.
///
/// `min.y` / `max.y` hold the Z extent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
	/// Minimum corner (inclusive).
	pub min: Vec2,
	/// Maximum corner (inclusive).
	pub max: Vec2,
}

impl Rect {
	/// Create a rectangle from min and max corners.
	///
	/// # Panics
	/// Debug-asserts that min <= max on both axes.
	pub fn new(min: Vec2, max: Vec2) -> Self {
		debug_assert!(
			min.x <= max.x && min.y <= max.y,
			"Rect min must be <= max on both axes"
		);
		Self { min, max }
	}

	/// Square rectangle of side `side` starting at `min`.
	#[inline]
	pub fn from_min_side(min: Vec2, side: f32) -> Self {
		Self {
			min,
			max: min + Vec2::splat(side),
		}
	}

	#[inline]
	pub fn contains(&self, point: Vec2) -> bool {
		point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
	}

	/// True if the two rectangles share at least a point.
	#[inline]
	pub fn intersects(&self, other: &Rect) -> bool {
		self.min.x <= other.max.x
			&& other.min.x <= self.max.x
			&& self.min.y <= other.max.y
			&& other.min.y <= self.max.y
	}

	/// Grow every side by `amount`.
	#[inline]
	pub fn expand(&self, amount: f32) -> Self {
		Self {
			min: self.min - Vec2::splat(amount),
			max: self.max + Vec2::splat(amount),
		}
	}

	/// Smallest rectangle covering both.
	#[inline]
	pub fn union(&self, other: &Rect) -> Self {
		Self {
			min: self.min.min(other.min),
			max: self.max.max(other.max),
		}
	}

	#[inline]
	pub fn size(&self) -> Vec2 {
		self.max - self.min
	}

	#[inline]
	pub fn center(&self) -> Vec2 {
		(self.min + self.max) * 0.5
	}
}
