//! Height oracle: the procedural height function plus a Laplacian-of-Gaussian
//! curvature estimate derived from it.
//!
//! The core treats heights as a black box. `HeightSampler` is the only thing
//! an embedding has to provide; [`HeightOracle`] wraps it with the curvature
//! filter configured at startup.

use std::f32::consts::PI;
use std::sync::Arc;

use glam::{Mat2, Vec2, Vec3};

use crate::types::Vertex;

/// Pure height function over the XZ plane.
///
/// Must be deterministic: the same `(x, z)` always gives the same height,
/// or seams between tiles stop matching exactly.
pub trait HeightSampler: Send + Sync {
	fn height(&self, x: f32, z: f32) -> f32;
}

impl<T: HeightSampler + ?Sized> HeightSampler for Box<T> {
	#[inline]
	fn height(&self, x: f32, z: f32) -> f32 {
		(**self).height(x, z)
	}
}

impl<T: HeightSampler + ?Sized> HeightSampler for Arc<T> {
	#[inline]
	fn height(&self, x: f32, z: f32) -> f32 {
		(**self).height(x, z)
	}
}

// =============================================================================
// Curvature filter
// =============================================================================

/// Normalized Laplacian-of-Gaussian kernel of side `2 * radius + 1`.
#[derive(Clone, Debug, PartialEq)]
pub struct CurvatureFilter {
	radius: i32,
	weights: Vec<f32>,
}

impl CurvatureFilter {
	/// Build the kernel; weights are scaled to sum to one.
	pub fn new(radius: u32, gaussian_width: f32) -> Self {
		let radius = radius as i32;
		let side = (radius * 2 + 1) as usize;
		let mut weights = Vec::with_capacity(side * side);
		for y in -radius..=radius {
			for x in -radius..=radius {
				let t = -((x * x + y * y) as f32 / (2.0 * gaussian_width * gaussian_width));
				weights.push(-(1.0 / (PI * gaussian_width.powi(4))) * (1.0 + t) * t.exp());
			}
		}
		let sum: f32 = weights.iter().sum();
		if sum != 0.0 {
			let correction = 1.0 / sum;
			for w in &mut weights {
				*w *= correction;
			}
		}
		Self { radius, weights }
	}

	#[inline]
	pub fn radius(&self) -> u32 {
		self.radius as u32
	}

	#[inline]
	pub fn weights(&self) -> &[f32] {
		&self.weights
	}

	/// `|sum(height(p + offset) * weight) - height(p)|`, one-unit sample step.
	///
	/// The weights sum to one, so constant and planar fields read zero.
	pub fn curvature<S: HeightSampler + ?Sized>(&self, sampler: &S, x: f32, z: f32) -> f32 {
		let side = (self.radius * 2 + 1) as usize;
		let mut curvature = 0.0;
		for y in -self.radius..=self.radius {
			for dx in -self.radius..=self.radius {
				let w = self.weights[(y + self.radius) as usize * side + (dx + self.radius) as usize];
				curvature += sampler.height(x + dx as f32, z + y as f32) * w;
			}
		}
		(curvature - sampler.height(x, z)).abs()
	}
}

impl Default for CurvatureFilter {
	fn default() -> Self {
		Self::new(2, 1.0)
	}
}

/// Height sampler plus curvature filter, shared between threads.
#[derive(Clone)]
pub struct HeightOracle {
	sampler: Arc<dyn HeightSampler>,
	filter: CurvatureFilter,
}

impl HeightOracle {
	pub fn new(sampler: Arc<dyn HeightSampler>, filter: CurvatureFilter) -> Self {
		Self { sampler, filter }
	}

	#[inline]
	pub fn height(&self, x: f32, z: f32) -> f32 {
		self.sampler.height(x, z)
	}

	#[inline]
	pub fn curvature(&self, x: f32, z: f32) -> f32 {
		self.filter.curvature(&*self.sampler, x, z)
	}

	/// Terrain vertex at ground position `(x, z)`.
	#[inline]
	pub fn vertex(&self, x: f32, z: f32) -> Vertex {
		Vertex::new(Vec3::new(x, self.height(x, z), z), self.curvature(x, z))
	}

	#[inline]
	pub fn filter(&self) -> &CurvatureFilter {
		&self.filter
	}
}

impl std::fmt::Debug for HeightOracle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HeightOracle")
			.field("filter_radius", &self.filter.radius)
			.finish_non_exhaustive()
	}
}

// =============================================================================
// Samplers
// =============================================================================

/// Constant height everywhere.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlatTerrain {
	pub height: f32,
}

impl HeightSampler for FlatTerrain {
	#[inline]
	fn height(&self, _x: f32, _z: f32) -> f32 {
		self.height
	}
}

/// Tilted plane `height = slope.x * x + slope.y * z + offset`.
///
/// Zero curvature everywhere, which makes it handy for metric tests.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlaneTerrain {
	pub slope: Vec2,
	pub offset: f32,
}

impl HeightSampler for PlaneTerrain {
	#[inline]
	fn height(&self, x: f32, z: f32) -> f32 {
		self.slope.x * x + self.slope.y * z + self.offset
	}
}

/// Rolling hills: value-noise fbm with a per-octave domain rotation plus a
/// sparse low-frequency mountain term.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProceduralTerrain {
	/// World-to-noise frequency.
	pub frequency: f32,
	/// Number of fbm octaves.
	pub octaves: u32,
	/// Amplitude of the mountain term.
	pub mountain_height: f32,
	/// Constant offset added to every height.
	pub offset: f32,
}

impl Default for ProceduralTerrain {
	fn default() -> Self {
		Self {
			frequency: 0.05,
			octaves: 5,
			mountain_height: 275.0,
			offset: -5.0,
		}
	}
}

impl ProceduralTerrain {
	const ROTATE: Mat2 = Mat2::from_cols_array(&[1.3623, 1.7531, -1.7131, 1.4623]);

	fn hash(p: Vec2) -> f32 {
		let mut p3 = (Vec3::new(p.x, p.y, p.x) * 0.1031).fract();
		p3 += p3.dot(Vec3::new(p3.y, p3.z, p3.x) + 19.19);
		((p3.x + p3.y) * p3.z).fract()
	}

	fn noise(x: Vec2) -> f32 {
		let p = x.floor();
		let f = x - p;
		let f = f * f * (Vec2::splat(3.0) - 2.0 * f);
		let a = Self::hash(p);
		let b = Self::hash(p + Vec2::X);
		let c = Self::hash(p + Vec2::Y);
		let d = Self::hash(p + Vec2::ONE);
		let bottom = a + (b - a) * f.x;
		let top = c + (d - c) * f.x;
		bottom + (top - bottom) * f.y
	}
}

impl HeightSampler for ProceduralTerrain {
	fn height(&self, x: f32, z: f32) -> f32 {
		let mut pos = Vec2::new(x, z) * self.frequency;
		let w = Self::noise(pos * 0.25) * 0.75 + 0.15;
		let mut w = 66.0 * w * w;
		let mut height = 0.0;
		for _ in 0..self.octaves {
			height += w * Self::noise(pos);
			w = -w * 0.4;
			pos = Self::ROTATE * pos;
		}
		let mountains = Self::noise(pos * 0.002).abs().powi(5);
		height + mountains * self.mountain_height + self.offset
	}
}

#[cfg(test)]
#[path = "sampler_test.rs"]
mod sampler_test;
