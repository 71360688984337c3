//! Screen-space error metric.
//!
//! For each triangle of a tile the metric weighs how large the triangle is
//! on screen against how far its surface strays from the height oracle:
//!
//! - **area**: Heron's product `s(s-a)(s-b)(s-c)` of the projected corners
//!   in NDC xy, raised to `area_exponent`
//! - **displacement**: NDC distance between a candidate point on the
//!   triangle plane and the same ground position at oracle height, raised
//!   to `curvature_exponent`
//!
//! The candidate sits halfway between the centroid and the
//! curvature-weighted average of the corners, so refinement gravitates to
//! ridges and valleys. A triangle whose `area * displacement` reaches the
//! threshold queues the candidate in its tile.

use glam::{Mat4, Vec2, Vec3};
use rayon::prelude::*;

use crate::sampler::HeightOracle;
use crate::tile::Tile;
use crate::types::{PendingPoint, Vertex};

/// Smallest clip-space `w` used for the perspective divide.
const MIN_CLIP_W: f32 = 1.0e-4;

/// Inputs of one metric pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MetricParams {
	pub view_projection: Mat4,
	pub threshold: f32,
	pub area_exponent: f32,
	pub curvature_exponent: f32,
}

/// Counters of one metric pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricStats {
	/// Tiles evaluated (tiles with pending points are skipped).
	pub tiles: usize,
	pub triangles_tested: usize,
	/// Triangles with no corner inside the view volume.
	pub triangles_clipped: usize,
	pub points_queued: usize,
}

impl MetricStats {
	#[inline]
	fn merged(self, other: Self) -> Self {
		Self {
			tiles: self.tiles + other.tiles,
			triangles_tested: self.triangles_tested + other.triangles_tested,
			triangles_clipped: self.triangles_clipped + other.triangles_clipped,
			points_queued: self.points_queued + other.points_queued,
		}
	}
}

/// Error of one triangle and the point that would reduce it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriangleError {
	pub area: f32,
	pub displacement: f32,
	/// Candidate at oracle height with its curvature.
	pub candidate: Vertex,
}

impl TriangleError {
	#[inline]
	pub fn value(&self) -> f32 {
		self.area * self.displacement
	}
}

#[inline]
fn in_view_volume(view_projection: &Mat4, p: Vec3) -> bool {
	let clip = *view_projection * p.extend(1.0);
	let w = clip.w;
	clip.x.abs() <= w && clip.y.abs() <= w && clip.z.abs() <= w
}

#[inline]
fn project(view_projection: &Mat4, p: Vec3) -> Vec2 {
	let clip = *view_projection * p.extend(1.0);
	Vec2::new(clip.x, clip.y) / clip.w.max(MIN_CLIP_W)
}

/// Evaluate one triangle. `None` when no corner is inside the view volume.
pub fn triangle_error(
	corners: &[Vertex; 3],
	params: &MetricParams,
	oracle: &HeightOracle,
) -> Option<TriangleError> {
	let vp = &params.view_projection;
	if !corners.iter().any(|v| in_view_volume(vp, v.position)) {
		return None;
	}

	let [p0, p1, p2] = corners.map(|v| project(vp, v.position));
	let (a, b, c) = (p0.distance(p1), p1.distance(p2), p2.distance(p0));
	let s = (a + b + c) * 0.5;
	let heron = (s * (s - a) * (s - b) * (s - c)).max(0.0);
	let area = heron.powf(params.area_exponent);

	// Barycentric weights of mix(centroid, curvature-weighted, 0.5).
	let total: f32 = corners.iter().map(|v| v.curvature).sum();
	let weights = if total > 0.0 && total.is_finite() {
		corners.map(|v| 0.5 / 3.0 + 0.5 * v.curvature / total)
	} else {
		[1.0 / 3.0; 3]
	};
	let on_plane = corners
		.iter()
		.zip(weights)
		.fold(Vec3::ZERO, |acc, (v, w)| acc + v.position * w);
	let candidate = oracle.vertex(on_plane.x, on_plane.z);

	let displacement = project(vp, on_plane)
		.distance(project(vp, candidate.position))
		.powf(params.curvature_exponent);

	Some(TriangleError {
		area,
		displacement,
		candidate,
	})
}

/// Queue refinement candidates for every triangle of `tile` over threshold.
///
/// Tiles that still have pending points are left alone; their queue drains
/// first. Stops early once the queue is full.
pub fn propose_points(tile: &mut Tile, params: &MetricParams, oracle: &HeightOracle) -> MetricStats {
	let mut stats = MetricStats::default();
	if !tile.is_generated() || !tile.pending().is_empty() {
		return stats;
	}
	stats.tiles = 1;

	for t in 0..tile.triangle_count() as u32 {
		stats.triangles_tested += 1;
		let Some(error) = triangle_error(&tile.corner_vertices(t), params, oracle) else {
			stats.triangles_clipped += 1;
			continue;
		};
		let value = error.value();
		if !(value.is_finite() && value >= params.threshold) {
			continue;
		}
		if !tile.push_pending(PendingPoint {
			vertex: error.candidate,
			triangle: t,
		}) {
			break;
		}
		stats.points_queued += 1;
	}
	stats
}

/// Run [`propose_points`] over `tiles` in parallel.
#[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "metric::propose"))]
pub fn propose_all(tiles: Vec<&mut Tile>, params: &MetricParams, oracle: &HeightOracle) -> MetricStats {
	if tiles.is_empty() {
		return MetricStats::default();
	}
	tiles
		.into_par_iter()
		.map(|tile| propose_points(tile, params, oracle))
		.reduce(MetricStats::default, MetricStats::merged)
}

#[cfg(test)]
#[path = "metric_test.rs"]
mod metric_test;
