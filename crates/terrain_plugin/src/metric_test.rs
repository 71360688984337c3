use std::sync::Arc;

use glam::{Vec2, Vec3};

use super::*;
use crate::camera::Camera;
use crate::geometry::Rect;
use crate::sampler::{CurvatureFilter, FlatTerrain, HeightSampler, PlaneTerrain};
use crate::tile::TileCapacity;
use crate::types::Adjacency;

const CAPACITY: TileCapacity = TileCapacity {
	vertices: 64,
	indices: 192,
	new_points: 16,
	border_triangles: 64,
};

fn oracle(sampler: impl HeightSampler + 'static) -> HeightOracle {
	HeightOracle::new(Arc::new(sampler), CurvatureFilter::default())
}

/// Square `[0, 100]^2` at height 0 split into `n x n` cells of two triangles.
fn flat_tile(n: u32, capacity: TileCapacity) -> Tile {
	let mut tile = Tile::new(capacity);
	tile.reset(Rect::new(Vec2::ZERO, Vec2::splat(100.0)));
	let step = 100.0 / n as f32;
	for j in 0..=n {
		for i in 0..=n {
			tile.push_vertex(Vertex::new(Vec3::new(i as f32 * step, 0.0, j as f32 * step), 0.0))
				.unwrap();
		}
	}
	let at = |i: u32, j: u32| j * (n + 1) + i;
	for j in 0..n {
		for i in 0..n {
			let (a, b, c, d) = (at(i, j), at(i + 1, j), at(i + 1, j + 1), at(i, j + 1));
			tile.push_triangle([a, c, b], [Adjacency::Unknown; 3]).unwrap();
			tile.push_triangle([a, d, c], [Adjacency::Unknown; 3]).unwrap();
		}
	}
	tile.set_generated();
	tile
}

fn looking_at_tile() -> Camera {
	Camera::look_at(
		Vec3::new(50.0, 120.0, -80.0),
		Vec3::new(50.0, 0.0, 50.0),
		60f32.to_radians(),
		1.0,
		1.0,
		5_000.0,
	)
}

fn params(camera: &Camera, threshold: f32) -> MetricParams {
	MetricParams {
		view_projection: camera.view_projection,
		threshold,
		area_exponent: 1.0,
		curvature_exponent: 1.0,
	}
}

// =========================================================================
// Batch 1: Triangle Error
// =========================================================================

/// A triangle behind the camera has no error.
#[test]
fn test_triangle_behind_camera_is_clipped() {
	let camera = Camera::look_at(
		Vec3::new(50.0, 120.0, -80.0),
		Vec3::new(50.0, 120.0, -500.0),
		60f32.to_radians(),
		1.0,
		1.0,
		5_000.0,
	);
	let tile = flat_tile(1, CAPACITY);
	let error = triangle_error(&tile.corner_vertices(0), &params(&camera, 0.0), &oracle(FlatTerrain::default()));
	assert!(error.is_none());
}

/// A triangle lying on the oracle surface has zero displacement.
#[test]
fn test_flat_triangle_on_flat_terrain() {
	let camera = looking_at_tile();
	let tile = flat_tile(1, CAPACITY);
	let error = triangle_error(&tile.corner_vertices(0), &params(&camera, 0.0), &oracle(FlatTerrain::default()))
		.unwrap();
	assert!(error.area > 0.0);
	assert_eq!(error.displacement, 0.0);
}

/// The candidate carries the oracle height, not the plane height.
#[test]
fn test_candidate_is_resampled() {
	let camera = looking_at_tile();
	let tile = flat_tile(1, CAPACITY);
	let slope = PlaneTerrain {
		slope: Vec2::new(0.5, 0.0),
		offset: 3.0,
	};
	let error = triangle_error(&tile.corner_vertices(0), &params(&camera, 0.0), &oracle(slope)).unwrap();
	let c = error.candidate.position;
	assert!((c.y - (0.5 * c.x + 3.0)).abs() < 1e-3);
	assert!(error.displacement > 0.0);
}

/// Curvature pulls the candidate halfway towards the curved corner.
#[test]
fn test_curvature_weights_candidate() {
	let camera = looking_at_tile();
	let corners = [
		Vertex::new(Vec3::new(0.0, 0.0, 0.0), 1.0),
		Vertex::new(Vec3::new(90.0, 0.0, 0.0), 0.0),
		Vertex::new(Vec3::new(0.0, 0.0, 90.0), 0.0),
	];
	let error = triangle_error(&corners, &params(&camera, 0.0), &oracle(FlatTerrain::default())).unwrap();
	let centroid = Vec2::new(30.0, 30.0);
	let expected = centroid * 0.5;
	assert!(error.candidate.xz().distance(expected) < 1e-3);
}

// =========================================================================
// Batch 2: Proposing Points
// =========================================================================

/// Nothing is queued while the mesh matches the terrain.
#[test]
fn test_flat_terrain_queues_nothing() {
	let camera = looking_at_tile();
	let mut tile = flat_tile(2, CAPACITY);
	let stats = propose_points(&mut tile, &params(&camera, 1e-6), &oracle(FlatTerrain::default()));
	assert_eq!(stats.tiles, 1);
	assert_eq!(stats.triangles_tested, 8);
	assert_eq!(stats.points_queued, 0);
	assert!(tile.pending().is_empty());
}

/// Every visible triangle over threshold queues one point tagged with it.
#[test]
fn test_sloped_terrain_queues_points() {
	let camera = looking_at_tile();
	let mut tile = flat_tile(2, CAPACITY);
	let slope = oracle(PlaneTerrain {
		slope: Vec2::new(0.25, 0.25),
		offset: 0.0,
	});
	let stats = propose_points(&mut tile, &params(&camera, 1e-9), &slope);
	assert_eq!(stats.points_queued, 8);
	for (t, point) in tile.pending().iter().enumerate() {
		assert_eq!(point.triangle, t as u32);
	}
}

/// A high threshold queues nothing.
#[test]
fn test_threshold_filters() {
	let camera = looking_at_tile();
	let mut tile = flat_tile(2, CAPACITY);
	let slope = oracle(PlaneTerrain {
		slope: Vec2::new(0.25, 0.25),
		offset: 0.0,
	});
	let stats = propose_points(&mut tile, &params(&camera, 1.0e6), &slope);
	assert_eq!(stats.points_queued, 0);
}

/// Tiles with a non-empty queue are skipped.
#[test]
fn test_pending_tile_is_skipped() {
	let camera = looking_at_tile();
	let mut tile = flat_tile(2, CAPACITY);
	tile.push_pending(PendingPoint {
		vertex: Vertex::default(),
		triangle: 0,
	});
	let stats = propose_points(&mut tile, &params(&camera, 0.0), &oracle(FlatTerrain::default()));
	assert_eq!(stats, MetricStats::default());
	assert_eq!(tile.pending().len(), 1);
}

/// The queue capacity bounds how many points one pass adds.
#[test]
fn test_queue_capacity_respected() {
	let camera = looking_at_tile();
	let mut tile = flat_tile(
		2,
		TileCapacity {
			new_points: 3,
			..CAPACITY
		},
	);
	let stats = propose_points(&mut tile, &params(&camera, 0.0), &oracle(FlatTerrain::default()));
	assert_eq!(stats.points_queued, 3);
	assert_eq!(tile.pending().len(), 3);
}

/// The parallel pass sums per-tile results.
#[test]
fn test_propose_all_merges_stats() {
	let camera = looking_at_tile();
	let mut a = flat_tile(2, CAPACITY);
	let mut b = flat_tile(1, CAPACITY);
	let slope = oracle(PlaneTerrain {
		slope: Vec2::new(0.25, 0.25),
		offset: 0.0,
	});
	let stats = propose_all(vec![&mut a, &mut b], &params(&camera, 1e-9), &slope);
	assert_eq!(stats.tiles, 2);
	assert_eq!(stats.triangles_tested, 10);
	assert_eq!(stats.points_queued, 10);
}
