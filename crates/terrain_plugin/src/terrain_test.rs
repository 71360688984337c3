use std::collections::HashMap;
use std::sync::Arc;

use glam::{IVec2, Vec3};

use super::*;
use crate::error::ConfigError;
use crate::sampler::FlatTerrain;
use crate::sink::RecordingSink;
use crate::types::Adjacency;

/// High camera looking down at the whole default window.
fn overview_camera(x: f32) -> Camera {
	Camera::look_at(
		Vec3::new(x, 1_200.0, -10.0),
		Vec3::new(x, 0.0, 0.0),
		90f32.to_radians(),
		1.0,
		1.0,
		20_000.0,
	)
}

fn flat_terrain() -> Terrain {
	Terrain::new(TerrainConfig::default(), Arc::new(FlatTerrain::default())).unwrap()
}

/// Procedural terrain that refines everywhere it can.
fn refining_terrain() -> Terrain {
	let config = TerrainConfig {
		threshold: 1.0e-12,
		refine_requires_full_neighborhood: false,
		..Default::default()
	};
	Terrain::procedural(config).unwrap()
}

/// Index ranges, `Local` symmetry, edge multiplicity and `Border` mirroring
/// for every bound tile.
fn assert_tiles_consistent(terrain: &Terrain) {
	for (cell, handle) in terrain.quadtree().iter() {
		let Some(tile) = terrain.pool().get(handle) else {
			panic!("{cell:?} is bound to a dead tile");
		};
		let count = tile.triangle_count() as u32;
		let mut edges: HashMap<[(u32, u32); 2], usize> = HashMap::new();
		for t in 0..count {
			for c in tile.corners(t) {
				assert!((c as usize) < tile.vertex_count());
			}
			for k in 0..3 {
				let [a, b] = tile.edge_positions(t, k);
				let mut key = [(a.x.to_bits(), a.z.to_bits()), (b.x.to_bits(), b.z.to_bits())];
				key.sort_unstable();
				*edges.entry(key).or_default() += 1;

				match tile.edge_adjacency(t, k) {
					Adjacency::Local(n) => {
						assert!(n < count, "orphaned local edge {t} -> {n}");
						assert!((0..3).any(|j| tile.edge_adjacency(n, j) == Adjacency::Local(t)));
						assert!(tile.find_edge(n, a, b).is_some(), "{cell:?}: {t}/{n} share no edge");
					}
					Adjacency::Border(d) => {
						let Some(other) = terrain.tile(cell + d.offset()) else {
							continue;
						};
						let mirrored = (0..other.triangle_count() as u32).any(|ot| {
							other
								.find_edge(ot, a, b)
								.is_some_and(|ok| other.edge_adjacency(ot, ok) == Adjacency::Border(d.opposite()))
						});
						assert!(mirrored, "{cell:?}/{t} edge {k} has no mirror towards {d:?}");
					}
					Adjacency::Unknown => {}
				}
			}
		}
		for (edge, n) in edges {
			assert!(n <= 2, "{cell:?}: edge {edge:?} is used by {n} triangles");
		}
	}
}

/// No vertex of a tile lies inside the circumcircle of one of its triangles.
fn assert_tiles_delaunay(terrain: &Terrain) {
	for (cell, handle) in terrain.quadtree().iter() {
		let Some(tile) = terrain.pool().get(handle) else {
			continue;
		};
		for t in 0..tile.triangle_count() as u32 {
			let circle = tile.circle(t);
			let corners = tile.corners(t);
			for (i, v) in tile.vertices().iter().enumerate() {
				if corners.contains(&(i as u32)) {
					continue;
				}
				let d = circle.center.distance_squared(v.xz());
				assert!(
					d >= circle.radius_sq * (1.0 - 1e-3),
					"{cell:?}: vertex {i} inside circumcircle of triangle {t}"
				);
			}
		}
	}
}

// =========================================================================
// Batch 1: Construction and Commands
// =========================================================================

#[test]
fn test_invalid_config_is_rejected() {
	let config = TerrainConfig {
		grid_side: 1,
		..Default::default()
	};
	let err = Terrain::new(config, Arc::new(FlatTerrain::default())).unwrap_err();
	assert_eq!(err, ConfigError::GridSide(1));
}

/// The first frame generates every visible cell.
#[test]
fn test_first_frame_generates_visible_cells() {
	let mut terrain = flat_terrain();
	let stats = terrain.frame(&overview_camera(0.0));

	assert!(stats.batches >= 1);
	assert!(stats.generate.tiles > 0);
	assert_eq!(stats.to_generate, 0);
	assert_eq!(stats.visible, stats.generate.tiles);
	assert_eq!(terrain.pool().in_use(), terrain.quadtree().occupied());
	assert!(terrain.triangle_count() > 0);
	assert_eq!(stats.refine.inserted, 0, "flat terrain needs no refinement");
	assert_tiles_consistent(&terrain);
}

/// Clearing drops everything; the next frame rebuilds.
#[test]
fn test_clear_terrain() {
	let mut terrain = flat_terrain();
	let camera = overview_camera(0.0);
	terrain.frame(&camera);
	let triangles = terrain.triangle_count();

	terrain.clear_terrain();
	assert_eq!(terrain.triangle_count(), 0);
	assert_eq!(terrain.pool().in_use(), 0);
	assert_eq!(terrain.quadtree().occupied(), 0);
	assert!(terrain.visible().is_empty());

	terrain.frame(&camera);
	assert_eq!(terrain.triangle_count(), triangles, "regeneration is deterministic");
}

/// Moving the camera evicts the cells left behind and releases their tiles.
#[test]
fn test_camera_move_evicts() {
	let mut terrain = flat_terrain();
	terrain.frame(&overview_camera(0.0));
	let before = terrain.pool().in_use();

	let evicted = terrain.set_camera_position(Vec3::new(700.0, 0.0, 0.0));
	assert!(evicted > 0);
	assert_eq!(terrain.pool().in_use(), before - evicted);
	assert_eq!(terrain.pool().in_use(), terrain.quadtree().occupied());
	for &(_, handle) in &terrain.visible().draw {
		assert!(terrain.pool().is_live(handle));
	}
	assert_tiles_consistent(&terrain);

	// The next frame fills the new column next to the survivors.
	let stats = terrain.frame(&overview_camera(700.0));
	assert!(stats.generate.tiles > 0);
	assert_eq!(stats.to_generate, 0);
	assert_eq!(stats.abandoned_batches, 0);
	assert_tiles_consistent(&terrain);
	assert_tiles_delaunay(&terrain);
}

/// Panning across several shifts keeps every tile consistent, frame by frame.
#[test]
fn test_multi_frame_pan() {
	let mut terrain = flat_terrain();
	let mut evicted = 0;
	for frame in 0..10 {
		let stats = terrain.frame(&overview_camera(frame as f32 * 120.0));
		evicted += stats.evicted;
		assert_eq!(stats.abandoned_batches, 0, "frame {frame}");
		assert_eq!(terrain.pool().in_use(), terrain.quadtree().occupied());
		assert_tiles_consistent(&terrain);
		assert_tiles_delaunay(&terrain);
	}
	assert!(evicted > 0, "the window moved");
}

/// Refined tiles left behind by a shift still close cleanly against the
/// tiles generated next to them, frame after frame.
#[test]
fn test_refining_pan() {
	let mut terrain = refining_terrain();
	let mut inserted = 0;
	let mut generated = 0;
	for frame in 0..12 {
		let stats = terrain.frame(&overview_camera(frame as f32 * 60.0));
		inserted += stats.refine.inserted;
		generated += stats.generate.tiles;
		assert_eq!(terrain.pool().in_use(), terrain.quadtree().occupied());
		assert_tiles_consistent(&terrain);
	}
	assert!(inserted > 0);
	assert!(generated > terrain.pool().in_use(), "shifts regenerated cells");
}

// =========================================================================
// Batch 2: Refinement
// =========================================================================

/// Procedural terrain gains triangles frame after frame.
#[test]
fn test_frames_refine_procedural_terrain() {
	let mut terrain = refining_terrain();
	let camera = overview_camera(0.0);
	terrain.frame(&camera);
	let generated = terrain.triangle_count();

	let mut inserted = 0;
	for _ in 0..4 {
		inserted += terrain.frame(&camera).refine.inserted;
	}
	assert!(inserted > 0);
	assert!(terrain.triangle_count() > generated);
	assert_tiles_consistent(&terrain);
}

/// With the full-neighborhood gate only interior cells of the window refine.
#[test]
fn test_full_neighborhood_gate() {
	let config = TerrainConfig {
		threshold: 1.0e-12,
		..Default::default()
	};
	let mut terrain = Terrain::procedural(config).unwrap();
	let camera = overview_camera(0.0);
	let interior = ((terrain.quadtree().cells() - 2) * (terrain.quadtree().cells() - 2)) as usize;
	for _ in 0..3 {
		let stats = terrain.frame(&camera);
		assert!(stats.refined_tiles <= interior);
	}

	let mut open = refining_terrain();
	let refined: usize = (0..3).map(|_| open.frame(&camera).refined_tiles).sum();
	assert!(refined > 3 * interior, "without the gate edge tiles refine too");
}

/// Tiles the gate keeps from refining get no queued points either.
#[test]
fn test_gated_tiles_queue_nothing() {
	let config = TerrainConfig {
		threshold: 1.0e-12,
		..Default::default()
	};
	let mut terrain = Terrain::procedural(config).unwrap();
	let camera = overview_camera(0.0);
	let queued: usize = (0..3).map(|_| terrain.frame(&camera).metric.points_queued).sum();
	assert!(queued > 0, "interior tiles still refine");

	let mut gated = 0;
	for (cell, handle) in terrain.quadtree().iter() {
		let full = terrain
			.quadtree()
			.neighborhood(cell)
			.iter()
			.all(|&h| terrain.pool().generated(h).is_some());
		if !full {
			gated += 1;
			let tile = terrain.pool().get(handle).unwrap();
			assert!(tile.pending().is_empty(), "{cell:?} is gated but has points queued");
		}
	}
	assert!(gated > 0, "the window has edge tiles");
}

/// `refine` reports whether anything happened.
#[test]
fn test_refine_command() {
	let mut terrain = flat_terrain();
	let camera = overview_camera(0.0);
	terrain.frame(&camera);
	assert!(!terrain.refine(&camera, 1.0e-6, 1.0, 1.0), "flat mesh over flat terrain");
}

#[test]
fn test_strided_order() {
	let cells = (0..4).flat_map(|y| (0..4).map(move |x| IVec2::new(x, y)));
	let order = strided_order(cells);
	assert_eq!(order.len(), 16);
	assert_eq!(&order[..4], &[
		IVec2::new(0, 0),
		IVec2::new(3, 0),
		IVec2::new(0, 3),
		IVec2::new(3, 3)
	]);
}

// =========================================================================
// Batch 3: Upload, Draw, Backup
// =========================================================================

/// Uploads land at the slot's regions and only dirty tiles upload again.
#[test]
fn test_upload_and_draw() {
	let mut terrain = flat_terrain();
	terrain.frame(&overview_camera(0.0));
	let layout = *terrain.layout();
	let mut sink = RecordingSink::with_buffer(layout.buffer_size(terrain.pool().capacity()));

	let uploaded = terrain.upload(&mut sink);
	assert_eq!(uploaded, terrain.visible().draw.len());
	for &(_, handle) in &terrain.visible().draw {
		let tile = terrain.pool().get(handle).unwrap();
		let indices = sink.read_indices(layout.index_region(handle.slot()), tile.index_count());
		assert_eq!(indices, tile.indices());
	}

	sink.clear();
	assert_eq!(terrain.upload(&mut sink), 0, "nothing changed since the last upload");

	let drawn = terrain.draw(&mut sink);
	assert_eq!(drawn, terrain.visible().draw.len());
	assert!(sink.draws.iter().all(|d| d.index_count > 0));
}

/// Restoring a backup undoes refinement.
#[test]
fn test_backup_restore() {
	let mut terrain = refining_terrain();
	let camera = overview_camera(0.0);
	terrain.frame(&camera);
	let backup = terrain.backup();
	let triangles = terrain.triangle_count();
	assert_eq!(backup.triangle_count(), triangles);

	for _ in 0..3 {
		terrain.frame(&camera);
	}
	assert_ne!(terrain.triangle_count(), triangles);

	terrain.restore(&backup);
	assert_eq!(terrain.triangle_count(), triangles);
}
