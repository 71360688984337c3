use super::*;
use crate::geometry::Frustum;
use crate::tile::{TileCapacity, TilePool};
use glam::{Mat4, Vec3};

fn quadtree() -> Quadtree {
	Quadtree::new(&TerrainConfig::default())
}

fn handles(count: usize) -> Vec<TileHandle> {
	let mut pool = TilePool::new(
		count,
		TileCapacity {
			vertices: 4,
			indices: 6,
			new_points: 1,
			border_triangles: 2,
		},
	);
	(0..count)
		.map(|i| pool.acquire(Rect::from_min_side(Vec2::splat(i as f32), 1.0)).unwrap())
		.collect()
}

// =========================================================================
// Batch 1: Cell Addressing
// =========================================================================

/// Default window is 4x4 cells centered on the origin.
#[test]
fn test_initial_window() {
	let qt = quadtree();
	assert_eq!(qt.cells(), 4);
	assert_eq!(qt.origin(), IVec2::new(-2, -2));
	let rect = qt.window_rect();
	assert_eq!(rect.min, Vec2::splat(-500.0));
	assert_eq!(rect.max, Vec2::splat(500.0));
}

/// Cell lookup floors and cell rectangles are absolute.
#[test]
fn test_cell_at_and_rect() {
	let qt = quadtree();
	assert_eq!(qt.cell_at(Vec2::new(-0.1, 0.0)), IVec2::new(-1, 0));
	assert_eq!(qt.cell_at(Vec2::new(250.0, 499.0)), IVec2::new(1, 1));
	let rect = qt.cell_rect(IVec2::new(-1, 1));
	assert_eq!(rect.min, Vec2::new(-250.0, 250.0));
	assert_eq!(rect.max, Vec2::new(0.0, 500.0));
}

/// Binding is limited to cells inside the window.
#[test]
fn test_set_get() {
	let mut qt = quadtree();
	let h = handles(1)[0];
	assert_eq!(qt.set(IVec2::new(1, -2), Some(h)), None);
	assert_eq!(qt.get(IVec2::new(1, -2)), Some(h));
	assert_eq!(qt.set(IVec2::new(2, 0), Some(h)), None, "outside the window");
	assert_eq!(qt.get(IVec2::new(2, 0)), None);
	assert_eq!(qt.occupied(), 1);
}

/// Neighborhood slots follow the (dy + 1) * 3 + (dx + 1) layout.
#[test]
fn test_neighborhood_layout() {
	let mut qt = quadtree();
	let hs = handles(3);
	qt.set(IVec2::new(0, 0), Some(hs[0]));
	qt.set(IVec2::new(1, 0), Some(hs[1]));
	qt.set(IVec2::new(-1, -1), Some(hs[2]));

	let n = qt.neighborhood(IVec2::new(0, 0));
	assert_eq!(n[4], Some(hs[0]));
	assert_eq!(n[5], Some(hs[1]));
	assert_eq!(n[0], Some(hs[2]));
	assert_eq!(n.iter().flatten().count(), 3);

	// Corner cell: neighbors outside the window resolve to None.
	let edge = qt.neighborhood(IVec2::new(1, 1));
	assert_eq!(edge[0], Some(hs[0]));
	assert!(edge[8].is_none());
}

// =========================================================================
// Batch 2: Window Shifting
// =========================================================================

/// A camera well inside the window causes no shift.
#[test]
fn test_no_shift_inside() {
	let mut qt = quadtree();
	assert!(qt.shift(Vec2::new(100.0, -200.0)).is_empty());
	assert_eq!(qt.origin(), IVec2::new(-2, -2));
}

/// Approaching the east edge shifts one column and evicts the west column.
#[test]
fn test_shift_east_evicts_west_column() {
	let mut qt = quadtree();
	let hs = handles(2);
	qt.set(IVec2::new(-2, 0), Some(hs[0]));
	qt.set(IVec2::new(-1, 0), Some(hs[1]));

	let evicted = qt.shift(Vec2::new(450.0, 0.0));
	assert_eq!(evicted, vec![hs[0]]);
	assert_eq!(qt.origin(), IVec2::new(-1, -2));
	assert_eq!(qt.get(IVec2::new(-1, 0)), Some(hs[1]), "surviving cell keeps its binding");
	assert!(!qt.contains_cell(IVec2::new(-2, 0)));
}

/// Moving diagonally shifts both axes in one call.
#[test]
fn test_shift_diagonal() {
	let mut qt = quadtree();
	qt.shift(Vec2::new(-460.0, -460.0));
	assert_eq!(qt.origin(), IVec2::new(-3, -3));
	let rect = qt.window_rect();
	assert!(rect.min.x <= -460.0 - 100.0);
}

/// A teleport re-centers the window on the camera and evicts everything.
#[test]
fn test_teleport_recenters() {
	let mut qt = quadtree();
	let hs = handles(2);
	qt.set(IVec2::new(0, 0), Some(hs[0]));
	qt.set(IVec2::new(1, 1), Some(hs[1]));

	let mut evicted = qt.shift(Vec2::new(100_000.0, 0.0));
	evicted.sort_by_key(|h| h.slot());
	assert_eq!(evicted, hs);
	assert_eq!(qt.occupied(), 0);
	assert!(qt.window_rect().contains(Vec2::new(100_000.0, 0.0)));
	assert!(qt.shift(Vec2::new(100_000.0, 0.0)).is_empty(), "already centered");
}

/// Non-finite camera positions leave the window alone.
#[test]
fn test_shift_ignores_nan() {
	let mut qt = quadtree();
	assert!(qt.shift(Vec2::new(f32::NAN, 0.0)).is_empty());
	assert_eq!(qt.origin(), IVec2::new(-2, -2));
}

// =========================================================================
// Batch 3: Visibility
// =========================================================================

fn top_down_frustum() -> Frustum {
	let proj = Mat4::perspective_rh_gl(90f32.to_radians(), 1.0, 1.0, 5000.0);
	let view = Mat4::look_at_rh(Vec3::new(0.0, 2000.0, 0.0), Vec3::ZERO, Vec3::NEG_Z);
	Frustum::from_view_projection(&(proj * view))
}

/// Looking down on the whole window: bound cells are drawn, the rest generated.
#[test]
fn test_visibility_splits_draw_and_generate() {
	let mut qt = quadtree();
	let hs = handles(2);
	qt.set(IVec2::new(0, 0), Some(hs[0]));
	qt.set(IVec2::new(-2, 1), Some(hs[1]));

	let mut sets = VisibleSets::default();
	visible_cells(&qt, &top_down_frustum(), [-500.0, 500.0], &mut sets);
	assert_eq!(sets.draw.len(), 2);
	assert_eq!(sets.generate.len(), 14);
	assert!(sets.draw.contains(&(IVec2::new(0, 0), hs[0])));
	assert!(!sets.generate.contains(&IVec2::new(-2, 1)));
}

/// Cells behind the camera are skipped.
#[test]
fn test_visibility_culls_behind() {
	let qt = quadtree();
	let proj = Mat4::perspective_rh_gl(60f32.to_radians(), 1.0, 0.1, 1000.0);
	let view = Mat4::look_at_rh(Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, 10.0, -100.0), Vec3::Y);
	let frustum = Frustum::from_view_projection(&(proj * view));

	let mut sets = VisibleSets::default();
	visible_cells(&qt, &frustum, [-500.0, 500.0], &mut sets);
	assert!(sets.generate.contains(&IVec2::new(0, -1)), "cell in front is visible");
	assert!(!sets.generate.contains(&IVec2::new(0, 1)), "cell behind is culled");
	assert!(sets.generate.len() < 16);
}
