//! Frustum walk over the implicit quadtree.
//!
//! Starting from the whole window, each node's XZ rectangle (extruded over
//! the configured height range) is tested against the frustum; visible nodes
//! split into four quadrants until single cells remain.

use glam::IVec2;

use crate::geometry::Frustum;
use crate::tile::TileHandle;

use super::Quadtree;

/// Output of one visibility pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VisibleSets {
	/// Visible cells that already hold a tile.
	pub draw: Vec<(IVec2, TileHandle)>,
	/// Visible cells with no tile yet.
	pub generate: Vec<IVec2>,
}

impl VisibleSets {
	pub fn clear(&mut self) {
		self.draw.clear();
		self.generate.clear();
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.draw.is_empty() && self.generate.is_empty()
	}
}

/// Collect the visible cells of `quadtree` into `out`.
#[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "quadtree::visible_cells"))]
pub fn visible_cells(
	quadtree: &Quadtree,
	frustum: &Frustum,
	height_range: [f32; 2],
	out: &mut VisibleSets,
) {
	out.clear();
	visit(quadtree, frustum, height_range, quadtree.origin(), quadtree.cells(), out);
}

fn visit(
	quadtree: &Quadtree,
	frustum: &Frustum,
	height_range: [f32; 2],
	min_cell: IVec2,
	size: i32,
	out: &mut VisibleSets,
) {
	let side = quadtree.tile_side();
	let rect = crate::geometry::Rect::from_min_side(min_cell.as_vec2() * side, side * size as f32);
	if !frustum.intersects_rect(&rect, height_range[0], height_range[1]) {
		return;
	}

	if size == 1 {
		match quadtree.get(min_cell) {
			Some(handle) => out.draw.push((min_cell, handle)),
			None => out.generate.push(min_cell),
		}
		return;
	}

	let half = size / 2;
	for quadrant in [IVec2::new(0, 0), IVec2::new(1, 0), IVec2::new(0, 1), IVec2::new(1, 1)] {
		visit(quadtree, frustum, height_range, min_cell + quadrant * half, half, out);
	}
}
