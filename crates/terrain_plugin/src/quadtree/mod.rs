//! Sliding quadtree window over the infinite ground plane.
//!
//! The tree is implicit: only the 2^L x 2^L leaf cells are stored, as an
//! index of tile handles. Inner nodes are computed on demand during the
//! visibility pass from cell coordinates.
//!
//! # Coordinates
//!
//! Cells are addressed by absolute integer coordinates `(cx, cy)` where cell
//! `c` spans `[c.x * side, (c.x + 1) * side] x [c.y * side, (c.y + 1) * side]`
//! in world XZ. The window covers `origin .. origin + n` on both axes and
//! moves by whole cells, so a cell keeps its world rectangle for as long as
//! it stays inside the window.

pub mod visibility;

use glam::{IVec2, Vec2};

use crate::config::TerrainConfig;
use crate::geometry::Rect;
use crate::tile::TileHandle;
use crate::types::{neighborhood_offset, NEIGHBORHOOD};

pub use visibility::{visible_cells, VisibleSets};

/// Leaf-cell index of the window.
#[derive(Clone, Debug, PartialEq)]
pub struct Quadtree {
	levels: u32,
	cells: i32,
	tile_side: f32,
	shift_distance: f32,
	origin: IVec2,
	slots: Vec<Option<TileHandle>>,
}

impl Quadtree {
	/// Empty window centered on the world origin.
	pub fn new(config: &TerrainConfig) -> Self {
		let cells = config.window_cells() as i32;
		Self {
			levels: config.quadtree_levels,
			cells,
			tile_side: config.tile_side_length,
			shift_distance: config.shift_distance,
			origin: IVec2::splat(-cells / 2),
			slots: vec![None; (cells * cells) as usize],
		}
	}

	#[inline]
	pub fn levels(&self) -> u32 {
		self.levels
	}

	/// Cells per window side.
	#[inline]
	pub fn cells(&self) -> i32 {
		self.cells
	}

	#[inline]
	pub fn tile_side(&self) -> f32 {
		self.tile_side
	}

	/// Absolute coordinate of the window's minimum cell.
	#[inline]
	pub fn origin(&self) -> IVec2 {
		self.origin
	}

	/// World rectangle covered by the window.
	#[inline]
	pub fn window_rect(&self) -> Rect {
		let min = self.origin.as_vec2() * self.tile_side;
		Rect::from_min_side(min, self.tile_side * self.cells as f32)
	}

	/// World rectangle of cell `cell`.
	#[inline]
	pub fn cell_rect(&self, cell: IVec2) -> Rect {
		// Both corners from cell coordinates, so neighbors share edges bit for bit.
		Rect::new(
			cell.as_vec2() * self.tile_side,
			(cell + IVec2::ONE).as_vec2() * self.tile_side,
		)
	}

	/// Cell containing ground position `pos` (half-open on the max side).
	#[inline]
	pub fn cell_at(&self, pos: Vec2) -> IVec2 {
		(pos / self.tile_side).floor().as_ivec2()
	}

	#[inline]
	pub fn contains_cell(&self, cell: IVec2) -> bool {
		let local = cell - self.origin;
		local.x >= 0 && local.y >= 0 && local.x < self.cells && local.y < self.cells
	}

	#[inline]
	fn slot_index(&self, cell: IVec2) -> Option<usize> {
		self
			.contains_cell(cell)
			.then(|| {
				let local = cell - self.origin;
				(local.y * self.cells + local.x) as usize
			})
	}

	/// Handle bound to `cell`, if the cell is inside the window and occupied.
	#[inline]
	pub fn get(&self, cell: IVec2) -> Option<TileHandle> {
		self.slot_index(cell).and_then(|i| self.slots[i])
	}

	/// Bind or unbind `cell`. Returns the previous handle.
	///
	/// Cells outside the window are ignored.
	pub fn set(&mut self, cell: IVec2, handle: Option<TileHandle>) -> Option<TileHandle> {
		let index = self.slot_index(cell)?;
		std::mem::replace(&mut self.slots[index], handle)
	}

	/// Handles of `cell` and its eight neighbors, in neighborhood order.
	pub fn neighborhood(&self, cell: IVec2) -> [Option<TileHandle>; NEIGHBORHOOD] {
		std::array::from_fn(|i| self.get(cell + neighborhood_offset(i)))
	}

	/// Occupied cells with their handles.
	pub fn iter(&self) -> impl Iterator<Item = (IVec2, TileHandle)> + '_ {
		self.slots.iter().enumerate().filter_map(|(i, h)| {
			let local = IVec2::new(i as i32 % self.cells, i as i32 / self.cells);
			h.map(|h| (self.origin + local, h))
		})
	}

	#[inline]
	pub fn occupied(&self) -> usize {
		self.slots.iter().filter(|h| h.is_some()).count()
	}

	/// Unbind every cell, returning the handles that were bound.
	pub fn clear(&mut self) -> Vec<TileHandle> {
		self.slots.iter_mut().filter_map(Option::take).collect()
	}

	/// Move the window so `camera` sits at least `shift_distance` inside it.
	///
	/// The window moves one cell at a time per axis until the camera is far
	/// enough from both edges. Cells that fall off are unbound and their
	/// handles returned so the caller can release them. A jump further than
	/// the window width re-centers the window and evicts everything.
	pub fn shift(&mut self, camera: Vec2) -> Vec<TileHandle> {
		let delta = self.shift_delta(camera);
		if delta == IVec2::ZERO {
			return Vec::new();
		}

		if delta.x.abs() >= self.cells || delta.y.abs() >= self.cells {
			let evicted = self.clear();
			self.origin = self.cell_at(camera) - IVec2::splat(self.cells / 2);
			tracing::debug!(
				origin = ?self.origin,
				evicted = evicted.len(),
				"quadtree window re-centered"
			);
			return evicted;
		}

		let old_origin = self.origin;
		let new_origin = old_origin + delta;
		let mut slots = vec![None; self.slots.len()];
		let mut evicted = Vec::new();
		for (i, handle) in self.slots.iter_mut().enumerate() {
			let Some(handle) = handle.take() else {
				continue;
			};
			let cell = old_origin + IVec2::new(i as i32 % self.cells, i as i32 / self.cells);
			let local = cell - new_origin;
			if local.x >= 0 && local.y >= 0 && local.x < self.cells && local.y < self.cells {
				slots[(local.y * self.cells + local.x) as usize] = Some(handle);
			} else {
				evicted.push(handle);
			}
		}
		self.slots = slots;
		self.origin = new_origin;
		tracing::debug!(
			origin = ?self.origin,
			shift = ?delta,
			evicted = evicted.len(),
			"quadtree window shifted"
		);
		evicted
	}

	/// Re-center on `camera` without keeping any bindings.
	pub fn reset(&mut self, camera: Vec2) -> Vec<TileHandle> {
		let evicted = self.clear();
		self.origin = self.cell_at(camera) - IVec2::splat(self.cells / 2);
		evicted
	}

	/// Whole-cell offset the window needs to keep `camera` inside.
	fn shift_delta(&self, camera: Vec2) -> IVec2 {
		let side = self.tile_side;
		let span = side * self.cells as f32;
		let axis = |cam: f32, origin: i32| -> i32 {
			if !cam.is_finite() {
				return 0;
			}
			let mut delta = 0;
			// A shift never needs more than one window plus a cell.
			for _ in 0..=self.cells + 1 {
				let min = (origin + delta) as f32 * side;
				if cam - self.shift_distance < min {
					delta -= 1;
				} else if cam + self.shift_distance > min + span {
					delta += 1;
				} else {
					return delta;
				}
			}
			// Teleport: jump straight to the camera's cell.
			(cam / side).floor() as i32 - self.cells / 2 - origin
		};
		IVec2::new(axis(camera.x, self.origin.x), axis(camera.y, self.origin.y))
	}
}

#[cfg(test)]
#[path = "quadtree_test.rs"]
mod quadtree_test;
