//! Fixed-capacity arena of tiles addressed by generation-checked handles.
//!
//! Releasing a slot bumps its generation, so any handle still held for the
//! old binding (in a quadtree snapshot, a stale draw list, ...) stops
//! resolving instead of silently aliasing the slot's next tile.

use crate::geometry::Rect;
use crate::types::NEIGHBORHOOD;

use super::{Tile, TileCapacity};

/// Stable reference to a live tile slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileHandle {
	index: u32,
	generation: u32,
}

impl TileHandle {
	/// Slot index, also the tile's position in the pooled GPU buffers.
	#[inline]
	pub fn slot(&self) -> usize {
		self.index as usize
	}

	#[inline]
	pub fn generation(&self) -> u32 {
		self.generation
	}
}

#[derive(Clone, Debug)]
struct Slot {
	tile: Tile,
	generation: u32,
	in_use: bool,
}

/// Fixed set of tile slots.
#[derive(Clone, Debug)]
pub struct TilePool {
	slots: Vec<Slot>,
	free: Vec<u32>,
}

impl TilePool {
	/// Allocate `capacity` tiles, all free.
	pub fn new(capacity: usize, tile_capacity: TileCapacity) -> Self {
		let slots = (0..capacity)
			.map(|_| Slot {
				tile: Tile::new(tile_capacity),
				generation: 0,
				in_use: false,
			})
			.collect();
		// Pop order hands out slot 0 first.
		let free = (0..capacity as u32).rev().collect();
		Self { slots, free }
	}

	#[inline]
	pub fn capacity(&self) -> usize {
		self.slots.len()
	}

	#[inline]
	pub fn in_use(&self) -> usize {
		self.slots.len() - self.free.len()
	}

	#[inline]
	pub fn is_full(&self) -> bool {
		self.free.is_empty()
	}

	/// Bind a free slot to `rect`. The tile starts empty and ungenerated.
	pub fn acquire(&mut self, rect: Rect) -> Option<TileHandle> {
		let index = self.free.pop()?;
		let slot = &mut self.slots[index as usize];
		slot.in_use = true;
		slot.tile.reset(rect);
		Some(TileHandle {
			index,
			generation: slot.generation,
		})
	}

	/// Free the slot behind `handle`. Returns false for stale handles.
	pub fn release(&mut self, handle: TileHandle) -> bool {
		if !self.is_live(handle) {
			return false;
		}
		let slot = &mut self.slots[handle.slot()];
		slot.in_use = false;
		slot.generation = slot.generation.wrapping_add(1);
		slot.tile.clear();
		self.free.push(handle.index);
		true
	}

	/// Free every slot and invalidate every outstanding handle.
	pub fn clear(&mut self) {
		self.free.clear();
		for (index, slot) in self.slots.iter_mut().enumerate().rev() {
			if slot.in_use {
				slot.generation = slot.generation.wrapping_add(1);
				slot.in_use = false;
			}
			slot.tile.clear();
			self.free.push(index as u32);
		}
	}

	#[inline]
	pub fn is_live(&self, handle: TileHandle) -> bool {
		self.slots
			.get(handle.slot())
			.is_some_and(|s| s.in_use && s.generation == handle.generation)
	}

	#[inline]
	pub fn get(&self, handle: TileHandle) -> Option<&Tile> {
		self.slots
			.get(handle.slot())
			.filter(|s| s.in_use && s.generation == handle.generation)
			.map(|s| &s.tile)
	}

	#[inline]
	pub fn get_mut(&mut self, handle: TileHandle) -> Option<&mut Tile> {
		self.slots
			.get_mut(handle.slot())
			.filter(|s| s.in_use && s.generation == handle.generation)
			.map(|s| &mut s.tile)
	}

	/// Resolve a live generated tile.
	#[inline]
	pub fn generated(&self, handle: Option<TileHandle>) -> Option<&Tile> {
		handle.and_then(|h| self.get(h)).filter(|t| t.is_generated())
	}

	/// Mutable access to up to nine distinct tiles at once.
	///
	/// Stale or duplicate handles resolve to `None`.
	pub fn neighborhood_mut(
		&mut self,
		handles: &[Option<TileHandle>; NEIGHBORHOOD],
	) -> [Option<&mut Tile>; NEIGHBORHOOD] {
		let mut tiles: [Option<&mut Tile>; NEIGHBORHOOD] = Default::default();
		for (index, slot) in self.slots.iter_mut().enumerate() {
			if !slot.in_use {
				continue;
			}
			let generation = slot.generation;
			let Some(k) = handles.iter().position(|h| {
				h.is_some_and(|h| h.slot() == index && h.generation == generation)
			}) else {
				continue;
			};
			tiles[k] = Some(&mut slot.tile);
		}
		tiles
	}

	/// Live tiles with their handles.
	pub fn iter(&self) -> impl Iterator<Item = (TileHandle, &Tile)> {
		self.slots.iter().enumerate().filter(|(_, s)| s.in_use).map(|(i, s)| {
			(
				TileHandle {
					index: i as u32,
					generation: s.generation,
				},
				&s.tile,
			)
		})
	}

	/// Live tiles with their handles, mutably.
	pub fn iter_mut(&mut self) -> impl Iterator<Item = (TileHandle, &mut Tile)> {
		self.slots
			.iter_mut()
			.enumerate()
			.filter(|(_, s)| s.in_use)
			.map(|(i, s)| {
				(
					TileHandle {
						index: i as u32,
						generation: s.generation,
					},
					&mut s.tile,
				)
			})
	}
}

#[cfg(test)]
#[path = "pool_test.rs"]
mod pool_test;
