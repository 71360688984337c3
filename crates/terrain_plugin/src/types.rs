//! Core mesh types shared by the generator, refiner and tile store.

use glam::{IVec2, Vec2, Vec3};

use crate::geometry::xz;

/// Number of tiles in a 3x3 neighborhood.
pub const NEIGHBORHOOD: usize = 9;

/// Index of the center tile within a 3x3 neighborhood.
pub const SELF_INDEX: usize = 4;

/// Offset of neighborhood slot `index` from its center, as (dx, dy).
#[inline]
pub const fn neighborhood_offset(index: usize) -> IVec2 {
	IVec2::new((index % 3) as i32 - 1, (index / 3) as i32 - 1)
}

/// Neighborhood slot for offset `(dx, dy)`, both in `-1..=1`.
#[inline]
pub fn neighborhood_index(offset: IVec2) -> Option<usize> {
	if offset.x.abs() > 1 || offset.y.abs() > 1 {
		return None;
	}
	Some(((offset.y + 1) * 3 + offset.x + 1) as usize)
}

/// Terrain vertex: world position plus curvature estimate.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vertex {
	pub position: Vec3,
	pub curvature: f32,
}

impl Vertex {
	#[inline]
	pub const fn new(position: Vec3, curvature: f32) -> Self {
		Self { position, curvature }
	}

	/// Ground-plane position.
	#[inline]
	pub fn xz(&self) -> Vec2 {
		xz(self.position)
	}

	/// GPU layout: `[x, y, z, curvature]`.
	#[inline]
	pub fn to_array(&self) -> [f32; 4] {
		[self.position.x, self.position.y, self.position.z, self.curvature]
	}

	/// Bit pattern of the position, for exact-position hashing.
	#[inline]
	pub fn position_bits(&self) -> [u32; 3] {
		[self.position.x.to_bits(), self.position.y.to_bits(), self.position.z.to_bits()]
	}
}

/// Offset from a tile to one of its eight neighbors.
///
/// Encoded as `(dy + 1) * 3 + (dx + 1)`, so the center value 4 never occurs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Direction(u8);

impl Direction {
	pub const WEST: Self = Self(3);
	pub const EAST: Self = Self(5);
	pub const SOUTH: Self = Self(1);
	pub const NORTH: Self = Self(7);

	/// All eight directions in encoding order.
	pub const ALL: [Self; 8] = [
		Self(0),
		Self(1),
		Self(2),
		Self(3),
		Self(5),
		Self(6),
		Self(7),
		Self(8),
	];

	/// Direction for a cell offset; `None` for zero or non-neighbor offsets.
	#[inline]
	pub fn from_offset(offset: IVec2) -> Option<Self> {
		match neighborhood_index(offset) {
			Some(SELF_INDEX) | None => None,
			Some(index) => Some(Self(index as u8)),
		}
	}

	/// Direction from neighborhood slot `from` towards slot `to`.
	#[inline]
	pub fn between(from: usize, to: usize) -> Option<Self> {
		Self::from_offset(neighborhood_offset(to) - neighborhood_offset(from))
	}

	#[inline]
	pub fn from_index(index: usize) -> Option<Self> {
		(index < NEIGHBORHOOD && index != SELF_INDEX).then_some(Self(index as u8))
	}

	/// Neighborhood slot this direction points at, seen from the center.
	#[inline]
	pub const fn index(self) -> usize {
		self.0 as usize
	}

	#[inline]
	pub const fn offset(self) -> IVec2 {
		neighborhood_offset(self.0 as usize)
	}

	#[inline]
	pub const fn opposite(self) -> Self {
		Self(8 - self.0)
	}
}

/// What lies across one triangle edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Adjacency {
	/// Triangle with this index in the same tile.
	Local(u32),
	/// Provisional tile border; the triangle across is not known yet.
	Unknown,
	/// Confirmed border with the neighbor tile in this direction.
	Border(Direction),
}

impl Adjacency {
	#[inline]
	pub fn local(self) -> Option<u32> {
		match self {
			Adjacency::Local(t) => Some(t),
			_ => None,
		}
	}

	#[inline]
	pub fn is_local(self) -> bool {
		matches!(self, Adjacency::Local(_))
	}
}

/// Candidate refinement point waiting in a tile's queue.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PendingPoint {
	pub vertex: Vertex,
	/// Triangle the error metric proposed this point for.
	pub triangle: u32,
}

/// Unordered edge comparison on exact positions.
#[inline]
pub fn same_edge(a0: Vec3, a1: Vec3, b0: Vec3, b1: Vec3) -> bool {
	(a0 == b0 && a1 == b1) || (a0 == b1 && a1 == b0)
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
