//! Reusable scratch buffers for cavity search and re-triangulation.
//!
//! One `Workspace` is created from the configuration at startup and passed by
//! `&mut` into every generate and refine call. Every buffer has a fixed
//! capacity; a push past it returns a `CapacityError` and the caller abandons
//! the current unit of work before touching any tile.

use std::collections::VecDeque;

use glam::Vec3;
use smallvec::SmallVec;

use crate::error::CapacityError;
use crate::types::{Adjacency, Vertex};

/// Maximum number of vertices copied into other tiles by one insertion.
pub const MAX_MOVED_POINTS: usize = 10;

/// Fixed capacities of the scratch buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct WorkspaceCapacity {
	/// Triangles removed by a single insertion.
	pub max_cavity: usize,
	/// Cavity edges before shared edges are dropped.
	pub max_edges: usize,
	/// Triangles tested during one cavity search.
	pub max_seen: usize,
	/// Triangles created by a single insertion.
	pub max_new_triangles: usize,
	/// Points in one batch triangulation, bootstrap points included.
	pub max_batch_points: usize,
	/// Existing triangles a batch has to close against.
	pub max_seam_triangles: usize,
}

impl WorkspaceCapacity {
	pub const DEFAULT: Self = Self {
		max_cavity: 100,
		max_edges: 300,
		max_seen: 150,
		max_new_triangles: 100,
		max_batch_points: 8192,
		max_seam_triangles: 16384,
	};
}

impl Default for WorkspaceCapacity {
	fn default() -> Self {
		Self::DEFAULT
	}
}

/// Reference to a triangle inside a 3x3 neighborhood.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct TriangleRef {
	/// Neighborhood slot of the owning tile.
	pub tile: usize,
	pub triangle: u32,
}

/// One edge of a cavity triangle.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CavityEdge {
	pub owner: TriangleRef,
	/// Tile-local corner indices in the owner.
	pub corners: [u32; 2],
	pub positions: [Vertex; 2],
	/// What the owner had across this edge.
	pub adjacency: Adjacency,
	/// Set when another cavity triangle has the same edge.
	pub shared: bool,
}

/// Corner of a planned triangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Corner {
	/// Vertex already stored, or planned, in the target tile.
	Index(u32),
	/// The point being inserted; its index is fixed at commit time.
	Point,
}

/// Triangle planned by one insertion, not yet written.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PlannedTriangle {
	/// Boundary edge this triangle closes.
	pub edge: usize,
	/// Neighborhood slot receiving the triangle.
	pub target: usize,
	/// Index it will get in the target tile.
	pub index: u32,
	pub corners: [Corner; 3],
	/// Positions of corners 0 and 1 (the boundary edge, wound).
	pub edge_positions: [Vec3; 2],
	pub adjacency: [Adjacency; 3],
}

/// Vertex copied into another tile during migration.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MovedPoint {
	pub tile: usize,
	pub vertex: Vertex,
	pub index: u32,
}

/// Adjacency change outside the new triangles, applied at commit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Fixup {
	/// Rewrite the edge of `triangle` that is `Local(old)`.
	ReplaceLocal {
		tile: usize,
		triangle: u32,
		old: u32,
		new: Adjacency,
	},
	/// Overwrite edge `edge` of `triangle`.
	Set {
		tile: usize,
		triangle: u32,
		edge: usize,
		adjacency: Adjacency,
	},
}

impl Fixup {
	#[inline]
	pub fn target(&self) -> (usize, u32) {
		match *self {
			Fixup::ReplaceLocal { tile, triangle, .. } | Fixup::Set { tile, triangle, .. } => {
				(tile, triangle)
			}
		}
	}
}

/// Scratch state for cavity search and triangle planning.
#[derive(Debug)]
pub struct Workspace {
	capacity: WorkspaceCapacity,
	pub(crate) queue: VecDeque<TriangleRef>,
	pub(crate) seen: Vec<TriangleRef>,
	pub(crate) cavity: Vec<TriangleRef>,
	pub(crate) edges: Vec<CavityEdge>,
	pub(crate) planned: Vec<PlannedTriangle>,
	pub(crate) moved: SmallVec<[MovedPoint; MAX_MOVED_POINTS]>,
	pub(crate) fixups: Vec<Fixup>,
}

impl Workspace {
	/// Allocate every buffer at its full capacity.
	pub fn new(capacity: WorkspaceCapacity) -> Self {
		Self {
			capacity,
			queue: VecDeque::with_capacity(capacity.max_seen),
			seen: Vec::with_capacity(capacity.max_seen),
			cavity: Vec::with_capacity(capacity.max_cavity),
			edges: Vec::with_capacity(capacity.max_edges),
			planned: Vec::with_capacity(capacity.max_new_triangles),
			moved: SmallVec::new(),
			fixups: Vec::with_capacity(capacity.max_edges),
		}
	}

	#[inline]
	pub fn capacity(&self) -> &WorkspaceCapacity {
		&self.capacity
	}

	/// Forget everything from the previous insertion.
	pub fn reset(&mut self) {
		self.queue.clear();
		self.seen.clear();
		self.cavity.clear();
		self.edges.clear();
		self.planned.clear();
		self.moved.clear();
		self.fixups.clear();
	}

	/// Mark a triangle as visited and queue it for the circle test.
	///
	/// Returns `Ok(false)` if it was visited already.
	pub(crate) fn visit(&mut self, triangle: TriangleRef) -> Result<bool, CapacityError> {
		if self.seen.contains(&triangle) {
			return Ok(false);
		}
		push_bounded(&mut self.seen, triangle, self.capacity.max_seen, CapacityError::Seen)?;
		self.queue.push_back(triangle);
		Ok(true)
	}

	pub(crate) fn push_cavity(&mut self, triangle: TriangleRef) -> Result<(), CapacityError> {
		push_bounded(&mut self.cavity, triangle, self.capacity.max_cavity, CapacityError::Cavity)
	}

	pub(crate) fn push_edge(&mut self, edge: CavityEdge) -> Result<(), CapacityError> {
		push_bounded(&mut self.edges, edge, self.capacity.max_edges, CapacityError::Edges)
	}

	pub(crate) fn push_planned(&mut self, triangle: PlannedTriangle) -> Result<(), CapacityError> {
		push_bounded(
			&mut self.planned,
			triangle,
			self.capacity.max_new_triangles,
			CapacityError::NewTriangles,
		)
	}

	pub(crate) fn push_fixup(&mut self, fixup: Fixup) -> Result<(), CapacityError> {
		push_bounded(&mut self.fixups, fixup, self.capacity.max_edges, CapacityError::Edges)
	}

	pub(crate) fn push_moved(&mut self, point: MovedPoint) -> Result<(), CapacityError> {
		if self.moved.len() >= MAX_MOVED_POINTS {
			return Err(CapacityError::MovedPoints(MAX_MOVED_POINTS));
		}
		self.moved.push(point);
		Ok(())
	}
}

impl Default for Workspace {
	fn default() -> Self {
		Self::new(WorkspaceCapacity::DEFAULT)
	}
}

/// Push onto `vec` unless it already holds `cap` items.
#[inline]
pub(crate) fn push_bounded<T>(
	vec: &mut Vec<T>,
	value: T,
	cap: usize,
	err: fn(usize) -> CapacityError,
) -> Result<(), CapacityError> {
	if vec.len() >= cap {
		return Err(err(cap));
	}
	vec.push(value);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_visit_deduplicates() {
		let mut ws = Workspace::default();
		let t = TriangleRef { tile: 4, triangle: 7 };
		assert_eq!(ws.visit(t), Ok(true));
		assert_eq!(ws.visit(t), Ok(false));
		assert_eq!(ws.queue.len(), 1);
	}

	#[test]
	fn test_seen_capacity_is_enforced() {
		let mut ws = Workspace::new(WorkspaceCapacity {
			max_seen: 2,
			..WorkspaceCapacity::DEFAULT
		});
		assert!(ws.visit(TriangleRef { tile: 4, triangle: 0 }).is_ok());
		assert!(ws.visit(TriangleRef { tile: 4, triangle: 1 }).is_ok());
		assert_eq!(
			ws.visit(TriangleRef { tile: 4, triangle: 2 }),
			Err(CapacityError::Seen(2))
		);
		assert_eq!(ws.seen.len(), 2, "overflow must not grow the buffer");
	}

	#[test]
	fn test_moved_points_cap() {
		let mut ws = Workspace::default();
		for i in 0..MAX_MOVED_POINTS {
			ws.push_moved(MovedPoint {
				tile: 5,
				vertex: Vertex::default(),
				index: i as u32,
			})
			.unwrap();
		}
		assert!(matches!(
			ws.push_moved(MovedPoint {
				tile: 5,
				vertex: Vertex::default(),
				index: 99,
			}),
			Err(CapacityError::MovedPoints(_))
		));
	}

	#[test]
	fn test_reset_clears_all() {
		let mut ws = Workspace::default();
		ws.visit(TriangleRef { tile: 4, triangle: 0 }).unwrap();
		ws.push_cavity(TriangleRef { tile: 4, triangle: 0 }).unwrap();
		ws.reset();
		assert!(ws.seen.is_empty() && ws.queue.is_empty() && ws.cavity.is_empty());
	}
}
