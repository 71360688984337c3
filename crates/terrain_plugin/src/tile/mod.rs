//! Tile mesh store.
//!
//! A tile owns the triangulation of one quadtree cell:
//!
//! - `vertices`: index-stable, append-only until the tile is reset
//! - `indices`: three corners per triangle, wound counter-clockwise seen from +Y
//! - `circles`: cached circumcircle per triangle, written only at creation
//! - `adjacency`: three entries per triangle, entry `k` describes the edge
//!   from corner `k` to corner `(k + 1) % 3`
//! - `border`: every triangle with at least one non-`Local` edge
//! - `pending`: refinement candidates queued by the error metric
//!
//! Every array has a fixed capacity taken from the configuration. Triangle
//! removal is a tile-local swap-with-last that rewrites every reference to
//! the moved triangle inside the tile.

pub mod pool;

use glam::{Vec2, Vec3};

use crate::error::CapacityError;
use crate::geometry::{Circumcircle, Rect};
use crate::types::{same_edge, Adjacency, PendingPoint, Vertex};

pub use pool::{TileHandle, TilePool};

/// Fixed array capacities of one tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileCapacity {
	pub vertices: usize,
	pub indices: usize,
	pub new_points: usize,
	pub border_triangles: usize,
}

impl TileCapacity {
	#[inline]
	pub fn triangles(&self) -> usize {
		self.indices / 3
	}
}

/// Part of a tile's buffers that changed since the last upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirtyRange {
	/// Lowest index-buffer position that changed.
	pub first_index: usize,
	/// Current index count; indices in `first_index..index_count` must be copied.
	pub index_count: usize,
	/// Vertex count at the previous upload.
	pub first_vertex: usize,
	/// Current vertex count; vertices in `first_vertex..vertex_count` are new.
	pub vertex_count: usize,
}

impl DirtyRange {
	#[inline]
	pub fn vertex_delta(&self) -> usize {
		self.vertex_count - self.first_vertex
	}
}

/// Triangulated mesh of one quadtree cell.
#[derive(Clone, Debug)]
pub struct Tile {
	rect: Rect,
	generated: bool,
	capacity: TileCapacity,
	vertices: Vec<Vertex>,
	indices: Vec<u32>,
	circles: Vec<Circumcircle>,
	adjacency: Vec<Adjacency>,
	border: Vec<u32>,
	pending: Vec<PendingPoint>,
	lowest_changed_index: Option<usize>,
	uploaded_vertices: usize,
}

impl Tile {
	/// Empty tile with every array allocated up front.
	pub fn new(capacity: TileCapacity) -> Self {
		Self {
			rect: Rect::new(glam::Vec2::ZERO, glam::Vec2::ZERO),
			generated: false,
			capacity,
			vertices: Vec::with_capacity(capacity.vertices),
			indices: Vec::with_capacity(capacity.indices),
			circles: Vec::with_capacity(capacity.triangles()),
			adjacency: Vec::with_capacity(capacity.indices),
			border: Vec::with_capacity(capacity.border_triangles),
			pending: Vec::with_capacity(capacity.new_points),
			lowest_changed_index: None,
			uploaded_vertices: 0,
		}
	}

	/// Drop all mesh data and bind the tile to `rect`, ungenerated.
	pub fn reset(&mut self, rect: Rect) {
		self.clear();
		self.rect = rect;
	}

	/// Drop all mesh data.
	pub fn clear(&mut self) {
		self.generated = false;
		self.vertices.clear();
		self.indices.clear();
		self.circles.clear();
		self.adjacency.clear();
		self.border.clear();
		self.pending.clear();
		self.lowest_changed_index = Some(0);
		self.uploaded_vertices = 0;
	}

	// =====================================================================
	// Accessors
	// =====================================================================

	#[inline]
	pub fn rect(&self) -> &Rect {
		&self.rect
	}

	#[inline]
	pub fn capacity(&self) -> &TileCapacity {
		&self.capacity
	}

	#[inline]
	pub fn is_generated(&self) -> bool {
		self.generated
	}

	#[inline]
	pub(crate) fn set_generated(&mut self) {
		self.generated = true;
	}

	#[inline]
	pub fn vertex_count(&self) -> usize {
		self.vertices.len()
	}

	#[inline]
	pub fn index_count(&self) -> usize {
		self.indices.len()
	}

	#[inline]
	pub fn triangle_count(&self) -> usize {
		self.circles.len()
	}

	#[inline]
	pub fn vertices(&self) -> &[Vertex] {
		&self.vertices
	}

	#[inline]
	pub fn indices(&self) -> &[u32] {
		&self.indices
	}

	#[inline]
	pub fn adjacency(&self) -> &[Adjacency] {
		&self.adjacency
	}

	#[inline]
	pub fn circles(&self) -> &[Circumcircle] {
		&self.circles
	}

	#[inline]
	pub fn border_triangles(&self) -> &[u32] {
		&self.border
	}

	#[inline]
	pub fn pending(&self) -> &[PendingPoint] {
		&self.pending
	}

	#[inline]
	pub fn vertex(&self, index: u32) -> &Vertex {
		&self.vertices[index as usize]
	}

	#[inline]
	pub fn circle(&self, triangle: u32) -> &Circumcircle {
		&self.circles[triangle as usize]
	}

	/// True if `triangle` exists and its circumcircle holds `p`.
	#[inline]
	pub fn circle_contains(&self, triangle: u32, p: Vec2) -> bool {
		self.circles.get(triangle as usize).is_some_and(|c| c.contains(p))
	}

	#[inline]
	pub fn corners(&self, triangle: u32) -> [u32; 3] {
		let base = triangle as usize * 3;
		[self.indices[base], self.indices[base + 1], self.indices[base + 2]]
	}

	#[inline]
	pub fn corner_vertices(&self, triangle: u32) -> [Vertex; 3] {
		self.corners(triangle).map(|i| self.vertices[i as usize])
	}

	#[inline]
	pub fn edge_adjacency(&self, triangle: u32, edge: usize) -> Adjacency {
		self.adjacency[triangle as usize * 3 + edge]
	}

	/// Corner indices of edge `edge` of `triangle`.
	#[inline]
	pub fn edge_corners(&self, triangle: u32, edge: usize) -> [u32; 2] {
		let c = self.corners(triangle);
		[c[edge], c[(edge + 1) % 3]]
	}

	/// Positions of edge `edge` of `triangle`.
	#[inline]
	pub fn edge_positions(&self, triangle: u32, edge: usize) -> [Vec3; 2] {
		self.edge_corners(triangle, edge).map(|i| self.vertices[i as usize].position)
	}

	/// Edge of `triangle` whose endpoints match `a` and `b` in either order.
	pub fn find_edge(&self, triangle: u32, a: Vec3, b: Vec3) -> Option<usize> {
		(0..3).find(|&k| {
			let [p, q] = self.edge_positions(triangle, k);
			same_edge(p, q, a, b)
		})
	}

	/// True if any edge of `triangle` leaves the tile.
	#[inline]
	pub fn has_border_edge(&self, triangle: u32) -> bool {
		let base = triangle as usize * 3;
		self.adjacency[base..base + 3].iter().any(|a| !a.is_local())
	}

	// =====================================================================
	// Mesh mutation
	// =====================================================================

	/// Append a vertex, returning its index.
	pub fn push_vertex(&mut self, vertex: Vertex) -> Result<u32, CapacityError> {
		if self.vertices.len() >= self.capacity.vertices {
			return Err(CapacityError::Vertices(self.capacity.vertices));
		}
		self.vertices.push(vertex);
		Ok((self.vertices.len() - 1) as u32)
	}

	/// Append a triangle and compute its circumcircle.
	///
	/// The border list is not touched; see [`Tile::refresh_border`].
	pub fn push_triangle(
		&mut self,
		corners: [u32; 3],
		adjacency: [Adjacency; 3],
	) -> Result<u32, CapacityError> {
		if self.indices.len() + 3 > self.capacity.indices {
			return Err(CapacityError::Indices(self.capacity.indices));
		}
		let positions = corners.map(|i| self.vertices[i as usize].position);
		let index = self.circles.len();
		self.mark_changed(index * 3);
		self.indices.extend_from_slice(&corners);
		self.adjacency.extend_from_slice(&adjacency);
		self.circles.push(Circumcircle::from_corners(positions));
		Ok(index as u32)
	}

	#[inline]
	pub fn set_adjacency(&mut self, triangle: u32, edge: usize, adjacency: Adjacency) {
		self.adjacency[triangle as usize * 3 + edge] = adjacency;
	}

	/// Rewrite the edge of `triangle` that points at `Local(old)`.
	///
	/// Returns false if `triangle` does not exist or no edge referenced `old`.
	pub fn replace_local(&mut self, triangle: u32, old: u32, new: Adjacency) -> bool {
		let base = triangle as usize * 3;
		let Some(edges) = self.adjacency.get_mut(base..base + 3) else {
			return false;
		};
		match edges.iter().position(|a| *a == Adjacency::Local(old)) {
			Some(k) => {
				edges[k] = new;
				true
			}
			None => false,
		}
	}

	/// Remove `triangle` by moving the last triangle into its slot.
	///
	/// Every reference to the moved triangle inside this tile follows it:
	/// adjacency of its local neighbors, the border list, pending points and
	/// `tracked` (indices the caller still needs, such as freshly created
	/// triangles). Pending points whose origin was `triangle` are re-pointed
	/// to a tracked triangle whose circumcircle contains them.
	pub fn swap_remove_triangle(&mut self, triangle: u32, tracked: &mut [u32]) {
		if triangle as usize >= self.circles.len() {
			return;
		}
		let last = (self.circles.len() - 1) as u32;

		if let Some(pos) = self.border.iter().position(|&b| b == triangle) {
			self.border.swap_remove(pos);
		}

		for point in &mut self.pending {
			if point.triangle == triangle {
				let p = point.vertex.xz();
				point.triangle = tracked
					.iter()
					.copied()
					.find(|&t| self.circles[t as usize].contains(p))
					.or_else(|| tracked.first().copied())
					.unwrap_or(0);
			}
		}

		if triangle != last {
			let (t, l) = (triangle as usize, last as usize);
			for k in 0..3 {
				self.indices[t * 3 + k] = self.indices[l * 3 + k];
				self.adjacency[t * 3 + k] = self.adjacency[l * 3 + k];
			}
			self.circles[t] = self.circles[l];

			for k in 0..3 {
				if let Adjacency::Local(n) = self.adjacency[t * 3 + k] {
					if n != last {
						self.replace_local(n, last, Adjacency::Local(triangle));
					}
				}
			}
			for b in &mut self.border {
				if *b == last {
					*b = triangle;
				}
			}
			for point in &mut self.pending {
				if point.triangle == last {
					point.triangle = triangle;
				}
			}
			for t in tracked.iter_mut() {
				if *t == last {
					*t = triangle;
				}
			}
			self.mark_changed(t * 3);
		}

		let new_len = last as usize;
		self.indices.truncate(new_len * 3);
		self.adjacency.truncate(new_len * 3);
		self.circles.truncate(new_len);
		self.mark_changed(new_len * 3);
	}

	// =====================================================================
	// Border list
	// =====================================================================

	#[inline]
	pub fn is_listed_border(&self, triangle: u32) -> bool {
		self.border.contains(&triangle)
	}

	/// Add or remove `triangle` from the border list to match its edges.
	///
	/// Returns false if the triangle needed listing but the list is full.
	pub fn refresh_border(&mut self, triangle: u32) -> bool {
		let listed = self.border.iter().position(|&b| b == triangle);
		match (self.has_border_edge(triangle), listed) {
			(true, None) => {
				if self.border.len() >= self.capacity.border_triangles {
					return false;
				}
				self.border.push(triangle);
				true
			}
			(false, Some(pos)) => {
				self.border.swap_remove(pos);
				true
			}
			_ => true,
		}
	}

	/// Recompute the border list from scratch. Only used at (re)generation.
	pub fn rebuild_border(&mut self) -> Result<(), CapacityError> {
		self.border.clear();
		for t in 0..self.circles.len() as u32 {
			if self.has_border_edge(t) {
				if self.border.len() >= self.capacity.border_triangles {
					return Err(CapacityError::BorderTriangles(self.capacity.border_triangles));
				}
				self.border.push(t);
			}
		}
		Ok(())
	}

	// =====================================================================
	// Pending points
	// =====================================================================

	/// Queue a refinement candidate. Returns false when the queue is full.
	pub fn push_pending(&mut self, point: PendingPoint) -> bool {
		if self.pending.len() >= self.capacity.new_points {
			return false;
		}
		self.pending.push(point);
		true
	}

	/// Take the newest pending point.
	#[inline]
	pub fn pop_pending(&mut self) -> Option<PendingPoint> {
		self.pending.pop()
	}

	#[inline]
	pub fn clear_pending(&mut self) {
		self.pending.clear();
	}

	// =====================================================================
	// Upload tracking
	// =====================================================================

	#[inline]
	fn mark_changed(&mut self, index_position: usize) {
		self.lowest_changed_index = Some(match self.lowest_changed_index {
			Some(lowest) => lowest.min(index_position),
			None => index_position,
		});
	}

	/// Whether anything changed since the last [`Tile::take_dirty`].
	#[inline]
	pub fn is_dirty(&self) -> bool {
		self.lowest_changed_index.is_some() || self.uploaded_vertices != self.vertices.len()
	}

	/// Current dirty range without marking the tile clean.
	pub fn dirty_range(&self) -> Option<DirtyRange> {
		if !self.is_dirty() {
			return None;
		}
		let first_index = self
			.lowest_changed_index
			.unwrap_or(self.indices.len())
			.min(self.indices.len());
		Some(DirtyRange {
			first_index,
			index_count: self.indices.len(),
			first_vertex: self.uploaded_vertices.min(self.vertices.len()),
			vertex_count: self.vertices.len(),
		})
	}

	/// Return the range changed since the last upload and mark it clean.
	pub fn take_dirty(&mut self) -> Option<DirtyRange> {
		let range = self.dirty_range()?;
		self.lowest_changed_index = None;
		self.uploaded_vertices = self.vertices.len();
		Some(range)
	}
}
