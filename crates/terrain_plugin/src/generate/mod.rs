//! Super-tile generation.
//!
//! Freshly visible cells are triangulated together in one flat
//! Bowyer-Watson mesh, then split back into per-tile storage:
//!
//! 1. Existing triangles reaching into the batch margin are collected,
//!    along with their open edges that face the batch ("walls").
//! 2. Scaffolding: four far corners plus a ring around the batch margin.
//! 3. Wall endpoints, so seams line up with tiles that already exist.
//! 4. A staggered `grid_side x grid_side` sample grid per cell. Samples on
//!    existing terrain or inside a wall triangle's circumcircle are skipped,
//!    which keeps every wall a Delaunay edge of the flat mesh.
//! 5. Triangles touching scaffolding, leaving the margin or overlapping an
//!    existing triangle are dropped. The rest go to the cell holding their
//!    centroid, then grow into gaps that refined neighbors left behind.
//! 6. Per-cell adjacency is re-emitted. Flat edges that coincide with a wall
//!    become mirrored `Border` pairs; walls left over fall back to `Unknown`.
//!
//! Nothing is written to the pool until every cell of the batch is known to
//! fit its tile, so an abandoned batch leaves no trace.

mod flat;

use std::collections::VecDeque;

use glam::{IVec2, Vec2};

use crate::config::ADJUST_PERCENTAGE;
use crate::error::CapacityError;
use crate::geometry::{orientation, Circumcircle, Rect};
use crate::quadtree::Quadtree;
use crate::sampler::HeightOracle;
use crate::tile::{Tile, TileHandle, TilePool};
use crate::types::{Adjacency, Direction};
use crate::workspace::{push_bounded, WorkspaceCapacity};

use flat::FlatMesh;

/// Slack of the seam geometry tests, in tile sides.
const SEAM_TOLERANCE: f32 = 1.0e-5;

/// Summary of one generated batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GenerateStats {
	/// Tiles written.
	pub tiles: usize,
	/// Triangles written across all tiles.
	pub triangles: usize,
	/// Vertices written across all tiles.
	pub vertices: usize,
	/// Points copied from neighbor walls.
	pub border_points: usize,
	/// Neighbor walls closed with mirrored `Border` edges.
	pub resolved_edges: usize,
	/// Neighbor `Border` edges facing the batch that found no partner.
	pub demoted_edges: usize,
}

impl GenerateStats {
	pub fn accumulate(&mut self, other: &GenerateStats) {
		self.tiles += other.tiles;
		self.triangles += other.triangles;
		self.vertices += other.vertices;
		self.border_points += other.border_points;
		self.resolved_edges += other.resolved_edges;
		self.demoted_edges += other.demoted_edges;
	}
}

/// Existing triangle near the batch, on the ground plane.
#[derive(Clone, Copy, Debug)]
struct SeamTriangle {
	corners: [Vec2; 3],
	bounds: Rect,
}

/// Open edge of an existing tile that the batch closes against.
#[derive(Clone, Copy, Debug)]
struct Wall {
	handle: TileHandle,
	cell: IVec2,
	triangle: u32,
	edge: usize,
	/// Flat indices of both endpoints, smaller first.
	key: [u32; 2],
	/// Circumcircle of the existing triangle.
	circle: Circumcircle,
	/// Batch cell whose triangle closed the edge.
	partner: Option<IVec2>,
}

/// Per-cell totals, checked against the tile before anything is written.
#[derive(Clone, Copy, Debug, Default)]
struct CellCount {
	vertices: usize,
	triangles: usize,
	border: usize,
}

/// Bulk triangulator for newly visible cells.
///
/// Every buffer is sized from [`WorkspaceCapacity`] up front; a batch that
/// would need more abandons with a [`CapacityError`].
#[derive(Debug)]
pub struct Generator {
	flat: FlatMesh,
	grid_side: u32,
	max_seam: usize,
	seam: Vec<SeamTriangle>,
	walls: Vec<Wall>,
	/// Per flat triangle: free of scaffolding and existing terrain.
	eligible: Vec<bool>,
	owner: Vec<Option<usize>>,
	/// Per flat triangle: its index in the owner's tile.
	local: Vec<u32>,
	/// Per flat point: its index in the tile being counted or written.
	remap: Vec<u32>,
	queue: VecDeque<u32>,
	counts: Vec<CellCount>,
}

impl Generator {
	pub fn new(grid_side: u32, capacity: &WorkspaceCapacity) -> Self {
		let flat = FlatMesh::new(capacity.max_batch_points);
		let triangles = flat.max_triangles();
		Self {
			grid_side,
			max_seam: capacity.max_seam_triangles,
			seam: Vec::with_capacity(capacity.max_seam_triangles),
			walls: Vec::with_capacity(capacity.max_seam_triangles),
			eligible: Vec::with_capacity(triangles),
			owner: Vec::with_capacity(triangles),
			local: Vec::with_capacity(triangles),
			remap: Vec::with_capacity(capacity.max_batch_points),
			queue: VecDeque::with_capacity(triangles),
			counts: Vec::new(),
			flat,
		}
	}

	#[inline]
	pub fn grid_side(&self) -> u32 {
		self.grid_side
	}

	/// Triangulate `batch` and write it into its freshly acquired tiles.
	///
	/// Batch cells must not be bound in `quadtree` yet; every other bound,
	/// generated cell is treated as an existing neighbor. On error nothing in
	/// `pool` has been modified.
	#[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "generate::batch"))]
	pub fn generate(
		&mut self,
		batch: &[(IVec2, TileHandle)],
		quadtree: &Quadtree,
		pool: &mut TilePool,
		oracle: &HeightOracle,
	) -> Result<GenerateStats, CapacityError> {
		let mut stats = GenerateStats::default();
		let Some(&(first, _)) = batch.first() else {
			return Ok(stats);
		};
		let side = quadtree.tile_side();
		let tolerance = side * SEAM_TOLERANCE;
		let combined = batch
			.iter()
			.fold(quadtree.cell_rect(first), |acc, &(c, _)| acc.union(&quadtree.cell_rect(c)));
		let claim = combined.expand(ADJUST_PERCENTAGE * side);

		{
			#[cfg(feature = "profiling")]
			let _span = tracing::info_span!("generate::triangulate").entered();

			self.collect_seam(batch, &claim, quadtree, pool)?;
			let (seam, walls) = (&self.seam, &self.walls);
			self
				.flat
				.bootstrap(combined.expand(side), side, |p| !blocked(seam, walls, p, tolerance))?;
			stats.border_points = self.insert_walls(pool)?;
			for &(cell, _) in batch {
				self.insert_grid(&quadtree.cell_rect(cell), side, tolerance, oracle)?;
			}
		}

		self.assign_cells(batch, &claim, quadtree, tolerance);
		self.count_cells(batch, pool)?;

		for (bi, &(cell, handle)) in batch.iter().enumerate() {
			let Some(tile) = pool.get_mut(handle) else {
				continue;
			};
			tile.reset(quadtree.cell_rect(cell));
			self.write_cell(batch, bi, tile)?;
			tile.set_generated();
			stats.tiles += 1;
			stats.triangles += self.counts[bi].triangles;
			stats.vertices += self.counts[bi].vertices;
		}

		let (resolved, demoted) = self.close_walls(pool);
		stats.resolved_edges = resolved;
		stats.demoted_edges = demoted;

		tracing::debug!(
			tiles = stats.tiles,
			triangles = stats.triangles,
			border_points = stats.border_points,
			resolved = stats.resolved_edges,
			demoted = stats.demoted_edges,
			"generated batch"
		);
		Ok(stats)
	}

	/// Collect existing triangles that reach into `claim`, then the open
	/// edges of neighbor tiles that face the batch.
	fn collect_seam(
		&mut self,
		batch: &[(IVec2, TileHandle)],
		claim: &Rect,
		quadtree: &Quadtree,
		pool: &TilePool,
	) -> Result<(), CapacityError> {
		self.seam.clear();
		self.walls.clear();
		let side = quadtree.tile_side();
		let reach = claim.expand(side * SEAM_TOLERANCE);
		let neighbors = neighbor_cells(batch);

		for &cell in &neighbors {
			let Some(tile) = pool.generated(quadtree.get(cell)) else {
				continue;
			};
			for t in 0..tile.triangle_count() as u32 {
				let corners = tile.corner_vertices(t).map(|v| v.xz());
				let bounds = bounds_of(&corners);
				if bounds.intersects(&reach) {
					push_bounded(
						&mut self.seam,
						SeamTriangle { corners, bounds },
						self.max_seam,
						CapacityError::SeamTriangles,
					)?;
				}
			}
		}

		for &cell in &neighbors {
			let Some(handle) = quadtree.get(cell) else {
				continue;
			};
			let Some(tile) = pool.generated(Some(handle)) else {
				continue;
			};
			for &t in tile.border_triangles() {
				for k in 0..3 {
					if !self.faces_batch(tile, cell, t, k, batch, claim, quadtree, pool) {
						continue;
					}
					let wall = Wall {
						handle,
						cell,
						triangle: t,
						edge: k,
						key: [0; 2],
						circle: *tile.circle(t),
						partner: None,
					};
					push_bounded(&mut self.walls, wall, self.max_seam, CapacityError::SeamEdges)?;
				}
			}
		}
		Ok(())
	}

	/// True if edge `k` of triangle `t` of the tile at `cell` is open towards
	/// the batch.
	///
	/// A `Border` edge into a batch cell always is. Other `Unknown` or stale
	/// `Border` edges are when the ground just past them lies inside `claim`
	/// and no existing triangle covers it.
	#[allow(clippy::too_many_arguments)]
	fn faces_batch(
		&self,
		tile: &Tile,
		cell: IVec2,
		t: u32,
		k: usize,
		batch: &[(IVec2, TileHandle)],
		claim: &Rect,
		quadtree: &Quadtree,
		pool: &TilePool,
	) -> bool {
		match tile.edge_adjacency(t, k) {
			Adjacency::Local(_) => return false,
			Adjacency::Border(d) => {
				let across = cell + d.offset();
				if batch_index(batch, across).is_some() {
					return true;
				}
				if pool.generated(quadtree.get(across)).is_some() {
					return false;
				}
			}
			Adjacency::Unknown => {}
		}
		let past = outward_point(tile, t, k, quadtree.tile_side());
		claim.contains(past) && !covered(&self.seam, past, 0.0)
	}

	/// Insert both endpoints of every wall and key the walls by flat index.
	/// Returns the number of points this added.
	fn insert_walls(&mut self, pool: &TilePool) -> Result<usize, CapacityError> {
		let before = self.flat.points().len();
		for w in 0..self.walls.len() {
			let wall = self.walls[w];
			let Some(tile) = pool.get(wall.handle) else {
				continue;
			};
			let [a, b] = tile.edge_corners(wall.triangle, wall.edge).map(|c| *tile.vertex(c));
			let ia = self.flat.insert(a)?;
			let ib = self.flat.insert(b)?;
			self.walls[w].key = [ia.min(ib), ia.max(ib)];
		}
		self.walls.sort_unstable_by_key(|w| w.key);
		Ok(self.flat.points().len() - before)
	}

	/// Staggered sample grid; edge rows and columns sit exactly on the cell
	/// border so adjacent cells produce identical seam samples.
	fn insert_grid(
		&mut self,
		rect: &Rect,
		side: f32,
		tolerance: f32,
		oracle: &HeightOracle,
	) -> Result<(), CapacityError> {
		let g = self.grid_side;
		let last = (g - 1) as f32;
		for r in 0..g {
			let z = if r == 0 {
				rect.min.y
			} else if r == g - 1 {
				rect.max.y
			} else {
				rect.min.y + r as f32 / last * side
			};
			let stagger = (side / g as f32) * 0.5 * (r % 2) as f32;
			for c in 0..g {
				let x = if c == 0 {
					rect.min.x
				} else if c == g - 1 {
					rect.max.x
				} else {
					rect.min.x + c as f32 / last * side + stagger
				};
				let p = Vec2::new(x, z);
				if self.flat.index_of(p).is_some() || blocked(&self.seam, &self.walls, p, tolerance) {
					continue;
				}
				self.flat.insert(oracle.vertex(x, z))?;
			}
		}
		Ok(())
	}

	/// Give every flat triangle a batch cell, or none.
	fn assign_cells(&mut self, batch: &[(IVec2, TileHandle)], claim: &Rect, quadtree: &Quadtree, tolerance: f32) {
		let count = self.flat.triangles().len() as u32;
		let side = quadtree.tile_side();
		self.eligible.clear();
		self.owner.clear();
		self.queue.clear();

		for t in 0..count {
			let eligible = self.is_eligible(t, claim, side, tolerance);
			let owner = eligible
				.then(|| batch_index(batch, quadtree.cell_at(self.flat.centroid(t))))
				.flatten();
			if owner.is_some() {
				self.queue.push_back(t);
			}
			self.eligible.push(eligible);
			self.owner.push(owner);
		}

		// Eligible triangles outside every batch cell fill gaps along jagged
		// seams; they join the cell they are reached from.
		while let Some(t) = self.queue.pop_front() {
			let owner = self.owner[t as usize];
			for n in self.flat.adjacency(t).into_iter().flatten() {
				if self.eligible[n as usize] && self.owner[n as usize].is_none() {
					self.owner[n as usize] = owner;
					self.queue.push_back(n);
				}
			}
		}
	}

	/// A flat triangle may be kept when it has no scaffolding corner, stays
	/// inside `claim`, is no longer than a tile side and overlaps no existing
	/// triangle.
	fn is_eligible(&self, t: u32, claim: &Rect, side: f32, tolerance: f32) -> bool {
		if self.flat.touches_bootstrap(t) || self.flat.max_edge_length(t) > side {
			return false;
		}
		let corners = self.flat.positions(t).map(crate::geometry::xz);
		if !corners.iter().all(|&c| claim.contains(c)) {
			return false;
		}
		let bounds = bounds_of(&corners);
		!self
			.seam
			.iter()
			.any(|s| s.bounds.intersects(&bounds) && overlaps(&corners, &s.corners, tolerance))
	}

	/// Number every cell's triangles and check each cell against its tile.
	fn count_cells(&mut self, batch: &[(IVec2, TileHandle)], pool: &TilePool) -> Result<(), CapacityError> {
		let count = self.flat.triangles().len();
		self.counts.clear();
		self.counts.resize(batch.len(), CellCount::default());
		self.local.clear();
		self.local.resize(count, u32::MAX);

		for t in 0..count {
			let Some(bi) = self.owner[t] else {
				continue;
			};
			let border = self
				.flat
				.adjacency(t as u32)
				.iter()
				.any(|n| n.map_or(true, |n| self.owner[n as usize] != Some(bi)));
			let cell = &mut self.counts[bi];
			self.local[t] = cell.triangles as u32;
			cell.triangles += 1;
			cell.border += usize::from(border);
		}

		for (bi, &(_, handle)) in batch.iter().enumerate() {
			self.counts[bi].vertices = self.distinct_vertices(bi);
			let Some(tile) = pool.get(handle) else {
				continue;
			};
			let capacity = tile.capacity();
			let cell = self.counts[bi];
			if cell.vertices > capacity.vertices {
				return Err(CapacityError::Vertices(capacity.vertices));
			}
			if cell.triangles * 3 > capacity.indices {
				return Err(CapacityError::Indices(capacity.indices));
			}
			if cell.border > capacity.border_triangles {
				return Err(CapacityError::BorderTriangles(capacity.border_triangles));
			}
		}
		Ok(())
	}

	/// Points used by the triangles of cell `bi`.
	fn distinct_vertices(&mut self, bi: usize) -> usize {
		self.remap.clear();
		self.remap.resize(self.flat.points().len(), u32::MAX);
		let mut distinct = 0;
		for (t, corners) in self.flat.triangles().iter().enumerate() {
			if self.owner[t] != Some(bi) {
				continue;
			}
			for &c in corners {
				if self.remap[c as usize] == u32::MAX {
					self.remap[c as usize] = 0;
					distinct += 1;
				}
			}
		}
		distinct
	}

	/// Copy cell `bi` into its (reset) tile.
	fn write_cell(&mut self, batch: &[(IVec2, TileHandle)], bi: usize, tile: &mut Tile) -> Result<(), CapacityError> {
		self.remap.clear();
		self.remap.resize(self.flat.points().len(), u32::MAX);
		for t in 0..self.flat.triangles().len() as u32 {
			if self.owner[t as usize] != Some(bi) {
				continue;
			}
			let flat_corners = self.flat.triangles()[t as usize];
			let mut corners = [0u32; 3];
			for (corner, &c) in corners.iter_mut().zip(&flat_corners) {
				if self.remap[c as usize] == u32::MAX {
					self.remap[c as usize] = tile.push_vertex(self.flat.points()[c as usize])?;
				}
				*corner = self.remap[c as usize];
			}
			let adjacency = self.emit_adjacency(batch, bi, t);
			tile.push_triangle(corners, adjacency)?;
		}
		tile.rebuild_border()?;
		Ok(())
	}

	/// Tile adjacency of flat triangle `t`, owned by cell `bi`.
	fn emit_adjacency(&mut self, batch: &[(IVec2, TileHandle)], bi: usize, t: u32) -> [Adjacency; 3] {
		let cell = batch[bi].0;
		let corners = self.flat.triangles()[t as usize];
		let across = self.flat.adjacency(t);
		let mut adjacency = [Adjacency::Unknown; 3];
		for k in 0..3 {
			let other = across[k].and_then(|n| self.owner[n as usize].map(|owner| (n, owner)));
			adjacency[k] = match other {
				Some((n, owner)) if owner == bi => Adjacency::Local(self.local[n as usize]),
				Some((_, owner)) => border_towards(batch[owner].0 - cell),
				None => self.close_wall([corners[k], corners[(k + 1) % 3]], cell),
			};
		}
		adjacency
	}

	/// Claim the wall on flat edge `edge` for `cell`, if there is one.
	fn close_wall(&mut self, edge: [u32; 2], cell: IVec2) -> Adjacency {
		let key = [edge[0].min(edge[1]), edge[0].max(edge[1])];
		let Ok(w) = self.walls.binary_search_by_key(&key, |w| w.key) else {
			return Adjacency::Unknown;
		};
		let wall = &mut self.walls[w];
		if wall.partner.is_some() {
			return Adjacency::Unknown;
		}
		match Direction::from_offset(wall.cell - cell) {
			Some(d) => {
				wall.partner = Some(cell);
				Adjacency::Border(d)
			}
			None => Adjacency::Unknown,
		}
	}

	/// Point matched walls back at the batch and demote the stale `Border`
	/// walls nothing closed.
	///
	/// Returns `(resolved, demoted)`.
	fn close_walls(&self, pool: &mut TilePool) -> (usize, usize) {
		let (mut resolved, mut demoted) = (0, 0);
		for wall in &self.walls {
			let Some(tile) = pool.get_mut(wall.handle) else {
				continue;
			};
			match wall.partner {
				Some(partner) => {
					tile.set_adjacency(wall.triangle, wall.edge, border_towards(partner - wall.cell));
					resolved += 1;
				}
				None => {
					if matches!(tile.edge_adjacency(wall.triangle, wall.edge), Adjacency::Border(_)) {
						tile.set_adjacency(wall.triangle, wall.edge, Adjacency::Unknown);
						demoted += 1;
					}
				}
			}
		}
		(resolved, demoted)
	}
}

#[inline]
fn border_towards(offset: IVec2) -> Adjacency {
	Direction::from_offset(offset)
		.map(Adjacency::Border)
		.unwrap_or(Adjacency::Unknown)
}

/// True if a new sample at `p` would land on existing terrain or inside the
/// circumcircle of a wall triangle.
fn blocked(seam: &[SeamTriangle], walls: &[Wall], p: Vec2, tolerance: f32) -> bool {
	covered(seam, p, tolerance)
		|| walls
			.iter()
			.any(|w| w.circle.center.distance(p) <= w.circle.radius_sq.sqrt() + tolerance)
}

/// True if a seam triangle holds `p`, edges and `tolerance` included.
fn covered(seam: &[SeamTriangle], p: Vec2, tolerance: f32) -> bool {
	seam.iter().any(|s| {
		s.bounds.expand(tolerance).contains(p)
			&& (0..3).all(|k| {
				let (a, b) = (s.corners[k], s.corners[(k + 1) % 3]);
				orientation(a, b, p) <= tolerance * a.distance(b)
			})
	})
}

/// True if the interiors of two wound triangles intersect deeper than
/// `tolerance`. Triangles sharing an edge or a corner do not overlap.
pub(crate) fn overlaps(a: &[Vec2; 3], b: &[Vec2; 3], tolerance: f32) -> bool {
	!separates(a, b, tolerance) && !separates(b, a, tolerance)
}

/// An edge of `a` with every corner of `b` on its outer side.
fn separates(a: &[Vec2; 3], b: &[Vec2; 3], tolerance: f32) -> bool {
	(0..3).any(|k| {
		let (p, q) = (a[k], a[(k + 1) % 3]);
		let slack = tolerance * p.distance(q);
		b.iter().all(|&c| orientation(p, q, c) >= -slack)
	})
}

#[inline]
fn bounds_of(corners: &[Vec2; 3]) -> Rect {
	Rect {
		min: corners[0].min(corners[1]).min(corners[2]),
		max: corners[0].max(corners[1]).max(corners[2]),
	}
}

#[inline]
fn batch_index(batch: &[(IVec2, TileHandle)], cell: IVec2) -> Option<usize> {
	batch.iter().position(|&(c, _)| c == cell)
}

/// Cells touching the batch (8-connected) that are not part of it.
fn neighbor_cells(batch: &[(IVec2, TileHandle)]) -> Vec<IVec2> {
	let mut cells = Vec::new();
	for &(cell, _) in batch {
		for d in Direction::ALL {
			let n = cell + d.offset();
			if batch_index(batch, n).is_none() && !cells.contains(&n) {
				cells.push(n);
			}
		}
	}
	cells
}

/// Point just past the midpoint of edge `k`, on the side away from the
/// triangle.
fn outward_point(tile: &Tile, triangle: u32, edge: usize, side: f32) -> Vec2 {
	let [a, b] = tile.edge_positions(triangle, edge).map(crate::geometry::xz);
	let [p, q, r] = tile.corner_vertices(triangle).map(|v| v.xz());
	let centroid = (p + q + r) / 3.0;
	let mid = (a + b) * 0.5;
	let mut normal = (b - a).perp().normalize_or_zero();
	if normal.dot(mid - centroid) < 0.0 {
		normal = -normal;
	}
	mid + normal * side * 1.0e-3
}

/// Split `cells` into 4-connected groups, each generated as one batch.
pub fn connected_batches(cells: &[IVec2]) -> Vec<Vec<IVec2>> {
	let mut remaining: Vec<IVec2> = cells.to_vec();
	let mut batches = Vec::new();
	while let Some(start) = remaining.pop() {
		let mut group = vec![start];
		let mut i = 0;
		while i < group.len() {
			let cell = group[i];
			for step in [IVec2::X, IVec2::NEG_X, IVec2::Y, IVec2::NEG_Y] {
				if let Some(pos) = remaining.iter().position(|&c| c == cell + step) {
					group.push(remaining.swap_remove(pos));
				}
			}
			i += 1;
		}
		batches.push(group);
	}
	batches
}
