//! Flat Bowyer-Watson triangulation used for super-tile generation.
//!
//! Unlike the per-tile store this mesh has no capacity per triangle and no
//! border bookkeeping: it lives for one batch, then gets split into tiles.
//! Triangles follow the same winding and edge numbering as [`Tile`]:
//! edge `k` runs from corner `k` to corner `k + 1`, and `orientation < 0`.
//!
//! [`Tile`]: crate::tile::Tile

use std::collections::HashMap;

use glam::{Vec2, Vec3};

use crate::error::CapacityError;
use crate::geometry::{orientation, Circumcircle, Rect};
use crate::types::Vertex;

/// Distance of the super corners from the margin rectangle, in margin sizes.
const SUPER_SCALE: f32 = 4.0;

#[derive(Debug, Default)]
pub(crate) struct FlatMesh {
	points: Vec<Vertex>,
	lookup: HashMap<[u32; 2], u32>,
	triangles: Vec<[u32; 3]>,
	circles: Vec<Circumcircle>,
	adjacency: Vec<[Option<u32>; 3]>,
	bootstrap_count: u32,
	max_points: usize,
	/// Most recently created triangle, where point location starts.
	last: u32,
	// Scratch
	in_cavity: Vec<bool>,
	cavity: Vec<u32>,
	stack: Vec<u32>,
	boundary: Vec<([u32; 2], Option<u32>)>,
	slots: Vec<u32>,
}

impl FlatMesh {
	/// Allocate for `max_points` points.
	///
	/// A planar triangulation of n points has fewer than 2n triangles, so no
	/// buffer grows after this.
	pub fn new(max_points: usize) -> Self {
		let max_triangles = max_triangles(max_points);
		Self {
			points: Vec::with_capacity(max_points),
			lookup: HashMap::with_capacity(max_points),
			triangles: Vec::with_capacity(max_triangles),
			circles: Vec::with_capacity(max_triangles),
			adjacency: Vec::with_capacity(max_triangles),
			bootstrap_count: 0,
			max_points,
			last: 0,
			in_cavity: Vec::with_capacity(max_triangles),
			cavity: Vec::with_capacity(max_triangles),
			stack: Vec::with_capacity(max_triangles),
			boundary: Vec::with_capacity(max_triangles + 2),
			slots: Vec::with_capacity(max_triangles + 2),
		}
	}

	/// Triangle capacity for the point budget.
	#[inline]
	pub fn max_triangles(&self) -> usize {
		max_triangles(self.max_points)
	}

	/// Forget everything, keeping allocations.
	pub fn reset(&mut self) {
		self.points.clear();
		self.lookup.clear();
		self.triangles.clear();
		self.circles.clear();
		self.adjacency.clear();
		self.in_cavity.clear();
		self.bootstrap_count = 0;
		self.last = 0;
	}

	#[inline]
	pub fn points(&self) -> &[Vertex] {
		&self.points
	}

	/// Index of the point already stored at `p`.
	#[inline]
	pub fn index_of(&self, p: Vec2) -> Option<u32> {
		self.lookup.get(&[p.x.to_bits(), p.y.to_bits()]).copied()
	}

	#[inline]
	pub fn triangles(&self) -> &[[u32; 3]] {
		&self.triangles
	}

	#[inline]
	pub fn adjacency(&self, triangle: u32) -> [Option<u32>; 3] {
		self.adjacency[triangle as usize]
	}

	#[inline]
	pub fn circle(&self, triangle: u32) -> &Circumcircle {
		&self.circles[triangle as usize]
	}

	/// Number of scaffolding points inserted by [`FlatMesh::bootstrap`].
	#[inline]
	pub fn bootstrap_count(&self) -> u32 {
		self.bootstrap_count
	}

	/// True if any corner of `triangle` is a scaffolding point.
	#[inline]
	pub fn touches_bootstrap(&self, triangle: u32) -> bool {
		self.triangles[triangle as usize]
			.iter()
			.any(|&c| c < self.bootstrap_count)
	}

	#[inline]
	pub fn positions(&self, triangle: u32) -> [Vec3; 3] {
		self.triangles[triangle as usize].map(|c| self.points[c as usize].position)
	}

	#[inline]
	pub fn centroid(&self, triangle: u32) -> Vec2 {
		let [a, b, c] = self.triangles[triangle as usize].map(|i| self.points[i as usize].xz());
		(a + b + c) / 3.0
	}

	/// Longest XZ edge of `triangle`.
	pub fn max_edge_length(&self, triangle: u32) -> f32 {
		let [a, b, c] = self.triangles[triangle as usize].map(|i| self.points[i as usize].xz());
		a.distance(b).max(b.distance(c)).max(c.distance(a))
	}

	/// Seed the mesh with four far corners and a ring of points along `margin`.
	///
	/// Ring points are spaced `step` apart so the first real insertions see
	/// reasonably shaped cavities. Ring points `keep` rejects are left out.
	pub fn bootstrap(
		&mut self,
		margin: Rect,
		step: f32,
		keep: impl Fn(Vec2) -> bool,
	) -> Result<(), CapacityError> {
		self.reset();
		let center = margin.center();
		let reach = margin.size().max_element() * SUPER_SCALE;
		let corners = [
			center + Vec2::new(-reach, -reach),
			center + Vec2::new(reach, -reach),
			center + Vec2::new(reach, reach),
			center + Vec2::new(-reach, reach),
		];
		for c in corners {
			self.push_point(Vertex::new(Vec3::new(c.x, 0.0, c.y), 0.0))?;
		}
		let a = self.push_triangle(0, 1, 2);
		let b = self.push_triangle(0, 2, 3);
		self.link(a, b);
		self.last = b;

		let size = margin.size();
		let nx = ((size.x / step).round() as u32).max(1);
		let nz = ((size.y / step).round() as u32).max(1);
		let (min, max) = (margin.min, margin.max);
		let (fx, fz) = (nx as f32, nz as f32);
		let ring = (0..nx)
			.map(|i| Vec2::new(min.x + size.x * i as f32 / fx, min.y))
			.chain((0..nz).map(|i| Vec2::new(max.x, min.y + size.y * i as f32 / fz)))
			.chain((0..nx).map(|i| Vec2::new(max.x - size.x * i as f32 / fx, max.y)))
			.chain((0..nz).map(|i| Vec2::new(min.x, max.y - size.y * i as f32 / fz)));
		for p in ring {
			if keep(p) {
				self.insert(Vertex::new(Vec3::new(p.x, 0.0, p.y), 0.0))?;
			}
		}
		self.bootstrap_count = self.points.len() as u32;
		Ok(())
	}

	/// Insert a point, returning its index.
	///
	/// A point whose XZ position is already present returns the existing
	/// index. The mesh is untouched when the point budget is exhausted.
	pub fn insert(&mut self, vertex: Vertex) -> Result<u32, CapacityError> {
		let key = [vertex.position.x.to_bits(), vertex.position.z.to_bits()];
		if let Some(&existing) = self.lookup.get(&key) {
			return Ok(existing);
		}
		let p = vertex.xz();
		let Some(seed) = self.locate(p) else {
			// Outside every circumcircle: beyond the super corners.
			return Ok(self.push_point(vertex)?);
		};
		let index = self.push_point(vertex)?;

		self.collect_cavity(seed, p);
		self.collect_boundary();
		self.retriangulate(index);
		Ok(index)
	}

	/// A triangle whose circumcircle holds `p`.
	///
	/// Walks from the last created triangle towards `p`; a walk that leaves
	/// the mesh falls back to scanning every circle.
	fn locate(&self, p: Vec2) -> Option<u32> {
		let count = self.triangles.len() as u32;
		let mut t = self.last.min(count.checked_sub(1)?);
		for _ in 0..count {
			let corners = self.triangles[t as usize];
			let across = (0..3).find(|&k| {
				let a = self.points[corners[k] as usize].xz();
				let b = self.points[corners[(k + 1) % 3] as usize].xz();
				orientation(a, b, p) > 0.0
			});
			match across.and_then(|k| self.adjacency[t as usize][k]) {
				Some(next) => t = next,
				None => break,
			}
		}
		if self.circles[t as usize].contains(p) {
			return Some(t);
		}
		(0..count).find(|&t| self.circles[t as usize].contains(p))
	}

	fn push_point(&mut self, vertex: Vertex) -> Result<u32, CapacityError> {
		if self.points.len() >= self.max_points {
			return Err(CapacityError::BatchPoints(self.max_points));
		}
		let index = self.points.len() as u32;
		self
			.lookup
			.insert([vertex.position.x.to_bits(), vertex.position.z.to_bits()], index);
		self.points.push(vertex);
		Ok(index)
	}

	/// Append a triangle wound so that `orientation < 0`.
	fn push_triangle(&mut self, a: u32, b: u32, c: u32) -> u32 {
		let corners = self.wound(a, b, c);
		let index = self.triangles.len() as u32;
		self.circles.push(Circumcircle::from_corners(corners.map(|i| self.points[i as usize].position)));
		self.triangles.push(corners);
		self.adjacency.push([None; 3]);
		self.in_cavity.push(false);
		index
	}

	fn wound(&self, a: u32, b: u32, c: u32) -> [u32; 3] {
		let pa = self.points[a as usize].xz();
		let pb = self.points[b as usize].xz();
		let pc = self.points[c as usize].xz();
		if orientation(pa, pb, pc) < 0.0 {
			[a, b, c]
		} else {
			[b, a, c]
		}
	}

	/// Point the shared edge of `a` and `b` at each other.
	fn link(&mut self, a: u32, b: u32) {
		if let Some(k) = self.shared_edge(a, b) {
			self.adjacency[a as usize][k] = Some(b);
		}
		if let Some(k) = self.shared_edge(b, a) {
			self.adjacency[b as usize][k] = Some(a);
		}
	}

	/// Edge of `triangle` whose endpoints both belong to `other`.
	fn shared_edge(&self, triangle: u32, other: u32) -> Option<usize> {
		let t = self.triangles[triangle as usize];
		let o = self.triangles[other as usize];
		(0..3).find(|&k| o.contains(&t[k]) && o.contains(&t[(k + 1) % 3]))
	}

	/// Flood from `seed` through every connected triangle whose circle holds `p`.
	fn collect_cavity(&mut self, seed: u32, p: Vec2) {
		self.cavity.clear();
		self.stack.clear();
		self.in_cavity[seed as usize] = true;
		self.cavity.push(seed);
		self.stack.push(seed);
		while let Some(t) = self.stack.pop() {
			for n in self.adjacency[t as usize].into_iter().flatten() {
				if !self.in_cavity[n as usize] && self.circles[n as usize].contains(p) {
					self.in_cavity[n as usize] = true;
					self.cavity.push(n);
					self.stack.push(n);
				}
			}
		}
	}

	/// Cavity edges not shared with another cavity triangle.
	fn collect_boundary(&mut self) {
		self.boundary.clear();
		for &t in &self.cavity {
			let corners = self.triangles[t as usize];
			for k in 0..3 {
				let outer = self.adjacency[t as usize][k];
				if outer.is_some_and(|n| self.in_cavity[n as usize]) {
					continue;
				}
				self.boundary.push(([corners[k], corners[(k + 1) % 3]], outer));
			}
		}
	}

	/// Replace the cavity by a fan of triangles around `point`.
	fn retriangulate(&mut self, point: u32) {
		let first_new = self.triangles.len() as u32;
		let mut slots = std::mem::take(&mut self.slots);
		slots.clear();
		slots.extend((0..self.boundary.len()).map(|i| {
			self
				.cavity
				.get(i)
				.copied()
				.unwrap_or_else(|| first_new + (i - self.cavity.len()) as u32)
		}));
		// A star around an interior point always has two more triangles than
		// the cavity it replaces.
		debug_assert!(slots.len() >= self.cavity.len());

		let boundary = std::mem::take(&mut self.boundary);
		let p = self.points[point as usize].xz();
		for (i, &([a, b], outer)) in boundary.iter().enumerate() {
			let pa = self.points[a as usize].xz();
			let pb = self.points[b as usize].xz();
			let corners = if orientation(pa, pb, p) < 0.0 { [a, b, point] } else { [b, a, point] };
			let circle = Circumcircle::from_corners(corners.map(|c| self.points[c as usize].position));
			let slot = slots[i] as usize;
			if slot < self.triangles.len() {
				self.triangles[slot] = corners;
				self.circles[slot] = circle;
				self.adjacency[slot] = [outer, None, None];
				self.in_cavity[slot] = false;
			} else {
				self.triangles.push(corners);
				self.circles.push(circle);
				self.adjacency.push([outer, None, None]);
				self.in_cavity.push(false);
			}
		}

		for (i, &slot) in slots.iter().enumerate() {
			let [c0, c1, _] = self.triangles[slot as usize];
			for &other in &slots {
				if other == slot {
					continue;
				}
				let [o0, o1, _] = self.triangles[other as usize];
				if o0 == c1 {
					self.adjacency[slot as usize][1] = Some(other);
				}
				if o1 == c0 {
					self.adjacency[slot as usize][2] = Some(other);
				}
			}
			if let Some(outer) = boundary[i].1 {
				let outer_corners = self.triangles[outer as usize];
				if let Some(k) = (0..3).find(|&k| {
					let (x, y) = (outer_corners[k], outer_corners[(k + 1) % 3]);
					(x == c0 && y == c1) || (x == c1 && y == c0)
				}) {
					self.adjacency[outer as usize][k] = Some(slot);
				}
			}
		}
		if let Some(&first) = slots.first() {
			self.last = first;
		}
		self.boundary = boundary;
		self.slots = slots;
	}
}

#[inline]
fn max_triangles(max_points: usize) -> usize {
	2 * max_points
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::{Rng, SeedableRng};

	fn bootstrapped() -> FlatMesh {
		let mut mesh = FlatMesh::new(4096);
		mesh
			.bootstrap(Rect::new(Vec2::splat(-10.0), Vec2::splat(20.0)), 10.0, |_| true)
			.unwrap();
		mesh
	}

	fn vertex(x: f32, z: f32) -> Vertex {
		Vertex::new(Vec3::new(x, 0.0, z), 0.0)
	}

	/// Every triangle is wound the same way and adjacency is symmetric.
	fn assert_consistent(mesh: &FlatMesh) {
		for t in 0..mesh.triangles().len() as u32 {
			let [a, b, c] = mesh.positions(t).map(crate::geometry::xz);
			assert!(orientation(a, b, c) < 0.0, "triangle {t} wound the wrong way");
			for n in mesh.adjacency(t).into_iter().flatten() {
				assert!(mesh.adjacency(n).contains(&Some(t)), "{t} -> {n} not mirrored");
			}
		}
	}

	fn interior_circles(mesh: &FlatMesh) -> Vec<(i64, i64)> {
		let mut centers: Vec<_> = (0..mesh.triangles().len() as u32)
			.filter(|&t| !mesh.touches_bootstrap(t))
			.map(|t| {
				let c = mesh.circle(t).center;
				((c.x * 1000.0).round() as i64, (c.y * 1000.0).round() as i64)
			})
			.collect();
		centers.sort_unstable();
		centers
	}

	#[test]
	fn test_bootstrap_ring() {
		let mesh = bootstrapped();
		// 4 super corners + 3 ring points per side.
		assert_eq!(mesh.bootstrap_count(), 16);
		assert_consistent(&mesh);
	}

	#[test]
	fn test_duplicate_returns_existing_index() {
		let mut mesh = bootstrapped();
		let a = mesh.insert(vertex(1.0, 2.0)).unwrap();
		let before = mesh.triangles().len();
		assert_eq!(mesh.insert(vertex(1.0, 2.0)).unwrap(), a);
		assert_eq!(mesh.triangles().len(), before);
	}

	#[test]
	fn test_insert_keeps_delaunay() {
		let mut mesh = bootstrapped();
		let mut rng = rand::rngs::StdRng::seed_from_u64(7);
		for _ in 0..200 {
			let x = rng.random_range(0.0..10.0);
			let z = rng.random_range(0.0..10.0);
			mesh.insert(vertex(x, z)).unwrap();
		}
		assert_consistent(&mesh);
		for t in 0..mesh.triangles().len() as u32 {
			if mesh.touches_bootstrap(t) {
				continue;
			}
			let circle = mesh.circle(t);
			for (i, v) in mesh.points().iter().enumerate() {
				if mesh.triangles()[t as usize].contains(&(i as u32)) {
					continue;
				}
				assert!(!circle.contains(v.xz()), "point {i} inside circle of {t}");
			}
		}
	}

	#[test]
	fn test_point_budget() {
		let mut mesh = FlatMesh::new(17);
		mesh
			.bootstrap(Rect::new(Vec2::splat(-10.0), Vec2::splat(20.0)), 10.0, |_| true)
			.unwrap();
		assert!(mesh.insert(vertex(1.0, 1.0)).is_ok());
		let triangles = mesh.triangles().to_vec();
		assert_eq!(mesh.insert(vertex(2.0, 2.0)), Err(CapacityError::BatchPoints(17)));
		assert_eq!(mesh.triangles(), &triangles[..], "failed insert leaves the mesh alone");
	}

	/// Filling the whole point budget never reallocates a buffer.
	#[test]
	fn test_buffers_never_grow() {
		let mut mesh = FlatMesh::new(512);
		mesh
			.bootstrap(Rect::new(Vec2::splat(-10.0), Vec2::splat(20.0)), 10.0, |_| true)
			.unwrap();
		let capacities = |m: &FlatMesh| {
			[
				m.points.capacity(),
				m.triangles.capacity(),
				m.circles.capacity(),
				m.cavity.capacity(),
				m.boundary.capacity(),
				m.slots.capacity(),
			]
		};
		let before = capacities(&mesh);

		let mut rng = rand::rngs::StdRng::seed_from_u64(3);
		let mut inserted = 0;
		while mesh.insert(vertex(rng.random_range(0.0..10.0), rng.random_range(0.0..10.0))).is_ok() {
			inserted += 1;
		}
		assert_eq!(mesh.points().len(), 512);
		assert!(inserted > 400);
		assert!(mesh.triangles().len() <= mesh.max_triangles());
		assert_eq!(capacities(&mesh), before);
		assert_consistent(&mesh);
	}

	/// Ring points the filter rejects are never inserted.
	#[test]
	fn test_bootstrap_filter() {
		let mut mesh = FlatMesh::new(64);
		mesh
			.bootstrap(Rect::new(Vec2::splat(-10.0), Vec2::splat(20.0)), 10.0, |p| p.x > 0.0)
			.unwrap();
		assert!(mesh.points()[4..].iter().all(|v| v.position.x > 0.0));
		assert!(mesh.bootstrap_count() < 16);
		assert_consistent(&mesh);
	}

	/// Insertion order does not change the interior triangulation.
	#[test]
	fn test_order_independent() {
		let mut rng = rand::rngs::StdRng::seed_from_u64(42);
		let points: Vec<Vertex> = (0..120)
			.map(|_| vertex(rng.random_range(0.0..10.0), rng.random_range(0.0..10.0)))
			.collect();

		let mut forward = bootstrapped();
		for &p in &points {
			forward.insert(p).unwrap();
		}
		let mut backward = bootstrapped();
		for &p in points.iter().rev() {
			backward.insert(p).unwrap();
		}
		assert_eq!(interior_circles(&forward), interior_circles(&backward));
	}
}
