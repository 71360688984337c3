//! Star planning: one new triangle per boundary edge, its target tile, its
//! corners in that tile, its adjacency, and every change the rest of the
//! neighborhood needs. Nothing is written here.

use glam::{Vec2, Vec3};

use crate::error::CapacityError;
use crate::geometry::{orientation, Rect};
use crate::types::{neighborhood_index, neighborhood_offset, Adjacency, Direction, Vertex, SELF_INDEX};
use crate::workspace::{CavityEdge, Corner, Fixup, MovedPoint, PlannedTriangle, TriangleRef, Workspace};

use super::Neighborhood;

/// Why a point was planned away without touching any tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Rejection {
	/// A boundary edge is collinear with the point.
	Degenerate,
}

/// Neighborhood slot whose cell contains `c`, relative to the center rect.
#[inline]
pub(crate) fn target_slot(rect: &Rect, c: Vec2) -> usize {
	let axis = |v: f32, min: f32, max: f32| -> usize {
		if v < min {
			0
		} else if v >= max {
			2
		} else {
			1
		}
	};
	axis(c.y, rect.min.y, rect.max.y) * 3 + axis(c.x, rect.min.x, rect.max.x)
}

#[inline]
fn direction_or_unknown(from: usize, to: usize) -> Adjacency {
	Direction::between(from, to)
		.map(Adjacency::Border)
		.unwrap_or(Adjacency::Unknown)
}

/// Plan the fan around `point` over the non-shared cavity edges.
pub(crate) fn plan_triangles(
	tiles: &Neighborhood<'_>,
	ws: &mut Workspace,
	point: &Vertex,
) -> Result<Result<(), Rejection>, CapacityError> {
	let Some(center) = tiles[SELF_INDEX].as_deref() else {
		return Ok(Ok(()));
	};
	let rect = *center.rect();
	let p = point.xz();

	// Pass 1: winding, target and index of every new triangle.
	let mut next_index = [0u32; 9];
	for (slot, tile) in tiles.iter().enumerate() {
		if let Some(tile) = tile.as_deref() {
			next_index[slot] = tile.triangle_count() as u32;
		}
	}
	for e in 0..ws.edges.len() {
		let edge = ws.edges[e];
		if edge.shared {
			continue;
		}
		let [v0, v1] = edge.positions;
		let o = orientation(v0.xz(), v1.xz(), p);
		if o == 0.0 || !o.is_finite() {
			return Ok(Err(Rejection::Degenerate));
		}
		let (first, second) = if o < 0.0 { (0, 1) } else { (1, 0) };
		let centroid = (v0.xz() + v1.xz() + p) / 3.0;
		let mut target = target_slot(&rect, centroid);
		if !can_migrate(tiles, &edge, target) {
			target = edge.owner.tile;
		}
		let index = next_index[target];
		next_index[target] += 1;
		ws.push_planned(PlannedTriangle {
			edge: e,
			target,
			index,
			corners: [
				Corner::Index(edge.corners[first]),
				Corner::Index(edge.corners[second]),
				Corner::Point,
			],
			edge_positions: [edge.positions[first].position, edge.positions[second].position],
			adjacency: [Adjacency::Unknown; 3],
		})?;
	}

	// Pass 2: corners in the target tile and the outer edge.
	for i in 0..ws.planned.len() {
		let planned = ws.planned[i];
		let edge = ws.edges[planned.edge];
		let migrated = planned.target != edge.owner.tile;

		if migrated {
			let mut corners = planned.corners;
			for c in 0..2 {
				let source = if edge.positions[0].position == planned.edge_positions[c] {
					edge.positions[0]
				} else {
					edge.positions[1]
				};
				corners[c] = Corner::Index(resolve_vertex(tiles, ws, planned.target, source)?);
			}
			ws.planned[i].corners = corners;
			ws.planned[i].adjacency[0] = migrated_outer_edge(tiles, ws, &edge, &planned)?;
		} else {
			ws.planned[i].adjacency[0] = edge.adjacency;
			if let Adjacency::Local(n) = edge.adjacency {
				ws.push_fixup(Fixup::ReplaceLocal {
					tile: edge.owner.tile,
					triangle: n,
					old: edge.owner.triangle,
					new: Adjacency::Local(planned.index),
				})?;
			}
		}
	}

	// Pass 3: the two edges through the point connect new triangles.
	for i in 0..ws.planned.len() {
		let [c0, c1] = ws.planned[i].edge_positions;
		let target = ws.planned[i].target;
		let mut adjacency = ws.planned[i].adjacency;
		for other in ws.planned.iter() {
			let link = if other.target == target {
				Adjacency::Local(other.index)
			} else {
				direction_or_unknown(target, other.target)
			};
			if other.edge_positions[0] == c1 {
				adjacency[1] = link;
			}
			if other.edge_positions[1] == c0 {
				adjacency[2] = link;
			}
		}
		ws.planned[i].adjacency = adjacency;
	}

	Ok(Ok(()))
}

/// True if the triangle on `edge` may move to `target`.
///
/// It must not leave a `Border` partner behind that the neighborhood cannot
/// reach, or that partner would keep pointing at the old owner.
fn can_migrate(tiles: &Neighborhood<'_>, edge: &CavityEdge, target: usize) -> bool {
	if target == edge.owner.tile {
		return true;
	}
	if tiles[target].is_none() {
		return false;
	}
	match edge.adjacency {
		Adjacency::Local(_) => Direction::between(target, edge.owner.tile).is_some(),
		Adjacency::Border(d) => {
			match neighborhood_index(neighborhood_offset(edge.owner.tile) + d.offset()) {
				Some(third) if third == target => true,
				Some(third) => tiles[third].is_some() && Direction::between(target, third).is_some(),
				None => false,
			}
		}
		Adjacency::Unknown => true,
	}
}

/// Index of `vertex` in tile `target`: already migrated by this insertion,
/// present on one of the target's border triangles, or appended.
fn resolve_vertex(
	tiles: &Neighborhood<'_>,
	ws: &mut Workspace,
	target: usize,
	vertex: Vertex,
) -> Result<u32, CapacityError> {
	if let Some(m) = ws
		.moved
		.iter()
		.find(|m| m.tile == target && m.vertex.position == vertex.position)
	{
		return Ok(m.index);
	}
	let Some(tile) = tiles[target].as_deref() else {
		return Ok(0);
	};
	for &bt in tile.border_triangles() {
		for c in tile.corners(bt) {
			if tile.vertex(c).position == vertex.position {
				return Ok(c);
			}
		}
	}
	let already = ws.moved.iter().filter(|m| m.tile == target).count();
	let index = (tile.vertex_count() + already) as u32;
	ws.push_moved(MovedPoint {
		tile: target,
		vertex,
		index,
	})?;
	Ok(index)
}

/// Adjacency of the boundary edge of a triangle that lands in another tile
/// than the cavity triangle it replaces, plus the matching fixups.
fn migrated_outer_edge(
	tiles: &Neighborhood<'_>,
	ws: &mut Workspace,
	edge: &CavityEdge,
	planned: &PlannedTriangle,
) -> Result<Adjacency, CapacityError> {
	let owner = edge.owner.tile;
	let target = planned.target;
	let [a, b] = planned.edge_positions;

	// The triangle across may already live in the target tile.
	if let Some(tile) = tiles[target].as_deref() {
		for &bt in tile.border_triangles() {
			let in_cavity = ws.cavity.contains(&TriangleRef {
				tile: target,
				triangle: bt,
			});
			if in_cavity {
				continue;
			}
			if let Some(k) = tile.find_edge(bt, a, b) {
				if tile.edge_adjacency(bt, k).is_local() {
					continue;
				}
				ws.push_fixup(Fixup::Set {
					tile: target,
					triangle: bt,
					edge: k,
					adjacency: Adjacency::Local(planned.index),
				})?;
				return Ok(Adjacency::Local(bt));
			}
		}
	}

	match edge.adjacency {
		Adjacency::Local(n) => {
			ws.push_fixup(Fixup::ReplaceLocal {
				tile: owner,
				triangle: n,
				old: edge.owner.triangle,
				new: direction_or_unknown(owner, target),
			})?;
			Ok(direction_or_unknown(target, owner))
		}
		Adjacency::Border(d) => {
			let third = neighborhood_index(neighborhood_offset(owner) + d.offset());
			match third {
				Some(third) if third != target && tiles[third].is_some() => {
					repoint_third(tiles, ws, third, owner, target, a, b)?;
					Ok(direction_or_unknown(target, third))
				}
				_ => Ok(Adjacency::Unknown),
			}
		}
		Adjacency::Unknown => Ok(Adjacency::Unknown),
	}
}

/// The tile across a migrated edge pointed at the old owner; point it at
/// the new one instead.
fn repoint_third(
	tiles: &Neighborhood<'_>,
	ws: &mut Workspace,
	third: usize,
	owner: usize,
	target: usize,
	a: Vec3,
	b: Vec3,
) -> Result<(), CapacityError> {
	let Some(tile) = tiles[third].as_deref() else {
		return Ok(());
	};
	let back = direction_or_unknown(third, owner);
	for &bt in tile.border_triangles() {
		if let Some(k) = tile.find_edge(bt, a, b) {
			if tile.edge_adjacency(bt, k) == back {
				return ws.push_fixup(Fixup::Set {
					tile: third,
					triangle: bt,
					edge: k,
					adjacency: direction_or_unknown(third, target),
				});
			}
		}
	}
	Ok(())
}
