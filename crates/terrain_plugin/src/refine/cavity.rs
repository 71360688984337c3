//! Cavity search: every triangle of the 3x3 neighborhood whose circumcircle
//! holds the new point, reached from the seed through shared edges, and the
//! boundary polygon left once shared edges cancel out.

use glam::Vec2;

use crate::config::ADJUST_PERCENTAGE;
use crate::error::CapacityError;
use crate::types::{same_edge, Adjacency, SELF_INDEX};
use crate::workspace::{CavityEdge, TriangleRef, Workspace};

use super::Neighborhood;

/// Triangle of the center tile to start the search from.
///
/// The origin recorded with the point is used when it still holds the point
/// in its circumcircle; otherwise the tile is scanned.
pub(crate) fn find_seed(tiles: &Neighborhood<'_>, origin: u32, p: Vec2) -> Option<u32> {
	let tile = tiles[SELF_INDEX].as_deref()?;
	let count = tile.triangle_count() as u32;
	if origin < count && tile.circle(origin).contains(p) {
		return Some(origin);
	}
	(0..count).find(|&t| tile.circle(t).contains(p))
}

/// Breadth-first cavity search from `seed` in the center tile.
///
/// The first time the frontier meets an edge leaving its tile, the border
/// lists of the center tile and (for points near its rectangle) of every
/// neighbor are scanned for triangles whose circle holds the point, and the
/// search continues from those.
pub(crate) fn collect_cavity(
	tiles: &Neighborhood<'_>,
	ws: &mut Workspace,
	seed: u32,
	p: Vec2,
	tile_side: f32,
) -> Result<(), CapacityError> {
	ws.visit(TriangleRef {
		tile: SELF_INDEX,
		triangle: seed,
	})?;
	let mut scanned = false;

	while let Some(tr) = ws.queue.pop_front() {
		let Some(tile) = tiles[tr.tile].as_deref() else {
			continue;
		};
		if !tile.circle_contains(tr.triangle, p) {
			continue;
		}
		ws.push_cavity(tr)?;

		for k in 0..3 {
			match tile.edge_adjacency(tr.triangle, k) {
				Adjacency::Local(n) => {
					ws.visit(TriangleRef {
						tile: tr.tile,
						triangle: n,
					})?;
				}
				Adjacency::Unknown | Adjacency::Border(_) if !scanned => {
					scanned = true;
					scan_borders(tiles, ws, p, tile_side)?;
				}
				_ => {}
			}
		}
	}
	Ok(())
}

/// Queue every border triangle whose circumcircle holds `p`.
fn scan_borders(
	tiles: &Neighborhood<'_>,
	ws: &mut Workspace,
	p: Vec2,
	tile_side: f32,
) -> Result<(), CapacityError> {
	let near_self = tiles[SELF_INDEX]
		.as_deref()
		.is_some_and(|t| t.rect().expand(ADJUST_PERCENTAGE * tile_side).contains(p));

	for (slot, tile) in tiles.iter().enumerate() {
		if slot != SELF_INDEX && !near_self {
			continue;
		}
		let Some(tile) = tile.as_deref() else {
			continue;
		};
		for &bt in tile.border_triangles() {
			if tile.circle_contains(bt, p) {
				ws.visit(TriangleRef {
					tile: slot,
					triangle: bt,
				})?;
			}
		}
	}
	Ok(())
}

/// True if `p` coincides in XZ with a corner of a cavity triangle.
pub(crate) fn touches_cavity_vertex(tiles: &Neighborhood<'_>, ws: &Workspace, p: Vec2) -> bool {
	ws.cavity.iter().any(|tr| {
		tiles[tr.tile]
			.as_deref()
			.is_some_and(|tile| tile.corner_vertices(tr.triangle).iter().any(|v| v.xz() == p))
	})
}

/// Gather every cavity edge and flag those shared by two cavity triangles.
///
/// Edges are compared by endpoint position, unordered, so a pair split
/// across a tile border cancels like a local pair.
pub(crate) fn collect_edges(tiles: &Neighborhood<'_>, ws: &mut Workspace) -> Result<(), CapacityError> {
	for i in 0..ws.cavity.len() {
		let owner = ws.cavity[i];
		let Some(tile) = tiles[owner.tile].as_deref() else {
			continue;
		};
		for k in 0..3 {
			let corners = tile.edge_corners(owner.triangle, k);
			ws.push_edge(CavityEdge {
				owner,
				corners,
				positions: corners.map(|c| *tile.vertex(c)),
				adjacency: tile.edge_adjacency(owner.triangle, k),
				shared: false,
			})?;
		}
	}

	let edges = &mut ws.edges;
	for i in 0..edges.len() {
		for j in i + 1..edges.len() {
			let (a, b) = (&edges[i], &edges[j]);
			if same_edge(
				a.positions[0].position,
				a.positions[1].position,
				b.positions[0].position,
				b.positions[1].position,
			) {
				edges[i].shared = true;
				edges[j].shared = true;
			}
		}
	}
	Ok(())
}
