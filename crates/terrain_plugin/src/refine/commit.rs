//! Writing a planned insertion into the neighborhood.
//!
//! [`check_capacity`] runs first and is the only place a tile budget can
//! stop an insertion, so [`commit`] never leaves a tile half written.

use smallvec::SmallVec;

use crate::error::CapacityError;
use crate::types::{Vertex, NEIGHBORHOOD};
use crate::workspace::{Corner, Fixup, Workspace};

use super::Neighborhood;

/// What one committed insertion wrote.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Committed {
	pub triangles: usize,
	pub removed: usize,
	pub migrated: usize,
	pub moved_points: usize,
}

/// Fail if any tile cannot take its share of the plan.
pub(crate) fn check_capacity(tiles: &Neighborhood<'_>, ws: &Workspace) -> Result<(), CapacityError> {
	for (slot, tile) in tiles.iter().enumerate() {
		let Some(tile) = tile.as_deref() else {
			continue;
		};
		let new = ws.planned.iter().filter(|t| t.target == slot).count();
		let moved = ws.moved.iter().filter(|m| m.tile == slot).count();
		let fixups = ws.fixups.iter().filter(|f| f.target().0 == slot).count();
		let cap = tile.capacity();

		if tile.index_count() + 3 * new > cap.indices {
			return Err(CapacityError::Indices(cap.indices));
		}
		if tile.vertex_count() + moved + usize::from(new > 0) > cap.vertices {
			return Err(CapacityError::Vertices(cap.vertices));
		}
		if tile.border_triangles().len() + new + fixups > cap.border_triangles {
			return Err(CapacityError::BorderTriangles(cap.border_triangles));
		}
	}
	Ok(())
}

/// Apply the plan in `ws`: vertices, new triangles, neighbor fixups, border
/// lists, then removal of the cavity.
pub(crate) fn commit(
	tiles: &mut Neighborhood<'_>,
	ws: &Workspace,
	point: Vertex,
) -> Result<Committed, CapacityError> {
	#[cfg(feature = "profiling")]
	let _span = tracing::info_span!("refine::commit").entered();

	let mut point_index = [None; NEIGHBORHOOD];
	for (slot, tile) in tiles.iter_mut().enumerate() {
		if !ws.planned.iter().any(|t| t.target == slot) {
			continue;
		}
		let Some(tile) = tile.as_deref_mut() else {
			continue;
		};
		for moved in ws.moved.iter().filter(|m| m.tile == slot) {
			let index = tile.push_vertex(moved.vertex)?;
			debug_assert_eq!(index, moved.index);
		}
		point_index[slot] = Some(tile.push_vertex(point)?);
	}

	let mut tracked: [SmallVec<[u32; 16]>; NEIGHBORHOOD] = std::array::from_fn(|_| SmallVec::new());
	for planned in &ws.planned {
		let (Some(tile), Some(p)) = (tiles[planned.target].as_deref_mut(), point_index[planned.target])
		else {
			continue;
		};
		let corners = planned.corners.map(|c| match c {
			Corner::Index(i) => i,
			Corner::Point => p,
		});
		let index = tile.push_triangle(corners, planned.adjacency)?;
		debug_assert_eq!(index, planned.index);
		tracked[planned.target].push(index);
	}

	for fixup in &ws.fixups {
		let (slot, _) = fixup.target();
		let Some(tile) = tiles[slot].as_deref_mut() else {
			continue;
		};
		match *fixup {
			Fixup::ReplaceLocal {
				triangle, old, new, ..
			} => {
				if !tile.replace_local(triangle, old, new) {
					tracing::debug!(slot, triangle, old, "fixup found no local edge");
				}
			}
			Fixup::Set {
				triangle,
				edge,
				adjacency,
				..
			} => tile.set_adjacency(triangle, edge, adjacency),
		}
	}

	for (slot, tile) in tiles.iter_mut().enumerate() {
		let Some(tile) = tile.as_deref_mut() else {
			continue;
		};
		let fixed = ws
			.fixups
			.iter()
			.map(Fixup::target)
			.filter(|&(s, _)| s == slot)
			.map(|(_, t)| t);
		for t in tracked[slot].iter().copied().chain(fixed) {
			if !tile.refresh_border(t) {
				tracing::warn!(slot, triangle = t, "border list full");
			}
		}
	}

	let mut removed = 0;
	for (slot, tile) in tiles.iter_mut().enumerate() {
		let Some(tile) = tile.as_deref_mut() else {
			continue;
		};
		let mut cavity: SmallVec<[u32; 32]> = ws
			.cavity
			.iter()
			.filter(|c| c.tile == slot)
			.map(|c| c.triangle)
			.collect();
		// Highest first, so the swapped-in last triangle is never in the cavity.
		cavity.sort_unstable_by(|a, b| b.cmp(a));
		for t in cavity {
			tile.swap_remove_triangle(t, &mut tracked[slot]);
			removed += 1;
		}
	}

	Ok(Committed {
		triangles: ws.planned.len(),
		removed,
		migrated: ws
			.planned
			.iter()
			.filter(|t| t.target != ws.edges[t.edge].owner.tile)
			.count(),
		moved_points: ws.moved.len(),
	})
}
