//! Incremental refinement: single-point Bowyer-Watson insertion over a 3x3
//! neighborhood of tiles.
//!
//! Each insertion runs in three phases:
//!
//! 1. **Cavity** ([`cavity`]): every triangle whose circumcircle holds the
//!    point, across tile borders, and the boundary polygon around them.
//! 2. **Plan** ([`plan`]): a fan of new triangles, one per boundary edge,
//!    each assigned to the tile containing its centroid. Vertices a
//!    migrated triangle needs are copied into the target tile.
//! 3. **Commit** ([`commit`]): capacity is checked for every tile first,
//!    then the plan is written and the cavity removed.
//!
//! Nothing is written before phase 3 passes its capacity check, so an
//! abandoned point leaves every tile exactly as it was.

mod cavity;
mod commit;
mod plan;

use crate::error::CapacityError;
use crate::tile::Tile;
use crate::types::{PendingPoint, NEIGHBORHOOD, SELF_INDEX};
use crate::workspace::Workspace;

use commit::{check_capacity, commit, Committed};
use plan::{plan_triangles, Rejection};

/// Mutable view of a tile and its eight neighbors, in neighborhood order.
///
/// Missing or ungenerated neighbors are `None`.
pub type Neighborhood<'a> = [Option<&'a mut Tile>; NEIGHBORHOOD];

/// Outcome counters of one refine call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefineStats {
	/// Points inserted.
	pub inserted: usize,
	/// Points discarded without an error (stale, coincident, degenerate).
	pub dropped: usize,
	/// Points abandoned on a capacity overflow.
	pub abandoned: usize,
	/// Triangles created in a tile other than the one they replaced.
	pub migrated_triangles: usize,
	/// Vertices copied into neighbor tiles.
	pub moved_points: usize,
	pub triangles_created: usize,
	pub triangles_removed: usize,
}

impl RefineStats {
	pub fn accumulate(&mut self, other: &RefineStats) {
		self.inserted += other.inserted;
		self.dropped += other.dropped;
		self.abandoned += other.abandoned;
		self.migrated_triangles += other.migrated_triangles;
		self.moved_points += other.moved_points;
		self.triangles_created += other.triangles_created;
		self.triangles_removed += other.triangles_removed;
	}
}

enum Insertion {
	Inserted(Committed),
	Dropped,
}

/// Insert up to `rate` pending points of the center tile, newest first.
///
/// Points leave the queue whether or not they are inserted. A point whose
/// insertion would overflow a tile array stops the tile for this call; the
/// rest of this call's share of the queue is discarded, the error metric
/// proposes them again once the queue is empty.
#[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "refine::tile"))]
pub fn refine_tile(
	tiles: &mut Neighborhood<'_>,
	ws: &mut Workspace,
	rate: usize,
	tile_side: f32,
) -> RefineStats {
	let mut stats = RefineStats::default();
	let Some(center) = tiles[SELF_INDEX].as_deref() else {
		return stats;
	};
	let count = rate.min(center.pending().len());

	for i in 0..count {
		let Some(point) = tiles[SELF_INDEX].as_deref_mut().and_then(Tile::pop_pending) else {
			break;
		};
		match insert_point(tiles, ws, point, tile_side) {
			Ok(Insertion::Inserted(done)) => {
				stats.inserted += 1;
				stats.migrated_triangles += done.migrated;
				stats.moved_points += done.moved_points;
				stats.triangles_created += done.triangles;
				stats.triangles_removed += done.removed;
			}
			Ok(Insertion::Dropped) => stats.dropped += 1,
			Err(err) => {
				stats.abandoned += 1;
				tracing::debug!(%err, x = point.vertex.position.x, z = point.vertex.position.z, "refine point abandoned");
				if err.is_tile_budget() {
					if let Some(center) = tiles[SELF_INDEX].as_deref_mut() {
						for _ in i + 1..count {
							center.pop_pending();
							stats.abandoned += 1;
						}
					}
					break;
				}
			}
		}
	}
	stats
}

/// Insert one point into the neighborhood centered on `tiles[SELF_INDEX]`.
fn insert_point(
	tiles: &mut Neighborhood<'_>,
	ws: &mut Workspace,
	point: PendingPoint,
	tile_side: f32,
) -> Result<Insertion, CapacityError> {
	ws.reset();
	let p = point.vertex.xz();

	let Some(seed) = cavity::find_seed(tiles, point.triangle, p) else {
		return Ok(Insertion::Dropped);
	};
	cavity::collect_cavity(tiles, ws, seed, p, tile_side)?;
	if ws.cavity.is_empty() || cavity::touches_cavity_vertex(tiles, ws, p) {
		return Ok(Insertion::Dropped);
	}
	cavity::collect_edges(tiles, ws)?;

	if let Err(Rejection::Degenerate) = plan_triangles(tiles, ws, &point.vertex)? {
		return Ok(Insertion::Dropped);
	}
	check_capacity(tiles, ws)?;
	commit(tiles, ws, point.vertex).map(Insertion::Inserted)
}
