//! Error types.
//!
//! `CapacityError` never reaches callers of the terrain commands: generation
//! and refinement log it and report "nothing done" instead.

use thiserror::Error;

/// A fixed-size scratch or tile array would overflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum CapacityError {
	#[error("cavity exceeds {0} triangles")]
	Cavity(usize),
	#[error("cavity edge list exceeds {0} entries")]
	Edges(usize),
	#[error("cavity search visited more than {0} triangles")]
	Seen(usize),
	#[error("insertion needs more than {0} new triangles")]
	NewTriangles(usize),
	#[error("tile vertex array full ({0} vertices)")]
	Vertices(usize),
	#[error("tile index array full ({0} indices)")]
	Indices(usize),
	#[error("tile border list full ({0} triangles)")]
	BorderTriangles(usize),
	#[error("more than {0} points migrate in one insertion")]
	MovedPoints(usize),
	#[error("batch triangulation exceeds {0} points")]
	BatchPoints(usize),
	#[error("more than {0} existing triangles border the batch")]
	SeamTriangles(usize),
	#[error("more than {0} existing edges face the batch")]
	SeamEdges(usize),
}

impl CapacityError {
	/// True when a tile array, not a scratch buffer, ran out of room.
	///
	/// A full tile stays full until it is regenerated, so callers stop
	/// working on it for the rest of the frame.
	#[inline]
	pub fn is_tile_budget(&self) -> bool {
		matches!(
			self,
			CapacityError::Vertices(_) | CapacityError::Indices(_) | CapacityError::BorderTriangles(_)
		)
	}
}

/// Rejected `TerrainConfig`.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
	#[error("quadtree_levels must be at most {max}, got {got}")]
	QuadtreeLevels { got: u32, max: u32 },
	#[error("tile_side_length must be positive and finite, got {0}")]
	TileSideLength(f32),
	#[error("{0} must be greater than zero")]
	ZeroCapacity(&'static str),
	#[error("grid_side must be odd and at least 3, got {0}")]
	GridSide(u32),
	#[error("a {grid_side}x{grid_side} sample grid does not fit max_vertices = {max_vertices}")]
	GridTooLarge { grid_side: u32, max_vertices: u32 },
	#[error("shift_distance must be in [0, {max}), got {got}")]
	ShiftDistance { got: f32, max: f32 },
	#[error("height_range must satisfy min < max, got {min}..{max}")]
	HeightRange { min: f32, max: f32 },
	#[error("gaussian_width must be positive and finite, got {0}")]
	GaussianWidth(f32),
}
