//! TerrainConfig - quadtree layout, tile capacities and refinement controls.

use crate::error::ConfigError;
use crate::tile::TileCapacity;
use crate::workspace::WorkspaceCapacity;

/// Deepest quadtree accepted by [`TerrainConfig::validate`].
pub const MAX_QUADTREE_LEVELS: u32 = 12;

/// Fraction of a tile side around a tile inside which points may reach into
/// neighbor tiles (border probing, copied border points).
pub const ADJUST_PERCENTAGE: f32 = 0.35;

/// Terrain configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct TerrainConfig {
  /// Quadtree depth L; the window holds 2^L x 2^L tiles.
  pub quadtree_levels: u32,

  /// World-space side length of one tile.
  pub tile_side_length: f32,

  /// Tile pool capacity.
  pub max_tiles: u32,

  /// Per-tile vertex capacity.
  pub max_vertices: u32,

  /// Per-tile index capacity (three per triangle).
  pub max_indices: u32,

  /// Per-tile pending refinement point capacity.
  pub max_new_points: u32,

  /// Per-tile border triangle list capacity.
  pub max_border_triangles: u32,

  /// Samples per side of the regular grid seeded into a new tile.
  /// Odd values keep the top and bottom rows unstaggered, so rows line up
  /// across tile seams.
  pub grid_side: u32,

  /// Pending points inserted per tile per frame.
  pub refine_rate: u32,

  /// Error metric threshold for `area * displacement`.
  pub threshold: f32,

  /// Exponent applied to the projected area term.
  pub area_exponent: f32,

  /// Exponent applied to the projected displacement term.
  pub curvature_exponent: f32,

  /// Distance from the window edge at which the quadtree shifts.
  pub shift_distance: f32,

  /// Terrain height range used for tile bounding boxes in frustum tests.
  pub height_range: [f32; 2],

  /// Laplacian-of-Gaussian kernel radius (kernel side is `2r + 1`).
  pub filter_radius: u32,

  /// Laplacian-of-Gaussian sigma.
  pub gaussian_width: f32,

  /// Only refine tiles whose eight neighbors are all generated.
  pub refine_requires_full_neighborhood: bool,

  /// Scratch buffer capacities.
  pub workspace: WorkspaceCapacity,
}

impl TerrainConfig {
  /// Tiles per side of the quadtree window (2^L).
  #[inline]
  pub fn window_cells(&self) -> u32 {
    1 << self.quadtree_levels
  }

  /// World-space side length of the quadtree window.
  #[inline]
  pub fn window_side_length(&self) -> f32 {
    self.tile_side_length * self.window_cells() as f32
  }

  /// Array capacities of every tile in the pool.
  #[inline]
  pub fn tile_capacity(&self) -> TileCapacity {
    TileCapacity {
      vertices: self.max_vertices as usize,
      indices: self.max_indices as usize,
      new_points: self.max_new_points as usize,
      border_triangles: self.max_border_triangles as usize,
    }
  }

  /// Bytes one pool slot occupies in a pooled GPU buffer.
  /// stride = max_indices * 4 + max_vertices * 16
  #[inline]
  pub fn buffer_stride(&self) -> u64 {
    self.max_indices as u64 * 4 + self.max_vertices as u64 * 16
  }

  /// Check every field for a usable value.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.quadtree_levels > MAX_QUADTREE_LEVELS {
      return Err(ConfigError::QuadtreeLevels {
        got: self.quadtree_levels,
        max: MAX_QUADTREE_LEVELS,
      });
    }
    if !(self.tile_side_length.is_finite() && self.tile_side_length > 0.0) {
      return Err(ConfigError::TileSideLength(self.tile_side_length));
    }
    for (name, value) in [
      ("max_tiles", self.max_tiles),
      ("max_vertices", self.max_vertices),
      ("max_indices", self.max_indices),
      ("max_new_points", self.max_new_points),
      ("max_border_triangles", self.max_border_triangles),
      ("refine_rate", self.refine_rate),
    ] {
      if value == 0 {
        return Err(ConfigError::ZeroCapacity(name));
      }
    }
    let ws = &self.workspace;
    for (name, value) in [
      ("workspace.max_cavity", ws.max_cavity),
      ("workspace.max_edges", ws.max_edges),
      ("workspace.max_seen", ws.max_seen),
      ("workspace.max_new_triangles", ws.max_new_triangles),
      ("workspace.max_batch_points", ws.max_batch_points),
      ("workspace.max_seam_triangles", ws.max_seam_triangles),
    ] {
      if value == 0 {
        return Err(ConfigError::ZeroCapacity(name));
      }
    }
    // Even grids stagger their last row, so the two sides of a seam disagree.
    if self.grid_side < 3 || self.grid_side % 2 == 0 {
      return Err(ConfigError::GridSide(self.grid_side));
    }
    if self.grid_side * self.grid_side > self.max_vertices {
      return Err(ConfigError::GridTooLarge {
        grid_side: self.grid_side,
        max_vertices: self.max_vertices,
      });
    }
    let max_shift = self.window_side_length() * 0.5;
    if !(self.shift_distance >= 0.0 && self.shift_distance < max_shift) {
      return Err(ConfigError::ShiftDistance {
        got: self.shift_distance,
        max: max_shift,
      });
    }
    let [min, max] = self.height_range;
    if !(min < max) {
      return Err(ConfigError::HeightRange { min, max });
    }
    if !(self.gaussian_width.is_finite() && self.gaussian_width > 0.0) {
      return Err(ConfigError::GaussianWidth(self.gaussian_width));
    }
    Ok(())
  }
}

impl Default for TerrainConfig {
  fn default() -> Self {
    Self {
      quadtree_levels: 2,
      tile_side_length: 250.0,
      max_tiles: 16,
      max_vertices: 4000,
      max_indices: 12000,
      max_new_points: 1024,
      max_border_triangles: 2000,
      grid_side: 3,
      refine_rate: 8,
      threshold: 1.0e-6,
      area_exponent: 1.0,
      curvature_exponent: 1.0,
      shift_distance: 100.0,
      height_range: [-500.0, 500.0],
      filter_radius: 2,
      gaussian_width: 1.0,
      refine_requires_full_neighborhood: true,
      workspace: WorkspaceCapacity::DEFAULT,
    }
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
