//! Terrain - owner of every tile and the per-frame pipeline.
//!
//! One frame runs, in order:
//!
//! 1. window shift around the camera, releasing evicted tiles
//! 2. visibility pass over the quadtree
//! 3. generation of visible empty cells, one batch per 4-connected group
//! 4. error metric over visible tiles with an empty queue (parallel)
//! 5. refinement of visible tiles in a 3x3-strided order
//!
//! Uploads and draws are separate calls so a renderer can issue them when
//! its buffers are ready.

use std::collections::HashSet;
use std::sync::Arc;

use glam::{IVec2, Vec3};
use web_time::Instant;

use crate::budget::{FrameStats, RefineBudget};
use crate::camera::Camera;
use crate::config::TerrainConfig;
use crate::error::ConfigError;
use crate::generate::{connected_batches, Generator};
use crate::geometry::xz;
use crate::metric::{propose_all, MetricParams, MetricStats};
use crate::quadtree::{visible_cells, Quadtree, VisibleSets};
use crate::refine::{refine_tile, RefineStats};
use crate::sampler::{CurvatureFilter, HeightOracle, HeightSampler, ProceduralTerrain};
use crate::sink::{upload_command, BufferLayout, DrawCommand, MeshSink};
use crate::tile::{Tile, TileHandle, TilePool};
use crate::types::SELF_INDEX;
use crate::workspace::Workspace;

// =============================================================================
// TerrainBackup
// =============================================================================

/// Full copy of the mutable terrain state.
#[derive(Clone, Debug)]
pub struct TerrainBackup {
	pool: TilePool,
	quadtree: Quadtree,
	visible: VisibleSets,
}

impl TerrainBackup {
	/// Triangles across every live tile of the backup.
	pub fn triangle_count(&self) -> usize {
		self.pool.iter().map(|(_, t)| t.triangle_count()).sum()
	}
}

// =============================================================================
// Terrain
// =============================================================================

/// Infinite terrain: tile pool, quadtree window and scratch state.
#[derive(Debug)]
pub struct Terrain {
	config: TerrainConfig,
	layout: BufferLayout,
	budget: RefineBudget,
	pool: TilePool,
	quadtree: Quadtree,
	workspace: Workspace,
	generator: Generator,
	oracle: HeightOracle,
	visible: VisibleSets,
}

impl Terrain {
	/// Build an empty terrain over `sampler`.
	pub fn new(config: TerrainConfig, sampler: Arc<dyn HeightSampler>) -> Result<Self, ConfigError> {
		config.validate()?;
		let filter = CurvatureFilter::new(config.filter_radius, config.gaussian_width);
		Ok(Self {
			layout: BufferLayout::new(&config),
			budget: RefineBudget::with_rate(config.refine_rate as usize),
			pool: TilePool::new(config.max_tiles as usize, config.tile_capacity()),
			quadtree: Quadtree::new(&config),
			workspace: Workspace::new(config.workspace),
			generator: Generator::new(config.grid_side, &config.workspace),
			oracle: HeightOracle::new(sampler, filter),
			visible: VisibleSets::default(),
			config,
		})
	}

	/// Terrain over the default procedural height field.
	pub fn procedural(config: TerrainConfig) -> Result<Self, ConfigError> {
		Self::new(config, Arc::new(ProceduralTerrain::default()))
	}

	#[inline]
	pub fn config(&self) -> &TerrainConfig {
		&self.config
	}

	#[inline]
	pub fn layout(&self) -> &BufferLayout {
		&self.layout
	}

	#[inline]
	pub fn budget(&self) -> &RefineBudget {
		&self.budget
	}

	#[inline]
	pub fn set_budget(&mut self, budget: RefineBudget) {
		self.budget = budget;
	}

	#[inline]
	pub fn pool(&self) -> &TilePool {
		&self.pool
	}

	#[inline]
	pub fn quadtree(&self) -> &Quadtree {
		&self.quadtree
	}

	#[inline]
	pub fn oracle(&self) -> &HeightOracle {
		&self.oracle
	}

	/// Result of the latest visibility pass.
	#[inline]
	pub fn visible(&self) -> &VisibleSets {
		&self.visible
	}

	/// Tile bound to `cell`, if any.
	pub fn tile(&self, cell: IVec2) -> Option<&Tile> {
		self.quadtree.get(cell).and_then(|h| self.pool.get(h))
	}

	/// Triangles across every live tile.
	pub fn triangle_count(&self) -> usize {
		self.pool.iter().map(|(_, t)| t.triangle_count()).sum()
	}

	/// Vertex and index counts across every live tile.
	pub fn mesh_size(&self) -> (usize, usize) {
		self.pool
			.iter()
			.fold((0, 0), |(v, i), (_, t)| (v + t.vertex_count(), i + t.index_count()))
	}

	// =========================================================================
	// Commands
	// =========================================================================

	/// Drop every tile and unbind every cell.
	pub fn clear_terrain(&mut self) {
		let released = self.quadtree.clear().len();
		self.pool.clear();
		self.visible.clear();
		tracing::debug!(released, "terrain cleared");
	}

	/// Move the quadtree window with the camera. Returns the evicted count.
	pub fn set_camera_position(&mut self, position: Vec3) -> usize {
		let evicted = self.quadtree.shift(xz(position));
		for &handle in &evicted {
			self.pool.release(handle);
		}
		if !evicted.is_empty() {
			self.visible
				.draw
				.retain(|&(_, handle)| self.pool.is_live(handle));
		}
		evicted.len()
	}

	/// Recompute the draw and generate sets for `camera`.
	pub fn update_visibility(&mut self, camera: &Camera) -> &VisibleSets {
		visible_cells(
			&self.quadtree,
			&camera.frustum(),
			self.config.height_range,
			&mut self.visible,
		);
		&self.visible
	}

	/// Run the error metric and refinement over the visible tiles.
	///
	/// `area_mult` and `curv_mult` are the exponents of the area and
	/// displacement terms for this pass. Returns true if any point was
	/// queued or inserted.
	pub fn refine(&mut self, camera: &Camera, threshold: f32, area_mult: f32, curv_mult: f32) -> bool {
		let params = MetricParams {
			view_projection: camera.view_projection,
			threshold,
			area_exponent: area_mult,
			curvature_exponent: curv_mult,
		};
		let (metric, _, refine) = self.refine_visible(&params);
		metric.points_queued > 0 || refine.inserted > 0
	}

	/// Run one whole frame for `camera`.
	#[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "terrain::frame"))]
	pub fn frame(&mut self, camera: &Camera) -> FrameStats {
		let start = Instant::now();
		let mut stats = FrameStats {
			evicted: self.set_camera_position(camera.position),
			..Default::default()
		};

		self.update_visibility(camera);
		self.generate_visible(&mut stats);
		stats.visible = self.visible.draw.len();
		stats.to_generate = self.visible.generate.len();

		let params = MetricParams {
			view_projection: camera.view_projection,
			threshold: self.config.threshold,
			area_exponent: self.config.area_exponent,
			curvature_exponent: self.config.curvature_exponent,
		};
		let (metric, refined, refine) = self.refine_visible(&params);
		stats.metric = metric;
		stats.refined_tiles = refined;
		stats.refine = refine;
		stats.timing_us = start.elapsed().as_micros() as u64;

		tracing::trace!(
			visible = stats.visible,
			generated = stats.generate.tiles,
			queued = stats.metric.points_queued,
			inserted = stats.refine.inserted,
			timing_us = stats.timing_us,
			"terrain frame"
		);
		stats
	}

	/// Send every changed visible tile to `sink`. Returns the upload count.
	pub fn upload(&mut self, sink: &mut impl MeshSink) -> usize {
		let mut uploaded = 0;
		for &(_, handle) in &self.visible.draw {
			let Some(tile) = self.pool.get_mut(handle) else {
				continue;
			};
			let Some(dirty) = tile.take_dirty() else {
				continue;
			};
			sink.upload(upload_command(
				&self.layout,
				handle.slot(),
				tile.vertices(),
				tile.indices(),
				dirty,
			));
			uploaded += 1;
		}
		uploaded
	}

	/// Issue one draw per visible, non-empty tile. Returns the draw count.
	pub fn draw(&self, sink: &mut impl MeshSink) -> usize {
		let mut drawn = 0;
		for &(_, handle) in &self.visible.draw {
			let Some(tile) = self.pool.get(handle) else {
				continue;
			};
			if tile.index_count() == 0 {
				continue;
			}
			sink.draw(DrawCommand {
				slot: handle.slot(),
				vertex_region: self.layout.vertex_region(handle.slot()),
				index_region: self.layout.index_region(handle.slot()),
				index_count: tile.index_count() as u32,
			});
			drawn += 1;
		}
		drawn
	}

	/// Copy the pool, the window and the visible sets.
	pub fn backup(&self) -> TerrainBackup {
		TerrainBackup {
			pool: self.pool.clone(),
			quadtree: self.quadtree.clone(),
			visible: self.visible.clone(),
		}
	}

	/// Return to a state taken with [`Terrain::backup`].
	pub fn restore(&mut self, backup: &TerrainBackup) {
		self.pool.clone_from(&backup.pool);
		self.quadtree.clone_from(&backup.quadtree);
		self.visible.clone_from(&backup.visible);
		tracing::debug!(triangles = self.triangle_count(), "terrain restored");
	}

	// =========================================================================
	// Pipeline stages
	// =========================================================================

	/// Generate the visible empty cells, batch by batch.
	fn generate_visible(&mut self, stats: &mut FrameStats) {
		if self.visible.generate.is_empty() {
			return;
		}
		#[cfg(feature = "profiling")]
		let _span = tracing::info_span!("terrain::generate").entered();

		let mut generated: HashSet<IVec2> = HashSet::new();
		for cells in connected_batches(&self.visible.generate) {
			if !self.budget.can_generate(stats.batches + stats.abandoned_batches) {
				break;
			}
			if self.pool.capacity() - self.pool.in_use() < cells.len() {
				stats.pool_exhausted += cells.len();
				continue;
			}
			let batch: Vec<(IVec2, TileHandle)> = cells
				.iter()
				.filter_map(|&cell| {
					self.pool
						.acquire(self.quadtree.cell_rect(cell))
						.map(|handle| (cell, handle))
				})
				.collect();

			match self
				.generator
				.generate(&batch, &self.quadtree, &mut self.pool, &self.oracle)
			{
				Ok(result) => {
					for &(cell, handle) in &batch {
						self.quadtree.set(cell, Some(handle));
						self.visible.draw.push((cell, handle));
						generated.insert(cell);
					}
					stats.batches += 1;
					stats.generate.accumulate(&result);
				}
				Err(err) => {
					for &(_, handle) in &batch {
						self.pool.release(handle);
					}
					stats.abandoned_batches += 1;
					tracing::debug!(%err, cells = batch.len(), "generation abandoned");
				}
			}
		}
		self.visible.generate.retain(|cell| !generated.contains(cell));
	}

	/// Error metric, then refinement, over the visible tiles.
	fn refine_visible(&mut self, params: &MetricParams) -> (MetricStats, usize, RefineStats) {
		// Tiles the refiner would skip get no points, or their queues fill up
		// with work nothing drains.
		let refinable: HashSet<TileHandle> = self
			.visible
			.draw
			.iter()
			.filter(|&&(cell, _)| self.neighborhood_ready(cell))
			.map(|&(_, h)| h)
			.collect();
		let tiles: Vec<&mut Tile> = self
			.pool
			.iter_mut()
			.filter(|(handle, _)| refinable.contains(handle))
			.map(|(_, tile)| tile)
			.collect();
		let metric = propose_all(tiles, params, &self.oracle);

		#[cfg(feature = "profiling")]
		let _span = tracing::info_span!("terrain::refine").entered();

		let rate = self.budget.point_rate();
		let side = self.quadtree.tile_side();
		let mut refined = 0;
		let mut stats = RefineStats::default();
		for cell in strided_order(self.visible.draw.iter().map(|&(cell, _)| cell)) {
			if !self.budget.can_refine_tile(refined) {
				break;
			}
			let handles = self.quadtree.neighborhood(cell);
			if handles[SELF_INDEX].is_none() || !self.neighborhood_ready(cell) {
				continue;
			}
			let mut tiles = self.pool.neighborhood_mut(&handles);
			if tiles[SELF_INDEX]
				.as_deref()
				.map_or(true, |t| !t.is_generated() || t.pending().is_empty())
			{
				continue;
			}
			let result = refine_tile(&mut tiles, &mut self.workspace, rate, side);
			stats.accumulate(&result);
			refined += 1;
		}
		(metric, refined, stats)
	}

	/// True if `cell` may refine: always, or only with all eight neighbors
	/// generated when `refine_requires_full_neighborhood` is set.
	fn neighborhood_ready(&self, cell: IVec2) -> bool {
		!self.config.refine_requires_full_neighborhood
			|| self
				.quadtree
				.neighborhood(cell)
				.iter()
				.all(|&h| self.pool.generated(h).is_some())
	}
}

/// Cells grouped by `(x mod 3, y mod 3)`.
///
/// Consecutive cells of one group are at least three cells apart, so their
/// neighborhoods never overlap.
pub fn strided_order(cells: impl Iterator<Item = IVec2>) -> Vec<IVec2> {
	let mut cells: Vec<IVec2> = cells.collect();
	cells.sort_by_key(|c| (c.y.rem_euclid(3) * 3 + c.x.rem_euclid(3), c.y, c.x));
	cells
}

#[cfg(test)]
#[path = "terrain_test.rs"]
mod terrain_test;
