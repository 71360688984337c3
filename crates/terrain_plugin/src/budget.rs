//! Per-frame work limits and frame statistics.
//!
//! Rate limiting is the only backpressure: a small budget means pending
//! points wait longer, never that work fails.

use crate::generate::GenerateStats;
use crate::metric::MetricStats;
use crate::refine::RefineStats;

/// Rate limiting for refinement and generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefineBudget {
	/// Pending points inserted per tile per frame (0 = unlimited).
	pub points_per_tile: usize,
	/// Tiles refined per frame (0 = unlimited).
	pub tiles_per_frame: usize,
	/// Generation batches per frame (0 = unlimited).
	pub batches_per_frame: usize,
}

impl RefineBudget {
	/// Default budget with reasonable limits.
	pub const DEFAULT: Self = Self {
		points_per_tile: 8,
		tiles_per_frame: 0,
		batches_per_frame: 4,
	};

	/// Unlimited budget for tests and offline runs.
	pub const UNLIMITED: Self = Self {
		points_per_tile: 0,
		tiles_per_frame: 0,
		batches_per_frame: 0,
	};

	/// Budget with the per-tile rate taken from the configuration.
	#[inline]
	pub fn with_rate(points_per_tile: usize) -> Self {
		Self {
			points_per_tile,
			..Self::DEFAULT
		}
	}

	/// Points one tile may insert this frame.
	#[inline]
	pub fn point_rate(&self) -> usize {
		if self.points_per_tile == 0 {
			usize::MAX
		} else {
			self.points_per_tile
		}
	}

	/// Check if another tile can be refined.
	#[inline]
	pub fn can_refine_tile(&self, performed: usize) -> bool {
		self.tiles_per_frame == 0 || performed < self.tiles_per_frame
	}

	/// Check if another batch can be generated.
	#[inline]
	pub fn can_generate(&self, performed: usize) -> bool {
		self.batches_per_frame == 0 || performed < self.batches_per_frame
	}
}

impl Default for RefineBudget {
	fn default() -> Self {
		Self::DEFAULT
	}
}

/// Statistics from one frame of the terrain pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
	/// Tiles released because the window moved.
	pub evicted: usize,
	/// Visible tiles drawn this frame.
	pub visible: usize,
	/// Visible cells still waiting for a tile.
	pub to_generate: usize,
	/// Batches generated.
	pub batches: usize,
	/// Batches abandoned on a capacity overflow.
	pub abandoned_batches: usize,
	/// Cells skipped because the pool was full.
	pub pool_exhausted: usize,
	pub generate: GenerateStats,
	pub metric: MetricStats,
	/// Tiles refined.
	pub refined_tiles: usize,
	pub refine: RefineStats,
	/// Wall time of the frame in microseconds.
	pub timing_us: u64,
}

impl FrameStats {
	/// True if anything in the pool changed.
	#[inline]
	pub fn changed(&self) -> bool {
		self.evicted > 0 || self.generate.tiles > 0 || self.refine.inserted > 0
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_budget() {
		let budget = RefineBudget::default();
		assert_eq!(budget.points_per_tile, 8);
		assert_eq!(budget.point_rate(), 8);
		assert!(budget.can_refine_tile(1_000));
		assert!(budget.can_generate(3));
		assert!(!budget.can_generate(4));
	}

	#[test]
	fn test_unlimited_budget_always_allows() {
		let budget = RefineBudget::UNLIMITED;
		assert_eq!(budget.point_rate(), usize::MAX);
		assert!(budget.can_refine_tile(usize::MAX - 1));
		assert!(budget.can_generate(1_000));
	}

	#[test]
	fn test_can_refine_tile() {
		let budget = RefineBudget {
			tiles_per_frame: 2,
			..Default::default()
		};
		assert!(budget.can_refine_tile(0));
		assert!(budget.can_refine_tile(1));
		assert!(!budget.can_refine_tile(2));
	}

	#[test]
	fn test_with_rate() {
		assert_eq!(RefineBudget::with_rate(3).point_rate(), 3);
		assert_eq!(RefineBudget::with_rate(0).point_rate(), usize::MAX);
	}

	#[test]
	fn test_stats_changed() {
		let mut stats = FrameStats::default();
		assert!(!stats.changed());
		stats.refine.inserted = 1;
		assert!(stats.changed());
	}
}
