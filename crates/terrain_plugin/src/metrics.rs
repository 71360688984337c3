//! Engine-agnostic terrain statistics.
//!
//! Feature-gated and runtime-toggled so recording costs nothing when off.
//!
//! ```ignore
//! use terrain_plugin::metrics::{TerrainMetrics, COLLECT_METRICS};
//!
//! // Compile with --features metrics
//! COLLECT_METRICS.store(false, Ordering::Relaxed);
//!
//! let stats = terrain.frame(&camera);
//! metrics.record_frame(&stats);
//! let (vertices, indices) = terrain.mesh_size();
//! metrics.record_mesh(vertices, indices, terrain.pool().in_use());
//! ```

use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;

use crate::budget::FrameStats;
use crate::sink::{INDEX_BYTES, VERTEX_BYTES};

/// Runtime switch; only consulted with the `metrics` feature.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// True when compiled with `metrics` and switched on at runtime.
#[inline]
pub fn is_enabled() -> bool {
    #[cfg(feature = "metrics")]
    {
        COLLECT_METRICS.load(Ordering::Relaxed)
    }
    #[cfg(not(feature = "metrics"))]
    {
        false
    }
}

/// What one frame did, as kept in [`FrameHistory`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameSample {
    pub timing_us: u64,
    /// Points inserted by the refiner.
    pub inserted: u32,
    /// Points the metric queued.
    pub queued: u32,
    /// Tiles generated.
    pub generated: u32,
}

impl From<&FrameStats> for FrameSample {
    fn from(stats: &FrameStats) -> Self {
        Self {
            timing_us: stats.timing_us,
            inserted: stats.refine.inserted as u32,
            queued: stats.metric.points_queued as u32,
            generated: stats.generate.tiles as u32,
        }
    }
}

/// The last few frames, oldest first.
///
/// Sized once; recording into a full history drops the oldest frame.
#[derive(Debug, Clone)]
pub struct FrameHistory {
    samples: VecDeque<FrameSample>,
    frames: usize,
}

impl FrameHistory {
    /// Two seconds at 60 frames per second.
    pub const DEFAULT_FRAMES: usize = 120;

    pub fn new(frames: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(frames),
            frames,
        }
    }

    pub fn record(&mut self, sample: FrameSample) {
        if self.frames == 0 {
            return;
        }
        if self.samples.len() == self.frames {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn latest(&self) -> Option<&FrameSample> {
        self.samples.back()
    }

    pub fn samples(&self) -> impl Iterator<Item = &FrameSample> {
        self.samples.iter()
    }

    /// Mean of `field` over the kept frames, 0 when empty.
    pub fn mean(&self, field: impl Fn(&FrameSample) -> u64) -> f64 {
        match self.samples.len() {
            0 => 0.0,
            n => self.samples.iter().map(field).sum::<u64>() as f64 / n as f64,
        }
    }

    /// Fastest and slowest kept frame in microseconds.
    pub fn timing_range(&self) -> Option<(u64, u64)> {
        let first = self.samples.front()?.timing_us;
        Some(self.samples.iter().fold((first, first), |(lo, hi), s| {
            (lo.min(s.timing_us), hi.max(s.timing_us))
        }))
    }

    /// Trailing frames that neither generated nor inserted anything.
    pub fn settled_frames(&self) -> usize {
        self.samples
            .iter()
            .rev()
            .take_while(|s| s.inserted == 0 && s.generated == 0)
            .count()
    }
}

impl Default for FrameHistory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FRAMES)
    }
}

/// Terrain statistics accumulated over frames.
#[derive(Debug, Clone, Default)]
pub struct TerrainMetrics {
    // Mesh
    /// Triangles across live tiles at the last record.
    pub triangles: u64,
    /// Live tiles at the last record.
    pub tiles_in_use: u32,
    /// Vertex and index bytes at the last record.
    pub mesh_memory_bytes: u64,

    pub history: FrameHistory,

    // Totals
    pub frames: u64,
    pub tiles_generated: u64,
    pub tiles_evicted: u64,
    pub points_inserted: u64,
    pub points_dropped: u64,
    pub points_abandoned: u64,
    pub batches_abandoned: u64,
}

impl TerrainMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset everything except the cumulative totals.
    pub fn reset(&mut self) {
        self.triangles = 0;
        self.tiles_in_use = 0;
        self.mesh_memory_bytes = 0;
        self.history.clear();
    }

    /// Fold one frame's statistics in.
    pub fn record_frame(&mut self, stats: &FrameStats) {
        if !is_enabled() {
            return;
        }
        self.frames += 1;
        self.history.record(FrameSample::from(stats));

        self.tiles_generated += stats.generate.tiles as u64;
        self.tiles_evicted += stats.evicted as u64;
        self.points_inserted += stats.refine.inserted as u64;
        self.points_dropped += stats.refine.dropped as u64;
        self.points_abandoned += stats.refine.abandoned as u64;
        self.batches_abandoned += stats.abandoned_batches as u64;
    }

    /// Record the current mesh size.
    pub fn record_mesh(&mut self, vertices: usize, indices: usize, tiles_in_use: usize) {
        if !is_enabled() {
            return;
        }
        self.triangles = (indices / 3) as u64;
        self.tiles_in_use = tiles_in_use as u32;
        self.mesh_memory_bytes = vertices as u64 * VERTEX_BYTES + indices as u64 * INDEX_BYTES;
    }

    pub fn avg_frame_us(&self) -> f64 {
        self.history.mean(|s| s.timing_us)
    }

    pub fn avg_inserted(&self) -> f64 {
        self.history.mean(|s| s.inserted as u64)
    }

    pub fn mesh_memory_mb(&self) -> f64 {
        self.mesh_memory_bytes as f64 / 1_048_576.0
    }
}

#[cfg(all(test, feature = "metrics"))]
mod tests {
    use super::*;

    fn sample(timing_us: u64, inserted: u32, generated: u32) -> FrameSample {
        FrameSample {
            timing_us,
            inserted,
            generated,
            ..Default::default()
        }
    }

    #[test]
    fn test_frame_history() {
        let mut history = FrameHistory::new(3);
        assert!(history.is_empty());
        assert_eq!(history.timing_range(), None);
        assert_eq!(history.mean(|s| s.timing_us), 0.0);

        history.record(sample(10, 4, 9));
        history.record(sample(20, 2, 0));
        history.record(sample(30, 0, 0));
        assert_eq!(history.mean(|s| s.timing_us), 20.0);
        assert_eq!(history.settled_frames(), 1);

        history.record(sample(40, 0, 0));
        assert_eq!(history.len(), 3, "oldest frame dropped");
        assert_eq!(history.timing_range(), Some((20, 40)));
        assert_eq!(history.mean(|s| s.inserted as u64), 2.0 / 3.0);
        assert_eq!(history.settled_frames(), 2);
        assert_eq!(history.latest().map(|s| s.timing_us), Some(40));
    }

    #[test]
    fn test_zero_frame_history_stays_empty() {
        let mut history = FrameHistory::new(0);
        history.record(sample(1, 0, 0));
        assert!(history.is_empty());
    }

    #[test]
    fn test_record_frame() {
        let mut metrics = TerrainMetrics::new();
        let mut stats = FrameStats {
            timing_us: 1_000,
            evicted: 2,
            ..Default::default()
        };
        stats.refine.inserted = 5;
        stats.refine.dropped = 1;
        stats.generate.tiles = 4;
        metrics.record_frame(&stats);
        assert_eq!(
            metrics.history.latest(),
            Some(&FrameSample {
                timing_us: 1_000,
                inserted: 5,
                queued: 0,
                generated: 4,
            })
        );
        stats.timing_us = 3_000;
        metrics.record_frame(&stats);

        assert_eq!(metrics.frames, 2);
        assert_eq!(metrics.avg_frame_us(), 2_000.0);
        assert_eq!(metrics.points_inserted, 10);
        assert_eq!(metrics.points_dropped, 2);
        assert_eq!(metrics.tiles_generated, 8);
        assert_eq!(metrics.tiles_evicted, 4);
        assert_eq!(metrics.avg_inserted(), 5.0);

        metrics.reset();
        assert!(metrics.history.is_empty());
        assert_eq!(metrics.frames, 2, "totals survive reset");
    }

    #[test]
    fn test_record_mesh() {
        let mut metrics = TerrainMetrics::new();
        metrics.record_mesh(10, 30, 1);
        assert_eq!(metrics.triangles, 10);
        assert_eq!(metrics.tiles_in_use, 1);
        assert_eq!(metrics.mesh_memory_bytes, 10 * 16 + 30 * 4);
    }
}
