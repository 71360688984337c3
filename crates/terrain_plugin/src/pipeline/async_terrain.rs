//! Double-buffered terrain worker.
//!
//! The terrain is moved onto rayon's pool for one frame and handed back
//! together with a snapshot of the drawn tiles. The renderer reads only the
//! previous completed snapshot, so it never observes a half-refined tile.
//!
//! ```text
//! Main Thread                       Async (rayon)
//! ┌────────────────┐
//! │ start(camera)  │──── Terrain ───►┌──────────────────┐
//! └────────────────┘                 │ frame(camera)    │
//!                                    │ capture snapshot │
//! ┌────────────────┐                 └────────┬─────────┘
//! │ poll()         │◄─ Terrain, snapshot ─────┘
//! │ - apply clear  │
//! │ - swap snapshot│
//! └────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let mut worker = AsyncTerrain::new(terrain);
//! worker.start(camera);
//! loop {
//!     if let Some(stats) = worker.poll() {
//!         renderer.draw(worker.snapshot());
//!         worker.start(next_camera);
//!     }
//! }
//! ```

use crossbeam_channel::{self as channel, Receiver, TryRecvError};

use super::snapshot::RenderSnapshot;
use crate::budget::FrameStats;
use crate::camera::Camera;
use crate::terrain::Terrain;

/// What the worker sends back.
struct FrameOutput {
	terrain: Terrain,
	stats: FrameStats,
	snapshot: RenderSnapshot,
}

/// Runs [`Terrain::frame`] off the calling thread, one frame at a time.
pub struct AsyncTerrain {
	/// `None` while the worker owns it.
	terrain: Option<Terrain>,
	receiver: Option<Receiver<FrameOutput>>,
	snapshot: RenderSnapshot,
	clear_requested: bool,
	frames: u64,
}

impl AsyncTerrain {
	pub fn new(terrain: Terrain) -> Self {
		Self {
			terrain: Some(terrain),
			receiver: None,
			snapshot: RenderSnapshot::default(),
			clear_requested: false,
			frames: 0,
		}
	}

	/// Check if a frame is running.
	#[inline]
	pub fn is_busy(&self) -> bool {
		self.receiver.is_some()
	}

	/// Completed frames.
	#[inline]
	pub fn frames(&self) -> u64 {
		self.frames
	}

	/// Latest completed snapshot.
	#[inline]
	pub fn snapshot(&self) -> &RenderSnapshot {
		&self.snapshot
	}

	/// The terrain, unless a frame is in flight.
	#[inline]
	pub fn terrain(&self) -> Option<&Terrain> {
		self.terrain.as_ref()
	}

	#[inline]
	pub fn terrain_mut(&mut self) -> Option<&mut Terrain> {
		self.terrain.as_mut()
	}

	/// Clear the terrain now, or as soon as the running frame returns.
	pub fn request_clear(&mut self) {
		let busy = self.is_busy();
		match self.terrain.as_mut() {
			Some(terrain) if !busy => {
				terrain.clear_terrain();
				self.snapshot = RenderSnapshot::default();
			}
			_ => self.clear_requested = true,
		}
	}

	/// Start one frame for `camera`.
	///
	/// Returns `true` if started, `false` if already busy.
	pub fn start(&mut self, camera: Camera) -> bool {
		if self.is_busy() {
			return false;
		}
		let Some(mut terrain) = self.terrain.take() else {
			return false;
		};

		let frame = self.frames + 1;
		let (sender, receiver) = channel::bounded(1);
		self.receiver = Some(receiver);

		rayon::spawn(move || {
			let stats = terrain.frame(&camera);
			let snapshot = RenderSnapshot::capture(&terrain, frame);
			// Ignore send error (receiver dropped = cancelled)
			let _ = sender.send(FrameOutput {
				terrain,
				stats,
				snapshot,
			});
		});

		true
	}

	/// Poll for the running frame (non-blocking).
	///
	/// Returns the frame's stats once the terrain is back.
	pub fn poll(&mut self) -> Option<FrameStats> {
		let receiver = self.receiver.as_ref()?;

		match receiver.try_recv() {
			Ok(output) => Some(self.finish(output)),
			Err(TryRecvError::Empty) => None,
			Err(TryRecvError::Disconnected) => {
				self.receiver = None;
				tracing::warn!("terrain worker vanished");
				None
			}
		}
	}

	/// Block until the running frame returns.
	pub fn wait(&mut self) -> Option<FrameStats> {
		let receiver = self.receiver.as_ref()?;
		match receiver.recv() {
			Ok(output) => Some(self.finish(output)),
			Err(_) => {
				self.receiver = None;
				tracing::warn!("terrain worker vanished");
				None
			}
		}
	}

	/// Wait for any running frame and give the terrain back.
	pub fn into_inner(mut self) -> Option<Terrain> {
		self.wait();
		self.terrain
	}

	fn finish(&mut self, output: FrameOutput) -> FrameStats {
		let FrameOutput {
			mut terrain,
			stats,
			snapshot,
		} = output;
		self.receiver = None;
		self.frames = snapshot.frame;

		if std::mem::take(&mut self.clear_requested) {
			terrain.clear_terrain();
			self.snapshot = RenderSnapshot {
				frame: snapshot.frame,
				tiles: Vec::new(),
			};
		} else {
			self.snapshot = snapshot;
		}
		self.terrain = Some(terrain);
		stats
	}
}
