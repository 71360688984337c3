//! Fly-through configuration.

use std::path::Path;

use anyhow::{Context, Result};
use glam::{Vec2, Vec3};
use serde::Deserialize;
use terrain_plugin::{Camera, RefineBudget, TerrainConfig};

/// Root configuration of a fly-through run.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Frames to run.
	pub frames: u32,
	/// Log a progress line every N frames (0 = never).
	pub report_every: u32,
	/// Height field under the terrain.
	pub sampler: SamplerConfig,
	/// Scripted camera path.
	pub camera: CameraPath,
	/// Per-frame work limits.
	pub budget: BudgetConfig,
	/// Core terrain configuration.
	pub terrain: TerrainConfig,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			frames: 120,
			report_every: 10,
			sampler: SamplerConfig::default(),
			camera: CameraPath::default(),
			budget: BudgetConfig::default(),
			terrain: TerrainConfig::default(),
		}
	}
}

/// Which height field to sample.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SamplerConfig {
	Procedural,
	Flat {
		#[serde(default)]
		height: f32,
	},
}

impl Default for SamplerConfig {
	fn default() -> Self {
		SamplerConfig::Procedural
	}
}

/// Straight-line camera flight at a fixed height.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraPath {
	/// Eye position at frame 0.
	pub start: [f32; 3],
	/// Flight direction in the XZ plane.
	pub heading: [f32; 2],
	/// World units per frame.
	pub speed: f32,
	/// Ground distance ahead of the eye the camera looks at.
	pub look_ahead: f32,
	pub fov_deg: f32,
	pub aspect: f32,
	pub near: f32,
	pub far: f32,
}

impl Default for CameraPath {
	fn default() -> Self {
		Self {
			start: [0.0, 300.0, 0.0],
			heading: [1.0, 0.0],
			speed: 20.0,
			look_ahead: 600.0,
			fov_deg: 60.0,
			aspect: 16.0 / 9.0,
			near: 1.0,
			far: 20_000.0,
		}
	}
}

impl CameraPath {
	/// Camera at `frame` along the path.
	pub fn camera(&self, frame: u32) -> Camera {
		let heading = Vec2::from(self.heading).normalize_or_zero();
		let offset = heading * self.speed * frame as f32;
		let eye = Vec3::from(self.start) + Vec3::new(offset.x, 0.0, offset.y);
		let ahead = heading * self.look_ahead;
		let target = Vec3::new(eye.x + ahead.x, 0.0, eye.z + ahead.y);
		Camera::look_at(
			eye,
			target,
			self.fov_deg.to_radians(),
			self.aspect,
			self.near,
			self.far,
		)
	}
}

/// Mirror of [`RefineBudget`] for config files.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
	/// Pending points inserted per tile per frame (0 = `terrain.refine_rate`).
	pub points_per_tile: usize,
	pub tiles_per_frame: usize,
	pub batches_per_frame: usize,
}

impl Default for BudgetConfig {
	fn default() -> Self {
		Self {
			points_per_tile: 0,
			tiles_per_frame: RefineBudget::DEFAULT.tiles_per_frame,
			batches_per_frame: RefineBudget::DEFAULT.batches_per_frame,
		}
	}
}

impl BudgetConfig {
	pub fn budget(&self, refine_rate: u32) -> RefineBudget {
		RefineBudget {
			points_per_tile: if self.points_per_tile == 0 {
				refine_rate as usize
			} else {
				self.points_per_tile
			},
			tiles_per_frame: self.tiles_per_frame,
			batches_per_frame: self.batches_per_frame,
		}
	}
}

impl Config {
	/// Load configuration from a TOML file.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file: {}", path.display()))?;
		Self::parse(&content)
	}

	/// Parse and validate TOML text.
	pub fn parse(content: &str) -> Result<Self> {
		let config: Config = toml::from_str(content).with_context(|| "Failed to parse config TOML")?;
		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<()> {
		if self.frames == 0 {
			anyhow::bail!("frames must be at least 1");
		}
		let camera = &self.camera;
		if Vec2::from(camera.heading).length_squared() == 0.0 {
			anyhow::bail!("camera.heading must not be zero");
		}
		if !(camera.fov_deg > 0.0 && camera.fov_deg < 180.0) {
			anyhow::bail!("camera.fov_deg must be in (0, 180), got {}", camera.fov_deg);
		}
		if !(camera.aspect > 0.0) {
			anyhow::bail!("camera.aspect must be positive, got {}", camera.aspect);
		}
		if !(camera.near > 0.0 && camera.far > camera.near) {
			anyhow::bail!(
				"camera clip planes must satisfy 0 < near < far, got {}..{}",
				camera.near,
				camera.far
			);
		}
		self.terrain
			.validate()
			.context("Invalid [terrain] section")?;
		Ok(())
	}
}
