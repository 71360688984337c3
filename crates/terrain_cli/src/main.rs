//! Headless terrain fly-through.
//!
//! Flies a scripted camera over the terrain through the double-buffered
//! worker and reports refinement statistics. Every frame the previous
//! snapshot is "rendered" while the worker runs, then the finished frame is
//! uploaded into a recording sink.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::{Config, SamplerConfig};
use terrain_plugin::{
	sink::{INDEX_BYTES, VERTEX_BYTES},
	AsyncTerrain, FlatTerrain, HeightSampler, ProceduralTerrain, RecordingSink, Terrain,
	TerrainMetrics,
};

/// Headless fly-through driver for the terrain core.
#[derive(Parser, Debug)]
#[command(name = "terrain_flythrough")]
#[command(about = "Flies a camera over the refining terrain and reports statistics")]
struct Args {
	/// Path to configuration TOML file (defaults are used without one).
	#[arg(short, long)]
	config: Option<PathBuf>,

	/// Override the number of frames.
	#[arg(short, long)]
	frames: Option<u32>,

	/// Log filter used when RUST_LOG is unset.
	#[arg(long, default_value = "info")]
	log: String,
}

fn main() -> Result<()> {
	let args = Args::parse();

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log));
	tracing_subscriber::fmt().with_env_filter(filter).init();

	let mut config = match &args.config {
		Some(path) => {
			tracing::info!(path = %path.display(), "loading config");
			Config::load(path)?
		}
		None => Config::default(),
	};
	if let Some(frames) = args.frames {
		config.frames = frames.max(1);
	}

	let sampler: Arc<dyn HeightSampler> = match config.sampler {
		SamplerConfig::Procedural => Arc::new(ProceduralTerrain::default()),
		SamplerConfig::Flat { height } => Arc::new(FlatTerrain { height }),
	};
	let mut terrain = Terrain::new(config.terrain.clone(), sampler).context("Invalid terrain configuration")?;
	terrain.set_budget(config.budget.budget(config.terrain.refine_rate));

	let buffer_size = terrain.layout().buffer_size(terrain.pool().capacity());
	tracing::info!(
		frames = config.frames,
		tiles = terrain.pool().capacity(),
		buffer_mb = buffer_size as f64 / 1_048_576.0,
		"starting fly-through"
	);

	let metrics = run(&config, terrain)?;

	println!("\nFly-through finished after {} frames", metrics.frames);
	println!("  triangles:        {}", metrics.triangles);
	println!("  tiles in use:     {}", metrics.tiles_in_use);
	println!("  mesh memory:      {:.2} MB", metrics.mesh_memory_mb());
	println!("  avg frame:        {:.0} us", metrics.avg_frame_us());
	if let Some((min, max)) = metrics.history.timing_range() {
		println!("  frame range:      {min}..{max} us");
	}
	println!("  settled frames:   {}", metrics.history.settled_frames());
	println!("  tiles generated:  {}", metrics.tiles_generated);
	println!("  tiles evicted:    {}", metrics.tiles_evicted);
	println!("  points inserted:  {}", metrics.points_inserted);
	println!("  points dropped:   {}", metrics.points_dropped);
	println!("  points abandoned: {}", metrics.points_abandoned);
	println!("  batches abandoned: {}", metrics.batches_abandoned);

	Ok(())
}

/// Drive the worker for every frame of the path.
fn run(config: &Config, terrain: Terrain) -> Result<TerrainMetrics> {
	let mut worker = AsyncTerrain::new(terrain);
	let mut metrics = TerrainMetrics::new();
	let mut sink = RecordingSink::new();
	let mut uploaded_bytes = 0u64;

	for frame in 0..config.frames {
		if !worker.start(config.camera.camera(frame)) {
			anyhow::bail!("terrain worker refused frame {frame}");
		}

		// The renderer only sees the last completed frame.
		let presented = worker.snapshot().triangle_count();

		let stats = worker
			.wait()
			.with_context(|| format!("Terrain worker stopped during frame {frame}"))?;
		metrics.record_frame(&stats);

		let terrain = worker
			.terrain_mut()
			.context("Terrain missing after a completed frame")?;
		sink.clear();
		terrain.upload(&mut sink);
		let drawn = terrain.draw(&mut sink);
		uploaded_bytes += sink
			.uploads
			.iter()
			.map(|u| u.vertex_count as u64 * VERTEX_BYTES + u.index_count as u64 * INDEX_BYTES)
			.sum::<u64>();

		let (vertices, indices) = terrain.mesh_size();
		metrics.record_mesh(vertices, indices, terrain.pool().in_use());

		if config.report_every > 0 && (frame + 1) % config.report_every == 0 {
			tracing::info!(
				frame = frame + 1,
				presented,
				drawn,
				visible = stats.visible,
				queued = stats.metric.points_queued,
				inserted = stats.refine.inserted,
				evicted = stats.evicted,
				timing_us = stats.timing_us,
				"frame"
			);
		}
	}

	tracing::info!(uploaded_mb = uploaded_bytes as f64 / 1_048_576.0, "uploads");
	Ok(metrics)
}
