//! terrain_plugin - Engine independent seamless Delaunay terrain
//!
//! Infinite height-field terrain built from a sliding quadtree window of
//! square tiles. Every tile owns a Delaunay triangulation in the XZ plane
//! that is refined point by point where a screen-space error metric says
//! the mesh is too coarse. Neighboring tiles stay watertight: refinement
//! migrates triangles and points across tile borders and keeps the border
//! adjacency of both sides mirrored.
//!
//! # Features
//!
//! - **Bulk generation**: Bowyer–Watson over several new tiles at once,
//!   split back into per-tile storage with cross-tile adjacency
//! - **Incremental refinement**: single-point insertion with migration into
//!   up to 8 neighbor tiles
//! - **Screen-space metric**: projected area and curvature-weighted
//!   displacement, evaluated in parallel with rayon
//! - **Bounded memory**: a fixed tile pool and fixed scratch capacities;
//!   overflow abandons one unit of work, never the frame
//! - **Double buffering**: [`pipeline::AsyncTerrain`] runs frames off the
//!   render thread and publishes render-only snapshots
//!
//! # Example
//!
//! ```ignore
//! use terrain_plugin::{Camera, NullSink, Terrain, TerrainConfig};
//!
//! let mut terrain = Terrain::procedural(TerrainConfig::default())?;
//! let camera = Camera::look_at(eye, target, fov_y, aspect, 1.0, 20_000.0);
//!
//! let stats = terrain.frame(&camera);
//! terrain.upload(&mut sink);
//! terrain.draw(&mut sink);
//! println!("{} triangles, {} points inserted",
//!     terrain.triangle_count(), stats.refine.inserted);
//! ```

pub mod config;
pub mod error;
pub mod types;

pub use config::TerrainConfig;
pub use error::{CapacityError, ConfigError};
pub use types::{Adjacency, Direction, PendingPoint, Vertex};

// Geometry kernel and frustum
pub mod geometry;

// Tiles and the tile arena
pub mod tile;
pub use tile::{DirtyRange, Tile, TileCapacity, TileHandle, TilePool};

// Sliding window of cells and the visibility pass
pub mod quadtree;
pub use quadtree::{Quadtree, VisibleSets};

// Height and curvature oracle
pub mod sampler;
pub use sampler::{FlatTerrain, HeightOracle, HeightSampler, PlaneTerrain, ProceduralTerrain};

// Scratch buffers
pub mod workspace;
pub use workspace::{Workspace, WorkspaceCapacity};

// Triangulation
pub mod generate;
pub mod metric;
pub mod refine;
pub use generate::{GenerateStats, Generator};
pub use metric::{MetricParams, MetricStats};
pub use refine::RefineStats;

// Frame driver
pub mod budget;
pub mod camera;
pub mod sink;
pub mod terrain;
pub use budget::{FrameStats, RefineBudget};
pub use camera::Camera;
pub use sink::{DrawCommand, MeshSink, NullSink, RecordingSink, UploadCommand};
pub use terrain::{Terrain, TerrainBackup};

// Off-thread frames
pub mod pipeline;
pub use pipeline::{AsyncTerrain, RenderSnapshot};

// Engine-agnostic metrics
pub mod metrics;
pub use metrics::{FrameHistory, FrameSample, TerrainMetrics};
