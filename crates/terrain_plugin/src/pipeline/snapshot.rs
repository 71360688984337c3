//! Render-only copy of the drawn tiles.

use glam::IVec2;

use crate::terrain::Terrain;
use crate::types::Vertex;

/// Mesh data of one drawn tile.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TileMesh {
	pub cell: IVec2,
	pub slot: usize,
	pub vertices: Vec<Vertex>,
	pub indices: Vec<u32>,
}

impl TileMesh {
	#[inline]
	pub fn triangle_count(&self) -> usize {
		self.indices.len() / 3
	}
}

/// Full copy of every drawn tile, taken at the end of a frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderSnapshot {
	/// Frame counter of the worker that produced the snapshot.
	pub frame: u64,
	pub tiles: Vec<TileMesh>,
}

impl RenderSnapshot {
	/// Copy the drawn, non-empty tiles of `terrain`.
	#[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "pipeline::capture"))]
	pub fn capture(terrain: &Terrain, frame: u64) -> Self {
		let tiles = terrain
			.visible()
			.draw
			.iter()
			.filter_map(|&(cell, handle)| {
				let tile = terrain.pool().get(handle)?;
				(tile.index_count() > 0).then(|| TileMesh {
					cell,
					slot: handle.slot(),
					vertices: tile.vertices().to_vec(),
					indices: tile.indices().to_vec(),
				})
			})
			.collect();
		Self { frame, tiles }
	}

	pub fn is_empty(&self) -> bool {
		self.tiles.is_empty()
	}

	pub fn triangle_count(&self) -> usize {
		self.tiles.iter().map(TileMesh::triangle_count).sum()
	}

	pub fn get(&self, cell: IVec2) -> Option<&TileMesh> {
		self.tiles.iter().find(|t| t.cell == cell)
	}
}
