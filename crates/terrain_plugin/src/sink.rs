//! Mesh sink: the two commands the core hands to a renderer.
//!
//! Every pool slot owns a fixed region of one pooled GPU buffer:
//!
//! ```text
//! slot i:  [ vertices: max_vertices * 16 B ][ indices: max_indices * 4 B ]
//!          ^ i * stride
//! ```
//!
//! Uploads carry only the changed part of a tile (see [`DirtyRange`]), with
//! byte offsets already resolved against this layout.

use crate::config::TerrainConfig;
use crate::tile::DirtyRange;
use crate::types::Vertex;

/// Bytes per uploaded vertex (`[x, y, z, curvature]` as `f32`).
pub const VERTEX_BYTES: u64 = 16;
/// Bytes per uploaded index.
pub const INDEX_BYTES: u64 = 4;

/// Byte range inside the pooled buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
	pub offset: u64,
	pub size: u64,
}

impl Region {
	#[inline]
	pub fn end(&self) -> u64 {
		self.offset + self.size
	}
}

/// Per-slot regions of the pooled buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferLayout {
	pub stride: u64,
	pub vertex_bytes: u64,
	pub index_bytes: u64,
}

impl BufferLayout {
	pub fn new(config: &TerrainConfig) -> Self {
		Self {
			stride: config.buffer_stride(),
			vertex_bytes: config.max_vertices as u64 * VERTEX_BYTES,
			index_bytes: config.max_indices as u64 * INDEX_BYTES,
		}
	}

	/// Bytes needed for `slots` tiles.
	#[inline]
	pub fn buffer_size(&self, slots: usize) -> u64 {
		self.stride * slots as u64
	}

	#[inline]
	pub fn vertex_region(&self, slot: usize) -> Region {
		Region {
			offset: slot as u64 * self.stride,
			size: self.vertex_bytes,
		}
	}

	#[inline]
	pub fn index_region(&self, slot: usize) -> Region {
		Region {
			offset: slot as u64 * self.stride + self.vertex_bytes,
			size: self.index_bytes,
		}
	}
}

/// Copy the changed part of one tile into its slot.
#[derive(Clone, Copy, Debug)]
pub struct UploadCommand<'a> {
	pub slot: usize,
	/// Byte offset of `vertices[0]` in the pooled buffer.
	pub vertex_offset: u64,
	/// Vertices `dirty.first_vertex..dirty.vertex_count`.
	pub vertices: &'a [Vertex],
	/// Byte offset of `indices[0]` in the pooled buffer.
	pub index_offset: u64,
	/// Indices `dirty.first_index..dirty.index_count`.
	pub indices: &'a [u32],
	pub dirty: DirtyRange,
}

/// Draw the first `index_count` indices of one slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawCommand {
	pub slot: usize,
	pub vertex_region: Region,
	pub index_region: Region,
	pub index_count: u32,
}

/// Receiver of upload and draw commands.
pub trait MeshSink {
	fn upload(&mut self, command: UploadCommand<'_>);
	fn draw(&mut self, command: DrawCommand);
}

impl<S: MeshSink + ?Sized> MeshSink for &mut S {
	#[inline]
	fn upload(&mut self, command: UploadCommand<'_>) {
		(**self).upload(command);
	}

	#[inline]
	fn draw(&mut self, command: DrawCommand) {
		(**self).draw(command);
	}
}

/// Build the upload for `dirty` from a tile's arrays.
pub fn upload_command<'a>(
	layout: &BufferLayout,
	slot: usize,
	vertices: &'a [Vertex],
	indices: &'a [u32],
	dirty: DirtyRange,
) -> UploadCommand<'a> {
	UploadCommand {
		slot,
		vertex_offset: layout.vertex_region(slot).offset + dirty.first_vertex as u64 * VERTEX_BYTES,
		vertices: &vertices[dirty.first_vertex..dirty.vertex_count],
		index_offset: layout.index_region(slot).offset + dirty.first_index as u64 * INDEX_BYTES,
		indices: &indices[dirty.first_index..dirty.index_count],
		dirty,
	}
}

/// Little-endian bytes of `vertices` in upload layout.
pub fn vertex_bytes(vertices: &[Vertex]) -> Vec<u8> {
	let mut bytes = Vec::with_capacity(vertices.len() * VERTEX_BYTES as usize);
	for v in vertices {
		for f in v.to_array() {
			bytes.extend_from_slice(&f.to_le_bytes());
		}
	}
	bytes
}

/// Little-endian bytes of `indices`.
pub fn index_bytes(indices: &[u32]) -> Vec<u8> {
	indices.iter().flat_map(|i| i.to_le_bytes()).collect()
}

/// Sink that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl MeshSink for NullSink {
	fn upload(&mut self, _command: UploadCommand<'_>) {}
	fn draw(&mut self, _command: DrawCommand) {}
}

/// Upload as recorded by [`RecordingSink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordedUpload {
	pub slot: usize,
	pub vertex_offset: u64,
	pub vertex_count: usize,
	pub index_offset: u64,
	pub index_count: usize,
	pub dirty: DirtyRange,
}

/// Sink that records commands and optionally mirrors the pooled buffer.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
	pub uploads: Vec<RecordedUpload>,
	pub draws: Vec<DrawCommand>,
	/// Byte image of the pooled buffer; empty unless created with
	/// [`RecordingSink::with_buffer`].
	pub buffer: Vec<u8>,
}

impl RecordingSink {
	pub fn new() -> Self {
		Self::default()
	}

	/// Record and also write uploads into a `size`-byte buffer image.
	pub fn with_buffer(size: u64) -> Self {
		Self {
			buffer: vec![0; size as usize],
			..Self::default()
		}
	}

	/// Forget recorded commands; the buffer image is kept.
	pub fn clear(&mut self) {
		self.uploads.clear();
		self.draws.clear();
	}

	/// Uploaded bytes read back as indices.
	pub fn read_indices(&self, region: Region, count: usize) -> Vec<u32> {
		let start = region.offset as usize;
		self.buffer[start..start + count * INDEX_BYTES as usize]
			.chunks_exact(4)
			.map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
			.collect()
	}

	fn write(&mut self, offset: u64, bytes: &[u8]) {
		let start = offset as usize;
		if let Some(dst) = self.buffer.get_mut(start..start + bytes.len()) {
			dst.copy_from_slice(bytes);
		}
	}
}

impl MeshSink for RecordingSink {
	fn upload(&mut self, command: UploadCommand<'_>) {
		if !self.buffer.is_empty() {
			self.write(command.vertex_offset, &vertex_bytes(command.vertices));
			self.write(command.index_offset, &index_bytes(command.indices));
		}
		self.uploads.push(RecordedUpload {
			slot: command.slot,
			vertex_offset: command.vertex_offset,
			vertex_count: command.vertices.len(),
			index_offset: command.index_offset,
			index_count: command.indices.len(),
			dirty: command.dirty,
		});
	}

	fn draw(&mut self, command: DrawCommand) {
		self.draws.push(command);
	}
}

#[cfg(test)]
mod tests {
	use glam::Vec3;

	use super::*;

	#[test]
	fn test_layout_regions() {
		let config = TerrainConfig::default();
		let layout = BufferLayout::new(&config);
		assert_eq!(layout.stride, 12_000 * 4 + 4_000 * 16);
		assert_eq!(layout.vertex_region(0), Region { offset: 0, size: 64_000 });
		assert_eq!(layout.index_region(0).offset, 64_000);
		assert_eq!(layout.index_region(0).end(), layout.stride);
		assert_eq!(layout.vertex_region(2).offset, 2 * layout.stride);
	}

	#[test]
	fn test_upload_command_offsets() {
		let config = TerrainConfig::default();
		let layout = BufferLayout::new(&config);
		let vertices = [Vertex::default(); 5];
		let indices = [0u32, 1, 2, 2, 3, 4];
		let dirty = DirtyRange {
			first_index: 3,
			index_count: 6,
			first_vertex: 4,
			vertex_count: 5,
		};
		let cmd = upload_command(&layout, 1, &vertices, &indices, dirty);
		assert_eq!(cmd.vertices.len(), 1);
		assert_eq!(cmd.indices, &[2, 3, 4]);
		assert_eq!(cmd.vertex_offset, layout.stride + 4 * VERTEX_BYTES);
		assert_eq!(cmd.index_offset, layout.stride + layout.vertex_bytes + 3 * INDEX_BYTES);
	}

	#[test]
	fn test_vertex_bytes_layout() {
		let bytes = vertex_bytes(&[Vertex::new(Vec3::new(1.0, 2.0, 3.0), 4.0)]);
		assert_eq!(bytes.len(), 16);
		assert_eq!(&bytes[4..8], &2.0f32.to_le_bytes());
		assert_eq!(&bytes[12..16], &4.0f32.to_le_bytes());
	}

	#[test]
	fn test_recording_sink_mirrors_buffer() {
		let config = TerrainConfig::default();
		let layout = BufferLayout::new(&config);
		let mut sink = RecordingSink::with_buffer(layout.buffer_size(2));
		let vertices = [Vertex::default(); 3];
		let indices = [2u32, 1, 0];
		let dirty = DirtyRange {
			first_index: 0,
			index_count: 3,
			first_vertex: 0,
			vertex_count: 3,
		};
		sink.upload(upload_command(&layout, 1, &vertices, &indices, dirty));
		assert_eq!(sink.uploads.len(), 1);
		assert_eq!(sink.read_indices(layout.index_region(1), 3), vec![2, 1, 0]);
	}
}
