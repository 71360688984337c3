//! Frame pipeline off the render thread.
//!
//! [`AsyncTerrain`] runs whole frames on rayon and publishes a
//! [`RenderSnapshot`] per completed frame.

pub mod async_terrain;
pub mod snapshot;


pub use async_terrain::AsyncTerrain;
pub use snapshot::{RenderSnapshot, TileMesh};
