use super::*;

// =========================================================================
// Batch 1: Direction Encoding Tests
// =========================================================================

/// Every direction survives offset -> direction -> offset.
#[test]
fn test_direction_offset_round_trip() {
	for dir in Direction::ALL {
		assert_eq!(Direction::from_offset(dir.offset()), Some(dir));
	}
}

/// The center offset and far offsets are not directions.
#[test]
fn test_direction_rejects_self_and_far() {
	assert_eq!(Direction::from_offset(IVec2::ZERO), None);
	assert_eq!(Direction::from_offset(IVec2::new(2, 0)), None);
	assert_eq!(Direction::from_offset(IVec2::new(-1, -2)), None);
	assert_eq!(Direction::from_index(SELF_INDEX), None);
	assert_eq!(Direction::from_index(9), None);
}

/// Opposite mirrors the offset.
#[test]
fn test_direction_opposite() {
	for dir in Direction::ALL {
		assert_eq!(dir.opposite().offset(), -dir.offset());
		assert_eq!(dir.opposite().opposite(), dir);
	}
	assert_eq!(Direction::WEST.opposite(), Direction::EAST);
	assert_eq!(Direction::SOUTH.opposite(), Direction::NORTH);
}

/// `between` uses neighborhood slots relative to each other.
#[test]
fn test_direction_between_slots() {
	// slot 3 is west of center, slot 5 east of center: two apart.
	assert_eq!(Direction::between(3, 5), None);
	assert_eq!(Direction::between(SELF_INDEX, 5), Some(Direction::EAST));
	assert_eq!(Direction::between(5, SELF_INDEX), Some(Direction::WEST));
	assert_eq!(Direction::between(0, 4).map(|d| d.offset()), Some(IVec2::new(1, 1)));
	assert_eq!(Direction::between(2, 2), None);
}

#[test]
fn test_neighborhood_index_layout() {
	assert_eq!(neighborhood_index(IVec2::new(-1, -1)), Some(0));
	assert_eq!(neighborhood_index(IVec2::ZERO), Some(SELF_INDEX));
	assert_eq!(neighborhood_index(IVec2::new(1, 1)), Some(8));
	assert_eq!(neighborhood_index(IVec2::new(0, 2)), None);
	for i in 0..NEIGHBORHOOD {
		assert_eq!(neighborhood_index(neighborhood_offset(i)), Some(i));
	}
}

// =========================================================================
// Batch 2: Vertex and Edge Helpers
// =========================================================================

#[test]
fn test_vertex_layout() {
	let v = Vertex::new(Vec3::new(1.0, 2.0, 3.0), 0.5);
	assert_eq!(v.to_array(), [1.0, 2.0, 3.0, 0.5]);
	assert_eq!(v.xz(), Vec2::new(1.0, 3.0));
}

#[test]
fn test_same_edge_is_unordered() {
	let a = Vec3::new(0.0, 0.0, 0.0);
	let b = Vec3::new(1.0, 0.0, 0.0);
	let c = Vec3::new(1.0, 0.0, 1.0);
	assert!(same_edge(a, b, b, a));
	assert!(same_edge(a, b, a, b));
	assert!(!same_edge(a, b, a, c));
}

#[test]
fn test_adjacency_helpers() {
	assert_eq!(Adjacency::Local(7).local(), Some(7));
	assert_eq!(Adjacency::Unknown.local(), None);
	assert!(!Adjacency::Border(Direction::EAST).is_local());
}
