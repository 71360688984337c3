use super::*;

/// Defaults describe a 4x4 window of 250-unit tiles.
#[test]
fn test_default_layout() {
  let config = TerrainConfig::default();
  assert_eq!(config.window_cells(), 4);
  assert_eq!(config.window_side_length(), 1000.0);
  assert_eq!(config.tile_capacity().triangles(), 4000);
  assert_eq!(config.buffer_stride(), 12000 * 4 + 4000 * 16);
  assert_eq!(config.validate(), Ok(()));
}

/// Zero capacities are rejected by name.
#[test]
fn test_zero_capacity_rejected() {
  let config = TerrainConfig {
    max_border_triangles: 0,
    ..Default::default()
  };
  assert_eq!(
    config.validate(),
    Err(ConfigError::ZeroCapacity("max_border_triangles"))
  );
}

/// Shift distance must leave room for the camera inside the window.
#[test]
fn test_shift_distance_bounds() {
  let config = TerrainConfig {
    shift_distance: 500.0,
    ..Default::default()
  };
  assert!(matches!(
    config.validate(),
    Err(ConfigError::ShiftDistance { .. })
  ));
}

#[test]
fn test_grid_validation() {
  let small = TerrainConfig {
    grid_side: 1,
    ..Default::default()
  };
  assert_eq!(small.validate(), Err(ConfigError::GridSide(1)));

  for even in [2, 4, 8] {
    let config = TerrainConfig {
      grid_side: even,
      ..Default::default()
    };
    assert_eq!(
      config.validate(),
      Err(ConfigError::GridSide(even)),
      "grid_side {even} staggers its last row"
    );
  }
  for odd in [3, 5, 9] {
    let config = TerrainConfig {
      grid_side: odd,
      ..Default::default()
    };
    assert_eq!(config.validate(), Ok(()));
  }

  let too_large = TerrainConfig {
    grid_side: 100,
    ..Default::default()
  };
  assert!(matches!(
    too_large.validate(),
    Err(ConfigError::GridTooLarge { .. })
  ));
}

#[test]
fn test_float_fields_rejected() {
  let bad_side = TerrainConfig {
    tile_side_length: f32::NAN,
    ..Default::default()
  };
  assert!(bad_side.validate().is_err());

  let bad_heights = TerrainConfig {
    height_range: [10.0, -10.0],
    ..Default::default()
  };
  assert!(matches!(
    bad_heights.validate(),
    Err(ConfigError::HeightRange { .. })
  ));

  let bad_width = TerrainConfig {
    gaussian_width: 0.0,
    ..Default::default()
  };
  assert_eq!(bad_width.validate(), Err(ConfigError::GaussianWidth(0.0)));
}
