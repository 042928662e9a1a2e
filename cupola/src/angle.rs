//! Angle arithmetic for dome and telescope axes.
//!
//! All angles are in degrees. Azimuth wraps at 360; signed differences use
//! shortest-path semantics so a dome at 359 deg and a telescope at 1 deg are
//! 2 deg apart, not 358.

/// Wrap an angle to `[0, 360)` degrees.
pub fn wrap_nonnegative(angle: f64) -> f64 {
    angle.rem_euclid(360.0)
}

/// Wrap an angle to `(-180, 180]` degrees.
pub fn wrap_signed(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Shortest signed difference `a - b` in degrees, in `(-180, 180]`.
pub fn diff(a: f64, b: f64) -> f64 {
    wrap_signed(a - b)
}

/// Azimuth difference scaled by the cosine of the telescope elevation.
///
/// At high elevation the beam passes near the dome zenith, so a given
/// dome-azimuth error obstructs less of the aperture. The scaled value is
/// what gets compared against azimuth thresholds.
pub fn scaled_azimuth_diff(azimuth_a: f64, azimuth_b: f64, elevation: f64) -> f64 {
    diff(azimuth_a, azimuth_b) * elevation.to_radians().cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_wrap_nonnegative() {
        assert_relative_eq!(wrap_nonnegative(0.0), 0.0);
        assert_relative_eq!(wrap_nonnegative(360.0), 0.0);
        assert_relative_eq!(wrap_nonnegative(-1.0), 359.0);
        assert_relative_eq!(wrap_nonnegative(725.0), 5.0);
        assert_relative_eq!(wrap_nonnegative(-725.0), 355.0);
    }

    #[test]
    fn test_wrap_signed() {
        assert_relative_eq!(wrap_signed(0.0), 0.0);
        assert_relative_eq!(wrap_signed(180.0), 180.0);
        assert_relative_eq!(wrap_signed(180.1), -179.9, epsilon = 1e-9);
        assert_relative_eq!(wrap_signed(-180.0), 180.0);
        assert_relative_eq!(wrap_signed(359.0), -1.0);
    }

    #[test]
    fn test_diff_shortest_path() {
        assert_relative_eq!(diff(1.0, 359.0), 2.0);
        assert_relative_eq!(diff(359.0, 1.0), -2.0);
        assert_relative_eq!(diff(90.0, 270.0), 180.0);
        assert_relative_eq!(diff(10.0, 10.0), 0.0);
    }

    #[test]
    fn test_scaled_azimuth_diff() {
        // At the horizon the scaling is unity.
        assert_relative_eq!(scaled_azimuth_diff(10.0, 0.0, 0.0), 10.0);
        // At 60 deg elevation the same difference counts for half.
        assert_relative_eq!(scaled_azimuth_diff(10.0, 0.0, 60.0), 5.0, epsilon = 1e-9);
        // Sign follows the shortest-path difference.
        assert_relative_eq!(scaled_azimuth_diff(0.0, 10.0, 60.0), -5.0, epsilon = 1e-9);
    }
}
