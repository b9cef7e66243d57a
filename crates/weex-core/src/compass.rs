//! Bearing helpers shared by the vector accumulators

const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Decompose a speed/navigation bearing pair into (x, y) components.
///
/// The bearing is converted to a standard angle (`90 - bearing`) first, so
/// north maps to +y and east to +x.
pub fn components(speed: f64, bearing: f64) -> (f64, f64) {
    let angle = (90.0 - bearing).to_radians();
    (speed * angle.cos(), speed * angle.sin())
}

/// Navigation bearing of a summed (x, y) vector, normalised to [0, 360)
pub fn bearing_from_components(x: f64, y: f64) -> f64 {
    let bearing = 90.0 - y.atan2(x).to_degrees();
    let bearing = bearing.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if bearing >= 360.0 {
        0.0
    } else {
        bearing
    }
}

/// Convert a bearing to its 16-point compass name
pub fn degree_to_compass(bearing: f64) -> &'static str {
    let idx = ((bearing.rem_euclid(360.0) + 11.25) / 22.5) as usize;
    COMPASS_POINTS[idx % COMPASS_POINTS.len()]
}
