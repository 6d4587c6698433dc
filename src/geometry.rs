//! Great-circle distance and altitude frame conversion.

/// Mean Earth radius in nautical miles
pub const EARTH_RADIUS_NM: f64 = 3440.065;

/// Meters to feet conversion factor
pub const METERS_TO_FEET: f64 = 3.28084;

/// Calculate the great-circle distance between two points using the Haversine formula
///
/// Inputs are degrees, result is nautical miles. No validation is done: a NaN input
/// yields a NaN distance rather than a clamped value.
pub fn haversine_distance_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_NM * c
}

/// Convert a barometric altitude in meters to feet above the field
///
/// Returns None when there is no barometric altitude (aircraft reported on ground).
pub fn altitude_agl_ft(baro_altitude_m: Option<f64>, field_elevation_ft_msl: f64) -> Option<f64> {
    baro_altitude_m.map(|meters| meters * METERS_TO_FEET - field_elevation_ft_msl)
}

/// Convert a barometric altitude in meters to feet MSL
pub fn altitude_msl_ft(baro_altitude_m: Option<f64>) -> Option<f64> {
    baro_altitude_m.map(|meters| meters * METERS_TO_FEET)
}

/// Offset a latitude northwards by a distance in nautical miles
///
/// One minute of latitude is one nautical mile on the mean-radius sphere used above,
/// which keeps fixtures that walk an aircraft along a meridian exact.
pub fn latitude_offset_nm(lat: f64, distance_nm: f64) -> f64 {
    lat + (distance_nm / EARTH_RADIUS_NM).to_degrees()
}
