//! Self-heating compensation.
//!
//! The sensor measures temperature and relative humidity next to its own
//! electronics, which run warmer than the surrounding air. Temperature gets a
//! fixed offset; humidity is re-referenced to the corrected temperature using
//! the Magnus form of the saturation vapour pressure curve.

/// Degrees Celsius the sensor reads above ambient.
pub const SELF_HEATING_OFFSET: f64 = 4.5;

const MAGNUS_A: f64 = 7.5;
const MAGNUS_B: f64 = 237.3;

pub fn correct_temperature(raw_temperature: f64) -> f64 {
    raw_temperature - SELF_HEATING_OFFSET
}

/// Relative humidity at the corrected temperature, given the raw humidity and
/// the raw (self-heated) temperature it was measured at.
pub fn correct_humidity(raw_humidity: f64, raw_temperature: f64) -> f64 {
    let corrected = correct_temperature(raw_temperature);
    raw_humidity * saturation_factor(raw_temperature) / saturation_factor(corrected)
}

fn saturation_factor(temperature: f64) -> f64 {
    10.0_f64.powf(MAGNUS_A * temperature / (temperature + MAGNUS_B))
}
