//! Feature derivation from raw observations.
//!
//! Missing measurements never fail: each feature has a fixed default, and
//! derived features collapse to zero when their inputs are absent.

use crate::models::Observation;

/// Number of features every analyzer derives.
pub const FEATURE_COUNT: usize = 10;

/// Feature names in vector order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "period",
    "depth",
    "duration",
    "stellar_mass",
    "stellar_radius",
    "temperature",
    "orbital_distance",
    "radius_ratio_approx",
    "log_period",
    "signal_to_noise",
];

/// Default stellar mass in solar masses.
pub const DEFAULT_STELLAR_MASS: f64 = 1.0;
/// Default stellar radius in solar radii.
pub const DEFAULT_STELLAR_RADIUS: f64 = 1.0;
/// Default effective temperature (the Sun), in kelvin.
pub const DEFAULT_TEMPERATURE: f64 = 5777.0;
/// Noise floor used for the signal-to-noise ratio.
pub const NOISE_FLOOR: f64 = 0.001;

const GRAVITATIONAL_CONSTANT: f64 = 6.67430e-11;
const SOLAR_MASS_KG: f64 = 1.989e30;
const ASTRONOMICAL_UNIT_M: f64 = 1.496e11;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// The ten features derived from one observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Derive features from an observation, substituting defaults.
    pub fn extract(observation: &Observation) -> Self {
        let period = observation.get("period");
        let depth = observation.get("depth");
        let stellar_mass = observation.get("stellar_mass");

        let orbital_distance = match (period, stellar_mass) {
            (Some(p), Some(m)) => orbital_distance_au(m, p),
            _ => 0.0,
        };

        let radius_ratio = depth.filter(|d| *d > 0.0).map(f64::sqrt).unwrap_or(0.0);

        let log_period = period.filter(|p| *p > 0.0).map(f64::log10).unwrap_or(0.0);

        let noise = observation.value_or("noise", NOISE_FLOOR).max(NOISE_FLOOR);
        let snr = depth.unwrap_or(0.0) / noise;

        Self {
            values: [
                period.unwrap_or(0.0),
                depth.unwrap_or(0.0),
                observation.value_or("duration", 0.0),
                stellar_mass.unwrap_or(DEFAULT_STELLAR_MASS),
                observation.value_or("stellar_radius", DEFAULT_STELLAR_RADIUS),
                observation.value_or("temperature", DEFAULT_TEMPERATURE),
                orbital_distance,
                radius_ratio,
                log_period,
                snr,
            ],
        }
    }

    /// Feature values in [`FEATURE_NAMES`] order.
    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.values
    }

    /// Look up a feature by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.values[i])
    }

    /// The last feature: transit signal-to-noise ratio.
    pub fn signal_to_noise(&self) -> f64 {
        self.values[FEATURE_COUNT - 1]
    }

    /// Iterate `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied())
    }
}

/// Feature names as owned strings.
pub fn feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}

/// Semi-major axis in AU from Kepler's third law.
///
/// `stellar_mass` is in solar masses, `period` in days. Non-positive inputs
/// yield zero.
pub fn orbital_distance_au(stellar_mass: f64, period: f64) -> f64 {
    if stellar_mass <= 0.0 || period <= 0.0 {
        return 0.0;
    }

    let mass_kg = stellar_mass * SOLAR_MASS_KG;
    let period_s = period * SECONDS_PER_DAY;
    let a = (GRAVITATIONAL_CONSTANT * mass_kg * period_s.powi(2)
        / (4.0 * std::f64::consts::PI.powi(2)))
    .cbrt();

    a / ASTRONOMICAL_UNIT_M
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_observation_uses_defaults() {
        let features = FeatureVector::extract(&Observation::new());

        assert_eq!(features.get("period"), Some(0.0));
        assert_eq!(features.get("stellar_mass"), Some(DEFAULT_STELLAR_MASS));
        assert_eq!(features.get("stellar_radius"), Some(DEFAULT_STELLAR_RADIUS));
        assert_eq!(features.get("temperature"), Some(DEFAULT_TEMPERATURE));
        assert_eq!(features.get("orbital_distance"), Some(0.0));
        assert_eq!(features.get("log_period"), Some(0.0));
        assert_eq!(features.signal_to_noise(), 0.0);
    }

    #[test]
    fn test_derived_features() {
        let obs = Observation::new()
            .with("period", 100.0)
            .with("depth", 0.0004)
            .with("noise", 0.00005)
            .with("stellar_mass", 1.0);
        let features = FeatureVector::extract(&obs);

        assert!((features.get("radius_ratio_approx").unwrap() - 0.02).abs() < 1e-12);
        assert!((features.get("log_period").unwrap() - 2.0).abs() < 1e-12);
        // noise below the floor is raised to it
        assert!((features.signal_to_noise() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_orbital_distance_earth_like() {
        let au = orbital_distance_au(1.0, 365.25);
        assert!((au - 1.0).abs() < 0.01, "got {}", au);
        assert_eq!(orbital_distance_au(1.0, 0.0), 0.0);
    }

    #[test]
    fn test_orbital_distance_needs_both_inputs() {
        let obs = Observation::new().with("period", 365.25);
        let features = FeatureVector::extract(&obs);
        assert_eq!(features.get("orbital_distance"), Some(0.0));
    }
}
