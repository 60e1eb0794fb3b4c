//! Orbital zone definitions.

use serde::{Deserialize, Serialize};

/// Static definition of an orbital zone.
///
/// # Example RON
///
/// ```ron
/// ZoneData(
///     id: "mars",
///     name: "Mars",
///     radius_au: 1.52,
///     metal_percentage: 0.25,
///     mining_rate_multiplier: 0.9,
///     delta_v_penalty: 0.2,
///     metal_stores_kg: 1.6e22,
///     total_mass_kg: 6.4e23,
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneData {
    /// Unique zone identifier.
    pub id: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Orbital radius in AU, used for transfer cost and solar scaling.
    #[serde(default = "default_radius")]
    pub radius_au: f64,

    /// Whether this is the Dyson ring where the sphere is assembled.
    #[serde(default)]
    pub is_dyson_zone: bool,

    /// Fraction of mined mass that is usable metal.
    #[serde(default = "default_metal_percentage")]
    pub metal_percentage: f64,

    /// Zone-specific harvesting speed multiplier.
    #[serde(default = "default_multiplier")]
    pub mining_rate_multiplier: f64,

    /// Harvesting and transfer difficulty.
    #[serde(default = "default_delta_v_penalty")]
    pub delta_v_penalty: f64,

    /// Extractable metal in kg.
    #[serde(default)]
    pub metal_stores_kg: f64,

    /// Total mass in kg (metal plus everything else).
    #[serde(default)]
    pub total_mass_kg: f64,
}

fn default_radius() -> f64 {
    1.0
}

fn default_metal_percentage() -> f64 {
    0.32
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_delta_v_penalty() -> f64 {
    0.1
}

impl ZoneData {
    /// Inverse-square solar irradiance relative to 1 AU.
    #[must_use]
    pub fn solar_factor(&self) -> f64 {
        if self.radius_au > 0.0 {
            1.0 / (self.radius_au * self.radius_au)
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_defaults() {
        let zone: ZoneData = ron::from_str(r#"ZoneData(id: "ceres")"#).expect("parse");
        assert_eq!(zone.radius_au, 1.0);
        assert_eq!(zone.metal_percentage, 0.32);
        assert_eq!(zone.delta_v_penalty, 0.1);
        assert!(!zone.is_dyson_zone);
    }

    #[test]
    fn test_solar_factor() {
        let zone: ZoneData =
            ron::from_str(r#"ZoneData(id: "mars", radius_au: 2.0)"#).expect("parse");
        assert!((zone.solar_factor() - 0.25).abs() < 1e-12);

        let degenerate: ZoneData =
            ron::from_str(r#"ZoneData(id: "x", radius_au: 0.0)"#).expect("parse");
        assert_eq!(degenerate.solar_factor(), 1.0);
    }
}
