use serde::Deserialize;

use crate::{
    error::{Error, Result},
    system::{Interaction, Stencil, System},
};

/// Represents a full system in a config file.
#[derive(Debug, Deserialize)]
pub struct ConfigSystem {
    grid: ConfigGrid,
    electrons: String,
    potential: ConfigPotential,
    #[serde(default)]
    interaction: Interaction,
    #[serde(default)]
    stencil: Stencil,
}

/// Either an explicit list of grid points or a number of points with their spacing,
/// centered on the origin.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConfigGrid {
    Points { x: Vec<f64> },
    Uniform { points: usize, spacing: f64 },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ConfigPotential {
    Zero,
    Harmonic {
        omega: f64,
        #[serde(default)]
        center: f64,
    },
    Sampled {
        values: Vec<f64>,
    },
}

impl ConfigPotential {
    fn sample(self, x: &[f64]) -> Vec<f64> {
        match self {
            ConfigPotential::Zero => vec![0.0; x.len()],
            ConfigPotential::Harmonic { omega, center } => x
                .iter()
                .map(|&xi| 0.5 * omega.powi(2) * (xi - center).powi(2))
                .collect(),
            ConfigPotential::Sampled { values } => values,
        }
    }
}

impl TryFrom<ConfigSystem> for System {
    type Error = Error;

    fn try_from(value: ConfigSystem) -> Result<Self> {
        let ConfigSystem {
            grid,
            electrons,
            potential,
            interaction,
            stencil,
        } = value;

        let x = match grid {
            ConfigGrid::Points { x } => x,
            ConfigGrid::Uniform { points, spacing } => System::centered_grid(points, spacing),
        };
        let v_ext = potential.sample(&x);

        System::with_stencil(x, v_ext, interaction, &electrons, stencil)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn harmonic_system_file() {
        const SYSTEM: &str = r#"{
            "grid": { "points": 200, "spacing": 0.1 },
            "electrons": "ud",
            "potential": { "type": "harmonic", "omega": 1.0 },
            "interaction": { "type": "softened_coulomb", "strength": 1.0, "softening": 1.0 },
            "stencil": 13
        }"#;

        let config: ConfigSystem = serde_json::from_str(SYSTEM).unwrap();
        let system = System::try_from(config).unwrap();

        assert_eq!(system.points(), 200);
        assert_eq!(system.up_count(), 1);
        assert_eq!(system.down_count(), 1);
        assert_eq!(system.stencil(), Stencil::Thirteen);
        assert_relative_eq!(system.dx(), 0.1, epsilon = 1e-12);
        assert_relative_eq!(system.v_ext()[0], 0.5 * 9.95f64.powi(2), epsilon = 1e-9);
    }

    #[test]
    fn explicit_grid_and_defaults() {
        const SYSTEM: &str = r#"{
            "grid": { "x": [0.0, 0.5, 1.0, 1.5, 2.0] },
            "electrons": "u",
            "potential": { "type": "sampled", "values": [1.0, 2.0, 3.0, 4.0, 5.0] },
            "stencil": 3
        }"#;

        let config: ConfigSystem = serde_json::from_str(SYSTEM).unwrap();
        let system = System::try_from(config).unwrap();

        assert_eq!(system.interaction(), Interaction::default());
        assert_eq!(system.stencil(), Stencil::Three);
        assert_relative_eq!(system.v_ext()[3], 4.0);
    }

    #[test]
    fn loads_bundled_systems() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../systems");

        let pair = System::load(dir.join("harmonic_ud.json")).unwrap();
        assert_eq!((pair.up_count(), pair.down_count()), (1, 1));

        let triplet = System::load(dir.join("harmonic_uuu.json")).unwrap();
        assert_eq!(triplet.up_count(), 3);
        assert_relative_eq!(triplet.v_ext()[0], 0.125 * 14.95f64.powi(2), epsilon = 1e-9);
    }

    #[test]
    fn rejects_unknown_stencil() {
        const SYSTEM: &str = r#"{
            "grid": { "points": 20, "spacing": 0.1 },
            "electrons": "u",
            "potential": { "type": "zero" },
            "stencil": 4
        }"#;

        assert!(serde_json::from_str::<ConfigSystem>(SYSTEM).is_err());
    }
}
