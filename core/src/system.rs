use std::{fs::File, path::Path};

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::{
    config::ConfigSystem,
    error::{check_vector, Error, Result},
};

/// Relative tolerance on the deviation of a grid point from a uniform grid.
const UNIFORM_GRID_TOLERANCE: f64 = 1e-8;

/// The spin of a single electron.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Spin {
    Up,
    Down,
}

impl TryFrom<char> for Spin {
    type Error = Error;

    fn try_from(value: char) -> Result<Self> {
        match value {
            'u' => Ok(Spin::Up),
            'd' => Ok(Spin::Down),
            other => Err(Error::InvalidElectrons(other)),
        }
    }
}

/// Number of points of the central finite-difference stencil used for the
/// second derivative.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum Stencil {
    Three,
    Five,
    Seven,
    Nine,
    Eleven,
    #[default]
    Thirteen,
}

impl Stencil {
    pub fn points(self) -> usize {
        match self {
            Stencil::Three => 3,
            Stencil::Five => 5,
            Stencil::Seven => 7,
            Stencil::Nine => 9,
            Stencil::Eleven => 11,
            Stencil::Thirteen => 13,
        }
    }

    /// Second derivative weights, from the leftmost to the rightmost neighbour,
    /// to be divided by `dx²`.
    pub fn weights(self) -> Vec<f64> {
        let (numerators, denominator): (&[f64], f64) = match self {
            Stencil::Three => (&[1.0, -2.0, 1.0], 1.0),
            Stencil::Five => (&[-1.0, 16.0, -30.0, 16.0, -1.0], 12.0),
            Stencil::Seven => (&[2.0, -27.0, 270.0, -490.0, 270.0, -27.0, 2.0], 180.0),
            Stencil::Nine => (
                &[-9.0, 128.0, -1008.0, 8064.0, -14350.0, 8064.0, -1008.0, 128.0, -9.0],
                5040.0,
            ),
            Stencil::Eleven => (
                &[
                    8.0, -125.0, 1000.0, -6000.0, 42000.0, -73766.0, 42000.0, -6000.0, 1000.0,
                    -125.0, 8.0,
                ],
                25200.0,
            ),
            Stencil::Thirteen => (
                &[
                    -50.0, 864.0, -7425.0, 44000.0, -222750.0, 1425600.0, -2480478.0, 1425600.0,
                    -222750.0, 44000.0, -7425.0, 864.0, -50.0,
                ],
                831600.0,
            ),
        };
        numerators.iter().map(|w| w / denominator).collect()
    }
}

impl TryFrom<usize> for Stencil {
    type Error = String;

    fn try_from(value: usize) -> std::result::Result<Self, Self::Error> {
        match value {
            3 => Ok(Stencil::Three),
            5 => Ok(Stencil::Five),
            7 => Ok(Stencil::Seven),
            9 => Ok(Stencil::Nine),
            11 => Ok(Stencil::Eleven),
            13 => Ok(Stencil::Thirteen),
            other => Err(format!("unsupported stencil size {other}, expected 3, 5, ..., 13")),
        }
    }
}

impl From<Stencil> for usize {
    fn from(value: Stencil) -> Self {
        value.points()
    }
}

/// Pairwise electron-electron interaction kernel.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Interaction {
    /// Electrons do not interact.
    None,
    /// `strength / (|x - x'| + softening)`, finite at zero separation.
    SoftenedCoulomb { strength: f64, softening: f64 },
}

impl Default for Interaction {
    fn default() -> Self {
        Interaction::SoftenedCoulomb {
            strength: 1.0,
            softening: 1.0,
        }
    }
}

impl Interaction {
    fn validate(&self) -> Result<()> {
        match *self {
            Interaction::None => Ok(()),
            Interaction::SoftenedCoulomb {
                strength,
                softening,
            } => {
                if !strength.is_finite() {
                    return Err(Error::InvalidInteraction(format!(
                        "strength {strength} is not finite"
                    )));
                }
                if !(softening.is_finite() && softening > 0.0) {
                    return Err(Error::InvalidInteraction(format!(
                        "softening must be positive, got {softening}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Sample the kernel on every pair of grid points.
    pub fn matrix(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let n = x.len();
        match *self {
            Interaction::None => DMatrix::zeros(n, n),
            Interaction::SoftenedCoulomb {
                strength,
                softening,
            } => DMatrix::from_fn(n, n, |i, j| strength / ((x[i] - x[j]).abs() + softening)),
        }
    }
}

/// Immutable description of a one-dimensional model system.
#[derive(Clone, Debug, PartialEq)]
pub struct System {
    x: DVector<f64>,
    dx: f64,
    v_ext: DVector<f64>,
    v_int: DMatrix<f64>,
    interaction: Interaction,
    electrons: Vec<Spin>,
    stencil: Stencil,
}

impl System {
    /// Create a new system from grid points, the external potential sampled on them,
    /// an interaction kernel and an electron configuration such as `"ud"`.
    pub fn new(
        x: Vec<f64>,
        v_ext: Vec<f64>,
        interaction: Interaction,
        electrons: &str,
    ) -> Result<Self> {
        Self::with_stencil(x, v_ext, interaction, electrons, Stencil::default())
    }

    pub fn with_stencil(
        x: Vec<f64>,
        v_ext: Vec<f64>,
        interaction: Interaction,
        electrons: &str,
        stencil: Stencil,
    ) -> Result<Self> {
        let points = x.len();
        let required = stencil.points().max(3);
        if points < required {
            return Err(Error::TooFewPoints {
                required,
                found: points,
            });
        }
        check_vector("external potential", v_ext.len(), points)?;
        if x.iter().any(|p| !p.is_finite()) {
            return Err(Error::NonFiniteInput("grid"));
        }
        if v_ext.iter().any(|v| !v.is_finite()) {
            return Err(Error::NonFiniteInput("external potential"));
        }

        let dx = x[1] - x[0];
        if dx <= 0.0 {
            return Err(Error::NonUniformGrid { index: 1, dx });
        }
        for (index, &point) in x.iter().enumerate() {
            let expected = x[0] + index as f64 * dx;
            if (point - expected).abs() > UNIFORM_GRID_TOLERANCE * dx.max(expected.abs()) {
                return Err(Error::NonUniformGrid { index, dx });
            }
        }

        interaction.validate()?;

        let electrons = electrons
            .chars()
            .map(Spin::try_from)
            .collect::<Result<Vec<_>>>()?;

        let x = DVector::from_vec(x);
        let v_int = interaction.matrix(&x);
        let system = Self {
            v_ext: DVector::from_vec(v_ext),
            v_int,
            x,
            dx,
            interaction,
            electrons,
            stencil,
        };

        for (spin, count) in [("up", system.up_count()), ("down", system.down_count())] {
            if count > points {
                return Err(Error::TooManyElectrons {
                    spin,
                    count,
                    points,
                });
            }
        }

        log::debug!(
            "system with {points} points, dx = {dx}, {} up and {} down electrons",
            system.up_count(),
            system.down_count()
        );
        Ok(system)
    }

    /// A grid of `points` points spaced by `dx`, centered on the origin.
    pub fn centered_grid(points: usize, dx: f64) -> Vec<f64> {
        let center = (points as f64 - 1.0) / 2.0;
        (0..points).map(|i| (i as f64 - center) * dx).collect()
    }

    /// Load a system from a JSON system file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: ConfigSystem = serde_json::from_reader(File::open(path)?)?;
        config.try_into()
    }

    pub fn x(&self) -> &DVector<f64> {
        &self.x
    }

    pub fn dx(&self) -> f64 {
        self.dx
    }

    /// Number of grid points.
    pub fn points(&self) -> usize {
        self.x.len()
    }

    pub fn v_ext(&self) -> &DVector<f64> {
        &self.v_ext
    }

    /// The interaction kernel sampled on the grid.
    pub fn v_int(&self) -> &DMatrix<f64> {
        &self.v_int
    }

    pub fn interaction(&self) -> Interaction {
        self.interaction
    }

    pub fn electrons(&self) -> &[Spin] {
        &self.electrons
    }

    pub fn count(&self) -> usize {
        self.electrons.len()
    }

    pub fn up_count(&self) -> usize {
        self.spin_count(Spin::Up)
    }

    pub fn down_count(&self) -> usize {
        self.spin_count(Spin::Down)
    }

    pub fn spin_count(&self, spin: Spin) -> usize {
        self.electrons.iter().filter(|&&s| s == spin).count()
    }

    pub fn stencil(&self) -> Stencil {
        self.stencil
    }
}
