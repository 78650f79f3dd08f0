pub mod hartree;
pub mod hartree_fock;
pub mod non_interacting;
pub(crate) mod utils;

use std::{fmt, str::FromStr};

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::{
    error::{check_matrix, check_vector, Error, Result},
    state::SingleBodyState,
    system::System,
};

/// The combined Hamiltonian and the two spin resolved Hamiltonians that are
/// actually diagonalized.
#[derive(Clone, Debug, PartialEq)]
pub struct Hamiltonians {
    /// Built from the total density matrix. Only used for reporting.
    pub combined: DMatrix<f64>,
    pub up: DMatrix<f64>,
    pub down: DMatrix<f64>,
}

/// The density independent part of every Hamiltonian. Depends only on the system,
/// so it is built once per solve and reused across SCF iterations.
#[derive(Clone, Debug, PartialEq)]
pub struct SingleParticleOperators {
    pub kinetic: DMatrix<f64>,
    pub external: DMatrix<f64>,
}

impl SingleParticleOperators {
    pub fn new(system: &System) -> Self {
        Self {
            kinetic: non_interacting::kinetic_energy_operator(system),
            external: non_interacting::external_potential_operator(system),
        }
    }

    /// `K + V`
    pub fn core_hamiltonian(&self) -> DMatrix<f64> {
        &self.kinetic + &self.external
    }
}

/// Builds the Hamiltonians of one method from the spin densities and density matrices
/// of the previous iteration: `(system, up_n, down_n, up_p, down_p, operators)`.
pub type HamiltonianFn = fn(
    &System,
    &DVector<f64>,
    &DVector<f64>,
    &DMatrix<f64>,
    &DMatrix<f64>,
    &SingleParticleOperators,
) -> Result<Hamiltonians>;

/// Checks the inputs of a Hamiltonian builder against the grid.
pub(crate) fn check_mean_field(
    system: &System,
    up_n: &DVector<f64>,
    down_n: &DVector<f64>,
    up_p: &DMatrix<f64>,
    down_p: &DMatrix<f64>,
    operators: &SingleParticleOperators,
) -> Result<()> {
    let points = system.points();
    check_vector("up density", up_n.len(), points)?;
    check_vector("down density", down_n.len(), points)?;
    check_matrix("up density matrix", up_p.shape(), points)?;
    check_matrix("down density matrix", down_p.shape(), points)?;
    check_matrix("kinetic operator", operators.kinetic.shape(), points)?;
    check_matrix("external potential operator", operators.external.shape(), points)
}

/// Parameters of a self-consistent solve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveConfig {
    /// Which configuration to solve for, 0 being the ground state
    pub k: usize,
    /// Force the spin up and spin down channels to be identical
    pub restricted: bool,
    /// The calculation is converged once the integrated absolute change of the
    /// density drops below this.
    pub tol: f64,
    /// The maximum number of iterations before the loop gives up
    pub max_iterations: usize,
    /// Fraction of the new density that is mixed into the old one every iteration
    pub mixing: f64,
}

impl SolveConfig {
    /// Rejects parameters the self-consistent loop cannot iterate with.
    pub fn validate(&self) -> Result<()> {
        if !(self.tol.is_finite() && self.tol > 0.0) {
            return Err(Error::InvalidSolveConfig(format!(
                "tol must be positive and finite, got {}",
                self.tol
            )));
        }
        if !(self.mixing > 0.0 && self.mixing <= 1.0) {
            return Err(Error::InvalidSolveConfig(format!(
                "mixing must lie in (0, 1], got {}",
                self.mixing
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::InvalidSolveConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            k: 0,
            restricted: false,
            tol: 1e-10,
            max_iterations: 500,
            mixing: 1.0,
        }
    }
}

/// The available mean-field methods.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    NonInteracting,
    Hartree,
    HartreeFock,
}

impl Method {
    pub const ALL: [Method; 3] = [Method::NonInteracting, Method::Hartree, Method::HartreeFock];

    pub fn name(self) -> &'static str {
        match self {
            Method::NonInteracting => "non_interacting",
            Method::Hartree => "hartree",
            Method::HartreeFock => "hartree_fock",
        }
    }

    /// The Hamiltonian builder this method feeds into the SCF loop.
    pub fn hamiltonian_fn(self) -> HamiltonianFn {
        match self {
            Method::NonInteracting => non_interacting::hamiltonian_with_cached_operators,
            Method::Hartree => hartree::hamiltonian_with_cached_operators,
            Method::HartreeFock => hartree_fock::hamiltonian_with_cached_operators,
        }
    }

    pub fn solve(self, system: &System, config: &SolveConfig) -> Result<SingleBodyState> {
        log::info!("solving {} electrons with {self}", system.count());
        non_interacting::solve_self_consistent(system, self.hamiltonian_fn(), config)
    }

    pub fn total_energy(self, system: &System, state: &SingleBodyState) -> Result<f64> {
        match self {
            Method::NonInteracting => Ok(non_interacting::total_energy(system, state)),
            Method::Hartree => hartree::total_energy(system, state),
            Method::HartreeFock => hartree_fock::total_energy(system, state),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.replace('-', "_").to_lowercase();
        Method::ALL
            .into_iter()
            .find(|method| method.name() == normalized)
            .ok_or_else(|| Error::UnknownMethod(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::system::Interaction;

    #[test]
    fn method_names_round_trip() {
        for method in Method::ALL {
            assert_eq!(method.name().parse::<Method>().unwrap(), method);
            assert_eq!(method.to_string(), method.name());
        }
        assert_eq!("hartree-fock".parse::<Method>().unwrap(), Method::HartreeFock);
        assert!(matches!("dft".parse::<Method>(), Err(Error::UnknownMethod(_))));
    }

    #[test]
    fn config_defaults() {
        let config: SolveConfig = serde_json::from_str(r#"{ "restricted": true }"#).unwrap();

        assert!(config.restricted);
        assert_eq!(config.k, 0);
        assert_eq!(config.max_iterations, 500);
        assert_relative_eq!(config.tol, 1e-10);
        assert_relative_eq!(config.mixing, 1.0);
    }

    #[test]
    fn rejects_unusable_solve_parameters() {
        let with = |change: fn(&mut SolveConfig)| {
            let mut config = SolveConfig::default();
            change(&mut config);
            config
        };

        assert!(SolveConfig::default().validate().is_ok());
        assert!(with(|c| c.mixing = 0.5).validate().is_ok());
        assert!(with(|c| c.max_iterations = 1).validate().is_ok());

        let invalid = [
            with(|c| c.tol = 0.0),
            with(|c| c.tol = -1e-8),
            with(|c| c.tol = f64::NAN),
            with(|c| c.tol = f64::INFINITY),
            with(|c| c.mixing = 0.0),
            with(|c| c.mixing = -1.0),
            with(|c| c.mixing = 1.5),
            with(|c| c.mixing = f64::NAN),
            with(|c| c.max_iterations = 0),
        ];
        for config in invalid {
            assert!(
                matches!(config.validate(), Err(Error::InvalidSolveConfig(_))),
                "{config:?} was accepted"
            );
        }
    }

    #[test]
    fn registry_dispatches_to_each_method() {
        let x = System::centered_grid(60, 0.2);
        let v_ext = x.iter().map(|x| 0.5 * x * x).collect();
        let system = System::new(x, v_ext, Interaction::default(), "ud").unwrap();
        let config = SolveConfig::default();

        let energies = Method::ALL.map(|method| {
            let state = method.solve(&system, &config).unwrap();
            assert!(state.converged, "{method} did not converge");
            method.total_energy(&system, &state).unwrap()
        });

        // repulsion raises the energy above the non-interacting one, exchange
        // removes the self-interaction that hartree keeps
        assert!(energies[1] > energies[0]);
        assert!(energies[2] > energies[0]);
        assert!(energies[2] < energies[1]);
    }
}
