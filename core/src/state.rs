use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::system::Spin;

/// The orbitals of one spin channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpinChannel {
    /// Orbital energies in ascending order.
    pub energies: DVector<f64>,
    /// Orbitals as columns, normalized such that `sum |phi|^2 dx = 1`.
    pub orbitals: DMatrix<f64>,
    /// Occupation of each orbital, 0 or 1.
    pub occupations: DVector<f64>,
}

impl SpinChannel {
    pub fn new(energies: DVector<f64>, orbitals: DMatrix<f64>, occupations: DVector<f64>) -> Self {
        Self {
            energies,
            orbitals,
            occupations,
        }
    }

    /// Indices of the occupied orbitals.
    pub fn occupied(&self) -> impl Iterator<Item = usize> + '_ {
        self.occupations
            .iter()
            .enumerate()
            .filter(|(_, &occupation)| occupation > 0.0)
            .map(|(index, _)| index)
    }

    /// Energies of the occupied orbitals, in ascending order.
    pub fn occupied_energies(&self) -> Vec<f64> {
        self.occupied().map(|index| self.energies[index]).collect()
    }
}

/// A solved single-body state: orbitals, orbital energies and occupations per spin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SingleBodyState {
    pub up: SpinChannel,
    pub down: SpinChannel,
    /// How many SCF iterations were run
    pub iterations: usize,
    /// The density residual of the final iteration
    pub residual: f64,
    pub converged: bool,
}

impl SingleBodyState {
    pub fn channel(&self, spin: Spin) -> &SpinChannel {
        match spin {
            Spin::Up => &self.up,
            Spin::Down => &self.down,
        }
    }
}
