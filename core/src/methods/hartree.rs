//! Hartree theory: every electron moves in the classical electrostatic field of the
//! total density, its own contribution included.

use nalgebra::{DMatrix, DVector};

use crate::{error::Result, observables, state::SingleBodyState, system::System};

use super::{check_mean_field, non_interacting, Hamiltonians, SingleParticleOperators, SolveConfig};

/// The Hartree potential of the density `n` as a diagonal operator.
pub fn hartree_potential_operator(system: &System, n: &DVector<f64>) -> Result<DMatrix<f64>> {
    let v_h = observables::hartree_potential(system, n)?;
    Ok(DMatrix::from_diagonal(&v_h))
}

/// `K + V + Vh` for every spin channel, with `Vh` built from the total density.
pub fn hamiltonian(
    system: &System,
    up_n: &DVector<f64>,
    down_n: &DVector<f64>,
    up_p: &DMatrix<f64>,
    down_p: &DMatrix<f64>,
) -> Result<Hamiltonians> {
    let operators = SingleParticleOperators::new(system);
    hamiltonian_with_cached_operators(system, up_n, down_n, up_p, down_p, &operators)
}

pub fn hamiltonian_with_cached_operators(
    system: &System,
    up_n: &DVector<f64>,
    down_n: &DVector<f64>,
    up_p: &DMatrix<f64>,
    down_p: &DMatrix<f64>,
    operators: &SingleParticleOperators,
) -> Result<Hamiltonians> {
    check_mean_field(system, up_n, down_n, up_p, down_p, operators)?;

    let v_h = hartree_potential_operator(system, &(up_n + down_n))?;
    let h = operators.core_hamiltonian() + v_h;
    Ok(Hamiltonians {
        combined: h.clone(),
        up: h.clone(),
        down: h,
    })
}

/// The orbital energies count the Hartree energy twice, so it is subtracted once.
pub fn total_energy(system: &System, state: &SingleBodyState) -> Result<f64> {
    let mut energy = observables::single_particle_energy(state);
    let n = observables::density(system, state)?;
    let v_h = observables::hartree_potential(system, &n)?;
    energy -= observables::hartree_energy(system, &n, &v_h)?;
    Ok(energy)
}

pub fn solve(system: &System, config: &SolveConfig) -> Result<SingleBodyState> {
    non_interacting::solve_self_consistent(system, hamiltonian_with_cached_operators, config)
}
