//! Hartree-Fock theory: the Hartree field of the total density plus the non-local
//! exchange field, which only acts between electrons of the same spin.

use nalgebra::{DMatrix, DVector};

use crate::{error::Result, observables, state::SingleBodyState, system::System};

use super::{
    check_mean_field, hartree, non_interacting, Hamiltonians, SingleParticleOperators,
    SolveConfig,
};

/// The exchange potential of the density matrix `p` as an operator on the grid.
///
/// Pass a single spin's density matrix for the exchange felt by that spin. The total
/// density matrix gives the exchange term of the combined Hamiltonian.
pub fn exchange_potential_operator(system: &System, p: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let v_x = observables::exchange_potential(system, p)?;
    Ok(v_x * system.dx())
}

/// Builds the combined Hamiltonian `K + V + Vh + Vx[p]` and the spin Hamiltonians
/// `K + V + Vh + Vx[p_up]` and `K + V + Vh + Vx[p_down]`.
///
/// Both spins see the Hartree field of the total density, but only their own exchange.
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

/// Same as [`hamiltonian`], reusing already built kinetic and external operators.
pub fn hamiltonian_with_cached_operators(
    system: &System,
    up_n: &DVector<f64>,
    down_n: &DVector<f64>,
    up_p: &DMatrix<f64>,
    down_p: &DMatrix<f64>,
    operators: &SingleParticleOperators,
) -> Result<Hamiltonians> {
    check_mean_field(system, up_n, down_n, up_p, down_p, operators)?;

    let SingleParticleOperators {
        kinetic: k,
        external: v,
    } = operators;
    let v_h = hartree::hartree_potential_operator(system, &(up_n + down_n))?;
    let v_x = exchange_potential_operator(system, &(up_p + down_p))?;
    let up_v_x = exchange_potential_operator(system, up_p)?;
    let down_v_x = exchange_potential_operator(system, down_p)?;

    let shared = k + v + v_h;
    Ok(Hamiltonians {
        combined: &shared + v_x,
        up: &shared + up_v_x,
        down: shared + down_v_x,
    })
}

/// Sum of the orbital energies, corrected for the Hartree and exchange energies they
/// count twice.
pub fn total_energy(system: &System, state: &SingleBodyState) -> Result<f64> {
    let mut energy = observables::single_particle_energy(state);

    let n = observables::density(system, state)?;
    let v_h = observables::hartree_potential(system, &n)?;
    energy -= observables::hartree_energy(system, &n, &v_h)?;

    let (_, up_p, down_p) = observables::spin_density_matrices(system, state)?;
    let up_v_x = observables::exchange_potential(system, &up_p)?;
    let down_v_x = observables::exchange_potential(system, &down_p)?;
    energy -= observables::exchange_energy(system, &up_p, &up_v_x)?;
    energy -= observables::exchange_energy(system, &down_p, &down_v_x)?;

    Ok(energy)
}

pub fn solve(system: &System, config: &SolveConfig) -> Result<SingleBodyState> {
    non_interacting::solve_self_consistent(system, hamiltonian_with_cached_operators, config)
}
