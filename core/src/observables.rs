//! Observables of single-body states: densities, density matrices, mean-field
//! potentials and the energies built from them.
//!
//! Orbitals are normalized on the grid (`sum |phi|^2 dx = 1`), so densities are
//! plain occupation-weighted sums of `|phi|^2` and integrals over the grid pick up
//! a factor of `dx` per integrated coordinate.

use nalgebra::{DMatrix, DVector};

use crate::{
    error::{check_matrix, check_vector, Result},
    methods::non_interacting,
    state::{SingleBodyState, SpinChannel},
    system::System,
};

fn check_channel(system: &System, channel: &SpinChannel) -> Result<()> {
    let points = system.points();
    check_matrix("orbitals", channel.orbitals.shape(), points)?;
    check_vector("orbital energies", channel.energies.len(), points)?;
    check_vector("occupations", channel.occupations.len(), points)
}

/// Density of a single spin channel.
pub fn channel_density(system: &System, channel: &SpinChannel) -> Result<DVector<f64>> {
    check_channel(system, channel)?;
    Ok(channel.orbitals.component_mul(&channel.orbitals) * &channel.occupations)
}

/// Total charge density of a state.
pub fn density(system: &System, state: &SingleBodyState) -> Result<DVector<f64>> {
    let (n, _, _) = spin_densities(system, state)?;
    Ok(n)
}

/// Total, spin up and spin down densities of a state.
pub fn spin_densities(
    system: &System,
    state: &SingleBodyState,
) -> Result<(DVector<f64>, DVector<f64>, DVector<f64>)> {
    let up_n = channel_density(system, &state.up)?;
    let down_n = channel_density(system, &state.down)?;
    Ok((&up_n + &down_n, up_n, down_n))
}

/// One-body reduced density matrix of a single spin channel,
/// `p(x, x') = sum_k occ_k phi_k(x) phi_k(x')`.
pub fn channel_density_matrix(system: &System, channel: &SpinChannel) -> Result<DMatrix<f64>> {
    check_channel(system, channel)?;

    let points = system.points();
    let mut p = DMatrix::zeros(points, points);
    for k in channel.occupied() {
        let orbital = channel.orbitals.column(k);
        p.ger(channel.occupations[k], &orbital, &orbital, 1.0);
    }
    Ok(p)
}

/// Total density matrix of a state.
pub fn density_matrix(system: &System, state: &SingleBodyState) -> Result<DMatrix<f64>> {
    let (p, _, _) = spin_density_matrices(system, state)?;
    Ok(p)
}

/// Total, spin up and spin down density matrices of a state.
pub fn spin_density_matrices(
    system: &System,
    state: &SingleBodyState,
) -> Result<(DMatrix<f64>, DMatrix<f64>, DMatrix<f64>)> {
    let up_p = channel_density_matrix(system, &state.up)?;
    let down_p = channel_density_matrix(system, &state.down)?;
    Ok((&up_p + &down_p, up_p, down_p))
}

/// Classical electrostatic potential generated by the density `n`.
pub fn hartree_potential(system: &System, n: &DVector<f64>) -> Result<DVector<f64>> {
    check_vector("density", n.len(), system.points())?;
    Ok(system.v_int() * n * system.dx())
}

/// Non-local exchange potential `-p(x, x') v(x, x')` of the density matrix `p`.
pub fn exchange_potential(system: &System, p: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    check_matrix("density matrix", p.shape(), system.points())?;
    Ok(-p.component_mul(system.v_int()))
}

pub fn hartree_energy(system: &System, n: &DVector<f64>, v_h: &DVector<f64>) -> Result<f64> {
    let points = system.points();
    check_vector("density", n.len(), points)?;
    check_vector("hartree potential", v_h.len(), points)?;
    Ok(0.5 * n.dot(v_h) * system.dx())
}

pub fn exchange_energy(system: &System, p: &DMatrix<f64>, v_x: &DMatrix<f64>) -> Result<f64> {
    let points = system.points();
    check_matrix("density matrix", p.shape(), points)?;
    check_matrix("exchange potential", v_x.shape(), points)?;
    Ok(0.5 * p.dot(v_x) * system.dx() * system.dx())
}

pub fn external_energy(system: &System, n: &DVector<f64>) -> Result<f64> {
    check_vector("density", n.len(), system.points())?;
    Ok(n.dot(system.v_ext()) * system.dx())
}

/// Occupation-weighted sum of the orbital energies of both spin channels.
pub fn single_particle_energy(state: &SingleBodyState) -> f64 {
    state.up.energies.dot(&state.up.occupations)
        + state.down.energies.dot(&state.down.occupations)
}

/// Kinetic energy of the occupied orbitals of both spin channels.
pub fn kinetic_energy(system: &System, state: &SingleBodyState) -> Result<f64> {
    let kinetic = non_interacting::kinetic_energy_operator(system);

    let mut energy = 0.0;
    for channel in [&state.up, &state.down] {
        check_channel(system, channel)?;
        for k in channel.occupied() {
            let orbital = channel.orbitals.column(k);
            energy += channel.occupations[k] * orbital.dot(&(&kinetic * orbital)) * system.dx();
        }
    }
    Ok(energy)
}
