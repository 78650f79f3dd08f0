//! Non-interacting electrons, and the machinery every mean-field method shares:
//! the single-particle operators, orbital filling and the self-consistent loop.

use itertools::Itertools;
use nalgebra::{DMatrix, DVector};

use crate::{
    error::{check_vector, Error, Result},
    observables,
    state::{SingleBodyState, SpinChannel},
    system::System,
};

use super::{
    check_mean_field, utils, HamiltonianFn, Hamiltonians, SingleParticleOperators, SolveConfig,
};

/// `-1/2 d²/dx²` discretized with the system's central finite-difference stencil.
/// Bands that would reach past the ends of the grid are dropped.
pub fn kinetic_energy_operator(system: &System) -> DMatrix<f64> {
    let weights = system.stencil().weights();
    let half_width = weights.len() / 2;
    let scale = -0.5 / system.dx().powi(2);

    let kinetic = utils::symmetric_banded(system.points(), half_width, |offset| {
        scale * weights[half_width + offset]
    });
    log::debug!(
        "kinetic operator with a {}-point stencil on {} points",
        weights.len(),
        system.points()
    );
    kinetic
}

/// The external potential as a diagonal operator.
pub fn external_potential_operator(system: &System) -> DMatrix<f64> {
    DMatrix::from_diagonal(system.v_ext())
}

/// `K + V` for every spin channel. The densities only have to match the grid.
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

    let h = operators.core_hamiltonian();
    Ok(Hamiltonians {
        combined: h.clone(),
        up: h.clone(),
        down: h,
    })
}

/// Sum of the occupied orbital energies.
pub fn total_energy(_system: &System, state: &SingleBodyState) -> f64 {
    observables::single_particle_energy(state)
}

pub fn solve(system: &System, config: &SolveConfig) -> Result<SingleBodyState> {
    solve_self_consistent(system, hamiltonian_with_cached_operators, config)
}

/// Diagonalize a Hamiltonian and normalize its orbitals on the grid.
/// Returns the orbital energies in ascending order and the orbitals as columns.
pub fn diagonalise(hamiltonian: DMatrix<f64>, dx: f64) -> (DVector<f64>, DMatrix<f64>) {
    let (energies, orbitals) = utils::sorted_eigh(hamiltonian);
    (energies, orbitals / dx.sqrt())
}

#[cfg(feature = "rayon")]
fn diagonalise_spins(
    up: DMatrix<f64>,
    down: DMatrix<f64>,
    dx: f64,
) -> ((DVector<f64>, DMatrix<f64>), (DVector<f64>, DMatrix<f64>)) {
    rayon::join(|| diagonalise(up, dx), || diagonalise(down, dx))
}

#[cfg(not(feature = "rayon"))]
fn diagonalise_spins(
    up: DMatrix<f64>,
    down: DMatrix<f64>,
    dx: f64,
) -> ((DVector<f64>, DMatrix<f64>), (DVector<f64>, DMatrix<f64>)) {
    (diagonalise(up, dx), diagonalise(down, dx))
}

/// Occupy the orbitals of the `k`-th lowest configuration (`k = 0` is the ground state).
///
/// Configurations are ranked by the sum of their orbital energies. Only the lowest
/// `L = max(up_count, down_count) + k` levels of each channel can take part in the
/// `k`-th configuration, so nothing above them is enumerated.
///
/// All `C(L, up_count) * C(L, down_count)` configurations are built and sorted, which
/// grows combinatorially: ten electrons of each spin with `k = 10` already give about
/// `3.4e10` of them.
pub fn fill_occupations(
    system: &System,
    up_energies: &DVector<f64>,
    down_energies: &DVector<f64>,
    k: usize,
) -> Result<(DVector<f64>, DVector<f64>)> {
    let points = system.points();
    check_vector("up orbital energies", up_energies.len(), points)?;
    check_vector("down orbital energies", down_energies.len(), points)?;

    let (up_count, down_count) = (system.up_count(), system.down_count());
    let levels = (up_count.max(down_count) + k).min(points);

    let up_configurations = (0..levels).combinations(up_count).collect::<Vec<_>>();
    let down_configurations = (0..levels).combinations(down_count).collect::<Vec<_>>();

    let mut configurations = itertools::iproduct!(&up_configurations, &down_configurations)
        .map(|(up, down)| {
            let energy = up.iter().map(|&i| up_energies[i]).sum::<f64>()
                + down.iter().map(|&i| down_energies[i]).sum::<f64>();
            log::trace!("configuration up {up:?} down {down:?}: {energy}");
            (energy, up, down)
        })
        .collect::<Vec<_>>();

    // stable, so degenerate configurations keep the lowest levels first
    configurations.sort_by(|(a, ..), (b, ..)| a.total_cmp(b));

    let available = configurations.len();
    let &(energy, up, down) = configurations
        .get(k)
        .ok_or(Error::ExcitationOutOfRange { k, available })?;
    log::debug!("occupying up {up:?} and down {down:?}, orbital energy sum {energy:1.8}");

    let occupations = |indices: &[usize]| {
        let mut occupations = DVector::zeros(points);
        for &level in indices {
            occupations[level] = 1.0;
        }
        occupations
    };
    Ok((occupations(up.as_slice()), occupations(down.as_slice())))
}

/// The self-consistent loop shared by all methods.
///
/// Starting from empty densities, so the first Hamiltonian is the non-interacting
/// one, every iteration builds the Hamiltonians with `hamiltonian_fn`, diagonalizes
/// them, fills the `k`-th configuration and recomputes the spin densities and
/// density matrices. The loop stops once the integrated change of the total
/// density drops below `config.tol`. After `config.max_iterations` the last state
/// is returned with `converged` unset.
///
/// Fails with [`Error::InvalidSolveConfig`] before iterating when `config` does not
/// pass [`SolveConfig::validate`].
pub fn solve_self_consistent(
    system: &System,
    hamiltonian_fn: HamiltonianFn,
    config: &SolveConfig,
) -> Result<SingleBodyState> {
    config.validate()?;

    let operators = SingleParticleOperators::new(system);
    let points = system.points();
    let dx = system.dx();
    let alpha = config.mixing;

    let mut up_n = DVector::zeros(points);
    let mut down_n = DVector::zeros(points);
    let mut up_p = DMatrix::zeros(points, points);
    let mut down_p = DMatrix::zeros(points, points);

    let mut iteration = 0;
    loop {
        iteration += 1;

        let hamiltonians = hamiltonian_fn(system, &up_n, &down_n, &up_p, &down_p, &operators)?;
        let ((up_energies, up_orbitals), (down_energies, down_orbitals)) = if config.restricted {
            let up = diagonalise(hamiltonians.up, dx);
            (up.clone(), up)
        } else {
            diagonalise_spins(hamiltonians.up, hamiltonians.down, dx)
        };

        let (up_occupations, down_occupations) =
            fill_occupations(system, &up_energies, &down_energies, config.k)?;

        let mut state = SingleBodyState {
            up: SpinChannel::new(up_energies, up_orbitals, up_occupations),
            down: SpinChannel::new(down_energies, down_orbitals, down_occupations),
            iterations: iteration,
            residual: f64::INFINITY,
            converged: false,
        };

        let (_, mut new_up_n, mut new_down_n) = observables::spin_densities(system, &state)?;
        let (_, mut new_up_p, mut new_down_p) =
            observables::spin_density_matrices(system, &state)?;
        if config.restricted {
            new_up_n = (new_up_n + new_down_n) * 0.5;
            new_down_n = new_up_n.clone();
            new_up_p = (new_up_p + new_down_p) * 0.5;
            new_down_p = new_up_p.clone();
        }

        let residual = (&new_up_n + &new_down_n - &up_n - &down_n)
            .iter()
            .map(|change| change.abs())
            .sum::<f64>()
            * dx;
        state.residual = residual;

        up_n = up_n * (1.0 - alpha) + new_up_n * alpha;
        down_n = down_n * (1.0 - alpha) + new_down_n * alpha;
        up_p = up_p * (1.0 - alpha) + new_up_p * alpha;
        down_p = down_p * (1.0 - alpha) + new_down_p * alpha;

        log::info!(
            "iteration {iteration:<4} - orbital energy sum {:1.8}. density residual {residual:1.4e}",
            observables::single_particle_energy(&state)
        );

        if residual < config.tol {
            state.converged = true;
            log::info!("converged after {iteration} iterations");
            return Ok(state);
        }

        if iteration >= config.max_iterations {
            log::warn!(
                "not converged after {iteration} iterations, density residual {residual:1.4e}"
            );
            return Ok(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    use super::*;
    use crate::system::{Interaction, Stencil};

    fn harmonic(points: usize, dx: f64, electrons: &str) -> System {
        let x = System::centered_grid(points, dx);
        let v_ext = x.iter().map(|x| 0.5 * x * x).collect();
        System::new(x, v_ext, Interaction::None, electrons).unwrap()
    }

    #[test]
    fn kinetic_operator_is_banded_and_symmetric() {
        let system = harmonic(40, 0.1, "u");
        let kinetic = kinetic_energy_operator(&system);

        assert_eq!(kinetic, kinetic.transpose());
        assert_eq!(kinetic[(0, 7)], 0.0);
        assert!(kinetic[(0, 6)] != 0.0);
        assert_relative_eq!(kinetic[(5, 5)], 0.5 * 2480478.0 / 831600.0 / 0.01, epsilon = 1e-9);

        // constants have no curvature away from the walls
        let ones = DVector::from_element(40, 1.0);
        let curvature = &kinetic * ones;
        for i in 6..34 {
            assert_abs_diff_eq!(curvature[i], 0.0, epsilon = 1e-7);
        }
    }

    #[test]
    fn three_point_box_spectrum_is_exact() {
        let points = 50;
        let dx = 0.2;
        let x = System::centered_grid(points, dx);
        let system = System::with_stencil(
            x,
            vec![0.0; points],
            Interaction::None,
            "u",
            Stencil::Three,
        )
        .unwrap();

        let (energies, _) = diagonalise(kinetic_energy_operator(&system), dx);

        for (k, energy) in energies.iter().take(5).enumerate() {
            let theta = (k + 1) as f64 * std::f64::consts::PI / (points + 1) as f64;
            assert_relative_eq!(*energy, (1.0 - theta.cos()) / dx.powi(2), epsilon = 1e-10);
        }
    }

    #[test]
    fn harmonic_oscillator_levels() {
        let system = harmonic(200, 0.1, "uu");
        let state = solve(&system, &SolveConfig::default()).unwrap();

        assert!(state.converged);
        assert_eq!(state.iterations, 2);
        assert_eq!(state.up.occupied().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(state.down.occupied().count(), 0);
        assert_relative_eq!(state.up.energies[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(state.up.energies[1], 1.5, epsilon = 1e-6);
        assert_relative_eq!(total_energy(&system, &state), 2.0, epsilon = 1e-6);

        let n = observables::density(&system, &state).unwrap();
        assert_relative_eq!(n.sum() * system.dx(), 2.0, epsilon = 1e-10);
    }

    #[test]
    fn fills_excited_configurations_in_energy_order() {
        let system = harmonic(20, 0.5, "ud");
        let energies = DVector::from_fn(20, |i, _| i as f64);

        let (up, down) = fill_occupations(&system, &energies, &energies, 0).unwrap();
        assert_eq!((up[0], down[0]), (1.0, 1.0));
        assert_relative_eq!(up.sum() + down.sum(), 2.0);

        // (up 0, down 1) and (up 1, down 0) are degenerate, the first one wins
        let (up, down) = fill_occupations(&system, &energies, &energies, 1).unwrap();
        assert_eq!((up[0], down[1]), (1.0, 1.0));

        let (up, down) = fill_occupations(&system, &energies, &energies, 3).unwrap();
        let level_sum = up.dot(&energies) + down.dot(&energies);
        assert_relative_eq!(level_sum, 2.0);
    }

    #[test]
    fn rejects_unavailable_excitations() {
        let x = System::centered_grid(3, 1.0);
        let system =
            System::with_stencil(x, vec![0.0; 3], Interaction::None, "ud", Stencil::Three)
                .unwrap();
        let energies = DVector::from_vec(vec![0.0, 1.0, 2.0]);

        assert!(fill_occupations(&system, &energies, &energies, 8).is_ok());
        assert!(matches!(
            fill_occupations(&system, &energies, &energies, 9),
            Err(Error::ExcitationOutOfRange { k: 9, available: 9 })
        ));
    }

    #[test]
    fn excited_state_solve() {
        let system = harmonic(200, 0.1, "u");
        let config = SolveConfig {
            k: 2,
            ..SolveConfig::default()
        };
        let state = solve(&system, &config).unwrap();

        assert_eq!(state.up.occupied().collect::<Vec<_>>(), vec![2]);
        assert_relative_eq!(total_energy(&system, &state), 2.5, epsilon = 1e-6);
    }

    #[test]
    fn empty_system_converges_immediately() {
        let system = harmonic(30, 0.2, "");
        let state = solve(&system, &SolveConfig::default()).unwrap();

        assert!(state.converged);
        assert_eq!(state.iterations, 1);
        assert_eq!(total_energy(&system, &state), 0.0);
    }

    #[test]
    fn invalid_parameters_fail_before_iterating() {
        let system = harmonic(40, 0.2, "ud");

        for mixing in [0.0, -1.0, f64::NAN] {
            let config = SolveConfig {
                mixing,
                max_iterations: 20,
                ..SolveConfig::default()
            };
            assert!(matches!(
                solve(&system, &config),
                Err(Error::InvalidSolveConfig(_))
            ));
        }

        let config = SolveConfig {
            tol: f64::NAN,
            ..SolveConfig::default()
        };
        assert!(matches!(
            solve(&system, &config),
            Err(Error::InvalidSolveConfig(_))
        ));
    }

    #[test]
    fn iteration_cap_returns_the_last_state() {
        let x = System::centered_grid(60, 0.2);
        let v_ext = x.iter().map(|x| 0.5 * x * x).collect();
        let system = System::new(x, v_ext, Interaction::default(), "uu").unwrap();
        let config = SolveConfig {
            max_iterations: 2,
            ..SolveConfig::default()
        };

        let state = solve_self_consistent(
            &system,
            crate::methods::hartree::hamiltonian_with_cached_operators,
            &config,
        )
        .unwrap();

        assert!(!state.converged);
        assert_eq!(state.iterations, 2);
        assert!(state.residual.is_finite());
        assert!(state.residual > config.tol);
        assert_eq!(state.up.occupied().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn rejects_mismatched_densities() {
        let system = harmonic(30, 0.2, "u");
        let n = DVector::zeros(30);
        let p = DMatrix::zeros(30, 30);

        assert!(matches!(
            hamiltonian(&system, &DVector::zeros(29), &n, &p, &p),
            Err(Error::DimensionMismatch { quantity: "up density", .. })
        ));
        assert!(matches!(
            hamiltonian(&system, &n, &n, &p, &DMatrix::zeros(30, 31)),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(hamiltonian(&system, &n, &n, &p, &p).is_ok());
    }
}
