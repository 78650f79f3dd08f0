//! Mean-field solvers for one-dimensional model systems of interacting electrons.
//!
//! A [`System`] describes a uniform grid, the external potential sampled on it, the
//! electron-electron interaction and the spin of every electron. Each [`Method`]
//! builds its Hamiltonians from the spin densities and density matrices, and the
//! shared self-consistent loop in [`methods::non_interacting`] iterates them to a
//! converged [`SingleBodyState`].

pub mod config;
pub mod error;
pub mod methods;
pub mod observables;
pub mod state;
pub mod system;

pub use config::ConfigSystem;
pub use error::{Error, Result};
pub use methods::{Hamiltonians, Method, SingleParticleOperators, SolveConfig};
pub use state::{SingleBodyState, SpinChannel};
pub use system::{Interaction, Spin, Stencil, System};
