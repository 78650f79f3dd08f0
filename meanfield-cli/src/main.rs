use std::{fs::File, path::PathBuf, time::Instant};

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use meanfield_core::{observables, Method, SingleBodyState, SolveConfig, System};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: MeanFieldCommand,
}

#[derive(Subcommand, Debug)]
enum MeanFieldCommand {
    /// Independent electrons in the external potential
    #[command(name = "non-interacting")]
    NonInteracting(SolveArgs),
    /// Electrons in the classical field of the total density
    #[command(name = "hartree")]
    Hartree(SolveArgs),
    /// Hartree plus same-spin exchange
    #[command(name = "hartree-fock")]
    HartreeFock(SolveArgs),
}

impl MeanFieldCommand {
    fn into_parts(self) -> (Method, SolveArgs) {
        match self {
            MeanFieldCommand::NonInteracting(args) => (Method::NonInteracting, args),
            MeanFieldCommand::Hartree(args) => (Method::Hartree, args),
            MeanFieldCommand::HartreeFock(args) => (Method::HartreeFock, args),
        }
    }
}

#[derive(ClapArgs, Debug)]
struct SolveArgs {
    /// A path to the system file to perform the calculation on
    #[arg(long, short)]
    system: PathBuf,
    /// Which configuration to solve for, 0 being the ground state
    #[arg(short, default_value_t = 0)]
    k: usize,
    /// Force spin up and spin down electrons into the same orbitals
    #[arg(long, short)]
    restricted: bool,
    /// if the integrated change of the density drops below this, the system is
    /// considered converged
    #[arg(long, default_value_t = 1e-10)]
    tol: f64,
    /// The maximum number of iterations the SCF loop should attempt before the
    /// system is considered to not converge
    #[arg(long, default_value_t = 500)]
    max_iterations: usize,
    /// Fraction of the new density mixed into the old one each iteration
    #[arg(long, default_value_t = 1.0)]
    mixing: f64,
    /// Write the solved state and its energies to this file as JSON
    #[arg(long, short)]
    output: Option<PathBuf>,
}

impl From<&SolveArgs> for SolveConfig {
    fn from(args: &SolveArgs) -> Self {
        SolveConfig {
            k: args.k,
            restricted: args.restricted,
            tol: args.tol,
            max_iterations: args.max_iterations,
            mixing: args.mixing,
        }
    }
}

/// What gets written with `--output`.
#[derive(Serialize)]
struct Report<'a> {
    method: Method,
    total_energy: f64,
    kinetic_energy: f64,
    external_energy: f64,
    state: &'a SingleBodyState,
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let args: Args = Args::parse();
    let (method, solve_args) = args.command.into_parts();

    let system = System::load(&solve_args.system)
        .with_context(|| format!("failed to load system {}", solve_args.system.display()))?;
    let config = SolveConfig::from(&solve_args);

    let start = Instant::now();
    let state = method.solve(&system, &config)?;
    let elapsed = start.elapsed();

    let SingleBodyState {
        ref up,
        ref down,
        iterations,
        converged,
        ..
    } = state;

    if converged {
        println!("{method} converged after {iterations} iterations and {elapsed:0.2?}");
    } else {
        println!(
            "{method} stopped after {iterations} iterations and {elapsed:0.2?} without converging"
        );
    }

    let total_energy = method.total_energy(&system, &state)?;
    let kinetic_energy = observables::kinetic_energy(&system, &state)?;
    let external_energy =
        observables::external_energy(&system, &observables::density(&system, &state)?)?;

    println!("total energy: {total_energy:3.8}");
    println!("kinetic energy: {kinetic_energy:3.8}");
    println!("external energy: {external_energy:3.8}");
    println!("occupied orbital energies up:   {:3.6?}", up.occupied_energies());
    println!("occupied orbital energies down: {:3.6?}", down.occupied_energies());

    if let Some(path) = solve_args.output {
        let report = Report {
            method,
            total_energy,
            kinetic_energy,
            external_energy,
            state: &state,
        };
        let file = File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, &report)?;
        log::info!("wrote state to {}", path.display());
    }

    Ok(())
}
