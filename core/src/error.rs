use thiserror::Error;

/// Everything that can go wrong while setting up or solving a system.
#[derive(Debug, Error)]
pub enum Error {
    /// An array handed to an operator builder or observable does not match the grid.
    #[error("{quantity} has dimension {found}, but the grid requires {expected}")]
    DimensionMismatch {
        quantity: &'static str,
        expected: String,
        found: String,
    },
    #[error("grid points are not uniformly spaced (point {index} deviates from spacing {dx})")]
    NonUniformGrid { index: usize, dx: f64 },
    #[error("a grid needs at least {required} points, got {found}")]
    TooFewPoints { required: usize, found: usize },
    #[error("invalid electron label {0:?}, expected only 'u' or 'd'")]
    InvalidElectrons(char),
    #[error("{count} {spin} electrons do not fit on a grid of {points} points")]
    TooManyElectrons {
        spin: &'static str,
        count: usize,
        points: usize,
    },
    #[error("invalid interaction: {0}")]
    InvalidInteraction(String),
    #[error("{0} contains non-finite values")]
    NonFiniteInput(&'static str),
    #[error("excitation {k} requested, but only {available} configurations exist")]
    ExcitationOutOfRange { k: usize, available: usize },
    #[error("invalid solve parameters: {0}")]
    InvalidSolveConfig(String),
    #[error("unknown method {0:?}, expected one of non_interacting, hartree, hartree_fock")]
    UnknownMethod(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Checks that a vector quantity has one entry per grid point.
pub(crate) fn check_vector(quantity: &'static str, found: usize, points: usize) -> Result<()> {
    if found != points {
        return Err(Error::DimensionMismatch {
            quantity,
            expected: points.to_string(),
            found: found.to_string(),
        });
    }
    Ok(())
}

/// Checks that a matrix quantity is `points × points`.
pub(crate) fn check_matrix(
    quantity: &'static str,
    shape: (usize, usize),
    points: usize,
) -> Result<()> {
    if shape != (points, points) {
        return Err(Error::DimensionMismatch {
            quantity,
            expected: format!("{points}x{points}"),
            found: format!("{}x{}", shape.0, shape.1),
        });
    }
    Ok(())
}
