use nalgebra::{DMatrix, DVector, SymmetricEigen};

/// Symmetric `n × n` matrix whose only non-zero entries lie within `half_width` of the
/// diagonal. `band(offset)` is the value on the `offset`-th super- and sub-diagonal.
pub(crate) fn symmetric_banded(
    n: usize,
    half_width: usize,
    band: impl Fn(usize) -> f64,
) -> DMatrix<f64> {
    DMatrix::from_fn(n, n, |i, j| {
        let offset = i.abs_diff(j);
        if offset <= half_width {
            band(offset)
        } else {
            0.0
        }
    })
}

/// Eigenvalues in ascending order, and the matching eigenvectors as columns.
pub(crate) fn sorted_eigh(matrix: DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>) {
    let SymmetricEigen {
        eigenvalues,
        eigenvectors,
    } = SymmetricEigen::new(matrix);

    let mut order = (0..eigenvalues.len()).collect::<Vec<_>>();
    order.sort_by(|&a, &b| eigenvalues[a].total_cmp(&eigenvalues[b]));

    let values = DVector::from_iterator(order.len(), order.iter().map(|&i| eigenvalues[i]));
    (values, eigenvectors.select_columns(&order))
}
