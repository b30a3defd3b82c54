//! Dense LU decomposition with partial pivoting

use dkrige_core::{Error, Result};

/// Pivots smaller than this fraction of the largest matrix entry mark the
/// system as singular.
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// `PA = LU` factorization of a square row-major matrix, stored in place
/// (unit lower triangle below the diagonal, upper triangle on and above).
#[derive(Debug, Clone)]
pub struct LuDecomposition {
    n: usize,
    lu: Vec<f64>,
    pivots: Vec<usize>,
}

impl LuDecomposition {
    /// Factor an `n × n` row-major matrix.
    ///
    /// Fails with [`Error::SingularSystem`] when no usable pivot remains in
    /// some column.
    pub fn factor(n: usize, mut mat: Vec<f64>) -> Result<Self> {
        if mat.len() != n * n {
            return Err(Error::SizeMismatch {
                er: n,
                ec: n,
                ar: mat.len(),
                ac: 1,
            });
        }

        let scale = mat.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        if scale == 0.0 {
            return Err(Error::SingularSystem { cell: None });
        }
        let tolerance = SINGULAR_TOLERANCE * scale;
        let mut pivots: Vec<usize> = (0..n).collect();

        for col in 0..n {
            let mut max_val = mat[col * n + col].abs();
            let mut max_row = col;
            for row in (col + 1)..n {
                let val = mat[row * n + col].abs();
                if val > max_val {
                    max_val = val;
                    max_row = row;
                }
            }

            if max_val < tolerance {
                return Err(Error::SingularSystem { cell: None });
            }

            if max_row != col {
                for j in 0..n {
                    mat.swap(col * n + j, max_row * n + j);
                }
                pivots.swap(col, max_row);
            }

            let pivot = mat[col * n + col];
            for row in (col + 1)..n {
                let factor = mat[row * n + col] / pivot;
                mat[row * n + col] = factor;
                for j in (col + 1)..n {
                    mat[row * n + j] -= factor * mat[col * n + j];
                }
            }
        }

        Ok(Self { n, lu: mat, pivots })
    }

    /// Solve `Ax = b` for the factored `A`
    pub fn solve(&self, rhs: &[f64]) -> Vec<f64> {
        let n = self.n;
        let mut x: Vec<f64> = self.pivots.iter().map(|&p| rhs[p]).collect();

        // Forward substitution (unit lower)
        for row in 0..n {
            let mut sum = x[row];
            for j in 0..row {
                sum -= self.lu[row * n + j] * x[j];
            }
            x[row] = sum;
        }

        // Back substitution
        for row in (0..n).rev() {
            let mut sum = x[row];
            for j in (row + 1)..n {
                sum -= self.lu[row * n + j] * x[j];
            }
            x[row] = sum / self.lu[row * n + row];
        }

        x
    }
}
