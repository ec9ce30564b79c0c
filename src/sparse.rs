use std::collections::BTreeMap;

use itertools::izip;
use sparsetools::coo::Coo;
use sparsetools::csc::CSC;

/// Coordinate-format sparsity: row and column index arrays, fixed for the
/// lifetime of a problem once queried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SparsityPattern {
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
}

impl SparsityPattern {
    pub fn nnz(&self) -> usize {
        self.rows.len()
    }

    /// Checks every coordinate against the matrix shape.
    pub fn validate(&self, n_rows: usize, n_cols: usize) -> Result<(), String> {
        for (&i, &j) in self.rows.iter().zip(&self.cols) {
            if i >= n_rows || j >= n_cols {
                return Err(format!(
                    "sparsity entry ({}, {}) outside of {}x{} matrix",
                    i, j, n_rows, n_cols
                ));
            }
        }
        Ok(())
    }
}

/// y += A*x for A given in coordinate format. Repeated coordinates
/// accumulate.
pub(crate) fn mat_vec(pattern: &SparsityPattern, values: &[f64], x: &[f64], y: &mut [f64]) {
    for (&v, &i, &j) in izip!(values, &pattern.rows, &pattern.cols) {
        y[i] += v * x[j];
    }
}

/// y += A'*w for A given in coordinate format.
pub(crate) fn mat_t_vec(pattern: &SparsityPattern, values: &[f64], w: &[f64], y: &mut [f64]) {
    for (&v, &i, &j) in izip!(values, &pattern.rows, &pattern.cols) {
        y[j] += v * w[i];
    }
}

/// Incremental builder for a sparse matrix in coordinate form. Entries with
/// the same coordinates are summed; the result is emitted column-major with
/// ascending row indices so the CSC handed to the linear solver has sorted
/// indices.
pub(crate) struct CooBuilder {
    n_rows: usize,
    n_cols: usize,
    entries: BTreeMap<(usize, usize), f64>,
}

impl CooBuilder {
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            entries: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.n_rows && col < self.n_cols);
        *self.entries.entry((col, row)).or_insert(0.0) += value;
    }

    pub fn to_csc(&self) -> Result<CSC<usize, f64>, String> {
        let nnz = self.entries.len();
        let mut rowidx = Vec::with_capacity(nnz);
        let mut colidx = Vec::with_capacity(nnz);
        let mut data = Vec::with_capacity(nnz);
        for (&(col, row), &value) in &self.entries {
            rowidx.push(row);
            colidx.push(col);
            data.push(value);
        }
        let coo = Coo::new(self.n_rows, self.n_cols, rowidx, colidx, data)
            .map_err(|err| err.to_string())?;
        Ok(coo.to_csc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> SparsityPattern {
        // [[1, 2], [0, 3]] with a duplicate on (1, 1)
        SparsityPattern {
            rows: vec![0, 0, 1, 1],
            cols: vec![0, 1, 1, 1],
        }
    }

    #[test]
    fn products() {
        let p = pattern();
        let vals = [1.0, 2.0, 2.0, 1.0];
        let x = [1.0, 10.0];

        let mut y = vec![0.0; 2];
        mat_vec(&p, &vals, &x, &mut y);
        assert_eq!(y, vec![21.0, 30.0]);

        let mut y = vec![0.0; 2];
        mat_t_vec(&p, &vals, &x, &mut y);
        assert_eq!(y, vec![1.0, 32.0]);
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let p = pattern();
        assert!(p.validate(2, 2).is_ok());
        assert!(p.validate(1, 2).is_err());
        assert!(p.validate(2, 1).is_err());
    }

    #[test]
    fn builder_sums_duplicates() {
        let mut b = CooBuilder::new(2, 2);
        b.add(0, 0, 1.0);
        b.add(0, 0, 2.0);
        b.add(1, 0, 4.0);
        let csc = b.to_csc().unwrap();
        assert_eq!(csc.nnz(), 2);
        assert_eq!(csc.values(), &[3.0, 4.0]);
    }
}
