// src/solver.rs
//
// Sparse linear algebra for the per-species field solves.
//
// The matrix is stored in compressed sparse row (CSR) form. Assembly goes
// through either `CsrBuilder` (general, per-entry accumulation) or
// `CsrMatrix::from_rows` (rows produced independently, as the stencil
// assembly does). The system is solved with unpreconditioned BiCGStab:
// the Dirichlet-override rows make the operator nonsymmetric, which rules
// out plain CG.
//
// The solve warm-starts from the caller's vector. This matters beyond
// performance: with zero reaction and zero source the stencil operator is
// singular (every row sums to zero), and the warm start turns that case
// into an immediate zero-residual return that leaves a uniform field
// untouched.

use std::collections::BTreeMap;

use crate::error::{SimError, SimResult};

/// CSR sparse matrix over f64.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    n: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Build from per-row entry lists with strictly ascending column indices.
    pub fn from_rows(rows: Vec<Vec<(usize, f64)>>) -> Self {
        let n = rows.len();
        let nnz = rows.iter().map(|r| r.len()).sum();
        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut col_idx = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);

        row_ptr.push(0);
        for row in rows {
            debug_assert!(row.windows(2).all(|w| w[0].0 < w[1].0));
            for (col, val) in row {
                debug_assert!(col < n);
                col_idx.push(col);
                values.push(val);
            }
            row_ptr.push(col_idx.len());
        }

        Self {
            n,
            row_ptr,
            col_idx,
            values,
        }
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Value at (row, col), zero if the entry is not stored.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        match self.col_idx[start..end].binary_search(&col) {
            Ok(local) => self.values[start + local],
            Err(_) => 0.0,
        }
    }

    /// y = A x
    pub fn mul_vec(&self, x: &[f64], y: &mut [f64]) {
        debug_assert_eq!(x.len(), self.n);
        debug_assert_eq!(y.len(), self.n);
        for row in 0..self.n {
            let start = self.row_ptr[row];
            let end = self.row_ptr[row + 1];
            let mut sum = 0.0;
            for idx in start..end {
                sum += self.values[idx] * x[self.col_idx[idx]];
            }
            y[row] = sum;
        }
    }
}

/// Row-by-row CSR builder with per-entry accumulation.
pub struct CsrBuilder {
    n: usize,
    rows: Vec<BTreeMap<usize, f64>>,
}

impl CsrBuilder {
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "matrix dimension must be positive");
        Self {
            n,
            rows: vec![BTreeMap::new(); n],
        }
    }

    /// Accumulate into (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        assert!(row < self.n && col < self.n);
        *self.rows[row].entry(col).or_insert(0.0) += value;
    }

    pub fn build(self) -> CsrMatrix {
        let rows = self
            .rows
            .into_iter()
            .map(|row| row.into_iter().collect())
            .collect();
        CsrMatrix::from_rows(rows)
    }
}

/// Iterative solve controls.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    /// Convergence when ||r|| <= rel_tol * ||b|| (or abs_tol if larger).
    pub rel_tol: f64,
    pub abs_tol: f64,
    pub max_iter: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            rel_tol: 1e-10,
            abs_tol: 1e-12,
            max_iter: 10_000,
        }
    }
}

/// Outcome of a converged solve.
#[derive(Debug, Clone, Copy)]
pub struct SolverStats {
    pub iterations: usize,
    pub residual: f64,
}

#[inline]
fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// Solve A x = b with BiCGStab, using `x` as the initial guess.
///
/// Returns an error on breakdown or when `max_iter` is exhausted without
/// reaching the tolerance.
pub fn bicgstab(a: &CsrMatrix, b: &[f64], x: &mut [f64], cfg: &SolverConfig) -> SimResult<SolverStats> {
    let n = a.n_rows();
    SimError::check_len("rhs", n, b.len())?;
    SimError::check_len("solution", n, x.len())?;

    let tol = (cfg.rel_tol * norm(b)).max(cfg.abs_tol);

    // r = b - A x
    let mut r = vec![0.0; n];
    a.mul_vec(x, &mut r);
    for i in 0..n {
        r[i] = b[i] - r[i];
    }

    let mut res_norm = norm(&r);
    if res_norm <= tol {
        return Ok(SolverStats {
            iterations: 0,
            residual: res_norm,
        });
    }

    let r_hat = r.clone();
    let mut p = vec![0.0; n];
    let mut v = vec![0.0; n];
    let mut s = vec![0.0; n];
    let mut t = vec![0.0; n];

    let mut rho = 1.0;
    let mut alpha = 1.0;
    let mut omega = 1.0;

    for iter in 1..=cfg.max_iter {
        let rho_new = dot(&r_hat, &r);
        if rho_new.abs() < f64::MIN_POSITIVE {
            return Err(SimError::solver(format!(
                "BiCGStab breakdown (rho ~ 0) at iteration {}, residual {:.3e}",
                iter, res_norm
            )));
        }

        let beta = (rho_new / rho) * (alpha / omega);
        for i in 0..n {
            p[i] = r[i] + beta * (p[i] - omega * v[i]);
        }

        a.mul_vec(&p, &mut v);
        let denom = dot(&r_hat, &v);
        if denom.abs() < f64::MIN_POSITIVE {
            return Err(SimError::solver(format!(
                "BiCGStab breakdown (r_hat . v ~ 0) at iteration {}, residual {:.3e}",
                iter, res_norm
            )));
        }
        alpha = rho_new / denom;

        for i in 0..n {
            s[i] = r[i] - alpha * v[i];
        }

        let s_norm = norm(&s);
        if s_norm <= tol {
            for i in 0..n {
                x[i] += alpha * p[i];
            }
            return Ok(SolverStats {
                iterations: iter,
                residual: s_norm,
            });
        }

        a.mul_vec(&s, &mut t);
        let tt = dot(&t, &t);
        if tt < f64::MIN_POSITIVE {
            return Err(SimError::solver(format!(
                "BiCGStab breakdown (t . t ~ 0) at iteration {}, residual {:.3e}",
                iter, s_norm
            )));
        }
        omega = dot(&t, &s) / tt;

        for i in 0..n {
            x[i] += alpha * p[i] + omega * s[i];
        }
        for i in 0..n {
            r[i] = s[i] - omega * t[i];
        }

        res_norm = norm(&r);
        if res_norm <= tol {
            return Ok(SolverStats {
                iterations: iter,
                residual: res_norm,
            });
        }

        rho = rho_new;
    }

    Err(SimError::solver(format!(
        "BiCGStab did not converge in {} iterations, residual {:.3e} (tol {:.3e})",
        cfg.max_iter, res_norm, tol
    )))
}
