// src/diffusion.rs
//
// Steady-state reaction-diffusion solves on the regular grid.
//
// Each diffusing species is advanced to its per-step steady state by
// assembling and solving one sparse linear system from a 7-point
// finite-difference stencil:
//
//   diagonal(p)  = -reaction(p) - 6 c           with c = D / spacing^2
//   (p, q)       = +c            for each axis neighbour q inside the grid
//   diagonal(p) += c             for each neighbour that falls outside
//   rhs(p)       = -source(p)
//
// Folding a missing neighbour's coefficient back onto the diagonal gives a
// zero-flux (reflecting) boundary without ghost points. The fold is done
// with an explicit check per axis direction so each boundary face can be
// audited on its own.
//
// Points flagged in `pinned` are outside the lesion; their rows collapse
// to the identity with a fixed ambient value on the right-hand side, which
// pins the field to the healthy-tissue concentration there.

use rayon::prelude::*;

use crate::error::{SimError, SimResult};
use crate::grid::Grid3;
use crate::solver::{self, CsrMatrix, SolverConfig, SolverStats};

/// One species' solve, described point-wise.
///
/// `reaction` and `source` hold the already-evaluated per-point rate and
/// release terms; how they are computed from other fields is the calling
/// model's business.
pub struct DiffusionProblem<'a> {
    pub diffusivity: f64,
    pub reaction: &'a [f64],
    pub source: &'a [f64],
    pub pinned: &'a [bool],
    pub pinned_value: f64,
}

/// Assemble the stencil matrix and right-hand side for one species.
///
/// Rows are independent and built in parallel, in grid index order.
pub fn assemble(grid: &Grid3, problem: &DiffusionProblem) -> (CsrMatrix, Vec<f64>) {
    let (nx, ny, nz) = (grid.nx, grid.ny, grid.nz);
    let plane = nx * ny;
    let n = grid.n_points();
    let c = problem.diffusivity / (grid.spacing * grid.spacing);

    debug_assert_eq!(problem.reaction.len(), n);
    debug_assert_eq!(problem.source.len(), n);
    debug_assert_eq!(problem.pinned.len(), n);

    let entries: Vec<(Vec<(usize, f64)>, f64)> = (0..n)
        .into_par_iter()
        .map(|p| {
            if problem.pinned[p] {
                return (vec![(p, 1.0)], problem.pinned_value);
            }

            let ix = p % nx;
            let iy = (p / nx) % ny;
            let iz = p / plane;

            let mut diag = -problem.reaction[p] - 6.0 * c;
            let mut row: Vec<(usize, f64)> = Vec::with_capacity(7);

            // No flux at x faces
            if ix > 0 {
                row.push((p - 1, c));
            } else {
                diag += c;
            }
            if ix + 1 < nx {
                row.push((p + 1, c));
            } else {
                diag += c;
            }

            // No flux at y faces
            if iy > 0 {
                row.push((p - nx, c));
            } else {
                diag += c;
            }
            if iy + 1 < ny {
                row.push((p + nx, c));
            } else {
                diag += c;
            }

            // No flux at z faces
            if iz > 0 {
                row.push((p - plane, c));
            } else {
                diag += c;
            }
            if iz + 1 < nz {
                row.push((p + plane, c));
            } else {
                diag += c;
            }

            row.push((p, diag));
            row.sort_unstable_by_key(|&(col, _)| col);
            (row, -problem.source[p])
        })
        .collect();

    let mut rows = Vec::with_capacity(n);
    let mut rhs = Vec::with_capacity(n);
    for (row, b) in entries {
        rows.push(row);
        rhs.push(b);
    }

    (CsrMatrix::from_rows(rows), rhs)
}

/// Solve one species to steady state, writing the solution into `field`.
///
/// The current field contents are the initial guess; the solution comes
/// back point-for-point in grid index order.
pub fn solve_steady_state(
    grid: &Grid3,
    problem: &DiffusionProblem,
    field: &mut [f64],
    cfg: &SolverConfig,
) -> SimResult<SolverStats> {
    let n = grid.n_points();
    SimError::check_len("reaction", n, problem.reaction.len())?;
    SimError::check_len("source", n, problem.source.len())?;
    SimError::check_len("pinned", n, problem.pinned.len())?;
    SimError::check_len("field", n, field.len())?;

    let (matrix, rhs) = assemble(grid, problem);
    solver::bicgstab(&matrix, &rhs, field, cfg)
}
