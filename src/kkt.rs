use log::{debug, trace};
use spsolve::Solver;

use crate::common::Options;
use crate::math;
use crate::model::{Iterate, Model, RowKind};
use crate::sparse::{mat_t_vec, mat_vec, CooBuilder, SparsityPattern};

/// Primal-dual search direction.
#[derive(Debug, Clone)]
pub(crate) struct Direction {
    pub dx: Vec<f64>,
    pub ds: Vec<f64>,
    pub dlam: Vec<f64>,
    pub dz_l: Vec<f64>,
    pub dz_u: Vec<f64>,
    pub dv_l: Vec<f64>,
    pub dv_u: Vec<f64>,
    /// Directional derivative of the barrier objective along (dx, ds).
    pub dphi: f64,
}

/// Failure of the step computation after all recovery attempts.
#[derive(Debug)]
pub(crate) enum StepError {
    /// The KKT system could not be solved at any regularization level.
    Factorization(String),
    /// The direction norm exceeded the configured bound.
    TooLarge(f64),
}

/// First-order data of the current point, evaluated by the driver.
pub(crate) struct KktData<'a> {
    pub grad: &'a [f64],
    pub g: &'a [f64],
    pub jac_pattern: &'a SparsityPattern,
    pub jac: &'a [f64],
    pub hess_pattern: &'a SparsityPattern,
    pub hess: &'a [f64],
}

/// Escalating (delta_w, delta_c) regularization attempts. The first entry
/// is the unperturbed system; later rungs convexify the primal block and
/// shift degenerate dual rows.
const REG_LADDER: &[(f64, f64)] = &[
    (0.0, 0.0),
    (1e-8, 1e-8),
    (1e-4, 1e-8),
    (1e-2, 1e-8),
    (1.0, 1e-8),
    (1e2, 1e-8),
    (1e4, 1e-8),
    (1e8, 1e-8),
];

/// Solves the condensed primal-dual system for a Newton direction at the
/// current iterate:
///
/// ```txt
///       [ W + Sigma_x + delta_w I         J'            ] [ dx  ]   [ -grad phi - J' lam ]
///       [ J                   -(Sigma_s^-1 + delta_c I) ] [ dlam] = [  rhs_c             ]
/// ```
///
/// with the bound-multiplier blocks eliminated and recovered afterwards.
/// Rows without slack curvature (equalities) carry only the `-delta_c`
/// shift. If `require_descent` is set, directions with a non-negative
/// barrier-objective slope are retried at the next regularization rung
/// (a large enough `delta_w` bends the step toward steepest descent).
pub(crate) fn compute_direction<S: Solver<usize, f64>>(
    model: &Model,
    it: &Iterate,
    data: &KktData,
    opt: &Options,
    require_descent: bool,
    solver: &S,
) -> Result<Direction, StepError> {
    let n = model.n;
    let m = model.m;
    let mc = model.active_rows.len();
    let kn = n + mc;
    let mu = it.mu;

    let mut sigma_x = vec![0.0; n];
    let mut sigma_s = vec![0.0; m];
    model.sigma_x(it, &mut sigma_x);
    model.sigma_s(it, &mut sigma_s);

    let mut gphi_x = vec![0.0; n];
    let mut gphi_s = vec![0.0; m];
    model.grad_phi_x(data.grad, &it.x, mu, &mut gphi_x);
    model.grad_phi_s(&it.s, mu, &mut gphi_s);

    let mut c = vec![0.0; m];
    model.residual(data.g, &it.s, &mut c);

    // Right-hand side: -(grad phi_x + J'lam) over x, then per active row
    // -c (equality) or -c + (lam - grad phi_s) / sigma_s (inequality).
    let mut rhs = vec![0.0; kn];
    let mut jt_lam = vec![0.0; n];
    mat_t_vec(data.jac_pattern, data.jac, &it.lam, &mut jt_lam);
    for i in 0..n {
        rhs[i] = -(gphi_x[i] + jt_lam[i]);
    }
    for (a, &j) in model.active_rows.iter().enumerate() {
        rhs[n + a] = match model.kinds[j] {
            RowKind::Equality => -c[j],
            RowKind::Inequality => -c[j] + (it.lam[j] - gphi_s[j]) / sigma_s[j],
            RowKind::Free => unreachable!(),
        };
    }

    let mut last_err = String::new();
    for (rung, &(delta_w, delta_c)) in REG_LADDER.iter().enumerate() {
        let mut kkt = CooBuilder::new(kn, kn);
        // W, symmetric expansion of the stored lower triangle
        for k in 0..data.hess.len() {
            let (i, j) = (data.hess_pattern.rows[k], data.hess_pattern.cols[k]);
            kkt.add(i, j, data.hess[k]);
            if i != j {
                kkt.add(j, i, data.hess[k]);
            }
        }
        for i in 0..n {
            kkt.add(i, i, sigma_x[i] + delta_w);
        }
        // J and J'
        for k in 0..data.jac.len() {
            let row = data.jac_pattern.rows[k];
            if let Some(a) = model.active[row] {
                let col = data.jac_pattern.cols[k];
                kkt.add(n + a, col, data.jac[k]);
                kkt.add(col, n + a, data.jac[k]);
            }
        }
        for (a, &j) in model.active_rows.iter().enumerate() {
            let d = match model.kinds[j] {
                RowKind::Inequality => -sigma_s[j].recip() - delta_c,
                _ => -delta_c,
            };
            kkt.add(n + a, n + a, d);
        }

        let csc = kkt.to_csc().map_err(StepError::Factorization)?;
        let mut sol = rhs.clone();
        if let Err(err) = solver.solve(
            kn,
            csc.rowidx(),
            csc.colptr(),
            csc.values(),
            &mut sol,
            false,
        ) {
            last_err = err.to_string();
            trace!(
                "KKT solve failed at delta_w={:e}: {}; retrying",
                delta_w,
                last_err
            );
            continue;
        }
        if !math::all_finite(&sol) {
            last_err = "non-finite entries in KKT solution".to_string();
            trace!("{} at delta_w={:e}; retrying", last_err, delta_w);
            continue;
        }

        let dir = recover(model, it, data, &gphi_x, &gphi_s, &c, &sol);
        if require_descent && dir.dphi >= 0.0 && rung + 1 < REG_LADDER.len() {
            trace!(
                "ascent direction (dphi={:e}) at delta_w={:e}; retrying",
                dir.dphi,
                delta_w
            );
            continue;
        }
        if delta_w > 0.0 {
            debug!("step computed with regularization delta_w={:e}", delta_w);
        }

        let norm = math::norm(&sol);
        if norm > opt.max_step_size {
            return Err(StepError::TooLarge(norm));
        }
        return Ok(dir);
    }

    Err(StepError::Factorization(last_err))
}

/// Recovers the full direction from the condensed solution: slack steps from
/// the linearized constraints, bound-multiplier steps from the perturbed
/// complementarity equations.
#[allow(clippy::too_many_arguments)]
fn recover(
    model: &Model,
    it: &Iterate,
    data: &KktData,
    gphi_x: &[f64],
    gphi_s: &[f64],
    c: &[f64],
    sol: &[f64],
) -> Direction {
    let n = model.n;
    let m = model.m;
    let mu = it.mu;

    let dx = sol[..n].to_vec();
    let mut dlam = vec![0.0; m];
    for (a, &j) in model.active_rows.iter().enumerate() {
        dlam[j] = sol[n + a];
    }

    // ds = J dx + c on rows with a slack; free rows track the
    // linearization as well so theta stays untouched by them.
    let mut jdx = vec![0.0; m];
    mat_vec(data.jac_pattern, data.jac, &dx, &mut jdx);
    let mut ds = vec![0.0; m];
    for j in 0..m {
        ds[j] = match model.kinds[j] {
            RowKind::Equality => 0.0,
            _ => jdx[j] + c[j],
        };
    }

    let mut dz_l = vec![0.0; n];
    let mut dz_u = vec![0.0; n];
    for i in 0..n {
        if model.x_l[i].is_finite() {
            let sl = it.x[i] - model.x_l[i];
            dz_l[i] = mu / sl - it.z_l[i] - it.z_l[i] * dx[i] / sl;
        }
        if model.x_u[i].is_finite() {
            let sl = model.x_u[i] - it.x[i];
            dz_u[i] = mu / sl - it.z_u[i] + it.z_u[i] * dx[i] / sl;
        }
    }
    let mut dv_l = vec![0.0; m];
    let mut dv_u = vec![0.0; m];
    for j in 0..m {
        if model.kinds[j] != RowKind::Inequality {
            continue;
        }
        if model.g_l[j].is_finite() {
            let sl = it.s[j] - model.g_l[j];
            dv_l[j] = mu / sl - it.v_l[j] - it.v_l[j] * ds[j] / sl;
        }
        if model.g_u[j].is_finite() {
            let sl = model.g_u[j] - it.s[j];
            dv_u[j] = mu / sl - it.v_u[j] + it.v_u[j] * ds[j] / sl;
        }
    }

    let mut dphi = math::dot(gphi_x, &dx);
    for j in 0..m {
        if model.kinds[j] == RowKind::Inequality {
            dphi += gphi_s[j] * ds[j];
        }
    }

    Direction {
        dx,
        ds,
        dlam,
        dz_l,
        dz_u,
        dv_l,
        dv_u,
        dphi,
    }
}
