use log::{debug, trace};
use spsolve::Solver;

use crate::common::Options;
use crate::eval::{EvalError, Evaluator};
use crate::math;
use crate::model::{Model, RowKind};
use crate::sparse::CooBuilder;
use crate::traits::NlpProblem;

/// Iteration budget of one restoration call.
const MAX_ITER: usize = 100;
/// Levenberg-Marquardt damping range; the damping adapts to the observed
/// step quality and exceeding the range counts as failure.
const RHO_MIN: f64 = 1e-8;
const RHO_MAX: f64 = 1e12;
/// Relative stationarity threshold for declaring local infeasibility.
const STATIONARITY_TOL: f64 = 1e-6;
/// Fraction-to-the-boundary margin on the variable bounds.
const TAU: f64 = 0.99;
/// Armijo constant on the squared-violation merit.
const ETA: f64 = 1e-4;

/// Outcome of the restoration phase.
pub(crate) enum Restoration {
    /// Feasibility restored below the return threshold; `x` holds the new
    /// point.
    Restored { x: Vec<f64>, theta: f64 },
    /// First-order stationary point of the violation with theta still
    /// large: no feasible point is reachable from here.
    Infeasible,
    /// The iteration budget ran out without restoring feasibility.
    Failed,
    /// An evaluation callback failed.
    Eval(EvalError),
}

/// Minimizes the constraint violation starting from `x0`, ignoring the
/// objective: damped Gauss-Newton steps on `q(x) = 1/2 ||v(x)||^2`, where
/// `v` is the vector of constraint-interval violations, with iterates kept
/// strictly inside the variable bounds. The slack optimum for fixed `x` is
/// the clamp of `g(x)` onto its interval, so only `x` is iterated here.
pub(crate) fn restore<P: NlpProblem, S: Solver<usize, f64>>(
    model: &Model,
    eval: &mut Evaluator<P>,
    opt: &Options,
    x0: &[f64],
    theta_entry: f64,
    solver: &S,
) -> Restoration {
    let n = model.n;
    let m = model.m;
    let jac_pattern = eval.jac_pattern().clone();

    // Index of the Jacobian entries of each row, fixed pattern.
    let mut row_entries: Vec<Vec<usize>> = vec![Vec::new(); m];
    for (k, &row) in jac_pattern.rows.iter().enumerate() {
        row_entries[row].push(k);
    }

    let theta_return = f64::max(0.1 * theta_entry, 10.0 * opt.tol);
    let mut x = x0.to_vec();
    let mut g = vec![0.0; m];
    let mut v = vec![0.0; m];
    let mut jac = vec![0.0; jac_pattern.nnz()];
    let mut rho = 1e-6;

    for iter in 0..MAX_ITER {
        if let Err(err) = eval.constraints(&x, &mut g) {
            return Restoration::Eval(err);
        }
        violation(model, &g, &mut v);
        let theta = math::norm_1(&v);
        if theta <= theta_return {
            debug!("restoration succeeded after {} iterations", iter);
            return Restoration::Restored { x, theta };
        }

        if let Err(err) = eval.jacobian(&x, &mut jac) {
            return Restoration::Eval(err);
        }

        // grad q = J' v; v is zero on satisfied rows.
        let mut grad_q = vec![0.0; n];
        crate::sparse::mat_t_vec(&jac_pattern, &jac, &v, &mut grad_q);
        if math::norm_inf(&grad_q) <= STATIONARITY_TOL * f64::max(1.0, math::norm_inf(&v)) {
            debug!(
                "restoration stationary with theta={:e}: locally infeasible",
                theta
            );
            return Restoration::Infeasible;
        }

        // Gauss-Newton system (J_v' J_v + rho I) dx = -grad q over the
        // violated rows.
        let dx = loop {
            let mut normal = CooBuilder::new(n, n);
            for j in 0..m {
                if v[j] == 0.0 {
                    continue;
                }
                for &a in &row_entries[j] {
                    for &b in &row_entries[j] {
                        normal.add(
                            jac_pattern.cols[a],
                            jac_pattern.cols[b],
                            jac[a] * jac[b],
                        );
                    }
                }
            }
            for i in 0..n {
                normal.add(i, i, rho);
            }
            let csc = match normal.to_csc() {
                Ok(csc) => csc,
                Err(_) => return Restoration::Failed,
            };
            let mut sol: Vec<f64> = grad_q.iter().map(|&gq| -gq).collect();
            let solved = solver
                .solve(n, csc.rowidx(), csc.colptr(), csc.values(), &mut sol, false)
                .is_ok()
                && math::all_finite(&sol)
                && math::dot(&sol, &grad_q) < 0.0;
            if solved {
                break sol;
            }
            rho *= 10.0;
            trace!("restoration damping raised to {:e}", rho);
            if rho > RHO_MAX {
                return Restoration::Failed;
            }
        };

        // Keep strictly inside the variable bounds.
        let mut alpha: f64 = 1.0;
        for i in 0..n {
            if dx[i] < 0.0 && model.x_l[i].is_finite() {
                alpha = alpha.min(TAU * (x[i] - model.x_l[i]) / -dx[i]);
            }
            if dx[i] > 0.0 && model.x_u[i].is_finite() {
                alpha = alpha.min(TAU * (model.x_u[i] - x[i]) / dx[i]);
            }
        }

        // Armijo backtracking on q.
        let q0 = 0.5 * math::dot(&v, &v);
        let slope = math::dot(&dx, &grad_q);
        let mut accepted = false;
        let mut x_trial = vec![0.0; n];
        let mut g_trial = vec![0.0; m];
        let mut v_trial = vec![0.0; m];
        for _ in 0..30 {
            if alpha < 1e-12 {
                break;
            }
            for i in 0..n {
                x_trial[i] = x[i] + alpha * dx[i];
            }
            if eval.constraints(&x_trial, &mut g_trial).is_err() {
                alpha *= 0.5;
                continue;
            }
            violation(model, &g_trial, &mut v_trial);
            let q_trial = 0.5 * math::dot(&v_trial, &v_trial);
            if q_trial <= q0 + ETA * alpha * slope {
                accepted = true;
                break;
            }
            alpha *= 0.5;
        }
        if !accepted {
            rho *= 10.0;
            if rho > RHO_MAX {
                return Restoration::Failed;
            }
            continue;
        }
        for i in 0..n {
            x[i] += alpha * dx[i];
        }
        // adapt the damping to the observed step quality: heavy
        // backtracking means the model overshot, a full step means the
        // damping can come down
        if alpha < 0.1 {
            rho = f64::min(RHO_MAX, rho * 10.0);
        } else if alpha >= 0.9 {
            rho = f64::max(RHO_MIN, rho * 0.1);
        }
    }
    Restoration::Failed
}

/// Per-row distance of g to its admissible interval; zero on satisfied and
/// free rows.
fn violation(model: &Model, g: &[f64], v: &mut [f64]) {
    for j in 0..model.m {
        v[j] = match model.kinds[j] {
            RowKind::Free => 0.0,
            _ => {
                if g[j] < model.g_l[j] {
                    g[j] - model.g_l[j]
                } else if g[j] > model.g_u[j] {
                    g[j] - model.g_u[j]
                } else {
                    0.0
                }
            }
        };
    }
}
