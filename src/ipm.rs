use std::time::Instant;

use log::{debug, log, Level};
use spsolve::Solver;

use crate::common::{Options, Solution, SolveStatus};
use crate::eval::Evaluator;
use crate::kkt::{self, KktData, StepError};
use crate::linesearch::{self, Filter};
use crate::math;
use crate::model::{Iterate, Model, RowKind};
use crate::mu;
use crate::restoration::{self, Restoration};
use crate::traits::{NlpProblem, ProgressMonitor};

// `clock` / `CLOCKS_PER_SEC` are not surfaced by the `libc` crate on this
// platform, so bind the C library symbols directly. POSIX fixes
// `CLOCKS_PER_SEC` at 1_000_000.
extern "C" {
    fn clock() -> libc::clock_t;
}
const CLOCKS_PER_SEC: libc::clock_t = 1_000_000;

/// Multipliers retained from a previous solve, in user coordinates.
#[derive(Debug, Clone)]
pub(crate) struct WarmStart {
    pub mult_g: Vec<f64>,
    pub mult_x_l: Vec<f64>,
    pub mult_x_u: Vec<f64>,
}

/// Safeguard corridor for the bound multipliers around mu / slack.
const KAPPA_SIGMA: f64 = 1e10;
/// KKT error normalisation cap s_max.
const S_MAX: f64 = 100.0;
/// Restoration entries tolerated before the solve is declared failed.
const MAX_RESTORATIONS: usize = 10;
/// Smallest multiplier used when reconstructing duals.
const MULT_FLOOR: f64 = 1e-8;

/// Scaled first-order error of the current iterate.
struct KktError {
    /// E(0): the optimality error deciding convergence.
    e0: f64,
    /// E(mu): the barrier subproblem error driving the monotone strategy.
    e_mu: f64,
    /// Unscaled dual infeasibility, for reporting.
    dual_inf: f64,
    /// Unscaled primal infeasibility, for reporting.
    primal_inf: f64,
    /// Average complementarity, feeding the adaptive strategy.
    compl_avg: f64,
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn solve<P: NlpProblem, S: Solver<usize, f64>>(
    nlp: &P,
    x_l: &[f64],
    x_u: &[f64],
    g_l: &[f64],
    g_u: &[f64],
    nnz_jac: usize,
    nnz_hess: usize,
    opt: &Options,
    obj_scaling: f64,
    x_scaling: Option<&[f64]>,
    g_scaling: Option<&[f64]>,
    warm: Option<&WarmStart>,
    x: &mut [f64],
    monitor: Option<&dyn ProgressMonitor>,
    solver: &S,
) -> Solution {
    let n = x_l.len();
    let m = g_l.len();
    let t_start = Instant::now();
    let cpu_start = unsafe { clock() };
    let cpu_elapsed = |start: libc::clock_t| -> f64 {
        let now = unsafe { clock() };
        (now - start) as f64 / CLOCKS_PER_SEC as f64
    };

    // An empty bound interval cannot be satisfied by any point; report
    // infeasibility without spending the iteration budget on it.
    for j in 0..m {
        if g_l[j] > g_u[j] {
            debug!("constraint {} has g_l > g_u: infeasible by construction", j);
            return early(SolveStatus::InfeasibleProblemDetected, n, m);
        }
    }

    let model = Model::new(x_l, x_u, g_l, g_u, x_scaling, g_scaling, opt);
    if model.n_eq > model.n {
        return early(SolveStatus::NotEnoughDegreesOfFreedom, n, m);
    }

    let mut eval = match Evaluator::new(
        nlp,
        n,
        m,
        nnz_jac,
        nnz_hess,
        obj_scaling,
        x_scaling.map(|d| d.to_vec()),
        g_scaling.map(|d| d.to_vec()),
    ) {
        Ok(eval) => eval,
        Err(err) => {
            debug!("structure query rejected: {}", err);
            return early(SolveStatus::InvalidProblemDefinition, n, m);
        }
    };
    let jac_pattern = eval.jac_pattern().clone();
    let hess_pattern = eval.hess_pattern().clone();

    // Initial iterate: scale the caller's point, push it into the strict
    // interior (unless warm starting) and attach multipliers.
    let mut it = Iterate::zeros(n, m, opt.mu_init);
    for i in 0..n {
        it.x[i] = match x_scaling {
            Some(d) => x[i] * d[i],
            None => x[i],
        };
    }
    let warm_mults = warm.filter(|_| opt.warm_start_init_point);
    if let Some(w) = warm_mults {
        for i in 0..n {
            // stay representable inside the relaxed bounds without moving
            // interior points
            if model.x_l[i].is_finite() {
                it.x[i] = it.x[i].max(model.x_l[i] + warm_margin(model.x_l[i]));
            }
            if model.x_u[i].is_finite() {
                it.x[i] = it.x[i].min(model.x_u[i] - warm_margin(model.x_u[i]));
            }
        }
        for j in 0..m {
            it.lam[j] = match g_scaling {
                Some(d) => obj_scaling * w.mult_g[j] / d[j],
                None => obj_scaling * w.mult_g[j],
            };
        }
        for i in 0..n {
            let scale = |v: f64| match x_scaling {
                Some(d) => obj_scaling * v / d[i],
                None => obj_scaling * v,
            };
            if model.x_l[i].is_finite() {
                it.z_l[i] = f64::max(MULT_FLOOR, scale(w.mult_x_l[i]));
            }
            if model.x_u[i].is_finite() {
                it.z_u[i] = f64::max(MULT_FLOOR, scale(w.mult_x_u[i]));
            }
        }
    } else {
        for i in 0..n {
            it.x[i] = push_interior(
                model.x_l[i],
                model.x_u[i],
                it.x[i],
                opt.bound_push,
                opt.bound_frac,
            );
            if model.x_l[i].is_finite() {
                it.z_l[i] = 1.0;
            }
            if model.x_u[i].is_finite() {
                it.z_u[i] = 1.0;
            }
        }
    }

    let mut g = vec![0.0; m];
    if eval.constraints(&it.x, &mut g).is_err() {
        return finish(
            SolveStatus::InvalidNumberDetected,
            &model,
            &it,
            0.0,
            &g,
            obj_scaling,
            x_scaling,
            g_scaling,
            0,
            eval.counts(),
            x,
        );
    }
    init_slacks(&model, &mut it, &g, opt, warm_mults.is_some());

    let mut c = vec![0.0; m];
    model.residual(&g, &it.s, &mut c);
    let theta_0 = model.theta(&c);
    let theta_min = 1e-4 * f64::max(1.0, theta_0);
    let theta_max = 1e4 * f64::max(1.0, theta_0);
    let mut filter = Filter::new(theta_max);
    let mut tau = f64::max(opt.tau_min, 1.0 - it.mu);

    let mut grad = vec![0.0; n];
    let mut jac = vec![0.0; nnz_jac];
    let mut hess = vec![0.0; nnz_hess];
    let mut f = 0.0;

    let mut iter = 0;
    let mut n_acceptable = 0;
    let mut n_too_large = 0;
    let mut n_restorations = 0;
    let mut alpha_pr = 0.0;
    let mut alpha_du = 0.0;
    let mut step_norm = 0.0;

    loop {
        // First-order data at the current point. Any failure here aborts the
        // solve with the partial iterate left in the output buffers.
        let evaluated = eval.objective(&it.x).and_then(|obj| {
            f = obj;
            eval.gradient(&it.x, &mut grad)?;
            eval.constraints(&it.x, &mut g)?;
            eval.jacobian(&it.x, &mut jac)?;
            eval.hessian(&it.x, &it.lam, &mut hess)
        });
        if evaluated.is_err() {
            return finish(
                SolveStatus::InvalidNumberDetected,
                &model,
                &it,
                f,
                &g,
                obj_scaling,
                x_scaling,
                g_scaling,
                iter,
                eval.counts(),
                x,
            );
        }

        model.residual(&g, &it.s, &mut c);
        let theta = model.theta(&c);
        let mut jt_lam = vec![0.0; n];
        crate::sparse::mat_t_vec(&jac_pattern, &jac, &it.lam, &mut jt_lam);
        let err = kkt_errors(&model, &it, &grad, &jt_lam, &c);

        log!(
            if opt.print_level >= 5 {
                Level::Info
            } else {
                Level::Debug
            },
            "{:4}  {:+.7e}  {:.2e}  {:.2e}  {:5.1}  {:.2e}  {:.2e}  {:.2e}",
            iter,
            f / obj_scaling,
            err.primal_inf,
            err.dual_inf,
            it.mu.log10(),
            step_norm,
            alpha_du,
            alpha_pr,
        );

        if err.e0 <= opt.tol {
            return finish(
                SolveStatus::SolveSucceeded,
                &model,
                &it,
                f,
                &g,
                obj_scaling,
                x_scaling,
                g_scaling,
                iter,
                eval.counts(),
                x,
            );
        }
        if err.e0 <= opt.acceptable_tol {
            n_acceptable += 1;
        } else {
            n_acceptable = 0;
        }

        if let Some(mon) = monitor {
            let go = mon.update(
                iter,
                f / obj_scaling,
                err.primal_inf,
                err.dual_inf,
                it.mu,
                step_norm,
                alpha_pr,
                alpha_du,
            );
            if !go {
                return finish(
                    SolveStatus::UserRequestedStop,
                    &model,
                    &it,
                    f,
                    &g,
                    obj_scaling,
                    x_scaling,
                    g_scaling,
                    iter,
                    eval.counts(),
                    x,
                );
            }
        }

        let budget = if iter >= opt.max_iter {
            Some(SolveStatus::MaximumIterationsExceeded)
        } else if t_start.elapsed().as_secs_f64() > opt.max_wall_time {
            Some(SolveStatus::MaximumWalltimeExceeded)
        } else if cpu_elapsed(cpu_start) > opt.max_cpu_time {
            Some(SolveStatus::MaximumCpuTimeExceeded)
        } else {
            None
        };
        if let Some(status) = budget {
            let status = if n_acceptable >= opt.acceptable_iter {
                SolveStatus::SolvedToAcceptableLevel
            } else {
                status
            };
            return finish(
                status,
                &model,
                &it,
                f,
                &g,
                obj_scaling,
                x_scaling,
                g_scaling,
                iter,
                eval.counts(),
                x,
            );
        }

        if math::norm_inf(&it.x) > opt.diverging_iterates_tol {
            return finish(
                SolveStatus::DivergingIterates,
                &model,
                &it,
                f,
                &g,
                obj_scaling,
                x_scaling,
                g_scaling,
                iter,
                eval.counts(),
                x,
            );
        }

        let mu_next = mu::update_mu(opt, it.mu, err.e_mu, err.compl_avg);
        if mu_next < it.mu {
            debug!("barrier parameter reduced to {:e}", mu_next);
            it.mu = mu_next;
            tau = f64::max(opt.tau_min, 1.0 - it.mu);
            filter.reset();
        }

        let dir = {
            let data = KktData {
                grad: &grad,
                g: &g,
                jac_pattern: &jac_pattern,
                jac: &jac,
                hess_pattern: &hess_pattern,
                hess: &hess,
            };
            kkt::compute_direction(&model, &it, &data, opt, theta <= theta_min, solver)
        };
        let dir = match dir {
            Ok(dir) => {
                n_too_large = 0;
                dir
            }
            Err(step_err) => {
                if let StepError::TooLarge(norm) = step_err {
                    debug!("search direction norm {:e} above bound", norm);
                    n_too_large += 1;
                    if n_too_large >= 2 {
                        return finish(
                            SolveStatus::SearchDirectionBecomesTooSmall,
                            &model,
                            &it,
                            f,
                            &g,
                            obj_scaling,
                            x_scaling,
                            g_scaling,
                            iter,
                            eval.counts(),
                            x,
                        );
                    }
                }
                // A KKT system broken at a feasible point cannot be cured
                // by restoring feasibility.
                if theta <= 10.0 * opt.tol {
                    return finish(
                        SolveStatus::ErrorInStepComputation,
                        &model,
                        &it,
                        f,
                        &g,
                        obj_scaling,
                        x_scaling,
                        g_scaling,
                        iter,
                        eval.counts(),
                        x,
                    );
                }
                n_restorations += 1;
                if n_restorations > MAX_RESTORATIONS {
                    return finish(
                        SolveStatus::RestorationFailed,
                        &model,
                        &it,
                        f,
                        &g,
                        obj_scaling,
                        x_scaling,
                        g_scaling,
                        iter,
                        eval.counts(),
                        x,
                    );
                }
                match enter_restoration(
                    &model, &mut eval, opt, &mut it, &mut g, theta, &mut filter, solver,
                ) {
                    Ok(()) => {
                        iter += 1;
                        continue;
                    }
                    Err(status) => {
                        return finish(
                            status,
                            &model,
                            &it,
                            f,
                            &g,
                            obj_scaling,
                            x_scaling,
                            g_scaling,
                            iter,
                            eval.counts(),
                            x,
                        )
                    }
                }
            }
        };

        let phi = model.phi(f, &it.x, &it.s, it.mu);
        let alpha_max = linesearch::max_alpha_primal(&model, &it, &dir, tau);
        let a_du = linesearch::max_alpha_dual(&model, &it, &dir, tau);

        let accepted = linesearch::search(
            &model, &it, &dir, &mut filter, &mut eval, theta, phi, theta_min, alpha_max,
        );
        match accepted {
            Ok(acc) => {
                step_norm = acc.alpha * math::norm(&dir.dx);
                it.x = acc.x;
                it.s = acc.s;
                for j in 0..m {
                    if model.kinds[j] == RowKind::Free {
                        it.s[j] = acc.g[j];
                    }
                }
                for j in 0..m {
                    it.lam[j] += acc.alpha * dir.dlam[j];
                }
                for i in 0..n {
                    it.z_l[i] += a_du * dir.dz_l[i];
                    it.z_u[i] += a_du * dir.dz_u[i];
                }
                for j in 0..m {
                    it.v_l[j] += a_du * dir.dv_l[j];
                    it.v_u[j] += a_du * dir.dv_u[j];
                }
                clip_bound_multipliers(&model, &mut it);
                g = acc.g;
                alpha_pr = acc.alpha;
                alpha_du = a_du;
                debug!(
                    "accepted alpha={:e} after {} trials, theta={:e} f={:e}",
                    acc.alpha, acc.n_trials, acc.theta, acc.f
                );
            }
            Err(_) => {
                if theta <= 10.0 * opt.tol {
                    return finish(
                        SolveStatus::SearchDirectionBecomesTooSmall,
                        &model,
                        &it,
                        f,
                        &g,
                        obj_scaling,
                        x_scaling,
                        g_scaling,
                        iter,
                        eval.counts(),
                        x,
                    );
                }
                n_restorations += 1;
                if n_restorations > MAX_RESTORATIONS {
                    return finish(
                        SolveStatus::RestorationFailed,
                        &model,
                        &it,
                        f,
                        &g,
                        obj_scaling,
                        x_scaling,
                        g_scaling,
                        iter,
                        eval.counts(),
                        x,
                    );
                }
                match enter_restoration(
                    &model, &mut eval, opt, &mut it, &mut g, theta, &mut filter, solver,
                ) {
                    Ok(()) => {}
                    Err(status) => {
                        return finish(
                            status,
                            &model,
                            &it,
                            f,
                            &g,
                            obj_scaling,
                            x_scaling,
                            g_scaling,
                            iter,
                            eval.counts(),
                            x,
                        )
                    }
                }
            }
        }
        iter += 1;
    }
}

/// Pushes `v` into the strict interior of [lo, hi] by the bound_push /
/// bound_frac rule. Infinite sides leave the point untouched from that
/// direction.
fn push_interior(lo: f64, hi: f64, v: f64, kappa_1: f64, kappa_2: f64) -> f64 {
    match (lo.is_finite(), hi.is_finite()) {
        (true, true) => {
            let p_l = f64::min(kappa_1 * f64::max(1.0, lo.abs()), kappa_2 * (hi - lo));
            let p_u = f64::min(kappa_1 * f64::max(1.0, hi.abs()), kappa_2 * (hi - lo));
            f64::min(f64::max(v, lo + p_l), hi - p_u)
        }
        (true, false) => f64::max(v, lo + kappa_1 * f64::max(1.0, lo.abs())),
        (false, true) => f64::min(v, hi - kappa_1 * f64::max(1.0, hi.abs())),
        (false, false) => v,
    }
}

/// Interior margin used when a warm-started point is clamped instead of
/// pushed. Small enough not to move a converged iterate sitting at its
/// barrier distance from a relaxed bound.
fn warm_margin(b: f64) -> f64 {
    1e-10 * f64::max(1.0, b.abs())
}

/// Initializes slacks from the constraint values and attaches their bound
/// multipliers. Equality rows pin the slack at the right-hand side, free
/// rows track g. A warm start clamps instead of pushing and derives the
/// slack multipliers from the constraint multipliers.
fn init_slacks(model: &Model, it: &mut Iterate, g: &[f64], opt: &Options, warm: bool) {
    for j in 0..model.m {
        match model.kinds[j] {
            RowKind::Equality => it.s[j] = model.g_l[j],
            RowKind::Free => it.s[j] = g[j],
            RowKind::Inequality => {
                it.s[j] = if warm {
                    let mut s = g[j];
                    if model.g_l[j].is_finite() {
                        s = s.max(model.g_l[j] + warm_margin(model.g_l[j]));
                    }
                    if model.g_u[j].is_finite() {
                        s = s.min(model.g_u[j] - warm_margin(model.g_u[j]));
                    }
                    s
                } else {
                    push_interior(
                        model.g_l[j],
                        model.g_u[j],
                        g[j],
                        opt.bound_push,
                        opt.bound_frac,
                    )
                };
                if model.g_l[j].is_finite() {
                    it.v_l[j] = if warm {
                        f64::max(MULT_FLOOR, -it.lam[j])
                    } else {
                        1.0
                    };
                }
                if model.g_u[j].is_finite() {
                    it.v_u[j] = if warm {
                        f64::max(MULT_FLOOR, it.lam[j])
                    } else {
                        1.0
                    };
                }
            }
        }
    }
}

/// Projects the bound multipliers into the corridor
/// [mu / (kappa_sigma * slack), kappa_sigma * mu / slack] after a step, so
/// they cannot drift arbitrarily far from the barrier trajectory.
fn clip_bound_multipliers(model: &Model, it: &mut Iterate) {
    let mu = it.mu;
    let clip = |v: f64, slack: f64| -> f64 {
        f64::min(
            f64::max(v, mu / (KAPPA_SIGMA * slack)),
            KAPPA_SIGMA * mu / slack,
        )
    };
    for i in 0..model.n {
        if model.x_l[i].is_finite() {
            it.z_l[i] = clip(it.z_l[i], it.x[i] - model.x_l[i]);
        }
        if model.x_u[i].is_finite() {
            it.z_u[i] = clip(it.z_u[i], model.x_u[i] - it.x[i]);
        }
    }
    for j in 0..model.m {
        if model.kinds[j] != RowKind::Inequality {
            continue;
        }
        if model.g_l[j].is_finite() {
            it.v_l[j] = clip(it.v_l[j], it.s[j] - model.g_l[j]);
        }
        if model.g_u[j].is_finite() {
            it.v_u[j] = clip(it.v_u[j], model.g_u[j] - it.s[j]);
        }
    }
}

/// Runs the restoration phase and, on success, re-enters the main loop with
/// refreshed slacks and re-centered multipliers. The filter is reset.
#[allow(clippy::too_many_arguments)]
fn enter_restoration<P: NlpProblem, S: Solver<usize, f64>>(
    model: &Model,
    eval: &mut Evaluator<P>,
    opt: &Options,
    it: &mut Iterate,
    g: &mut [f64],
    theta: f64,
    filter: &mut Filter,
    solver: &S,
) -> Result<(), SolveStatus> {
    debug!("entering restoration phase with theta={:e}", theta);
    filter.reset();
    match restoration::restore(model, eval, opt, &it.x, theta, solver) {
        Restoration::Restored { x, theta } => {
            debug!("restoration returned with theta={:e}", theta);
            it.x = x;
            if eval.constraints(&it.x, g).is_err() {
                return Err(SolveStatus::InvalidNumberDetected);
            }
            for j in 0..model.m {
                match model.kinds[j] {
                    RowKind::Equality => {}
                    RowKind::Free => it.s[j] = g[j],
                    RowKind::Inequality => {
                        it.s[j] = push_interior(
                            model.g_l[j],
                            model.g_u[j],
                            g[j],
                            opt.bound_push,
                            opt.bound_frac,
                        );
                        if model.g_l[j].is_finite() {
                            it.v_l[j] = recenter(it.mu, it.s[j] - model.g_l[j]);
                        }
                        if model.g_u[j].is_finite() {
                            it.v_u[j] = recenter(it.mu, model.g_u[j] - it.s[j]);
                        }
                    }
                }
                it.lam[j] = 0.0;
            }
            for i in 0..model.n {
                if model.x_l[i].is_finite() {
                    it.z_l[i] = recenter(it.mu, it.x[i] - model.x_l[i]);
                }
                if model.x_u[i].is_finite() {
                    it.z_u[i] = recenter(it.mu, model.x_u[i] - it.x[i]);
                }
            }
            Ok(())
        }
        Restoration::Infeasible => Err(SolveStatus::InfeasibleProblemDetected),
        Restoration::Failed => Err(SolveStatus::RestorationFailed),
        Restoration::Eval(_) => Err(SolveStatus::InvalidNumberDetected),
    }
}

fn recenter(mu: f64, slack: f64) -> f64 {
    (mu / slack).clamp(MULT_FLOOR, 1e8)
}

/// Scaled optimality errors of the current iterate.
fn kkt_errors(model: &Model, it: &Iterate, grad: &[f64], jt_lam: &[f64], c: &[f64]) -> KktError {
    let mut dual = 0.0_f64;
    for i in 0..model.n {
        let r = grad[i] + jt_lam[i] - it.z_l[i] + it.z_u[i];
        dual = dual.max(r.abs());
    }
    let mut compl_0 = 0.0_f64;
    let mut compl_mu = 0.0_f64;
    let mut compl_sum = 0.0;
    let mut n_compl = 0usize;
    let mut mult_sum = 0.0;
    let mut n_mult = 0usize;
    let mut bound_mult_sum = 0.0;
    let mut n_bound_mult = 0usize;

    let mut compl_term = |prod: f64| {
        compl_0 = compl_0.max(prod.abs());
        compl_mu = compl_mu.max((prod - it.mu).abs());
        compl_sum += prod;
        n_compl += 1;
    };
    for i in 0..model.n {
        if model.x_l[i].is_finite() {
            compl_term(it.z_l[i] * (it.x[i] - model.x_l[i]));
            bound_mult_sum += it.z_l[i].abs();
            n_bound_mult += 1;
        }
        if model.x_u[i].is_finite() {
            compl_term(it.z_u[i] * (model.x_u[i] - it.x[i]));
            bound_mult_sum += it.z_u[i].abs();
            n_bound_mult += 1;
        }
    }
    for j in 0..model.m {
        match model.kinds[j] {
            RowKind::Free => continue,
            RowKind::Equality => {}
            RowKind::Inequality => {
                let r = -it.lam[j] - it.v_l[j] + it.v_u[j];
                dual = dual.max(r.abs());
                if model.g_l[j].is_finite() {
                    compl_term(it.v_l[j] * (it.s[j] - model.g_l[j]));
                    bound_mult_sum += it.v_l[j].abs();
                    n_bound_mult += 1;
                }
                if model.g_u[j].is_finite() {
                    compl_term(it.v_u[j] * (model.g_u[j] - it.s[j]));
                    bound_mult_sum += it.v_u[j].abs();
                    n_bound_mult += 1;
                }
            }
        }
        mult_sum += it.lam[j].abs();
        n_mult += 1;
    }

    let primal = math::norm_inf(c);
    let s_d = if n_mult + n_bound_mult > 0 {
        f64::max(
            S_MAX,
            (mult_sum + bound_mult_sum) / (n_mult + n_bound_mult) as f64,
        ) / S_MAX
    } else {
        1.0
    };
    let s_c = if n_bound_mult > 0 {
        f64::max(S_MAX, bound_mult_sum / n_bound_mult as f64) / S_MAX
    } else {
        1.0
    };

    KktError {
        e0: (dual / s_d).max(primal).max(compl_0 / s_c),
        e_mu: (dual / s_d).max(primal).max(compl_mu / s_c),
        dual_inf: dual,
        primal_inf: primal,
        compl_avg: if n_compl > 0 {
            compl_sum / n_compl as f64
        } else {
            0.0
        },
    }
}

/// Terminal packaging before any iterate exists.
fn early(status: SolveStatus, n: usize, m: usize) -> Solution {
    Solution {
        status,
        obj_value: 0.0,
        g: vec![0.0; m],
        mult_g: vec![0.0; m],
        mult_x_l: vec![0.0; n],
        mult_x_u: vec![0.0; n],
        iterations: 0,
        eval_counts: [0; 5],
    }
}

/// Terminal packaging: unscales the iterate, writes the primal point back
/// into the caller's buffer and reports multipliers in user coordinates.
#[allow(clippy::too_many_arguments)]
fn finish(
    status: SolveStatus,
    model: &Model,
    it: &Iterate,
    f_scaled: f64,
    g_scaled: &[f64],
    obj_scaling: f64,
    x_scaling: Option<&[f64]>,
    g_scaling: Option<&[f64]>,
    iterations: usize,
    eval_counts: [usize; 5],
    x: &mut [f64],
) -> Solution {
    log!(
        if status.succeeded() {
            Level::Info
        } else {
            Level::Debug
        },
        "terminating after {} iterations: {}",
        iterations,
        status
    );
    for i in 0..model.n {
        x[i] = match x_scaling {
            Some(d) => it.x[i] / d[i],
            None => it.x[i],
        };
    }
    let g = (0..model.m)
        .map(|j| match g_scaling {
            Some(d) => g_scaled[j] / d[j],
            None => g_scaled[j],
        })
        .collect();
    let mult_g = (0..model.m)
        .map(|j| match g_scaling {
            Some(d) => it.lam[j] * d[j] / obj_scaling,
            None => it.lam[j] / obj_scaling,
        })
        .collect();
    let scale_z = |v: f64, i: usize| match x_scaling {
        Some(d) => v * d[i] / obj_scaling,
        None => v / obj_scaling,
    };
    Solution {
        status,
        obj_value: f_scaled / obj_scaling,
        g,
        mult_g,
        mult_x_l: (0..model.n).map(|i| scale_z(it.z_l[i], i)).collect(),
        mult_x_u: (0..model.n).map(|i| scale_z(it.z_u[i], i)).collect(),
        iterations,
        eval_counts,
    }
}
