use crate::common::{MuStrategy, Options};

/// Centering fraction of the average complementarity used by the adaptive
/// strategy.
const SIGMA: f64 = 0.1;

/// Smallest barrier parameter worth iterating on, relative to the solve
/// tolerance.
pub(crate) fn mu_min(opt: &Options) -> f64 {
    0.1 * opt.tol
}

/// One barrier-parameter update. `err_mu` is the scaled KKT error of the
/// current barrier subproblem, `compl_avg` the average complementarity of
/// the iterate. The returned value never exceeds `mu`, so the sequence of
/// barrier parameters is non-increasing under either strategy.
pub(crate) fn update_mu(opt: &Options, mu: f64, err_mu: f64, compl_avg: f64) -> f64 {
    let floor = mu_min(opt);
    match opt.mu_strategy {
        MuStrategy::Monotone => {
            // Fiacco-McCormick: reduce once the subproblem is solved to a
            // tolerance proportional to mu.
            if err_mu <= opt.barrier_tol_factor * mu {
                let next = f64::min(
                    opt.mu_linear_decrease_factor * mu,
                    mu.powf(opt.mu_superlinear_decrease_power),
                );
                f64::max(floor, next)
            } else {
                mu
            }
        }
        MuStrategy::Adaptive => {
            // Track the centrality of the iterate, clamped so mu never
            // increases.
            let target = f64::max(floor, SIGMA * compl_avg);
            f64::min(mu, target)
        }
    }
}
