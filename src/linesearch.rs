use log::trace;

use crate::eval::Evaluator;
use crate::kkt::Direction;
use crate::model::{Iterate, Model, RowKind};
use crate::traits::NlpProblem;

/// Armijo constant eta_phi.
const ETA_PHI: f64 = 1e-4;
/// Filter margin on the constraint violation.
const GAMMA_THETA: f64 = 1e-5;
/// Filter margin on the barrier objective.
const GAMMA_PHI: f64 = 1e-8;
/// Switching condition exponent on theta.
const S_THETA: f64 = 1.1;
/// Switching condition exponent on the objective slope.
const S_PHI: f64 = 2.3;
/// Switching condition scale.
const DELTA: f64 = 1.0;
/// Backtracking budget.
const MAX_TRIALS: usize = 40;
/// Numeric floor on the step length.
const ALPHA_FLOOR: f64 = 1e-14;

/// Filter of (violation, barrier objective) pairs. Margins are baked in at
/// augmentation time, so acceptability is plain dominance. Grows
/// monotonically between resets; reset on barrier-parameter decreases and at
/// restoration entry.
pub(crate) struct Filter {
    entries: Vec<(f64, f64)>,
    theta_max: f64,
}

impl Filter {
    pub fn new(theta_max: f64) -> Self {
        Self {
            entries: Vec::new(),
            theta_max,
        }
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// True if (theta, phi) is not dominated by any filter entry and does
    /// not exceed the violation cap.
    pub fn acceptable(&self, theta: f64, phi: f64) -> bool {
        if theta >= self.theta_max {
            return false;
        }
        self.entries.iter().all(|&(t, p)| theta < t || phi < p)
    }

    /// Adds the margin-reduced region of the given pair to the filter.
    pub fn add(&mut self, theta: f64, phi: f64) {
        let entry = ((1.0 - GAMMA_THETA) * theta, phi - GAMMA_PHI * theta);
        // drop entries dominated by the new one
        self.entries
            .retain(|&(t, p)| t < entry.0 || p < entry.1);
        self.entries.push(entry);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Largest step in (0, 1] keeping x and the slacks a fraction tau inside
/// their bounds.
pub(crate) fn max_alpha_primal(model: &Model, it: &Iterate, dir: &Direction, tau: f64) -> f64 {
    let mut alpha: f64 = 1.0;
    for i in 0..model.n {
        if dir.dx[i] < 0.0 && model.x_l[i].is_finite() {
            alpha = alpha.min(tau * (it.x[i] - model.x_l[i]) / -dir.dx[i]);
        }
        if dir.dx[i] > 0.0 && model.x_u[i].is_finite() {
            alpha = alpha.min(tau * (model.x_u[i] - it.x[i]) / dir.dx[i]);
        }
    }
    for j in 0..model.m {
        if model.kinds[j] != RowKind::Inequality {
            continue;
        }
        if dir.ds[j] < 0.0 && model.g_l[j].is_finite() {
            alpha = alpha.min(tau * (it.s[j] - model.g_l[j]) / -dir.ds[j]);
        }
        if dir.ds[j] > 0.0 && model.g_u[j].is_finite() {
            alpha = alpha.min(tau * (model.g_u[j] - it.s[j]) / dir.ds[j]);
        }
    }
    alpha
}

/// Largest step in (0, 1] keeping every bound multiplier a fraction tau
/// positive.
pub(crate) fn max_alpha_dual(model: &Model, it: &Iterate, dir: &Direction, tau: f64) -> f64 {
    let mut alpha: f64 = 1.0;
    let cap = |alpha: f64, v: f64, dv: f64| {
        if dv < 0.0 {
            alpha.min(tau * v / -dv)
        } else {
            alpha
        }
    };
    for i in 0..model.n {
        if model.x_l[i].is_finite() {
            alpha = cap(alpha, it.z_l[i], dir.dz_l[i]);
        }
        if model.x_u[i].is_finite() {
            alpha = cap(alpha, it.z_u[i], dir.dz_u[i]);
        }
    }
    for j in 0..model.m {
        if model.kinds[j] != RowKind::Inequality {
            continue;
        }
        if model.g_l[j].is_finite() {
            alpha = cap(alpha, it.v_l[j], dir.dv_l[j]);
        }
        if model.g_u[j].is_finite() {
            alpha = cap(alpha, it.v_u[j], dir.dv_u[j]);
        }
    }
    alpha
}

/// An accepted trial point.
pub(crate) struct Accepted {
    pub alpha: f64,
    pub x: Vec<f64>,
    pub s: Vec<f64>,
    pub g: Vec<f64>,
    pub f: f64,
    pub theta: f64,
    pub n_trials: usize,
}

/// The backtracking budget was exhausted without an acceptable point.
#[derive(Debug)]
pub(crate) struct NoAcceptableStep;

/// Backtracking filter line search along `dir`, starting from the
/// fraction-to-the-boundary maximum `alpha_max` and halving. A trial is
/// accepted when the filter admits it and either the Armijo condition holds
/// under the switching test (f-type, filter untouched) or it satisfies the
/// sufficient-decrease margins against the current pair (h-type, filter
/// augmented). Trial points where an evaluation fails are treated as
/// rejected.
#[allow(clippy::too_many_arguments)]
pub(crate) fn search<P: NlpProblem>(
    model: &Model,
    it: &Iterate,
    dir: &Direction,
    filter: &mut Filter,
    eval: &mut Evaluator<P>,
    theta: f64,
    phi: f64,
    theta_min: f64,
    alpha_max: f64,
) -> Result<Accepted, NoAcceptableStep> {
    let n = model.n;
    let m = model.m;
    let mu = it.mu;
    let dphi = dir.dphi;

    let mut x_trial = vec![0.0; n];
    let mut s_trial = vec![0.0; m];
    let mut g_trial = vec![0.0; m];
    let mut c_trial = vec![0.0; m];

    let mut alpha = alpha_max;
    for trial in 0..MAX_TRIALS {
        if alpha < ALPHA_FLOOR {
            break;
        }
        for i in 0..n {
            x_trial[i] = it.x[i] + alpha * dir.dx[i];
        }
        for j in 0..m {
            s_trial[j] = it.s[j] + alpha * dir.ds[j];
        }

        let f_trial = match eval.objective(&x_trial) {
            Ok(f) => f,
            Err(_) => {
                trace!("objective evaluation failed at alpha={:e}", alpha);
                alpha *= 0.5;
                continue;
            }
        };
        if eval.constraints(&x_trial, &mut g_trial).is_err() {
            trace!("constraint evaluation failed at alpha={:e}", alpha);
            alpha *= 0.5;
            continue;
        }

        model.residual(&g_trial, &s_trial, &mut c_trial);
        let theta_trial = model.theta(&c_trial);
        let phi_trial = model.phi(f_trial, &x_trial, &s_trial, mu);

        if phi_trial.is_finite() && filter.acceptable(theta_trial, phi_trial) {
            // f-type: close to feasibility and the predicted objective
            // decrease dominates the violation.
            let switching = dphi < 0.0
                && alpha * (-dphi).powf(S_PHI) > DELTA * theta.powf(S_THETA);
            if theta <= theta_min && switching {
                if phi_trial <= phi + ETA_PHI * alpha * dphi {
                    return Ok(Accepted {
                        alpha,
                        x: x_trial,
                        s: s_trial,
                        g: g_trial,
                        f: f_trial,
                        theta: theta_trial,
                        n_trials: trial + 1,
                    });
                }
            } else if theta_trial <= (1.0 - GAMMA_THETA) * theta
                || phi_trial <= phi - GAMMA_PHI * theta
            {
                // h-type: sufficient decrease of either measure
                filter.add(theta, phi);
                return Ok(Accepted {
                    alpha,
                    x: x_trial,
                    s: s_trial,
                    g: g_trial,
                    f: f_trial,
                    theta: theta_trial,
                    n_trials: trial + 1,
                });
            }
        }
        alpha *= 0.5;
    }
    Err(NoAcceptableStep)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_dominance() {
        let mut filter = Filter::new(1e4);
        assert!(filter.acceptable(1.0, -5.0));
        filter.add(1.0, -5.0);
        // dominated in both measures
        assert!(!filter.acceptable(2.0, 0.0));
        // better violation is acceptable
        assert!(filter.acceptable(0.5, 0.0));
        // better objective is acceptable
        assert!(filter.acceptable(2.0, -10.0));
        // the violation cap rejects regardless of the objective
        assert!(!filter.acceptable(1e4, -1e30));
    }

    #[test]
    fn filter_prunes_dominated_entries() {
        let mut filter = Filter::new(1e4);
        filter.add(1.0, 0.0);
        filter.add(2.0, -1.0);
        assert_eq!(filter.len(), 2);
        // a pair better in both measures supersedes everything so far
        filter.add(0.5, -2.0);
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn filter_reset_clears_entries() {
        let mut filter = Filter::new(1e4);
        filter.add(1.0, 0.0);
        filter.reset();
        assert!(filter.acceptable(2.0, 1.0));
    }
}
