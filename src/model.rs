use crate::common::Options;
use crate::math;

/// Classification of a constraint row after bound inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowKind {
    /// g_L = g_U: enters the KKT system directly, no slack.
    Equality,
    /// At least one finite side: slack variable with barrier terms.
    Inequality,
    /// Unbounded on both sides: multiplier pinned at zero.
    Free,
}

/// Internal reformulation of the problem
///
/// ```txt
///       min f(x)   s.t.  g(x) - s = 0,  g_L <= s <= g_U,  x_L <= x <= x_U
/// ```
///
/// Bounds are held in internal (scaled) coordinates, infinities follow the
/// `nlp_{lower,upper}_bound_inf` convention, and every finite bound is
/// relaxed by `bound_relax_factor * max(1, |bound|)`. Equality rows keep
/// their right-hand side unrelaxed.
pub(crate) struct Model {
    pub n: usize,
    pub m: usize,
    pub x_l: Vec<f64>,
    pub x_u: Vec<f64>,
    pub g_l: Vec<f64>,
    pub g_u: Vec<f64>,
    pub kinds: Vec<RowKind>,
    /// Position of each row in the KKT multiplier block, if any.
    pub active: Vec<Option<usize>>,
    /// Rows present in the KKT multiplier block, in order.
    pub active_rows: Vec<usize>,
    /// Number of equality rows.
    pub n_eq: usize,
}

/// Primal-dual iterate. Owned by the driver; slacks of equality rows stay
/// pinned at the right-hand side, slacks of free rows track g(x).
#[derive(Debug, Clone)]
pub(crate) struct Iterate {
    pub x: Vec<f64>,
    pub s: Vec<f64>,
    pub lam: Vec<f64>,
    pub z_l: Vec<f64>,
    pub z_u: Vec<f64>,
    pub v_l: Vec<f64>,
    pub v_u: Vec<f64>,
    pub mu: f64,
}

impl Iterate {
    pub fn zeros(n: usize, m: usize, mu: f64) -> Self {
        Self {
            x: vec![0.0; n],
            s: vec![0.0; m],
            lam: vec![0.0; m],
            z_l: vec![0.0; n],
            z_u: vec![0.0; n],
            v_l: vec![0.0; m],
            v_u: vec![0.0; m],
            mu,
        }
    }
}

impl Model {
    /// Builds the internal model from user bounds. `x_scaling`/`g_scaling`
    /// move the bounds into internal coordinates.
    pub fn new(
        x_l: &[f64],
        x_u: &[f64],
        g_l: &[f64],
        g_u: &[f64],
        x_scaling: Option<&[f64]>,
        g_scaling: Option<&[f64]>,
        opt: &Options,
    ) -> Self {
        let n = x_l.len();
        let m = g_l.len();
        let relax = |b: f64| opt.bound_relax_factor * f64::max(1.0, b.abs());
        let scale = |b: f64, d: Option<&[f64]>, i: usize| match d {
            Some(d) => b * d[i],
            None => b,
        };

        let mut xl = vec![f64::NEG_INFINITY; n];
        let mut xu = vec![f64::INFINITY; n];
        for i in 0..n {
            if x_l[i] > opt.nlp_lower_bound_inf {
                let b = scale(x_l[i], x_scaling, i);
                xl[i] = b - relax(b);
            }
            if x_u[i] < opt.nlp_upper_bound_inf {
                let b = scale(x_u[i], x_scaling, i);
                xu[i] = b + relax(b);
            }
        }

        let mut gl = vec![f64::NEG_INFINITY; m];
        let mut gu = vec![f64::INFINITY; m];
        let mut kinds = vec![RowKind::Free; m];
        let mut active = vec![None; m];
        let mut active_rows = Vec::new();
        let mut n_eq = 0;
        for j in 0..m {
            let has_lower = g_l[j] > opt.nlp_lower_bound_inf;
            let has_upper = g_u[j] < opt.nlp_upper_bound_inf;
            if has_lower && has_upper && (g_u[j] - g_l[j]).abs() <= f64::EPSILON {
                kinds[j] = RowKind::Equality;
                let rhs = scale(g_l[j], g_scaling, j);
                gl[j] = rhs;
                gu[j] = rhs;
                n_eq += 1;
            } else if has_lower || has_upper {
                kinds[j] = RowKind::Inequality;
                if has_lower {
                    let b = scale(g_l[j], g_scaling, j);
                    gl[j] = b - relax(b);
                }
                if has_upper {
                    let b = scale(g_u[j], g_scaling, j);
                    gu[j] = b + relax(b);
                }
            }
            if kinds[j] != RowKind::Free {
                active[j] = Some(active_rows.len());
                active_rows.push(j);
            }
        }

        Self {
            n,
            m,
            x_l: xl,
            x_u: xu,
            g_l: gl,
            g_u: gu,
            kinds,
            active,
            active_rows,
            n_eq,
        }
    }

    /// Residuals c = g(x) - s.
    pub fn residual(&self, g: &[f64], s: &[f64], out: &mut [f64]) {
        for j in 0..self.m {
            out[j] = match self.kinds[j] {
                RowKind::Free => 0.0,
                _ => g[j] - s[j],
            };
        }
    }

    /// Constraint violation theta = ||g(x) - s||_1.
    pub fn theta(&self, c: &[f64]) -> f64 {
        math::norm_1(c)
    }

    /// Barrier objective phi_mu at (x, s) for a given (scaled) objective
    /// value. Returns infinity outside of the strict interior, which makes
    /// the line search reject the point.
    pub fn phi(&self, f: f64, x: &[f64], s: &[f64], mu: f64) -> f64 {
        let mut ln_sum = 0.0;
        for i in 0..self.n {
            if self.x_l[i].is_finite() {
                let sl = x[i] - self.x_l[i];
                if sl <= 0.0 {
                    return f64::INFINITY;
                }
                ln_sum += sl.ln();
            }
            if self.x_u[i].is_finite() {
                let sl = self.x_u[i] - x[i];
                if sl <= 0.0 {
                    return f64::INFINITY;
                }
                ln_sum += sl.ln();
            }
        }
        for j in 0..self.m {
            if self.kinds[j] != RowKind::Inequality {
                continue;
            }
            if self.g_l[j].is_finite() {
                let sl = s[j] - self.g_l[j];
                if sl <= 0.0 {
                    return f64::INFINITY;
                }
                ln_sum += sl.ln();
            }
            if self.g_u[j].is_finite() {
                let sl = self.g_u[j] - s[j];
                if sl <= 0.0 {
                    return f64::INFINITY;
                }
                ln_sum += sl.ln();
            }
        }
        f - mu * ln_sum
    }

    /// Gradient of phi_mu with respect to x.
    pub fn grad_phi_x(&self, grad_f: &[f64], x: &[f64], mu: f64, out: &mut [f64]) {
        for i in 0..self.n {
            let mut v = grad_f[i];
            if self.x_l[i].is_finite() {
                v -= mu / (x[i] - self.x_l[i]);
            }
            if self.x_u[i].is_finite() {
                v += mu / (self.x_u[i] - x[i]);
            }
            out[i] = v;
        }
    }

    /// Gradient of phi_mu with respect to the slacks.
    pub fn grad_phi_s(&self, s: &[f64], mu: f64, out: &mut [f64]) {
        for j in 0..self.m {
            let mut v = 0.0;
            if self.kinds[j] == RowKind::Inequality {
                if self.g_l[j].is_finite() {
                    v -= mu / (s[j] - self.g_l[j]);
                }
                if self.g_u[j].is_finite() {
                    v += mu / (self.g_u[j] - s[j]);
                }
            }
            out[j] = v;
        }
    }

    /// Primal-dual barrier term Sigma_x = Z_L (X - X_L)^-1 + Z_U (X_U - X)^-1.
    pub fn sigma_x(&self, it: &Iterate, out: &mut [f64]) {
        for i in 0..self.n {
            let mut v = 0.0;
            if self.x_l[i].is_finite() {
                v += it.z_l[i] / (it.x[i] - self.x_l[i]);
            }
            if self.x_u[i].is_finite() {
                v += it.z_u[i] / (self.x_u[i] - it.x[i]);
            }
            out[i] = v;
        }
    }

    /// Slack barrier term Sigma_s, nonzero on inequality rows.
    pub fn sigma_s(&self, it: &Iterate, out: &mut [f64]) {
        for j in 0..self.m {
            let mut v = 0.0;
            if self.kinds[j] == RowKind::Inequality {
                if self.g_l[j].is_finite() {
                    v += it.v_l[j] / (it.s[j] - self.g_l[j]);
                }
                if self.g_u[j].is_finite() {
                    v += it.v_u[j] / (self.g_u[j] - it.s[j]);
                }
            }
            out[j] = v;
        }
    }
}
