use crate::sparse::SparsityPattern;
use crate::traits::NlpProblem;

/// Failure inside an evaluation callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EvalError {
    /// A callback reported failure (domain error).
    Callback(&'static str),
    /// A callback produced a NaN or infinite value.
    NonFinite(&'static str),
}

/// Which cached quantities are valid for the current point.
#[derive(Default)]
struct Valid {
    obj: bool,
    grad: bool,
    constr: bool,
    jac: bool,
    hess: bool,
}

/// Caching wrapper around the user's evaluation callbacks.
///
/// Tracks the current point so that value queries are made once per distinct
/// point (re-queries at the same point are served from the cache and remain
/// idempotent), forwards the `new_x`/`new_lambda` flags, applies the user
/// scaling transparently and validates every result for finiteness. The
/// sparsity patterns are queried exactly once, at construction.
pub(crate) struct Evaluator<'a, P: NlpProblem> {
    nlp: &'a P,
    n: usize,
    m: usize,

    jac_pattern: SparsityPattern,
    hess_pattern: SparsityPattern,

    /// Objective scale factor sigma_f.
    obj_scaling: f64,
    /// Per-variable scale factors d_x: internal x is d_x .* user x.
    x_scaling: Option<Vec<f64>>,
    /// Per-constraint scale factors d_g.
    g_scaling: Option<Vec<f64>>,

    /// Current internal (scaled) point.
    x: Vec<f64>,
    /// The same point in user coordinates, passed to the callbacks.
    x_user: Vec<f64>,
    have_point: bool,
    /// True until the first callback at the current point has been made.
    point_unseen: bool,

    valid: Valid,
    obj: f64,
    grad: Vec<f64>,
    constr: Vec<f64>,
    jac: Vec<f64>,
    hess: Vec<f64>,
    /// Internal multipliers the cached Hessian was computed for.
    hess_lambda: Vec<f64>,
    lambda_unseen: bool,

    /// User callback invocations: f, grad f, g, jac g, hess.
    counts: [usize; 5],
}

impl<'a, P: NlpProblem> Evaluator<'a, P> {
    pub fn new(
        nlp: &'a P,
        n: usize,
        m: usize,
        nnz_jac: usize,
        nnz_hess: usize,
        obj_scaling: f64,
        x_scaling: Option<Vec<f64>>,
        g_scaling: Option<Vec<f64>>,
    ) -> Result<Self, String> {
        let mut jac_pattern = SparsityPattern {
            rows: vec![0; nnz_jac],
            cols: vec![0; nnz_jac],
        };
        if !nlp.jacobian_pattern(&mut jac_pattern.rows, &mut jac_pattern.cols) {
            return Err("Jacobian sparsity query failed".to_string());
        }
        jac_pattern.validate(m, n)?;

        let mut hess_pattern = SparsityPattern {
            rows: vec![0; nnz_hess],
            cols: vec![0; nnz_hess],
        };
        if !nlp.hessian_pattern(&mut hess_pattern.rows, &mut hess_pattern.cols) {
            return Err("Hessian sparsity query failed".to_string());
        }
        hess_pattern.validate(n, n)?;
        // Canonicalize to the lower triangle; either triangle is accepted.
        for k in 0..nnz_hess {
            if hess_pattern.rows[k] < hess_pattern.cols[k] {
                let r = hess_pattern.rows[k];
                hess_pattern.rows[k] = hess_pattern.cols[k];
                hess_pattern.cols[k] = r;
            }
        }

        Ok(Self {
            nlp,
            n,
            m,
            jac_pattern,
            hess_pattern,
            obj_scaling,
            x_scaling,
            g_scaling,
            x: vec![0.0; n],
            x_user: vec![0.0; n],
            have_point: false,
            point_unseen: true,
            valid: Valid::default(),
            obj: 0.0,
            grad: vec![0.0; n],
            constr: vec![0.0; m],
            jac: vec![0.0; nnz_jac],
            hess: vec![0.0; nnz_hess],
            hess_lambda: vec![0.0; m],
            lambda_unseen: true,
            counts: [0; 5],
        })
    }

    pub fn jac_pattern(&self) -> &SparsityPattern {
        &self.jac_pattern
    }

    pub fn hess_pattern(&self) -> &SparsityPattern {
        &self.hess_pattern
    }

    pub fn counts(&self) -> [usize; 5] {
        self.counts
    }

    fn set_point(&mut self, x: &[f64]) {
        if self.have_point && self.x == x {
            return;
        }
        self.x.copy_from_slice(x);
        match &self.x_scaling {
            Some(d_x) => {
                for i in 0..self.n {
                    self.x_user[i] = x[i] / d_x[i];
                }
            }
            None => self.x_user.copy_from_slice(x),
        }
        self.have_point = true;
        self.point_unseen = true;
        self.lambda_unseen = true;
        self.valid = Valid::default();
    }

    /// Consumes the new-point flag for one callback invocation.
    fn new_x(&mut self) -> bool {
        let new_x = self.point_unseen;
        self.point_unseen = false;
        new_x
    }

    /// Scaled objective value at the internal point `x`.
    pub fn objective(&mut self, x: &[f64]) -> Result<f64, EvalError> {
        self.set_point(x);
        if !self.valid.obj {
            let new_x = self.new_x();
            let mut obj = 0.0;
            self.counts[0] += 1;
            if !self.nlp.objective(&self.x_user, new_x, &mut obj) {
                return Err(EvalError::Callback("objective"));
            }
            obj *= self.obj_scaling;
            if !obj.is_finite() {
                return Err(EvalError::NonFinite("objective"));
            }
            self.obj = obj;
            self.valid.obj = true;
        }
        Ok(self.obj)
    }

    /// Scaled objective gradient, copied into `out` (length n).
    pub fn gradient(&mut self, x: &[f64], out: &mut [f64]) -> Result<(), EvalError> {
        self.set_point(x);
        if !self.valid.grad {
            let new_x = self.new_x();
            self.counts[1] += 1;
            let nlp = self.nlp;
            if !nlp.gradient(&self.x_user, new_x, &mut self.grad) {
                return Err(EvalError::Callback("objective gradient"));
            }
            for v in self.grad.iter_mut() {
                *v *= self.obj_scaling;
            }
            if let Some(d_x) = &self.x_scaling {
                for i in 0..self.n {
                    self.grad[i] /= d_x[i];
                }
            }
            if !self.grad.iter().all(|v| v.is_finite()) {
                return Err(EvalError::NonFinite("objective gradient"));
            }
            self.valid.grad = true;
        }
        out.copy_from_slice(&self.grad);
        Ok(())
    }

    /// Scaled constraint values, copied into `out` (length m).
    pub fn constraints(&mut self, x: &[f64], out: &mut [f64]) -> Result<(), EvalError> {
        self.set_point(x);
        if !self.valid.constr {
            let new_x = self.new_x();
            self.counts[2] += 1;
            let nlp = self.nlp;
            if !nlp.constraints(&self.x_user, new_x, &mut self.constr) {
                return Err(EvalError::Callback("constraints"));
            }
            if let Some(d_g) = &self.g_scaling {
                for j in 0..self.m {
                    self.constr[j] *= d_g[j];
                }
            }
            if !self.constr.iter().all(|v| v.is_finite()) {
                return Err(EvalError::NonFinite("constraints"));
            }
            self.valid.constr = true;
        }
        out.copy_from_slice(&self.constr);
        Ok(())
    }

    /// Scaled Jacobian values in pattern order, copied into `out`.
    pub fn jacobian(&mut self, x: &[f64], out: &mut [f64]) -> Result<(), EvalError> {
        self.set_point(x);
        if !self.valid.jac {
            let new_x = self.new_x();
            self.counts[3] += 1;
            let nlp = self.nlp;
            if !nlp.jacobian_values(&self.x_user, new_x, &mut self.jac) {
                return Err(EvalError::Callback("constraint Jacobian"));
            }
            if self.g_scaling.is_some() || self.x_scaling.is_some() {
                for k in 0..self.jac.len() {
                    if let Some(d_g) = &self.g_scaling {
                        self.jac[k] *= d_g[self.jac_pattern.rows[k]];
                    }
                    if let Some(d_x) = &self.x_scaling {
                        self.jac[k] /= d_x[self.jac_pattern.cols[k]];
                    }
                }
            }
            if !self.jac.iter().all(|v| v.is_finite()) {
                return Err(EvalError::NonFinite("constraint Jacobian"));
            }
            self.valid.jac = true;
        }
        out.copy_from_slice(&self.jac);
        Ok(())
    }

    /// Scaled Hessian of the Lagrangian (lower triangle, pattern order) for
    /// the internal multipliers `lambda`, copied into `out`.
    ///
    /// The callback receives `obj_factor = sigma_f` and multipliers
    /// premultiplied by the constraint scaling, so implementors work
    /// entirely in user coordinates.
    pub fn hessian(&mut self, x: &[f64], lambda: &[f64], out: &mut [f64]) -> Result<(), EvalError> {
        self.set_point(x);
        if self.valid.hess && self.hess_lambda != lambda {
            self.valid.hess = false;
        }
        if !self.valid.hess {
            let new_x = self.new_x();
            let new_lambda = self.lambda_unseen || self.hess_lambda != lambda;
            self.hess_lambda.copy_from_slice(lambda);
            self.lambda_unseen = false;

            let mut lambda_user = lambda.to_vec();
            if let Some(d_g) = &self.g_scaling {
                for j in 0..self.m {
                    lambda_user[j] *= d_g[j];
                }
            }
            self.counts[4] += 1;
            let nlp = self.nlp;
            if !nlp.hessian_values(
                &self.x_user,
                new_x,
                self.obj_scaling,
                &lambda_user,
                new_lambda,
                &mut self.hess,
            ) {
                return Err(EvalError::Callback("Lagrangian Hessian"));
            }
            if let Some(d_x) = &self.x_scaling {
                for k in 0..self.hess.len() {
                    self.hess[k] /=
                        d_x[self.hess_pattern.rows[k]] * d_x[self.hess_pattern.cols[k]];
                }
            }
            if !self.hess.iter().all(|v| v.is_finite()) {
                return Err(EvalError::NonFinite("Lagrangian Hessian"));
            }
            self.valid.hess = true;
        }
        out.copy_from_slice(&self.hess);
        Ok(())
    }
}
