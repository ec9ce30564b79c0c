use spsolve::Solver;

use crate::common::{Error, Options, Solution, SolveStatus};
use crate::ipm::{self, WarmStart};
use crate::options;
use crate::traits::{NlpProblem, ProgressMonitor};

/// A nonlinear program bundled with its bounds, options, scaling and the
/// state retained between solves. Owns the evaluation object; dropping the
/// problem releases everything.
///
/// Bound slices are copied at construction, so the caller may free its
/// buffers afterwards. A `&mut self` receiver on [`Problem::solve`] rules
/// out concurrent solves on the same problem.
pub struct Problem<P> {
    nlp: P,
    n: usize,
    m: usize,
    x_l: Vec<f64>,
    x_u: Vec<f64>,
    g_l: Vec<f64>,
    g_u: Vec<f64>,
    nnz_jac: usize,
    nnz_hess: usize,
    opt: Options,
    obj_scaling: f64,
    x_scaling: Option<Vec<f64>>,
    g_scaling: Option<Vec<f64>>,
    warm: Option<WarmStart>,
}

impl<P: NlpProblem> Problem<P> {
    /// Validates the problem description and takes ownership of the
    /// evaluation object. Variable bounds must satisfy `x_l <= x_u`
    /// (equality encodes a fixed variable); an empty constraint interval
    /// `g_l > g_u` is legal here and surfaces as
    /// `InfeasibleProblemDetected` at solve time.
    pub fn new(
        nlp: P,
        x_l: &[f64],
        x_u: &[f64],
        g_l: &[f64],
        g_u: &[f64],
        nnz_jac: usize,
        nnz_hess: usize,
    ) -> Result<Self, Error> {
        let n = x_l.len();
        let m = g_l.len();
        if n == 0 {
            return Err(Error::InvalidProblemDefinition(
                "problem has no variables".to_string(),
            ));
        }
        if x_u.len() != n {
            return Err(Error::InvalidProblemDefinition(format!(
                "variable bound arrays disagree in length: {} vs {}",
                n,
                x_u.len()
            )));
        }
        if g_u.len() != m {
            return Err(Error::InvalidProblemDefinition(format!(
                "constraint bound arrays disagree in length: {} vs {}",
                m,
                g_u.len()
            )));
        }
        if x_l.iter().chain(x_u).chain(g_l).chain(g_u).any(|v| v.is_nan()) {
            return Err(Error::InvalidProblemDefinition(
                "bounds must not be NaN".to_string(),
            ));
        }
        for i in 0..n {
            if x_l[i] > x_u[i] {
                return Err(Error::InvalidProblemDefinition(format!(
                    "variable {} has x_l > x_u",
                    i
                )));
            }
        }

        Ok(Self {
            nlp,
            n,
            m,
            x_l: x_l.to_vec(),
            x_u: x_u.to_vec(),
            g_l: g_l.to_vec(),
            g_u: g_u.to_vec(),
            nnz_jac,
            nnz_hess,
            opt: Options::default(),
            obj_scaling: 1.0,
            x_scaling: None,
            g_scaling: None,
            warm: None,
        })
    }

    pub fn num_variables(&self) -> usize {
        self.n
    }

    pub fn num_constraints(&self) -> usize {
        self.m
    }

    /// Sets a string-valued option, validated against the recognized-option
    /// table. Unknown names, type mismatches and out-of-range values are
    /// errors.
    pub fn set_str_option(&mut self, name: &str, value: &str) -> Result<(), Error> {
        options::set_str_option(&mut self.opt, name, value)
    }

    /// Sets an integer-valued option. See [`Problem::set_str_option`].
    pub fn set_int_option(&mut self, name: &str, value: i64) -> Result<(), Error> {
        options::set_int_option(&mut self.opt, name, value)
    }

    /// Sets a floating-point option. See [`Problem::set_str_option`].
    pub fn set_num_option(&mut self, name: &str, value: f64) -> Result<(), Error> {
        options::set_num_option(&mut self.opt, name, value)
    }

    /// Typed access to the full option set.
    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.opt
    }

    /// Registers objective, per-variable and per-constraint scaling
    /// factors, applied ahead of the first evaluation of the next solve.
    /// Factors must be positive and finite; the reported solution is
    /// unscaled.
    pub fn set_scaling(
        &mut self,
        obj: f64,
        x_scaling: Option<&[f64]>,
        g_scaling: Option<&[f64]>,
    ) -> Result<(), Error> {
        if !(obj.is_finite() && obj > 0.0) {
            return Err(Error::InvalidProblemDefinition(format!(
                "objective scaling factor must be positive, got {}",
                obj
            )));
        }
        let check = |name: &str, len: usize, d: Option<&[f64]>| -> Result<(), Error> {
            if let Some(d) = d {
                if d.len() != len {
                    return Err(Error::InvalidProblemDefinition(format!(
                        "{} scaling has length {}, expected {}",
                        name,
                        d.len(),
                        len
                    )));
                }
                if d.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
                    return Err(Error::InvalidProblemDefinition(format!(
                        "{} scaling factors must be positive and finite",
                        name
                    )));
                }
            }
            Ok(())
        };
        check("variable", self.n, x_scaling)?;
        check("constraint", self.m, g_scaling)?;

        self.obj_scaling = obj;
        self.x_scaling = x_scaling.map(|d| d.to_vec());
        self.g_scaling = g_scaling.map(|d| d.to_vec());
        Ok(())
    }

    /// Solves the program starting from `x`, which is overwritten in place
    /// with the final point, also on failure statuses. The linear solver
    /// factors the KKT systems; tests use `spsolve::rlu::RLU`.
    ///
    /// The final multipliers are retained: a later solve with
    /// `warm_start_init_point` set reuses them and skips the initial-point
    /// push.
    pub fn solve<S: Solver<usize, f64>>(
        &mut self,
        solver: &S,
        x: &mut [f64],
        progress: Option<&dyn ProgressMonitor>,
    ) -> Solution {
        if x.len() != self.n {
            return Solution {
                status: SolveStatus::InvalidProblemDefinition,
                obj_value: 0.0,
                g: vec![0.0; self.m],
                mult_g: vec![0.0; self.m],
                mult_x_l: vec![0.0; self.n],
                mult_x_u: vec![0.0; self.n],
                iterations: 0,
                eval_counts: [0; 5],
            };
        }
        let obj_scaling = self.obj_scaling * self.opt.obj_scaling_factor;
        let solution = ipm::solve(
            &self.nlp,
            &self.x_l,
            &self.x_u,
            &self.g_l,
            &self.g_u,
            self.nnz_jac,
            self.nnz_hess,
            &self.opt,
            obj_scaling,
            self.x_scaling.as_deref(),
            self.g_scaling.as_deref(),
            self.warm.as_ref(),
            x,
            progress,
            solver,
        );
        self.warm = Some(WarmStart {
            mult_g: solution.mult_g.clone(),
            mult_x_l: solution.mult_x_l.clone(),
            mult_x_u: solution.mult_x_u.clone(),
        });
        solution
    }
}
