use thiserror::Error;

/// Terminal outcome of a solve.
///
/// The discriminants mirror the return codes of the classic C interface so
/// that callers porting existing drivers can match on the same numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SolveStatus {
    SolveSucceeded = 0,
    SolvedToAcceptableLevel = 1,
    InfeasibleProblemDetected = 2,
    SearchDirectionBecomesTooSmall = 3,
    DivergingIterates = 4,
    UserRequestedStop = 5,
    FeasiblePointFound = 6,

    MaximumIterationsExceeded = -1,
    RestorationFailed = -2,
    ErrorInStepComputation = -3,
    MaximumCpuTimeExceeded = -4,
    MaximumWalltimeExceeded = -5,

    NotEnoughDegreesOfFreedom = -10,
    InvalidProblemDefinition = -11,
    InvalidOption = -12,
    InvalidNumberDetected = -13,

    UnrecoverableException = -100,
    InsufficientMemory = -102,
    InternalError = -199,
}

impl SolveStatus {
    /// True for the two statuses that leave a point satisfying the
    /// convergence tolerances (full or acceptable).
    pub fn succeeded(&self) -> bool {
        matches!(
            self,
            SolveStatus::SolveSucceeded | SolveStatus::SolvedToAcceptableLevel
        )
    }

    /// The integer code of the classic C interface.
    pub fn code(&self) -> i32 {
        *self as i32
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let msg = match self {
            SolveStatus::SolveSucceeded => "optimal solution found",
            SolveStatus::SolvedToAcceptableLevel => "solved to acceptable level",
            SolveStatus::InfeasibleProblemDetected => "converged to a point of local infeasibility",
            SolveStatus::SearchDirectionBecomesTooSmall => "search direction becomes too small",
            SolveStatus::DivergingIterates => "iterates diverging",
            SolveStatus::UserRequestedStop => "stop requested by the progress monitor",
            SolveStatus::FeasiblePointFound => "feasible point found",
            SolveStatus::MaximumIterationsExceeded => "maximum number of iterations exceeded",
            SolveStatus::RestorationFailed => "restoration phase failed",
            SolveStatus::ErrorInStepComputation => "error in step computation",
            SolveStatus::MaximumCpuTimeExceeded => "maximum CPU time exceeded",
            SolveStatus::MaximumWalltimeExceeded => "maximum wall time exceeded",
            SolveStatus::NotEnoughDegreesOfFreedom => "too few degrees of freedom",
            SolveStatus::InvalidProblemDefinition => "invalid problem definition",
            SolveStatus::InvalidOption => "invalid option",
            SolveStatus::InvalidNumberDetected => "invalid number detected in evaluation",
            SolveStatus::UnrecoverableException => "unrecoverable exception",
            SolveStatus::InsufficientMemory => "insufficient memory",
            SolveStatus::InternalError => "internal error",
        };
        write!(f, "{}", msg)
    }
}

/// Errors signalled before a solve is attempted: malformed problem data or
/// rejected option values.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid problem definition: {0}")]
    InvalidProblemDefinition(String),
    #[error("invalid option: {0}")]
    InvalidOption(String),
}

/// Barrier parameter update policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuStrategy {
    /// Fiacco-McCormick: hold mu fixed until the barrier subproblem is
    /// solved to a tolerance proportional to mu, then reduce.
    Monotone,
    /// Track a centrality estimate of the current iterate each iteration.
    Adaptive,
}

pub struct Options {
    /// Termination tolerance for the scaled KKT error.
    pub tol: f64,
    /// Relaxed tolerance for the acceptable-level termination.
    pub acceptable_tol: f64,
    /// Number of consecutive acceptable iterations required before a budget
    /// failure is upgraded to `SolvedToAcceptableLevel`.
    pub acceptable_iter: usize,

    /// Maximum number of outer iterations.
    pub max_iter: usize,
    /// CPU time budget in seconds, checked once per outer iteration.
    pub max_cpu_time: f64,
    /// Wall clock budget in seconds, checked once per outer iteration.
    pub max_wall_time: f64,

    /// Barrier parameter update policy.
    pub mu_strategy: MuStrategy,
    /// Initial barrier parameter.
    pub mu_init: f64,
    /// Linear reduction factor kappa_mu of the monotone strategy.
    pub mu_linear_decrease_factor: f64,
    /// Superlinear reduction exponent theta_mu of the monotone strategy.
    pub mu_superlinear_decrease_power: f64,
    /// Factor kappa_epsilon relating the barrier subproblem tolerance to mu.
    pub barrier_tol_factor: f64,
    /// Lower bound on the fraction-to-the-boundary parameter tau.
    pub tau_min: f64,

    /// Absolute push of the initial point away from its bounds.
    pub bound_push: f64,
    /// Relative push of the initial point into the bound interval.
    pub bound_frac: f64,
    /// All bounds are relaxed by this factor times `max(1, |bound|)` at
    /// solve start.
    pub bound_relax_factor: f64,

    /// Reuse the multipliers of the previous solve and skip the initial
    /// point push.
    pub warm_start_init_point: bool,

    /// Bounds below this value are treated as minus infinity.
    pub nlp_lower_bound_inf: f64,
    /// Bounds above this value are treated as plus infinity.
    pub nlp_upper_bound_inf: f64,

    /// Declares divergence when the iterate infinity norm exceeds this.
    pub diverging_iterates_tol: f64,
    /// Search directions with a 2-norm above this value count as failed
    /// step computations.
    pub max_step_size: f64,

    /// Scale factor applied to the objective before the first evaluation.
    pub obj_scaling_factor: f64,

    /// Verbosity of the per-iteration report, 0..=12. Levels of 5 and above
    /// log at info, lower levels at debug.
    pub print_level: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            tol: 1e-8,
            acceptable_tol: 1e-6,
            acceptable_iter: 15,

            max_iter: 3000,
            max_cpu_time: 1e6,
            max_wall_time: 1e20,

            mu_strategy: MuStrategy::Monotone,
            mu_init: 0.1,
            mu_linear_decrease_factor: 0.2,
            mu_superlinear_decrease_power: 1.5,
            barrier_tol_factor: 10.0,
            tau_min: 0.99,

            bound_push: 0.01,
            bound_frac: 0.01,
            bound_relax_factor: 1e-8,

            warm_start_init_point: false,

            nlp_lower_bound_inf: -1e19,
            nlp_upper_bound_inf: 1e19,

            diverging_iterates_tol: 1e20,
            max_step_size: 1e10,

            obj_scaling_factor: 1.0,

            print_level: 5,
        }
    }
}

/// Result of one solve call. The final primal point is written back into the
/// caller's `x` buffer; everything else is reported here.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Terminal status.
    pub status: SolveStatus,
    /// Final objective value (unscaled).
    pub obj_value: f64,
    /// Final constraint values g(x) (unscaled).
    pub g: Vec<f64>,
    /// Multipliers on the constraints.
    pub mult_g: Vec<f64>,
    /// Multipliers on the variable lower bounds.
    pub mult_x_l: Vec<f64>,
    /// Multipliers on the variable upper bounds.
    pub mult_x_u: Vec<f64>,
    /// Outer iterations performed.
    pub iterations: usize,
    /// Objective, gradient, constraint, Jacobian and Hessian evaluation
    /// counts.
    pub eval_counts: [usize; 5],
}
