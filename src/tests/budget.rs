use spsolve::rlu::RLU;

use crate::tests::Recorder;
use crate::{NlpProblem, Problem, SolveStatus};

/// Banana-valley objective, slow enough to outlive a tiny budget.
struct Slow;

impl NlpProblem for Slow {
    fn objective(&self, x: &[f64], _new_x: bool, obj_value: &mut f64) -> bool {
        *obj_value = 100.0 * (x[1] - x[0] * x[0]).powi(2) + (1.0 - x[0]).powi(2);
        true
    }
    fn gradient(&self, x: &[f64], _new_x: bool, grad_f: &mut [f64]) -> bool {
        grad_f[0] = -400.0 * x[0] * (x[1] - x[0] * x[0]) - 2.0 * (1.0 - x[0]);
        grad_f[1] = 200.0 * (x[1] - x[0] * x[0]);
        true
    }
    fn constraints(&self, _x: &[f64], _new_x: bool, _g: &mut [f64]) -> bool {
        true
    }
    fn jacobian_pattern(&self, _rows: &mut [usize], _cols: &mut [usize]) -> bool {
        true
    }
    fn jacobian_values(&self, _x: &[f64], _new_x: bool, _values: &mut [f64]) -> bool {
        true
    }
    fn hessian_pattern(&self, rows: &mut [usize], cols: &mut [usize]) -> bool {
        rows.copy_from_slice(&[0, 1, 1]);
        cols.copy_from_slice(&[0, 0, 1]);
        true
    }
    fn hessian_values(
        &self,
        x: &[f64],
        _new_x: bool,
        obj_factor: f64,
        _lambda: &[f64],
        _new_lambda: bool,
        values: &mut [f64],
    ) -> bool {
        values[0] = obj_factor * (-400.0 * (x[1] - 3.0 * x[0] * x[0]) + 2.0);
        values[1] = obj_factor * (-400.0 * x[0]);
        values[2] = obj_factor * 200.0;
        true
    }
}

fn slow_problem() -> Problem<Slow> {
    Problem::new(
        Slow,
        &[f64::NEG_INFINITY; 2],
        &[f64::INFINITY; 2],
        &[],
        &[],
        0,
        3,
    )
    .unwrap()
}

#[test]
fn iteration_budget_is_terminal() {
    let mut p = slow_problem();
    p.set_int_option("max_iter", 2).unwrap();
    let solver = RLU::default();
    let mut x = vec![-1.9, 2.0];
    let sol = p.solve(&solver, &mut x, None);
    assert_eq!(sol.status, SolveStatus::MaximumIterationsExceeded);
    assert_eq!(sol.iterations, 2);
    // the partial iterate is left for inspection
    assert!(x.iter().all(|v| v.is_finite()));
    assert!(sol.obj_value.is_finite());
}

#[test]
fn wall_time_budget_is_terminal() {
    let mut p = slow_problem();
    p.set_num_option("max_wall_time", 1e-12).unwrap();
    let solver = RLU::default();
    let mut x = vec![-1.9, 2.0];
    let sol = p.solve(&solver, &mut x, None);
    assert_eq!(sol.status, SolveStatus::MaximumWalltimeExceeded);
}

#[test]
fn monitor_veto_stops_the_solve() {
    let mut p = slow_problem();
    let solver = RLU::default();
    let recorder = Recorder {
        stop_after: Some(1),
        ..Recorder::default()
    };
    let mut x = vec![-1.9, 2.0];
    let sol = p.solve(&solver, &mut x, Some(&recorder));
    assert_eq!(sol.status, SolveStatus::UserRequestedStop);
    assert!(sol.iterations <= 2);
}

/// Objective whose gradient reports a domain error everywhere.
struct BrokenGradient;

impl NlpProblem for BrokenGradient {
    fn objective(&self, x: &[f64], _new_x: bool, obj_value: &mut f64) -> bool {
        *obj_value = x[0];
        true
    }
    fn gradient(&self, _x: &[f64], _new_x: bool, _grad_f: &mut [f64]) -> bool {
        false
    }
    fn constraints(&self, _x: &[f64], _new_x: bool, _g: &mut [f64]) -> bool {
        true
    }
    fn jacobian_pattern(&self, _rows: &mut [usize], _cols: &mut [usize]) -> bool {
        true
    }
    fn jacobian_values(&self, _x: &[f64], _new_x: bool, _values: &mut [f64]) -> bool {
        true
    }
    fn hessian_pattern(&self, _rows: &mut [usize], _cols: &mut [usize]) -> bool {
        true
    }
    fn hessian_values(
        &self,
        _x: &[f64],
        _new_x: bool,
        _obj_factor: f64,
        _lambda: &[f64],
        _new_lambda: bool,
        _values: &mut [f64],
    ) -> bool {
        true
    }
}

#[test]
fn evaluation_failure_aborts_with_invalid_number() {
    let mut p = Problem::new(BrokenGradient, &[0.0], &[10.0], &[], &[], 0, 0).unwrap();
    let solver = RLU::default();
    let mut x = vec![5.0];
    let sol = p.solve(&solver, &mut x, None);
    assert_eq!(sol.status, SolveStatus::InvalidNumberDetected);
    assert_eq!(sol.iterations, 0);
}
