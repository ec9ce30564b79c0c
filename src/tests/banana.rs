use float_cmp::assert_approx_eq;
use spsolve::rlu::RLU;

use crate::{NlpProblem, Problem, SolveStatus};

/// Unconstrained banana function from MATLAB Optimization Toolbox's
/// `bandem.m`.
struct Banana;

impl NlpProblem for Banana {
    fn objective(&self, x: &[f64], _new_x: bool, obj_value: &mut f64) -> bool {
        let a = 100.0;
        *obj_value = a * (x[1] - x[0] * x[0]).powi(2) + (1.0 - x[0]).powi(2);
        true
    }

    fn gradient(&self, x: &[f64], _new_x: bool, grad_f: &mut [f64]) -> bool {
        let a = 100.0;
        grad_f[0] = -4.0 * a * x[0] * (x[1] - x[0] * x[0]) - 2.0 * (1.0 - x[0]);
        grad_f[1] = 2.0 * a * (x[1] - x[0] * x[0]);
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
        let a = 100.0;
        values[0] = obj_factor * (-4.0 * a * (x[1] - 3.0 * x[0] * x[0]) + 2.0);
        values[1] = obj_factor * (-4.0 * a * x[0]);
        values[2] = obj_factor * 2.0 * a;
        true
    }
}

#[test]
fn unconstrained_banana() {
    let mut p = Problem::new(
        Banana,
        &[f64::NEG_INFINITY; 2],
        &[f64::INFINITY; 2],
        &[],
        &[],
        0,
        3,
    )
    .unwrap();
    p.set_num_option("tol", 1e-8).unwrap();

    let solver = RLU::default();
    let mut x = vec![-1.9, 2.0];
    let sol = p.solve(&solver, &mut x, None);

    assert_eq!(sol.status, SolveStatus::SolveSucceeded);
    assert!(sol.obj_value < 1e-10);
    assert_approx_eq!(f64, x[0], 1.0, epsilon = 1e-5);
    assert_approx_eq!(f64, x[1], 1.0, epsilon = 1e-5);
    assert!(sol.mult_x_l.iter().all(|&z| z == 0.0));
    assert!(sol.mult_x_u.iter().all(|&z| z == 0.0));
}
